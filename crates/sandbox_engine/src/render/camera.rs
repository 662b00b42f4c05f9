//! 3D perspective camera
//!
//! Pure camera math with no Vulkan dependencies. Matrices are computed on
//! demand from position, target and projection parameters; the projection
//! already carries the Y flip for Vulkan clip space, so callers multiply
//! `projection * view * model` and nothing else.

use crate::foundation::math::{deg_to_rad, Mat4, Mat4Ext, Vec3};

/// Perspective camera in a right-handed Y-up world
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a perspective camera looking at the origin
    pub fn perspective(position: Vec3, fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: deg_to_rad(fov_degrees),
            aspect,
            near,
            far,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        self.target = target;
        self.up = up;
    }

    /// Update the aspect ratio after a viewport resize
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if (self.aspect - aspect).abs() > 0.01 {
            log::debug!("Camera aspect ratio changed: {:.3} -> {:.3}", self.aspect, aspect);
        }
        self.aspect = aspect;
    }

    /// World-to-camera transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// Perspective projection with the Vulkan Y flip already applied
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_vk(self.fov, self.aspect, self.near, self.far)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, 3.0),
            target: Vec3::zeros(),
            up: Vec3::new(0.0, 1.0, 0.0),
            fov: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::foundation::math::Point3;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_view_matrix_moves_camera_to_origin() {
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 45.0, 1.0, 0.1, 100.0);
        let view = camera.view_matrix();
        let eye = view.transform_point(&Point3::new(0.0, 0.0, 5.0));
        assert_relative_eq!(eye.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(eye.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(eye.z, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_projection_flips_y_for_clip_space() {
        let camera = Camera::perspective(Vec3::new(0.0, 0.0, 5.0), 45.0, 1.0, 0.1, 100.0);
        let projection = camera.projection_matrix();
        assert!(projection[(1, 1)] < 0.0);
    }

    #[test]
    fn test_aspect_ratio_update() {
        let mut camera = Camera::default();
        camera.set_aspect_ratio(2.0);
        assert_relative_eq!(camera.aspect, 2.0, epsilon = EPSILON);
    }
}
