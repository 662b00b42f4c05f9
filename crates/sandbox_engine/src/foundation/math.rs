//! Math utilities and types
//!
//! Provides the fundamental math types used by the renderer. Matrices follow
//! nalgebra's column-major convention; the Vulkan clip-space Y flip is applied
//! where projection matrices are built, not here.

pub use nalgebra::{
    Matrix3, Matrix4,
    Unit,
    Vector2, Vector3, Vector4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees * std::f32::consts::PI / 180.0
}

/// Extension helpers for building view and projection matrices
pub trait Mat4Ext {
    /// Right-handed look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Right-handed perspective projection with the Vulkan clip-space
    /// convention (Y axis pointing down, depth in [0, 1] handled by
    /// negating the Y scale term)
    fn perspective_vk(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn perspective_vk(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        let mut projection = Mat4::new_perspective(aspect, fov_y_radians, near, far);
        projection[(1, 1)] *= -1.0;
        projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-6;

    #[test]
    fn test_deg_to_rad_half_turn() {
        assert_relative_eq!(deg_to_rad(180.0), std::f32::consts::PI, epsilon = EPSILON);
    }

    #[test]
    fn test_look_at_maps_eye_to_origin() {
        let eye = Vec3::new(0.0, 0.0, 5.0);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());
        let transformed = view.transform_point(&Point3::from(eye));
        assert_relative_eq!(transformed.x, 0.0, epsilon = EPSILON);
        assert_relative_eq!(transformed.y, 0.0, epsilon = EPSILON);
        assert_relative_eq!(transformed.z, 0.0, epsilon = EPSILON);
    }

    #[test]
    fn test_perspective_vk_flips_y() {
        let flipped = Mat4::perspective_vk(deg_to_rad(45.0), 16.0 / 9.0, 0.1, 100.0);
        let standard = Mat4::new_perspective(16.0 / 9.0, deg_to_rad(45.0), 0.1, 100.0);
        assert_relative_eq!(flipped[(1, 1)], -standard[(1, 1)], epsilon = EPSILON);
        assert_relative_eq!(flipped[(0, 0)], standard[(0, 0)], epsilon = EPSILON);
    }
}
