//! Scene objects
//!
//! An object owns its meshes and a world transform derived from position and
//! scale. The transform is recomputed on every mutation so draws can read it
//! without any lazy bookkeeping.

use super::mesh::Mesh;
use crate::foundation::math::{Mat4, Vec3};

pub struct SceneObject {
    name: String,
    position: Vec3,
    scale: Vec3,
    transform: Mat4,
    meshes: Vec<Mesh>,
    casts_shadow: bool,
    shaded: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, meshes: Vec<Mesh>) -> Self {
        Self {
            name: name.into(),
            position: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            transform: Mat4::identity(),
            meshes,
            casts_shadow: true,
            shaded: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.recompute_transform();
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.recompute_transform();
    }

    /// World transform: translation applied after scale
    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    /// Whether the shadow passes rasterize this object. Light gizmos and
    /// similar markers opt out.
    pub fn casts_shadow(&self) -> bool {
        self.casts_shadow
    }

    pub fn set_casts_shadow(&mut self, casts_shadow: bool) {
        self.casts_shadow = casts_shadow;
    }

    /// Whether the fragment shader lights this object. Unlit objects render
    /// their diffuse texture directly.
    pub fn shaded(&self) -> bool {
        self.shaded
    }

    pub fn set_shaded(&mut self, shaded: bool) {
        self.shaded = shaded;
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    fn recompute_transform(&mut self) {
        self.transform =
            Mat4::new_translation(&self.position) * Mat4::new_nonuniform_scaling(&self.scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    const EPSILON: f32 = 1e-6;

    fn empty_object() -> SceneObject {
        SceneObject::new("test", Vec::new())
    }

    #[test]
    fn test_new_object_defaults() {
        let object = empty_object();
        assert_eq!(object.name(), "test");
        assert!(object.casts_shadow());
        assert_relative_eq!(
            (object.transform() - Mat4::identity()).norm(),
            0.0,
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_set_position_recomputes_transform() {
        let mut object = empty_object();
        object.set_position(Vec3::new(1.0, 2.0, 3.0));
        let moved = object.transform().transform_point(&Point3::origin());
        assert_relative_eq!(moved.x, 1.0, epsilon = EPSILON);
        assert_relative_eq!(moved.y, 2.0, epsilon = EPSILON);
        assert_relative_eq!(moved.z, 3.0, epsilon = EPSILON);
    }

    #[test]
    fn test_scale_applies_before_translation() {
        let mut object = empty_object();
        object.set_position(Vec3::new(10.0, 0.0, 0.0));
        object.set_scale(Vec3::new(2.0, 2.0, 2.0));
        let point = object
            .transform()
            .transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(point.x, 12.0, epsilon = EPSILON);
        assert_relative_eq!(point.y, 2.0, epsilon = EPSILON);
        assert_relative_eq!(point.z, 2.0, epsilon = EPSILON);
    }
}
