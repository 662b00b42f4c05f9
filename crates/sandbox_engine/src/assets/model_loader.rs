//! Mesh import collaborator
//!
//! Loads OBJ files into flattened vertex/index lists. Node hierarchies do
//! not survive import; each model becomes one `MeshSource` with an identity
//! local transform, mirroring what the GPU side expects to consume.

use super::{AssetError, AssetResult};
use crate::foundation::math::Mat4;
use crate::render::Vertex;
use std::path::Path;

/// One flattened mesh as produced by import: host-side vertex/index arrays
/// plus the texture paths of its material channels (diffuse, specular,
/// normal). A `None` channel means the material did not reference a texture.
#[derive(Debug, Clone)]
pub struct MeshSource {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub transform: Mat4,
    pub material_paths: [Option<String>; 3],
}

/// Load an OBJ file into flattened mesh sources
pub fn load_obj(path: impl AsRef<Path>) -> AssetResult<Vec<MeshSource>> {
    let path = path.as_ref();
    let (models, materials) =
        tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS).map_err(|source| AssetError::ModelLoad {
            path: path.display().to_string(),
            source,
        })?;

    // A missing or broken MTL file is not fatal; the meshes just get the
    // placeholder material channels.
    let materials = materials.unwrap_or_else(|err| {
        log::warn!("Ignoring material library for {}: {}", path.display(), err);
        Vec::new()
    });

    let sources = convert_models(models, &materials);
    log::info!("Loaded {} mesh(es) from {}", sources.len(), path.display());
    Ok(sources)
}

fn convert_models(models: Vec<tobj::Model>, materials: &[tobj::Material]) -> Vec<MeshSource> {
    models
        .into_iter()
        .map(|model| {
            let mesh = model.mesh;
            let vertex_count = mesh.positions.len() / 3;
            let mut vertices = Vec::with_capacity(vertex_count);
            for i in 0..vertex_count {
                let tex_coord = if mesh.texcoords.len() >= (i + 1) * 2 {
                    [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
                } else {
                    [0.0, 0.0]
                };
                let normal = if mesh.normals.len() >= (i + 1) * 3 {
                    [
                        mesh.normals[i * 3],
                        mesh.normals[i * 3 + 1],
                        mesh.normals[i * 3 + 2],
                    ]
                } else {
                    [0.0, 1.0, 0.0]
                };
                vertices.push(Vertex {
                    position: [
                        mesh.positions[i * 3],
                        mesh.positions[i * 3 + 1],
                        mesh.positions[i * 3 + 2],
                    ],
                    tex_coord,
                    normal,
                });
            }

            let material_paths = mesh
                .material_id
                .and_then(|id| materials.get(id))
                .map(|material| {
                    [
                        material.diffuse_texture.clone(),
                        material.specular_texture.clone(),
                        material.normal_texture.clone(),
                    ]
                })
                .unwrap_or_default();

            MeshSource {
                vertices,
                indices: mesh.indices,
                transform: Mat4::identity(),
                material_paths,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TRIANGLE_OBJ: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_triangle_obj_flattens_to_one_mesh() {
        let (models, _) = tobj::load_obj_buf(
            &mut Cursor::new(TRIANGLE_OBJ),
            &tobj::GPU_LOAD_OPTIONS,
            |_| Ok((Vec::new(), Default::default())),
        )
        .unwrap();
        let sources = convert_models(models, &[]);

        assert_eq!(sources.len(), 1);
        let mesh = &sources[0];
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
        assert_eq!(mesh.material_paths, [None, None, None]);
        assert_eq!(mesh.vertices[1].position, [1.0, 0.0, 0.0]);
        assert_eq!(mesh.vertices[2].tex_coord, [0.0, 1.0]);
    }
}
