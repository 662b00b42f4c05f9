//! Terrain generation from a height map image
//!
//! Builds a grid mesh from the red channel of a decoded image: one vertex
//! per texel, two triangles per texel quad, emitted as an indexed triangle
//! list so terrain draws through the same pipeline as loaded models.

use super::image_loader::ImageData;
use super::model_loader::MeshSource;
use crate::foundation::math::Mat4;
use crate::render::Vertex;

const Y_SCALE: f32 = 64.0 * 100.0 / 256.0;
const Y_SHIFT: f32 = 16.0;

/// Build a terrain mesh from height map pixels. The grid is centered on the
/// origin; height comes from the red channel, negated so brighter texels
/// rise toward negative Y in the world convention the scenes use.
pub fn build_height_map_mesh(height_map: &ImageData) -> MeshSource {
    let width = height_map.width as usize;
    let height = height_map.height as usize;

    let mut vertices = Vec::with_capacity(width * height);
    for i in 0..height {
        for j in 0..width {
            let texel = height_map.pixels[(j + width * i) * 4];
            let y = (f32::from(texel) * Y_SCALE - Y_SHIFT) * -1.0;

            vertices.push(Vertex {
                position: [
                    -(height as f32) / 2.0 + i as f32,
                    y,
                    -(width as f32) / 2.0 + j as f32,
                ],
                tex_coord: [j as f32 / width as f32, i as f32 / height as f32],
                normal: [0.0, 1.0, 0.0],
            });
        }
    }

    // Two triangles per quad between adjacent texel rows
    let quad_rows = height.saturating_sub(1);
    let quad_cols = width.saturating_sub(1);
    let mut indices = Vec::with_capacity(quad_rows * quad_cols * 6);
    for i in 0..quad_rows {
        for j in 0..quad_cols {
            let top_left = (j + width * i) as u32;
            let top_right = top_left + 1;
            let bottom_left = (j + width * (i + 1)) as u32;
            let bottom_right = bottom_left + 1;

            indices.extend_from_slice(&[
                top_left,
                bottom_left,
                top_right,
                top_right,
                bottom_left,
                bottom_right,
            ]);
        }
    }

    log::info!(
        "Built height map mesh ({}x{} texels, {} triangles)",
        width,
        height,
        indices.len() / 3
    );

    MeshSource {
        vertices,
        indices,
        transform: Mat4::identity(),
        material_paths: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-4;

    fn checker_map(width: u32, height: u32) -> ImageData {
        let mut pixels = Vec::new();
        for i in 0..height {
            for j in 0..width {
                let value = if (i + j) % 2 == 0 { 0 } else { 255 };
                pixels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        ImageData::from_rgba(pixels, width, height)
    }

    #[test]
    fn test_grid_vertex_and_index_counts() {
        let mesh = build_height_map_mesh(&checker_map(4, 3));
        assert_eq!(mesh.vertices.len(), 12);
        // (4-1) x (3-1) quads, two triangles each
        assert_eq!(mesh.indices.len(), 3 * 2 * 6);
    }

    #[test]
    fn test_heights_follow_red_channel() {
        let mesh = build_height_map_mesh(&checker_map(2, 2));
        // texel 0 has red == 0, texel 1 has red == 255
        assert_relative_eq!(mesh.vertices[0].position[1], Y_SHIFT, epsilon = EPSILON);
        assert_relative_eq!(
            mesh.vertices[1].position[1],
            -(255.0 * Y_SCALE - Y_SHIFT),
            epsilon = EPSILON
        );
    }

    #[test]
    fn test_grid_is_centered() {
        let mesh = build_height_map_mesh(&checker_map(4, 4));
        let first = mesh.vertices.first().unwrap().position;
        let last = mesh.vertices.last().unwrap().position;
        assert_relative_eq!(first[0], -2.0, epsilon = EPSILON);
        assert_relative_eq!(first[2], -2.0, epsilon = EPSILON);
        assert_relative_eq!(last[0], 1.0, epsilon = EPSILON);
        assert_relative_eq!(last[2], 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_indices_stay_in_vertex_range() {
        let mesh = build_height_map_mesh(&checker_map(5, 4));
        let max = mesh.indices.iter().copied().max().unwrap();
        assert!((max as usize) < mesh.vertices.len());
    }
}
