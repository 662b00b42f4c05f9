//! Vertex format shared by every mesh-consuming pipeline

use ash::vk;
use bytemuck::{Pod, Zeroable};

/// Interleaved vertex: position, texture coordinate, normal. The byte layout
/// here is the contract with the vertex shaders; the attribute descriptions
/// below must stay in sync with it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex {
    /// Binding description for the single interleaved vertex buffer
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions for shader locations 0..2
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            // Position (location = 0)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            // Texture coordinate (location = 1)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32_SFLOAT,
                offset: 12,
            },
            // Normal (location = 2)
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 2,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 20,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_matches_struct_size() {
        assert_eq!(Vertex::binding_description().stride, 32);
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_attribute_offsets_match_field_layout() {
        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[2].offset, 20);
        assert_eq!(attributes[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attributes[1].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attributes[2].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn test_locations_are_dense() {
        let attributes = Vertex::attribute_descriptions();
        for (i, attribute) in attributes.iter().enumerate() {
            assert_eq!(attribute.location, i as u32);
            assert_eq!(attribute.binding, 0);
        }
    }
}
