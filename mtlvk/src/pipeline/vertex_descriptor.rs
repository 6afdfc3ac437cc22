//! Metal-style vertex descriptor, translated into a Vulkan vertex input
//! state by [`super::render::vertex_input_state`] (spec.md §4.7).

use std::collections::BTreeMap;

use air_types::VertexFormat;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexStepFunction {
    PerVertex,
    PerInstance,
}

#[derive(Clone, Copy, Debug)]
pub struct VertexAttributeDescriptor {
    /// The Metal-side binding slot this attribute pulls its buffer from.
    pub buffer_index: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct VertexBufferLayoutDescriptor {
    pub buffer_index: u32,
    pub stride: u32,
    pub step_function: VertexStepFunction,
}

#[derive(Clone, Debug, Default)]
pub struct VertexDescriptor {
    pub attributes: Vec<(u32, VertexAttributeDescriptor)>,
    pub layouts: Vec<VertexBufferLayoutDescriptor>,
}

impl VertexDescriptor {
    /// Assigns each distinct Metal `buffer_index` seen across attributes and
    /// layouts a compacted Vulkan binding number, smallest Metal index
    /// first. Returns the mapping as `vulkan -> metal` (spec.md §4.7).
    pub(crate) fn compact_bindings(&self) -> Vec<u32> {
        let mut metal_indices: BTreeMap<u32, ()> = BTreeMap::new();
        for (_, attr) in &self.attributes {
            metal_indices.insert(attr.buffer_index, ());
        }
        for layout in &self.layouts {
            metal_indices.insert(layout.buffer_index, ());
        }
        metal_indices.into_keys().collect()
    }
}
