//! Pipeline state objects (spec.md §3, §4.6, §4.7).

mod compute;
mod descriptor_layout;
mod render;
mod vertex_descriptor;

pub use compute::{ComputePipelineState, ThreadgroupSize};
pub use render::{ColorAttachmentDescriptor, RenderPipelineDescriptor, RenderPipelineState};
pub use vertex_descriptor::{VertexAttributeDescriptor, VertexBufferLayoutDescriptor, VertexDescriptor, VertexStepFunction};
