//! Command encoders (spec.md §4.9-§4.11): render, compute, and blit.
//!
//! Grounded on `wgpu-hal::vulkan::CommandEncoder`'s render-pass/barrier
//! bookkeeping, generalized to Metal's three encoder kinds and its
//! per-draw descriptor-rewrite binding model instead of wgpu's persistent
//! bind groups.

mod blit;
mod compute;
pub(crate) mod descriptor_update;
mod render;

pub use blit::BlitCommandEncoder;
pub use compute::ComputeCommandEncoder;
pub use render::{ColorAttachment, RenderCommandEncoder, RenderPassDescriptor};

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::pipeline::{ComputePipelineState, RenderPipelineState};
use crate::sampler::SamplerState;
use crate::texture::Texture;

/// A resource kept alive until the owning `CommandBuffer` completes, per
/// spec.md §3's "CommandBuffer retains resources strongly".
pub(crate) enum Retained {
    Buffer(Arc<Buffer>),
    Texture(Arc<Texture>),
    Sampler(Arc<SamplerState>),
    RenderPipeline(Arc<RenderPipelineState>),
    ComputePipeline(Arc<ComputePipelineState>),
    DescriptorSet(gpu_descriptor::DescriptorSet<ash::vk::DescriptorSet>),
}

/// A texture an encoder touched, with whether that touch was a write.
pub(crate) struct TouchedTexture {
    pub texture: Arc<Texture>,
    pub read_write: bool,
}

/// Per-stage resource bindings, keyed by the Metal-visible (external)
/// binding index the caller addressed (spec.md §4.9's `FunctionResources`).
#[derive(Default)]
pub(crate) struct StageBindings {
    pub buffers: HashMap<u32, (Arc<Buffer>, u64)>,
    pub textures: HashMap<u32, Arc<Texture>>,
    pub samplers: HashMap<u32, Arc<SamplerState>>,
}

/// Implemented by every encoder's shared inner state so `CommandBuffer`'s
/// commit can run the pre-commit hook without knowing the concrete encoder
/// kind (spec.md §4.8 step 2).
pub(crate) trait EncoderState: Send {
    fn pre_commit(&mut self) -> Vec<TouchedTexture>;

    /// Hands the encoder's retained resources to the `CommandBuffer` so they
    /// can be kept alive (and, for descriptor sets, freed) until the buffer
    /// completes rather than at `endEncoding` (spec.md §3, §4.8).
    fn take_retained(&mut self) -> Vec<Retained>;
}
