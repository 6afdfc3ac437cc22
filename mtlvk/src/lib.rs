//! A command-buffer-based GPU API modeled on Apple's Metal, executed atop
//! Vulkan 1.3 (spec.md §1-§3).
//!
//! Grounded on `wgpu-hal::vulkan`'s device/queue/command-encoder split,
//! generalized from wgpu's WebGPU-shaped surface to Metal's explicit
//! `CommandBuffer`/`Encoder` recording model and its per-texture
//! synchronization (spec.md §5).

mod alloc;
mod conv;
mod descriptor;
mod loader;

pub mod buffer;
pub mod command_buffer;
pub mod depth_stencil;
pub mod device;
pub mod encoder;
pub mod error;
pub mod library;
pub mod pipeline;
pub mod queue;
pub mod sampler;
pub mod swapchain;
pub mod texture;

pub use buffer::Buffer;
pub use command_buffer::CommandBuffer;
pub use depth_stencil::{DepthStencilState, StencilDescriptor};
pub use device::{Device, DeviceRegistryConfig};
pub use encoder::{BlitCommandEncoder, ColorAttachment, ComputeCommandEncoder, RenderCommandEncoder, RenderPassDescriptor};
pub use error::{Error, Result};
pub use library::{Function, Library};
pub use pipeline::{ComputePipelineState, RenderPipelineDescriptor, RenderPipelineState, ThreadgroupSize, VertexDescriptor};
pub use queue::CommandQueue;
pub use sampler::{SamplerDescriptor, SamplerState};
pub use swapchain::{Drawable, Layer};
pub use texture::{Texture, TextureDescriptor};

pub use loader::vulkan_available;
