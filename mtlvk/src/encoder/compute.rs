//! `ComputeCommandEncoder` (spec.md §4.10).

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::buffer::Buffer;
use crate::device::Device;
use crate::encoder::{descriptor_update, EncoderState, Retained, StageBindings, TouchedTexture};
use crate::error::{Error, Result};
use crate::pipeline::{ComputePipelineState, ThreadgroupSize};
use crate::sampler::SamplerState;
use crate::texture::Texture;

struct Inner {
    device: Arc<Device>,
    cmd: vk::CommandBuffer,
    current_pipeline: Option<Arc<ComputePipelineState>>,
    bindings: StageBindings,
    touched: Vec<TouchedTexture>,
    retained: Vec<Retained>,
}

impl EncoderState for Inner {
    fn pre_commit(&mut self) -> Vec<TouchedTexture> {
        std::mem::take(&mut self.touched)
    }

    fn take_retained(&mut self) -> Vec<Retained> {
        std::mem::take(&mut self.retained)
    }
}

/// Scoped to a single `CommandBuffer` (spec.md §4.10); unlike the render
/// encoder there is no render pass to open or close, so this is just a
/// thin wrapper over dispatch-time descriptor rewriting.
pub struct ComputeCommandEncoder {
    inner: Arc<Mutex<Inner>>,
}

impl ComputeCommandEncoder {
    pub(crate) fn new(device: Arc<Device>, cmd: vk::CommandBuffer) -> (ComputeCommandEncoder, Arc<Mutex<dyn EncoderState>>) {
        let inner = Arc::new(Mutex::new(Inner {
            device,
            cmd,
            current_pipeline: None,
            bindings: StageBindings::default(),
            touched: Vec::new(),
            retained: Vec::new(),
        }));
        let erased: Arc<Mutex<dyn EncoderState>> = inner.clone();
        (ComputeCommandEncoder { inner }, erased)
    }

    pub fn set_compute_pipeline_state(&self, pipeline: Arc<ComputePipelineState>) {
        let mut inner = self.inner.lock();
        inner.retained.push(Retained::ComputePipeline(pipeline.clone()));
        inner.current_pipeline = Some(pipeline);
    }

    pub fn set_buffer(&self, index: u32, buffer: Arc<Buffer>, offset: u64) {
        self.inner.lock().bindings.buffers.insert(index, (buffer, offset));
    }

    pub fn set_texture(&self, index: u32, texture: Arc<Texture>) {
        let mut inner = self.inner.lock();
        inner.touched.push(TouchedTexture { texture: texture.clone(), read_write: true });
        inner.bindings.textures.insert(index, texture);
    }

    pub fn set_sampler_state(&self, index: u32, sampler: Arc<SamplerState>) {
        self.inner.lock().bindings.samplers.insert(index, sampler);
    }

    /// `dispatchThreads(grid, threadsPerThreadgroup)` (spec.md §4.10): this
    /// implementation only supports the common case where the threadgroup
    /// size evenly divides the grid, matching `vkCmdDispatch`'s
    /// whole-group semantics; a partial last group needs a
    /// workgroup-size-aware shader rewrite this layer doesn't do.
    pub fn dispatch_threads(&self, grid: (u32, u32, u32), threads_per_threadgroup: ThreadgroupSize) -> Result<()> {
        if grid.0 % threads_per_threadgroup.0 != 0 || grid.1 % threads_per_threadgroup.1 != 0 || grid.2 % threads_per_threadgroup.2 != 0 {
            return Err(Error::Unsupported("dispatchThreads requires threadsPerThreadgroup to evenly divide the grid"));
        }
        let groups = (
            grid.0 / threads_per_threadgroup.0,
            grid.1 / threads_per_threadgroup.1,
            grid.2 / threads_per_threadgroup.2,
        );
        self.dispatch_threadgroups(groups, threads_per_threadgroup)
    }

    pub fn dispatch_threadgroups(&self, threadgroups: (u32, u32, u32), threads_per_threadgroup: ThreadgroupSize) -> Result<()> {
        let mut inner = self.inner.lock();
        let pipeline = inner.current_pipeline.clone().ok_or(Error::InvalidUsage("dispatch without a bound ComputePipelineState"))?;
        let vk_pipeline = pipeline.pipeline_for(threads_per_threadgroup)?;

        let device = inner.device.clone();
        let cmd = inner.cmd;
        let set = descriptor_update::write(&device, pipeline.set_layout, &pipeline.set_counts, pipeline.function.info(), &inner.bindings, pipeline.function.embedded_samplers(), &mut inner.retained)?;

        unsafe {
            device.shared.raw.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, vk_pipeline);
            device.shared.raw.cmd_bind_descriptor_sets(cmd, vk::PipelineBindPoint::COMPUTE, pipeline.layout, 0, &[set], &[]);
            device.shared.raw.cmd_dispatch(cmd, threadgroups.0, threadgroups.1, threadgroups.2);
        }
        Ok(())
    }

    pub fn use_resource(&self, texture: &Arc<Texture>, usage: air_types::ResourceUsage) {
        let mut inner = self.inner.lock();
        let access = crate::conv::resource_usage_to_vk_access(usage);
        let aspect = crate::conv::pixel_format_to_aspect(texture.descriptor.pixel_format);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::GENERAL)
            .new_layout(vk::ImageLayout::GENERAL)
            .src_access_mask(access)
            .dst_access_mask(access)
            .image(texture.raw_image())
            .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: 0, level_count: vk::REMAINING_MIP_LEVELS, base_array_layer: 0, layer_count: vk::REMAINING_ARRAY_LAYERS });
        unsafe {
            inner.device.shared.raw.cmd_pipeline_barrier(
                inner.cmd,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::PipelineStageFlags::COMPUTE_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }
        inner.touched.push(TouchedTexture { texture: texture.clone(), read_write: usage.contains(air_types::ResourceUsage::WRITE) });
    }

    pub fn end_encoding(&self) {
        // No Vulkan-side teardown; dispatches have already been recorded.
    }
}
