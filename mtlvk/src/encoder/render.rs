//! `RenderCommandEncoder` (spec.md §4.9).

use std::sync::Arc;

use air_types::{CullMode, LoadAction, PrimitiveType, StoreAction, Winding};
use ash::vk;
use parking_lot::Mutex;

use crate::buffer::Buffer;
use crate::conv;
use crate::depth_stencil::DepthStencilState;
use crate::device::Device;
use crate::encoder::{descriptor_update, EncoderState, Retained, StageBindings, TouchedTexture};
use crate::error::{Error, Result};
use crate::pipeline::RenderPipelineState;
use crate::sampler::SamplerState;
use crate::texture::Texture;

#[derive(Clone)]
pub struct ColorAttachment {
    pub texture: Arc<Texture>,
    pub load_action: LoadAction,
    pub store_action: StoreAction,
}

pub struct RenderPassDescriptor {
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_attachment: Option<(Arc<Texture>, LoadAction, StoreAction)>,
    pub stencil_attachment: Option<(Arc<Texture>, LoadAction, StoreAction)>,
}

struct Inner {
    device: Arc<Device>,
    cmd: vk::CommandBuffer,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    color_targets: Vec<Arc<Texture>>,
    depth_target: Option<Arc<Texture>>,
    current_pipeline: Option<Arc<RenderPipelineState>>,
    vertex_bindings: StageBindings,
    fragment_bindings: StageBindings,
    retained: Vec<Retained>,
    ended: bool,
}

impl EncoderState for Inner {
    fn pre_commit(&mut self) -> Vec<TouchedTexture> {
        let mut touched: Vec<TouchedTexture> = self.color_targets.iter().map(|t| TouchedTexture { texture: t.clone(), read_write: true }).collect();
        if let Some(depth) = &self.depth_target {
            touched.push(TouchedTexture { texture: depth.clone(), read_write: true });
        }
        touched
    }

    fn take_retained(&mut self) -> Vec<Retained> {
        std::mem::take(&mut self.retained)
    }
}

/// Scoped to a single `CommandBuffer`; owns the Vulkan render pass and
/// framebuffer it created at open time (spec.md §3, §4.9).
pub struct RenderCommandEncoder {
    inner: Arc<Mutex<Inner>>,
}

impl RenderCommandEncoder {
    pub(crate) fn new(device: Arc<Device>, cmd: vk::CommandBuffer, descriptor: RenderPassDescriptor) -> Result<(RenderCommandEncoder, Arc<Mutex<dyn EncoderState>>)> {
        let shared = &device.shared;
        let (width, height) = descriptor
            .color_attachments
            .first()
            .map(|c| (c.texture.descriptor.width, c.texture.descriptor.height))
            .or_else(|| descriptor.depth_attachment.as_ref().map(|(t, ..)| (t.descriptor.width, t.descriptor.height)))
            .ok_or(Error::InvalidUsage("render pass needs at least one attachment"))?;

        let mut attachments = Vec::new();
        let mut views = Vec::new();
        let mut color_refs = Vec::new();
        let mut color_targets = Vec::new();
        for attachment in &descriptor.color_attachments {
            let format = conv::pixel_format_to_vk(attachment.texture.descriptor.pixel_format)?;
            color_refs.push(vk::AttachmentReference::default().attachment(attachments.len() as u32).layout(vk::ImageLayout::GENERAL));
            attachments.push(attachment_description(format, attachment.load_action, attachment.store_action, false));
            views.push(attachment.texture.raw_view());
            color_targets.push(attachment.texture.clone());
        }

        let mut depth_ref = vk::AttachmentReference::default();
        let mut depth_target = None;
        if let Some((texture, load, store)) = &descriptor.depth_attachment {
            let format = conv::pixel_format_to_vk(texture.descriptor.pixel_format)?;
            depth_ref = vk::AttachmentReference::default().attachment(attachments.len() as u32).layout(vk::ImageLayout::GENERAL);
            attachments.push(attachment_description(format, *load, *store, true));
            views.push(texture.raw_view());
            depth_target = Some(texture.clone());
        }

        let mut subpass = vk::SubpassDescription::default().pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS).color_attachments(&color_refs);
        if depth_target.is_some() {
            subpass = subpass.depth_stencil_attachment(&depth_ref);
        }
        let rp_info = vk::RenderPassCreateInfo::default().attachments(&attachments).subpasses(std::slice::from_ref(&subpass));
        let render_pass = unsafe { shared.raw.create_render_pass(&rp_info, None)? };

        let fb_info = vk::FramebufferCreateInfo::default().render_pass(render_pass).attachments(&views).width(width).height(height).layers(1);
        let framebuffer = match unsafe { shared.raw.create_framebuffer(&fb_info, None) } {
            Ok(fb) => fb,
            Err(e) => {
                unsafe { shared.raw.destroy_render_pass(render_pass, None) };
                return Err(e.into());
            }
        };

        let clear_values: Vec<vk::ClearValue> = (0..attachments.len()).map(|_| vk::ClearValue { color: vk::ClearColorValue { float32: [0.0; 4] } }).collect();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: vk::Extent2D { width, height } })
            .clear_values(&clear_values);
        unsafe {
            shared.raw.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);

            // Y-flipped viewport so Metal's top-left origin maps onto
            // Vulkan's bottom-left-origin clip space (spec.md §4.9).
            let viewport = vk::Viewport { x: 0.0, y: height as f32, width: width as f32, height: -(height as f32), min_depth: 0.0, max_depth: 1.0 };
            shared.raw.cmd_set_viewport_with_count(cmd, &[viewport]);
            let scissor = vk::Rect2D { offset: vk::Offset2D { x: 0, y: 0 }, extent: vk::Extent2D { width, height } };
            shared.raw.cmd_set_scissor_with_count(cmd, &[scissor]);
            shared.raw.cmd_set_cull_mode(cmd, conv::cull_mode_to_vk(CullMode::None));
            shared.raw.cmd_set_front_face(cmd, conv::winding_to_vk(Winding::Clockwise));
            shared.raw.cmd_set_depth_test_enable(cmd, false);
            shared.raw.cmd_set_depth_write_enable(cmd, false);
            shared.raw.cmd_set_stencil_test_enable(cmd, false);
            shared.raw.cmd_set_blend_constants(cmd, &[0.0, 0.0, 0.0, 0.0]);
            shared.raw.cmd_set_rasterizer_discard_enable(cmd, false);
        }

        let inner = Arc::new(Mutex::new(Inner {
            device,
            cmd,
            render_pass,
            framebuffer,
            width,
            height,
            color_targets,
            depth_target,
            current_pipeline: None,
            vertex_bindings: StageBindings::default(),
            fragment_bindings: StageBindings::default(),
            retained: Vec::new(),
            ended: false,
        }));
        let erased: Arc<Mutex<dyn EncoderState>> = inner.clone();
        Ok((RenderCommandEncoder { inner }, erased))
    }

    /// `setRenderPipelineState` (spec.md §4.9): the pipeline's three
    /// topology-class pipelines were already built against a compatible
    /// render pass at construction, so binding is just a state update.
    pub fn set_render_pipeline_state(&self, pipeline: Arc<RenderPipelineState>) {
        let mut inner = self.inner.lock();
        inner.retained.push(Retained::RenderPipeline(pipeline.clone()));
        inner.current_pipeline = Some(pipeline);
    }

    pub fn set_vertex_buffer(&self, index: u32, buffer: Arc<Buffer>, offset: u64) {
        self.inner.lock().vertex_bindings.buffers.insert(index, (buffer, offset));
    }

    pub fn set_vertex_texture(&self, index: u32, texture: Arc<Texture>) {
        self.inner.lock().vertex_bindings.textures.insert(index, texture);
    }

    pub fn set_vertex_sampler_state(&self, index: u32, sampler: Arc<SamplerState>) {
        self.inner.lock().vertex_bindings.samplers.insert(index, sampler);
    }

    pub fn set_fragment_buffer(&self, index: u32, buffer: Arc<Buffer>, offset: u64) {
        self.inner.lock().fragment_bindings.buffers.insert(index, (buffer, offset));
    }

    pub fn set_fragment_texture(&self, index: u32, texture: Arc<Texture>) {
        self.inner.lock().fragment_bindings.textures.insert(index, texture);
    }

    pub fn set_fragment_sampler_state(&self, index: u32, sampler: Arc<SamplerState>) {
        self.inner.lock().fragment_bindings.samplers.insert(index, sampler);
    }

    pub fn set_depth_stencil_state(&self, state: &DepthStencilState) {
        let inner = self.inner.lock();
        let shared = &inner.device.shared;
        unsafe {
            shared.raw.cmd_set_depth_test_enable(inner.cmd, true);
            shared.raw.cmd_set_depth_write_enable(inner.cmd, state.depth_write_enabled);
            shared.raw.cmd_set_depth_compare_op(inner.cmd, conv::compare_function_to_vk(state.depth_compare_function));
            let stencil_enabled = state.front_face_stencil.is_some() || state.back_face_stencil.is_some();
            shared.raw.cmd_set_stencil_test_enable(inner.cmd, stencil_enabled);
            if let Some(front) = &state.front_face_stencil {
                set_stencil_face(shared, inner.cmd, vk::StencilFaceFlags::FRONT, front);
            }
            if let Some(back) = &state.back_face_stencil {
                set_stencil_face(shared, inner.cmd, vk::StencilFaceFlags::BACK, back);
            }
        }
    }

    pub fn set_cull_mode(&self, mode: CullMode) {
        let inner = self.inner.lock();
        unsafe { inner.device.shared.raw.cmd_set_cull_mode(inner.cmd, conv::cull_mode_to_vk(mode)) };
    }

    pub fn set_viewport(&self, x: f32, y: f32, width: f32, height: f32) {
        let inner = self.inner.lock();
        let viewport = vk::Viewport { x, y: y + height, width, height: -height, min_depth: 0.0, max_depth: 1.0 };
        unsafe { inner.device.shared.raw.cmd_set_viewport_with_count(inner.cmd, &[viewport]) };
    }

    /// `draw{Primitives|IndexedPrimitives}` (spec.md §4.9): selects the
    /// topology-class pipeline, binds it, rewrites descriptors, binds
    /// vertex buffers by walking `vertexInputBindings`, and issues the
    /// draw.
    pub fn draw_primitives(&self, primitive_type: PrimitiveType, vertex_start: u32, vertex_count: u32, instance_count: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        self.prepare_draw(&mut inner, primitive_type)?;
        unsafe { inner.device.shared.raw.cmd_draw(inner.cmd, vertex_count, instance_count.max(1), vertex_start, 0) };
        Ok(())
    }

    pub fn draw_indexed_primitives(&self, primitive_type: PrimitiveType, index_count: u32, index_buffer: &Buffer, index_buffer_offset: u64, index_type: air_types::IndexType, instance_count: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        self.prepare_draw(&mut inner, primitive_type)?;
        unsafe {
            inner.device.shared.raw.cmd_bind_index_buffer(inner.cmd, index_buffer.raw, index_buffer_offset, conv::index_type_to_vk(index_type));
            inner.device.shared.raw.cmd_draw_indexed(inner.cmd, index_count, instance_count.max(1), 0, 0, 0);
        }
        Ok(())
    }

    fn prepare_draw(&self, inner: &mut Inner, primitive_type: PrimitiveType) -> Result<()> {
        let pipeline = inner.current_pipeline.clone().ok_or(Error::InvalidUsage("draw without a bound RenderPipelineState"))?;
        let class = conv::primitive_type_to_topology_class(primitive_type);
        let vk_pipeline = pipeline.pipeline_for(class);

        let device = inner.device.clone();
        let cmd = inner.cmd;
        unsafe {
            device.shared.raw.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, vk_pipeline);
            device.shared.raw.cmd_set_primitive_topology(cmd, conv::primitive_type_to_vk(primitive_type));
        }

        let vertex_set = descriptor_update::write(&device, pipeline.vertex_set_layout, &pipeline.vertex_set_counts, pipeline.vertex_function.info(), &inner.vertex_bindings, pipeline.vertex_function.embedded_samplers(), &mut inner.retained)?;
        let fragment_set = descriptor_update::write(&device, pipeline.fragment_set_layout, &pipeline.fragment_set_counts, pipeline.fragment_function.info(), &inner.fragment_bindings, pipeline.fragment_function.embedded_samplers(), &mut inner.retained)?;
        unsafe {
            device.shared.raw.cmd_bind_descriptor_sets(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline.layout, 0, &[vertex_set, fragment_set], &[]);
        }

        let mut vk_buffers = Vec::with_capacity(pipeline.vertex_input_bindings.len());
        let mut offsets = Vec::with_capacity(pipeline.vertex_input_bindings.len());
        for &metal_index in &pipeline.vertex_input_bindings {
            if let Some((buffer, offset)) = inner.vertex_bindings.buffers.get(&metal_index) {
                vk_buffers.push(buffer.raw);
                offsets.push(*offset);
            } else {
                vk_buffers.push(vk::Buffer::null());
                offsets.push(0);
            }
        }
        if !vk_buffers.is_empty() {
            unsafe { device.shared.raw.cmd_bind_vertex_buffers(cmd, 0, &vk_buffers, &offsets) };
        }
        Ok(())
    }

    /// `useResource`: translates the Metal usage/stages masks into a
    /// `vkCmdPipelineBarrier` (spec.md §4.9).
    pub fn use_resource(&self, texture: &Arc<Texture>, usage: air_types::ResourceUsage, stages: air_types::RenderStages) {
        let inner = self.inner.lock();
        let access = conv::resource_usage_to_vk_access(usage);
        let stage_flags = conv::render_stages_to_vk(stages);
        let aspect = conv::pixel_format_to_aspect(texture.descriptor.pixel_format);
        let barrier = vk::ImageMemoryBarrier::default()
            .old_layout(vk::ImageLayout::GENERAL)
            .new_layout(vk::ImageLayout::GENERAL)
            .src_access_mask(access)
            .dst_access_mask(access)
            .image(texture.raw_image())
            .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: 0, level_count: vk::REMAINING_MIP_LEVELS, base_array_layer: 0, layer_count: vk::REMAINING_ARRAY_LAYERS });
        unsafe {
            inner.device.shared.raw.cmd_pipeline_barrier(inner.cmd, stage_flags, stage_flags, vk::DependencyFlags::empty(), &[], &[], &[barrier]);
        }
    }

    pub fn end_encoding(&self) {
        let mut inner = self.inner.lock();
        if inner.ended {
            return;
        }
        unsafe { inner.device.shared.raw.cmd_end_render_pass(inner.cmd) };
        inner.ended = true;
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let raw = &self.device.shared.raw;
        unsafe {
            raw.destroy_framebuffer(self.framebuffer, None);
            raw.destroy_render_pass(self.render_pass, None);
        }
    }
}

fn set_stencil_face(shared: &crate::device::DeviceShared, cmd: vk::CommandBuffer, face: vk::StencilFaceFlags, descriptor: &crate::depth_stencil::StencilDescriptor) {
    unsafe {
        shared.raw.cmd_set_stencil_op(
            cmd,
            face,
            conv::stencil_operation_to_vk(descriptor.stencil_failure_operation),
            conv::stencil_operation_to_vk(descriptor.depth_stencil_pass_operation),
            conv::stencil_operation_to_vk(descriptor.depth_failure_operation),
            conv::compare_function_to_vk(descriptor.stencil_compare_function),
        );
        shared.raw.cmd_set_stencil_compare_mask(cmd, face, descriptor.read_mask);
        shared.raw.cmd_set_stencil_write_mask(cmd, face, descriptor.write_mask);
    }
}

fn attachment_description(format: vk::Format, load: LoadAction, store: StoreAction, depth: bool) -> vk::AttachmentDescription {
    let load_op = match load {
        LoadAction::DontCare => vk::AttachmentLoadOp::DONT_CARE,
        LoadAction::Load => vk::AttachmentLoadOp::LOAD,
        LoadAction::Clear => vk::AttachmentLoadOp::CLEAR,
    };
    let store_op = match store {
        StoreAction::DontCare => vk::AttachmentStoreOp::DONT_CARE,
        StoreAction::Store | StoreAction::StoreAndMultisampleResolve => vk::AttachmentStoreOp::STORE,
        StoreAction::MultisampleResolve => vk::AttachmentStoreOp::DONT_CARE,
    };
    let initial_layout = if load == LoadAction::Load { vk::ImageLayout::GENERAL } else { vk::ImageLayout::UNDEFINED };
    let mut desc = vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(load_op)
        .store_op(store_op)
        .initial_layout(initial_layout)
        .final_layout(vk::ImageLayout::GENERAL);
    if depth {
        desc = desc.stencil_load_op(load_op).stencil_store_op(store_op);
    }
    desc
}
