//! `RenderPipelineState` (spec.md §3, §4.7): a cached triplet of Vulkan
//! pipelines, one per primitive topology class, sharing a layout and two
//! descriptor-set layouts (set 0 = vertex stage, set 1 = fragment stage).

use std::sync::Arc;

use air_types::PixelFormat;
use ash::vk;

use crate::conv;
use crate::device::{Device, DeviceShared};
use crate::error::{Error, Result};
use crate::library::Function;
use crate::pipeline::descriptor_layout;
use crate::pipeline::vertex_descriptor::{VertexDescriptor, VertexStepFunction};

#[derive(Clone, Copy, Debug)]
pub struct ColorAttachmentDescriptor {
    pub pixel_format: PixelFormat,
    pub blending_enabled: bool,
    pub src_rgb_blend_factor: air_types::BlendFactor,
    pub dst_rgb_blend_factor: air_types::BlendFactor,
    pub rgb_blend_operation: air_types::BlendOperation,
    pub src_alpha_blend_factor: air_types::BlendFactor,
    pub dst_alpha_blend_factor: air_types::BlendFactor,
    pub alpha_blend_operation: air_types::BlendOperation,
    pub write_mask: air_types::ColorWriteMask,
}

pub struct RenderPipelineDescriptor {
    pub vertex_function: Function,
    pub fragment_function: Function,
    pub vertex_descriptor: Option<VertexDescriptor>,
    pub color_attachments: Vec<ColorAttachmentDescriptor>,
    pub depth_attachment_format: Option<PixelFormat>,
    pub stencil_attachment_format: Option<PixelFormat>,
}

const DYNAMIC_STATES: &[vk::DynamicState] = &[
    vk::DynamicState::VIEWPORT_WITH_COUNT,
    vk::DynamicState::SCISSOR_WITH_COUNT,
    vk::DynamicState::PRIMITIVE_TOPOLOGY,
    vk::DynamicState::CULL_MODE,
    vk::DynamicState::FRONT_FACE,
    vk::DynamicState::DEPTH_BIAS,
    vk::DynamicState::DEPTH_BIAS_ENABLE,
    vk::DynamicState::DEPTH_TEST_ENABLE,
    vk::DynamicState::DEPTH_WRITE_ENABLE,
    vk::DynamicState::DEPTH_BOUNDS,
    vk::DynamicState::DEPTH_BOUNDS_TEST_ENABLE,
    vk::DynamicState::DEPTH_COMPARE_OP,
    vk::DynamicState::STENCIL_OP,
    vk::DynamicState::STENCIL_COMPARE_MASK,
    vk::DynamicState::STENCIL_WRITE_MASK,
    vk::DynamicState::STENCIL_REFERENCE,
    vk::DynamicState::STENCIL_TEST_ENABLE,
    vk::DynamicState::BLEND_CONSTANTS,
    vk::DynamicState::RASTERIZER_DISCARD_ENABLE,
];

/// One pipeline per topology class, indexed by [`conv::topology_class_slot`].
const TOPOLOGY_CLASS_COUNT: usize = 3;

pub struct RenderPipelineState {
    device: Arc<Device>,
    pub(crate) vertex_function: Function,
    pub(crate) fragment_function: Function,
    pub(crate) vertex_set_layout: vk::DescriptorSetLayout,
    pub(crate) fragment_set_layout: vk::DescriptorSetLayout,
    pub(crate) vertex_set_counts: gpu_descriptor::DescriptorTotalCount,
    pub(crate) fragment_set_counts: gpu_descriptor::DescriptorTotalCount,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) pipelines: [vk::Pipeline; TOPOLOGY_CLASS_COUNT],
    /// `vertexInputBindings[vulkan] = metal`, for rebinding vertex buffers
    /// at draw time against the compacted Vulkan binding indices.
    pub(crate) vertex_input_bindings: Vec<u32>,
    compat_render_pass: vk::RenderPass,
}

impl RenderPipelineState {
    pub fn new(device: &Arc<Device>, descriptor: RenderPipelineDescriptor) -> Result<Arc<RenderPipelineState>> {
        let shared = &device.shared;

        let vertex_built = descriptor_layout::build(shared, descriptor.vertex_function.info())?;
        let fragment_built = descriptor_layout::build(shared, descriptor.fragment_function.info())?;
        let (vertex_set_layout, vertex_set_counts) = (vertex_built.layout, vertex_built.counts);
        let (fragment_set_layout, fragment_set_counts) = (fragment_built.layout, fragment_built.counts);
        let set_layouts = [vertex_set_layout, fragment_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = match unsafe { shared.raw.create_pipeline_layout(&layout_info, None) } {
            Ok(l) => l,
            Err(e) => {
                destroy_set_layouts(shared, &set_layouts);
                return Err(e.into());
            }
        };

        let compat_render_pass = match build_compat_render_pass(shared, &descriptor) {
            Ok(rp) => rp,
            Err(e) => {
                destroy_set_layouts(shared, &set_layouts);
                unsafe { shared.raw.destroy_pipeline_layout(layout, None) };
                return Err(e);
            }
        };

        let vertex_input_bindings = descriptor.vertex_descriptor.as_ref().map(VertexDescriptor::compact_bindings).unwrap_or_default();

        let build = || -> Result<[vk::Pipeline; TOPOLOGY_CLASS_COUNT]> {
            build_pipelines(shared, &descriptor, layout, compat_render_pass, &vertex_input_bindings)
        };
        let pipelines = match build() {
            Ok(p) => p,
            Err(e) => {
                destroy_set_layouts(shared, &set_layouts);
                unsafe {
                    shared.raw.destroy_pipeline_layout(layout, None);
                    shared.raw.destroy_render_pass(compat_render_pass, None);
                }
                return Err(e);
            }
        };

        Ok(Arc::new(RenderPipelineState {
            device: device.clone(),
            vertex_function: descriptor.vertex_function,
            fragment_function: descriptor.fragment_function,
            vertex_set_layout,
            fragment_set_layout,
            vertex_set_counts,
            fragment_set_counts,
            layout,
            pipelines,
            vertex_input_bindings,
            compat_render_pass,
        }))
    }

    /// `setRenderPipelineState`'s compatibility check (spec.md §4.8). The
    /// three pipelines are built eagerly at construction against an
    /// internal compatible render pass, so binding against any render pass
    /// with the same attachment formats is always valid; nothing further
    /// to create.
    pub(crate) fn pipeline_for(&self, class: air_types::PrimitiveTopologyClass) -> vk::Pipeline {
        self.pipelines[conv::topology_class_slot(class)]
    }
}

impl Drop for RenderPipelineState {
    fn drop(&mut self) {
        let raw = &self.device.shared.raw;
        unsafe {
            for pipeline in self.pipelines {
                raw.destroy_pipeline(pipeline, None);
            }
            raw.destroy_render_pass(self.compat_render_pass, None);
            raw.destroy_pipeline_layout(self.layout, None);
            raw.destroy_descriptor_set_layout(self.vertex_set_layout, None);
            raw.destroy_descriptor_set_layout(self.fragment_set_layout, None);
        }
    }
}

fn destroy_set_layouts(shared: &DeviceShared, layouts: &[vk::DescriptorSetLayout]) {
    for &layout in layouts {
        unsafe { shared.raw.destroy_descriptor_set_layout(layout, None) };
    }
}

fn build_compat_render_pass(shared: &DeviceShared, descriptor: &RenderPipelineDescriptor) -> Result<vk::RenderPass> {
    let mut attachments = Vec::new();
    let mut color_refs = Vec::new();
    for color in &descriptor.color_attachments {
        let format = conv::pixel_format_to_vk(color.pixel_format)?;
        color_refs.push(vk::AttachmentReference::default().attachment(attachments.len() as u32).layout(vk::ImageLayout::GENERAL));
        attachments.push(
            vk::AttachmentDescription::default()
                .format(format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::STORE)
                .initial_layout(vk::ImageLayout::GENERAL)
                .final_layout(vk::ImageLayout::GENERAL),
        );
    }

    let mut subpass = vk::SubpassDescription::default().pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS).color_attachments(&color_refs);
    let depth_ref;
    if let Some(format) = descriptor.depth_attachment_format {
        let vk_format = conv::pixel_format_to_vk(format)?;
        depth_ref = vk::AttachmentReference::default().attachment(attachments.len() as u32).layout(vk::ImageLayout::GENERAL);
        attachments.push(
            vk::AttachmentDescription::default()
                .format(vk_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::STORE)
                .initial_layout(vk::ImageLayout::GENERAL)
                .final_layout(vk::ImageLayout::GENERAL),
        );
        subpass = subpass.depth_stencil_attachment(&depth_ref);
    }

    let info = vk::RenderPassCreateInfo::default().attachments(&attachments).subpasses(std::slice::from_ref(&subpass));
    Ok(unsafe { shared.raw.create_render_pass(&info, None)? })
}

fn build_pipelines(
    shared: &DeviceShared,
    descriptor: &RenderPipelineDescriptor,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    vertex_input_bindings: &[u32],
) -> Result<[vk::Pipeline; TOPOLOGY_CLASS_COUNT]> {
    let entry = std::ffi::CStr::from_bytes_with_nul(b"main\0").expect("valid C string");
    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(descriptor.vertex_function.module())
            .name(entry),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(descriptor.fragment_function.module())
            .name(entry),
    ];

    let (bindings, attributes) = vertex_input_state(descriptor.vertex_descriptor.as_ref(), vertex_input_bindings)?;
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&bindings)
        .vertex_attribute_descriptions(&attributes);

    let viewport_state = vk::PipelineViewportStateCreateInfo::default();

    let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0);

    let multisample = vk::PipelineMultisampleStateCreateInfo::default().rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default();

    let attachment_blends: Vec<vk::PipelineColorBlendAttachmentState> = descriptor
        .color_attachments
        .iter()
        .map(|color| {
            vk::PipelineColorBlendAttachmentState::default()
                .blend_enable(color.blending_enabled)
                .src_color_blend_factor(conv::blend_factor_to_vk(color.src_rgb_blend_factor))
                .dst_color_blend_factor(conv::blend_factor_to_vk(color.dst_rgb_blend_factor))
                .color_blend_op(conv::blend_operation_to_vk(color.rgb_blend_operation))
                .src_alpha_blend_factor(conv::blend_factor_to_vk(color.src_alpha_blend_factor))
                .dst_alpha_blend_factor(conv::blend_factor_to_vk(color.dst_alpha_blend_factor))
                .alpha_blend_op(conv::blend_operation_to_vk(color.alpha_blend_operation))
                .color_write_mask(conv::color_write_mask_to_vk(color.write_mask))
        })
        .collect();
    let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&attachment_blends);

    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(DYNAMIC_STATES);

    let mut pipelines = [vk::Pipeline::null(); TOPOLOGY_CLASS_COUNT];
    let topologies = [vk::PrimitiveTopology::POINT_LIST, vk::PrimitiveTopology::LINE_LIST, vk::PrimitiveTopology::TRIANGLE_LIST];

    for (slot, &topology) in topologies.iter().enumerate() {
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default().topology(topology);
        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let result = unsafe { shared.raw.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None) };
        match result {
            Ok(created) => pipelines[slot] = created[0],
            Err((_, result)) => {
                for pipeline in pipelines.into_iter().take(slot) {
                    unsafe { shared.raw.destroy_pipeline(pipeline, None) };
                }
                return Err(Error::from(result));
            }
        }
    }

    Ok(pipelines)
}

fn vertex_input_state(
    descriptor: Option<&VertexDescriptor>,
    vulkan_to_metal: &[u32],
) -> Result<(Vec<vk::VertexInputBindingDescription>, Vec<vk::VertexInputAttributeDescription>)> {
    let Some(descriptor) = descriptor else {
        return Ok((Vec::new(), Vec::new()));
    };

    let metal_to_vulkan = |metal: u32| -> u32 {
        vulkan_to_metal.iter().position(|&m| m == metal).expect("vertex buffer index must appear in compacted binding map") as u32
    };

    let mut bindings = Vec::with_capacity(descriptor.layouts.len());
    for layout in &descriptor.layouts {
        let input_rate = match layout.step_function {
            VertexStepFunction::PerVertex => vk::VertexInputRate::VERTEX,
            VertexStepFunction::PerInstance => vk::VertexInputRate::INSTANCE,
        };
        bindings.push(
            vk::VertexInputBindingDescription::default()
                .binding(metal_to_vulkan(layout.buffer_index))
                .stride(layout.stride)
                .input_rate(input_rate),
        );
    }

    let mut attributes = Vec::with_capacity(descriptor.attributes.len());
    for (location, attribute) in &descriptor.attributes {
        attributes.push(
            vk::VertexInputAttributeDescription::default()
                .location(*location)
                .binding(metal_to_vulkan(attribute.buffer_index))
                .format(conv::vertex_format_to_vk(attribute.format)?)
                .offset(attribute.offset),
        );
    }

    Ok((bindings, attributes))
}
