//! Descriptor-set-layout builder (spec.md §4.6): turns a `Function`'s
//! ordered bindings into a `VkDescriptorSetLayout`.

use air_types::{BindingType, FunctionType, TextureAccessType};
use air_translate::FunctionInfo;
use ash::vk;

use crate::device::DeviceShared;
use crate::error::Result;

/// A layout plus the per-type descriptor counts it needs, so encoders can
/// size their transient pool / `gpu_descriptor` allocation request without
/// re-walking the binding list.
pub(crate) struct Built {
    pub layout: vk::DescriptorSetLayout,
    pub counts: gpu_descriptor::DescriptorTotalCount,
}

pub(crate) fn build(shared: &DeviceShared, info: &FunctionInfo) -> Result<Built> {
    let stage = stage_flags(info.function_type);
    let mut bindings = Vec::new();
    let mut counts = gpu_descriptor::DescriptorTotalCount::default();

    if info.has_buffer_bindings() {
        bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage),
        );
        counts.uniform_buffer += 1;
    }

    for binding in &info.bindings {
        match binding.ty {
            BindingType::Texture => {
                let ty = match binding.texture_access {
                    Some(TextureAccessType::Read) | Some(TextureAccessType::ReadWrite) | Some(TextureAccessType::Write) => {
                        vk::DescriptorType::STORAGE_IMAGE
                    }
                    _ => vk::DescriptorType::SAMPLED_IMAGE,
                };
                bindings.push(
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding.internal_index)
                        .descriptor_type(ty)
                        .descriptor_count(1)
                        .stage_flags(stage),
                );
                if ty == vk::DescriptorType::STORAGE_IMAGE {
                    counts.storage_image += 1;
                } else {
                    counts.sampled_image += 1;
                }
            }
            BindingType::Sampler => {
                bindings.push(
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(binding.internal_index)
                        .descriptor_type(vk::DescriptorType::SAMPLER)
                        .descriptor_count(1)
                        .stage_flags(stage),
                );
                counts.sampler += 1;
            }
            BindingType::Buffer | BindingType::VertexInput => {}
        }
    }

    let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
    let layout = unsafe { shared.raw.create_descriptor_set_layout(&create_info, None)? };
    Ok(Built { layout, counts })
}

fn stage_flags(function_type: FunctionType) -> vk::ShaderStageFlags {
    match function_type {
        FunctionType::Vertex => vk::ShaderStageFlags::VERTEX,
        FunctionType::Fragment => vk::ShaderStageFlags::FRAGMENT,
        FunctionType::Kernel => vk::ShaderStageFlags::COMPUTE,
    }
}
