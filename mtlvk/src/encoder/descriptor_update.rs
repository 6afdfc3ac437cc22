//! Per-draw/per-dispatch descriptor set assembly (spec.md §4.9 "Descriptor
//! update on each draw"): one allocation + write per stage, backed by the
//! encoder's transient `gpu_descriptor` pool.

use std::sync::Arc;

use air_types::{BindingType, ResourceOptions, StorageMode, TextureAccessType};
use air_translate::FunctionInfo;
use ash::vk;
use gpu_descriptor::{DescriptorSetLayoutCreateFlags, DescriptorTotalCount};

use crate::buffer::Buffer;
use crate::device::Device;
use crate::encoder::{Retained, StageBindings};
use crate::error::Result;
use crate::sampler::SamplerState;

/// Allocates one descriptor set from the device's shared `gpu_descriptor`
/// allocator matching `layout`/`counts`, writes the function's
/// buffer-address UBO (if any) plus its texture/sampler bindings, and
/// returns the raw set. Everything touched — the address buffer, the
/// referenced textures/samplers, and the `gpu_descriptor` wrapper itself —
/// is pushed onto `retained` so it outlives the draw, and is only freed
/// when the owning `CommandBuffer` completes (spec.md §4.9, §3).
pub(crate) fn write(
    device: &Arc<Device>,
    layout: vk::DescriptorSetLayout,
    counts: &DescriptorTotalCount,
    info: &FunctionInfo,
    bindings: &StageBindings,
    embedded_samplers: &[Arc<SamplerState>],
    retained: &mut Vec<Retained>,
) -> Result<vk::DescriptorSet> {
    let shared = &device.shared;
    let descriptor_device = shared.descriptor_device();
    let mut allocated = unsafe {
        device
            .desc_allocator
            .lock()
            .allocate(&descriptor_device, &layout, DescriptorSetLayoutCreateFlags::empty(), counts, 1)
            .map_err(crate::error::Error::DescriptorAllocationFailed)?
    };
    let set = allocated.pop().expect("allocate(1) returns exactly one set");
    let raw_set = *set.raw();

    let mut writes = Vec::new();
    let mut buffer_infos = Vec::new();
    let mut image_infos = Vec::new();

    let address_buffer = if info.has_buffer_bindings() {
        // Indexed by `external_index`, not iteration order: the shader
        // fetches its address via `OpAccessChain` at word offset
        // `8 * external_index` (spec.md §4.6, §8), so non-contiguous
        // external indices would otherwise land at the wrong offset.
        let count = info.buffer_bindings().map(|binding| binding.external_index).max().map(|m| m + 1).unwrap_or(0).max(1);
        let mut addresses: Vec<u64> = vec![0; count as usize];
        for binding in info.buffer_bindings() {
            if let Some((buf, offset)) = bindings.buffers.get(&binding.external_index) {
                addresses[binding.external_index as usize] = buf.gpu_address() + offset;
            }
        }
        let bytes: &[u8] = unsafe { std::slice::from_raw_parts(addresses.as_ptr().cast::<u8>(), std::mem::size_of_val(addresses.as_slice())) };
        let mut options = ResourceOptions::default();
        options.storage_mode = StorageMode::Shared;
        Some(Buffer::with_contents(device, bytes, options)?)
    } else {
        None
    };

    if let Some(buf) = &address_buffer {
        buffer_infos.push(vk::DescriptorBufferInfo::default().buffer(buf.raw).offset(0).range(vk::WHOLE_SIZE));
    }

    for binding in &info.bindings {
        match binding.ty {
            BindingType::Texture => {
                if let Some(texture) = bindings.textures.get(&binding.external_index) {
                    let ty = match binding.texture_access {
                        Some(TextureAccessType::Read) | Some(TextureAccessType::ReadWrite) | Some(TextureAccessType::Write) => vk::DescriptorType::STORAGE_IMAGE,
                        _ => vk::DescriptorType::SAMPLED_IMAGE,
                    };
                    let image_info = vk::DescriptorImageInfo::default().image_view(texture.raw_view()).image_layout(vk::ImageLayout::GENERAL);
                    image_infos.push((binding.internal_index, ty, image_info));
                    retained.push(Retained::Texture(texture.clone()));
                }
            }
            BindingType::Sampler => {
                let sampler = if let Some(idx) = binding.embedded_sampler_index {
                    embedded_samplers.get(idx as usize).cloned()
                } else {
                    bindings.samplers.get(&binding.external_index).cloned()
                };
                if let Some(sampler) = sampler {
                    let image_info = vk::DescriptorImageInfo::default().sampler(sampler.raw);
                    image_infos.push((binding.internal_index, vk::DescriptorType::SAMPLER, image_info));
                    retained.push(Retained::Sampler(sampler));
                }
            }
            BindingType::Buffer | BindingType::VertexInput => {}
        }
    }

    if address_buffer.is_some() {
        writes.push(
            vk::WriteDescriptorSet::default()
                .dst_set(raw_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_infos[0])),
        );
    }

    // Each entry needs its own single-element slice because
    // `WriteDescriptorSet` borrows it; box them up front so they outlive
    // the loop that references them.
    let image_slices: Vec<(u32, vk::DescriptorType, [vk::DescriptorImageInfo; 1])> =
        image_infos.into_iter().map(|(binding, ty, info)| (binding, ty, [info])).collect();
    for (binding, ty, info) in &image_slices {
        writes.push(vk::WriteDescriptorSet::default().dst_set(raw_set).dst_binding(*binding).descriptor_type(*ty).image_info(info));
    }

    if !writes.is_empty() {
        unsafe { shared.raw.update_descriptor_sets(&writes, &[]) };
    }

    if let Some(buf) = address_buffer {
        retained.push(Retained::Buffer(buf));
    }
    retained.push(Retained::DescriptorSet(set));

    Ok(raw_set)
}

pub(crate) fn free_all(device: &Device, sets: Vec<gpu_descriptor::DescriptorSet<vk::DescriptorSet>>) {
    if sets.is_empty() {
        return;
    }
    let descriptor_device = device.shared.descriptor_device();
    unsafe { device.desc_allocator.lock().free(&descriptor_device, sets) };
}
