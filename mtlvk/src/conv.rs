//! Runtime-local conversions that don't belong in `air_types` because they
//! need more than one enum at a time, or depend on usage context.
//!
//! The per-enum translation tables themselves live in `air_types::vk_convert`
//! and are re-exported through here so encoder/pipeline code has one import
//! path for "turn a Metal-shaped value into its Vulkan equivalent."

pub use air_types::{
    blend_factor_to_vk, blend_operation_to_vk, color_write_mask_to_vk, compare_function_to_vk,
    cull_mode_to_vk, index_type_to_vk, pixel_format_to_aspect, pixel_format_to_vk,
    primitive_type_to_vk, render_stages_to_vk, resource_usage_to_vk_access,
    sampler_address_mode_to_vk, sampler_border_color_to_vk, sampler_min_mag_filter_to_vk,
    sampler_mip_filter_to_vk, stencil_operation_to_vk, swizzle_channels_to_vk,
    texture_type_to_vk_image_type, texture_type_to_vk_view_type, vertex_format_to_vk,
    winding_to_vk,
};

use air_types::{PrimitiveType, PrimitiveTopologyClass, StorageMode};
use ash::vk;

/// A [`StorageMode`]'s required and preferred Vulkan memory property flags,
/// mirroring `wgpu-hal::vulkan::Device::create_buffer`'s memory-type scan
/// (spec.md §4.2).
pub fn storage_mode_to_memory_properties(mode: StorageMode) -> (vk::MemoryPropertyFlags, vk::MemoryPropertyFlags) {
    match mode {
        StorageMode::Shared => (
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::empty(),
        ),
        StorageMode::Managed => (
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_COHERENT,
        ),
        StorageMode::Private | StorageMode::Memoryless => {
            (vk::MemoryPropertyFlags::DEVICE_LOCAL, vk::MemoryPropertyFlags::empty())
        }
    }
}

pub fn primitive_type_to_topology_class(ty: PrimitiveType) -> PrimitiveTopologyClass {
    PrimitiveTopologyClass::from(ty)
}

/// Index into the 3-slot {points, lines, triangles} pipeline array (spec.md §4.7).
pub fn topology_class_slot(class: PrimitiveTopologyClass) -> usize {
    match class {
        PrimitiveTopologyClass::Point => 0,
        PrimitiveTopologyClass::Line => 1,
        PrimitiveTopologyClass::Triangle | PrimitiveTopologyClass::Unspecified => 2,
    }
}
