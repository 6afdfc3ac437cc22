//! Bridges `ash`'s raw `vkAllocateMemory`/`vkMapMemory` calls to
//! [`gpu_alloc`]'s backend-agnostic allocator, the way
//! `wgpu-hal::vulkan::Device`'s `mem_allocator` field is wired up.
//!
//! `gpu-alloc` expects an implementation of `MemoryDevice` rather than
//! shipping one for Vulkan itself, so this is the thin adapter every
//! `ash`-based consumer of the crate ends up writing.

use std::ptr::NonNull;

use ash::vk;
use gpu_alloc::{AllocationFlags, DeviceMapError, MemoryDevice, OutOfMemory};

pub struct AshMemoryDevice<'a>(&'a ash::Device);

impl<'a> AshMemoryDevice<'a> {
    pub fn wrap(device: &'a ash::Device) -> &'a Self {
        // SAFETY: `AshMemoryDevice` is a transparent newtype over `&ash::Device`.
        unsafe { &*(device as *const ash::Device as *const Self) }
    }
}

impl<'a> MemoryDevice<vk::DeviceMemory> for AshMemoryDevice<'a> {
    unsafe fn allocate_memory(
        &self,
        size: u64,
        memory_type: u32,
        flags: AllocationFlags,
    ) -> Result<vk::DeviceMemory, OutOfMemory> {
        let mut info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type);
        let mut flags_info = vk::MemoryAllocateFlagsInfo::default();
        if flags.contains(AllocationFlags::DEVICE_ADDRESS) {
            flags_info = flags_info.flags(vk::MemoryAllocateFlags::DEVICE_ADDRESS);
            info = info.push_next(&mut flags_info);
        }
        self.0.allocate_memory(&info, None).map_err(|e| match e {
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => OutOfMemory::OutOfDeviceMemory,
            _ => OutOfMemory::OutOfDeviceMemory,
        })
    }

    unsafe fn deallocate_memory(&self, memory: vk::DeviceMemory) {
        self.0.free_memory(memory, None);
    }

    unsafe fn map_memory(
        &self,
        memory: &mut vk::DeviceMemory,
        offset: u64,
        size: u64,
    ) -> Result<NonNull<u8>, DeviceMapError> {
        let ptr = self
            .0
            .map_memory(*memory, offset, size, vk::MemoryMapFlags::empty())
            .map_err(|_| DeviceMapError::MapFailed)?;
        NonNull::new(ptr as *mut u8).ok_or(DeviceMapError::MapFailed)
    }

    unsafe fn unmap_memory(&self, memory: &mut vk::DeviceMemory) {
        self.0.unmap_memory(*memory);
    }
}

/// Builds the `gpu_alloc::DeviceProperties` the allocator needs out of
/// `vkGetPhysicalDeviceMemoryProperties`'s raw struct (spec.md §4.1).
pub fn device_properties(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    limits: &vk::PhysicalDeviceLimits,
    buffer_device_address: bool,
) -> gpu_alloc::DeviceProperties<'static> {
    let memory_types = memory_properties.memory_types[..memory_properties.memory_type_count as usize]
        .iter()
        .map(|mt| gpu_alloc::MemoryType {
            props: gpu_alloc::MemoryPropertyFlags::from_bits_truncate(mt.property_flags.as_raw()),
            heap: mt.heap_index,
        })
        .collect::<Vec<_>>();
    let memory_heaps = memory_properties.memory_heaps[..memory_properties.memory_heap_count as usize]
        .iter()
        .map(|h| gpu_alloc::MemoryHeap { size: h.size })
        .collect::<Vec<_>>();

    gpu_alloc::DeviceProperties {
        memory_types: memory_types.into(),
        memory_heaps: memory_heaps.into(),
        max_memory_allocation_count: limits.max_memory_allocation_count,
        max_memory_allocation_size: u64::MAX,
        non_coherent_atom_size: limits.non_coherent_atom_size,
        buffer_device_address,
    }
}
