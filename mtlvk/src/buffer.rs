//! `Buffer`: a Vulkan buffer plus a device-memory allocation (spec.md §4.2).

use std::ptr::NonNull;
use std::sync::Arc;

use air_types::{ResourceOptions, StorageMode};
use ash::vk;
use parking_lot::Mutex;

use crate::alloc::AshMemoryDevice;
use crate::conv;
use crate::device::{Device, DeviceShared};
use crate::error::{Error, Result};

struct MappedState {
    ptr: NonNull<u8>,
}

unsafe impl Send for MappedState {}

pub struct Buffer {
    shared: Arc<DeviceShared>,
    device: Arc<Device>,
    pub(crate) raw: vk::Buffer,
    block: Mutex<Option<gpu_alloc::MemoryBlock<vk::DeviceMemory>>>,
    mapped: Mutex<Option<MappedState>>,
    length: u64,
    options: ResourceOptions,
    /// Per-buffer sync state lives on `Texture`, not `Buffer` — buffers have
    /// no equivalent per spec.md §3, they're synchronized purely by the
    /// command buffer submission order plus explicit barriers the encoders
    /// issue around them.
    non_coherent_atom_size: u64,
}

impl Buffer {
    /// `newBuffer(length, options)` with no initial contents.
    pub fn new(device: &Arc<Device>, length: u64, options: ResourceOptions) -> Result<Arc<Buffer>> {
        Self::with_usage(device, length, options, vk::BufferUsageFlags::empty())
    }

    /// `newBuffer(pointer, length, options)`: maps, copies, unmaps-if-managed,
    /// flushes.
    pub fn with_contents(device: &Arc<Device>, contents: &[u8], options: ResourceOptions) -> Result<Arc<Buffer>> {
        let buffer = Self::with_usage(device, contents.len() as u64, options, vk::BufferUsageFlags::empty())?;
        let ptr = buffer.contents()?;
        unsafe { std::ptr::copy_nonoverlapping(contents.as_ptr(), ptr.as_ptr(), contents.len()) };
        buffer.did_modify_range(0, contents.len() as u64)?;
        Ok(buffer)
    }

    pub(crate) fn with_usage(device: &Arc<Device>, length: u64, options: ResourceOptions, extra_usage: vk::BufferUsageFlags) -> Result<Arc<Buffer>> {
        let shared = device.shared.clone();
        let usage = vk::BufferUsageFlags::VERTEX_BUFFER
            | vk::BufferUsageFlags::INDEX_BUFFER
            | vk::BufferUsageFlags::UNIFORM_BUFFER
            | vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::INDIRECT_BUFFER
            | vk::BufferUsageFlags::TRANSFER_SRC
            | vk::BufferUsageFlags::TRANSFER_DST
            | vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS
            | extra_usage;

        let info = vk::BufferCreateInfo::default()
            .size(length.max(1))
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let raw = unsafe { shared.raw.create_buffer(&info, None)? };
        let requirements = unsafe { shared.raw.get_buffer_memory_requirements(raw) };

        let (required, preferred) = conv::storage_mode_to_memory_properties(options.storage_mode);
        let mut usage_flags = gpu_alloc::UsageFlags::DEVICE_ADDRESS;
        if matches!(options.storage_mode, StorageMode::Shared | StorageMode::Managed) {
            usage_flags |= gpu_alloc::UsageFlags::HOST_ACCESS;
        }

        let request = gpu_alloc::Request {
            size: requirements.size,
            align_mask: requirements.alignment - 1,
            usage: usage_flags,
            memory_types: requirements.memory_type_bits,
        };
        let _ = preferred;

        let block = unsafe {
            device
                .mem_allocator
                .lock()
                .alloc(AshMemoryDevice::wrap(&shared.raw), request)
                .map_err(Error::AllocationFailed)?
        };
        let _ = required;

        unsafe { shared.raw.bind_buffer_memory(raw, *block.memory(), block.offset())? };

        Ok(Arc::new(Buffer {
            shared,
            device: device.clone(),
            raw,
            block: Mutex::new(Some(block)),
            mapped: Mutex::new(None),
            length,
            options,
            non_coherent_atom_size: device.shared.limits.non_coherent_atom_size,
        }))
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    /// Lazily maps host-visible memory on first call; fails for
    /// private/memoryless storage modes.
    pub fn contents(&self) -> Result<NonNull<u8>> {
        if matches!(self.options.storage_mode, StorageMode::Private | StorageMode::Memoryless) {
            return Err(Error::InvalidUsage("contents() is unavailable for private/memoryless buffers"));
        }
        let mut mapped = self.mapped.lock();
        if let Some(state) = mapped.as_ref() {
            return Ok(state.ptr);
        }
        let mut block_guard = self.block.lock();
        let block = block_guard.as_mut().expect("buffer memory already freed");
        let ptr = unsafe {
            block
                .map(AshMemoryDevice::wrap(&self.shared.raw), 0, self.length as usize)
                .map_err(|_| Error::InitializationFailed("vkMapMemory failed".to_string()))?
        };
        *mapped = Some(MappedState { ptr });
        Ok(ptr)
    }

    /// Flushes `[start, start+len)` for managed buffers; a no-op for
    /// host-coherent shared buffers beyond the alignment it respects.
    pub fn did_modify_range(&self, start: u64, len: u64) -> Result<()> {
        if self.options.storage_mode != StorageMode::Managed {
            return Ok(());
        }
        let block = self.block.lock();
        let block = block.as_ref().expect("buffer memory already freed");
        let atom = self.non_coherent_atom_size.max(1);
        let aligned_start = (start / atom) * atom;
        let aligned_len = ((len + (start - aligned_start) + atom - 1) / atom) * atom;
        let range = vk::MappedMemoryRange::default()
            .memory(*block.memory())
            .offset(block.offset() + aligned_start)
            .size(aligned_len);
        unsafe { self.shared.raw.flush_mapped_memory_ranges(&[range])? };
        Ok(())
    }

    /// The 64-bit device address, captured into the per-draw UBO the render
    /// encoder assembles (spec.md §4.9).
    pub fn gpu_address(&self) -> u64 {
        let info = vk::BufferDeviceAddressInfo::default().buffer(self.raw);
        unsafe { self.shared.raw.get_buffer_device_address(&info) }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        let mapped = self.mapped.get_mut().take();
        let mut block = self.block.lock();
        if let Some(mut block) = block.take() {
            if mapped.is_some() {
                unsafe { block.unmap(AshMemoryDevice::wrap(&self.shared.raw)) };
            }
            unsafe { self.shared.raw.destroy_buffer(self.raw, None) };
            self.device.mem_allocator.lock().dealloc(AshMemoryDevice::wrap(&self.shared.raw), block);
        }
    }
}
