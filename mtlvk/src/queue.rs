//! `CommandQueue`: a submission channel bound to one `Device` (spec.md §3).
//!
//! Grounded on `wgpu-hal::vulkan::queue` generalized from wgpu's "queue per
//! device" model to Metal's explicit, possibly-multiple `CommandQueue`
//! objects each owning their own Vulkan command pool.

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::command_buffer::CommandBuffer;
use crate::device::{Device, DeviceShared};
use crate::error::Result;

pub struct CommandQueue {
    pub(crate) device: Arc<Device>,
    pub(crate) shared: Arc<DeviceShared>,
    pub(crate) raw_queue: vk::Queue,
    pub(crate) pool: Mutex<vk::CommandPool>,
}

impl CommandQueue {
    pub(crate) fn new(device: Arc<Device>) -> Result<Self> {
        let shared = device.shared.clone();
        let raw_queue = shared.graphics_queue;
        let info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(shared.families.graphics)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = unsafe { shared.raw.create_command_pool(&info, None)? };
        Ok(Self { device, shared, raw_queue, pool: Mutex::new(pool) })
    }

    /// Allocates a primary command buffer and begins recording — spec.md
    /// §4.8's "construction allocates ... and calls `vkBeginCommandBuffer`".
    pub fn new_command_buffer(self: &Arc<Self>) -> Result<CommandBuffer> {
        CommandBuffer::new(self.clone())
    }
}

impl Drop for CommandQueue {
    fn drop(&mut self) {
        unsafe { self.shared.raw.destroy_command_pool(*self.pool.lock(), None) };
    }
}
