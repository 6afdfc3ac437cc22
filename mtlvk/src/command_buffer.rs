//! `CommandBuffer` (spec.md §3, §4.8): owns one primary Vulkan command
//! buffer, the encoders opened against it, and the completion bookkeeping
//! `commit()` drives.
//!
//! Grounded on `wgpu-hal::vulkan::Queue::submit`'s per-submission
//! semaphore bookkeeping, generalized from wgpu's single device-wide
//! timeline to Metal's per-texture timelines (spec.md §5).

use std::sync::Arc;

use ash::vk;
use parking_lot::{Condvar, Mutex};

use crate::device::Device;
use crate::encoder::{BlitCommandEncoder, ComputeCommandEncoder, EncoderState, RenderCommandEncoder, RenderPassDescriptor, Retained, TouchedTexture};
use crate::encoder::descriptor_update;
use crate::error::Result;
use crate::queue::CommandQueue;
use crate::swapchain::Drawable;

struct State {
    encoders: Vec<Arc<Mutex<dyn EncoderState>>>,
    present_queue: Vec<Arc<Drawable>>,
    scheduled_handlers: Vec<Box<dyn FnOnce() + Send>>,
    completed_handlers: Vec<Box<dyn FnOnce() + Send>>,
    committed: bool,
}

/// One Vulkan command buffer plus the Metal-style bookkeeping layered on
/// top of it (spec.md §3 Data Model).
pub struct CommandBuffer {
    queue: Arc<CommandQueue>,
    device: Arc<Device>,
    cmd: vk::CommandBuffer,
    state: Mutex<State>,
    completed: Mutex<bool>,
    completed_cv: Condvar,
}

impl CommandBuffer {
    /// Allocates a primary command buffer from the queue's pool and begins
    /// recording (spec.md §4.8).
    pub(crate) fn new(queue: Arc<CommandQueue>) -> Result<CommandBuffer> {
        let device = queue.device.clone();
        let pool = *queue.pool.lock();
        let alloc_info = vk::CommandBufferAllocateInfo::default().command_pool(pool).level(vk::CommandBufferLevel::PRIMARY).command_buffer_count(1);
        let cmd = unsafe { queue.shared.raw.allocate_command_buffers(&alloc_info)?[0] };
        let begin_info = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { queue.shared.raw.begin_command_buffer(cmd, &begin_info)? };

        Ok(CommandBuffer {
            queue,
            device,
            cmd,
            state: Mutex::new(State {
                encoders: Vec::new(),
                present_queue: Vec::new(),
                scheduled_handlers: Vec::new(),
                completed_handlers: Vec::new(),
                committed: false,
            }),
            completed: Mutex::new(false),
            completed_cv: Condvar::new(),
        })
    }

    pub fn render_command_encoder(&self, descriptor: RenderPassDescriptor) -> Result<RenderCommandEncoder> {
        let (encoder, erased) = RenderCommandEncoder::new(self.device.clone(), self.cmd, descriptor)?;
        self.state.lock().encoders.push(erased);
        Ok(encoder)
    }

    pub fn compute_command_encoder(&self) -> ComputeCommandEncoder {
        let (encoder, erased) = ComputeCommandEncoder::new(self.device.clone(), self.cmd);
        self.state.lock().encoders.push(erased);
        encoder
    }

    pub fn blit_command_encoder(&self) -> BlitCommandEncoder {
        let (encoder, erased) = BlitCommandEncoder::new(self.device.clone(), self.cmd);
        self.state.lock().encoders.push(erased);
        encoder
    }

    pub fn present_drawable(&self, drawable: Arc<Drawable>) {
        self.state.lock().present_queue.push(drawable);
    }

    pub fn add_scheduled_handler(&self, handler: Box<dyn FnOnce() + Send>) {
        self.state.lock().scheduled_handlers.push(handler);
    }

    pub fn add_completed_handler(&self, handler: Box<dyn FnOnce() + Send>) {
        self.state.lock().completed_handlers.push(handler);
    }

    /// Blocks on the condition variable the completion callback notifies
    /// (spec.md §5).
    pub fn wait_until_completed(&self) {
        let mut completed = self.completed.lock();
        while !*completed {
            self.completed_cv.wait(&mut completed);
        }
    }

    /// The ten-step commit protocol (spec.md §4.8):
    /// 1. lock and mark committed, 2. run each encoder's pre-commit hook,
    /// 3. end the command buffer, 4. obtain a completion semaphore/value,
    /// 5. begin-update the presentation semaphore of read-write textures,
    /// 6. acquire (wait, signal) pairs from every touched texture,
    /// 7. submit, 8. register the completion callback, 9. end-update the
    /// presentation semaphore outside the lock, 10. present queued
    /// drawables.
    pub fn commit(self: &Arc<Self>) -> Result<()> {
        let (touched, retained, present_queue, scheduled_handlers) = {
            let mut state = self.state.lock();
            state.committed = true;

            let mut touched: Vec<TouchedTexture> = Vec::new();
            let mut retained: Vec<Retained> = Vec::new();
            for encoder in &state.encoders {
                let mut encoder = encoder.lock();
                touched.extend(encoder.pre_commit());
                retained.extend(encoder.take_retained());
            }

            (touched, retained, state.present_queue.clone(), std::mem::take(&mut state.scheduled_handlers))
        };

        unsafe { self.queue.shared.raw.end_command_buffer(self.cmd)? };

        let completion_semaphore = self.device.semaphores.get_timeline_semaphore()?;
        let completion_value = 1u64;

        for touched in &touched {
            if touched.read_write {
                touched.texture.begin_updating_presentation_semaphore(completion_semaphore);
            }
        }

        let mut wait_semaphores = Vec::new();
        let mut wait_values = Vec::new();
        let mut wait_stages = Vec::new();
        let mut signal_semaphores = vec![completion_semaphore];
        let mut signal_values = vec![completion_value];

        for touched in &touched {
            let (timeline, wait, extra, signal) = touched.texture.acquire();
            wait_semaphores.push(timeline);
            wait_values.push(wait);
            wait_stages.push(vk::PipelineStageFlags::ALL_COMMANDS);
            signal_semaphores.push(timeline);
            signal_values.push(signal);
            if let Some(extra) = extra {
                wait_semaphores.push(extra);
                wait_values.push(0);
                wait_stages.push(vk::PipelineStageFlags::ALL_COMMANDS);
            }
        }

        let mut timeline_info = vk::TimelineSemaphoreSubmitInfo::default().wait_semaphore_values(&wait_values).signal_semaphore_values(&signal_values);
        let cmds = [self.cmd];
        let submit = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .signal_semaphores(&signal_semaphores)
            .command_buffers(&cmds)
            .push_next(&mut timeline_info);

        unsafe { self.queue.shared.raw.queue_submit(self.queue.raw_queue, &[submit], vk::Fence::null())? };

        for handler in scheduled_handlers {
            handler();
        }

        let device = self.device.clone();
        let this = self.clone();
        self.device.register_completion(
            completion_semaphore,
            completion_value,
            Box::new(move || {
                let (kept, sets) = split_descriptor_sets(retained);
                descriptor_update::free_all(&device, sets);
                drop(kept);

                *this.completed.lock() = true;
                this.completed_cv.notify_all();
                let mut state = this.state.lock();
                let completed_handlers = std::mem::take(&mut state.completed_handlers);
                drop(state);
                for handler in completed_handlers {
                    handler();
                }
                device.semaphores.put_timeline_semaphore(completion_semaphore);
            }),
        );

        for touched in &touched {
            if touched.read_write {
                touched.texture.end_updating_presentation_semaphore();
            }
        }

        for drawable in present_queue {
            drawable.present(&self.queue)?;
        }

        Ok(())
    }
}

/// Splits a `CommandBuffer`'s retained list into the descriptor sets that
/// need explicit freeing and everything else, which is simply dropped once
/// the GPU has signaled completion.
fn split_descriptor_sets(retained: Vec<Retained>) -> (Vec<Retained>, Vec<gpu_descriptor::DescriptorSet<vk::DescriptorSet>>) {
    let mut kept = Vec::with_capacity(retained.len());
    let mut sets = Vec::new();
    for item in retained {
        match item {
            Retained::DescriptorSet(set) => sets.push(set),
            other => kept.push(other),
        }
    }
    (kept, sets)
}

impl Drop for CommandBuffer {
    fn drop(&mut self) {
        unsafe { self.queue.shared.raw.free_command_buffers(*self.queue.pool.lock(), &[self.cmd]) };
    }
}
