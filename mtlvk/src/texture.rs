//! `Texture`: concrete images and non-owning views over them (spec.md §4.3),
//! plus the per-texture synchronization fields spec.md §3 describes.
//!
//! Grounded on `wgpu-hal::vulkan::Texture`/`TextureView`'s split and on
//! `original_source/src/indium/texture.cpp` for the layout-transition shape
//! (eager transition to GENERAL at creation, staged `replaceRegion`).

use std::sync::Arc;

use air_types::{PixelFormat, ResourceOptions, TextureSwizzleChannels, TextureType, TextureUsage};
use ash::vk;
use parking_lot::Mutex;

use crate::alloc::AshMemoryDevice;
use crate::conv;
use crate::device::{Device, DeviceShared};
use crate::error::{Error, Result};

#[derive(Clone, Debug)]
pub struct TextureDescriptor {
    pub texture_type: TextureType,
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mipmap_level_count: u32,
    pub array_length: u32,
    pub sample_count: u32,
    pub usage: TextureUsage,
    pub options: ResourceOptions,
    pub swizzle: TextureSwizzleChannels,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            texture_type: TextureType::Type2D,
            pixel_format: PixelFormat::RGBA8Unorm,
            width: 1,
            height: 1,
            depth: 1,
            mipmap_level_count: 1,
            array_length: 1,
            sample_count: 1,
            usage: TextureUsage::SHADER_READ,
            options: ResourceOptions::default(),
            swizzle: TextureSwizzleChannels::default(),
        }
    }
}

/// Every commit publishes a unique (wait, signal) pair on this counter
/// (spec.md §3, §8 testable property).
pub(crate) struct SyncState {
    pub counter: u64,
    /// One-shot wait semaphore attached when the texture came from a
    /// swapchain acquisition; cleared the first time it's handed out.
    pub extra_wait: Option<vk::Semaphore>,
}

pub(crate) struct PresentationState {
    pub semaphore: Option<vk::Semaphore>,
}

struct Concrete {
    shared: Arc<DeviceShared>,
    _device: Arc<Device>,
    image: vk::Image,
    block: Mutex<Option<gpu_alloc::MemoryBlock<vk::DeviceMemory>>>,
}

impl Drop for Concrete {
    fn drop(&mut self) {
        if let Some(block) = self.block.lock().take() {
            unsafe { self.shared.raw.destroy_image(self.image, None) };
            self._device.mem_allocator.lock().dealloc(AshMemoryDevice::wrap(&self.shared.raw), block);
        }
    }
}

enum Storage {
    Concrete(Arc<Concrete>),
    View { parent: Arc<Texture> },
    /// A swapchain image: owned by the `VkSwapchainKHR`, not by this
    /// `Texture` — only its image view is ours to destroy.
    Swapchain { image: vk::Image },
}

/// Tagged variant over concrete images and non-owning views, per spec.md's
/// "Polymorphic base classes" redesign note: operations dispatch on the
/// variant and views carry a strong reference to their parent.
pub struct Texture {
    storage: Storage,
    pub(crate) shared: Arc<DeviceShared>,
    pub(crate) view: vk::ImageView,
    pub descriptor: TextureDescriptor,
    base_level: u32,
    base_layer: u32,
    sync: Mutex<SyncState>,
    /// This texture's own timeline semaphore: GPU-visible ordering between
    /// command buffers is per-texture, not submission-order (spec.md §5).
    timeline: vk::Semaphore,
    presentation: Mutex<PresentationState>,
}

impl Texture {
    pub fn new(device: &Arc<Device>, descriptor: TextureDescriptor) -> Result<Arc<Texture>> {
        let shared = device.shared.clone();
        let aspect = conv::pixel_format_to_aspect(descriptor.pixel_format);
        let format = conv::pixel_format_to_vk(descriptor.pixel_format)?;

        let uncompressed_single_mip = descriptor.mipmap_level_count == 1 && !descriptor.pixel_format.is_compressed() && !descriptor.pixel_format.is_depth_or_stencil();
        let tiling = if uncompressed_single_mip { vk::ImageTiling::LINEAR } else { vk::ImageTiling::OPTIMAL };

        let mut usage = vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::TRANSFER_DST;
        usage |= if descriptor.pixel_format.is_depth_or_stencil() {
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
        } else {
            vk::ImageUsageFlags::COLOR_ATTACHMENT
        };

        let image_type = conv::texture_type_to_vk_image_type(descriptor.texture_type);
        let mut flags = vk::ImageCreateFlags::empty();
        if matches!(descriptor.texture_type, TextureType::TypeCube | TextureType::TypeCubeArray) {
            flags |= vk::ImageCreateFlags::CUBE_COMPATIBLE;
        }

        let info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(format)
            .extent(vk::Extent3D { width: descriptor.width, height: descriptor.height, depth: descriptor.depth })
            .mip_levels(descriptor.mipmap_level_count)
            .array_layers(descriptor.array_length)
            .samples(sample_count_flags(descriptor.sample_count))
            .tiling(tiling)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .flags(flags);
        let image = unsafe { shared.raw.create_image(&info, None)? };
        let requirements = unsafe { shared.raw.get_image_memory_requirements(image) };

        let request = gpu_alloc::Request {
            size: requirements.size,
            align_mask: requirements.alignment - 1,
            usage: gpu_alloc::UsageFlags::empty(),
            memory_types: requirements.memory_type_bits,
        };
        let block = unsafe {
            device
                .mem_allocator
                .lock()
                .alloc(AshMemoryDevice::wrap(&shared.raw), request)
                .map_err(Error::AllocationFailed)?
        };
        unsafe { shared.raw.bind_image_memory(image, *block.memory(), block.offset())? };

        let view_type = conv::texture_type_to_vk_view_type(descriptor.texture_type);
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(format)
            .components(conv::swizzle_channels_to_vk(descriptor.swizzle))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: descriptor.mipmap_level_count,
                base_array_layer: 0,
                layer_count: descriptor.array_length,
            });
        let view = unsafe { shared.raw.create_image_view(&view_info, None)? };

        // Eager transition UNDEFINED -> GENERAL (spec.md §4.3).
        shared.one_shot(|cmd| {
            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::GENERAL)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    base_mip_level: 0,
                    level_count: descriptor.mipmap_level_count,
                    base_array_layer: 0,
                    layer_count: descriptor.array_length,
                });
            unsafe {
                shared.raw.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
        })?;

        let concrete = Arc::new(Concrete { shared: shared.clone(), _device: device.clone(), image, block: Mutex::new(Some(block)) });
        let timeline = create_timeline_semaphore(&shared)?;

        Ok(Arc::new(Texture {
            storage: Storage::Concrete(concrete),
            shared,
            view,
            descriptor,
            base_level: 0,
            base_layer: 0,
            sync: Mutex::new(SyncState { counter: 0, extra_wait: None }),
            timeline,
            presentation: Mutex::new(PresentationState { semaphore: None }),
        }))
    }

    /// Wraps an already-created swapchain image view as a `Texture` without
    /// owning its memory (used by `swapchain::Layer`).
    pub(crate) fn from_swapchain_image(shared: Arc<DeviceShared>, image: vk::Image, view: vk::ImageView, descriptor: TextureDescriptor, extra_wait: vk::Semaphore) -> Result<Texture> {
        let timeline = create_timeline_semaphore(&shared)?;
        Ok(Texture {
            storage: Storage::Swapchain { image },
            shared,
            view,
            descriptor,
            base_level: 0,
            base_layer: 0,
            sync: Mutex::new(SyncState { counter: 0, extra_wait: Some(extra_wait) }),
            timeline,
            presentation: Mutex::new(PresentationState { semaphore: None }),
        })
    }

    pub fn raw_image(&self) -> vk::Image {
        match &self.storage {
            Storage::Concrete(c) => c.image,
            Storage::View { parent } => parent.raw_image(),
            Storage::Swapchain { image } => *image,
        }
    }

    pub fn raw_view(&self) -> vk::ImageView {
        self.view
    }

    /// Clips `[level_start, level_start+level_count)` and
    /// `[layer_start, layer_start+layer_count)` against the parent's own
    /// range, then creates a Vulkan image view over the derived absolute
    /// range (spec.md §4.3 texture-view creation).
    pub fn new_view(
        self: &Arc<Self>,
        pixel_format: PixelFormat,
        texture_type: TextureType,
        swizzle: TextureSwizzleChannels,
        level_start: u32,
        level_count: u32,
        layer_start: u32,
        layer_count: u32,
    ) -> Result<Arc<Texture>> {
        let absolute_level_start = self.base_level + level_start;
        let absolute_layer_start = self.base_layer + layer_start;
        let clipped_level_count = level_count.min(self.descriptor.mipmap_level_count.saturating_sub(level_start));
        let clipped_layer_count = layer_count.min(self.descriptor.array_length.saturating_sub(layer_start));

        let format = conv::pixel_format_to_vk(pixel_format)?;
        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.raw_image())
            .view_type(conv::texture_type_to_vk_view_type(texture_type))
            .format(format)
            .components(conv::swizzle_channels_to_vk(swizzle))
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: conv::pixel_format_to_aspect(pixel_format),
                base_mip_level: absolute_level_start,
                level_count: clipped_level_count,
                base_array_layer: absolute_layer_start,
                layer_count: clipped_layer_count,
            });
        let view = unsafe { self.shared.raw.create_image_view(&view_info, None)? };

        let mut descriptor = self.descriptor.clone();
        descriptor.pixel_format = pixel_format;
        descriptor.texture_type = texture_type;
        descriptor.swizzle = swizzle;
        descriptor.mipmap_level_count = clipped_level_count;
        descriptor.array_length = clipped_layer_count;

        let timeline = create_timeline_semaphore(&self.shared)?;

        Ok(Arc::new(Texture {
            storage: Storage::View { parent: self.clone() },
            shared: self.shared.clone(),
            view,
            descriptor,
            base_level: absolute_level_start,
            base_layer: absolute_layer_start,
            sync: Mutex::new(SyncState { counter: 0, extra_wait: None }),
            timeline,
            presentation: Mutex::new(PresentationState { semaphore: None }),
        }))
    }

    /// Stages through a transient shared-storage buffer: GENERAL ->
    /// TRANSFER_DST_OPTIMAL -> `vkCmdCopyBufferToImage` -> GENERAL, fenced to
    /// completion (spec.md §4.3).
    pub fn replace_region(self: &Arc<Self>, device: &Arc<Device>, level: u32, layer: u32, width: u32, height: u32, bytes: &[u8], bytes_per_row: u32) -> Result<()> {
        if self.descriptor.options.storage_mode == air_types::StorageMode::Private {
            return Err(Error::InvalidUsage("replaceRegion requires a managed or shared texture"));
        }
        let aspect = conv::pixel_format_to_aspect(self.descriptor.pixel_format);
        let image = self.raw_image();

        let mut staging_options = air_types::ResourceOptions::default();
        staging_options.storage_mode = air_types::StorageMode::Shared;
        let staging = crate::buffer::Buffer::with_contents(device, bytes, staging_options)?;
        // Tightly packed: buffer_row_length/buffer_image_height 0 tells
        // Vulkan to derive them from the image extent.
        let _ = bytes_per_row;
        let region = vk::BufferImageCopy::default()
            .buffer_offset(0)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers { aspect_mask: aspect, mip_level: level, base_array_layer: layer, layer_count: 1 })
            .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
            .image_extent(vk::Extent3D { width, height, depth: 1 });

        self.shared.one_shot(|cmd| {
            let pre = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::GENERAL)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: level, level_count: 1, base_array_layer: layer, layer_count: 1 });
            unsafe {
                self.shared.raw.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[pre],
                );
            }
            unsafe {
                self.shared.raw.cmd_copy_buffer_to_image(cmd, staging.raw, image, vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
            }
            let post = vk::ImageMemoryBarrier::default()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::GENERAL)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: level, level_count: 1, base_array_layer: layer, layer_count: 1 });
            unsafe {
                self.shared.raw.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[post],
                );
            }
        })?;
        Ok(())
    }

    /// `acquire`: captures the current counter as `wait`, increments it, and
    /// returns the new value as `signal`, both against this texture's own
    /// timeline semaphore; hands out any pending extra-wait semaphore,
    /// clearing it (spec.md §4.3, §5).
    pub(crate) fn acquire(&self) -> (vk::Semaphore, u64, Option<vk::Semaphore>, u64) {
        let mut sync = self.sync.lock();
        let wait = sync.counter;
        sync.counter += 1;
        let signal = sync.counter;
        let extra = sync.extra_wait.take();
        (self.timeline, wait, extra, signal)
    }

    pub(crate) fn begin_updating_presentation_semaphore(&self, sema: vk::Semaphore) {
        self.presentation.lock().semaphore = Some(sema);
    }

    pub(crate) fn end_updating_presentation_semaphore(&self) {
        // presentation semaphore stays visible for `present()`; nothing to
        // clear here, matching spec.md's "becomes visible to the next use".
    }

    pub(crate) fn synchronize_presentation(&self) -> Option<vk::Semaphore> {
        self.presentation.lock().semaphore.take()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.shared.raw.destroy_image_view(self.view, None);
            self.shared.raw.destroy_semaphore(self.timeline, None);
        }
    }
}

fn create_timeline_semaphore(shared: &DeviceShared) -> Result<vk::Semaphore> {
    let mut type_info = vk::SemaphoreTypeCreateInfo::default().semaphore_type(vk::SemaphoreType::TIMELINE).initial_value(0);
    let info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);
    Ok(unsafe { shared.raw.create_semaphore(&info, None)? })
}

fn sample_count_flags(count: u32) -> vk::SampleCountFlags {
    match count {
        1 => vk::SampleCountFlags::TYPE_1,
        2 => vk::SampleCountFlags::TYPE_2,
        4 => vk::SampleCountFlags::TYPE_4,
        8 => vk::SampleCountFlags::TYPE_8,
        16 => vk::SampleCountFlags::TYPE_16,
        _ => vk::SampleCountFlags::TYPE_1,
    }
}
