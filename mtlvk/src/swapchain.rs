//! Swapchain layer and `Drawable` (spec.md §4.4).
//!
//! Grounded on `wgpu-hal::vulkan::Surface`'s swapchain (re)configuration and
//! acquire/present bookkeeping, generalized to vend `Drawable`s that behave
//! as Metal-style `Texture`s rather than wgpu's own surface-texture type.

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::conv;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::queue::CommandQueue;
use crate::texture::{Texture, TextureDescriptor};

/// One-second acquire timeout (spec.md §4.4, §7 "nextDrawable returns null
/// if acquisition does not succeed within ~1s").
const ACQUIRE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Wraps a `VkSwapchainKHR` and the image views over its images
/// (spec.md §4.4).
pub struct Layer {
    device: Arc<Device>,
    surface_loader: ash::extensions::khr::Surface,
    swapchain_loader: ash::extensions::khr::Swapchain,
    surface: vk::SurfaceKHR,
    swapchain: Mutex<vk::SwapchainKHR>,
    images: Mutex<Vec<vk::Image>>,
    views: Mutex<Vec<vk::ImageView>>,
    descriptor: TextureDescriptor,
    width: Mutex<u32>,
    height: Mutex<u32>,
}

impl Layer {
    /// `Layer::make(surface, device, width, height)` (spec.md §4.4): queries
    /// surface capabilities, picks FIFO present mode, builds a swapchain
    /// with min-image-count 5, SRGB-nonlinear colorspace, one array layer,
    /// color-attachment usage, exclusive sharing, clipped, then creates one
    /// image view per image.
    pub fn make(device: Arc<Device>, surface: vk::SurfaceKHR, pixel_format: air_types::PixelFormat, width: u32, height: u32) -> Result<Arc<Layer>> {
        let entry = crate::loader::vulkan_entry()?;
        let surface_loader = ash::extensions::khr::Surface::new(entry, &device.shared.instance);
        let swapchain_loader = ash::extensions::khr::Swapchain::new(&device.shared.instance, &device.shared.raw);

        let layer = Arc::new(Layer {
            device,
            surface_loader,
            swapchain_loader,
            surface,
            swapchain: Mutex::new(vk::SwapchainKHR::null()),
            images: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
            descriptor: TextureDescriptor { pixel_format, width, height, ..TextureDescriptor::default() },
            width: Mutex::new(width),
            height: Mutex::new(height),
        });
        layer.rebuild(width, height)?;
        Ok(layer)
    }

    fn rebuild(&self, width: u32, height: u32) -> Result<()> {
        let physical_device = self.device.shared.physical_device;
        let format = conv::pixel_format_to_vk(self.descriptor.pixel_format)?;

        let capabilities = unsafe {
            self.surface_loader.get_physical_device_surface_capabilities(physical_device, self.surface)
        }
        .map_err(Error::from)?;

        let present_modes = unsafe { self.surface_loader.get_physical_device_surface_present_modes(physical_device, self.surface) }
            .map_err(Error::from)?;
        let present_mode = if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else {
            vk::PresentModeKHR::FIFO
        };

        let mut min_image_count = 5.max(capabilities.min_image_count);
        if capabilities.max_image_count != 0 {
            min_image_count = min_image_count.min(capabilities.max_image_count);
        }
        let extent = vk::Extent2D { width, height };

        let old_swapchain = *self.swapchain.lock();
        let info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(min_image_count)
            .image_format(format)
            .image_color_space(vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&info, None) }.map_err(Error::from)?;

        if old_swapchain != vk::SwapchainKHR::null() {
            for view in self.views.lock().drain(..) {
                unsafe { self.device.shared.raw.destroy_image_view(view, None) };
            }
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }

        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }.map_err(Error::from)?;
        let aspect = conv::pixel_format_to_aspect(self.descriptor.pixel_format);
        let mut views = Vec::with_capacity(images.len());
        for image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(*image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: 0, level_count: 1, base_array_layer: 0, layer_count: 1 });
            views.push(unsafe { self.device.shared.raw.create_image_view(&view_info, None)? });
        }

        *self.swapchain.lock() = swapchain;
        *self.images.lock() = images;
        *self.views.lock() = views;
        *self.width.lock() = width;
        *self.height.lock() = height;
        Ok(())
    }

    /// `nextDrawable()` (spec.md §4.4): borrows a binary semaphore, calls
    /// `vkAcquireNextImageKHR` with a 1-second timeout, and returns `None`
    /// rather than propagating an error on acquisition failure
    /// (spec.md §7's "nextDrawable failures are recoverable").
    pub fn next_drawable(self: &Arc<Self>) -> Option<Arc<Drawable>> {
        let acquire_sema = self.device.semaphores.get_binary_semaphore(false).ok()?;
        let swapchain = *self.swapchain.lock();
        let acquired = unsafe { self.swapchain_loader.acquire_next_image(swapchain, ACQUIRE_TIMEOUT_NS, acquire_sema, vk::Fence::null()) };
        let (index, suboptimal) = match acquired {
            Ok(pair) => pair,
            Err(_) => {
                self.device.semaphores.put_binary_semaphore(acquire_sema);
                return None;
            }
        };
        let _ = suboptimal;

        let image = self.images.lock()[index as usize];
        let view = self.views.lock()[index as usize];
        let texture = Arc::new(Texture::from_swapchain_image(self.device.shared.clone(), image, view, self.descriptor.clone(), acquire_sema).ok()?);

        Some(Arc::new(Drawable {
            layer: self.clone(),
            index,
            texture,
            presented: Mutex::new(false),
        }))
    }

    pub fn width(&self) -> u32 {
        *self.width.lock()
    }

    pub fn height(&self) -> u32 {
        *self.height.lock()
    }

    pub fn pixel_format(&self) -> air_types::PixelFormat {
        self.descriptor.pixel_format
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        for view in self.views.lock().drain(..) {
            unsafe { self.device.shared.raw.destroy_image_view(view, None) };
        }
        let swapchain = *self.swapchain.lock();
        if swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
        }
        unsafe { self.surface_loader.destroy_surface(self.surface, None) };
    }
}

/// A `Texture` variant wrapping one acquired swapchain image
/// (spec.md §3 "Drawable").
pub struct Drawable {
    layer: Arc<Layer>,
    index: u32,
    texture: Arc<Texture>,
    presented: Mutex<bool>,
}

impl Drawable {
    pub fn texture(&self) -> Arc<Texture> {
        self.texture.clone()
    }

    /// `present()` (spec.md §4.4): takes the presentation semaphore
    /// published by the last command-buffer use of this drawable's texture
    /// and calls `vkQueuePresentKHR` waiting on it.
    pub fn present(&self, queue: &Arc<CommandQueue>) -> Result<()> {
        let mut presented = self.presented.lock();
        if *presented {
            return Err(Error::InvalidUsage("presentDrawable called twice on the same Drawable"));
        }
        *presented = true;

        let wait_semaphores = match self.texture.synchronize_presentation() {
            Some(sema) => vec![sema],
            None => Vec::new(),
        };
        let swapchains = [*self.layer.swapchain.lock()];
        let indices = [self.index];
        let info = vk::PresentInfoKHR::default().wait_semaphores(&wait_semaphores).swapchains(&swapchains).image_indices(&indices);
        let result = unsafe { self.layer.swapchain_loader.queue_present(queue.raw_queue, &info) };
        match result {
            Ok(_) => Ok(()),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => Ok(()),
            Err(e) => Err(Error::from(e)),
        }
    }
}
