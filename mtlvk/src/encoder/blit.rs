//! `BlitCommandEncoder` (spec.md §4.11).

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::buffer::Buffer;
use crate::conv;
use crate::device::Device;
use crate::encoder::{EncoderState, Retained, TouchedTexture};
use crate::error::{Error, Result};
use crate::texture::Texture;

struct Inner {
    device: Arc<Device>,
    cmd: vk::CommandBuffer,
    touched: Vec<TouchedTexture>,
    retained: Vec<Retained>,
}

impl EncoderState for Inner {
    fn pre_commit(&mut self) -> Vec<TouchedTexture> {
        std::mem::take(&mut self.touched)
    }

    fn take_retained(&mut self) -> Vec<Retained> {
        std::mem::take(&mut self.retained)
    }
}

pub struct BlitCommandEncoder {
    inner: Arc<Mutex<Inner>>,
}

impl BlitCommandEncoder {
    pub(crate) fn new(device: Arc<Device>, cmd: vk::CommandBuffer) -> (BlitCommandEncoder, Arc<Mutex<dyn EncoderState>>) {
        let inner = Arc::new(Mutex::new(Inner { device, cmd, touched: Vec::new(), retained: Vec::new() }));
        let erased: Arc<Mutex<dyn EncoderState>> = inner.clone();
        (BlitCommandEncoder { inner }, erased)
    }

    pub fn copy_buffer_to_buffer(&self, source: &Arc<Buffer>, source_offset: u64, destination: &Arc<Buffer>, destination_offset: u64, size: u64) {
        let mut inner = self.inner.lock();
        let region = vk::BufferCopy::default().src_offset(source_offset).dst_offset(destination_offset).size(size);
        unsafe { inner.device.shared.raw.cmd_copy_buffer(inner.cmd, source.raw, destination.raw, &[region]) };
        inner.retained.push(Retained::Buffer(source.clone()));
        inner.retained.push(Retained::Buffer(destination.clone()));
    }

    /// Buffer→texture (spec.md §4.11): GENERAL→TRANSFER_DST→GENERAL barrier
    /// pair around `vkCmdCopyBufferToImage`.
    pub fn copy_buffer_to_texture(
        &self,
        source: &Arc<Buffer>,
        source_offset: u64,
        bytes_per_row: u32,
        bytes_per_image: u32,
        destination: &Arc<Texture>,
        level: u32,
        layer: u32,
        width: u32,
        height: u32,
        depth: u32,
    ) {
        let mut inner = self.inner.lock();
        let aspect = conv::pixel_format_to_aspect(destination.descriptor.pixel_format);
        let bytes_per_pixel = bytes_per_pixel(destination.descriptor.pixel_format);
        let buffer_row_length = if bytes_per_pixel > 0 { bytes_per_row / bytes_per_pixel } else { 0 };
        let buffer_image_height = if bytes_per_row > 0 { bytes_per_image / bytes_per_row } else { 0 };

        let region = vk::BufferImageCopy::default()
            .buffer_offset(source_offset)
            .buffer_row_length(buffer_row_length)
            .buffer_image_height(buffer_image_height)
            .image_subresource(vk::ImageSubresourceLayers { aspect_mask: aspect, mip_level: level, base_array_layer: layer, layer_count: 1 })
            .image_extent(vk::Extent3D { width, height, depth });

        transition(&inner.device, inner.cmd, destination.raw_image(), aspect, level, layer, vk::ImageLayout::GENERAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        unsafe {
            inner.device.shared.raw.cmd_copy_buffer_to_image(inner.cmd, source.raw, destination.raw_image(), vk::ImageLayout::TRANSFER_DST_OPTIMAL, &[region]);
        }
        transition(&inner.device, inner.cmd, destination.raw_image(), aspect, level, layer, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::GENERAL);

        inner.retained.push(Retained::Buffer(source.clone()));
        inner.touched.push(TouchedTexture { texture: destination.clone(), read_write: true });
    }

    /// Texture→buffer (spec.md §4.11): symmetric with TRANSFER_SRC.
    pub fn copy_texture_to_buffer(
        &self,
        source: &Arc<Texture>,
        level: u32,
        layer: u32,
        width: u32,
        height: u32,
        depth: u32,
        destination: &Arc<Buffer>,
        destination_offset: u64,
        bytes_per_row: u32,
        bytes_per_image: u32,
    ) {
        let mut inner = self.inner.lock();
        let aspect = conv::pixel_format_to_aspect(source.descriptor.pixel_format);
        let bytes_per_pixel = bytes_per_pixel(source.descriptor.pixel_format);
        let buffer_row_length = if bytes_per_pixel > 0 { bytes_per_row / bytes_per_pixel } else { 0 };
        let buffer_image_height = if bytes_per_row > 0 { bytes_per_image / bytes_per_row } else { 0 };

        let region = vk::BufferImageCopy::default()
            .buffer_offset(destination_offset)
            .buffer_row_length(buffer_row_length)
            .buffer_image_height(buffer_image_height)
            .image_subresource(vk::ImageSubresourceLayers { aspect_mask: aspect, mip_level: level, base_array_layer: layer, layer_count: 1 })
            .image_extent(vk::Extent3D { width, height, depth });

        transition(&inner.device, inner.cmd, source.raw_image(), aspect, level, layer, vk::ImageLayout::GENERAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        unsafe {
            inner.device.shared.raw.cmd_copy_image_to_buffer(inner.cmd, source.raw_image(), vk::ImageLayout::TRANSFER_SRC_OPTIMAL, destination.raw, &[region]);
        }
        transition(&inner.device, inner.cmd, source.raw_image(), aspect, level, layer, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::GENERAL);

        inner.touched.push(TouchedTexture { texture: source.clone(), read_write: false });
        inner.retained.push(Retained::Buffer(destination.clone()));
    }

    /// Texture→texture of one region (spec.md §4.11): single-mip,
    /// single-slice `vkCmdCopyImage` with both sides transitioned and
    /// restored.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_texture_to_texture(
        &self,
        source: &Arc<Texture>,
        source_level: u32,
        source_layer: u32,
        source_origin: (u32, u32, u32),
        size: (u32, u32, u32),
        destination: &Arc<Texture>,
        destination_level: u32,
        destination_layer: u32,
        destination_origin: (u32, u32, u32),
    ) {
        let mut inner = self.inner.lock();
        let src_aspect = conv::pixel_format_to_aspect(source.descriptor.pixel_format);
        let dst_aspect = conv::pixel_format_to_aspect(destination.descriptor.pixel_format);

        let region = vk::ImageCopy::default()
            .src_subresource(vk::ImageSubresourceLayers { aspect_mask: src_aspect, mip_level: source_level, base_array_layer: source_layer, layer_count: 1 })
            .src_offset(vk::Offset3D { x: source_origin.0 as i32, y: source_origin.1 as i32, z: source_origin.2 as i32 })
            .dst_subresource(vk::ImageSubresourceLayers { aspect_mask: dst_aspect, mip_level: destination_level, base_array_layer: destination_layer, layer_count: 1 })
            .dst_offset(vk::Offset3D { x: destination_origin.0 as i32, y: destination_origin.1 as i32, z: destination_origin.2 as i32 })
            .extent(vk::Extent3D { width: size.0, height: size.1, depth: size.2 });

        transition(&inner.device, inner.cmd, source.raw_image(), src_aspect, source_level, source_layer, vk::ImageLayout::GENERAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        transition(&inner.device, inner.cmd, destination.raw_image(), dst_aspect, destination_level, destination_layer, vk::ImageLayout::GENERAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        unsafe {
            inner.device.shared.raw.cmd_copy_image(
                inner.cmd,
                source.raw_image(),
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                destination.raw_image(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }
        transition(&inner.device, inner.cmd, destination.raw_image(), dst_aspect, destination_level, destination_layer, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::GENERAL);
        transition(&inner.device, inner.cmd, source.raw_image(), src_aspect, source_level, source_layer, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::GENERAL);

        inner.touched.push(TouchedTexture { texture: source.clone(), read_write: false });
        inner.touched.push(TouchedTexture { texture: destination.clone(), read_write: true });
    }

    /// Texture→texture without an explicit region (spec.md §4.11): picks
    /// the mip level in `source` whose dimensions match `destination`'s
    /// base level, then copies all overlapping mips/slices from there,
    /// halving dimensions per mip level.
    pub fn copy_texture_to_texture_matching(&self, source: &Arc<Texture>, destination: &Arc<Texture>, layer_count: u32) {
        let src_desc = &source.descriptor;
        let dst_desc = &destination.descriptor;

        let mut start_level = 0u32;
        let (mut w, mut h) = (src_desc.width, src_desc.height);
        while (w, h) != (dst_desc.width, dst_desc.height) && (w > 1 || h > 1) {
            start_level += 1;
            w = (w / 2).max(1);
            h = (h / 2).max(1);
        }

        let levels = src_desc.mipmap_level_count.min(dst_desc.mipmap_level_count);
        let mut size = (dst_desc.width, dst_desc.height, 1);
        for mip in 0..levels {
            for layer in 0..layer_count {
                self.copy_texture_to_texture(source, start_level + mip, layer, (0, 0, 0), size, destination, mip, layer, (0, 0, 0));
            }
            size = ((size.0 / 2).max(1), (size.1 / 2).max(1), (size.2 / 2).max(1));
        }
    }

    /// `fillBuffer(range, byteValue)` (spec.md §4.11): `range.start` and
    /// `range.length` must be multiples of 4.
    pub fn fill_buffer(&self, buffer: &Arc<Buffer>, start: u64, length: u64, byte_value: u8) -> Result<()> {
        if start % 4 != 0 || length % 4 != 0 {
            return Err(Error::InvalidUsage("fillBuffer requires range.start and range.length to be multiples of 4"));
        }
        let word = u32::from_ne_bytes([byte_value; 4]);
        let mut inner = self.inner.lock();
        unsafe { inner.device.shared.raw.cmd_fill_buffer(inner.cmd, buffer.raw, start, length, word) };
        inner.retained.push(Retained::Buffer(buffer.clone()));
        Ok(())
    }

    /// `generateMipmapsForTexture` (spec.md §4.11): transitions the whole
    /// image to TRANSFER_DST, then blits each mip from the one below it
    /// with LINEAR filtering, restoring the source mip's stable layout
    /// after each blit.
    pub fn generate_mipmaps(&self, texture: &Arc<Texture>, layer_count: u32) {
        let mut inner = self.inner.lock();
        let aspect = conv::pixel_format_to_aspect(texture.descriptor.pixel_format);
        let levels = texture.descriptor.mipmap_level_count;
        let image = texture.raw_image();

        whole_image_transition(&inner.device, inner.cmd, image, aspect, levels, layer_count, vk::ImageLayout::GENERAL, vk::ImageLayout::TRANSFER_DST_OPTIMAL);

        let mut w = texture.descriptor.width;
        let mut h = texture.descriptor.height;
        for mip in 1..levels {
            let src_w = w;
            let src_h = h;
            w = (w / 2).max(1);
            h = (h / 2).max(1);

            for layer in 0..layer_count {
                transition(&inner.device, inner.cmd, image, aspect, mip - 1, layer, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);

                let blit = vk::ImageBlit::default()
                    .src_subresource(vk::ImageSubresourceLayers { aspect_mask: aspect, mip_level: mip - 1, base_array_layer: layer, layer_count: 1 })
                    .src_offsets([vk::Offset3D::default(), vk::Offset3D { x: src_w as i32, y: src_h as i32, z: 1 }])
                    .dst_subresource(vk::ImageSubresourceLayers { aspect_mask: aspect, mip_level: mip, base_array_layer: layer, layer_count: 1 })
                    .dst_offsets([vk::Offset3D::default(), vk::Offset3D { x: w as i32, y: h as i32, z: 1 }]);
                unsafe {
                    inner.device.shared.raw.cmd_blit_image(
                        inner.cmd,
                        image,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[blit],
                        vk::Filter::LINEAR,
                    );
                }

                transition(&inner.device, inner.cmd, image, aspect, mip - 1, layer, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::GENERAL);
            }
        }

        whole_image_transition(&inner.device, inner.cmd, image, aspect, levels, layer_count, vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::GENERAL);
        inner.touched.push(TouchedTexture { texture: texture.clone(), read_write: true });
    }

    pub fn end_encoding(&self) {}
}

fn transition(device: &Arc<Device>, cmd: vk::CommandBuffer, image: vk::Image, aspect: vk::ImageAspectFlags, level: u32, layer: u32, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: level, level_count: 1, base_array_layer: layer, layer_count: 1 });
    unsafe {
        device.shared.raw.cmd_pipeline_barrier(cmd, vk::PipelineStageFlags::ALL_COMMANDS, vk::PipelineStageFlags::ALL_COMMANDS, vk::DependencyFlags::empty(), &[], &[], &[barrier]);
    }
}

fn whole_image_transition(device: &Arc<Device>, cmd: vk::CommandBuffer, image: vk::Image, aspect: vk::ImageAspectFlags, levels: u32, layers: u32, old_layout: vk::ImageLayout, new_layout: vk::ImageLayout) {
    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
        .dst_access_mask(vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange { aspect_mask: aspect, base_mip_level: 0, level_count: levels, base_array_layer: 0, layer_count: layers });
    unsafe {
        device.shared.raw.cmd_pipeline_barrier(cmd, vk::PipelineStageFlags::ALL_COMMANDS, vk::PipelineStageFlags::ALL_COMMANDS, vk::DependencyFlags::empty(), &[], &[], &[barrier]);
    }
}

fn bytes_per_pixel(format: air_types::PixelFormat) -> u32 {
    format.bytes_per_block()
}
