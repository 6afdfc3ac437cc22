//! `SamplerState`: an immutable Vulkan sampler (spec.md §3).

use std::sync::Arc;

use air_types::{SamplerAddressMode, SamplerBorderColor, SamplerMinMagFilter, SamplerMipFilter};
use ash::vk;

use crate::conv;
use crate::device::{Device, DeviceShared};
use crate::error::Result;

#[derive(Clone, Copy, Debug)]
pub struct SamplerDescriptor {
    pub min_filter: SamplerMinMagFilter,
    pub mag_filter: SamplerMinMagFilter,
    pub mip_filter: SamplerMipFilter,
    pub address_u: SamplerAddressMode,
    pub address_v: SamplerAddressMode,
    pub address_w: SamplerAddressMode,
    pub border_color: SamplerBorderColor,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub max_anisotropy: u32,
    pub compare_function: Option<air_types::CompareFunction>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            min_filter: SamplerMinMagFilter::Nearest,
            mag_filter: SamplerMinMagFilter::Nearest,
            mip_filter: SamplerMipFilter::NotMipmapped,
            address_u: SamplerAddressMode::ClampToEdge,
            address_v: SamplerAddressMode::ClampToEdge,
            address_w: SamplerAddressMode::ClampToEdge,
            border_color: SamplerBorderColor::TransparentBlack,
            lod_min_clamp: 0.0,
            lod_max_clamp: 1000.0,
            max_anisotropy: 1,
            compare_function: None,
        }
    }
}

pub struct SamplerState {
    shared: Arc<DeviceShared>,
    pub(crate) raw: vk::Sampler,
    descriptor: SamplerDescriptor,
}

impl SamplerState {
    pub fn new(device: &Arc<Device>, descriptor: SamplerDescriptor) -> Result<Arc<SamplerState>> {
        let shared = device.shared.clone();
        let raw = create_raw(&shared, &descriptor)?;
        Ok(Arc::new(SamplerState { shared, raw, descriptor }))
    }

    /// `clone-with-clamps`: produces a new `SamplerState` with overridden
    /// LOD clamps without disturbing `self` (spec.md §3).
    pub fn clone_with_clamps(self: &Arc<Self>, lod_min_clamp: f32, lod_max_clamp: f32) -> Result<Arc<SamplerState>> {
        let mut descriptor = self.descriptor;
        descriptor.lod_min_clamp = lod_min_clamp;
        descriptor.lod_max_clamp = lod_max_clamp;
        let raw = create_raw(&self.shared, &descriptor)?;
        Ok(Arc::new(SamplerState { shared: self.shared.clone(), raw, descriptor }))
    }
}

fn create_raw(shared: &Arc<DeviceShared>, descriptor: &SamplerDescriptor) -> Result<vk::Sampler> {
    let mut info = vk::SamplerCreateInfo::default()
        .mag_filter(conv::sampler_min_mag_filter_to_vk(descriptor.mag_filter))
        .min_filter(conv::sampler_min_mag_filter_to_vk(descriptor.min_filter))
        .mipmap_mode(conv::sampler_mip_filter_to_vk(descriptor.mip_filter))
        .address_mode_u(conv::sampler_address_mode_to_vk(descriptor.address_u))
        .address_mode_v(conv::sampler_address_mode_to_vk(descriptor.address_v))
        .address_mode_w(conv::sampler_address_mode_to_vk(descriptor.address_w))
        .border_color(conv::sampler_border_color_to_vk(descriptor.border_color))
        .min_lod(descriptor.lod_min_clamp)
        .max_lod(descriptor.lod_max_clamp)
        .anisotropy_enable(descriptor.max_anisotropy > 1)
        .max_anisotropy(descriptor.max_anisotropy as f32);
    if let Some(compare) = descriptor.compare_function {
        info = info.compare_enable(true).compare_op(conv::compare_function_to_vk(compare));
    }
    Ok(unsafe { shared.raw.create_sampler(&info, None)? })
}

impl Drop for SamplerState {
    fn drop(&mut self) {
        unsafe { self.shared.raw.destroy_sampler(self.raw, None) };
    }
}
