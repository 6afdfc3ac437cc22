//! `ComputePipelineState` (spec.md §3, §4.7): one descriptor-set layout and
//! a cache of pipelines specialized per threads-per-threadgroup triple.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use crate::device::{Device, DeviceShared};
use crate::error::Result;
use crate::library::Function;
use crate::pipeline::descriptor_layout;

/// Threads-per-threadgroup, used both as the specialization key and as the
/// constant values fed to the shader (spec.md §4.7).
pub type ThreadgroupSize = (u32, u32, u32);

pub struct ComputePipelineState {
    device: Arc<Device>,
    pub(crate) function: Function,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pub(crate) set_counts: gpu_descriptor::DescriptorTotalCount,
    pub(crate) layout: vk::PipelineLayout,
    specialized: Mutex<HashMap<ThreadgroupSize, vk::Pipeline>>,
}

impl ComputePipelineState {
    pub fn new(device: &Arc<Device>, function: Function) -> Result<Arc<ComputePipelineState>> {
        let shared = &device.shared;
        let built = descriptor_layout::build(shared, function.info())?;
        let (set_layout, set_counts) = (built.layout, built.counts);
        let set_layouts = [set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let layout = match unsafe { shared.raw.create_pipeline_layout(&layout_info, None) } {
            Ok(l) => l,
            Err(e) => {
                unsafe { shared.raw.destroy_descriptor_set_layout(set_layout, None) };
                return Err(e.into());
            }
        };

        Ok(Arc::new(ComputePipelineState {
            device: device.clone(),
            function,
            set_layout,
            set_counts,
            layout,
            specialized: Mutex::new(HashMap::new()),
        }))
    }

    /// Returns the pipeline specialized to `size`, creating (and caching)
    /// it on first use. Retained until the owning encoder (and, through it,
    /// this `ComputePipelineState`) is dropped (spec.md §4.7, §4.10).
    pub(crate) fn pipeline_for(&self, size: ThreadgroupSize) -> Result<vk::Pipeline> {
        let mut cache = self.specialized.lock();
        if let Some(&pipeline) = cache.get(&size) {
            return Ok(pipeline);
        }
        let pipeline = build_specialized(&self.device.shared, self.function.module(), self.layout, size)?;
        cache.insert(size, pipeline);
        Ok(pipeline)
    }
}

impl Drop for ComputePipelineState {
    fn drop(&mut self) {
        let raw = &self.device.shared.raw;
        unsafe {
            for &pipeline in self.specialized.get_mut().values() {
                raw.destroy_pipeline(pipeline, None);
            }
            raw.destroy_pipeline_layout(self.layout, None);
            raw.destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

fn build_specialized(shared: &DeviceShared, module: vk::ShaderModule, layout: vk::PipelineLayout, size: ThreadgroupSize) -> Result<vk::Pipeline> {
    let entries = [
        vk::SpecializationMapEntry::default().constant_id(0).offset(0).size(4),
        vk::SpecializationMapEntry::default().constant_id(1).offset(4).size(4),
        vk::SpecializationMapEntry::default().constant_id(2).offset(8).size(4),
    ];
    let data = [size.0, size.1, size.2];
    let data_bytes: &[u8] = u32_slice_as_bytes(&data);
    let specialization = vk::SpecializationInfo::default().map_entries(&entries).data(data_bytes);

    let entry_name = std::ffi::CStr::from_bytes_with_nul(b"main\0").expect("valid C string");
    let stage = vk::PipelineShaderStageCreateInfo::default()
        .stage(vk::ShaderStageFlags::COMPUTE)
        .module(module)
        .name(entry_name)
        .specialization_info(&specialization);

    let create_info = vk::ComputePipelineCreateInfo::default().stage(stage).layout(layout);

    let result = unsafe { shared.raw.create_compute_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None) };
    match result {
        Ok(created) => Ok(created[0]),
        Err((_, result)) => Err(result.into()),
    }
}

fn u32_slice_as_bytes(data: &[u32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), std::mem::size_of_val(data)) }
}
