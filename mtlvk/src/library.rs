//! `Library` and `Function` (spec.md §4.5).
//!
//! `newLibrary` runs the Translator once, builds the Vulkan shader module
//! over its SPIR-V, and materializes a `SamplerState` per embedded sampler.
//! Grounded on `original_source/src/indium/library.cpp`'s eager
//! name→`FunctionInfo` map construction.

use std::collections::HashMap;
use std::sync::Arc;

use air_translate::{FunctionInfo, TranslatedLibrary};
use ash::vk;

use crate::device::Device;
use crate::error::Result;
use crate::sampler::{SamplerDescriptor, SamplerState};

struct FunctionEntry {
    module: vk::ShaderModule,
    info: FunctionInfo,
    embedded_samplers: Vec<Arc<SamplerState>>,
}

pub struct Library {
    device: Arc<Device>,
    functions: HashMap<String, FunctionEntry>,
}

impl Library {
    /// Parses `bytes` as a Metal library, translating every entry point and
    /// creating its `VkShaderModule` eagerly (spec.md §4.5).
    pub fn new(device: &Arc<Device>, bytes: &[u8]) -> Result<Arc<Library>> {
        let translated: TranslatedLibrary = air_translate::translate_library(bytes)?;
        log::debug!("parsed Metal library: {} entry point(s)", translated.functions.len());

        let mut functions = HashMap::new();
        for f in translated.functions {
            let info = vec_u32_to_module(device, &f.spirv)?;
            let mut embedded_samplers = Vec::with_capacity(f.info.embedded_samplers.len());
            for descriptor in &f.info.embedded_samplers {
                embedded_samplers.push(SamplerState::new(device, embedded_sampler_descriptor(descriptor))?);
            }
            functions.insert(f.name, FunctionEntry { module: info, info: f.info, embedded_samplers });
        }

        Ok(Arc::new(Library { device: device.clone(), functions }))
    }

    pub fn function(self: &Arc<Self>, name: &str) -> Option<Function> {
        self.functions.get(name).map(|_| Function { library: self.clone(), name: name.to_string() })
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        for entry in self.functions.values() {
            unsafe { self.device.shared.raw.destroy_shader_module(entry.module, None) };
        }
    }
}

/// A named entry in a `Library` plus its metadata; a plain record, per
/// spec.md §9's redesign note for "virtual dispatch for shader functions".
#[derive(Clone)]
pub struct Function {
    pub(crate) library: Arc<Library>,
    pub(crate) name: String,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn module(&self) -> vk::ShaderModule {
        self.library.functions[&self.name].module
    }

    pub fn info(&self) -> &FunctionInfo {
        &self.library.functions[&self.name].info
    }

    pub(crate) fn embedded_samplers(&self) -> &[Arc<SamplerState>] {
        &self.library.functions[&self.name].embedded_samplers
    }
}

fn vec_u32_to_module(device: &Arc<Device>, words: &[u32]) -> Result<vk::ShaderModule> {
    let info = vk::ShaderModuleCreateInfo::default().code(words);
    Ok(unsafe { device.shared.raw.create_shader_module(&info, None)? })
}

fn embedded_sampler_descriptor(descriptor: &air_translate::EmbeddedSamplerDescriptor) -> SamplerDescriptor {
    SamplerDescriptor {
        min_filter: descriptor.min_filter,
        mag_filter: descriptor.mag_filter,
        mip_filter: descriptor.mip_filter,
        address_u: descriptor.address_u,
        address_v: descriptor.address_v,
        address_w: descriptor.address_w,
        border_color: descriptor.border_color,
        ..SamplerDescriptor::default()
    }
}
