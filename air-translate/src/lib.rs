//! Parses a Metal library container and translates each of its entry
//! points from AIR bitcode to SPIR-V (spec.md §1, §6).
//!
//! The public surface is deliberately small: [`translate_library`] is the
//! one entry point `mtlvk::Library::new` calls. Everything else is
//! internal plumbing split across [`container`] (container/TLV parsing),
//! [`metadata`] (binding/embedded-sampler extraction), [`spirv`] (the
//! SPIR-V module builder), and [`lower`] (AIR → SPIR-V instruction
//! lowering).

mod container;
mod error;
pub mod metadata;
mod lower;
mod spirv;

pub use error::TranslationError;
pub use metadata::{Binding, EmbeddedSamplerDescriptor, FunctionInfo};

use air_types::FunctionType;

/// One translated entry point: its SPIR-V words and the metadata the
/// Runtime needs to build a descriptor-set layout and pipeline for it.
pub struct TranslatedFunction {
    pub name: String,
    pub spirv: Vec<u32>,
    pub info: FunctionInfo,
}

/// A whole library's worth of translated entry points, in container order.
pub struct TranslatedLibrary {
    pub functions: Vec<TranslatedFunction>,
}

impl TranslatedLibrary {
    pub fn function(&self, name: &str) -> Option<&TranslatedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

/// Only called after `RawFunctionKind::is_entry_point` has already filtered
/// out the ray-tracing/visible-function kinds this translator rejects.
fn container_kind_to_function_type(kind: container::RawFunctionKind) -> FunctionType {
    match kind {
        container::RawFunctionKind::Vertex => FunctionType::Vertex,
        container::RawFunctionKind::Fragment => FunctionType::Fragment,
        container::RawFunctionKind::Kernel => FunctionType::Kernel,
        _ => unreachable!("non-entry-point kinds are filtered before this is called"),
    }
}

/// `llvm-ir`'s bitcode reader goes through LLVM's C API, which only reads
/// bitcode from a file path, not a byte slice — so each function's bitcode
/// range gets written to a scratch file before parsing. Grounded on how
/// naga's `front::spv` siblings in the wider Vulkan ecosystem typically
/// shell out to on-disk scratch files for FFI-backed parsers.
fn parse_bitcode_module(function_name: &str, bitcode: &[u8]) -> Result<llvm_ir::Module, TranslationError> {
    let mut file = tempfile::Builder::new()
        .suffix(".bc")
        .tempfile()
        .map_err(|e| TranslationError::BadBitcode { name: function_name.to_string(), reason: e.to_string() })?;
    std::io::Write::write_all(&mut file, bitcode)
        .map_err(|e| TranslationError::BadBitcode { name: function_name.to_string(), reason: e.to_string() })?;

    llvm_ir::Module::from_bc_path(file.path()).map_err(|reason| TranslationError::BadBitcode {
        name: function_name.to_string(),
        reason,
    })
}

/// Parses `bytes` as a Metal library and translates every vertex, fragment,
/// and kernel entry point it contains. Ray-tracing/visible-function kinds
/// are skipped rather than erroring the whole library, matching
/// `newLibrary`'s behavior of lazily failing only when such a function is
/// actually looked up (spec.md §4.5).
pub fn translate_library(bytes: &[u8]) -> Result<TranslatedLibrary, TranslationError> {
    let header = container::parse_header(bytes)?;
    let entries = container::parse_function_list(bytes, &header)?;

    let mut functions = Vec::new();
    for entry in &entries {
        if !entry.kind.is_entry_point() {
            continue;
        }
        let function_type = container_kind_to_function_type(entry.kind);
        let bitcode = container::bitcode_slice(bytes, entry)?;
        let module = parse_bitcode_module(&entry.name, bitcode)?;

        let llvm_function = module
            .functions
            .iter()
            .find(|f| f.name == entry.name)
            .ok_or_else(|| TranslationError::BadBitcode {
                name: entry.name.clone(),
                reason: "bitcode module has no function matching the container's NAME tag".to_string(),
            })?;

        let root_node = lower::find_function_root(&module, &entry.name).map(|(_, node)| node).unwrap_or_default();
        let raw_tuples = lower::parameter_metadata_tuples(&module, &entry.name, &root_node)?;
        let positional = lower::parameter_tuples_to_positional(raw_tuples);
        let info = metadata::function_info_from_tuples(&entry.name, function_type, &positional)?;

        let lowered = lower::lower_function(llvm_function, function_type, &info)?;

        functions.push(TranslatedFunction {
            name: entry.name.clone(),
            spirv: lowered.words,
            info,
        });
    }

    Ok(TranslatedLibrary { functions })
}
