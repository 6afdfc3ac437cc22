//! Dynamic resolution of the Vulkan and LLVM entry points (spec.md §6
//! Environment, §9 "Dynamically loaded Vulkan/LLVM entry points").
//!
//! On a Darwin-compatible host these would be resolved through an
//! `elfcalls`-based host-library loader; everywhere else, plain `dlopen` of
//! `libvulkan.so.1` and `libLLVM`. Both paths collapse to the same shape:
//! a library handle resolved once and memoized. Grounded on `wgpu-hal`'s
//! optional `libloading`-gated Vulkan entry resolution (the `vulkan` feature
//! pulls in `dep:libloading` so `ash::Entry::load` can `dlopen` the driver),
//! generalized here to also resolve `libLLVM` for the Translator's bitcode
//! reader.

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};

static VULKAN_ENTRY: OnceCell<ash::Entry> = OnceCell::new();
static LLVM_LIBRARY: OnceCell<libloading::Library> = OnceCell::new();

/// Candidate sonames to try, in order, when `dlopen`ing the Vulkan loader.
#[cfg(not(target_os = "macos"))]
const VULKAN_SONAMES: &[&str] = &["libvulkan.so.1", "libvulkan.so"];
#[cfg(target_os = "macos")]
const VULKAN_SONAMES: &[&str] = &["libvulkan.dylib", "libMoltenVK.dylib"];

#[cfg(not(target_os = "macos"))]
const LLVM_SONAMES: &[&str] = &["libLLVM.so", "libLLVM-18.so", "libLLVM-17.so"];
#[cfg(target_os = "macos")]
const LLVM_SONAMES: &[&str] = &["libLLVM.dylib"];

/// Returns the process-wide [`ash::Entry`], loading `libvulkan` lazily on
/// first call. Every subsequent call returns the same handle.
pub fn vulkan_entry() -> Result<&'static ash::Entry> {
    if let Some(entry) = VULKAN_ENTRY.get() {
        return Ok(entry);
    }
    // SAFETY: loading the Vulkan loader library and resolving its exported
    // entry points is the documented contract of `ash::Entry::load`; the
    // caller (this module) owns the resulting `Entry` for the process
    // lifetime via the `OnceCell`.
    let entry = unsafe { ash::Entry::load() }
        .map_err(|e| Error::InitializationFailed(format!("failed to load Vulkan loader: {e}")))?;
    Ok(VULKAN_ENTRY.get_or_init(|| entry))
}

/// Resolves a symbol out of `libLLVM`, used by the bitcode-reader
/// collaborator (out of scope per spec.md §1, but its host library still
/// has to be found). `dlopen`s the library lazily on first call.
pub fn llvm_symbol(name: &str) -> Result<*const std::ffi::c_void> {
    let lib = match LLVM_LIBRARY.get() {
        Some(lib) => lib,
        None => {
            let lib = open_first(LLVM_SONAMES)
                .ok_or_else(|| Error::InitializationFailed("could not locate libLLVM".to_string()))?;
            LLVM_LIBRARY.get_or_init(|| lib)
        }
    };
    unsafe {
        lib.get::<*const std::ffi::c_void>(name.as_bytes())
            .map(|sym| *sym)
            .map_err(|e| Error::InitializationFailed(format!("libLLVM has no symbol '{name}': {e}")))
    }
}

fn open_first(sonames: &[&str]) -> Option<libloading::Library> {
    sonames
        .iter()
        .find_map(|name| unsafe { libloading::Library::new(name).ok() })
}

/// True once the Vulkan loader is resolved and a `vkCreateInstance`-capable
/// entry point exists; used by `Device::create_system_default_device` to
/// fail fast with `InitializationFailed` rather than a later GPU error.
pub fn vulkan_available() -> bool {
    vulkan_entry().is_ok()
}

