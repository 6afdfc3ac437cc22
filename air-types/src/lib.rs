//! Enumerations for the Metal-shaped surface this project exposes, plus the
//! translation tables that map them onto their Vulkan 1.3 equivalents.
//!
//! This crate carries no GPU state of its own — it is pure data and pure
//! functions, the lowest layer in the dependency order (types depend on
//! nothing else in the workspace).

mod enums;
mod error;

#[cfg(feature = "vulkan")]
mod vk_convert;

pub use enums::*;
pub use error::BadEnumValue;

#[cfg(feature = "vulkan")]
pub use vk_convert::*;
