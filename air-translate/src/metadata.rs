//! Function metadata: the parsed shape of a single AIR entry point, as
//! consumed by the Runtime's `Library`/`Function`/descriptor-set-layout
//! builder (spec.md §3, §4.5, §4.6).
//!
//! AIR embeds this as LLVM named metadata on each function — conventional
//! node names like `air.buffer_bind`, `air.texture_bind`, `air.sampler_bind`,
//! `air.vertex_input_bind`, and `air.embedded_sampler`, each a tuple of
//! integer operands. [`crate::lower::air_metadata_tuples`] is the one place
//! that walks the `llvm-ir` module to produce these tuples; everything here
//! works on the plain `(String, Vec<i64>)` shape so it's testable without a
//! real bitcode module.

use air_types::{BindingType, FunctionType, SamplerAddressMode, SamplerBorderColor,
    SamplerMinMagFilter, SamplerMipFilter, TextureAccessType};

use crate::error::TranslationError;

/// A single resource binding as the API caller sees it, translated to the
/// Vulkan descriptor-set binding slot the lowering pass assigned it
/// (spec.md §3's `Binding`).
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub ty: BindingType,
    pub external_index: u32,
    pub internal_index: u32,
    pub texture_access: Option<TextureAccessType>,
    pub embedded_sampler_index: Option<u32>,
}

/// A sampler baked into the shader source (MSL `constexpr sampler`), fully
/// materialized here so the Runtime can build the `SamplerState` once at
/// `newLibrary` time (spec.md §4.5) instead of re-deriving it per use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbeddedSamplerDescriptor {
    pub min_filter: SamplerMinMagFilter,
    pub mag_filter: SamplerMinMagFilter,
    pub mip_filter: SamplerMipFilter,
    pub address_u: SamplerAddressMode,
    pub address_v: SamplerAddressMode,
    pub address_w: SamplerAddressMode,
    pub border_color: SamplerBorderColor,
    pub compare_enable: bool,
    pub max_anisotropy: u32,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
}

impl Default for EmbeddedSamplerDescriptor {
    fn default() -> Self {
        Self {
            min_filter: SamplerMinMagFilter::Nearest,
            mag_filter: SamplerMinMagFilter::Nearest,
            mip_filter: SamplerMipFilter::NotMipmapped,
            address_u: SamplerAddressMode::ClampToEdge,
            address_v: SamplerAddressMode::ClampToEdge,
            address_w: SamplerAddressMode::ClampToEdge,
            border_color: SamplerBorderColor::TransparentBlack,
            compare_enable: false,
            max_anisotropy: 1,
            lod_min_clamp: 0.0,
            lod_max_clamp: 1000.0,
        }
    }
}

/// Per-function metadata a `Library` indexes by name (spec.md §3's
/// `FunctionInfo`).
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub function_type: FunctionType,
    pub bindings: Vec<Binding>,
    pub embedded_samplers: Vec<EmbeddedSamplerDescriptor>,
}

impl FunctionInfo {
    pub fn buffer_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings
            .iter()
            .filter(|b| b.ty == BindingType::Buffer)
    }

    pub fn has_buffer_bindings(&self) -> bool {
        self.bindings.iter().any(|b| b.ty == BindingType::Buffer)
    }
}

fn access_from_code(code: i64) -> TextureAccessType {
    match code {
        1 => TextureAccessType::Read,
        2 => TextureAccessType::ReadWrite,
        3 => TextureAccessType::Write,
        _ => TextureAccessType::Sample,
    }
}

fn address_mode_from_code(code: i64) -> SamplerAddressMode {
    match code {
        1 => SamplerAddressMode::MirrorClampToEdge,
        2 => SamplerAddressMode::Repeat,
        3 => SamplerAddressMode::MirrorRepeat,
        4 => SamplerAddressMode::ClampToZero,
        5 => SamplerAddressMode::ClampToBorderColor,
        _ => SamplerAddressMode::ClampToEdge,
    }
}

fn border_color_from_code(code: i64) -> SamplerBorderColor {
    match code {
        1 => SamplerBorderColor::OpaqueBlack,
        2 => SamplerBorderColor::OpaqueWhite,
        _ => SamplerBorderColor::TransparentBlack,
    }
}

fn filter_from_code(code: i64) -> SamplerMinMagFilter {
    if code != 0 {
        SamplerMinMagFilter::Linear
    } else {
        SamplerMinMagFilter::Nearest
    }
}

fn mip_filter_from_code(code: i64) -> SamplerMipFilter {
    match code {
        1 => SamplerMipFilter::Nearest,
        2 => SamplerMipFilter::Linear,
        _ => SamplerMipFilter::NotMipmapped,
    }
}

/// Builds the ordered binding list and embedded-sampler table for one
/// function out of its raw AIR metadata tuples.
///
/// `bindings` come out already sorted by `internal_index`: the descriptor-set
/// layout builder (spec.md §4.6) and the per-draw descriptor writer (spec.md
/// §4.9) both want to walk bindings in ascending binding-slot order.
pub fn function_info_from_tuples(
    function_name: &str,
    function_type: FunctionType,
    tuples: &[(String, Vec<i64>)],
) -> Result<FunctionInfo, TranslationError> {
    let mut bindings = Vec::new();
    let mut embedded_samplers = Vec::new();

    for (kind, ops) in tuples {
        match kind.as_str() {
            "air.buffer_bind" => {
                let (ext, int) = require_pair(function_name, kind, ops)?;
                bindings.push(Binding {
                    ty: BindingType::Buffer,
                    external_index: ext,
                    internal_index: int,
                    texture_access: None,
                    embedded_sampler_index: None,
                });
            }
            "air.vertex_input_bind" => {
                let (ext, int) = require_pair(function_name, kind, ops)?;
                bindings.push(Binding {
                    ty: BindingType::VertexInput,
                    external_index: ext,
                    internal_index: int,
                    texture_access: None,
                    embedded_sampler_index: None,
                });
            }
            "air.texture_bind" => {
                if ops.len() < 3 {
                    return Err(TranslationError::UnrecognizedConstruct {
                        name: function_name.to_string(),
                        what: format!("{kind} metadata with {} operands", ops.len()),
                    });
                }
                bindings.push(Binding {
                    ty: BindingType::Texture,
                    external_index: ops[0] as u32,
                    internal_index: ops[1] as u32,
                    texture_access: Some(access_from_code(ops[2])),
                    embedded_sampler_index: None,
                });
            }
            "air.sampler_bind" => {
                let (ext, int) = require_pair(function_name, kind, ops)?;
                let embedded = ops.get(2).map(|&idx| idx as u32);
                bindings.push(Binding {
                    ty: BindingType::Sampler,
                    external_index: ext,
                    internal_index: int,
                    texture_access: None,
                    embedded_sampler_index: embedded,
                });
            }
            "air.embedded_sampler" => {
                if ops.len() < 11 {
                    return Err(TranslationError::UnrecognizedConstruct {
                        name: function_name.to_string(),
                        what: "air.embedded_sampler with too few operands".to_string(),
                    });
                }
                embedded_samplers.push(EmbeddedSamplerDescriptor {
                    min_filter: filter_from_code(ops[1]),
                    mag_filter: filter_from_code(ops[2]),
                    mip_filter: mip_filter_from_code(ops[3]),
                    address_u: address_mode_from_code(ops[4]),
                    address_v: address_mode_from_code(ops[5]),
                    address_w: address_mode_from_code(ops[6]),
                    border_color: border_color_from_code(ops[7]),
                    compare_enable: ops[8] != 0,
                    max_anisotropy: ops[9].max(1) as u32,
                    lod_min_clamp: ops[10] as f32 / 1000.0,
                    lod_max_clamp: ops.get(11).copied().unwrap_or(1_000_000) as f32 / 1000.0,
                });
            }
            _ => {
                // Metadata kinds AIR attaches that the Runtime doesn't need
                // (threadgroup-memory sizes, source-location info, ...) are
                // intentionally ignored rather than rejected.
            }
        }
    }

    bindings.sort_by_key(|b| b.internal_index);

    Ok(FunctionInfo {
        function_type,
        bindings,
        embedded_samplers,
    })
}

fn require_pair(
    function_name: &str,
    kind: &str,
    ops: &[i64],
) -> Result<(u32, u32), TranslationError> {
    if ops.len() < 2 {
        return Err(TranslationError::UnrecognizedConstruct {
            name: function_name.to_string(),
            what: format!("{kind} metadata with {} operands", ops.len()),
        });
    }
    Ok((ops[0] as u32, ops[1] as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_bindings_by_internal_index() {
        let tuples = vec![
            ("air.texture_bind".to_string(), vec![2, 3, 0]),
            ("air.buffer_bind".to_string(), vec![0, 0]),
            ("air.sampler_bind".to_string(), vec![1, 1]),
        ];
        let info =
            function_info_from_tuples("frag_main", FunctionType::Fragment, &tuples).unwrap();
        let internal_indices: Vec<u32> = info.bindings.iter().map(|b| b.internal_index).collect();
        assert_eq!(internal_indices, vec![0, 1, 3]);
        assert!(info.has_buffer_bindings());
    }

    #[test]
    fn embedded_sampler_decodes_filters() {
        let tuples = vec![(
            "air.embedded_sampler".to_string(),
            vec![0, 1, 0, 2, 0, 0, 0, 0, 0, 1, 0, 1000],
        )];
        let info =
            function_info_from_tuples("frag_main", FunctionType::Fragment, &tuples).unwrap();
        assert_eq!(info.embedded_samplers.len(), 1);
        assert_eq!(info.embedded_samplers[0].min_filter, SamplerMinMagFilter::Linear);
        assert_eq!(info.embedded_samplers[0].mip_filter, SamplerMipFilter::Linear);
    }
}
