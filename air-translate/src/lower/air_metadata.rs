//! Bridges AIR's named-metadata convention (`air.vertex`/`air.fragment`/
//! `air.kernel` root nodes, each parameter tagged with a kind like
//! `air.buffer`/`air.texture`/`air.sampler` plus `air.location_index`
//! key/value pairs) into the flat tuples [`crate::metadata`] consumes.
//!
//! Grounded on `AIR::Function::analyze`'s metadata walk
//! (`src/iridium/air.cpp`): it looks up the named metadata node matching the
//! function's stage, then walks its parameter-info operand list, switching
//! on each parameter's leading string operand.

use llvm_ir::module::{Metadata, MetadataNode};
use llvm_ir::{Module, Name};

use crate::error::TranslationError;
use air_types::FunctionType;

/// The stage-defining named metadata node a function is listed under, and
/// the [`FunctionType`] that implies.
const ROOT_KINDS: &[(&str, FunctionType)] = &[
    ("air.vertex", FunctionType::Vertex),
    ("air.fragment", FunctionType::Fragment),
    ("air.kernel", FunctionType::Kernel),
];

/// Finds which of `air.vertex`/`air.fragment`/`air.kernel` lists this
/// function, confirming the container's `TYPE` tag and the bitcode's own
/// metadata agree, and returns that root tuple's operands for
/// [`parameter_metadata_tuples`] to walk.
pub fn find_function_root(
    module: &Module,
    function_name: &str,
) -> Option<(FunctionType, Vec<Option<Metadata>>)> {
    for (root_name, ty) in ROOT_KINDS {
        let Some(operands) = module.named_metadata.get(*root_name) else {
            continue;
        };
        for node_id in operands {
            let Some(MetadataNode::Tuple(entries)) = module.metadata.get(*node_id) else {
                continue;
            };
            if let Some(Metadata::Value(value)) = entries.first().and_then(|e| e.as_ref()) {
                if value_references_function(value, function_name) {
                    return Some((*ty, entries.clone()));
                }
            }
        }
    }
    None
}

fn value_references_function(value: &llvm_ir::Operand, function_name: &str) -> bool {
    match value {
        llvm_ir::Operand::ConstantOperand(c) => match c.as_ref() {
            llvm_ir::constant::Constant::GlobalReference { name, .. } => {
                matches!(name, Name::Name(n) if n.as_str() == function_name)
            }
            _ => false,
        },
        _ => false,
    }
}

/// Extracts one function's parameter-binding metadata as `(kind, key/value
/// pairs)` tuples, in parameter order. `kind` is the AIR metadata string
/// (`"air.buffer"`, `"air.texture"`, ...); the key/value pairs carry
/// `air.location_index`, `air.arg_type_name`, and similar sub-records, with
/// string keys that don't resolve to an integer coerced to `0`.
pub fn parameter_metadata_tuples(
    module: &Module,
    function_name: &str,
    root_node: &[Option<Metadata>],
) -> Result<Vec<(String, Vec<(String, i64)>)>, TranslationError> {
    // Parameter info lives in the root tuple's third operand (index 2):
    // [returnValueInfo, parameterInfoList, ...] per `AIR::Function::analyze`.
    let Some(Metadata::Node(param_list_id)) = root_node.get(2).and_then(|m| m.as_ref()) else {
        return Ok(Vec::new());
    };
    let Some(MetadataNode::Tuple(params)) = module.metadata.get(*param_list_id) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for param in params {
        let Some(Metadata::Node(param_id)) = param else {
            continue;
        };
        let Some(MetadataNode::Tuple(fields)) = module.metadata.get(*param_id) else {
            continue;
        };
        let Some(Metadata::String(kind)) = fields.first().and_then(|f| f.as_ref()) else {
            return Err(TranslationError::UnrecognizedConstruct {
                name: function_name.to_string(),
                what: "parameter metadata missing its leading kind string".to_string(),
            });
        };

        let mut pairs = Vec::new();
        let mut iter = fields[1..].iter();
        while let Some(Some(Metadata::String(key))) = iter.next() {
            let value = match iter.next() {
                Some(Some(Metadata::Constant(c))) => constant_to_i64(c),
                Some(Some(Metadata::String(s))) => s.parse().unwrap_or(0),
                _ => 0,
            };
            pairs.push((key.clone(), value));
        }

        out.push((kind.clone(), pairs));
    }

    Ok(out)
}

fn constant_to_i64(constant: &llvm_ir::constant::Constant) -> i64 {
    match constant {
        llvm_ir::constant::Constant::Int { value, .. } => *value as i64,
        _ => 0,
    }
}

fn kv(pairs: &[(String, i64)], key: &str) -> Option<i64> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
}

/// Normalizes AIR's key/value parameter metadata into the positional tuples
/// [`crate::metadata::function_info_from_tuples`] expects.
///
/// Metal buffer/texture/sampler indices double as the Vulkan binding slot:
/// this translator assigns `internal_index == external_index` rather than
/// repacking bindings, so a shader's `[[buffer(2)]]` argument lands at
/// Vulkan binding 2. `next_buffer`/`next_texture`/`next_sampler` only cover
/// AIR metadata that omits an explicit index.
pub fn parameter_tuples_to_positional(
    pairs: Vec<(String, Vec<(String, i64)>)>,
) -> Vec<(String, Vec<i64>)> {
    let mut next_buffer = 0u32;
    let mut next_texture = 0u32;
    let mut next_sampler = 0u32;
    let mut out = Vec::new();

    for (kind, fields) in pairs {
        match kind.as_str() {
            "air.buffer" => {
                let index = kv(&fields, "air.buffer_index")
                    .or_else(|| kv(&fields, "air.location_index"))
                    .unwrap_or(next_buffer as i64) as u32;
                next_buffer = index + 1;
                out.push(("air.buffer_bind".to_string(), vec![index as i64, index as i64]));
            }
            "air.texture" => {
                let index = kv(&fields, "air.location_index").unwrap_or(next_texture as i64) as u32;
                next_texture = index + 1;
                let access = if kv(&fields, "air.read_write").unwrap_or(0) != 0 {
                    2
                } else if kv(&fields, "air.write").unwrap_or(0) != 0 {
                    3
                } else {
                    0
                };
                out.push((
                    "air.texture_bind".to_string(),
                    vec![index as i64, index as i64, access],
                ));
            }
            "air.sampler" => {
                let index = kv(&fields, "air.location_index").unwrap_or(next_sampler as i64) as u32;
                next_sampler = index + 1;
                out.push(("air.sampler_bind".to_string(), vec![index as i64, index as i64]));
            }
            "air.vertex_input" | "air.stage_in" => {
                let index = kv(&fields, "air.location_index").unwrap_or(0);
                out.push(("air.vertex_input_bind".to_string(), vec![index, index]));
            }
            _ => {
                // Built-ins (air.vertex_id, air.position, air.thread_position_in_grid,
                // air.fragment_input, ...) aren't resource bindings; `lower`
                // wires them to SPIR-V built-in variables directly.
            }
        }
    }

    out
}
