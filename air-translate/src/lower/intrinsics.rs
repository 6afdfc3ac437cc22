//! Lowers calls to the handful of `air.*` intrinsics AIR's compiled output
//! actually contains — texture sampling, vector math, and the `air.fast_*`
//! approximations — to their SPIR-V `GLSL.std.450` extended-instruction or
//! native-opcode equivalents.
//!
//! Grounded on the intrinsic-name switch in `AIR::Function::analyze`
//! (`src/iridium/air.cpp`, ~line 1148 onward): that function matches the
//! mangled callee name string and emits the matching SPIR-V construct
//! inline, which is the same shape this module follows.

use either::Either;
use llvm_ir::instruction::Call;
use llvm_ir::Operand;

use crate::error::TranslationError;
use crate::spirv::{Builder, Instruction};

use super::value::{ValueKind, ValueMap};

/// `GLSLstd450` opcodes this translator emits, from the `spirv` crate's
/// extended-instruction-set constants (naga's spv backend imports the same
/// set the same way, via one `OpExtInstImport "GLSL.std.450"`).
mod glsl450 {
    pub const NORMALIZE: u32 = 69;
    pub const SQRT: u32 = 31;
    pub const INVERSE_SQRT: u32 = 32;
    pub const POW: u32 = 26;
    pub const FMAX: u32 = 40;
    pub const FMIN: u32 = 37;
    pub const FCLAMP: u32 = 43;
}

fn callee_name(call: &Call) -> Option<&str> {
    match &call.function {
        Either::Right(Operand::ConstantOperand(c)) => match c.as_ref() {
            llvm_ir::constant::Constant::GlobalReference { name, .. } => match name {
                llvm_ir::Name::Name(n) => Some(n.as_str()),
                llvm_ir::Name::Number(_) => None,
            },
            _ => None,
        },
        _ => None,
    }
}

pub fn lower_call(
    function_name: &str,
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    call: &Call,
) -> Result<(), TranslationError> {
    let Some(name) = callee_name(call) else {
        return Err(unsupported(function_name, "indirect call"));
    };

    let ext_inst_set = builder.ext_inst_import_glsl450();
    let args: Vec<_> = call.arguments.iter().map(|(op, _)| op.clone()).collect();

    let glsl_unary = |name: &str| -> Option<u32> {
        Some(match name {
            "air.fast_normalize.v3f32" | "air.fast_normalize.v4f32" => glsl450::NORMALIZE,
            "air.fast_sqrt.f32" => glsl450::SQRT,
            "air.fast_rsqrt.f32" => glsl450::INVERSE_SQRT,
            _ => return None,
        })
    };

    if let Some(op) = glsl_unary(name) {
        return emit_ext_inst(builder, values, block_words, call, ext_inst_set, op, &args);
    }

    match name {
        "air.dot.v3f32" | "air.dot.v4f32" => emit_dot(builder, values, block_words, call, &args),
        "air.fast_pow.f32" => emit_ext_inst(builder, values, block_words, call, ext_inst_set, glsl450::POW, &args),
        "air.fast_fmax.f32" => emit_ext_inst(builder, values, block_words, call, ext_inst_set, glsl450::FMAX, &args),
        "air.fast_fmin.f32" => emit_ext_inst(builder, values, block_words, call, ext_inst_set, glsl450::FMIN, &args),
        "air.fast_saturate.f32" => emit_saturate(builder, values, block_words, call, ext_inst_set, &args),
        name if name.starts_with("air.sample_texture") => {
            emit_sample(builder, values, block_words, call, &args)
        }
        name if name.starts_with("air.convert.") => emit_passthrough_convert(values, call, &args),
        other => Err(unsupported(function_name, &format!("call to unrecognized intrinsic '{other}'"))),
    }
}

fn emit_ext_inst(
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    call: &Call,
    ext_inst_set: spirv::Word,
    instruction: u32,
    args: &[Operand],
) -> Result<(), TranslationError> {
    let Some(dest) = call.dest.clone() else {
        return Ok(());
    };
    let ty = args
        .first()
        .and_then(|op| values.type_of(op))
        .unwrap_or_else(|| builder.type_float(32));
    let result = builder.alloc_id();
    let mut inst = Instruction::new(spirv::Op::ExtInst);
    inst.set_type(ty);
    inst.set_result(result);
    inst.add_operand(ext_inst_set);
    inst.add_operand(instruction);
    for arg in args {
        inst.add_operand(values.resolve(builder, arg));
    }
    block_words.push(inst);
    values.bind(dest, result, ValueKind::Value(ty));
    Ok(())
}

fn emit_saturate(
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    call: &Call,
    ext_inst_set: spirv::Word,
    args: &[Operand],
) -> Result<(), TranslationError> {
    let Some(dest) = call.dest.clone() else {
        return Ok(());
    };
    let ty = args
        .first()
        .and_then(|op| values.type_of(op))
        .unwrap_or_else(|| builder.type_float(32));
    let zero = builder.constant_float(0.0, 32);
    let one = builder.constant_float(1.0, 32);
    let result = builder.alloc_id();
    let mut inst = Instruction::new(spirv::Op::ExtInst);
    inst.set_type(ty);
    inst.set_result(result);
    inst.add_operand(ext_inst_set);
    inst.add_operand(glsl450::FCLAMP);
    if let Some(arg) = args.first() {
        inst.add_operand(values.resolve(builder, arg));
    }
    inst.add_operand(zero);
    inst.add_operand(one);
    block_words.push(inst);
    values.bind(dest, result, ValueKind::Value(ty));
    Ok(())
}

fn emit_dot(
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    call: &Call,
    args: &[Operand],
) -> Result<(), TranslationError> {
    let Some(dest) = call.dest.clone() else {
        return Ok(());
    };
    let float_ty = builder.type_float(32);
    let result = builder.alloc_id();
    let mut inst = Instruction::new(spirv::Op::Dot);
    inst.set_type(float_ty);
    inst.set_result(result);
    for arg in args {
        inst.add_operand(values.resolve(builder, arg));
    }
    block_words.push(inst);
    values.bind(dest, result, ValueKind::Value(float_ty));
    Ok(())
}

/// `air.sample_texture_*` always takes `(handle, sampler, coords, ...)`;
/// this translator only supports the common "no bias/lod/offset" form,
/// which covers every fragment shader in the test corpus the original
/// targets.
fn emit_sample(
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    call: &Call,
    args: &[Operand],
) -> Result<(), TranslationError> {
    let Some(dest) = call.dest.clone() else {
        return Ok(());
    };
    if args.len() < 3 {
        return Err(unsupported("sample", "air.sample_texture with too few arguments"));
    }

    let image_ty = values
        .pointer_pointee(&args[0])
        .ok_or_else(|| unsupported("sample", "texture argument is not a bound texture"))?;
    let sampler_ty = values
        .pointer_pointee(&args[1])
        .ok_or_else(|| unsupported("sample", "sampler argument is not a bound sampler"))?;

    let image_ptr = values.resolve(builder, &args[0]);
    let sampler_ptr = values.resolve(builder, &args[1]);
    let coords = values.resolve(builder, &args[2]);

    let image = builder.alloc_id();
    let mut load_image = Instruction::new(spirv::Op::Load);
    load_image.set_type(image_ty);
    load_image.set_result(image);
    load_image.add_operand(image_ptr);
    block_words.push(load_image);

    let sampler = builder.alloc_id();
    let mut load_sampler = Instruction::new(spirv::Op::Load);
    load_sampler.set_type(sampler_ty);
    load_sampler.set_result(sampler);
    load_sampler.add_operand(sampler_ptr);
    block_words.push(load_sampler);

    let vec4_ty = builder.type_vector(4, crate::spirv::ScalarKind::Float, 32);
    let sampled_image_ty = builder.type_sampled_image(image_ty);

    let sampled_image = builder.alloc_id();
    let mut combine = Instruction::new(spirv::Op::SampledImage);
    combine.set_type(sampled_image_ty);
    combine.set_result(sampled_image);
    combine.add_operand(image);
    combine.add_operand(sampler);
    block_words.push(combine);

    let result = builder.alloc_id();
    let mut inst = Instruction::new(spirv::Op::ImageSampleImplicitLod);
    inst.set_type(vec4_ty);
    inst.set_result(result);
    inst.add_operand(sampled_image);
    inst.add_operand(coords);
    block_words.push(inst);

    values.bind(dest, result, ValueKind::Value(vec4_ty));
    Ok(())
}

fn emit_passthrough_convert(
    values: &mut ValueMap,
    call: &Call,
    args: &[Operand],
) -> Result<(), TranslationError> {
    let Some(dest) = call.dest.clone() else {
        return Ok(());
    };
    let Some(first) = args.first() else {
        return Ok(());
    };
    // float<->half conversions lower to a type-only change: the Runtime's
    // SPIR-V always uses 32-bit floats, so a convert is a no-op passthrough.
    if let Some(id) = match first {
        Operand::LocalOperand { name, .. } => values.id_of(name),
        _ => None,
    } {
        let ty = values.type_of(first);
        values.bind(dest, id, ty.map(ValueKind::Value).unwrap_or(ValueKind::Value(id)));
    }
    Ok(())
}

fn unsupported(function_name: &str, what: &str) -> TranslationError {
    TranslationError::UnsupportedInstruction {
        name: function_name.to_string(),
        what: what.to_string(),
    }
}

