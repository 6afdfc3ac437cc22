//! Tracks the SPIR-V id and SPIR-V type each LLVM SSA value lowers to.

use llvm_ir::{Name, Operand, Type, TypeRef};
use rustc_hash::FxHashMap;
use spirv::Word;

use crate::spirv::{Builder, ScalarKind};

#[derive(Clone, Copy)]
pub enum ValueKind {
    /// A value of the given SPIR-V type id.
    Value(Word),
    /// A `Function`-storage-class pointer to the given pointee type id.
    Pointer(Word),
    /// A `PhysicalStorageBuffer`-storage-class pointer to the given pointee
    /// type id (spec.md §4.6's per-binding device address). Loads/stores
    /// through one of these need the `Aligned` memory operand SPIR-V
    /// requires for this storage class.
    PhysicalPointer(Word),
}

#[derive(Default)]
pub struct ValueMap {
    ids: FxHashMap<Name, Word>,
    types: FxHashMap<Name, ValueKind>,
    constants: FxHashMap<(u64, u8), Word>,
}

impl ValueMap {
    pub fn bind(&mut self, name: Name, id: Word, kind: ValueKind) {
        self.ids.insert(name.clone(), id);
        self.types.insert(name, kind);
    }

    /// Resolves an operand to its SPIR-V id, materializing integer/float
    /// constant operands into `OpConstant`s on demand (deduplicated by the
    /// builder's type arena, so repeated literals share one id).
    pub fn resolve(&mut self, builder: &mut Builder, operand: &Operand) -> Word {
        match operand {
            Operand::LocalOperand { name, .. } => self
                .ids
                .get(name)
                .copied()
                .unwrap_or_else(|| builder.type_void()),
            Operand::ConstantOperand(c) => self.resolve_constant(builder, c),
            Operand::MetadataOperand => builder.type_void(),
        }
    }

    fn resolve_constant(&mut self, builder: &mut Builder, constant: &llvm_ir::constant::Constant) -> Word {
        use llvm_ir::constant::Constant;
        match constant {
            Constant::Int { bits, value } => {
                let key = (*value, (*bits).min(64) as u8);
                if let Some(&id) = self.constants.get(&key) {
                    return id;
                }
                let id = builder.constant_uint(*value, (*bits).min(64) as u8);
                self.constants.insert(key, id);
                id
            }
            Constant::Float(f) => {
                let value = match f {
                    llvm_ir::constant::Float::Single(v) => *v as f64,
                    llvm_ir::constant::Float::Double(v) => *v,
                    _ => 0.0,
                };
                builder.constant_float(value, 32)
            }
            _ => builder.constant_uint(0, 32),
        }
    }

    pub fn type_of(&self, operand: &Operand) -> Option<Word> {
        match operand {
            Operand::LocalOperand { name, .. } => match self.types.get(name)? {
                ValueKind::Value(ty) => Some(*ty),
                ValueKind::Pointer(_) | ValueKind::PhysicalPointer(_) => None,
            },
            _ => None,
        }
    }

    pub fn id_of(&self, name: &Name) -> Option<Word> {
        self.ids.get(name).copied()
    }

    pub fn pointer_pointee(&self, operand: &Operand) -> Option<Word> {
        match operand {
            Operand::LocalOperand { name, .. } => match self.types.get(name)? {
                ValueKind::Pointer(pointee) | ValueKind::PhysicalPointer(pointee) => Some(*pointee),
                ValueKind::Value(_) => None,
            },
            _ => None,
        }
    }

    /// Whether `operand` is a `PhysicalStorageBuffer` pointer, so load/store
    /// lowering knows to attach the `Aligned` memory operand SPIR-V requires
    /// for that storage class.
    pub fn is_physical_pointer(&self, operand: &Operand) -> bool {
        match operand {
            Operand::LocalOperand { name, .. } => matches!(self.types.get(name), Some(ValueKind::PhysicalPointer(_))),
            _ => false,
        }
    }
}

/// A free function (not a method, since it needs `&mut Builder` alongside
/// `&mut ValueMap` without a double-borrow) that actually declares SPIR-V
/// types for the common LLVM shapes, used by `resolve_llvm_type`'s callers
/// in `lower::mod` once the function's parameter/local types are known.
pub fn declare_llvm_type(builder: &mut Builder, ty: &TypeRef) -> Word {
    match ty.as_ref() {
        Type::VoidType => builder.type_void(),
        Type::IntegerType { bits } => {
            let width = if *bits <= 8 { 8 } else if *bits <= 16 { 16 } else if *bits <= 32 { 32 } else { 64 };
            builder.type_int(width as u8, true)
        }
        Type::FPType(fp) => {
            let width = match fp {
                llvm_ir::types::FPType::Half => 16,
                llvm_ir::types::FPType::Single => 32,
                llvm_ir::types::FPType::Double => 64,
                _ => 32,
            };
            builder.type_float(width)
        }
        Type::VectorType { element_type, num_elements, .. } => {
            let elem_kind = match element_type.as_ref() {
                Type::IntegerType { .. } => ScalarKind::Sint,
                _ => ScalarKind::Float,
            };
            builder.type_vector(*num_elements as u8, elem_kind, 32)
        }
        Type::PointerType { pointee_type, .. } => {
            let pointee = declare_llvm_type(builder, pointee_type);
            builder.type_pointer(spirv::StorageClass::Function, pointee)
        }
        _ => builder.type_int(32, true),
    }
}
