//! Top-level SPIR-V module builder: id allocation, type/constant
//! deduplication, decorations, and the entry point/execution-mode/memory
//! model boilerplate every translated function needs.

use spirv::Word;

use super::layout::{Instruction, LogicalLayout};
use super::types::{ConstantInner, ScalarKind, TypeArena, TypeInner};

/// Generator magic number SPIR-V tools use to identify the producer; we
/// register an unclaimed-but-documented-as-reserved value rather than
/// squatting on another tool's id.
const GENERATOR_MAGIC: u32 = 0;

pub struct Builder {
    next_id: Word,
    types: TypeArena,
    layout: LogicalLayout,
    capabilities: Vec<spirv::Capability>,
    glsl450_import: Option<Word>,
}

impl Builder {
    pub fn new() -> Self {
        let mut builder = Self {
            next_id: 1,
            types: TypeArena::default(),
            layout: LogicalLayout::default(),
            capabilities: Vec::new(),
            glsl450_import: None,
        };
        builder.require_capability(spirv::Capability::Shader);
        builder.require_capability(spirv::Capability::PhysicalStorageBufferAddresses);
        builder.require_capability(spirv::Capability::Int64);
        builder.set_memory_model();
        builder
    }

    pub fn alloc_id(&mut self) -> Word {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn require_capability(&mut self, cap: spirv::Capability) {
        if self.capabilities.contains(&cap) {
            return;
        }
        self.capabilities.push(cap);
        let mut inst = Instruction::new(spirv::Op::Capability);
        inst.add_operand(cap as u32);
        inst.to_words(&mut self.layout.capabilities);
    }

    fn set_memory_model(&mut self) {
        let mut inst = Instruction::new(spirv::Op::MemoryModel);
        inst.add_operand(spirv::AddressingModel::PhysicalStorageBuffer64 as u32);
        inst.add_operand(spirv::MemoryModel::GLSL450 as u32);
        inst.to_words(&mut self.layout.memory_model);
    }

    pub fn name(&mut self, target: Word, text: &str) {
        let mut inst = Instruction::new(spirv::Op::Name);
        inst.add_operand(target);
        inst.add_string(text);
        inst.to_words(&mut self.layout.debug_names);
    }

    pub fn member_name(&mut self, struct_ty: Word, member: u32, text: &str) {
        let mut inst = Instruction::new(spirv::Op::MemberName);
        inst.add_operand(struct_ty);
        inst.add_operand(member);
        inst.add_string(text);
        inst.to_words(&mut self.layout.debug_names);
    }

    pub fn decorate(&mut self, target: Word, decoration: spirv::Decoration, extra: &[Word]) {
        let mut inst = Instruction::new(spirv::Op::Decorate);
        inst.add_operand(target);
        inst.add_operand(decoration as u32);
        inst.add_operands(extra.iter().copied());
        inst.to_words(&mut self.layout.annotations);
    }

    pub fn member_decorate(
        &mut self,
        struct_ty: Word,
        member: u32,
        decoration: spirv::Decoration,
        extra: &[Word],
    ) {
        let mut inst = Instruction::new(spirv::Op::MemberDecorate);
        inst.add_operand(struct_ty);
        inst.add_operand(member);
        inst.add_operand(decoration as u32);
        inst.add_operands(extra.iter().copied());
        inst.to_words(&mut self.layout.annotations);
    }

    fn declare_type(&mut self, inner: TypeInner, build: impl FnOnce(&mut Instruction)) -> Word {
        if let Some(id) = self.types.type_id(&inner) {
            return id;
        }
        let id = self.alloc_id();
        let mut inst = Instruction::new(Self::type_opcode(&inner));
        inst.set_result(id);
        build(&mut inst);
        inst.to_words(&mut self.layout.declarations);
        self.types.insert_type(inner, id);
        id
    }

    fn type_opcode(inner: &TypeInner) -> spirv::Op {
        match inner {
            TypeInner::Void => spirv::Op::TypeVoid,
            TypeInner::Scalar { kind: ScalarKind::Bool, .. } => spirv::Op::TypeBool,
            TypeInner::Scalar { kind: ScalarKind::Sint | ScalarKind::Uint, .. } => spirv::Op::TypeInt,
            TypeInner::Scalar { kind: ScalarKind::Float, .. } => spirv::Op::TypeFloat,
            TypeInner::Vector { .. } => spirv::Op::TypeVector,
            TypeInner::Matrix { .. } => spirv::Op::TypeMatrix,
            TypeInner::Pointer { .. } => spirv::Op::TypePointer,
            TypeInner::RuntimeArray { .. } => spirv::Op::TypeRuntimeArray,
            TypeInner::Array { .. } => spirv::Op::TypeArray,
            TypeInner::Struct { .. } => spirv::Op::TypeStruct,
            TypeInner::Image { .. } => spirv::Op::TypeImage,
            TypeInner::SampledImage { .. } => spirv::Op::TypeSampledImage,
            TypeInner::Sampler => spirv::Op::TypeSampler,
            TypeInner::Function { .. } => spirv::Op::TypeFunction,
        }
    }

    pub fn type_void(&mut self) -> Word {
        self.declare_type(TypeInner::Void, |_| {})
    }

    pub fn type_bool(&mut self) -> Word {
        self.declare_type(TypeInner::Scalar { kind: ScalarKind::Bool, width: 1 }, |_| {})
    }

    pub fn type_int(&mut self, width: u8, signed: bool) -> Word {
        let kind = if signed { ScalarKind::Sint } else { ScalarKind::Uint };
        self.declare_type(TypeInner::Scalar { kind, width }, |inst| {
            inst.add_operand(width as u32);
            inst.add_operand(if signed { 1 } else { 0 });
        })
    }

    pub fn type_float(&mut self, width: u8) -> Word {
        self.declare_type(TypeInner::Scalar { kind: ScalarKind::Float, width }, |inst| {
            inst.add_operand(width as u32);
        })
    }

    pub fn type_vector(&mut self, size: u8, kind: ScalarKind, width: u8) -> Word {
        let component = match kind {
            ScalarKind::Bool => self.type_bool(),
            ScalarKind::Sint => self.type_int(width, true),
            ScalarKind::Uint => self.type_int(width, false),
            ScalarKind::Float => self.type_float(width),
        };
        self.declare_type(TypeInner::Vector { size, kind, width }, |inst| {
            inst.add_operand(component);
            inst.add_operand(size as u32);
        })
    }

    pub fn type_pointer(&mut self, storage_class: spirv::StorageClass, pointee: Word) -> Word {
        self.declare_type(TypeInner::Pointer { storage_class, pointee }, |inst| {
            inst.add_operand(storage_class as u32);
            inst.add_operand(pointee);
        })
    }

    pub fn type_runtime_array(&mut self, element: Word, stride: u32) -> Word {
        let inner = TypeInner::RuntimeArray { element, stride };
        let fresh = self.types.type_id(&inner).is_none();
        let id = self.declare_type(inner, |inst| {
            inst.add_operand(element);
        });
        if fresh {
            self.decorate(id, spirv::Decoration::ArrayStride, &[stride]);
        }
        id
    }

    /// A fixed-length array, used for the buffer-address UBO (spec.md §4.6)
    /// rather than `type_runtime_array`'s unbounded form, since its element
    /// count is known at lowering time.
    pub fn type_array(&mut self, element: Word, count: u32, stride: u32) -> Word {
        let inner = TypeInner::Array { element, count, stride };
        let fresh = self.types.type_id(&inner).is_none();
        let length = self.constant_uint(count as u64, 32);
        let id = self.declare_type(inner, |inst| {
            inst.add_operand(element);
            inst.add_operand(length);
        });
        if fresh {
            self.decorate(id, spirv::Decoration::ArrayStride, &[stride]);
        }
        id
    }

    pub fn type_struct(&mut self, members: Vec<Word>, offsets: Vec<u32>) -> Word {
        let id = self.declare_type(
            TypeInner::Struct { members: members.clone(), offsets: offsets.clone() },
            |inst| inst.add_operands(members.iter().copied()),
        );
        self.decorate(id, spirv::Decoration::Block, &[]);
        for (i, &offset) in offsets.iter().enumerate() {
            self.member_decorate(id, i as u32, spirv::Decoration::Offset, &[offset]);
        }
        id
    }

    pub fn type_function(&mut self, ret: Word, params: Vec<Word>) -> Word {
        self.declare_type(TypeInner::Function { ret, params: params.clone() }, |inst| {
            inst.add_operand(ret);
            inst.add_operands(params.iter().copied());
        })
    }

    pub fn constant_uint(&mut self, value: u64, width: u8) -> Word {
        let inner = ConstantInner::Uint(value, width);
        if let Some(id) = self.types.constant_id(&inner) {
            return id;
        }
        let ty = self.type_int(width, false);
        let id = self.alloc_id();
        let mut inst = Instruction::new(spirv::Op::Constant);
        inst.set_type(ty);
        inst.set_result(id);
        if width > 32 {
            inst.add_operand(value as u32);
            inst.add_operand((value >> 32) as u32);
        } else {
            inst.add_operand(value as u32);
        }
        inst.to_words(&mut self.layout.declarations);
        self.types.insert_constant(inner, id);
        id
    }

    pub fn constant_float(&mut self, value: f64, width: u8) -> Word {
        let inner = ConstantInner::Float(value, width);
        if let Some(id) = self.types.constant_id(&inner) {
            return id;
        }
        let ty = self.type_float(width);
        let id = self.alloc_id();
        let mut inst = Instruction::new(spirv::Op::Constant);
        inst.set_type(ty);
        inst.set_result(id);
        inst.add_operand((value as f32).to_bits());
        inst.to_words(&mut self.layout.declarations);
        self.types.insert_constant(inner, id);
        id
    }

    /// A workgroup-size component declared `OpSpecConstant`, so the Runtime
    /// can supply the real dispatch-time size via specialization (spec.md
    /// §4.11's per-dispatch threadgroup size).
    pub fn spec_constant_uint(&mut self, default: u32, width: u8) -> Word {
        let ty = self.type_int(width, false);
        let id = self.alloc_id();
        let mut inst = Instruction::new(spirv::Op::SpecConstant);
        inst.set_type(ty);
        inst.set_result(id);
        inst.add_operand(default);
        inst.to_words(&mut self.layout.declarations);
        self.types.insert_constant(ConstantInner::SpecUint(default, width), id);
        id
    }

    /// Combines spec constants (as built by [`Self::spec_constant_uint`])
    /// into an `OpSpecConstantComposite`, e.g. the `WorkgroupSize` builtin
    /// vector (spec.md §4.11).
    pub fn spec_constant_composite(&mut self, ty: Word, components: &[Word]) -> Word {
        let inner = ConstantInner::Composite { ty, components: components.to_vec() };
        if let Some(id) = self.types.constant_id(&inner) {
            return id;
        }
        let id = self.alloc_id();
        let mut inst = Instruction::new(spirv::Op::SpecConstantComposite);
        inst.set_type(ty);
        inst.set_result(id);
        inst.add_operands(components.iter().copied());
        inst.to_words(&mut self.layout.declarations);
        self.types.insert_constant(inner, id);
        id
    }

    pub fn entry_point(
        &mut self,
        execution_model: spirv::ExecutionModel,
        entry_id: Word,
        name: &str,
        interface: &[Word],
    ) {
        let mut inst = Instruction::new(spirv::Op::EntryPoint);
        inst.add_operand(execution_model as u32);
        inst.add_operand(entry_id);
        inst.add_string(name);
        inst.add_operands(interface.iter().copied());
        inst.to_words(&mut self.layout.entry_points);
    }

    pub fn execution_mode(&mut self, entry_id: Word, mode: spirv::ExecutionMode, extra: &[Word]) {
        let mut inst = Instruction::new(spirv::Op::ExecutionMode);
        inst.add_operand(entry_id);
        inst.add_operand(mode as u32);
        inst.add_operands(extra.iter().copied());
        inst.to_words(&mut self.layout.execution_modes);
    }

    /// Imports `GLSL.std.450` on first use, so a function that never calls
    /// a math intrinsic doesn't carry the import.
    pub fn ext_inst_import_glsl450(&mut self) -> Word {
        if let Some(id) = self.glsl450_import {
            return id;
        }
        let id = self.alloc_id();
        let mut inst = Instruction::new(spirv::Op::ExtInstImport);
        inst.set_result(id);
        inst.add_string("GLSL.std.450");
        inst.to_words(&mut self.layout.ext_inst_imports);
        self.glsl450_import = Some(id);
        id
    }

    pub fn push_function_words(&mut self, words: &[Word]) {
        self.layout.function_definitions.extend_from_slice(words);
    }

    /// Global (non-`Function`-storage-class) `OpVariable`s live in the
    /// types/constants/globals section, alongside type and constant
    /// declarations (SPIR-V §2.4).
    pub fn push_global_variable(&mut self, inst: Instruction) {
        inst.to_words(&mut self.layout.declarations);
    }

    pub fn declare_sampled_image_type(&mut self, sampled_type: Word) -> Word {
        self.declare_type(
            TypeInner::Image {
                sampled_type,
                dim: spirv::Dim::Dim2D,
                depth: false,
                arrayed: false,
                multisampled: false,
                sampled: true,
            },
            |inst| {
                inst.add_operand(sampled_type);
                inst.add_operand(spirv::Dim::Dim2D as u32);
                inst.add_operand(0); // depth: no indication
                inst.add_operand(0); // arrayed
                inst.add_operand(0); // multisampled
                inst.add_operand(1); // sampled: known at compile time
                inst.add_operand(spirv::ImageFormat::Unknown as u32);
            },
        )
    }

    pub fn declare_sampler_type(&mut self) -> Word {
        self.declare_type(TypeInner::Sampler, |_| {})
    }

    pub fn type_sampled_image(&mut self, image: Word) -> Word {
        self.declare_type(TypeInner::SampledImage { image }, |inst| {
            inst.add_operand(image);
        })
    }

    pub fn finish(self) -> Vec<Word> {
        let bound = self.next_id;
        self.layout.into_words((1, 5), GENERATOR_MAGIC, bound)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
