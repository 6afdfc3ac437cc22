//! The deduplicated type/constant arena.
//!
//! SPIR-V requires every distinct type and every distinct constant value to
//! have exactly one `OpType*`/`OpConstant*` declaration; re-emitting an
//! identical `OpTypeFloat 32` twice is a validation error. `TypeArena` is a
//! `HashMap`-backed cache so the lowering pass can ask for "the id of `u32`"
//! as many times as it likes and always get the same id back.

use rustc_hash::FxHashMap;
use spirv::Word;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Sint,
    Uint,
    Float,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeInner {
    Void,
    Scalar { kind: ScalarKind, width: u8 },
    Vector { size: u8, kind: ScalarKind, width: u8 },
    Matrix { columns: u8, rows: u8, width: u8 },
    Pointer { storage_class: spirv::StorageClass, pointee: Word },
    RuntimeArray { element: Word, stride: u32 },
    Array { element: Word, count: u32, stride: u32 },
    Struct { members: Vec<Word>, offsets: Vec<u32> },
    Image {
        sampled_type: Word,
        dim: spirv::Dim,
        depth: bool,
        arrayed: bool,
        multisampled: bool,
        sampled: bool,
    },
    SampledImage { image: Word },
    Sampler,
    Function { ret: Word, params: Vec<Word> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstantInner {
    Bool(bool),
    Sint(i64, u8),
    Uint(u64, u8),
    Float(f64, u8),
    Composite { ty: Word, components: Vec<Word> },
    SpecUint(u32, u8),
}

#[derive(Default)]
pub struct TypeArena {
    types: Vec<TypeInner>,
    type_ids: FxHashMap<TypeInner, Word>,
    constants: Vec<(ConstantInner, Word)>,
}

impl TypeArena {
    pub fn type_id(&self, inner: &TypeInner) -> Option<Word> {
        self.type_ids.get(inner).copied()
    }

    pub fn insert_type(&mut self, inner: TypeInner, id: Word) {
        self.types.push(inner.clone());
        self.type_ids.insert(inner, id);
    }

    pub fn constant_id(&self, inner: &ConstantInner) -> Option<Word> {
        self.constants
            .iter()
            .find(|(existing, _)| existing == inner)
            .map(|(_, id)| *id)
    }

    pub fn insert_constant(&mut self, inner: ConstantInner, id: Word) {
        self.constants.push((inner, id));
    }
}
