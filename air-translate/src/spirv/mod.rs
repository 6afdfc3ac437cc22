mod builder;
mod function;
mod layout;
mod types;

pub use builder::Builder;
pub use function::{Block, FunctionWriter};
pub use layout::Instruction;
pub use types::{ConstantInner, ScalarKind, TypeInner};
