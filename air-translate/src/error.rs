use air_types::BadEnumValue;

/// Everything that can go wrong turning a Metal library's bytes into SPIR-V.
///
/// Mirrors spec.md §7's `Translation` kind; `newLibrary` callers fold this
/// into their own error type (see `mtlvk::Error::Translation`).
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("not a Metal library: missing 'MTLB' magic")]
    BadMagic,

    #[error("truncated library container: expected at least {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("function list entry {index} is missing its {tag} tag")]
    MissingTag { index: usize, tag: &'static str },

    #[error("function list entry {index} has an unrecognized function type {value}")]
    BadFunctionType { index: usize, value: u8 },

    #[error("function '{0}' entry point uses a ray-tracing/visible-function kind, which this translator does not support")]
    UnsupportedFunctionKind(String),

    #[error("function '{name}' bitcode range [{offset}, {offset}+{size}) runs past the end of the file")]
    BitcodeOutOfRange { name: String, offset: u64, size: u64 },

    #[error("failed to parse AIR bitcode for function '{name}': {reason}")]
    BadBitcode { name: String, reason: String },

    #[error("function '{name}' references an unrecognized AIR construct: {what}")]
    UnrecognizedConstruct { name: String, what: String },

    #[error("function '{name}' uses an LLVM instruction this translator does not lower: {what}")]
    UnsupportedInstruction { name: String, what: String },

    #[error("function '{name}' has irreducible control flow the CFG reconstruction pass cannot structure")]
    IrreducibleControlFlow { name: String },

    #[error(transparent)]
    BadEnumValue(#[from] BadEnumValue),
}
