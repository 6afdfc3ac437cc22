use std::fmt;

/// A translation from a Metal-shaped enum hit a case nothing maps it to.
///
/// Per spec this is always an internal bug: every case a well-formed caller
/// can construct is supposed to have a translation. It is kept as a
/// recoverable `Result` rather than a panic so callers higher up the stack
/// (library parsing, pipeline construction) can fold it into their own error
/// type instead of aborting the process.
#[derive(Clone, Copy, Debug, thiserror::Error)]
pub struct BadEnumValue {
    pub(crate) what: &'static str,
    pub(crate) value: i64,
}

impl fmt::Display for BadEnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no translation for {} value {}", self.what, self.value)
    }
}
