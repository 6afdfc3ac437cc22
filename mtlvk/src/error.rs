//! Error taxonomy (spec.md §7): one `thiserror` enum, one variant per kind,
//! matching `wgpu-hal::DeviceError`'s shape (`#[from] vk::Result`) but with
//! the wider set of kinds this system's Runtime half needs.

/// Everything a Runtime-facing call can fail with.
///
/// Propagation policy (spec.md §7): initialization and `nextDrawable`
/// failures are recoverable (the caller gets `None`/`false`); allocation and
/// GPU errors inside encoder/submission paths are treated as fatal by the
/// reference implementation but are surfaced here as ordinary `Result`s so
/// callers can choose to abort.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    #[error("device allocation failed")]
    AllocationFailed(#[from] gpu_alloc::AllocationError),

    #[error("descriptor allocation failed")]
    DescriptorAllocationFailed(#[from] gpu_descriptor::DescriptorError),

    #[error(transparent)]
    BadEnumValue(#[from] air_types::BadEnumValue),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    #[error("invalid usage: {0}")]
    InvalidUsage(&'static str),

    #[error("GPU error: {0:?}")]
    Gpu(ash::vk::Result),

    #[error("shader translation failed: {0}")]
    Translation(#[from] air_translate::TranslationError),
}

impl From<ash::vk::Result> for Error {
    fn from(result: ash::vk::Result) -> Self {
        Error::Gpu(result)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
