use thiserror::Error;

/// Failures the harness detects on its own, before or around the driver calls.
///
/// Driver failures are not listed here: they surface as [`anyhow::Error`]s
/// carrying the name of the call that failed.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Compute shader spec has no output buffers")]
    NoOutputs,
    #[error("Buffer {index} is empty; Vulkan buffers must have a non-zero size")]
    EmptyBuffer { index: usize },
    #[error(
        "Compute shader spec uses {count} storage buffers, but the device allows at most {limit} per stage"
    )]
    TooManyBuffers { count: usize, limit: u32 },
    #[error("Program '{name}' was added twice")]
    DuplicateProgram { name: String },
    #[error("Program '{name}' not found in binary collection")]
    MissingProgram { name: String },
    #[error("Failed to assemble program '{name}': {message}")]
    Assembly { name: String, message: String },
    #[error("Program '{name}' failed SPIR-V validation: {message}")]
    Validation { name: String, message: String },
    #[error("Unknown {kind} '{value}'")]
    UnknownSetting { kind: &'static str, value: String },
}
