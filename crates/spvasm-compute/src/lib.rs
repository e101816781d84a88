//! Runs a single compute shader, given as SPIR-V assembly, on a Vulkan device
//! and byte-compares the buffers it writes against expected contents.
//!
//! A [`ComputeShaderSpec`] names the shader, the input buffers it reads and the
//! output buffers it is expected to produce. [`SpvAsmComputeShaderCase`] turns
//! it into one dispatch on a shared [`Context`]:
//!
//! ```no_run
//! use spvasm_compute::{
//!     BuildOptions, ComputeShaderSpec, Context, Float32Buffer, HarnessConfig,
//!     SpvAsmComputeShaderCase,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = HarnessConfig::default();
//! let context = Context::new(&config)?;
//! let spec = ComputeShaderSpec::new(std::fs::read_to_string("negate.spvasm")?)
//!     .with_input(Float32Buffer::new(vec![1.0, 2.0]).into_shared())
//!     .with_output(Float32Buffer::new(vec![-1.0, -2.0]).into_shared())
//!     .with_work_groups([2, 1, 1]);
//! let case = SpvAsmComputeShaderCase::new("negate", "negate floats", spec);
//! let status = case.run(&context, BuildOptions::from_config(&config)?)?;
//! assert!(status.is_pass());
//! # Ok(())
//! # }
//! ```

pub mod case_file;
pub mod compare;
pub mod compute_case;
pub mod config;
pub mod context;
pub mod error;
pub mod programs;
pub mod spec;
pub mod status;

pub use compute_case::{BuildOptions, SpvAsmComputeShaderCase, SpvAsmComputeShaderInstance};
pub use config::HarnessConfig;
pub use context::Context;
pub use error::HarnessError;
pub use spec::{
    Buffer, BufferInterface, BufferSp, ComputeShaderSpec, Float32Buffer, Int32Buffer, Uint32Buffer,
};
pub use status::{StatusCode, TestStatus};
