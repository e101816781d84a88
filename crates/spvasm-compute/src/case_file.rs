//! On-disk description of a compute shader case: a `case.json` next to the
//! SPIR-V assembly it runs.

use crate::compute_case::SpvAsmComputeShaderCase;
use crate::spec::{Buffer, BufferSp, ComputeShaderSpec};
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const CASE_FILE_NAME: &str = "case.json";

/// Buffer contents, tagged with the element type used to encode them.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BufferFile {
    F32(Vec<f32>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    Bytes(Vec<u8>),
}

impl BufferFile {
    pub fn to_buffer(&self) -> BufferSp {
        match self {
            BufferFile::F32(data) => Buffer::new(data.clone()).into_shared(),
            BufferFile::I32(data) => Buffer::new(data.clone()).into_shared(),
            BufferFile::U32(data) => Buffer::new(data.clone()).into_shared(),
            BufferFile::Bytes(data) => Arc::new(data.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CaseFile {
    #[serde(default)]
    pub description: String,
    /// Assembly file, relative to the case directory.
    #[serde(default = "default_shader")]
    pub shader: PathBuf,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default = "default_work_groups")]
    pub num_work_groups: [u32; 3],
    #[serde(default)]
    pub inputs: Vec<BufferFile>,
    pub outputs: Vec<BufferFile>,
}

fn default_shader() -> PathBuf {
    PathBuf::from("shader.spvasm")
}

fn default_entry_point() -> String {
    "main".to_owned()
}

fn default_work_groups() -> [u32; 3] {
    [1, 1, 1]
}

impl CaseFile {
    /// Reads `case.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CASE_FILE_NAME);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Builds the test case, reading the shader assembly relative to `dir`.
    pub fn into_case(
        self,
        dir: &Path,
        name: impl Into<String>,
    ) -> Result<SpvAsmComputeShaderCase> {
        let shader_path = dir.join(&self.shader);
        let assembly = fs::read_to_string(&shader_path)
            .with_context(|| format!("Failed to read {}", shader_path.display()))?;

        let spec = ComputeShaderSpec {
            assembly,
            inputs: self.inputs.iter().map(BufferFile::to_buffer).collect(),
            outputs: self.outputs.iter().map(BufferFile::to_buffer).collect(),
            num_work_groups: self.num_work_groups,
            entry_point: self.entry_point,
        };
        Ok(SpvAsmComputeShaderCase::new(name, self.description, spec))
    }
}

/// Loads the case stored in `dir`.
pub fn load_case(dir: &Path, name: impl Into<String>) -> Result<SpvAsmComputeShaderCase> {
    CaseFile::load(dir)?.into_case(dir, name)
}
