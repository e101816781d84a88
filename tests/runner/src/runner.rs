use crate::testcase::TestCase;
use bytesize::ByteSize;
use spvasm_compute::case_file::load_case;
use spvasm_compute::{BufferInterface, BuildOptions, Context, SpvAsmComputeShaderCase};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("Failed to load test case at {path:?}: {cause:#}")]
    Load { path: PathBuf, cause: anyhow::Error },
    #[error("Test case aborted: {cause:#}")]
    Aborted { cause: anyhow::Error },
    #[error("{description}")]
    Mismatch { description: String },
    #[error("Configuration error: {msg}")]
    Config { msg: String },
}

pub type RunnerResult<T> = std::result::Result<T, RunnerError>;

#[derive(Clone)]
pub struct Runner {
    pub context: Arc<Context>,
    pub options: BuildOptions,
}

impl Runner {
    pub fn run_test_case(&self, test_case: &TestCase) -> RunnerResult<()> {
        debug!("Starting test case: {}", test_case);
        let case = load_test_case(test_case)?;

        let spec = case.spec();
        let total_bytes: usize = spec.buffers().map(|buffer| buffer.num_bytes()).sum();
        debug!(
            "{}: {} input(s), {} output(s), {} total",
            test_case,
            spec.inputs.len(),
            spec.outputs.len(),
            ByteSize::b(total_bytes as u64)
        );

        let status = case
            .run(&self.context, self.options)
            .map_err(|e| {
                error!("Test case '{}' aborted", test_case);
                RunnerError::Aborted { cause: e }
            })?;
        if !status.is_pass() {
            return Err(RunnerError::Mismatch {
                description: status.description,
            });
        }
        info!("Test case '{}' passed.", test_case);
        Ok(())
    }
}

pub fn load_test_case(test_case: &TestCase) -> RunnerResult<SpvAsmComputeShaderCase> {
    load_case(&test_case.absolute_path, test_case.name.as_str()).map_err(|e| RunnerError::Load {
        path: test_case.absolute_path.clone(),
        cause: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use spvasm_compute::case_file::CASE_FILE_NAME;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn test_load_test_case() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let case_dir = temp_dir.path().join("opnop");
        fs::create_dir(&case_dir).expect("failed to create case dir");
        fs::write(
            case_dir.join(CASE_FILE_NAME),
            r#"{ "outputs": [ { "type": "u32", "data": [0] } ] }"#,
        )
        .expect("failed to write case.json");
        fs::write(case_dir.join("shader.spvasm"), "OpNop").expect("failed to write shader");

        let test_case = TestCase::new(temp_dir.path(), Path::new("opnop"));
        let case = load_test_case(&test_case).expect("failed to load test case");
        assert_eq!(case.name(), "spvasm::opnop");
        assert_eq!(case.spec().outputs.len(), 1);
    }

    #[test]
    fn test_load_test_case_bad_json() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let case_dir = temp_dir.path().join("broken");
        fs::create_dir(&case_dir).expect("failed to create case dir");
        fs::write(case_dir.join(CASE_FILE_NAME), "{ not json").expect("failed to write case.json");

        let test_case = TestCase::new(temp_dir.path(), Path::new("broken"));
        match load_test_case(&test_case) {
            Err(RunnerError::Load { path, .. }) => assert_eq!(path, case_dir),
            _ => panic!("Expected Load error"),
        }
    }

    #[test]
    fn test_mismatch_message() {
        let err = RunnerError::Mismatch {
            description: "Output doesn't match with expected".to_owned(),
        };
        assert_eq!(err.to_string(), "Output doesn't match with expected");
    }
}
