use crate::runner::RunnerResult;
use spvasm_compute::case_file::CASE_FILE_NAME;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A directory holding one `case.json` and the shader it refers to
pub struct TestCase {
    /// The name of the testcase, as a rust mod path
    pub name: String,
    /// the relative path from the base cases dir
    pub relative_path: PathBuf,
    /// the absolute path
    pub absolute_path: PathBuf,
}

impl TestCase {
    pub fn new(root: &Path, relative_path: &Path) -> Self {
        TestCase {
            name: format_test_name(relative_path),
            absolute_path: root.join(relative_path),
            relative_path: relative_path.to_path_buf(),
        }
    }

    pub fn try_new(root: &Path, relative_path: &Path) -> Option<Self> {
        let test_case = Self::new(root, relative_path);
        if test_case.absolute_path.join(CASE_FILE_NAME).is_file() {
            debug!("Test case found: {}", relative_path.display());
            Some(test_case)
        } else {
            None
        }
    }
}

impl Display for TestCase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

pub fn format_test_name(relative_path: &Path) -> String {
    let name = relative_path
        .components()
        .filter_map(|comp| match comp {
            Component::Normal(os_str) => Some(os_str.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("::");
    format!("spvasm::{}", name)
}

pub fn collect_test_dirs(root: &Path) -> RunnerResult<Vec<TestCase>> {
    fn recurse(root: &Path, traverse: &Path, test_cases: &mut Vec<TestCase>) -> RunnerResult<()> {
        let absolute_path = root.join(traverse);
        // skip target dir
        if absolute_path.file_name() == Some(std::ffi::OsStr::new("target")) {
            return Ok(());
        }

        if let Some(test_case) = TestCase::try_new(root, traverse) {
            test_cases.push(test_case);
        }
        let mut entries = fs::read_dir(absolute_path)?.collect::<Result<Vec<_>, _>>()?;
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            if entry.path().is_dir() {
                let relative_path = traverse.join(entry.file_name());
                recurse(root, &relative_path, test_cases)?;
            }
        }
        Ok(())
    }

    let mut test_cases = Vec::new();
    recurse(root, Path::new(""), &mut test_cases)?;
    Ok(test_cases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_test_name() {
        let test_case = TestCase::new(Path::new("/home/user/cases"), Path::new("core/opfnegate"));
        assert_eq!(test_case.to_string(), "spvasm::core::opfnegate");
        assert_eq!(
            test_case.absolute_path,
            Path::new("/home/user/cases/core/opfnegate")
        );
    }

    #[test]
    fn test_collect_test_dirs() {
        let temp_dir = tempdir().expect("failed to create temp dir");
        let base = temp_dir.path();
        let case1 = base.join("group").join("case1");
        fs::create_dir_all(&case1).expect("failed to create case1");
        fs::write(case1.join(CASE_FILE_NAME), "{}").expect("failed to write case1");
        let case2 = base.join("case2");
        fs::create_dir_all(&case2).expect("failed to create case2");
        fs::write(case2.join(CASE_FILE_NAME), "{}").expect("failed to write case2");
        // Directories without a case file, and anything under target, are ignored.
        fs::create_dir_all(base.join("empty")).expect("failed to create empty");
        let ignored = base.join("target").join("case3");
        fs::create_dir_all(&ignored).expect("failed to create target case");
        fs::write(ignored.join(CASE_FILE_NAME), "{}").expect("failed to write case3");

        let test_cases = collect_test_dirs(base).expect("failed to collect test dirs");
        let names = test_cases.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(names, vec!["spvasm::case2", "spvasm::group::case1"]);
        assert_eq!(test_cases[1].absolute_path, case1);
    }
}
