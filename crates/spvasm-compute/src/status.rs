use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Pass,
    Fail,
}

/// Outcome of a test iteration that reached the comparison step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStatus {
    pub code: StatusCode,
    pub description: String,
}

impl TestStatus {
    pub fn pass(description: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Pass,
            description: description.into(),
        }
    }

    pub fn fail(description: impl Into<String>) -> Self {
        Self {
            code: StatusCode::Fail,
            description: description.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.code == StatusCode::Pass
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self.code {
            StatusCode::Pass => "Pass",
            StatusCode::Fail => "Fail",
        };
        write!(f, "{code} ({})", self.description)
    }
}
