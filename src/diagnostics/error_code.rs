//! Error code types for the diagnostics system

/// Failure classes. Recovery differs per class, so they are kept distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Resolution,
    Compile,
    Execution,
    Cycle,
    Coverage,
    Usage,
}

impl ErrorType {
    /// Returns the prefix string used in error headers
    pub fn prefix(&self) -> &'static str {
        match self {
            ErrorType::Resolution => "Resolution error",
            ErrorType::Compile => "Compile error",
            ErrorType::Execution => "Execution error",
            ErrorType::Cycle => "Dependency error",
            ErrorType::Coverage => "Coverage error",
            ErrorType::Usage => "Usage error",
        }
    }
}

/// Error code with message template and optional hint
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode {
    pub code: &'static str,
    pub title: &'static str,
    pub error_type: ErrorType,
    pub message: &'static str,
    pub hint: Option<&'static str>,
}

impl ErrorCode {
    pub fn format(&self, values: &[&str]) -> String {
        super::format_message(self.message, values)
    }
}

impl PartialEq for ErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for ErrorCode {}
