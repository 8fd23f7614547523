use super::codes::*;
use super::error_code::ErrorCode;

/// Central registry of all error codes
pub const ERROR_CODES: &[ErrorCode] = &[
    MODULE_NOT_FOUND,
    INVALID_MODULE_PATH,
    REPOSITORY_READ_FAILED,
    INVALID_MANIFEST,
    MODULE_ALREADY_REGISTERED,
    COMPILE_FAILED,
    EXECUTION_FAILED,
    LOAD_TIMED_OUT,
    INVALID_ARGUMENT,
    MODULE_CYCLE,
    COVERAGE_FILE_SKIPPED,
    COVERAGE_OUTPUT_FAILED,
    COVERAGE_DATA_FAILED,
    COVERAGE_CONFIG_INVALID,
    INVALID_CONFIGURATION,
];

pub fn lookup_error_code(code: &str) -> Option<&'static ErrorCode> {
    ERROR_CODES.iter().find(|entry| entry.code == code)
}
