use super::error_code::{ErrorCode, ErrorType};

pub const MODULE_NOT_FOUND: ErrorCode = ErrorCode {
    code: "E100",
    title: "MODULE NOT FOUND",
    error_type: ErrorType::Resolution,
    message: "Module `{}` was not found in any configured repository ({}).",
    hint: Some("Check the module path, or add a repository with --repo / LOAM_REPOSITORY_PATH."),
};

pub const INVALID_MODULE_PATH: ErrorCode = ErrorCode {
    code: "E101",
    title: "INVALID MODULE PATH",
    error_type: ErrorType::Resolution,
    message: "Invalid module path `{}`: {}.",
    hint: Some(
        "Module paths look like `/a/b/c`; each segment starts with a letter or `_` and contains only letters, digits and `_`.",
    ),
};

pub const REPOSITORY_READ_FAILED: ErrorCode = ErrorCode {
    code: "E102",
    title: "REPOSITORY READ FAILED",
    error_type: ErrorType::Resolution,
    message: "Could not read `{}` from repository {}: {}.",
    hint: None,
};

pub const INVALID_MANIFEST: ErrorCode = ErrorCode {
    code: "E103",
    title: "INVALID REPOSITORY MANIFEST",
    error_type: ErrorType::Resolution,
    message: "Invalid repository manifest {}: {}.",
    hint: Some(
        "Manifests are a single JSON object: {\"version\": 1, \"root\": \"/prefix\", \"modules\": [\"/a/b\"]}.",
    ),
};

pub const MODULE_ALREADY_REGISTERED: ErrorCode = ErrorCode {
    code: "E104",
    title: "MODULE ALREADY REGISTERED",
    error_type: ErrorType::Resolution,
    message: "Module `{}` already has an instance in this runtime.",
    hint: Some("Each module path is instantiated at most once per runtime."),
};

pub const COMPILE_FAILED: ErrorCode = ErrorCode {
    code: "E200",
    title: "COMPILE FAILED",
    error_type: ErrorType::Compile,
    message: "`{}` failed to compile at {}: {}.",
    hint: Some("Fix the module source; the failure is cached until the runtime is rebuilt."),
};

pub const EXECUTION_FAILED: ErrorCode = ErrorCode {
    code: "E300",
    title: "EXECUTION FAILED",
    error_type: ErrorType::Execution,
    message: "`{}` raised an error at {}: {}.",
    hint: None,
};

pub const LOAD_TIMED_OUT: ErrorCode = ErrorCode {
    code: "E301",
    title: "LOAD TIMED OUT",
    error_type: ErrorType::Execution,
    message: "Gave up waiting for module `{}` after {}ms.",
    hint: Some("The load keeps running; its outcome is cached for later requests."),
};

pub const INVALID_ARGUMENT: ErrorCode = ErrorCode {
    code: "E302",
    title: "INVALID ARGUMENT",
    error_type: ErrorType::Execution,
    message: "Invalid argument: {}.",
    hint: None,
};

pub const MODULE_CYCLE: ErrorCode = ErrorCode {
    code: "E400",
    title: "MODULE CYCLE",
    error_type: ErrorType::Cycle,
    message: "Cyclic module dependency: {}.",
    hint: Some("Move the shared definitions into a module that both sides can require."),
};

pub const COVERAGE_FILE_SKIPPED: ErrorCode = ErrorCode {
    code: "E500",
    title: "COVERAGE FILE SKIPPED",
    error_type: ErrorType::Coverage,
    message: "Skipped coverage data file {}: {}.",
    hint: None,
};

pub const COVERAGE_OUTPUT_FAILED: ErrorCode = ErrorCode {
    code: "E501",
    title: "COVERAGE OUTPUT FAILED",
    error_type: ErrorType::Coverage,
    message: "Could not write coverage output {}: {}.",
    hint: Some("Check that the output directory is writable."),
};

pub const COVERAGE_DATA_FAILED: ErrorCode = ErrorCode {
    code: "E502",
    title: "COVERAGE DATA FAILED",
    error_type: ErrorType::Coverage,
    message: "Could not access coverage data {}: {}.",
    hint: None,
};

pub const COVERAGE_CONFIG_INVALID: ErrorCode = ErrorCode {
    code: "E503",
    title: "COVERAGE CONFIG INVALID",
    error_type: ErrorType::Coverage,
    message: "Invalid coverage configuration {}: {}.",
    hint: Some("Expected {\"included_modules\": [...], \"included_sources\": [...]}."),
};

pub const INVALID_CONFIGURATION: ErrorCode = ErrorCode {
    code: "E600",
    title: "INVALID CONFIGURATION",
    error_type: ErrorType::Usage,
    message: "Invalid runtime configuration: {}.",
    hint: None,
};
