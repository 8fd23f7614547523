//! Diagnostics module.
//!
//! Every user-visible failure class carries a stable error code, a title and a
//! message template. Library error enums map onto these codes so the CLI (and
//! embedders) can render failures consistently and tell the failure classes
//! apart.

pub mod codes;
pub mod error_code;
pub mod format;
pub mod registry;

pub use codes::*;
pub use error_code::{ErrorCode, ErrorType};
pub use format::{format_message, render_error};
pub use registry::{ERROR_CODES, lookup_error_code};

#[cfg(test)]
mod diagnostics_test;
