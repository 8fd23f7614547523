//! loam: module runtime core.
//!
//! - [`trie`]: persistent hash array mapped trie (map and set).
//! - [`runtime`]: module repositories, the module loader and cache, and the
//!   top level for scripts.
//! - [`coverage`]: coverage recording, aggregation and reporting.
//! - [`diagnostics`]: coded error messages shared by all of the above.

pub mod coverage;
pub mod diagnostics;
pub mod runtime;
pub mod trie;
