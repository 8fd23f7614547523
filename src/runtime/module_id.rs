use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::{ErrorCode, INVALID_MODULE_PATH};

/// Logical module path, e.g. `/loam/list`.
///
/// Always absolute: one or more `/`-prefixed segments, each starting with an
/// ASCII letter or `_` and continuing with ASCII alphanumerics or `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleId(Arc<str>);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", INVALID_MODULE_PATH.format(&[path.as_str(), *reason]))]
pub struct ModuleIdError {
    path: String,
    reason: &'static str,
}

impl ModuleIdError {
    fn new(path: &str, reason: &'static str) -> Self {
        Self {
            path: path.to_string(),
            reason,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn code(&self) -> &'static ErrorCode {
        &INVALID_MODULE_PATH
    }
}

impl ModuleId {
    /// Parses a module path. A bare single name such as `greet` is taken to
    /// mean `/greet`; relative multi-segment paths are rejected.
    pub fn parse(text: &str) -> Result<Self, ModuleIdError> {
        if text.is_empty() {
            return Err(ModuleIdError::new(text, "the path is empty"));
        }
        if text.starts_with('/') {
            return Self::parse_absolute(text);
        }
        if text.contains('/') {
            return Err(ModuleIdError::new(text, "relative paths must start with `/`"));
        }
        Self::parse_absolute(&format!("/{text}"))
            .map_err(|_| ModuleIdError::new(text, "not a valid module name"))
    }

    /// Parses a path that must already be absolute.
    pub fn parse_absolute(text: &str) -> Result<Self, ModuleIdError> {
        let Some(rest) = text.strip_prefix('/') else {
            return Err(ModuleIdError::new(text, "the path must start with `/`"));
        };
        if rest.is_empty() {
            return Err(ModuleIdError::new(text, "the path has no segments"));
        }
        for segment in rest.split('/') {
            if segment.is_empty() {
                return Err(ModuleIdError::new(text, "the path has an empty segment"));
            }
            if !is_valid_segment(segment) {
                return Err(ModuleIdError::new(
                    text,
                    "segments must be letters, digits or `_`, not starting with a digit",
                ));
            }
        }
        Ok(Self(Arc::from(text)))
    }

    /// Builds a path from already split segments.
    pub fn from_segments<'a, I>(segments: I) -> Result<Self, ModuleIdError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut text = String::new();
        for segment in segments {
            text.push('/');
            text.push_str(segment);
        }
        Self::parse_absolute(&text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    /// Last segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    pub fn parent(&self) -> Option<ModuleId> {
        let cut = self.0.rfind('/')?;
        (cut > 0).then(|| Self(Arc::from(&self.0[..cut])))
    }

    /// True when this path equals `prefix` or is nested below it.
    pub fn is_within(&self, prefix: &ModuleId) -> bool {
        match self.0.strip_prefix(&*prefix.0) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ModuleId {
    type Error = ModuleIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_absolute(&value)
    }
}

impl From<ModuleId> for String {
    fn from(value: ModuleId) -> Self {
        value.0.to_string()
    }
}

impl std::str::FromStr for ModuleId {
    type Err = ModuleIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
