use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    diagnostics::{ErrorCode, INVALID_ARGUMENT},
    trie::PersistentTrie,
};

/// Field map of a struct value.
pub type Fields = PersistentTrie<Arc<str>, Value>;

/// Runtime value held in module namespaces and produced by evaluation.
///
/// Values are immutable; compound values share structure on update (structs
/// are persistent tries, lists are shared slices), so cloning is O(1).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    List(Arc<[Value]>),
    Struct(Fields),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("{}", INVALID_ARGUMENT.format(&[reason.as_str()]))]
    InvalidArgument { reason: String },
    #[error(
        "{}",
        INVALID_ARGUMENT.format(&[format!("`{operation}` expects {expected}, got {found}").as_str()])
    )]
    TypeMismatch {
        operation: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

impl ValueError {
    pub fn code(&self) -> &'static ErrorCode {
        &INVALID_ARGUMENT
    }
}

impl Value {
    pub fn empty_struct() -> Self {
        Value::Struct(Fields::empty())
    }

    pub fn string(text: &str) -> Self {
        Value::String(Arc::from(text))
    }

    /// Stable type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Struct(_) => "struct",
        }
    }

    /// Converts interchange data into a value. Objects become structs.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(fields) => Value::Struct(
                fields
                    .iter()
                    .map(|(key, value)| (Arc::from(key.as_str()), Value::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Converts back to interchange data. Struct fields come out sorted by
    /// name; non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Struct(fields) => {
                let mut entries: Vec<_> = fields.iter().collect();
                entries.sort_by(|(a, _), (b, _)| a.cmp(b));
                serde_json::Value::Object(
                    entries
                        .into_iter()
                        .map(|(key, value)| (key.to_string(), value.to_json()))
                        .collect(),
                )
            }
        }
    }

    /// Returns a struct with `key` bound to `value`. The receiver is unchanged.
    pub fn struct_put(&self, key: &Value, value: Value) -> Result<Value, ValueError> {
        let fields = self.fields("struct_put")?;
        let key = field_key(key)?;
        Ok(Value::Struct(fields.insert(key, value)))
    }

    /// Field lookup; an absent field reads as `null`.
    pub fn struct_get(&self, key: &Value) -> Result<Value, ValueError> {
        let fields = self.fields("struct_get")?;
        let key = field_key(key)?;
        Ok(fields.get(&*key).cloned().unwrap_or(Value::Null))
    }

    fn fields(&self, operation: &'static str) -> Result<&Fields, ValueError> {
        match self {
            Value::Struct(fields) => Ok(fields),
            other => Err(ValueError::TypeMismatch {
                operation,
                expected: "struct",
                found: other.type_name(),
            }),
        }
    }
}

fn field_key(key: &Value) -> Result<Arc<str>, ValueError> {
    match key {
        Value::String(name) => Ok(Arc::clone(name)),
        Value::Null => Err(ValueError::InvalidArgument {
            reason: "struct field names cannot be null".to_string(),
        }),
        other => Err(ValueError::InvalidArgument {
            reason: format!("struct field names must be strings, got {}", other.type_name()),
        }),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}
