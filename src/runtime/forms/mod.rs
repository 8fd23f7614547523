//! The `.loam` form language.
//!
//! A source is a stream of JSON values, one top-level form each. An array
//! headed by a string is a form named by that string; other values are data.
//! `["quote", x]` embeds an array as data.
//!
//! ```text
//! ["require", "/loam/base"]
//! ["define", "greeting", {"text": "hi"}]
//! ["define", "answer", ["+", 40, 2]]
//! ["provide", "greeting", "answer"]
//! ```

use crate::{
    coverage::SpanId,
    runtime::{module_id::ModuleId, value::Value},
};

mod compiler;
mod evaluator;

pub use compiler::FormCompiler;
pub use evaluator::FormEvaluator;

#[derive(Debug, Clone, PartialEq)]
pub struct FormProgram {
    forms: Vec<Form>,
}

impl FormProgram {
    pub fn forms(&self) -> &[Form] {
        &self.forms
    }

    pub fn spans(&self) -> Vec<SpanId> {
        self.forms.iter().map(|form| form.span).collect()
    }
}

/// A top-level form and where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Form {
    pub span: SpanId,
    pub statement: Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Require(Vec<ModuleId>),
    Define(String, Expr),
    Provide(Vec<String>),
    Doc(String),
    Raise(Expr),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ref(String),
    List(Vec<Expr>),
    Add(Vec<Expr>),
    StructPut(Box<Expr>, Box<Expr>, Box<Expr>),
    StructGet(Box<Expr>, Box<Expr>),
}
