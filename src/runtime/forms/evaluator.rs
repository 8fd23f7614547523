use std::sync::Arc;

use super::{Expr, FormProgram, Statement};
use crate::{
    coverage::SpanId,
    runtime::{
        collaborator::{Evaluator, ExecutionError, Scope},
        value::Value,
    },
};

/// Runs [`FormProgram`]s form by form, reporting each form to the coverage
/// recorder before it executes.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormEvaluator;

impl Evaluator<FormProgram> for FormEvaluator {
    fn execute(
        &self,
        program: &FormProgram,
        scope: &mut Scope<'_>,
    ) -> Result<Vec<Value>, ExecutionError> {
        let mut results = Vec::new();
        for form in program.forms() {
            scope.record(form.span);
            let span = Some(form.span);
            match &form.statement {
                Statement::Require(paths) => {
                    for path in paths {
                        scope.require(path)?;
                    }
                }
                Statement::Define(name, expr) => {
                    let value = eval(expr, scope, span)?;
                    scope.define(name, value);
                }
                Statement::Provide(names) => {
                    for name in names {
                        scope.provide(name);
                    }
                }
                Statement::Doc(text) => scope.set_docs(text),
                Statement::Raise(expr) => {
                    let message = match eval(expr, scope, span)? {
                        Value::String(text) => text.to_string(),
                        other => other.to_string(),
                    };
                    return Err(ExecutionError::raised(span, message));
                }
                Statement::Expr(expr) => results.push(eval(expr, scope, span)?),
            }
        }
        Ok(results)
    }
}

fn eval(expr: &Expr, scope: &Scope<'_>, span: Option<SpanId>) -> Result<Value, ExecutionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ref(name) => scope
            .lookup(name)
            .cloned()
            .ok_or_else(|| ExecutionError::raised(span, format!("`{name}` is not bound"))),
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|item| eval(item, scope, span))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(Arc::from(values)))
        }
        Expr::Add(items) => {
            let values = items
                .iter()
                .map(|item| eval(item, scope, span))
                .collect::<Result<Vec<_>, _>>()?;
            add(&values).map_err(|message| ExecutionError::raised(span, message))
        }
        Expr::StructPut(target, key, value) => {
            let target = eval(target, scope, span)?;
            let key = eval(key, scope, span)?;
            let value = eval(value, scope, span)?;
            target
                .struct_put(&key, value)
                .map_err(|err| ExecutionError::raised(span, err.to_string()))
        }
        Expr::StructGet(target, key) => {
            let target = eval(target, scope, span)?;
            let key = eval(key, scope, span)?;
            target
                .struct_get(&key)
                .map_err(|err| ExecutionError::raised(span, err.to_string()))
        }
    }
}

/// Integers add exactly, any float makes the sum a float, strings
/// concatenate.
fn add(values: &[Value]) -> Result<Value, String> {
    if values.iter().all(|v| matches!(v, Value::String(_))) && !values.is_empty() {
        let joined: String = values
            .iter()
            .filter_map(|v| match v {
                Value::String(text) => Some(&**text),
                _ => None,
            })
            .collect();
        return Ok(Value::string(&joined));
    }

    let mut int_sum: i64 = 0;
    let mut float_sum: Option<f64> = None;
    for value in values {
        match value {
            Value::Int(i) => match float_sum.as_mut() {
                Some(sum) => *sum += *i as f64,
                None => {
                    int_sum = int_sum
                        .checked_add(*i)
                        .ok_or_else(|| "integer overflow in `+`".to_string())?;
                }
            },
            Value::Float(f) => {
                let sum = float_sum.get_or_insert(int_sum as f64);
                *sum += f;
            }
            other => {
                return Err(format!(
                    "`+` expects numbers or strings, got {}",
                    other.type_name()
                ));
            }
        }
    }
    Ok(match float_sum {
        Some(sum) => Value::Float(sum),
        None => Value::Int(int_sum),
    })
}
