use serde_json::Value as Json;

use super::{Expr, Form, FormProgram, Statement};
use crate::{
    coverage::SpanId,
    runtime::{
        collaborator::{CompileError, Compiler, SourceText},
        module_id::ModuleId,
        value::Value,
    },
};

/// Parses `.loam` sources into [`FormProgram`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormCompiler;

impl Compiler for FormCompiler {
    type Program = FormProgram;

    fn compile(&self, source: &SourceText<'_>) -> Result<FormProgram, CompileError> {
        let in_module = source.module.is_some();
        let forms = read_forms(source.text)?
            .into_iter()
            .map(|(span, json)| {
                compile_statement(&json, in_module)
                    .map(|statement| Form { span, statement })
                    .map_err(|message| CompileError::new(Some(span), message))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FormProgram { forms })
    }

    fn spans(&self, program: &FormProgram) -> Vec<SpanId> {
        program.spans()
    }
}

/// Splits the source into top-level JSON values with their start positions.
fn read_forms(text: &str) -> Result<Vec<(SpanId, Json)>, CompileError> {
    let mut forms = Vec::new();
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Json>();
    let mut consumed = 0;

    loop {
        let start = consumed
            + text[consumed..]
                .find(|ch: char| !ch.is_whitespace())
                .unwrap_or(text.len() - consumed);
        match stream.next() {
            None => break,
            Some(Ok(json)) => forms.push((position_of(text, start), json)),
            Some(Err(err)) => {
                let span = SpanId::new(err.line() as u32, err.column() as u32);
                return Err(CompileError::new(Some(span), format!("malformed form: {err}")));
            }
        }
        consumed = stream.byte_offset();
    }
    Ok(forms)
}

fn position_of(text: &str, offset: usize) -> SpanId {
    let before = &text[..offset];
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before[newline + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    SpanId::new(line as u32, column as u32)
}

fn compile_statement(json: &Json, in_module: bool) -> Result<Statement, String> {
    let Some((head, args)) = operator_form(json) else {
        return compile_expr(json).map(Statement::Expr);
    };

    match head {
        "require" => {
            if args.is_empty() {
                return Err("`require` needs at least one module path".to_string());
            }
            let paths = args
                .iter()
                .map(|arg| {
                    let text = expect_str(arg, "require")?;
                    ModuleId::parse(text).map_err(|err| err.to_string())
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Statement::Require(paths))
        }
        "define" => {
            expect_arity(head, args, 2)?;
            let name = expect_str(&args[0], head)?;
            if name.is_empty() {
                return Err("`define` needs a non-empty name".to_string());
            }
            Ok(Statement::Define(name.to_string(), compile_expr(&args[1])?))
        }
        "provide" | "doc" if !in_module => Err(format!("`{head}` is only allowed in modules")),
        "provide" => {
            if args.is_empty() {
                return Err("`provide` needs at least one name".to_string());
            }
            let names = args
                .iter()
                .map(|arg| expect_str(arg, head).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Statement::Provide(names))
        }
        "doc" => {
            expect_arity(head, args, 1)?;
            Ok(Statement::Doc(expect_str(&args[0], head)?.to_string()))
        }
        "raise" => {
            expect_arity(head, args, 1)?;
            Ok(Statement::Raise(compile_expr(&args[0])?))
        }
        _ => compile_expr(json).map(Statement::Expr),
    }
}

fn compile_expr(json: &Json) -> Result<Expr, String> {
    let Json::Array(items) = json else {
        return Ok(Expr::Literal(Value::from_json(json)));
    };
    let Some((head, args)) = operator_form(json) else {
        return match items.first() {
            None => Err("empty form".to_string()),
            Some(_) => Err("a form must start with an operator name".to_string()),
        };
    };

    match head {
        "quote" => {
            expect_arity(head, args, 1)?;
            Ok(Expr::Literal(Value::from_json(&args[0])))
        }
        "ref" => {
            expect_arity(head, args, 1)?;
            Ok(Expr::Ref(expect_str(&args[0], head)?.to_string()))
        }
        "list" => Ok(Expr::List(compile_all(args)?)),
        "+" => Ok(Expr::Add(compile_all(args)?)),
        "struct_put" => {
            expect_arity(head, args, 3)?;
            Ok(Expr::StructPut(
                Box::new(compile_expr(&args[0])?),
                Box::new(compile_expr(&args[1])?),
                Box::new(compile_expr(&args[2])?),
            ))
        }
        "struct_get" => {
            expect_arity(head, args, 2)?;
            Ok(Expr::StructGet(
                Box::new(compile_expr(&args[0])?),
                Box::new(compile_expr(&args[1])?),
            ))
        }
        "require" | "define" | "provide" | "doc" | "raise" => {
            Err(format!("`{head}` is only allowed at top level"))
        }
        other => Err(format!("unknown operator `{other}`")),
    }
}

fn compile_all(args: &[Json]) -> Result<Vec<Expr>, String> {
    args.iter().map(compile_expr).collect()
}

/// `["op", args...]` split into head and arguments.
fn operator_form(json: &Json) -> Option<(&str, &[Json])> {
    let Json::Array(items) = json else {
        return None;
    };
    let (head, args) = items.split_first()?;
    Some((head.as_str()?, args))
}

fn expect_arity(head: &str, args: &[Json], expected: usize) -> Result<(), String> {
    if args.len() == expected {
        return Ok(());
    }
    Err(format!(
        "`{head}` takes {expected} argument{}, got {}",
        if expected == 1 { "" } else { "s" },
        args.len()
    ))
}

fn expect_str<'a>(json: &'a Json, head: &str) -> Result<&'a str, String> {
    json.as_str()
        .ok_or_else(|| format!("`{head}` expects a string, got {json}"))
}
