use std::collections::HashSet;

use super::*;

#[test]
fn error_codes_are_unique() {
    let mut seen = HashSet::new();
    for entry in ERROR_CODES {
        assert!(seen.insert(entry.code), "duplicate code {}", entry.code);
    }
}

#[test]
fn lookup_finds_registered_codes() {
    let found = lookup_error_code("E400").expect("cycle code registered");
    assert_eq!(found.title, "MODULE CYCLE");
    assert_eq!(found.error_type, ErrorType::Cycle);
    assert!(lookup_error_code("E999").is_none());
}

#[test]
fn format_fills_placeholders_in_order() {
    let msg = MODULE_NOT_FOUND.format(&["/a/b", "dir:/tmp"]);
    assert_eq!(
        msg,
        "Module `/a/b` was not found in any configured repository (dir:/tmp)."
    );
}

#[test]
fn render_includes_code_and_hint() {
    let rendered = render_error(&MODULE_CYCLE, "Cyclic module dependency: /a -> /b -> /a.");
    insta::assert_snapshot!(rendered, @r"
    error[E400]: MODULE CYCLE (Dependency error)
      Cyclic module dependency: /a -> /b -> /a.
      hint: Move the shared definitions into a module that both sides can require.
    ");
}

#[test]
fn values_containing_braces_are_not_reformatted() {
    let msg = format_message("Expected {}, got {}.", &["`{}`", "Int"]);
    assert_eq!(msg, "Expected `{}`, got Int.");
    assert_eq!(format_message("a {} b", &[]), "a {} b");
}
