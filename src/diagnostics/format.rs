use super::ErrorCode;

/// Format error message by replacing {} placeholders with values
///
/// # Example
/// ```
/// use loam::diagnostics::format_message;
/// let msg = format_message("Expected {}, got {}.", &["Int", "String"]);
/// assert_eq!(msg, "Expected Int, got String.");
/// ```
pub fn format_message(template: &str, values: &[&str]) -> String {
    let mut parts = template.split("{}");
    let mut result = parts.next().unwrap_or_default().to_string();
    let mut values = values.iter();
    for part in parts {
        // Values are inserted verbatim, even when they contain `{}`.
        result.push_str(values.next().copied().unwrap_or("{}"));
        result.push_str(part);
    }
    result
}

/// Renders a coded error as a short multi-line block for terminals:
///
/// ```text
/// error[E100]: MODULE NOT FOUND (Resolution error)
///   Module `/a` was not found in any configured repository.
///   hint: ...
/// ```
pub fn render_error(code: &ErrorCode, message: &str) -> String {
    let mut out = format!(
        "error[{}]: {} ({})\n  {}",
        code.code,
        code.title,
        code.error_type.prefix(),
        message
    );
    if let Some(hint) = code.hint {
        out.push_str("\n  hint: ");
        out.push_str(hint);
    }
    out
}
