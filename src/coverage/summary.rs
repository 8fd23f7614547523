use std::{env, fmt::Write};

use super::{CoverageReport, UnitReport};

/// Renders the merged report the way test results are printed: one status
/// line per unit, skipped files, then totals.
pub(crate) fn summary_text(report: &CoverageReport, use_color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Coverage from {} data file(s)\n",
        report.files_merged
    );

    let width = report
        .units
        .iter()
        .map(|unit| unit.unit.len())
        .max()
        .unwrap_or(0)
        .max(24);

    for unit in &report.units {
        let status = status_label(unit, use_color);
        let counts = format!(
            "{}/{} ({:.1}%)",
            unit.hit(),
            unit.instrumented(),
            unit.percent()
        );
        let _ = writeln!(out, "  {}  {:<width$} {}", status, unit.unit, counts);
    }

    for skipped in &report.skipped {
        let skip = if use_color {
            yellow("SKIP")
        } else {
            "SKIP".to_string()
        };
        let _ = writeln!(out, "  {}  {}", skip, skipped.path.display());
        let _ = writeln!(out, "          {}", skipped.reason);
    }

    let _ = writeln!(
        out,
        "\n{} unit(s): {}/{} spans hit ({:.1}%)",
        report.units.len(),
        report.hit(),
        report.instrumented(),
        report.percent()
    );
    out
}

fn status_label(unit: &UnitReport, use_color: bool) -> String {
    let hit = unit.hit();
    let (label, paint): (&str, fn(&str) -> String) = if hit == unit.instrumented() {
        ("FULL", green)
    } else if hit == 0 {
        ("NONE", red)
    } else {
        ("PART", yellow)
    };
    if use_color {
        paint(label)
    } else {
        label.to_string()
    }
}

/// Honours `NO_COLOR` and `TERM=dumb`.
pub fn colors_enabled() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !matches!(env::var("TERM").ok().as_deref(), Some("dumb"))
}

fn green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}

fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

fn yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}
