//! Operator-facing render diagnostics: source position and excerpt.
use std::ops::Range;

use crate::error::TemplateError;

/// Lines shown above and below the failing line.
const CONTEXT_LINES: usize = 2;

/// Convert a renderer error into a [`TemplateError`] positioned in `source`.
pub(super) fn template_error(name: &str, source: &str, err: &minijinja::Error) -> TemplateError {
    let message = err
        .detail()
        .map_or_else(|| err.kind().to_string(), |d| format!("{}: {d}", err.kind()));
    let range = err.range();
    let line = err
        .line()
        .or_else(|| range.as_ref().map(|r| line_of_offset(source, r.start)));
    let column = range.as_ref().and_then(|r| column_of_offset(source, r));
    let snippet = line.map(|l| excerpt(source, l, column));
    TemplateError {
        name: name.to_string(),
        message,
        line,
        column,
        snippet,
    }
}

fn line_of_offset(source: &str, offset: usize) -> usize {
    source
        .get(..offset)
        .map_or(1, |before| before.matches('\n').count() + 1)
}

fn column_of_offset(source: &str, range: &Range<usize>) -> Option<usize> {
    let before = source.get(..range.start)?;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let prefix = before.get(line_start..)?;
    Some(prefix.chars().count() + 1)
}

/// Render the lines around `line` (1-based) with a caret under `column`.
pub(super) fn excerpt(source: &str, line: usize, column: Option<usize>) -> String {
    let first = line.saturating_sub(CONTEXT_LINES).max(1);
    let last = line + CONTEXT_LINES;
    let mut out = Vec::new();
    for (number, text) in source
        .lines()
        .enumerate()
        .map(|(i, t)| (i + 1, t))
        .filter(|(n, _)| (first..=last).contains(n))
    {
        let marker = if number == line { '>' } else { ' ' };
        out.push(format!("{marker}{number:>4} | {text}"));
        if number == line
            && let Some(col) = column
        {
            out.push(format!("     | {}^", " ".repeat(col.saturating_sub(1))));
        }
    }
    out.join("\n")
}
