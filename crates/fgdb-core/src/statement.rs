//! Statement text parsing.
//!
//! A statement has the form `lhs = fn(arg1, arg2, ...)`, one per line.
//! Whitespace between tokens is ignored, blank lines and `#` comment lines
//! are skipped, and every name must match `[A-Za-z_][A-Za-z0-9_]*`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::CoreError;

/// A parsed `lhs = function(args...)` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    /// The dependent variable the function assigns.
    pub lhs: String,
    /// The applied function.
    pub function: String,
    /// Input variables, in source order. Never empty once parsed.
    pub args: SmallVec<[String; 4]>,
}

impl Statement {
    pub fn new<I, S>(lhs: impl Into<String>, function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Statement {
            lhs: lhs.into(),
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// All variable names of the statement: `lhs` first, then each argument.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.lhs.as_str()).chain(self.args.iter().map(String::as_str))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}({})", self.lhs, self.function, self.args.join(", "))
    }
}

impl FromStr for Statement {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_statement(s, 0)
    }
}

/// Returns `true` if `name` matches `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns `true` for lines that carry no statement.
pub fn is_ignorable(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Parses one statement. `line` is only used to label errors.
pub fn parse_statement(text: &str, line: usize) -> Result<Statement, CoreError> {
    let text = text.trim();

    let (lhs, rhs) = text
        .split_once('=')
        .ok_or_else(|| CoreError::parse(line, text, "missing '='"))?;
    let lhs = expect_name(lhs.trim(), text, line)?;

    let rhs = rhs.trim();
    let open = rhs
        .find('(')
        .ok_or_else(|| CoreError::parse(line, rhs, "missing '(' after function name"))?;
    let function = expect_name(rhs[..open].trim(), rhs, line)?;

    let after_open = &rhs[open + 1..];
    let close = after_open
        .find(')')
        .ok_or_else(|| CoreError::parse(line, rhs, "unbalanced parentheses"))?;
    let inner = &after_open[..close];
    if inner.contains('(') {
        return Err(CoreError::parse(line, rhs, "unbalanced parentheses"));
    }

    let trailing = after_open[close + 1..].trim();
    if trailing.contains(')') || trailing.contains('(') {
        return Err(CoreError::parse(line, rhs, "unbalanced parentheses"));
    }
    if !trailing.is_empty() {
        return Err(CoreError::parse(line, trailing, "unexpected text after ')'"));
    }

    if inner.trim().is_empty() {
        return Err(CoreError::parse(
            line,
            format!("{}()", function),
            "empty argument list",
        ));
    }

    let mut args = SmallVec::new();
    for arg in inner.split(',') {
        args.push(expect_name(arg.trim(), inner.trim(), line)?);
    }

    Ok(Statement {
        lhs,
        function,
        args,
    })
}

/// Parses a sequence of lines, skipping blank and comment lines.
///
/// Yields `(line_number, result)` with 1-based line numbers counted over all
/// input lines, ignored ones included.
pub fn parse_lines<I, S>(lines: I) -> impl Iterator<Item = (usize, Result<Statement, CoreError>)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .enumerate()
        .filter(|(_, line)| !is_ignorable(line.as_ref()))
        .map(|(index, line)| (index + 1, parse_statement(line.as_ref(), index + 1)))
}

/// Parses a whole statement file.
pub fn parse_statements(text: &str) -> Vec<(usize, Result<Statement, CoreError>)> {
    parse_lines(text.lines()).collect()
}

fn expect_name(candidate: &str, context: &str, line: usize) -> Result<String, CoreError> {
    if candidate.is_empty() {
        return Err(CoreError::parse(line, context, "empty name"));
    }
    if !is_valid_name(candidate) {
        return Err(CoreError::parse(line, candidate, "invalid identifier"));
    }
    Ok(candidate.to_string())
}
