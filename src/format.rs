//! Log-format compilation.
//!
//! A log format is a string of literal text interleaved with `<Field>`
//! placeholders, e.g. `"<Date> <Time> <Pid> <Level> <Component>: <Content>"`.
//! Compilation yields one named capture group per placeholder, in declared
//! order, with literal whitespace runs relaxed to `\s+` so irregular spacing
//! still matches. The resulting pattern is anchored at both ends.

use regex::Regex;

use crate::error::{Error, Result};

/// A compiled log format: ordered field names plus the full-line pattern.
/// Built once per parser configuration and reused for every line.
#[derive(Debug, Clone)]
pub struct CompiledFormat {
    pub headers: Vec<String>,
    pub regex: Regex,
}

impl CompiledFormat {
    /// Position of a named field within `headers`.
    pub fn header_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

enum Segment {
    Literal(String),
    Field(String),
}

/// Split a format string into literal and placeholder segments, rejecting
/// unbalanced or nested delimiters.
fn split_format(log_format: &str) -> Result<Vec<Segment>> {
    let err = |reason: &str| Error::Format {
        format: log_format.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut field: Option<String> = None;

    for c in log_format.chars() {
        match (c, &mut field) {
            ('<', Some(_)) => return Err(err("nested '<' inside placeholder")),
            ('<', None) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                field = Some(String::new());
            }
            ('>', Some(name)) => {
                if name.is_empty() {
                    return Err(err("empty placeholder '<>'"));
                }
                segments.push(Segment::Field(std::mem::take(name)));
                field = None;
            }
            ('>', None) => return Err(err("'>' without matching '<'")),
            (c, Some(name)) => name.push(c),
            (c, None) => literal.push(c),
        }
    }
    if field.is_some() {
        return Err(err("unterminated placeholder, missing '>'"));
    }
    Ok(segments)
}

/// Compile a log format string.
///
/// Fails when the placeholder delimiters are unbalanced or nested, when no
/// placeholder is present at all, or when a field name is not a valid capture
/// group name.
pub fn compile_log_format(log_format: &str) -> Result<CompiledFormat> {
    let segments = split_format(log_format)?;

    let whitespace = Regex::new(r"\s+").expect("static pattern");
    let mut headers = Vec::new();
    let mut pattern = String::from("^");
    for segment in &segments {
        match segment {
            Segment::Literal(text) => {
                pattern.push_str(&whitespace.replace_all(text, r"\s+"));
            }
            Segment::Field(name) => {
                headers.push(name.clone());
                pattern.push_str(&format!("(?P<{}>.*?)", name));
            }
        }
    }
    pattern.push('$');

    if headers.is_empty() {
        return Err(Error::Format {
            format: log_format.to_string(),
            reason: "no <Field> placeholders".to_string(),
        });
    }

    let regex = Regex::new(&pattern).map_err(|e| Error::Format {
        format: log_format.to_string(),
        reason: e.to_string(),
    })?;

    Ok(CompiledFormat { headers, regex })
}
