//! Transformation splitter
//!
//! Cuts a `$apply` value into one substring per transformation. Transformations
//! chain with `/`, so a boundary is a `/` at parenthesis depth zero, outside a
//! string literal, directly after the `)` that closed the previous call.
//! Anything else, such as a `/aggregate` inside a nested argument or a quoted
//! string, belongs to the enclosing segment.

use crate::apply::error::{ApplyError, ApplyResult};
use crate::config::compile_time::apply::MAX_TRANSFORMATIONS;
use crate::grammar::keywords::TransformationKind;
use crate::utils::Span;
use serde::{Deserialize, Serialize};

/// One transformation call as it appeared in the `$apply` value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransformation {
    pub kind: TransformationKind,
    /// Navigation path qualifying the call, parent first
    pub navigation: Vec<String>,
    /// Byte offset of the segment within the `$apply` value
    pub start: usize,
    /// Segment text, `Nav/aggregate(...)`
    pub text: String,
    /// Text between the outer parentheses
    pub arguments: String,
    pub arguments_offset: usize,
}

impl RawTransformation {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn span(&self) -> Span {
        Span::from_offsets(self.start, self.start + self.text.len())
    }
}

/// Offsets and transformation names of every segment, left to right
pub fn split(apply: &str) -> ApplyResult<Vec<(usize, String)>> {
    segment_ranges(apply)?
        .into_iter()
        .map(|(start, end)| {
            let text = &apply[start..end];
            let (_, name, _) = call_head(text, start)?;
            Ok((start, name.to_string()))
        })
        .collect()
}

/// Split and decompose every segment
pub fn segment(apply: &str) -> ApplyResult<Vec<RawTransformation>> {
    segment_ranges(apply)?
        .into_iter()
        .map(|(start, end)| decompose(&apply[start..end], start))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InString { opened_at: usize },
}

/// Trimmed byte ranges of the top-level segments
fn segment_ranges(apply: &str) -> ApplyResult<Vec<(usize, usize)>> {
    let mut boundaries = Vec::new();
    let mut open_parens: Vec<usize> = Vec::new();
    let mut state = ScanState::Normal;
    let mut last_significant: Option<char> = None;
    let mut chars = apply.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        match state {
            ScanState::InString { .. } => {
                if ch == '\'' {
                    if matches!(chars.peek(), Some((_, '\''))) {
                        chars.next();
                    } else {
                        state = ScanState::Normal;
                    }
                }
            }
            ScanState::Normal => match ch {
                '\'' => state = ScanState::InString { opened_at: i },
                '(' => open_parens.push(i),
                ')' => {
                    if open_parens.pop().is_none() {
                        return Err(ApplyError::UnbalancedParentheses {
                            span: Span::from_offsets(i, i + 1),
                        });
                    }
                }
                '/' if open_parens.is_empty() && last_significant == Some(')') => {
                    boundaries.push(i);
                }
                _ => {}
            },
        }
        if !ch.is_whitespace() {
            last_significant = Some(ch);
        }
    }

    if let ScanState::InString { opened_at } = state {
        return Err(ApplyError::UnterminatedString {
            span: Span::from_offsets(opened_at, apply.len()),
        });
    }
    if let Some(&open) = open_parens.last() {
        return Err(ApplyError::UnbalancedParentheses {
            span: Span::from_offsets(open, open + 1),
        });
    }

    let mut ranges = Vec::with_capacity(boundaries.len() + 1);
    let mut start = 0;
    for end in boundaries.into_iter().chain(std::iter::once(apply.len())) {
        let (offset, text) = trim_with_offset(&apply[start..end], start);
        if text.is_empty() {
            return Err(ApplyError::malformed(
                apply,
                "empty transformation",
                Span::from_offsets(start, end),
            ));
        }
        ranges.push((offset, offset + text.len()));
        start = end + 1;
    }

    if ranges.len() > MAX_TRANSFORMATIONS {
        return Err(ApplyError::TooManyTransformations {
            count: ranges.len(),
            limit: MAX_TRANSFORMATIONS,
        });
    }

    Ok(ranges)
}

/// `(navigation, name, open_paren)` of a segment, `open_paren` relative to `text`
fn call_head(text: &str, offset: usize) -> ApplyResult<(Vec<String>, &str, usize)> {
    let span = Span::from_offsets(offset, offset + text.len());
    let open = text
        .find('(')
        .ok_or_else(|| ApplyError::malformed(text, "expected '(' after transformation name", span))?;

    let mut path: Vec<&str> = text[..open].split('/').map(str::trim).collect();
    let name = path.pop().unwrap_or_default();
    if name.is_empty() || path.iter().any(|segment| segment.is_empty()) {
        return Err(ApplyError::malformed(text, "missing transformation name", span));
    }

    Ok((path.into_iter().map(str::to_string).collect(), name, open))
}

fn decompose(text: &str, offset: usize) -> ApplyResult<RawTransformation> {
    let (navigation, name, open) = call_head(text, offset)?;
    let name_offset = offset + text[..open].rfind(name).unwrap_or(0);

    let kind = TransformationKind::from_name(name).ok_or_else(|| ApplyError::UnknownTransformation {
        name: name.to_string(),
        span: Span::from_offsets(name_offset, name_offset + name.len()),
    })?;

    match matching_paren(text, open) {
        Some(close) if close + 1 == text.len() => {}
        Some(close) => {
            return Err(ApplyError::malformed(
                text,
                "unexpected text after ')'",
                Span::from_offsets(offset + close + 1, offset + text.len()),
            ))
        }
        None => {
            return Err(ApplyError::UnbalancedParentheses {
                span: Span::from_offsets(offset + open, offset + open + 1),
            })
        }
    }

    Ok(RawTransformation {
        kind,
        navigation,
        start: offset,
        text: text.to_string(),
        arguments: text[open + 1..text.len() - 1].to_string(),
        arguments_offset: offset + open + 1,
    })
}

/// Index of the `)` closing the `(` at `open`, skipping string literals
pub(crate) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut chars = text.char_indices().skip_while(|(i, _)| *i < open).peekable();

    while let Some((i, ch)) = chars.next() {
        if in_string {
            if ch == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match ch {
            '\'' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Pieces of `text` between top-level `separator`s, with their offsets
pub(crate) fn split_top_level(text: &str, separator: char) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if in_string {
            if ch == '\'' {
                if matches!(chars.peek(), Some((_, '\''))) {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match ch {
            '\'' => in_string = true,
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                pieces.push((start, &text[start..i]));
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push((start, &text[start..]));
    pieces
}

/// Whitespace-separated words outside string literals, with their offsets
pub(crate) fn words(text: &str) -> Vec<(usize, &str)> {
    let mut result = Vec::new();
    let mut word_start: Option<usize> = None;
    let mut in_string = false;

    for (i, ch) in text.char_indices() {
        if ch == '\'' {
            in_string = !in_string;
        }
        if ch.is_whitespace() && !in_string {
            if let Some(start) = word_start.take() {
                result.push((start, &text[start..i]));
            }
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(start) = word_start {
        result.push((start, &text[start..]));
    }
    result
}

pub(crate) fn trim_with_offset(text: &str, offset: usize) -> (usize, &str) {
    let leading = text.len() - text.trim_start().len();
    (offset + leading, text.trim())
}
