//! Literal recognition
//!
//! Shapes follow the OData ABNF. Only the shape is checked here; calendar
//! validity (month 13, February 30) is left to the binder.

use crate::config::compile_time::lexical::MAX_STRING_LITERAL_SIZE;
use crate::tokens::LiteralValue;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;

/// Why a literal could not be scanned. Offsets are relative to the scan start.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ScanFailure {
    Unterminated { kind: &'static str },
    Invalid { kind: &'static str, text: String },
    OutOfRange { text: String },
    TooLarge { size: usize },
}

pub(crate) type Scanned = Result<(LiteralValue, usize), ScanFailure>;

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn match_len(cell: &'static OnceLock<Option<Regex>>, pattern: &str, text: &str) -> Option<usize> {
    compiled(cell, pattern)
        .and_then(|regex| regex.find(text))
        .map(|m| m.end())
}

static DATE_TIME_OFFSET: OnceLock<Option<Regex>> = OnceLock::new();
static DATE: OnceLock<Option<Regex>> = OnceLock::new();
static TIME_OF_DAY: OnceLock<Option<Regex>> = OnceLock::new();
static GUID: OnceLock<Option<Regex>> = OnceLock::new();
static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
static DURATION: OnceLock<Option<Regex>> = OnceLock::new();
static QUALIFIED_TAIL: OnceLock<Option<Regex>> = OnceLock::new();

const DATE_TIME_OFFSET_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}(:\d{2}(\.\d{1,12})?)?(Z|[+-]\d{2}:\d{2})";
const DATE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}";
const TIME_OF_DAY_PATTERN: &str = r"^\d{2}:\d{2}(:\d{2}(\.\d{1,12})?)?";
const GUID_PATTERN: &str =
    r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}";
const NUMBER_PATTERN: &str = r"^-?\d+(\.\d+)?([eE][+-]?\d+)?";
const DURATION_PATTERN: &str = r"^-?P(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$";
const QUALIFIED_TAIL_PATTERN: &str = r"^(\.[\p{L}_][\p{L}\p{N}_]*)*'";

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Fails when a literal is immediately followed by more word characters (`12ab`)
fn ensure_boundary(text: &str, len: usize, kind: &'static str) -> Result<(), ScanFailure> {
    match text[len..].chars().next() {
        Some(ch) if is_word_char(ch) => {
            let end = text[len..]
                .find(|c: char| !is_word_char(c))
                .map(|n| len + n)
                .unwrap_or(text.len());
            Err(ScanFailure::Invalid {
                kind,
                text: text[..end].to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// GUID check, shared by digit and letter starts
pub(crate) fn scan_guid(text: &str) -> Option<(LiteralValue, usize)> {
    let len = match_len(&GUID, GUID_PATTERN, text)?;
    match text[len..].chars().next() {
        Some(ch) if is_word_char(ch) || ch == '-' => None,
        _ => Some((LiteralValue::Guid(text[..len].to_string()), len)),
    }
}

/// Scan a literal that starts with a digit or with `-` followed by a digit
pub(crate) fn scan_digit_literal(text: &str) -> Scanned {
    if !text.starts_with('-') {
        if let Some(len) = match_len(&DATE_TIME_OFFSET, DATE_TIME_OFFSET_PATTERN, text) {
            ensure_boundary(text, len, "Edm.DateTimeOffset")?;
            return Ok((LiteralValue::DateTimeOffset(text[..len].to_string()), len));
        }
        if let Some(len) = match_len(&DATE, DATE_PATTERN, text) {
            ensure_boundary(text, len, "Edm.Date")?;
            return Ok((LiteralValue::Date(text[..len].to_string()), len));
        }
        if let Some(found) = scan_guid(text) {
            return Ok(found);
        }
        if let Some(len) = match_len(&TIME_OF_DAY, TIME_OF_DAY_PATTERN, text) {
            ensure_boundary(text, len, "Edm.TimeOfDay")?;
            return Ok((LiteralValue::TimeOfDay(text[..len].to_string()), len));
        }
    }

    scan_number(text)
}

fn scan_number(text: &str) -> Scanned {
    let body_len = match_len(&NUMBER, NUMBER_PATTERN, text).ok_or_else(|| ScanFailure::Invalid {
        kind: "number",
        text: text.chars().take(1).collect(),
    })?;
    let body = &text[..body_len];
    let has_fraction = body.contains(|c: char| matches!(c, '.' | 'e' | 'E'));

    let suffix = text[body_len..]
        .chars()
        .next()
        .filter(|ch| matches!(ch, 'L' | 'l' | 'M' | 'm' | 'D' | 'd' | 'F' | 'f'));
    let len = body_len + suffix.map(char::len_utf8).unwrap_or(0);
    ensure_boundary(text, len, "number")?;

    let out_of_range = || ScanFailure::OutOfRange {
        text: text[..len].to_string(),
    };

    let value = match suffix {
        Some('L' | 'l') if !has_fraction => {
            LiteralValue::Int64(body.parse().map_err(|_| out_of_range())?)
        }
        Some('L' | 'l') => {
            return Err(ScanFailure::Invalid {
                kind: "Edm.Int64",
                text: text[..len].to_string(),
            })
        }
        Some('M' | 'm') => LiteralValue::Decimal(body.to_string()),
        Some('D' | 'd') => LiteralValue::Double(parse_finite(body).ok_or_else(out_of_range)?),
        Some('F' | 'f') => {
            let single: f32 = body.parse().map_err(|_| out_of_range())?;
            if !single.is_finite() {
                return Err(out_of_range());
            }
            LiteralValue::Single(single)
        }
        _ if has_fraction => LiteralValue::Double(parse_finite(body).ok_or_else(out_of_range)?),
        _ => {
            if let Ok(value) = body.parse::<i32>() {
                LiteralValue::Int32(value)
            } else if let Ok(value) = body.parse::<i64>() {
                LiteralValue::Int64(value)
            } else {
                LiteralValue::Decimal(body.to_string())
            }
        }
    };

    Ok((value, len))
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Scan a `'...'` body starting at the opening quote. `''` is an escaped quote.
/// Returns the unescaped content and the consumed length, quotes included.
pub(crate) fn scan_quoted(text: &str, kind: &'static str) -> Result<(String, usize), ScanFailure> {
    let mut content = String::new();
    let mut chars = text.char_indices().skip(1).peekable();

    while let Some((offset, ch)) = chars.next() {
        if ch == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                content.push('\'');
            } else {
                if content.len() > MAX_STRING_LITERAL_SIZE {
                    return Err(ScanFailure::TooLarge {
                        size: content.len(),
                    });
                }
                return Ok((content, offset + 1));
            }
        } else {
            content.push(ch);
        }
    }

    Err(ScanFailure::Unterminated { kind })
}

pub(crate) fn scan_string(text: &str) -> Scanned {
    let (content, len) = scan_quoted(text, "Edm.String")?;
    Ok((LiteralValue::String(content), len))
}

/// Literals introduced by a word: `true`, `null`, `INF`, `duration'..'`,
/// `binary'..'`, `X'..'` and `Namespace.Enum'Member'`.
/// `word_len` is the length of the already-scanned leading word.
pub(crate) fn scan_word_literal(text: &str, word_len: usize) -> Option<Scanned> {
    let word = &text[..word_len];
    let rest = &text[word_len..];

    // Case-sensitive: `Null` and `True` are identifiers
    match word {
        "true" => return Some(Ok((LiteralValue::Boolean(true), word_len))),
        "false" => return Some(Ok((LiteralValue::Boolean(false), word_len))),
        "null" => return Some(Ok((LiteralValue::Null, word_len))),
        "INF" => return Some(Ok((LiteralValue::Double(f64::INFINITY), word_len))),
        "NaN" => return Some(Ok((LiteralValue::Double(f64::NAN), word_len))),
        _ => {}
    }

    if rest.starts_with('\'') {
        return Some(scan_prefixed_literal(word, rest, word_len));
    }

    // Qualified enum member: Namespace.Type'Member'
    let tail_len = match_len(&QUALIFIED_TAIL, QUALIFIED_TAIL_PATTERN, rest)?;
    let type_name = format!("{}{}", word, &rest[..tail_len - 1]);
    let quoted = &rest[tail_len - 1..];
    Some(
        scan_quoted(quoted, "enum").map(|(member, quoted_len)| {
            (
                LiteralValue::Enum {
                    type_name,
                    value: member,
                },
                word_len + tail_len - 1 + quoted_len,
            )
        }),
    )
}

fn scan_prefixed_literal(word: &str, quoted: &str, word_len: usize) -> Scanned {
    let lower = word.to_ascii_lowercase();
    let kind: &'static str = match lower.as_str() {
        "duration" => "Edm.Duration",
        "binary" | "x" => "Edm.Binary",
        _ => "enum",
    };
    let (body, quoted_len) = scan_quoted(quoted, kind)?;
    let total = word_len + quoted_len;
    let invalid = |text: &str| ScanFailure::Invalid {
        kind,
        text: text.to_string(),
    };

    let value = match lower.as_str() {
        "duration" => {
            if body.is_empty()
                || body.ends_with('T')
                || match_len(&DURATION, DURATION_PATTERN, &body).is_none()
                || body.trim_start_matches('-') == "P"
            {
                return Err(invalid(&body));
            }
            LiteralValue::Duration(body)
        }
        "binary" => {
            let engine = base64::engine::general_purpose::STANDARD;
            let url_safe = base64::engine::general_purpose::URL_SAFE;
            let bytes = engine
                .decode(body.as_bytes())
                .or_else(|_| url_safe.decode(body.as_bytes()))
                .map_err(|_| invalid(&body))?;
            LiteralValue::Binary(bytes)
        }
        "x" => LiteralValue::Binary(decode_hex(&body).ok_or_else(|| invalid(&body))?),
        _ => LiteralValue::Enum {
            type_name: word.to_string(),
            value: body,
        },
    };

    Ok((value, total))
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| text.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_date_and_time_shapes() {
        assert_eq!(
            scan_digit_literal("2014-08-31 eq x"),
            Ok((LiteralValue::Date("2014-08-31".into()), 10))
        );
        assert_eq!(
            scan_digit_literal("12:40:05.050)"),
            Ok((LiteralValue::TimeOfDay("12:40:05.050".into()), 12))
        );
        assert_eq!(
            scan_digit_literal("2014-08-31T12:40:05Z"),
            Ok((LiteralValue::DateTimeOffset("2014-08-31T12:40:05Z".into()), 20))
        );
    }

    #[test]
    fn test_calendar_is_not_checked_here() {
        assert_eq!(
            scan_digit_literal("2014-13-40"),
            Ok((LiteralValue::Date("2014-13-40".into()), 10))
        );
    }

    #[test]
    fn test_guid_before_number() {
        let text = "01234567-89ab-cdef-0123-456789abcdef";
        assert_eq!(
            scan_digit_literal(text),
            Ok((LiteralValue::Guid(text.into()), 36))
        );
        assert!(scan_guid("deadbeef-0000-0000-0000-000000000000x").is_none());
    }

    #[test]
    fn test_number_suffixes() {
        assert_eq!(scan_digit_literal("42"), Ok((LiteralValue::Int32(42), 2)));
        assert_eq!(scan_digit_literal("-7"), Ok((LiteralValue::Int32(-7), 2)));
        assert_eq!(scan_digit_literal("42L"), Ok((LiteralValue::Int64(42), 3)));
        assert_eq!(
            scan_digit_literal("3000000000"),
            Ok((LiteralValue::Int64(3_000_000_000), 10))
        );
        assert_eq!(
            scan_digit_literal("1.5M"),
            Ok((LiteralValue::Decimal("1.5".into()), 4))
        );
        assert_eq!(scan_digit_literal("1.5d"), Ok((LiteralValue::Double(1.5), 4)));
        assert_eq!(scan_digit_literal("2.5f"), Ok((LiteralValue::Single(2.5), 4)));
        assert_eq!(scan_digit_literal("1e3"), Ok((LiteralValue::Double(1000.0), 3)));
        assert_matches!(
            scan_digit_literal("99999999999999999999"),
            Ok((LiteralValue::Decimal(_), 20))
        );
    }

    #[test]
    fn test_number_errors() {
        assert_matches!(
            scan_digit_literal("99999999999999999999L"),
            Err(ScanFailure::OutOfRange { .. })
        );
        assert_matches!(scan_digit_literal("1e999"), Err(ScanFailure::OutOfRange { .. }));
        assert_matches!(
            scan_digit_literal("12abc"),
            Err(ScanFailure::Invalid { text, .. }) if text == "12abc"
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            scan_string("'O''Neil' rest"),
            Ok((LiteralValue::String("O'Neil".into()), 9))
        );
        assert_eq!(scan_string("''"), Ok((LiteralValue::String(String::new()), 2)));
        assert_matches!(
            scan_string("'open"),
            Err(ScanFailure::Unterminated { kind: "Edm.String" })
        );
    }

    #[test]
    fn test_word_literals() {
        assert_eq!(
            scan_word_literal("true)", 4),
            Some(Ok((LiteralValue::Boolean(true), 4)))
        );
        assert_eq!(scan_word_literal("null", 4), Some(Ok((LiteralValue::Null, 4))));
        assert!(scan_word_literal("Name eq", 4).is_none());
    }

    #[test]
    fn test_word_literals_are_case_sensitive() {
        assert!(scan_word_literal("True eq 1", 4).is_none());
        assert!(scan_word_literal("FALSE", 5).is_none());
        assert!(scan_word_literal("Null/Name", 4).is_none());
        assert_eq!(
            scan_word_literal("false", 5),
            Some(Ok((LiteralValue::Boolean(false), 5)))
        );
    }

    #[test]
    fn test_duration_and_binary() {
        assert_eq!(
            scan_word_literal("duration'P1DT2H'", 8),
            Some(Ok((LiteralValue::Duration("P1DT2H".into()), 16)))
        );
        assert_matches!(
            scan_word_literal("duration'1 day'", 8),
            Some(Err(ScanFailure::Invalid { kind: "Edm.Duration", .. }))
        );
        assert_eq!(
            scan_word_literal("binary'AQID'", 6),
            Some(Ok((LiteralValue::Binary(vec![1, 2, 3]), 12)))
        );
        assert_eq!(
            scan_word_literal("X'0AFF'", 1),
            Some(Ok((LiteralValue::Binary(vec![0x0a, 0xff]), 7)))
        );
    }

    #[test]
    fn test_qualified_enum_literal() {
        assert_eq!(
            scan_word_literal("Sales.Color'Red,Blue' eq x", 5),
            Some(Ok((
                LiteralValue::Enum {
                    type_name: "Sales.Color".into(),
                    value: "Red,Blue".into(),
                },
                21
            )))
        );
        assert!(scan_word_literal("Sales.GetTop(1)", 5).is_none());
    }
}
