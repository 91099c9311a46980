//! `$search` lexing
//!
//! Search text has its own word rules: a term is any run of characters that
//! is not whitespace, a parenthesis or a double quote. Phrases are double
//! quoted with `\"` and `\\` escapes and come out as string literals.

use super::analyzer::LexError;
use crate::config::compile_time::lexical::*;
use crate::tokens::{LiteralValue, Token, TokenStream};
use crate::utils::{Position, Span, Spanned};

fn is_term_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '(' | ')' | '"')
}

pub fn tokenize_search(text: &str) -> Result<TokenStream, LexError> {
    if text.len() > MAX_QUERY_LENGTH {
        return Err(LexError::QueryTooLong {
            length: text.len(),
            position: Position::start(),
        });
    }

    let mut tokens = Vec::new();
    let mut position = Position::start();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        if tokens.len() >= MAX_TOKEN_COUNT {
            return Err(LexError::TooManyTokens {
                count: tokens.len(),
                position,
            });
        }

        let start = position;
        let (token, end) = if ch.is_whitespace() {
            let mut end = offset;
            while let Some(&(i, c)) = chars.peek() {
                if !c.is_whitespace() {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            (Token::Whitespace, end)
        } else if ch == '(' || ch == ')' {
            chars.next();
            let token = if ch == '(' {
                Token::OpenParen
            } else {
                Token::CloseParen
            };
            (token, offset + 1)
        } else if ch == '"' {
            chars.next();
            let mut phrase = String::new();
            let mut end = None;
            while let Some((i, c)) = chars.next() {
                match c {
                    '"' => {
                        end = Some(i + 1);
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, escaped @ ('"' | '\\'))) => phrase.push(escaped),
                        Some((_, other)) => {
                            return Err(LexError::InvalidLiteral {
                                kind: "search phrase".to_string(),
                                text: format!("\\{}", other),
                                position: start,
                            })
                        }
                        None => break,
                    },
                    other => phrase.push(other),
                }
            }
            let end = end.ok_or_else(|| LexError::UnterminatedLiteral {
                kind: "search phrase".to_string(),
                position: start,
            })?;
            if phrase.len() > MAX_STRING_LITERAL_SIZE {
                return Err(LexError::StringTooLarge {
                    size: phrase.len(),
                    position: start,
                });
            }
            let token = Token::Literal {
                value: LiteralValue::String(phrase),
                text: text[offset..end].to_string(),
            };
            (token, end)
        } else {
            let mut end = offset;
            while let Some(&(i, c)) = chars.peek() {
                if !is_term_char(c) {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            if end - offset > MAX_IDENTIFIER_LENGTH {
                return Err(LexError::IdentifierTooLong {
                    length: end - offset,
                    position: start,
                });
            }
            (Token::Identifier(text[offset..end].to_string()), end)
        };

        position = position.advance_str(&text[offset..end]);
        tokens.push(Spanned::new(token, Span::new(start, position)));
    }

    tokens.push(Spanned::new(Token::Eof, Span::at(position)));
    Ok(TokenStream::new(tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn significant(text: &str) -> Vec<Token> {
        tokenize_search(text)
            .unwrap()
            .iter_significant()
            .map(|t| t.value.clone())
            .collect()
    }

    #[test]
    fn test_terms_and_operators() {
        let tokens = significant("blue OR (red-ish AND NOT green)");
        assert_eq!(tokens[0], Token::Identifier("blue".into()));
        assert_eq!(tokens[1], Token::Identifier("OR".into()));
        assert_eq!(tokens[2], Token::OpenParen);
        assert_eq!(tokens[3], Token::Identifier("red-ish".into()));
        assert_eq!(tokens[7], Token::CloseParen);
        assert_eq!(tokens[8], Token::Eof);
    }

    #[test]
    fn test_phrase_with_escapes() {
        let tokens = significant(r#""mountain \"bike\"" fast"#);
        assert_matches!(
            &tokens[0],
            Token::Literal { value: LiteralValue::String(s), .. } if s == "mountain \"bike\""
        );
        assert_eq!(tokens[1], Token::Identifier("fast".into()));
    }

    #[test]
    fn test_unterminated_phrase() {
        let error = tokenize_search("red \"blue").unwrap_err();
        assert_matches!(error, LexError::UnterminatedLiteral { position, .. } if position.offset == 4);
    }
}
