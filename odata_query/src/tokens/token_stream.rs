//! Span-accurate token stream
//!
//! Whitespace tokens stay in the underlying vector so spans can be reported
//! against the original text, while navigation only visits significant tokens.

use crate::{
    tokens::token::Token,
    utils::{Span, Spanned},
};

pub type SpannedToken = Spanned<Token>;

#[derive(Debug, Clone)]
pub struct TokenStream {
    /// All tokens, whitespace included
    all_tokens: Vec<SpannedToken>,
    /// Indices into `all_tokens` of the significant tokens
    significant_indices: Vec<usize>,
    /// Cursor into `significant_indices`
    position: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        let significant_indices = tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| token.value.is_significant())
            .map(|(i, _)| i)
            .collect();

        Self {
            all_tokens: tokens,
            significant_indices,
            position: 0,
        }
    }

    pub fn current(&self) -> Option<&SpannedToken> {
        self.peek_ahead(0)
    }

    pub fn current_token(&self) -> Option<&Token> {
        self.current().map(|spanned| &spanned.value)
    }

    pub fn current_span(&self) -> Option<Span> {
        self.current().map(|spanned| spanned.span)
    }

    pub fn peek(&self) -> Option<&SpannedToken> {
        self.peek_ahead(1)
    }

    pub fn peek_ahead(&self, n: usize) -> Option<&SpannedToken> {
        self.significant_indices
            .get(self.position + n)
            .and_then(|&original_index| self.all_tokens.get(original_index))
    }

    /// Advance to the next significant token. Stays on `Eof` once reached.
    pub fn advance(&mut self) -> Option<&SpannedToken> {
        let at_eof = self.current_token().map(Token::is_eof).unwrap_or(true);
        if !at_eof && self.position < self.significant_indices.len() {
            self.position += 1;
        }
        self.current()
    }

    pub fn is_at_end(&self) -> bool {
        self.current_token().map(Token::is_eof).unwrap_or(true)
    }

    /// Number of significant tokens, `Eof` included
    pub fn len(&self) -> usize {
        self.significant_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.significant_indices.is_empty()
    }

    /// Span of the significant token at `position`
    pub fn span_at_position(&self, position: usize) -> Option<Span> {
        self.significant_indices
            .get(position)
            .and_then(|&original_index| self.all_tokens.get(original_index))
            .map(|spanned| spanned.span)
    }

    /// Span of the most recently consumed significant token
    pub fn previous_span(&self) -> Option<Span> {
        self.position
            .checked_sub(1)
            .and_then(|previous| self.span_at_position(previous))
    }

    /// Span from the token at `start_position` through the last consumed token
    pub fn span_from(&self, start_position: usize) -> Span {
        match (self.span_at_position(start_position), self.previous_span()) {
            (Some(start), Some(end)) if end.start.offset >= start.start.offset => start.merge(end),
            (Some(start), _) => start,
            _ => self.current_span().unwrap_or_else(Span::dummy),
        }
    }

    pub fn iter_significant(&self) -> impl Iterator<Item = &SpannedToken> {
        self.significant_indices
            .iter()
            .filter_map(|&i| self.all_tokens.get(i))
    }

    pub fn all_tokens(&self) -> &[SpannedToken] {
        &self.all_tokens
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::LiteralValue;

    fn stream() -> TokenStream {
        TokenStream::new(vec![
            Spanned::new(Token::Identifier("Price".into()), Span::from_offsets(0, 5)),
            Spanned::new(Token::Whitespace, Span::from_offsets(5, 6)),
            Spanned::new(Token::Identifier("gt".into()), Span::from_offsets(6, 8)),
            Spanned::new(Token::Whitespace, Span::from_offsets(8, 9)),
            Spanned::new(
                Token::Literal {
                    value: LiteralValue::Int32(5),
                    text: "5".into(),
                },
                Span::from_offsets(9, 10),
            ),
            Spanned::new(Token::Eof, Span::from_offsets(10, 10)),
        ])
    }

    #[test]
    fn test_whitespace_is_skipped() {
        let mut tokens = stream();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens.peek().map(|t| &t.value), Some(&Token::Identifier("gt".into())));

        tokens.advance();
        assert_eq!(tokens.current_span(), Some(Span::from_offsets(6, 8)));
        assert_eq!(tokens.previous_span(), Some(Span::from_offsets(0, 5)));
    }

    #[test]
    fn test_advance_stops_at_eof() {
        let mut tokens = stream();
        for _ in 0..10 {
            tokens.advance();
        }
        assert!(tokens.is_at_end());
        assert_eq!(tokens.current_token(), Some(&Token::Eof));
    }

    #[test]
    fn test_span_from() {
        let mut tokens = stream();
        let start = tokens.position();
        tokens.advance();
        tokens.advance();
        tokens.advance();
        assert_eq!(tokens.position(), 3);
        assert_eq!(tokens.span_from(start), Span::from_offsets(0, 10));
    }
}
