//! Ring-closure token preprocessing.
//!
//! A bare digit run like the `12` in `C12CC1CC2` is ambiguous: it is either
//! a genuine multi-digit ring number (the `%`-escaped equivalent) or two
//! concatenated single-digit ring closures. The resolution rule is pairing:
//! a multi-digit ring token that shares its exact number with another ring
//! token somewhere in the stream is left intact; one with no partner is
//! split into one single-digit token per digit.

use tracing::*;

use super::tokenize::{Token, TokenKind};

/// Normalize a token stream by splitting unpaired multi-digit ring tokens.
///
/// Each original token is visited once; tokens created by a split are not
/// re-scanned for further pairing opportunities.
pub fn normalize(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());

    for (index, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::Ring(_) if should_split(&tokens, index) => {
                trace!(
                    "Splitting unpaired ring token '{}' at {}",
                    token.text,
                    token.position
                );
                for (i, digit) in token.text.chars().enumerate() {
                    let single = digit.to_digit(10).unwrap_or(0) as u16;
                    out.push(Token {
                        position: token.position + i,
                        text: digit.to_string(),
                        kind: TokenKind::Ring(single),
                    });
                }
            }
            _ => out.push(token.clone()),
        }
    }

    out.sort_by_key(|t| t.position);
    out
}

/// A ring token splits when its digit run is longer than one digit, is not
/// `%`-escaped, and no other ring token carries the same number.
fn should_split(tokens: &[Token], index: usize) -> bool {
    let token = &tokens[index];
    let TokenKind::Ring(value) = token.kind else {
        return false;
    };
    if token.text.starts_with('%') || token.text.len() <= 1 {
        return false;
    }
    let paired = tokens.iter().enumerate().any(|(i, other)| {
        i != index && matches!(other.kind, TokenKind::Ring(v) if v == value)
    });
    !paired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::tokenize::tokenize;

    fn ring_values(tokens: &[Token]) -> Vec<u16> {
        tokens
            .iter()
            .filter_map(|t| match t.kind {
                TokenKind::Ring(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_unpaired_run_splits() {
        // Spiro-style notation: "12" is ring 1 followed by ring 2
        let tokens = normalize(tokenize("C12CC1CC2"));
        assert_eq!(ring_values(&tokens), vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_paired_multi_digit_survives() {
        let tokens = normalize(tokenize("C12CCCCC12"));
        assert_eq!(ring_values(&tokens), vec![12, 12]);
    }

    #[test]
    fn test_escaped_ring_is_never_split() {
        let tokens = normalize(tokenize("C%12CCC%12"));
        assert_eq!(ring_values(&tokens), vec![12, 12]);
        // and the partner keeps a bare "12" intact too
        let tokens = normalize(tokenize("C%12CCC12"));
        assert_eq!(ring_values(&tokens), vec![12, 12]);
    }

    #[test]
    fn test_single_digit_untouched() {
        let tokens = normalize(tokenize("C1CCCCC1"));
        assert_eq!(ring_values(&tokens), vec![1, 1]);
    }

    #[test]
    fn test_split_tokens_keep_source_offsets() {
        let tokens = normalize(tokenize("C12CC1CC2"));
        let rings: Vec<&Token> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Ring(_)))
            .collect();
        assert_eq!(rings[0].position, 1);
        assert_eq!(rings[1].position, 2);
    }

    #[test]
    fn test_positions_stay_sorted() {
        let tokens = normalize(tokenize("C12CC1CC2"));
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }
}
