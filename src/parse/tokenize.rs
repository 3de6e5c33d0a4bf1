//! The SMILES tokenizer.
//!
//! Tokenization is rule-table driven: a fixed, ordered list of lexical rules
//! is applied to the input, and every rule is scanned independently over the
//! whole string at every character offset (not a single consuming
//! left-to-right scanner). All matches from all rules are collected and then
//! stably sorted by source offset, with rule order as the tie-break.
//!
//! Rules are mutually exclusive by construction: two-letter element symbols
//! win over one-letter symbols via negative lookahead, bracket-only rules
//! (charge, isotope, chirality) check their bracket context, and digit runs
//! are claimed by exactly one of the isotope, hydrogen-count, and
//! ring-closure rules depending on what precedes them.
//!
//! Characters matching no rule (`[`, `]`, whitespace, stereo slashes) are
//! skipped; the tokenizer never fails. Input that matches nothing yields an
//! empty token list, which the decoder reports as "no atoms found".

use nom::bytes::complete::take_while1;
use nom::IResult;

use crate::elements::{is_one_letter_symbol, is_two_letter_symbol};

/// What a token contributes to the molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Atom,
    Bond,
    Property,
}

/// The specific subtype of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A recognized element symbol, canonical case. The matched text keeps
    /// the source case: lower case marks an aromatic atom.
    Element(String),
    /// An `H` atom, optionally carrying a bracket hydrogen count ("H3").
    Hydrogen,
    /// The `*` wildcard atom.
    Wildcard,
    Single,
    Double,
    Triple,
    AromaticBond,
    /// The `.` fragment disconnect, bond order zero.
    Disconnect,
    BranchOpen,
    BranchClose,
    /// A ring-closure number. `%`-escaped tokens keep the `%` in their text.
    Ring(u16),
    Charge,
    Isotope,
    Chiral,
}

/// One lexical token with its absolute source offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub position: usize,
    pub text: String,
    pub kind: TokenKind,
}

impl Token {
    pub fn category(&self) -> TokenCategory {
        match self.kind {
            TokenKind::Element(_) | TokenKind::Hydrogen | TokenKind::Wildcard => {
                TokenCategory::Atom
            }
            TokenKind::Single
            | TokenKind::Double
            | TokenKind::Triple
            | TokenKind::AromaticBond
            | TokenKind::Disconnect
            | TokenKind::BranchOpen
            | TokenKind::BranchClose
            | TokenKind::Ring(_) => TokenCategory::Bond,
            TokenKind::Charge | TokenKind::Isotope | TokenKind::Chiral => TokenCategory::Property,
        }
    }

    /// Whether the token is an atom written in lower case (aromatic).
    pub fn is_aromatic_atom(&self) -> bool {
        matches!(self.kind, TokenKind::Element(_))
            && self.text.chars().next().is_some_and(|c| c.is_lowercase())
    }
}

type Matcher = fn(&str, usize) -> Option<Token>;

/// The fixed rule table. Order matters only for the sort tie-break; the
/// matchers themselves enforce mutual exclusion.
const RULES: &[(&str, Matcher)] = &[
    ("element-two-letter", match_two_letter_element),
    ("element-aromatic-two-letter", match_aromatic_two_letter),
    ("hydrogen", match_hydrogen),
    ("element-one-letter", match_one_letter_element),
    ("element-aromatic", match_aromatic_one_letter),
    ("wildcard", match_wildcard),
    ("isotope", match_isotope),
    ("ring-escaped", match_percent_ring),
    ("ring", match_ring),
    ("charge", match_charge),
    ("chiral", match_chiral),
    ("bond", match_bond),
    ("branch", match_branch),
];

/// Tokenize a SMILES string into a position-ordered token stream.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for (_name, matcher) in RULES {
        for (offset, _) in input.char_indices() {
            if let Some(token) = matcher(input, offset) {
                tokens.push(token);
            }
        }
    }
    // Stable: tokens emitted by earlier rules stay first at equal offsets.
    tokens.sort_by_key(|t| t.position);
    tokens
}

fn digit_run(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit())(input)
}

fn sign_run(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c == '+' || c == '-')(input)
}

fn char_at(input: &str, offset: usize) -> Option<char> {
    input[offset..].chars().next()
}

fn char_before(input: &str, offset: usize) -> Option<char> {
    input[..offset].chars().next_back()
}

/// Whether the offset falls between a `[` and its closing `]`.
fn in_bracket(input: &str, offset: usize) -> bool {
    for c in input[..offset].chars().rev() {
        match c {
            '[' => return true,
            ']' => return false,
            _ => {}
        }
    }
    false
}

fn match_two_letter_element(input: &str, offset: usize) -> Option<Token> {
    let rest = &input[offset..];
    let mut chars = rest.chars();
    let first = chars.next()?;
    let second = chars.next()?;
    if !first.is_ascii_uppercase() || !second.is_ascii_lowercase() {
        return None;
    }
    let symbol: String = [first, second].iter().collect();
    if !is_two_letter_symbol(&symbol) {
        return None;
    }
    Some(Token {
        position: offset,
        text: symbol.clone(),
        kind: TokenKind::Element(symbol),
    })
}

/// Aromatic selenium and arsenic, bracket notation only.
fn match_aromatic_two_letter(input: &str, offset: usize) -> Option<Token> {
    let rest = &input[offset..];
    let symbol = if rest.starts_with("se") {
        "Se"
    } else if rest.starts_with("as") {
        "As"
    } else {
        return None;
    };
    if !in_bracket(input, offset) {
        return None;
    }
    Some(Token {
        position: offset,
        text: rest[..2].to_string(),
        kind: TokenKind::Element(symbol.to_string()),
    })
}

/// `H`, optionally carrying a bracket hydrogen count as in `[NH3]`.
fn match_hydrogen(input: &str, offset: usize) -> Option<Token> {
    if char_at(input, offset)? != 'H' {
        return None;
    }
    // Not the start of He, Hf, Hg, Ho
    if let Some(next) = char_at(input, offset + 1) {
        if next.is_ascii_lowercase() && is_two_letter_symbol(&format!("H{next}")) {
            return None;
        }
    }
    let mut text = String::from("H");
    if in_bracket(input, offset) {
        if let Ok((_, digits)) = digit_run(&input[offset + 1..]) {
            text.push_str(digits);
        }
    }
    Some(Token {
        position: offset,
        text,
        kind: TokenKind::Hydrogen,
    })
}

fn match_one_letter_element(input: &str, offset: usize) -> Option<Token> {
    let first = char_at(input, offset)?;
    if !first.is_ascii_uppercase() || first == 'H' {
        return None;
    }
    let symbol = first.to_string();
    if !is_one_letter_symbol(&symbol) {
        return None;
    }
    // Negative lookahead: a continuation letter that forms a known
    // two-letter symbol means this offset belongs to that rule instead.
    if let Some(next) = char_at(input, offset + 1) {
        if next.is_ascii_lowercase() && is_two_letter_symbol(&format!("{first}{next}")) {
            return None;
        }
    }
    Some(Token {
        position: offset,
        text: symbol.clone(),
        kind: TokenKind::Element(symbol),
    })
}

fn match_aromatic_one_letter(input: &str, offset: usize) -> Option<Token> {
    let first = char_at(input, offset)?;
    if !matches!(first, 'b' | 'c' | 'n' | 'o' | 'p' | 's') {
        return None;
    }
    // "se" and "as" belong to the two-letter aromatic rule, whether this
    // offset is the head of the former or the tail of the latter
    if first == 's'
        && in_bracket(input, offset)
        && (char_at(input, offset + 1) == Some('e') || char_before(input, offset) == Some('a'))
    {
        return None;
    }
    // Not the tail of a two-letter symbol such as Sc, Sn or Co
    if let Some(prev) = char_before(input, offset) {
        if prev.is_ascii_uppercase() && is_two_letter_symbol(&format!("{prev}{first}")) {
            return None;
        }
    }
    Some(Token {
        position: offset,
        text: first.to_string(),
        kind: TokenKind::Element(first.to_ascii_uppercase().to_string()),
    })
}

fn match_wildcard(input: &str, offset: usize) -> Option<Token> {
    if char_at(input, offset)? != '*' {
        return None;
    }
    Some(Token {
        position: offset,
        text: "*".to_string(),
        kind: TokenKind::Wildcard,
    })
}

/// A digit run directly after `[`, followed by an atom symbol: `[13C]`.
fn match_isotope(input: &str, offset: usize) -> Option<Token> {
    if char_before(input, offset) != Some('[') {
        return None;
    }
    let (_, digits) = digit_run(&input[offset..]).ok()?;
    let after = char_at(input, offset + digits.len())?;
    if !after.is_ascii_alphabetic() {
        return None;
    }
    Some(Token {
        position: offset,
        text: digits.to_string(),
        kind: TokenKind::Isotope,
    })
}

fn parse_ring_value(digits: &str) -> u16 {
    digits.parse::<u32>().map(|v| v.min(u16::MAX as u32)).unwrap_or(0) as u16
}

/// `%` followed by a digit run: an escaped multi-digit ring number.
fn match_percent_ring(input: &str, offset: usize) -> Option<Token> {
    if char_at(input, offset)? != '%' {
        return None;
    }
    let (_, digits) = digit_run(&input[offset + 1..]).ok()?;
    Some(Token {
        position: offset,
        text: format!("%{digits}"),
        kind: TokenKind::Ring(parse_ring_value(digits)),
    })
}

/// A bare digit run attached to a preceding atom (or to `)` / `]`).
///
/// Digit runs claimed by other rules never reach here: after `[` they are
/// isotopes, after `H` they are hydrogen counts, after `%` they are escaped
/// ring numbers, and after `+`/`-` they are charge magnitudes.
fn match_ring(input: &str, offset: usize) -> Option<Token> {
    let first = char_at(input, offset)?;
    if !first.is_ascii_digit() || in_bracket(input, offset) {
        return None;
    }
    let prev = char_before(input, offset)?;
    let attached = (prev.is_ascii_alphabetic() && prev != 'H') || prev == ')' || prev == ']';
    if !attached {
        return None;
    }
    let (_, digits) = digit_run(&input[offset..]).ok()?;
    Some(Token {
        position: offset,
        text: digits.to_string(),
        kind: TokenKind::Ring(parse_ring_value(digits)),
    })
}

/// A charge annotation inside brackets: `+`, `--`, `+2`, `-1`, `+++`.
fn match_charge(input: &str, offset: usize) -> Option<Token> {
    let first = char_at(input, offset)?;
    if first != '+' && first != '-' {
        return None;
    }
    if !in_bracket(input, offset) {
        return None;
    }
    // Only the start of a sign run matches
    if matches!(char_before(input, offset), Some('+') | Some('-')) {
        return None;
    }
    let rest = &input[offset..];
    // Numeric form takes precedence over the symbolic repeat form
    let text = if let Ok((_, digits)) = digit_run(&rest[1..]) {
        format!("{first}{digits}")
    } else {
        let (_, signs) = sign_run(rest).ok()?;
        signs.to_string()
    };
    Some(Token {
        position: offset,
        text,
        kind: TokenKind::Charge,
    })
}

fn match_chiral(input: &str, offset: usize) -> Option<Token> {
    if char_at(input, offset)? != '@' {
        return None;
    }
    if !in_bracket(input, offset) || char_before(input, offset) == Some('@') {
        return None;
    }
    let text = if char_at(input, offset + 1) == Some('@') {
        "@@"
    } else {
        "@"
    };
    Some(Token {
        position: offset,
        text: text.to_string(),
        kind: TokenKind::Chiral,
    })
}

fn match_bond(input: &str, offset: usize) -> Option<Token> {
    let kind = match char_at(input, offset)? {
        '=' => TokenKind::Double,
        '#' => TokenKind::Triple,
        '.' => TokenKind::Disconnect,
        // Inside brackets '-' is a charge and ':' is an atom class
        '-' if !in_bracket(input, offset) => TokenKind::Single,
        ':' if !in_bracket(input, offset) => TokenKind::AromaticBond,
        _ => return None,
    };
    Some(Token {
        position: offset,
        text: input[offset..offset + 1].to_string(),
        kind,
    })
}

fn match_branch(input: &str, offset: usize) -> Option<Token> {
    let kind = match char_at(input, offset)? {
        '(' => TokenKind::BranchOpen,
        ')' => TokenKind::BranchClose,
        _ => return None,
    };
    Some(Token {
        position: offset,
        text: input[offset..offset + 1].to_string(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_ethanol() {
        let tokens = tokenize("CCO");
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].position, 0);
        assert_eq!(tokens[1].position, 1);
        assert_eq!(tokens[2].kind, TokenKind::Element("O".to_string()));
        assert!(tokens.iter().all(|t| t.category() == TokenCategory::Atom));
    }

    #[test]
    fn test_two_letter_wins_over_one_letter() {
        let tokens = tokenize("CCl");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Element("C".to_string()));
        assert_eq!(tokens[1].kind, TokenKind::Element("Cl".to_string()));
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_aromatic_atoms_keep_source_case() {
        let tokens = tokenize("c1ccccc1");
        assert_eq!(tokens[0].kind, TokenKind::Element("C".to_string()));
        assert_eq!(tokens[0].text, "c");
        assert!(tokens[0].is_aromatic_atom());
        assert!(matches!(tokens[1].kind, TokenKind::Ring(1)));
    }

    #[test]
    fn test_bonds_and_branches() {
        assert_eq!(
            kinds("C=C#C(C)C"),
            vec![
                TokenKind::Element("C".to_string()),
                TokenKind::Double,
                TokenKind::Element("C".to_string()),
                TokenKind::Triple,
                TokenKind::Element("C".to_string()),
                TokenKind::BranchOpen,
                TokenKind::Element("C".to_string()),
                TokenKind::BranchClose,
                TokenKind::Element("C".to_string()),
            ]
        );
    }

    #[test]
    fn test_percent_ring() {
        let tokens = tokenize("C%12CC%12");
        let rings: Vec<&Token> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Ring(_)))
            .collect();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[0].text, "%12");
        assert!(matches!(rings[0].kind, TokenKind::Ring(12)));
    }

    #[test]
    fn test_multi_digit_ring_is_one_token() {
        // Without the % escape the digit run comes out as a single token;
        // the preprocessor decides whether to split it.
        let tokens = tokenize("C12CC");
        let rings: Vec<&Token> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Ring(_)))
            .collect();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].text, "12");
    }

    #[test]
    fn test_bracket_properties() {
        let tokens = tokenize("[13C@@H2+2]");
        assert_eq!(tokens[0].kind, TokenKind::Isotope);
        assert_eq!(tokens[0].text, "13");
        assert_eq!(tokens[1].kind, TokenKind::Element("C".to_string()));
        assert_eq!(tokens[2].kind, TokenKind::Chiral);
        assert_eq!(tokens[2].text, "@@");
        assert_eq!(tokens[3].kind, TokenKind::Hydrogen);
        assert_eq!(tokens[3].text, "H2");
        assert_eq!(tokens[4].kind, TokenKind::Charge);
        assert_eq!(tokens[4].text, "+2");
    }

    #[test]
    fn test_charge_repeat_form() {
        let tokens = tokenize("[Fe+++]");
        let charge = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Charge)
            .expect("Missing charge token");
        assert_eq!(charge.text, "+++");
    }

    #[test]
    fn test_minus_outside_bracket_is_a_bond() {
        let tokens = tokenize("C-C");
        assert_eq!(tokens[1].kind, TokenKind::Single);
        let tokens = tokenize("[O-]");
        assert_eq!(
            tokens.iter().filter(|t| t.kind == TokenKind::Single).count(),
            0
        );
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Charge));
    }

    #[test]
    fn test_aromatic_selenium_and_arsenic_are_one_token() {
        let tokens = tokenize("[se]");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Element("Se".to_string()));

        // the 's' tail of "as" must not also match as aromatic sulfur
        let tokens = tokenize("[as]");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Element("As".to_string()));
        assert_eq!(tokens[0].text, "as");
        assert!(tokens[0].is_aromatic_atom());
    }

    #[test]
    fn test_hydrogen_vs_mercury() {
        let tokens = tokenize("[Hg]");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Element("Hg".to_string()));
    }

    #[test]
    fn test_disconnect_and_wildcard() {
        let tokens = tokenize("C.*");
        assert_eq!(tokens[1].kind, TokenKind::Disconnect);
        assert_eq!(tokens[2].kind, TokenKind::Wildcard);
    }

    #[test]
    fn test_stereo_slashes_are_skipped() {
        let tokens = tokenize("C/C=C/C");
        assert_eq!(
            tokens.iter().filter(|t| t.category() == TokenCategory::Atom).count(),
            4
        );
        assert_eq!(
            tokens.iter().filter(|t| t.kind == TokenKind::Double).count(),
            1
        );
    }

    #[test]
    fn test_unmatchable_input_is_empty_not_error() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!??").is_empty());
    }

    #[test]
    fn test_tokens_sorted_by_position() {
        let tokens = tokenize("CC(=O)OC");
        let positions: Vec<usize> = tokens.iter().map(|t| t.position).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }
}
