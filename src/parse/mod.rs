mod tokenize;
pub use tokenize::*;

mod normalize;
pub use normalize::*;

mod decode;
pub use decode::*;

use anyhow::{Context, Result};

use crate::molecule::Molecule;

/// Parse a SMILES string into a molecule.
///
/// Runs the full pipeline: tokenize, normalize ring closures, decode.
pub fn parse(smiles: &str) -> Result<Molecule> {
    let tokens = normalize(tokenize(smiles));
    decode(tokens).context(format!("Failed to parse SMILES string {smiles}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ethanol() {
        let molecule = parse("CCO").expect("Failed to parse SMILES");
        assert_eq!(molecule.formula_string(), "C2H6O");
    }

    #[test]
    fn test_parse_failure_carries_input() {
        let err = parse("").expect_err("Empty input must not parse");
        assert!(format!("{err:#}").contains("Failed to parse SMILES string"));
    }
}
