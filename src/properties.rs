//! Derived molecular quantities: weight and formula.

use std::collections::BTreeMap;

use crate::molecule::Atom;

/// Sum of atomic weights over all atoms, rounded to three decimal places.
/// Atoms without reference-table properties contribute nothing.
pub fn molecular_weight(atoms: &BTreeMap<String, Atom>) -> f64 {
    let total: f64 = atoms.values().map(|a| a.atomic_weight()).sum();
    (total * 1000.0).round() / 1000.0
}

/// Atom counts grouped by element symbol. Unrecognized symbols are counted
/// under their own key.
pub fn molecular_formula(atoms: &BTreeMap<String, Atom>) -> BTreeMap<String, usize> {
    let mut formula = BTreeMap::new();
    for atom in atoms.values() {
        *formula.entry(atom.element.clone()).or_insert(0) += 1;
    }
    formula
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ethanol_weight() {
        let molecule = crate::parse("CCO").expect("Failed to parse SMILES");
        // 2 * 12.011 + 6 * 1.008 + 15.999
        assert!((molecule.molecular_weight - 46.069).abs() < 0.001);
    }

    #[test]
    fn test_weight_is_rounded() {
        let molecule = crate::parse("CCO").expect("Failed to parse SMILES");
        let scaled = molecule.molecular_weight * 1000.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn test_formula_counts() {
        let molecule = crate::parse("CC(=O)O").expect("Failed to parse SMILES");
        assert_eq!(molecule.molecular_formula.get("C"), Some(&2));
        assert_eq!(molecule.molecular_formula.get("H"), Some(&4));
        assert_eq!(molecule.molecular_formula.get("O"), Some(&2));
    }

    #[test]
    fn test_unknown_atoms_counted_but_weightless() {
        let with_wildcard = crate::parse("C*").expect("Failed to parse SMILES");
        let without = crate::parse("C").expect("Failed to parse SMILES");
        assert_eq!(with_wildcard.molecular_formula.get("*"), Some(&1));
        assert!((with_wildcard.molecular_weight - without.molecular_weight).abs() < 0.001);
    }
}
