//! The element reference table consumed by the decoder.
//!
//! The table is a static CSV asset compiled into the binary and parsed once
//! on first access. It is never mutated afterwards, so concurrent decodes can
//! share it freely.

use std::collections::{BTreeMap, BTreeSet};

use csv::ReaderBuilder;
use lazy_static::lazy_static;
use tracing::*;

/// Physical properties of one element, as stored in the reference table.
///
/// `neutron_mass` is the average neutron mass contribution: the standard
/// atomic weight minus the proton count. Adding `protons` back recovers the
/// atomic weight used for molecular weight sums.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementRecord {
    pub symbol: String,
    pub protons: u32,
    pub neutron_mass: f64,
    pub electrons: u32,
    pub group: u8,
    pub period: u8,
}

fn read_element_table(csv_data: &str) -> BTreeMap<String, ElementRecord> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());
    let mut table = BTreeMap::new();

    for result in rdr.records() {
        let record = result.expect("Error reading element record");
        let parsed = (|| -> Option<ElementRecord> {
            Some(ElementRecord {
                symbol: record.get(0)?.to_string(),
                protons: record.get(1)?.parse().ok()?,
                neutron_mass: record.get(2)?.parse().ok()?,
                electrons: record.get(3)?.parse().ok()?,
                group: record.get(4)?.parse().ok()?,
                period: record.get(5)?.parse().ok()?,
            })
        })();
        match parsed {
            Some(entry) => {
                table.insert(entry.symbol.clone(), entry);
            }
            None => {
                warn!("Skipping malformed element record: {:?}", record);
            }
        }
    }
    table
}

lazy_static! {
    /// The periodic table, keyed by element symbol.
    static ref ELEMENTS: BTreeMap<String, ElementRecord> = {
        let csv_data = include_str!("elements.csv");
        read_element_table(csv_data)
    };

    /// All two-letter symbols in the table, used by the tokenizer to decide
    /// when a bare letter must not be read as a one-letter element.
    static ref TWO_LETTER_SYMBOLS: BTreeSet<String> = ELEMENTS
        .keys()
        .filter(|sym| sym.len() == 2)
        .cloned()
        .collect();

    /// All one-letter symbols in the table.
    static ref ONE_LETTER_SYMBOLS: BTreeSet<String> = ELEMENTS
        .keys()
        .filter(|sym| sym.len() == 1)
        .cloned()
        .collect();
}

/// Look up an element by its canonical symbol (e.g. "C", "Cl").
pub fn lookup_element(symbol: &str) -> Option<&'static ElementRecord> {
    ELEMENTS.get(symbol)
}

/// Whether the table contains the given two-letter symbol.
pub fn is_two_letter_symbol(symbol: &str) -> bool {
    TWO_LETTER_SYMBOLS.contains(symbol)
}

/// Whether the table contains the given one-letter symbol.
pub fn is_one_letter_symbol(symbol: &str) -> bool {
    ONE_LETTER_SYMBOLS.contains(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_common_elements() {
        let carbon = lookup_element("C").expect("Carbon missing from table");
        assert_eq!(carbon.protons, 6);
        assert_eq!(carbon.group, 14);
        assert_eq!(carbon.period, 2);
        assert!((carbon.neutron_mass - 6.011).abs() < 1e-9);

        let chlorine = lookup_element("Cl").expect("Chlorine missing from table");
        assert_eq!(chlorine.protons, 17);
        assert_eq!(chlorine.group, 17);
    }

    #[test]
    fn test_atomic_weight_reconstruction() {
        // protons + neutron_mass must recover the standard atomic weight
        let oxygen = lookup_element("O").unwrap();
        assert!((oxygen.protons as f64 + oxygen.neutron_mass - 15.999).abs() < 1e-9);
    }

    #[test]
    fn test_symbol_sets() {
        assert!(is_two_letter_symbol("Cl"));
        assert!(is_two_letter_symbol("Br"));
        assert!(!is_two_letter_symbol("C"));
        assert!(is_one_letter_symbol("C"));
        assert!(is_one_letter_symbol("H"));
        assert!(!is_one_letter_symbol("Xx"));
    }

    #[test]
    fn test_unknown_symbol() {
        assert!(lookup_element("Xx").is_none());
        assert!(lookup_element("*").is_none());
    }

    #[test]
    fn test_table_coverage() {
        // extended table: well beyond the H..I core
        assert!(ELEMENTS.len() >= 90);
        assert!(lookup_element("U").is_some());
    }
}
