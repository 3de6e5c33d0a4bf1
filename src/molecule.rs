//! The decoded molecular graph: atoms, bonds, and derived quantities.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Physical properties copied onto an atom from the element reference table.
///
/// Atoms whose symbol is absent from the table (e.g. the `*` wildcard) carry
/// `None` instead of zeroed fields, so callers can tell a real atom from an
/// unrecognized one without sentinel inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomProperties {
    pub group: u8,
    pub protons: u32,
    /// Average neutron mass; isotope annotations override this with an exact
    /// neutron count.
    pub neutron_mass: f64,
    pub electron_count: u32,
}

/// A single atom in the decoded graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Final stable identifier: element symbol plus 1-based occurrence count
    /// in discovery order, e.g. "C1", "C2", "O1".
    pub id: String,
    /// Canonical element symbol.
    pub element: String,
    /// The raw matched text; lower case marks an aromatic ring atom.
    pub source_symbol: String,
    /// Reference table data, or `None` for unrecognized symbols.
    pub properties: Option<AtomProperties>,
    /// Incident bond ids, in resolution order.
    pub bonds: Vec<String>,
    /// Neighbor atom ids, index-aligned with `bonds`.
    pub neighbors: Vec<String>,
    /// Sum of bond orders over all incident bonds.
    pub bond_electrons: f64,
    /// The `@`/`@@` substring, verbatim, if any.
    pub chirality: Option<String>,
    pub charge: i32,
    pub aromatic: bool,
}

impl Atom {
    /// Group from the reference table, if the element was recognized.
    pub fn group(&self) -> Option<u8> {
        self.properties.as_ref().map(|p| p.group)
    }

    /// Atomic weight contribution: protons + neutron mass.
    pub fn atomic_weight(&self) -> f64 {
        self.properties
            .as_ref()
            .map(|p| p.protons as f64 + p.neutron_mass)
            .unwrap_or(0.0)
    }
}

/// The kind of a resolved bond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondKind {
    Single,
    Double,
    Triple,
    Aromatic,
    Ring,
    Hydrogen,
    /// A `.` disconnect: order zero, joins fragments without sharing electrons.
    Disconnect,
}

impl BondKind {
    /// Numeric bond order: 0 for disconnect, 1.5 for aromatic.
    pub fn order(&self) -> f64 {
        match self {
            BondKind::Single | BondKind::Hydrogen => 1.0,
            BondKind::Double => 2.0,
            BondKind::Triple => 3.0,
            BondKind::Aromatic => 1.5,
            BondKind::Ring => 1.0,
            BondKind::Disconnect => 0.0,
        }
    }
}

/// A single bond in the decoded graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    /// Stable identifier: the source position of the bond token, or a
    /// synthesized id for implicit bonds.
    pub id: String,
    pub kind: BondKind,
    pub order: f64,
    pub source: String,
    pub target: String,
    /// Display value: source element + order + target element, e.g. "C2O".
    pub label: String,
}

impl Display for Bond {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.label)
    }
}

/// A finished molecule. Produced by the decoder; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Molecule {
    pub atoms: BTreeMap<String, Atom>,
    pub bonds: BTreeMap<String, Bond>,
    pub molecular_weight: f64,
    pub molecular_formula: BTreeMap<String, usize>,
}

impl Molecule {
    /// Number of atoms, implicit hydrogens included.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of retained bonds.
    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Count of atoms with the given element symbol.
    pub fn element_count(&self, symbol: &str) -> usize {
        self.molecular_formula.get(symbol).copied().unwrap_or(0)
    }

    /// The molecular formula as a Hill-ordered string, e.g. "C6H12O2".
    pub fn formula_string(&self) -> String {
        let mut out = String::new();
        let mut rest: Vec<(&String, &usize)> = self
            .molecular_formula
            .iter()
            .filter(|(sym, _)| *sym != "C" && *sym != "H")
            .collect();
        rest.sort_by(|a, b| a.0.cmp(b.0));
        for sym in ["C", "H"] {
            if let Some(count) = self.molecular_formula.get(sym) {
                out.push_str(sym);
                if *count > 1 {
                    out.push_str(&count.to_string());
                }
            }
        }
        for (sym, count) in rest {
            out.push_str(sym);
            if *count > 1 {
                out.push_str(&count.to_string());
            }
        }
        out
    }
}
