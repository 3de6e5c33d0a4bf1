//! The token-to-molecule decoder.
//!
//! Decoding is an ordered pipeline over the token stream:
//!
//! Validate -> Categorize -> DefaultAtomProperties -> CustomAtomProperties
//! -> ExplicitBonds -> ImplicitBonds -> Relabel
//!
//! The backbone of every positional query is the ordered list of token
//! positions built during categorization: "nearest atom before/after this
//! key" walks over that list, skipping non-atom keys. Branch attachment is
//! resolved against an open/close pair map built once with a stack, instead
//! of re-walking with counters for every branch token.
//!
//! Only structural errors abort a decode: a token with no matched text, or
//! a stream with no atoms at all. Chemistry-level trouble (unknown element
//! symbols, unpaired ring digits, duplicate bonds) degrades gracefully: the
//! offending entity is dropped or left without physical properties, with a
//! warning on the log.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::*;

use crate::elements::lookup_element;
use crate::molecule::{Atom, AtomProperties, Bond, BondKind, Molecule};

use super::tokenize::{Token, TokenCategory, TokenKind};

/// Fatal decode failures. Everything else degrades gracefully.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed token at index {0}: no matched text")]
    MalformedToken(usize),
    #[error("No atoms found in the token stream")]
    NoAtomsFound,
}

/// Decode a normalized token stream into a finished molecule.
pub fn decode(tokens: Vec<Token>) -> Result<Molecule, DecodeError> {
    for (index, token) in tokens.iter().enumerate() {
        if token.text.is_empty() {
            return Err(DecodeError::MalformedToken(index));
        }
    }

    let mut decoder = Decoder::categorize(&tokens);
    if decoder.atoms.is_empty() {
        return Err(DecodeError::NoAtomsFound);
    }

    decoder.default_atom_properties();
    decoder.custom_atom_properties();
    decoder.explicit_bonds();
    decoder.implicit_bonds();
    Ok(decoder.finish())
}

/// An atom under construction, keyed by its token position.
#[derive(Debug, Clone)]
struct AtomSlot {
    element: String,
    source_symbol: String,
    properties: Option<AtomProperties>,
    aromatic: bool,
    charge: i32,
    chirality: Option<String>,
    /// Bracket hydrogen count, e.g. 3 for the placeholder in `[NH3]`.
    hydrogen_count: Option<u32>,
    bonds: Vec<usize>,
    neighbors: Vec<usize>,
    bond_electrons: f64,
}

impl AtomSlot {
    fn is_hydrogen(&self) -> bool {
        self.element == "H"
    }
}

/// Bond kinds as tracked during decoding. Branch bonds are a working kind:
/// they lose duplicate fights against explicit bonds and surface as
/// single/aromatic in the finished molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireKind {
    Single,
    Double,
    Triple,
    Aromatic,
    Disconnect,
    Branch,
    Ring,
    Hydrogen,
}

#[derive(Debug, Clone)]
struct BondSlot {
    kind: WireKind,
    order: f64,
    endpoints: Vec<usize>,
}

struct Decoder {
    /// Every token position, ascending: the adjacency backbone.
    keys: Vec<usize>,
    tokens: BTreeMap<usize, Token>,
    atoms: BTreeMap<usize, AtomSlot>,
    props: BTreeMap<usize, Token>,
    bonds: BTreeMap<usize, BondSlot>,
    /// Branch open position <-> close position, both directions.
    branch_pairs: BTreeMap<usize, usize>,
    /// Fresh ids for synthesized atoms and bonds, past every source offset.
    next_id: usize,
}

impl Decoder {
    fn categorize(tokens: &[Token]) -> Self {
        let mut keys = Vec::with_capacity(tokens.len());
        let mut token_map = BTreeMap::new();
        let mut atoms = BTreeMap::new();
        let mut props = BTreeMap::new();
        let mut branch_pairs = BTreeMap::new();
        let mut open_stack: Vec<usize> = Vec::new();

        for token in tokens {
            let pos = token.position;
            keys.push(pos);
            match token.category() {
                TokenCategory::Atom => {
                    atoms.insert(pos, atom_slot(token));
                }
                TokenCategory::Property => {
                    props.insert(pos, token.clone());
                }
                TokenCategory::Bond => match token.kind {
                    TokenKind::BranchOpen => open_stack.push(pos),
                    TokenKind::BranchClose => {
                        if let Some(open) = open_stack.pop() {
                            branch_pairs.insert(open, pos);
                            branch_pairs.insert(pos, open);
                        } else {
                            warn!("Unbalanced ')' at position {pos}");
                        }
                    }
                    _ => {}
                },
            }
            token_map.insert(pos, token.clone());
        }
        if !open_stack.is_empty() {
            warn!("Unbalanced '(' at positions {:?}", open_stack);
        }

        let next_id = keys.iter().max().map(|p| p + 1).unwrap_or(0);
        Decoder {
            keys,
            tokens: token_map,
            atoms,
            props,
            bonds: BTreeMap::new(),
            branch_pairs,
            next_id,
        }
    }

    fn fresh_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn key_index(&self, pos: usize) -> Option<usize> {
        self.keys.binary_search(&pos).ok()
    }

    fn kind_at(&self, pos: usize) -> Option<&TokenKind> {
        self.tokens.get(&pos).map(|t| &t.kind)
    }

    /// Nearest atom strictly before the given key, skipping non-atom keys.
    fn prev_atom(&self, pos: usize) -> Option<usize> {
        let idx = self.key_index(pos)?;
        self.keys[..idx]
            .iter()
            .rev()
            .copied()
            .find(|k| self.atoms.contains_key(k))
    }

    /// Nearest non-hydrogen atom strictly before the given key.
    fn prev_heavy_atom(&self, pos: usize) -> Option<usize> {
        let idx = self.key_index(pos)?;
        self.keys[..idx]
            .iter()
            .rev()
            .copied()
            .find(|k| self.atoms.get(k).is_some_and(|a| !a.is_hydrogen()))
    }

    /// Nearest atom strictly after the given key.
    fn next_atom(&self, pos: usize) -> Option<usize> {
        let idx = self.key_index(pos)?;
        self.keys[idx + 1..]
            .iter()
            .copied()
            .find(|k| self.atoms.contains_key(k))
    }

    /// The attachment atom of a branch: walk backward from its `(`,
    /// jumping over balanced sub-branches, to the first non-hydrogen atom.
    fn branch_source(&self, open_pos: usize) -> Option<usize> {
        let mut idx = self.key_index(open_pos)?;
        while idx > 0 {
            idx -= 1;
            let key = self.keys[idx];
            if matches!(self.kind_at(key), Some(TokenKind::BranchClose)) {
                if let Some(&open) = self.branch_pairs.get(&key) {
                    // Jump to just before the matching '('
                    match self.key_index(open) {
                        Some(open_idx) if open_idx > 0 => {
                            idx = open_idx;
                            continue;
                        }
                        _ => return None,
                    }
                }
            }
            if let Some(atom) = self.atoms.get(&key) {
                if !atom.is_hydrogen() {
                    return Some(key);
                }
            }
        }
        None
    }

    /// What a branch token bonds forward to: the next atom, plus any
    /// bond-order symbol written on the way (the `=` in `(=O)` or after
    /// `)`). The walk stops at further branch or disconnect tokens; those
    /// hand over to their own passes.
    fn forward_target(&self, pos: usize) -> Option<(usize, Option<f64>)> {
        let idx = self.key_index(pos)?;
        let mut order = None;
        for &key in &self.keys[idx + 1..] {
            if self.atoms.contains_key(&key) {
                return Some((key, order));
            }
            match self.kind_at(key) {
                Some(TokenKind::Single) => order = Some(1.0),
                Some(TokenKind::Double) => order = Some(2.0),
                Some(TokenKind::Triple) => order = Some(3.0),
                Some(TokenKind::AromaticBond) => order = Some(1.5),
                Some(TokenKind::BranchOpen)
                | Some(TokenKind::BranchClose)
                | Some(TokenKind::Disconnect) => return None,
                _ => {}
            }
        }
        None
    }

    fn both_aromatic(&self, a: usize, b: usize) -> bool {
        self.atoms.get(&a).is_some_and(|x| x.aromatic)
            && self.atoms.get(&b).is_some_and(|x| x.aromatic)
    }

    // ---- DefaultAtomProperties ----------------------------------------

    fn default_atom_properties(&mut self) {
        for (pos, slot) in self.atoms.iter_mut() {
            match lookup_element(&slot.element) {
                Some(record) => {
                    slot.properties = Some(AtomProperties {
                        group: record.group,
                        protons: record.protons,
                        neutron_mass: record.neutron_mass,
                        electron_count: record.electrons,
                    });
                }
                None => {
                    warn!(
                        "Unknown element '{}' at position {pos}; atom kept without physical properties",
                        slot.element
                    );
                }
            }
        }
    }

    // ---- CustomAtomProperties -----------------------------------------

    fn custom_atom_properties(&mut self) {
        let props: Vec<(usize, Token)> =
            self.props.iter().map(|(p, t)| (*p, t.clone())).collect();
        for (pos, token) in props {
            match token.kind {
                TokenKind::Chiral => self.apply_chirality(pos, &token.text),
                TokenKind::Isotope => self.apply_isotope(pos, &token.text),
                TokenKind::Charge => self.apply_charge(pos, &token.text),
                _ => {}
            }
        }
    }

    fn apply_chirality(&mut self, pos: usize, text: &str) {
        let owner = self.prev_atom(pos).or_else(|| self.next_atom(pos));
        match owner {
            Some(key) => {
                if let Some(atom) = self.atoms.get_mut(&key) {
                    atom.chirality = Some(text.to_string());
                }
            }
            None => warn!("Chirality tag at {pos} has no owning atom"),
        }
    }

    /// Isotope notation precedes the atom symbol inside brackets, so the
    /// owning atom sits at the fixed offset `position + digit count`.
    fn apply_isotope(&mut self, pos: usize, text: &str) {
        let value: u32 = match text.parse() {
            Ok(v) if text.len() <= 3 && v > 0 && v <= 300 => v,
            _ => {
                warn!("Implausible isotope '{text}' at {pos}; ignored");
                return;
            }
        };
        let owner = pos + text.len();
        let Some(atom) = self.atoms.get_mut(&owner) else {
            warn!("Isotope '{text}' at {pos} has no atom at offset {owner}; ignored");
            return;
        };
        if let Some(props) = atom.properties.as_mut() {
            let neutrons = value as i64 - props.protons as i64;
            if neutrons >= 0 {
                props.neutron_mass = neutrons as f64;
            }
        }
    }

    fn apply_charge(&mut self, pos: usize, text: &str) {
        let sign: i32 = if text.contains('+') { 1 } else { -1 };
        // Numeric magnitude wins over the symbolic repeat form
        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
        let magnitude: i32 = if digits.is_empty() {
            text.chars().filter(|c| *c == '+' || *c == '-').count() as i32
        } else {
            digits.parse().unwrap_or(1)
        };
        // The charge follows its atom; hydrogen placeholders in between
        // ([OH-], [NH4+]) do not own it.
        let owner = self
            .prev_heavy_atom(pos)
            .or_else(|| self.prev_atom(pos))
            .or_else(|| self.next_atom(pos));
        match owner {
            Some(key) => {
                if let Some(atom) = self.atoms.get_mut(&key) {
                    atom.charge = sign * magnitude;
                }
            }
            None => warn!("Charge '{text}' at {pos} has no owning atom"),
        }
    }

    // ---- ExplicitBonds -------------------------------------------------

    fn explicit_bonds(&mut self) {
        let bond_tokens: Vec<(usize, TokenKind)> = self
            .keys
            .iter()
            .filter_map(|&pos| {
                let token = self.tokens.get(&pos)?;
                (token.category() == TokenCategory::Bond).then(|| (pos, token.kind.clone()))
            })
            .collect();

        let mut open_rings: BTreeMap<u16, usize> = BTreeMap::new();

        for (pos, kind) in bond_tokens {
            match kind {
                TokenKind::Single => self.plain_bond(pos, WireKind::Single, 1.0),
                TokenKind::Double => self.plain_bond(pos, WireKind::Double, 2.0),
                TokenKind::Triple => self.plain_bond(pos, WireKind::Triple, 3.0),
                TokenKind::AromaticBond => self.plain_bond(pos, WireKind::Aromatic, 1.5),
                TokenKind::Disconnect => self.plain_bond(pos, WireKind::Disconnect, 0.0),
                TokenKind::BranchOpen => self.branch_open_bond(pos),
                TokenKind::BranchClose => self.branch_close_bond(pos),
                TokenKind::Ring(value) => match open_rings.remove(&value) {
                    Some(first) => self.ring_bond(first, pos),
                    None => {
                        open_rings.insert(value, pos);
                    }
                },
                _ => {}
            }
        }

        for (value, pos) in open_rings {
            warn!("Unpaired ring closure {value} at position {pos}; dropped");
        }

        self.eliminate_duplicate_bonds();
        self.attach_bonds();
    }

    /// An explicit `-`/`=`/`#`/`:`/`.` between its two flanking atoms.
    fn plain_bond(&mut self, pos: usize, kind: WireKind, order: f64) {
        // A bond symbol directly after a `(` or `)` belongs to the branch
        // pass, which re-walks to the branch's attachment atom; resolving
        // it here would bond the wrong source. The `.` disconnect never
        // defers: branch walks stop at it.
        if kind != WireKind::Disconnect {
            if let Some(idx) = self.key_index(pos) {
                if idx > 0 {
                    let prev = self.keys[idx - 1];
                    if matches!(
                        self.kind_at(prev),
                        Some(TokenKind::BranchOpen) | Some(TokenKind::BranchClose)
                    ) {
                        trace!("Bond token at {pos} follows a branch token; deferred");
                        return;
                    }
                }
            }
        }

        let source = self.prev_atom(pos);
        let target = self.next_atom(pos);

        // A double or triple bond onto a hydrogen is physically invalid
        if matches!(kind, WireKind::Double | WireKind::Triple) {
            if let Some(t) = target {
                if self.atoms.get(&t).is_some_and(|a| a.is_hydrogen()) {
                    warn!("Dropping order-{order} bond at {pos} onto a hydrogen");
                    return;
                }
            }
        }

        let endpoints: Vec<usize> = [source, target].into_iter().flatten().collect();
        self.bonds.insert(pos, BondSlot { kind, order, endpoints });
    }

    fn branch_open_bond(&mut self, pos: usize) {
        let source = self.branch_source(pos);
        let Some((target, explicit_order)) = self.forward_target(pos) else {
            return;
        };
        let order = explicit_order.unwrap_or_else(|| match source {
            Some(s) if self.both_aromatic(s, target) => 1.5,
            _ => 1.0,
        });
        let endpoints: Vec<usize> = [source, Some(target)].into_iter().flatten().collect();
        self.bonds.insert(
            pos,
            BondSlot {
                kind: WireKind::Branch,
                order,
                endpoints,
            },
        );
    }

    fn branch_close_bond(&mut self, pos: usize) {
        let source = self
            .branch_pairs
            .get(&pos)
            .copied()
            .and_then(|open| self.branch_source(open));
        let Some((target, explicit_order)) = self.forward_target(pos) else {
            return;
        };
        let order = explicit_order.unwrap_or_else(|| match source {
            Some(s) if self.both_aromatic(s, target) => 1.5,
            _ => 1.0,
        });
        let endpoints: Vec<usize> = [source, Some(target)].into_iter().flatten().collect();
        self.bonds.insert(
            pos,
            BondSlot {
                kind: WireKind::Branch,
                order,
                endpoints,
            },
        );
    }

    /// Close a ring: the bond lives on the later token and joins the
    /// nearest atoms walking backward from each half of the pair.
    fn ring_bond(&mut self, first: usize, later: usize) {
        let a = self.prev_atom(first);
        let b = self.prev_atom(later);
        let endpoints: Vec<usize> = [a, b].into_iter().flatten().collect();
        let order = match (a, b) {
            (Some(x), Some(y)) if self.both_aromatic(x, y) => 1.5,
            _ => 1.0,
        };
        self.bonds.insert(
            later,
            BondSlot {
                kind: WireKind::Ring,
                order,
                endpoints,
            },
        );
    }

    /// Drop bonds that duplicate an earlier bond over the same endpoint
    /// pair, and bonds that never found two endpoints. Built as a filtered
    /// collection rather than spliced in place.
    fn eliminate_duplicate_bonds(&mut self) {
        let ids: Vec<usize> = self.bonds.keys().copied().collect();
        let mut dropped: Vec<usize> = Vec::new();

        for (i, &id_a) in ids.iter().enumerate() {
            for &id_b in &ids[i + 1..] {
                if dropped.contains(&id_a) || dropped.contains(&id_b) {
                    continue;
                }
                let a = &self.bonds[&id_a];
                let b = &self.bonds[&id_b];
                if !same_endpoints(a, b) {
                    continue;
                }
                // A branch bond only loses outright to an explicit bond
                // symbol; every other pairing drops the later occurrence.
                let loser = match (a.kind, b.kind) {
                    (WireKind::Branch, WireKind::Single | WireKind::Double | WireKind::Triple) => {
                        id_a
                    }
                    _ => id_b,
                };
                trace!("Duplicate bond over {:?}: dropping {loser}", a.endpoints);
                dropped.push(loser);
            }
        }

        let bonds = std::mem::take(&mut self.bonds);
        self.bonds = bonds
            .into_iter()
            .filter(|(id, slot)| {
                if dropped.contains(id) {
                    return false;
                }
                if slot.endpoints.len() < 2 {
                    warn!("Dropping bond {id} with unresolved endpoints");
                    return false;
                }
                true
            })
            .collect();
    }

    /// Record every surviving bond on both endpoint atoms.
    fn attach_bonds(&mut self) {
        let entries: Vec<(usize, usize, usize, f64)> = self
            .bonds
            .iter()
            .map(|(id, slot)| (*id, slot.endpoints[0], slot.endpoints[1], slot.order))
            .collect();
        for (id, a, b, order) in entries {
            self.push_bond_refs(id, a, b, order);
        }
    }

    fn push_bond_refs(&mut self, id: usize, a: usize, b: usize, order: f64) {
        if let Some(atom) = self.atoms.get_mut(&a) {
            atom.bonds.push(id);
            atom.neighbors.push(b);
            atom.bond_electrons += order;
        }
        if let Some(atom) = self.atoms.get_mut(&b) {
            atom.bonds.push(id);
            atom.neighbors.push(a);
            atom.bond_electrons += order;
        }
    }

    // ---- ImplicitBonds -------------------------------------------------

    fn implicit_bonds(&mut self) {
        self.adjacency_bonds();
        self.saturate_with_hydrogens();
    }

    /// Remaining bonding capacity for the adjacency pass.
    fn adjacency_capacity(&self, key: usize) -> f64 {
        let Some(atom) = self.atoms.get(&key) else {
            return 0.0;
        };
        let Some(props) = atom.properties.as_ref() else {
            // An unrecognized symbol never bonds implicitly
            return 0.0;
        };
        let group = props.group as f64;
        let shell = if props.group <= 2 { 2.0 } else { 18.0 };
        let mut capacity = shell - group - atom.bond_electrons;
        // Expanded octet: heavy main-group atoms past four bond electrons
        // (sulfate sulfur, phosphate phosphorus) accept four more
        if props.group >= 13 && atom.bond_electrons > 4.0 {
            capacity += 4.0;
        }
        if atom.charge > 0 {
            capacity -= atom.charge as f64;
        }
        capacity
    }

    /// Walk atoms in token order and bond each consecutive pair that still
    /// has capacity and no explicit token separating them. Ring closures do
    /// not separate: the digit sits between atoms that are chain-adjacent.
    fn adjacency_bonds(&mut self) {
        let atom_keys: Vec<usize> = self.atoms.keys().copied().collect();
        for window in atom_keys.windows(2) {
            let (a, b) = (window[0], window[1]);
            if self.adjacency_capacity(a) <= 0.0 || self.adjacency_capacity(b) <= 0.0 {
                continue;
            }
            if self.atoms[&a].neighbors.contains(&b) {
                continue;
            }
            if self.blocked_between(a, b) {
                continue;
            }
            let (kind, order) = if self.both_aromatic(a, b) {
                (WireKind::Aromatic, 1.5)
            } else {
                (WireKind::Single, 1.0)
            };
            let id = self.fresh_id();
            self.bonds.insert(
                id,
                BondSlot {
                    kind,
                    order,
                    endpoints: vec![a, b],
                },
            );
            self.push_bond_refs(id, a, b, order);
        }
    }

    fn blocked_between(&self, a: usize, b: usize) -> bool {
        self.keys
            .iter()
            .filter(|&&k| k > a && k < b)
            .any(|k| {
                matches!(
                    self.kind_at(*k),
                    Some(TokenKind::Single)
                        | Some(TokenKind::Double)
                        | Some(TokenKind::Triple)
                        | Some(TokenKind::AromaticBond)
                        | Some(TokenKind::Disconnect)
                        | Some(TokenKind::BranchOpen)
                        | Some(TokenKind::BranchClose)
                )
            })
    }

    /// Fill remaining valence with hydrogen atoms.
    ///
    /// Atoms with a multi-count bracket placeholder ([NH3]) expand it into
    /// discrete hydrogens; everything else in group 13..=18 gets
    /// `18 - group - bond electrons` hydrogens, charge-adjusted. A negative
    /// charge whose adjustment leaves exactly one electron of capacity
    /// spends it on a lone pair instead of a bond.
    fn saturate_with_hydrogens(&mut self) {
        let atom_keys: Vec<usize> = self.atoms.keys().copied().collect();
        for key in atom_keys {
            let atom = &self.atoms[&key];
            if atom.is_hydrogen() {
                continue;
            }

            let placeholder = atom.neighbors.iter().copied().find(|n| {
                self.atoms
                    .get(n)
                    .is_some_and(|a| a.is_hydrogen() && a.hydrogen_count.unwrap_or(0) >= 2)
            });
            if let Some(h_key) = placeholder {
                let count = self.atoms[&h_key].hydrogen_count.unwrap_or(0);
                trace!("Expanding H{count} placeholder on atom at {key}");
                for _ in 0..count.saturating_sub(1) {
                    self.add_hydrogen(key);
                }
                if let Some(h) = self.atoms.get_mut(&h_key) {
                    h.hydrogen_count = None;
                }
                continue;
            }

            let Some(props) = atom.properties.as_ref() else {
                continue;
            };
            if props.group < 13 {
                continue;
            }
            let mut capacity = 18.0 - props.group as f64 - atom.bond_electrons;
            let charge = atom.charge;
            if charge > 0 {
                capacity -= charge as f64;
            } else if charge < 0 {
                capacity += charge as f64;
                if capacity == 1.0 {
                    // The adjusted remainder is a lone pair, not a bond
                    capacity = 0.0;
                }
            }
            let count = capacity.max(0.0).floor() as usize;
            for _ in 0..count {
                self.add_hydrogen(key);
            }
        }
    }

    fn add_hydrogen(&mut self, heavy: usize) {
        let record = lookup_element("H");
        let h_key = self.fresh_id();
        self.atoms.insert(
            h_key,
            AtomSlot {
                element: "H".to_string(),
                source_symbol: "H".to_string(),
                properties: record.map(|r| AtomProperties {
                    group: r.group,
                    protons: r.protons,
                    neutron_mass: r.neutron_mass,
                    electron_count: r.electrons,
                }),
                aromatic: false,
                charge: 0,
                chirality: None,
                hydrogen_count: None,
                bonds: Vec::new(),
                neighbors: Vec::new(),
                bond_electrons: 0.0,
            },
        );
        let bond_id = self.fresh_id();
        self.bonds.insert(
            bond_id,
            BondSlot {
                kind: WireKind::Hydrogen,
                order: 1.0,
                endpoints: vec![heavy, h_key],
            },
        );
        self.push_bond_refs(bond_id, heavy, h_key, 1.0);
    }

    // ---- Relabel -------------------------------------------------------

    /// Reassign stable ids (element symbol + occurrence count), rewrite all
    /// cross-references, and assemble the finished molecule.
    fn finish(self) -> Molecule {
        let mut occurrence: BTreeMap<String, usize> = BTreeMap::new();
        let mut final_ids: BTreeMap<usize, String> = BTreeMap::new();
        for (key, slot) in &self.atoms {
            let n = occurrence.entry(slot.element.clone()).or_insert(0);
            *n += 1;
            final_ids.insert(*key, format!("{}{}", slot.element, n));
        }

        let mut atoms = BTreeMap::new();
        for (key, slot) in &self.atoms {
            let id = final_ids[key].clone();
            atoms.insert(
                id.clone(),
                Atom {
                    id,
                    element: slot.element.clone(),
                    source_symbol: slot.source_symbol.clone(),
                    properties: slot.properties.clone(),
                    bonds: slot.bonds.iter().map(|b| b.to_string()).collect(),
                    neighbors: slot
                        .neighbors
                        .iter()
                        .map(|n| final_ids[n].clone())
                        .collect(),
                    bond_electrons: slot.bond_electrons,
                    chirality: slot.chirality.clone(),
                    charge: slot.charge,
                    aromatic: slot.aromatic,
                },
            );
        }

        let mut bonds = BTreeMap::new();
        for (id, slot) in &self.bonds {
            let source = final_ids[&slot.endpoints[0]].clone();
            let target = final_ids[&slot.endpoints[1]].clone();
            let source_element = self.atoms[&slot.endpoints[0]].element.clone();
            let target_element = self.atoms[&slot.endpoints[1]].element.clone();
            let label = format!("{source_element}{}{target_element}", format_order(slot.order));
            bonds.insert(
                id.to_string(),
                Bond {
                    id: id.to_string(),
                    kind: final_bond_kind(slot.kind, slot.order),
                    order: slot.order,
                    source,
                    target,
                    label,
                },
            );
        }

        debug!(
            "Decoded molecule: {} atoms, {} bonds",
            atoms.len(),
            bonds.len()
        );
        let molecular_weight = crate::properties::molecular_weight(&atoms);
        let molecular_formula = crate::properties::molecular_formula(&atoms);
        Molecule {
            atoms,
            bonds,
            molecular_weight,
            molecular_formula,
        }
    }
}

fn atom_slot(token: &Token) -> AtomSlot {
    let element = match &token.kind {
        TokenKind::Element(symbol) => symbol.clone(),
        TokenKind::Hydrogen => "H".to_string(),
        _ => token.text.clone(),
    };
    let hydrogen_count = if matches!(token.kind, TokenKind::Hydrogen) && token.text.len() > 1 {
        token.text[1..].parse().ok()
    } else {
        None
    };
    AtomSlot {
        element,
        source_symbol: token.text.clone(),
        properties: None,
        aromatic: token.is_aromatic_atom(),
        charge: 0,
        chirality: None,
        hydrogen_count,
        bonds: Vec::new(),
        neighbors: Vec::new(),
        bond_electrons: 0.0,
    }
}

fn same_endpoints(a: &BondSlot, b: &BondSlot) -> bool {
    if a.endpoints.len() != 2 || b.endpoints.len() != 2 {
        return false;
    }
    (a.endpoints[0] == b.endpoints[0] && a.endpoints[1] == b.endpoints[1])
        || (a.endpoints[0] == b.endpoints[1] && a.endpoints[1] == b.endpoints[0])
}

fn final_bond_kind(kind: WireKind, order: f64) -> BondKind {
    match kind {
        WireKind::Single => BondKind::Single,
        WireKind::Double => BondKind::Double,
        WireKind::Triple => BondKind::Triple,
        WireKind::Aromatic => BondKind::Aromatic,
        WireKind::Disconnect => BondKind::Disconnect,
        WireKind::Ring => BondKind::Ring,
        WireKind::Hydrogen => BondKind::Hydrogen,
        // Surviving branch bonds surface by their order
        WireKind::Branch => {
            if order == 1.5 {
                BondKind::Aromatic
            } else if order == 2.0 {
                BondKind::Double
            } else if order == 3.0 {
                BondKind::Triple
            } else {
                BondKind::Single
            }
        }
    }
}

fn format_order(order: f64) -> String {
    if order.fract() == 0.0 {
        format!("{}", order as i64)
    } else {
        format!("{order}")
    }
}
