//! A petgraph view of a decoded molecule, for callers that want to run
//! graph algorithms (ring perception, traversal, isomorphism) rather than
//! walk the id maps by hand.

use std::collections::BTreeMap;

use petgraph::graph::{NodeIndex, UnGraph};

use crate::molecule::{BondKind, Molecule};

/// An undirected molecular graph: node weights are atom ids, edge weights
/// are bond orders.
pub type MoleculeGraph = UnGraph<String, f64>;

/// Build the graph view. Disconnect pseudo-bonds are not edges: the graph
/// of `[Na+].[Cl-]` has two components.
pub fn to_graph(molecule: &Molecule) -> MoleculeGraph {
    let mut graph = MoleculeGraph::default();
    let mut indices: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    for id in molecule.atoms.keys() {
        indices.insert(id, graph.add_node(id.clone()));
    }
    for bond in molecule.bonds.values() {
        if bond.kind == BondKind::Disconnect {
            continue;
        }
        if let (Some(&a), Some(&b)) = (
            indices.get(bond.source.as_str()),
            indices.get(bond.target.as_str()),
        ) {
            graph.add_edge(a, b, bond.order);
        }
    }
    graph
}

impl Molecule {
    pub fn to_graph(&self) -> MoleculeGraph {
        to_graph(self)
    }
}
