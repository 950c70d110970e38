//! Atoms, bonds and the molecule/reaction graphs built from them.
//!
//! A [MolGraph] owns a petgraph arena of [Atom] and [Bond] addressed by dense indexes.
//! Beside the arena it caches what is needed to reject isomorphism tests cheaply:
//! the formula, a node spectrum (each atom symbol followed by the sorted symbols of its neighbours),
//! an edge spectrum (sorted endpoint symbols around the bond change) and a structural hash combining them.
//!
//! Graphs are assembled through a [GraphBuilder] which validates bonds at the loader boundary.

use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hash, Hasher};

use anyhow::anyhow;

use fixedbitset::FixedBitSet;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Undirected;

/// core distance of an atom not yet reached by the core distance computation
pub const CORE_DIST_UNSET: u32 = u32::MAX;

// fixed seeds so that graph hashes are reproducible from one run to another
const HASH_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

/// An atom: its chemical symbol and its hop distance to the reacting core.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    symbol: String,
    core_dist: u32,
}

impl Atom {
    pub fn new(symbol: &str) -> Self {
        Atom {
            symbol: symbol.to_string(),
            core_dist: CORE_DIST_UNSET,
        }
    }

    pub fn get_symbol(&self) -> &str {
        &self.symbol
    }

    /// hop distance to the nearest core atom, [CORE_DIST_UNSET] before computation
    pub fn get_core_dist(&self) -> u32 {
        self.core_dist
    }

    pub fn is_core(&self) -> bool {
        self.core_dist == 0
    }

    pub(crate) fn set_core_dist(&mut self, dist: u32) {
        self.core_dist = dist;
    }
} // end of impl Atom

//=======================================================================================

/// What happens to a bond during the reaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondChange {
    Removed,
    Unchanged,
    Formed,
}

impl BondChange {
    /// decode the -1/0/+1 convention of reaction files
    pub fn from_i32(change: i32) -> anyhow::Result<Self> {
        match change {
            -1 => Ok(BondChange::Removed),
            0 => Ok(BondChange::Unchanged),
            1 => Ok(BondChange::Formed),
            _ => Err(anyhow!("invalid bond change value {}, expecting -1, 0 or 1", change)),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            BondChange::Removed => -1,
            BondChange::Unchanged => 0,
            BondChange::Formed => 1,
        }
    }
} // end of impl BondChange

/// A bond. `btype` is the bond order used when bond types must match,
/// `old_type` and `new_type` are the bond orders before and after the reaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bond {
    btype: i32,
    change: BondChange,
    old_type: i32,
    new_type: i32,
}

impl Bond {
    pub fn new(btype: i32, change: BondChange, old_type: i32, new_type: i32) -> Self {
        Bond {
            btype,
            change,
            old_type,
            new_type,
        }
    }

    /// an unchanged bond of given order, as found in molecules
    pub fn plain(btype: i32) -> Self {
        Bond::new(btype, BondChange::Unchanged, btype, btype)
    }

    pub fn get_type(&self) -> i32 {
        self.btype
    }

    pub fn get_change(&self) -> BondChange {
        self.change
    }

    pub fn get_old_type(&self) -> i32 {
        self.old_type
    }

    pub fn get_new_type(&self) -> i32 {
        self.new_type
    }

    /// true if the bond is formed or broken
    pub fn is_changed(&self) -> bool {
        self.change != BondChange::Unchanged
    }
} // end of impl Bond

//=======================================================================================

/// Reaction specific data read from a reaction file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReactionInfo {
    /// ligand code of the reaction
    pub ligand: String,
    /// EC numbers attached to the reaction
    pub ec_codes: Vec<String>,
    /// reactant ligands
    pub reactants: Vec<String>,
    /// product ligands
    pub products: Vec<String>,
    /// +1 for forward, -1 for backward
    pub direction: i8,
    /// atom mapping number
    pub mapnum: String,
}

/// The variants of graphs we deal with. They share the whole [MolGraph] structure,
/// only reactions carry an extra payload.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphKind {
    Molecule,
    Reaction(ReactionInfo),
}

//=======================================================================================

/// A molecule or reaction graph.
#[derive(Clone, Debug)]
pub struct MolGraph {
    /// rank of the graph in its batch, rows and columns of kernel matrices refer to it
    index: usize,
    name: String,
    kind: GraphKind,
    graph: Graph<Atom, Bond, Undirected>,
    formula: BTreeMap<String, usize>,
    node_spectrum: Vec<String>,
    edge_spectrum: Vec<String>,
    hash: u64,
    core_computed: bool,
}

impl MolGraph {
    /// builds a graph from an arena already checked by a [GraphBuilder]
    pub(crate) fn from_parts(
        index: usize,
        name: String,
        kind: GraphKind,
        graph: Graph<Atom, Bond, Undirected>,
    ) -> Self {
        let mut molgraph = MolGraph {
            index,
            name,
            kind,
            graph,
            formula: BTreeMap::new(),
            node_spectrum: Vec::new(),
            edge_spectrum: Vec::new(),
            hash: 0,
            core_computed: false,
        };
        molgraph.refresh();
        molgraph
    }

    /// recomputes formula, spectra and hash after any structural modification
    fn refresh(&mut self) {
        self.formula.clear();
        for atom in self.graph.node_weights() {
            *self.formula.entry(atom.symbol.clone()).or_insert(0) += 1;
        }
        //
        self.node_spectrum = self
            .graph
            .node_indices()
            .map(|n| {
                let mut neighbours: Vec<&str> = self
                    .graph
                    .neighbors(n)
                    .map(|m| self.graph[m].get_symbol())
                    .collect();
                neighbours.sort_unstable();
                let mut entry = self.graph[n].symbol.clone();
                entry.push('(');
                entry.push_str(&neighbours.join(","));
                entry.push(')');
                entry
            })
            .collect();
        self.node_spectrum.sort_unstable();
        //
        self.edge_spectrum = self
            .graph
            .edge_references()
            .map(|e| {
                let s1 = self.graph[e.source()].get_symbol();
                let s2 = self.graph[e.target()].get_symbol();
                let (low, high) = if s1 <= s2 { (s1, s2) } else { (s2, s1) };
                format!("{}{}{}", low, e.weight().get_change().as_i32(), high)
            })
            .collect();
        self.edge_spectrum.sort_unstable();
        //
        let mut hasher = ahash::RandomState::with_seeds(
            HASH_SEEDS[0],
            HASH_SEEDS[1],
            HASH_SEEDS[2],
            HASH_SEEDS[3],
        )
        .build_hasher();
        self.graph.node_count().hash(&mut hasher);
        self.graph.edge_count().hash(&mut hasher);
        self.formula.hash(&mut hasher);
        self.node_spectrum.hash(&mut hasher);
        self.edge_spectrum.hash(&mut hasher);
        self.hash = hasher.finish();
    } // end of refresh

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_kind(&self) -> &GraphKind {
        &self.kind
    }

    /// access to the underlying petgraph arena
    pub fn get_graph(&self) -> &Graph<Atom, Bond, Undirected> {
        &self.graph
    }

    pub fn nb_atoms(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nb_bonds(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn get_atom(&self, n: NodeIndex) -> &Atom {
        &self.graph[n]
    }

    pub fn get_bond(&self, e: EdgeIndex) -> &Bond {
        &self.graph[e]
    }

    /// the bond between 2 atoms if any
    pub fn find_bond(&self, a: NodeIndex, b: NodeIndex) -> Option<&Bond> {
        self.graph.find_edge(a, b).map(|e| &self.graph[e])
    }

    pub fn are_bonded(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.graph.find_edge(a, b).is_some()
    }

    pub fn neighbours(&self, n: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(n)
    }

    pub fn degree(&self, n: NodeIndex) -> usize {
        self.graph.neighbors(n).count()
    }

    /// symbol -> number of atoms
    pub fn get_formula(&self) -> &BTreeMap<String, usize> {
        &self.formula
    }

    /// sorted multiset of atom neighbourhood descriptors
    pub fn get_node_spectrum(&self) -> &[String] {
        &self.node_spectrum
    }

    /// sorted multiset of bond descriptors
    pub fn get_edge_spectrum(&self) -> &[String] {
        &self.edge_spectrum
    }

    /// structural hash, equal for isomorphic graphs
    pub fn get_hash(&self) -> u64 {
        self.hash
    }

    /// Hash of the graph as numbered : atoms in index order with their core distance, then bonds with their endpoints.
    /// Unlike [get_hash](Self::get_hash) it changes when atoms are renumbered, so it identifies
    /// data attached to atom indexes (weights, chains, operators).
    pub fn layout_key(&self) -> u64 {
        let mut hasher = ahash::RandomState::with_seeds(
            HASH_SEEDS[0],
            HASH_SEEDS[1],
            HASH_SEEDS[2],
            HASH_SEEDS[3],
        )
        .build_hasher();
        self.core_computed.hash(&mut hasher);
        self.graph.node_count().hash(&mut hasher);
        for atom in self.graph.node_weights() {
            atom.symbol.hash(&mut hasher);
            atom.core_dist.hash(&mut hasher);
        }
        for e in self.graph.edge_references() {
            let bond = e.weight();
            (e.source().index(), e.target().index()).hash(&mut hasher);
            (bond.btype, bond.change, bond.old_type, bond.new_type).hash(&mut hasher);
        }
        hasher.finish()
    } // end of layout_key

    /// true once core distances have been computed (and unreachable atoms pruned)
    pub fn has_core_distances(&self) -> bool {
        self.core_computed
    }

    /// atoms incident to a formed or broken bond
    pub fn core_atoms(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|n| self.graph.edges(*n).any(|e| e.weight().is_changed()))
            .collect()
    }

    /// atoms at core distance 0, valid after core distance computation
    pub fn core_distance_zero_atoms(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|n| self.graph[*n].is_core())
            .collect()
    }

    /// reaction direction, 0 for a molecule
    pub fn get_direction(&self) -> i8 {
        match &self.kind {
            GraphKind::Reaction(info) => info.direction,
            GraphKind::Molecule => 0,
        }
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph<Atom, Bond, Undirected> {
        &mut self.graph
    }

    /// keeps only atoms satisfying the predicate, compacts indexes and recomputes derived data
    pub(crate) fn retain_atoms<F>(&mut self, keep: F)
    where
        F: Fn(&Atom) -> bool,
    {
        let kept = self.graph.filter_map(
            |_, atom| if keep(atom) { Some(atom.clone()) } else { None },
            |_, bond| Some(*bond),
        );
        self.graph = kept;
        self.refresh();
    }

    pub(crate) fn set_core_computed(&mut self) {
        self.core_computed = true;
    }

    /// The subgraph induced by the atoms whose index bit is set.
    /// Atoms are renumbered in increasing order of their index in self, all bonds between selected atoms are kept.
    pub fn induced_subgraph(&self, selected: &FixedBitSet) -> MolGraph {
        let subgraph = self.graph.filter_map(
            |n, atom| {
                if selected.contains(n.index()) {
                    Some(atom.clone())
                } else {
                    None
                }
            },
            |_, bond| Some(*bond),
        );
        let mut induced = MolGraph::from_parts(self.index, self.name.clone(), self.kind.clone(), subgraph);
        induced.core_computed = self.core_computed;
        induced
    } // end of induced_subgraph
} // end of impl MolGraph

impl super::BatchGraph for MolGraph {
    fn get_index(&self) -> usize {
        self.index
    }

    fn get_name(&self) -> &str {
        &self.name
    }
}

//=======================================================================================

/// Assembles a [MolGraph], rejecting bonds the kernels cannot cope with.
pub struct GraphBuilder {
    index: usize,
    name: String,
    kind: GraphKind,
    graph: Graph<Atom, Bond, Undirected>,
}

impl GraphBuilder {
    pub fn new(name: &str, kind: GraphKind) -> Self {
        GraphBuilder {
            index: 0,
            name: name.to_string(),
            kind,
            graph: Graph::with_capacity(32, 32),
        }
    }

    /// sets the rank of the graph in its batch
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// adds an atom, atoms are numbered from 0 in order of insertion
    pub fn add_atom(&mut self, symbol: &str) -> NodeIndex {
        self.graph.add_node(Atom::new(symbol))
    }

    /// adds a bond between atoms of rank a and b.
    /// Dangling references, self loops and duplicate bonds are errors.
    pub fn add_bond(&mut self, a: usize, b: usize, bond: Bond) -> anyhow::Result<EdgeIndex> {
        let nb_atoms = self.graph.node_count();
        if a >= nb_atoms || b >= nb_atoms {
            return Err(anyhow!(
                "graph {} : bond ({}, {}) references a missing atom, nb atoms : {}",
                self.name,
                a,
                b,
                nb_atoms
            ));
        }
        if a == b {
            return Err(anyhow!("graph {} : self loop on atom {}", self.name, a));
        }
        let (na, nb) = (NodeIndex::new(a), NodeIndex::new(b));
        if self.graph.find_edge(na, nb).is_some() {
            return Err(anyhow!("graph {} : duplicate bond ({}, {})", self.name, a, b));
        }
        Ok(self.graph.add_edge(na, nb, bond))
    } // end of add_bond

    pub fn nb_atoms(&self) -> usize {
        self.graph.node_count()
    }

    pub fn build(self) -> MolGraph {
        log::trace!(
            "GraphBuilder::build {}, nb atoms {}, nb bonds {}",
            self.name,
            self.graph.node_count(),
            self.graph.edge_count()
        );
        MolGraph::from_parts(self.index, self.name, self.kind, self.graph)
    }
} // end of impl GraphBuilder

//=======================================================================================

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn builder_rejects_bad_bonds() {
        log_init_test();
        //
        let mut builder = GraphBuilder::new("bad", GraphKind::Molecule);
        builder.add_atom("C");
        builder.add_atom("O");
        assert!(builder.add_bond(0, 1, Bond::plain(1)).is_ok());
        assert!(builder.add_bond(1, 0, Bond::plain(2)).is_err());
        assert!(builder.add_bond(0, 0, Bond::plain(1)).is_err());
        assert!(builder.add_bond(0, 2, Bond::plain(1)).is_err());
        let g = builder.build();
        assert_eq!(g.nb_bonds(), 1);
    } // end of builder_rejects_bad_bonds

    #[test]
    fn formula_and_spectra() {
        log_init_test();
        //
        let g = from_edges(&["C", "O", "C"], &[(0, 1, 0), (1, 2, 1)]);
        assert_eq!(g.get_formula().get("C"), Some(&2));
        assert_eq!(g.get_formula().get("O"), Some(&1));
        assert_eq!(g.get_node_spectrum(), &["C(O)", "C(O)", "O(C,C)"]);
        assert_eq!(g.get_edge_spectrum(), &["C0O", "C1O"]);
        assert_eq!(g.core_atoms(), vec![NodeIndex::new(1), NodeIndex::new(2)]);
    } // end of formula_and_spectra

    #[test]
    fn hash_ignores_numbering() {
        log_init_test();
        //
        let g1 = from_edges(&["C", "O", "N"], &[(0, 1, 0), (1, 2, 0)]);
        let g2 = from_edges(&["N", "O", "C"], &[(2, 1, 0), (0, 1, 0)]);
        assert_eq!(g1.get_hash(), g2.get_hash());
        let g3 = from_edges(&["C", "O", "N"], &[(0, 1, 0), (1, 2, 1)]);
        assert_ne!(g1.get_hash(), g3.get_hash());
        // same structure, other numbering
        assert_ne!(g1.layout_key(), g2.layout_key());
        let g4 = from_edges(&["C", "O", "N"], &[(0, 1, 0), (1, 2, 0)]);
        assert_eq!(g1.layout_key(), g4.layout_key());
    }

    #[test]
    fn induced_subgraph_recompacts() {
        log_init_test();
        //
        let g = chain(&["C", "C", "O", "N"], 0);
        let mut bits = FixedBitSet::with_capacity(g.nb_atoms());
        bits.insert(1);
        bits.insert(2);
        bits.insert(3);
        let sub = g.induced_subgraph(&bits);
        assert_eq!(sub.nb_atoms(), 3);
        assert_eq!(sub.nb_bonds(), 2);
        assert_eq!(sub.get_atom(NodeIndex::new(0)).get_symbol(), "C");
        assert_eq!(sub.get_atom(NodeIndex::new(2)).get_symbol(), "N");
        assert!(sub.are_bonded(NodeIndex::new(1), NodeIndex::new(2)));
        assert_eq!(sub.get_formula().get("C"), Some(&1));
    } // end of induced_subgraph_recompacts
} // end of mod tests
