//! Product graph of two molecule or reaction graphs.
//!
//! A node of the product graph is a pair of compatible atoms, one in each factor graph.
//! Two pairs are joined if their atoms are bonded in both factors by compatible bonds.
//! Walks in the product graph are in one to one correspondence with pairs of simultaneous walks in the factors,
//! this reduces the counting of common walks to walk counting on one graph.
//!
//! Pairs are generated either by label blocks (atoms of both factors sorted by symbol and paired block by block)
//! or among all couples of atoms. The reduced variant drops pairs mixing a core atom with a non core atom.

use ahash::AHashMap;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Undirected;

use super::model::{Atom, Bond, MolGraph};

const UNPAIRED: usize = usize::MAX;

/// A node of the product graph : atom a1 of first factor coupled with atom a2 of second factor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PairNode {
    pub a1: NodeIndex,
    pub a2: NodeIndex,
}

impl PairNode {
    /// true if the pairs share an atom at the same position
    pub fn shares_factor(&self, other: &PairNode) -> bool {
        self.a1 == other.a1 || self.a2 == other.a2
    }
}

/// An edge of the product graph : the couple of factor bonds it comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PairEdge {
    pub e1: EdgeIndex,
    pub e2: EdgeIndex,
}

/// How candidate pairs of atoms are generated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairingMode {
    /// atoms sorted by symbol, pairs taken within blocks of equal symbol
    LabelBlocks,
    /// all couples of atoms satisfying the node match rule
    AllPairs,
}

/// Construction parameters of a product graph
#[derive(Clone, Copy, Debug)]
pub struct ProductParams {
    pub pairing: PairingMode,
    /// in AllPairs mode, require equal symbols
    pub node_match: bool,
    /// require equal bond types on top of equal bond changes
    pub edge_match: bool,
    /// drop pairs mixing core and non core atoms
    pub reduced: bool,
} // end of ProductParams

impl ProductParams {
    pub fn new(pairing: PairingMode, node_match: bool, edge_match: bool, reduced: bool) -> Self {
        ProductParams {
            pairing,
            node_match,
            edge_match,
            reduced,
        }
    }
}

impl Default for ProductParams {
    fn default() -> Self {
        ProductParams::new(PairingMode::LabelBlocks, true, false, false)
    }
}

/// A pair of atoms is kept in a reduced product graph unless exactly one of them is a core atom.
pub fn reduced_compatible(a1: &Atom, a2: &Atom) -> bool {
    a1.is_core() == a2.is_core()
}

/// bonds match if they have the same change, and the same type if asked for.
pub fn bonds_compatible(b1: &Bond, b2: &Bond, edge_match: bool) -> bool {
    b1.get_change() == b2.get_change() && (!edge_match || b1.get_type() == b2.get_type())
}

//=======================================================================================

/// The product graph of a pair of graphs, rebuilt for each pair.
pub struct ProductGraph<'a> {
    g1: &'a MolGraph,
    g2: &'a MolGraph,
    graph: Graph<PairNode, PairEdge, Undirected>,
    /// for each node x and each neighbour y of x, the other neighbours of x sharing a factor atom with y
    neighnodes: Vec<AHashMap<usize, Vec<usize>>>,
    nb_reduced_out: usize,
}

impl<'a> ProductGraph<'a> {
    pub fn new(g1: &'a MolGraph, g2: &'a MolGraph, params: &ProductParams) -> Self {
        let mut pairs = match params.pairing {
            PairingMode::LabelBlocks => label_block_pairs(g1, g2),
            PairingMode::AllPairs => all_pairs(g1, g2, params.node_match),
        };
        let mut nb_reduced_out = 0;
        if params.reduced {
            let before = pairs.len();
            pairs.retain(|p| reduced_compatible(g1.get_atom(p.a1), g2.get_atom(p.a2)));
            nb_reduced_out = before - pairs.len();
        }
        //
        let n2 = g2.nb_atoms();
        let mut lookup = vec![UNPAIRED; g1.nb_atoms() * n2];
        let mut graph = Graph::<PairNode, PairEdge, Undirected>::with_capacity(pairs.len(), 4 * pairs.len());
        for p in pairs {
            lookup[p.a1.index() * n2 + p.a2.index()] = graph.node_count();
            graph.add_node(p);
        }
        // each pair of bonds around a pair of atoms gives at most an edge, kept once from its lower end
        for x in 0..graph.node_count() {
            let p = graph[NodeIndex::new(x)];
            for e1 in g1.get_graph().edges(p.a1) {
                let b1 = other_end(&e1, p.a1);
                for e2 in g2.get_graph().edges(p.a2) {
                    let b2 = other_end(&e2, p.a2);
                    let y = lookup[b1.index() * n2 + b2.index()];
                    if y == UNPAIRED || y <= x {
                        continue;
                    }
                    if bonds_compatible(e1.weight(), e2.weight(), params.edge_match) {
                        graph.add_edge(
                            NodeIndex::new(x),
                            NodeIndex::new(y),
                            PairEdge {
                                e1: e1.id(),
                                e2: e2.id(),
                            },
                        );
                    }
                }
            }
        }
        //
        let neighnodes = shared_factor_index(&graph);
        log::trace!(
            "product graph {} x {} : nb nodes {}, nb edges {}, reduced out {}",
            g1.get_index(),
            g2.get_index(),
            graph.node_count(),
            graph.edge_count(),
            nb_reduced_out
        );
        ProductGraph {
            g1,
            g2,
            graph,
            neighnodes,
            nb_reduced_out,
        }
    } // end of new

    pub fn get_factors(&self) -> (&'a MolGraph, &'a MolGraph) {
        (self.g1, self.g2)
    }

    pub fn get_graph(&self) -> &Graph<PairNode, PairEdge, Undirected> {
        &self.graph
    }

    pub fn nb_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nb_edges(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn get_pair(&self, x: usize) -> PairNode {
        self.graph[NodeIndex::new(x)]
    }

    pub fn neighbours(&self, x: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph.neighbors(NodeIndex::new(x)).map(|n| n.index())
    }

    /// endpoints of edge e, in storage order
    pub fn get_endpoints(&self, e: usize) -> (usize, usize) {
        let edge = &self.graph.raw_edges()[e];
        (edge.source().index(), edge.target().index())
    }

    /// neighbours of x other than y sharing a factor atom with y (y must be a neighbour of x)
    pub fn shared_factor_neighbours(&self, x: usize, y: usize) -> &[usize] {
        self.neighnodes[x].get(&y).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// number of pairs dropped by the reduced construction
    pub fn get_nb_reduced_out(&self) -> usize {
        self.nb_reduced_out
    }
} // end of impl ProductGraph

fn other_end<E>(e: &petgraph::graph::EdgeReference<'_, E>, from: NodeIndex) -> NodeIndex {
    if e.source() == from {
        e.target()
    } else {
        e.source()
    }
}

// pairs of atoms with same symbol, scanning both graphs sorted by symbol
fn label_block_pairs(g1: &MolGraph, g2: &MolGraph) -> Vec<PairNode> {
    let sorted = |g: &MolGraph| {
        let mut atoms: Vec<NodeIndex> = g.get_graph().node_indices().collect();
        atoms.sort_by(|a, b| g.get_atom(*a).get_symbol().cmp(g.get_atom(*b).get_symbol()).then(a.cmp(b)));
        atoms
    };
    let (s1, s2) = (sorted(g1), sorted(g2));
    let symbol1 = |i: usize| g1.get_atom(s1[i]).get_symbol();
    let symbol2 = |j: usize| g2.get_atom(s2[j]).get_symbol();
    //
    let mut pairs = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < s1.len() && j < s2.len() {
        match symbol1(i).cmp(symbol2(j)) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                let symbol = symbol1(i);
                let iend = (i..s1.len()).find(|k| symbol1(*k) != symbol).unwrap_or(s1.len());
                let jend = (j..s2.len()).find(|k| symbol2(*k) != symbol).unwrap_or(s2.len());
                for a1 in &s1[i..iend] {
                    for a2 in &s2[j..jend] {
                        pairs.push(PairNode { a1: *a1, a2: *a2 });
                    }
                }
                i = iend;
                j = jend;
            }
        }
    }
    pairs
} // end of label_block_pairs

fn all_pairs(g1: &MolGraph, g2: &MolGraph, node_match: bool) -> Vec<PairNode> {
    let mut pairs = Vec::with_capacity(g1.nb_atoms() * g2.nb_atoms());
    for a1 in g1.get_graph().node_indices() {
        for a2 in g2.get_graph().node_indices() {
            if !node_match || g1.get_atom(a1).get_symbol() == g2.get_atom(a2).get_symbol() {
                pairs.push(PairNode { a1, a2 });
            }
        }
    }
    pairs
}

fn shared_factor_index(graph: &Graph<PairNode, PairEdge, Undirected>) -> Vec<AHashMap<usize, Vec<usize>>> {
    graph
        .node_indices()
        .map(|x| {
            let neighbours: Vec<NodeIndex> = graph.neighbors(x).collect();
            let mut index = AHashMap::with_capacity(neighbours.len());
            for y in &neighbours {
                let shared: Vec<usize> = neighbours
                    .iter()
                    .filter(|z| *z != y && graph[**z].shares_factor(&graph[*y]))
                    .map(|z| z.index())
                    .collect();
                index.insert(y.index(), shared);
            }
            index
        })
        .collect()
} // end of shared_factor_index

//=======================================================================================

// end of mod tests
