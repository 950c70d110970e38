//! Compound graphs of reactions.
//!
//! The compound graph of a reaction has a node per reactant and per product. Each node refers to the molecule graph
//! of its compound by its index in a molecule batch.
//! Two compounds are linked when a reactant pair of the reaction relates them, the link carrying the type of the pair.
//! Compounds of the same side not yet linked are then linked by a group link.

use petgraph::graph::{Graph, NodeIndex};
use petgraph::Undirected;

use super::BatchGraph;

/// Type of a reactant pair, the relation between two compounds of a reaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PairType {
    Main,
    Leave,
    Cofac,
    Trans,
    Ligase,
    /// compounds on the same side, or any pair type not listed above
    Group,
}

impl PairType {
    /// decodes the type names of reactant pair files. Unknown names are group links.
    pub fn from_name(name: &str) -> Self {
        match name {
            "main" => PairType::Main,
            "leave" => PairType::Leave,
            "cofac" => PairType::Cofac,
            "trans" => PairType::Trans,
            "ligase" => PairType::Ligase,
            _ => PairType::Group,
        }
    }
} // end of impl PairType

/// A compound of a reaction.
#[derive(Clone, Debug, PartialEq)]
pub struct Compound {
    ligand : String,
    molecule : usize,
    reactant : bool,
}

impl Compound {
    pub fn get_ligand(&self) -> &str {
        &self.ligand
    }

    /// index of the molecule graph of the compound
    pub fn get_molecule(&self) -> usize {
        self.molecule
    }

    pub fn is_reactant(&self) -> bool {
        self.reactant
    }
}

/// A reaction as a graph of compounds.
#[derive(Clone, Debug)]
pub struct CompoundGraph {
    index : usize,
    name : String,
    graph : Graph<Compound, PairType, Undirected>,
}

impl CompoundGraph {
    /// Reactants and products are given as (ligand, molecule index), reactant pairs as (ligand, ligand, type).
    /// A pair links every two distinct compounds carrying its ligands, in either order, the first pair found
    /// for two compounds giving the type of their link.
    pub fn new(
        name: &str,
        reactants: &[(String, usize)],
        products: &[(String, usize)],
        pairs: &[(String, String, PairType)],
    ) -> Self {
        let mut graph = Graph::<Compound, PairType, Undirected>::with_capacity(
            reactants.len() + products.len(),
            pairs.len() + reactants.len() * reactants.len() + products.len() * products.len(),
        );
        for (reactant, side) in [(true, reactants), (false, products)] {
            for (ligand, molecule) in side {
                graph.add_node(Compound {
                    ligand: ligand.clone(),
                    molecule: *molecule,
                    reactant,
                });
            }
        }
        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for n1 in &nodes {
            for n2 in &nodes {
                if n1 == n2 || graph.find_edge(*n1, *n2).is_some() {
                    continue;
                }
                let (l1, l2) = (graph[*n1].ligand.as_str(), graph[*n2].ligand.as_str());
                let found = pairs
                    .iter()
                    .find(|(a, b, _)| (a == l1 && b == l2) || (a == l2 && b == l1));
                if let Some((_, _, ptype)) = found {
                    graph.add_edge(*n1, *n2, *ptype);
                }
            }
        }
        // clique on each side
        for n1 in &nodes {
            for n2 in &nodes {
                if n1 < n2 && graph[*n1].reactant == graph[*n2].reactant && graph.find_edge(*n1, *n2).is_none() {
                    graph.add_edge(*n1, *n2, PairType::Group);
                }
            }
        }
        log::trace!(
            "compound graph {} : {} compounds, {} links",
            name,
            graph.node_count(),
            graph.edge_count()
        );
        CompoundGraph {
            index: 0,
            name: name.to_string(),
            graph,
        }
    } // end of new

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn nb_compounds(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nb_links(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn get_compound(&self, n: NodeIndex) -> &Compound {
        &self.graph[n]
    }

    /// type of the link between two compounds if any
    pub fn find_link(&self, a: NodeIndex, b: NodeIndex) -> Option<PairType> {
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    pub fn neighbours(&self, n: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(n)
    }

    pub fn degree(&self, n: NodeIndex) -> usize {
        self.graph.neighbors(n).count()
    }

    pub fn get_graph(&self) -> &Graph<Compound, PairType, Undirected> {
        &self.graph
    }
} // end of impl CompoundGraph

impl BatchGraph for CompoundGraph {
    fn get_index(&self) -> usize {
        self.index
    }

    fn get_name(&self) -> &str {
        &self.name
    }
}

// end of mod tests
