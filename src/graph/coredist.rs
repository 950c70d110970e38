//! Core distances.
//!
//! Core atoms are atoms incident to a formed or broken bond. Every atom receives its hop distance
//! to the nearest core atom by a multi source breadth first search.
//! Atoms not reachable from the core are removed from the graph.
//! A graph without any core (a molecule for example) gets distance 0 everywhere.

use std::collections::VecDeque;

use super::model::{MolGraph, CORE_DIST_UNSET};

/// Annotates atoms with their core distance and prunes atoms unreachable from the core.
/// Returns the number of atoms removed.
pub fn compute_core_distances(graph: &mut MolGraph) -> usize {
    let core = graph.core_atoms();
    let nb_atoms = graph.nb_atoms();
    //
    if core.is_empty() {
        log::debug!("graph {} has no core, setting all core distances to 0", graph.get_name());
        for atom in graph.graph_mut().node_weights_mut() {
            atom.set_core_dist(0);
        }
        graph.set_core_computed();
        return 0;
    }
    //
    let mut dist = vec![CORE_DIST_UNSET; nb_atoms];
    let mut queue = VecDeque::<usize>::with_capacity(nb_atoms);
    for n in &core {
        dist[n.index()] = 0;
        queue.push_back(n.index());
    }
    while let Some(n) = queue.pop_front() {
        let next = dist[n] + 1;
        for m in graph.neighbours(petgraph::graph::NodeIndex::new(n)) {
            if dist[m.index()] == CORE_DIST_UNSET {
                dist[m.index()] = next;
                queue.push_back(m.index());
            }
        }
    }
    //
    for (atom, d) in graph.graph_mut().node_weights_mut().zip(dist.iter()) {
        atom.set_core_dist(*d);
    }
    let nb_unreached = dist.iter().filter(|d| **d == CORE_DIST_UNSET).count();
    if nb_unreached > 0 {
        log::debug!(
            "graph {} : pruning {} atoms unreachable from core",
            graph.get_name(),
            nb_unreached
        );
        graph.retain_atoms(|atom| atom.get_core_dist() != CORE_DIST_UNSET);
    }
    graph.set_core_computed();
    nb_unreached
} // end of compute_core_distances

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;
    use petgraph::graph::NodeIndex;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn no_core_gives_zero() {
        log_init_test();
        //
        let mut g = chain(&["C", "O", "N", "C"], 0);
        assert_eq!(compute_core_distances(&mut g), 0);
        assert!(g.has_core_distances());
        for atom in g.get_graph().node_weights() {
            assert_eq!(atom.get_core_dist(), 0);
        }
    }

    #[test]
    fn distances_from_core() {
        log_init_test();
        //
        let mut g = reaction_like();
        compute_core_distances(&mut g);
        let dists: Vec<u32> = g.get_graph().node_weights().map(|a| a.get_core_dist()).collect();
        // core atoms are 1, 2 (broken bond) and 3, 4 (formed bond)
        assert_eq!(dists, vec![1, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn unreachable_atoms_are_pruned() {
        log_init_test();
        //
        // component {0,1,2} holds the core, {3,4} is detached
        let mut g = from_edges(&["C", "O", "N", "S", "P"], &[(0, 1, 1), (1, 2, 0), (3, 4, 0)]);
        let removed = compute_core_distances(&mut g);
        assert_eq!(removed, 2);
        assert_eq!(g.nb_atoms(), 3);
        assert_eq!(g.nb_bonds(), 2);
        assert_eq!(g.get_formula().get("S"), None);
        assert_eq!(g.get_atom(NodeIndex::new(2)).get_symbol(), "N");
        assert_eq!(g.get_atom(NodeIndex::new(2)).get_core_dist(), 1);
    }
} // end of mod tests
