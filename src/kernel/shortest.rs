//! Shortest paths kernel.
//!
//! Each ordered pair of distinct atoms (a, b) connected in a graph is described by the label of a shortest path from a to b :
//! the atom symbols of the path interleaved with the changes of its bonds (and bond types if edges must match).
//! When several shortest paths join a and b the lexicographically smallest label is kept, so that the description
//! does not depend on the numbering of atoms.
//!
//! With $n_G(p)$ the number of pairs of $G$ labelled $p$ and $|p|$ the number of atoms of $p$ :
//! $$K(G, G') = \sum_p \lambda^{|p|} n_G(p) n_{G'}(p)$$

use std::collections::VecDeque;

use ahash::AHashMap;
use anyhow::anyhow;
use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use crate::graph::model::MolGraph;

use super::params::KernelParams;
use super::GraphKernel;

/// Counts of shortest path labels of a graph.
#[derive(Clone, Debug, Default)]
pub struct PathCensus {
    /// label -> (number of atoms, number of atom pairs)
    counts : AHashMap<String, (usize, usize)>,
}

impl PathCensus {
    pub fn new(graph: &MolGraph, edge_match: bool) -> Self {
        let mut counts = AHashMap::<String, (usize, usize)>::new();
        for source in graph.get_graph().node_indices() {
            for (label, nb_atoms) in shortest_labels(graph, source, edge_match) {
                counts.entry(label).or_insert((nb_atoms, 0)).1 += 1;
            }
        }
        PathCensus { counts }
    }

    /// number of distinct labels
    pub fn nb_labels(&self) -> usize {
        self.counts.len()
    }

    /// number of ordered atom pairs described
    pub fn nb_pairs(&self) -> usize {
        self.counts.values().map(|(_, n)| n).sum()
    }

    pub fn count_of(&self, label: &str) -> usize {
        self.counts.get(label).map(|(_, n)| *n).unwrap_or(0)
    }
} // end of impl PathCensus

// label of a step to an atom through a bond
fn step_tokens(graph: &MolGraph, from: NodeIndex, to: NodeIndex, edge_match: bool) -> [String; 2] {
    let bond = match graph.find_bond(from, to) {
        Some(bond) if edge_match => format!("{}:{}", bond.get_change().as_i32(), bond.get_type()),
        Some(bond) => bond.get_change().as_i32().to_string(),
        None => String::new(),
    };
    [bond, graph.get_atom(to).get_symbol().to_string()]
}

/// Labels of the smallest shortest paths from source to every other atom reached, with their number of atoms.
/// Atoms are labelled in breadth first order, the label of an atom extending the smallest label among its
/// predecessors one level closer to the source.
fn shortest_labels(graph: &MolGraph, source: NodeIndex, edge_match: bool) -> Vec<(String, usize)> {
    let n = graph.nb_atoms();
    let mut dist = vec![usize::MAX; n];
    let mut order = Vec::<NodeIndex>::with_capacity(n);
    let mut queue = VecDeque::<NodeIndex>::with_capacity(n);
    dist[source.index()] = 0;
    queue.push_back(source);
    while let Some(a) = queue.pop_front() {
        order.push(a);
        for b in graph.neighbours(a) {
            if dist[b.index()] == usize::MAX {
                dist[b.index()] = dist[a.index()] + 1;
                queue.push_back(b);
            }
        }
    }
    //
    let mut best: Vec<Option<Vec<String>>> = vec![None; n];
    best[source.index()] = Some(vec![graph.get_atom(source).get_symbol().to_string()]);
    for a in order.iter().skip(1) {
        let mut smallest: Option<Vec<String>> = None;
        for p in graph.neighbours(*a) {
            if dist[p.index()] + 1 != dist[a.index()] {
                continue;
            }
            if let Some(prefix) = &best[p.index()] {
                let mut label = prefix.clone();
                label.extend(step_tokens(graph, p, *a, edge_match));
                if smallest.as_ref().map_or(true, |s| label < *s) {
                    smallest = Some(label);
                }
            }
        }
        best[a.index()] = smallest;
    }
    //
    order
        .iter()
        .skip(1)
        .filter_map(|a| best[a.index()].as_ref().map(|label| (label.concat(), dist[a.index()] + 1)))
        .collect()
} // end of shortest_labels

//=======================================================================================

/// Kernel comparing shortest path labels.
pub struct ShortestPathsKernel {
    params : KernelParams,
    /// censuses of prepared graphs with the layout key of the graph, indexed by graph index
    censuses : Vec<Option<(u64, PathCensus)>>,
}

impl ShortestPathsKernel {
    pub fn new(params: KernelParams) -> anyhow::Result<Self> {
        params.check()?;
        Ok(ShortestPathsKernel {
            params,
            censuses: Vec::new(),
        })
    }

    fn cached_census(&self, graph: &MolGraph) -> Option<&PathCensus> {
        match self.censuses.get(graph.get_index()) {
            Some(Some((key, c))) if *key == graph.layout_key() => Some(c),
            _ => None,
        }
    }
} // end of impl ShortestPathsKernel

impl GraphKernel for ShortestPathsKernel {
    fn get_name(&self) -> String {
        let mut name = format!("shortestpaths-l{:.2}", self.params.lambda);
        if self.params.edge_match {
            name.push_str("-em");
        }
        name
    }

    fn prepare(&mut self, graphs: &[MolGraph]) -> anyhow::Result<()> {
        let cpu_start = cpu_time::ProcessTime::now();
        let sys_start = std::time::SystemTime::now();
        let edge_match = self.params.edge_match;
        let censuses: Vec<(usize, u64, PathCensus)> = graphs
            .par_iter()
            .map(|g| (g.get_index(), g.layout_key(), PathCensus::new(g, edge_match)))
            .collect();
        let size = graphs.iter().map(|g| g.get_index() + 1).max().unwrap_or(0);
        self.censuses = (0..size).map(|_| None).collect();
        for (index, key, census) in censuses {
            if let Some(Some(_)) = self.censuses.get(index) {
                return Err(anyhow!("two graphs of the batch have index {}", index));
            }
            self.censuses[index] = Some((key, census));
        }
        log::info!(
            "shortest path censuses of {} graphs, sys time(s) {:.2e} cpu time(s) {:.2e}",
            graphs.len(),
            sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
            cpu_start.elapsed().as_secs_f64()
        );
        Ok(())
    } // end of prepare

    fn compute(&self, g1: &MolGraph, g2: &MolGraph) -> anyhow::Result<f64> {
        let local1;
        let local2;
        let census1 = match self.cached_census(g1) {
            Some(c) => c,
            None => {
                local1 = PathCensus::new(g1, self.params.edge_match);
                &local1
            }
        };
        let census2 = match self.cached_census(g2) {
            Some(c) => c,
            None => {
                local2 = PathCensus::new(g2, self.params.edge_match);
                &local2
            }
        };
        let lambda = self.params.lambda;
        let mut value = 0.;
        for (label, (nb_atoms, n1)) in &census1.counts {
            let n2 = census2.count_of(label);
            if n2 > 0 {
                value += lambda.powi(*nb_atoms as i32) * (*n1 * n2) as f64;
            }
        }
        Ok(value)
    } // end of compute
} // end of impl GraphKernel for ShortestPathsKernel

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn kernel(lambda: f64) -> ShortestPathsKernel {
        let mut params = KernelParams::default();
        params.lambda = lambda;
        ShortestPathsKernel::new(params).unwrap()
    }

    #[test]
    fn chain_labels() {
        log_init_test();
        //
        let g = chain(&["C", "O", "N"], 0);
        let census = PathCensus::new(&g, false);
        assert_eq!(census.nb_pairs(), 6);
        assert_eq!(census.nb_labels(), 6);
        assert_eq!(census.count_of("C0O"), 1);
        assert_eq!(census.count_of("N0O0C"), 1);
        assert_eq!(kernel(1.).compute(&g, &g).unwrap(), 6.);
        // 4 pairs of 2 atoms, 2 pairs of 3 atoms
        assert!((kernel(0.5).compute(&g, &g).unwrap() - 1.25).abs() < 1.0e-12);
        //
        let typed = typed_from_edges(&["C", "O"], &[(0, 1, 1, 2)]);
        let census = PathCensus::new(&typed, true);
        assert_eq!(census.count_of("C1:2O"), 1);
    }

    #[test]
    fn ring_ties_and_numbering() {
        log_init_test();
        //
        // opposite atoms of a square are joined by 2 shortest paths with the same label
        let square = ring(&["C", "C", "C", "C"], 0);
        let census = PathCensus::new(&square, false);
        assert_eq!(census.count_of("C0C"), 8);
        assert_eq!(census.count_of("C0C0C"), 4);
        assert_eq!(kernel(1.).compute(&square, &square).unwrap(), 80.);
        // from C to N the path through O is kept, through S is not
        let g = ring(&["C", "O", "N", "S"], 0);
        let census = PathCensus::new(&g, false);
        assert_eq!(census.count_of("C0O0N"), 1);
        assert_eq!(census.count_of("C0S0N"), 0);
        assert_eq!(census.count_of("N0O0C"), 1);
        // the same ring numbered otherwise
        let h = from_edges(&["S", "N", "O", "C"], &[(0, 1, 0), (1, 2, 0), (2, 3, 0), (3, 0, 0)]);
        let k = kernel(0.9);
        let self_value = k.compute(&g, &g).unwrap();
        assert!((self_value - k.compute(&h, &g).unwrap()).abs() < 1.0e-12);
        assert!((self_value - k.compute(&h, &h).unwrap()).abs() < 1.0e-12);
    } // end of ring_ties_and_numbering

    #[test]
    fn disconnected_atoms_and_changes() {
        log_init_test();
        //
        let g = from_edges(&["C", "O", "N"], &[(0, 1, 1)]);
        let census = PathCensus::new(&g, false);
        assert_eq!(census.nb_pairs(), 2);
        assert_eq!(census.count_of("C1O"), 1);
        // bond changes distinguish labels
        let h = chain(&["C", "O"], 0);
        assert_eq!(kernel(1.).compute(&g, &h).unwrap(), 0.);
        let single = chain(&["C"], 0);
        assert_eq!(kernel(1.).compute(&single, &single).unwrap(), 0.);
    }

    #[test]
    fn prepared_and_fresh_agree() {
        log_init_test();
        //
        let mut graphs = vec![reaction_like(), ring(&["C", "O", "C", "C"], 0), chain(&["C", "C", "O"], -1)];
        for (i, g) in graphs.iter_mut().enumerate() {
            g.set_index(i);
        }
        let fresh = kernel(0.8);
        let mut prepared = kernel(0.8);
        prepared.prepare(&graphs[1..]).unwrap();
        assert!(prepared.cached_census(&graphs[0]).is_none());
        assert!(prepared.cached_census(&graphs[2]).is_some());
        for i in 0..graphs.len() {
            for j in 0..graphs.len() {
                let v = prepared.compute(&graphs[i], &graphs[j]).unwrap();
                assert!((v - fresh.compute(&graphs[i], &graphs[j]).unwrap()).abs() < 1.0e-12);
                assert!((v - prepared.compute(&graphs[j], &graphs[i]).unwrap()).abs() < 1.0e-12);
            }
        }
    }
} // end of mod tests
