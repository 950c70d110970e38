//! Subgraphs kernel.
//!
//! All connected induced subgraphs with at most maxlen atoms are enumerated and grouped in isomorphism classes.
//! The kernel value of two graphs sums, over classes present in both graphs, a combination of the occurrence counts.
//!
//! Enumeration is a depth first search growing a fragment by one neighbour of any of its atoms.
//! When an atom is removed from the fragment it is forbidden at the depth it had, so the remaining extensions of the
//! shorter fragment do not contain it anymore. Forbidden marks deeper than the current depth are cleared on backtrack.
//! Each connected atom set is produced exactly once.

use anyhow::anyhow;
use fixedbitset::FixedBitSet;
use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use crate::graph::model::MolGraph;
use crate::isomorphism::is_isomorphic;

use super::params::{KernelOperation, KernelParams};
use super::GraphKernel;

/// Atom sets of all connected induced subgraphs with at most limit atoms.
pub fn connected_subgraphs(graph: &MolGraph, limit: usize) -> Vec<FixedBitSet> {
    let n = graph.nb_atoms();
    let mut subgraphs = Vec::new();
    if limit == 0 {
        return subgraphs;
    }
    // depth at which an atom was removed, 0 if allowed
    let mut forbidden = vec![0usize; n];
    let mut fragment = Vec::<usize>::with_capacity(limit);
    let mut in_fragment = FixedBitSet::with_capacity(n);
    //
    for start in 0..n {
        fragment.push(start);
        in_fragment.insert(start);
        subgraphs.push(in_fragment.clone());
        while !fragment.is_empty() {
            let next = if fragment.len() < limit {
                fragment
                    .iter()
                    .rev()
                    .flat_map(move |a| graph.neighbours(NodeIndex::new(*a)))
                    .map(|m| m.index())
                    .find(|m| !in_fragment.contains(*m) && forbidden[*m] == 0)
            } else {
                None
            };
            match next {
                Some(m) => {
                    fragment.push(m);
                    in_fragment.insert(m);
                    subgraphs.push(in_fragment.clone());
                }
                None => {
                    if let Some(last) = fragment.pop() {
                        in_fragment.set(last, false);
                        let depth = fragment.len() + 1;
                        for f in forbidden.iter_mut() {
                            if *f > depth {
                                *f = 0;
                            }
                        }
                        forbidden[last] = depth;
                    }
                }
            }
        }
    }
    log::trace!(
        "graph {} : {} connected subgraphs with at most {} atoms",
        graph.get_name(),
        subgraphs.len(),
        limit
    );
    subgraphs
} // end of connected_subgraphs

/// Isomorphism classes of the connected induced subgraphs of a graph, with their counts.
pub struct SubgraphCensus {
    /// classes bucketed by graph hash, each class is a representative and a count
    classes : IndexMap<u64, Vec<(MolGraph, usize)>>,
    /// number of subgraphs by number of atoms
    size_counts : Vec<usize>,
}

impl SubgraphCensus {
    pub fn new(graph: &MolGraph, limit: usize) -> Self {
        let mut classes = IndexMap::<u64, Vec<(MolGraph, usize)>>::new();
        let mut size_counts = vec![0; limit.min(graph.nb_atoms()) + 1];
        for atoms in connected_subgraphs(graph, limit) {
            let subgraph = graph.induced_subgraph(&atoms);
            size_counts[subgraph.nb_atoms()] += 1;
            let bucket = classes.entry(subgraph.get_hash()).or_insert_with(Vec::new);
            match bucket.iter_mut().find(|(g, _)| is_isomorphic(g, &subgraph)) {
                Some((_, count)) => *count += 1,
                None => bucket.push((subgraph, 1)),
            }
        }
        SubgraphCensus { classes, size_counts }
    }

    pub fn nb_classes(&self) -> usize {
        self.classes.values().map(|b| b.len()).sum()
    }

    pub fn nb_subgraphs(&self) -> usize {
        self.size_counts.iter().sum()
    }

    /// number of subgraphs with size atoms
    pub fn get_size_count(&self, size: usize) -> usize {
        self.size_counts.get(size).copied().unwrap_or(0)
    }

    /// occurrences of subgraphs isomorphic to g
    pub fn count_of(&self, g: &MolGraph) -> usize {
        self.classes
            .get(&g.get_hash())
            .and_then(|bucket| bucket.iter().find(|(h, _)| is_isomorphic(h, g)))
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// representatives and counts
    pub fn classes(&self) -> impl Iterator<Item = &(MolGraph, usize)> {
        self.classes.values().flat_map(|b| b.iter())
    }
} // end of impl SubgraphCensus

/// combination of counts of a class of subgraphs with size atoms found in both graphs
pub fn combine(
    operation: KernelOperation,
    n1: usize,
    n2: usize,
    size: usize,
    census1: &SubgraphCensus,
    census2: &SubgraphCensus,
) -> f64 {
    match operation {
        KernelOperation::Dot => (n1 * n2) as f64,
        KernelOperation::Indicator => 1.,
        KernelOperation::Min => n1.min(n2) as f64,
        KernelOperation::MinNormalized => {
            let d = ((census1.get_size_count(size) * census2.get_size_count(size)) as f64).sqrt();
            if d > 0. {
                n1.min(n2) as f64 / d
            } else {
                0.
            }
        }
    }
}

//=======================================================================================

/// Kernel comparing censuses of connected subgraphs up to maxlen atoms.
pub struct SubgraphsKernel {
    params : KernelParams,
    /// censuses of prepared graphs with the layout key of the graph, indexed by graph index
    censuses : Vec<Option<(u64, SubgraphCensus)>>,
}

impl SubgraphsKernel {
    pub fn new(params: KernelParams) -> anyhow::Result<Self> {
        params.check()?;
        Ok(SubgraphsKernel {
            params,
            censuses: Vec::new(),
        })
    }

    fn cached_census(&self, graph: &MolGraph) -> Option<&SubgraphCensus> {
        match self.censuses.get(graph.get_index()) {
            Some(Some((key, c))) if *key == graph.layout_key() => Some(c),
            _ => None,
        }
    }
}

impl GraphKernel for SubgraphsKernel {
    fn get_name(&self) -> String {
        format!("subgraphs-{:?}-k{}", self.params.operation, self.params.maxlen).to_lowercase()
    }

    fn prepare(&mut self, graphs: &[MolGraph]) -> anyhow::Result<()> {
        let cpu_start = cpu_time::ProcessTime::now();
        let sys_start = std::time::SystemTime::now();
        let limit = self.params.maxlen;
        let censuses: Vec<(usize, u64, SubgraphCensus)> = graphs
            .par_iter()
            .map(|g| (g.get_index(), g.layout_key(), SubgraphCensus::new(g, limit)))
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
            "subgraph censuses of {} graphs, sys time(s) {:.2e} cpu time(s) {:.2e}",
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
                local1 = SubgraphCensus::new(g1, self.params.maxlen);
                &local1
            }
        };
        let census2 = match self.cached_census(g2) {
            Some(c) => c,
            None => {
                local2 = SubgraphCensus::new(g2, self.params.maxlen);
                &local2
            }
        };
        let mut value = 0.;
        for (class, n1) in census1.classes() {
            let n2 = census2.count_of(class);
            if n2 > 0 {
                value += combine(self.params.operation, *n1, n2, class.nb_atoms(), census1, census2);
            }
        }
        Ok(value)
    } // end of compute
} // end of impl GraphKernel for SubgraphsKernel

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // connected atom subsets by testing all subsets
    fn brute_connected(g: &MolGraph, limit: usize) -> Vec<u32> {
        let n = g.nb_atoms();
        let mut found = Vec::new();
        for mask in 1u32..(1 << n) {
            if mask.count_ones() as usize > limit {
                continue;
            }
            let first = mask.trailing_zeros() as usize;
            let mut reached = 1u32 << first;
            let mut stack = vec![first];
            while let Some(a) = stack.pop() {
                for m in g.neighbours(NodeIndex::new(a)) {
                    let bit = 1u32 << m.index();
                    if mask & bit != 0 && reached & bit == 0 {
                        reached |= bit;
                        stack.push(m.index());
                    }
                }
            }
            if reached == mask {
                found.push(mask);
            }
        }
        found
    }

    fn as_masks(subgraphs: &[FixedBitSet]) -> Vec<u32> {
        let mut masks: Vec<u32> = subgraphs
            .iter()
            .map(|b| b.ones().fold(0u32, |m, i| m | (1 << i)))
            .collect();
        masks.sort_unstable();
        masks
    }

    #[test]
    fn small_counts() {
        log_init_test();
        //
        let triangle = ring(&["C", "C", "C"], 0);
        assert_eq!(connected_subgraphs(&triangle, 3).len(), 7);
        let path = chain(&["C", "C", "C", "C"], 0);
        assert_eq!(connected_subgraphs(&path, 4).len(), 10);
        assert_eq!(connected_subgraphs(&path, 2).len(), 7);
        let star = from_edges(&["C", "O", "O", "O"], &[(0, 1, 0), (0, 2, 0), (0, 3, 0)]);
        assert_eq!(connected_subgraphs(&star, 4).len(), 11);
        assert!(connected_subgraphs(&star, 0).is_empty());
    }

    #[test]
    fn each_subgraph_once() {
        log_init_test();
        //
        let graphs = vec![
            reaction_like(),
            ring(&["C", "C", "C", "C", "C", "C"], 0),
            from_edges(
                &["C", "C", "C", "C", "C"],
                &[(0, 1, 0), (0, 2, 0), (0, 3, 0), (0, 4, 0), (1, 2, 0), (3, 4, 0)],
            ),
        ];
        for g in &graphs {
            for limit in [1, 3, 7] {
                let masks = as_masks(&connected_subgraphs(g, limit));
                let mut dedup = masks.clone();
                dedup.dedup();
                assert_eq!(masks.len(), dedup.len());
                assert_eq!(masks, brute_connected(g, limit));
            }
        }
    }

    #[test]
    fn census_classes() {
        log_init_test();
        //
        let path = chain(&["C", "C", "C", "C"], 0);
        let census = SubgraphCensus::new(&path, 4);
        // C, C-C, C-C-C, C-C-C-C
        assert_eq!(census.nb_classes(), 4);
        assert_eq!(census.nb_subgraphs(), 10);
        assert_eq!(census.get_size_count(2), 3);
        assert_eq!(census.count_of(&chain(&["C", "C", "C"], 0)), 2);
        assert_eq!(census.count_of(&chain(&["C", "O"], 0)), 0);
    }

    fn kernel(operation: KernelOperation, maxlen: usize) -> SubgraphsKernel {
        let mut params = KernelParams::default();
        params.operation = operation;
        params.maxlen = maxlen;
        SubgraphsKernel::new(params).unwrap()
    }

    #[test]
    fn single_atom_subgraphs() {
        log_init_test();
        //
        let g = reaction_like();
        let value = kernel(KernelOperation::Min, 1).compute(&g, &g).unwrap();
        assert_eq!(value, g.nb_atoms() as f64);
        // with distinct symbols the dot product also counts atoms
        let distinct = chain(&["C", "O", "N", "S"], 0);
        let value = kernel(KernelOperation::Dot, 1).compute(&distinct, &distinct).unwrap();
        assert_eq!(value, 4.);
    }

    #[test]
    fn operations() {
        log_init_test();
        //
        let g1 = chain(&["C", "C", "O"], 0);
        let g2 = chain(&["C", "O", "C", "C"], 0);
        // g1 : C x2, O, CC, CO, CCO
        // g2 : C x3, O, CO x2, CC, COC, OCC
        let dot = kernel(KernelOperation::Dot, 3).compute(&g1, &g2).unwrap();
        assert_eq!(dot, (2 * 3 + 1 + 1 + 2 + 1) as f64);
        let indicator = kernel(KernelOperation::Indicator, 3).compute(&g1, &g2).unwrap();
        assert_eq!(indicator, 5.);
        let min = kernel(KernelOperation::Min, 3).compute(&g1, &g2).unwrap();
        assert_eq!(min, (2 + 1 + 1 + 1 + 1) as f64);
        // sizes in g1 : 3, 2, 1 subgraphs ; in g2 : 4, 3, 2
        let normalized = kernel(KernelOperation::MinNormalized, 3).compute(&g1, &g2).unwrap();
        let expected = 3. / 12f64.sqrt() + 2. / 6f64.sqrt() + 1. / 2f64.sqrt();
        assert!((normalized - expected).abs() < 1.0e-12);
    }

    #[test]
    fn census_cache_keyed_by_numbering() {
        log_init_test();
        //
        let g = from_edges(&["C", "O", "N", "S"], &[(0, 1, 1), (1, 2, 0), (2, 3, 0)]);
        let h = from_edges(&["S", "N", "O", "C"], &[(0, 1, 0), (1, 2, 0), (2, 3, 1)]);
        let other = chain(&["C", "C", "C", "C"], 0);
        let fresh = kernel(KernelOperation::Dot, 3);
        let mut prepared = kernel(KernelOperation::Dot, 3);
        prepared.prepare(std::slice::from_ref(&g)).unwrap();
        assert!(prepared.cached_census(&g).is_some());
        assert!(prepared.cached_census(&h).is_none());
        assert!(prepared.cached_census(&other).is_none());
        for x in [&g, &h, &other] {
            assert_eq!(prepared.compute(x, &g).unwrap(), fresh.compute(x, &g).unwrap());
        }
        assert_eq!(prepared.compute(&h, &g).unwrap(), prepared.compute(&g, &g).unwrap());
    }
} // end of mod tests
