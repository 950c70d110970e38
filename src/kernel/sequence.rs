//! Kernels counting weighted sequences common to two graphs.
//!
//! For a pair of graphs, walks and non tottering walks are counted by dynamic programming on the product graph,
//! paths by a depth first enumeration of pairs of simultaneous paths in the two graphs.
//!
//! The weighting of sequences is delegated to a [SequenceModel]. All weights of a sequence of product nodes factor as
//! a start term, transition terms and an end term:
//! - walks : $F[v][1] = s(v)$ and $F[v][\ell] = \sum_{u \sim v} F[u][\ell-1] \, t(u, v)$.
//! - non tottering walks : messages $M[s \to t]$ are carried along directed product edges, a message coming from $u$
//!   is not forwarded to a node sharing a factor atom with $u$ (so no immediate return in either factor):
//!   $M[s \to t][1] = m_0(s, t)$,
//!   $M[s \to t][\ell] = \sum_{u \sim s, u \not\approx t} M[u \to s][\ell-1] \, m(u, s, t)$,
//!   $F[v][\ell] = \sum_{u \sim v} M[u \to v][\ell-1] \, e(u, v)$.
//!
//! Level sums $\sum_v F[v][\ell]$ are accumulated until maxlen or until the level sum relative to the accumulated
//! value goes below epsilon. In this last case the returned value is the partial sum at that level.

use std::borrow::Cow;

use anyhow::anyhow;
use fixedbitset::FixedBitSet;
use hdrhistogram::Histogram;
use ndarray::Array2;
use parking_lot::Mutex;
use petgraph::graph::NodeIndex;
use rayon::prelude::*;

use crate::graph::model::MolGraph;
use crate::graph::product::{bonds_compatible, reduced_compatible, PairNode, ProductGraph};

use super::params::{KernelParams, SequenceMode};
use super::weight::NodeWeighter;
use super::GraphKernel;

/// Weights of sequences.
/// A model prepares for each factor graph a Factor from its atom weights, product weights are computed from the 2 factors.
#[cfg_attr(doc, katexit::katexit)]
pub trait SequenceModel: Send + Sync {
    /// data attached to one graph
    type Factor: Send + Sync;

    fn get_name(&self) -> &'static str;

    /// builds the data of a graph from its atom weights
    fn factor(&self, graph: &MolGraph, weights: Vec<f64>) -> anyhow::Result<Self::Factor>;

    /// $s(x)$ : weight of the one node walk x
    fn start_end(&self, f1: &Self::Factor, f2: &Self::Factor, x: &PairNode) -> f64;

    /// $t(u,v)$ : weight of the step from u to v
    fn transition(&self, f1: &Self::Factor, f2: &Self::Factor, u: &PairNode, v: &PairNode) -> f64;

    /// $m_0(s,t)$ : initial message on the directed edge s to t
    fn message_start(&self, f1: &Self::Factor, f2: &Self::Factor, s: &PairNode, t: &PairNode) -> f64;

    /// $m(u,s,t)$ : weight of forwarding to t a message arrived in s from u
    fn message_transition(
        &self,
        f1: &Self::Factor,
        f2: &Self::Factor,
        u: &PairNode,
        s: &PairNode,
        t: &PairNode,
    ) -> f64;

    /// $e(u,v)$ : weight of ending in v a message arrived from u
    fn message_end(&self, f1: &Self::Factor, f2: &Self::Factor, u: &PairNode, v: &PairNode) -> f64;

    /// weight of a path of one graph
    fn path_weight(&self, graph: &MolGraph, f: &Self::Factor, atoms: &[NodeIndex]) -> f64;
} // end of SequenceModel

//=======================================================================================

/// A walk, non tottering walk or path kernel
pub struct SequenceKernel<M: SequenceModel> {
    params : KernelParams,
    model : M,
    weighter : NodeWeighter,
    /// factor data of prepared graphs, with the layout key of the graph, indexed by graph index
    factors : Vec<Option<(u64, M::Factor)>>,
    /// level sums of self product graphs, used in partial normalization
    self_levels : Vec<Option<(u64, Vec<f64>)>>,
    /// number of nodes of product graphs built
    pg_sizes : Mutex<Histogram<u64>>,
}

impl<M: SequenceModel> SequenceKernel<M> {
    pub fn new(params: KernelParams, model: M) -> anyhow::Result<Self> {
        params.check()?;
        if params.partial_norm && params.mode == SequenceMode::Paths {
            return Err(anyhow!("partial normalization is not available for paths"));
        }
        let histo = Histogram::<u64>::new(3).map_err(|e| {
            log::error!("histogram creation failed : {}", e);
            anyhow!("histogram creation failed")
        })?;
        Ok(SequenceKernel {
            params,
            weighter: NodeWeighter::new(params.weighting),
            model,
            factors: Vec::new(),
            self_levels: Vec::new(),
            pg_sizes: Mutex::new(histo),
        })
    } // end of new

    pub fn get_params(&self) -> &KernelParams {
        &self.params
    }

    pub fn get_model(&self) -> &M {
        &self.model
    }

    fn make_factor(&self, graph: &MolGraph) -> anyhow::Result<M::Factor> {
        let weights = self.weighter.node_weights(graph)?;
        self.model.factor(graph, weights)
    }

    // a cached entry is used only if the graph has the same atom numbering as the prepared one
    fn cached_factor(&self, graph: &MolGraph) -> Option<&M::Factor> {
        match self.factors.get(graph.get_index()) {
            Some(Some((key, f))) if *key == graph.layout_key() => Some(f),
            _ => None,
        }
    }

    /// level sums of the self product graph, from the prepared batch or computed on the spot
    fn self_levels(&self, graph: &MolGraph) -> anyhow::Result<Cow<'_, [f64]>> {
        match self.self_levels.get(graph.get_index()) {
            Some(Some((key, z))) if *key == graph.layout_key() => Ok(Cow::Borrowed(z.as_slice())),
            _ => {
                log::debug!("self levels of graph {} not prepared, computing them", graph.get_name());
                Ok(Cow::Owned(self.levels(graph, graph, None, false)?))
            }
        }
    }

    /// Level sums for the pair g1, g2 in walks or non tottering mode, one value by sequence length.
    /// If norms are given, each level is divided by the geometric mean of the corresponding norms.
    /// With converge set to false all maxlen levels are computed.
    pub fn levels(
        &self,
        g1: &MolGraph,
        g2: &MolGraph,
        norms: Option<(&[f64], &[f64])>,
        converge: bool,
    ) -> anyhow::Result<Vec<f64>> {
        let local1;
        let local2;
        let f1 = match self.cached_factor(g1) {
            Some(f) => f,
            None => {
                local1 = self.make_factor(g1)?;
                &local1
            }
        };
        let f2 = match self.cached_factor(g2) {
            Some(f) => f,
            None => {
                local2 = self.make_factor(g2)?;
                &local2
            }
        };
        let pg = ProductGraph::new(g1, g2, &self.params.get_product_params());
        if self.pg_sizes.lock().record(pg.nb_nodes() as u64).is_err() {
            log::debug!("could not record product graph size {}", pg.nb_nodes());
        }
        match self.params.mode {
            SequenceMode::Walks => Ok(self.walk_levels(&pg, f1, f2, norms, converge)),
            SequenceMode::NonTottering => Ok(self.nontottering_levels(&pg, f1, f2, norms, converge)),
            SequenceMode::Paths => Err(anyhow!("paths are not counted by levels")),
        }
    } // end of levels

    fn walk_levels(
        &self,
        pg: &ProductGraph,
        f1: &M::Factor,
        f2: &M::Factor,
        norms: Option<(&[f64], &[f64])>,
        converge: bool,
    ) -> Vec<f64> {
        let n = pg.nb_nodes();
        let maxlen = self.params.maxlen;
        let pairs: Vec<PairNode> = (0..n).map(|x| pg.get_pair(x)).collect();
        let mut table = Array2::<f64>::zeros((n, maxlen));
        //
        for v in 0..n {
            table[[v, 0]] = self.model.start_end(f1, f2, &pairs[v]);
        }
        let first = scaled_level(table.column(0).sum(), 0, norms);
        let mut levels = vec![first];
        let mut sum = first;
        for l in 1..maxlen {
            for v in 0..n {
                let value: f64 = pg
                    .neighbours(v)
                    .map(|u| table[[u, l - 1]] * self.model.transition(f1, f2, &pairs[u], &pairs[v]))
                    .sum();
                table[[v, l]] = value;
            }
            let level = scaled_level(table.column(l).sum(), l, norms);
            levels.push(level);
            let increase = relative_increase(level, sum);
            sum += level;
            if converge && increase < self.params.epsilon {
                log::trace!("walks converged at length {}", l + 1);
                break;
            }
        }
        levels
    } // end of walk_levels

    fn nontottering_levels(
        &self,
        pg: &ProductGraph,
        f1: &M::Factor,
        f2: &M::Factor,
        norms: Option<(&[f64], &[f64])>,
        converge: bool,
    ) -> Vec<f64> {
        let n = pg.nb_nodes();
        let maxlen = self.params.maxlen;
        let pairs: Vec<PairNode> = (0..n).map(|x| pg.get_pair(x)).collect();
        // message 2e goes along edge e in storage direction, 2e+1 backward
        let nb_messages = 2 * pg.nb_edges();
        let mut ends = Vec::<(usize, usize)>::with_capacity(nb_messages);
        let mut incoming: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n];
        for e in 0..pg.nb_edges() {
            let (s, t) = pg.get_endpoints(e);
            ends.push((s, t));
            ends.push((t, s));
            incoming[t].push((s, 2 * e));
            incoming[s].push((t, 2 * e + 1));
        }
        //
        let mut table = Array2::<f64>::zeros((n, maxlen));
        let mut messages = Array2::<f64>::zeros((nb_messages, maxlen));
        for v in 0..n {
            table[[v, 0]] = self.model.start_end(f1, f2, &pairs[v]);
        }
        for (m, (s, t)) in ends.iter().enumerate() {
            messages[[m, 0]] = self.model.message_start(f1, f2, &pairs[*s], &pairs[*t]);
        }
        let first = scaled_level(table.column(0).sum(), 0, norms);
        let mut levels = vec![first];
        let mut sum = first;
        for l in 1..maxlen {
            for v in 0..n {
                let value: f64 = incoming[v]
                    .iter()
                    .map(|(u, m)| messages[[*m, l - 1]] * self.model.message_end(f1, f2, &pairs[*u], &pairs[v]))
                    .sum();
                table[[v, l]] = value;
            }
            for (m, (s, t)) in ends.iter().enumerate() {
                let excluded = pg.shared_factor_neighbours(*s, *t);
                let value: f64 = incoming[*s]
                    .iter()
                    .filter(|(u, _)| *u != *t && !excluded.contains(u))
                    .map(|(u, mu)| {
                        messages[[*mu, l - 1]]
                            * self.model.message_transition(f1, f2, &pairs[*u], &pairs[*s], &pairs[*t])
                    })
                    .sum();
                messages[[m, l]] = value;
            }
            let level = scaled_level(table.column(l).sum(), l, norms);
            levels.push(level);
            let increase = relative_increase(level, sum);
            sum += level;
            if converge && increase < self.params.epsilon {
                log::trace!("non tottering walks converged at length {}", l + 1);
                break;
            }
        }
        levels
    } // end of nontottering_levels

    /// Sum over pairs of paths of same length with compatible atoms and bonds of the products of path weights.
    /// Pairs of paths are extended atom pair by atom pair, each frame of the stack keeps the candidate
    /// extensions of the current last pair and a cursor on them, so that a candidate explored once is
    /// never taken again below the same prefix.
    pub fn path_sum(&self, g1: &MolGraph, g2: &MolGraph) -> anyhow::Result<f64> {
        let local1;
        let local2;
        let f1 = match self.cached_factor(g1) {
            Some(f) => f,
            None => {
                local1 = self.make_factor(g1)?;
                &local1
            }
        };
        let f2 = match self.cached_factor(g2) {
            Some(f) => f,
            None => {
                local2 = self.make_factor(g2)?;
                &local2
            }
        };
        let limit = self.params.maxlen.min(g1.nb_atoms()).min(g2.nb_atoms());
        let compatible = |a1: NodeIndex, a2: NodeIndex| {
            let (atom1, atom2) = (g1.get_atom(a1), g2.get_atom(a2));
            (!self.params.node_match || atom1.get_symbol() == atom2.get_symbol())
                && (!self.params.reduced || reduced_compatible(atom1, atom2))
        };
        let mut seq1 = Vec::<NodeIndex>::with_capacity(limit);
        let mut seq2 = Vec::<NodeIndex>::with_capacity(limit);
        let mut in1 = FixedBitSet::with_capacity(g1.nb_atoms());
        let mut in2 = FixedBitSet::with_capacity(g2.nb_atoms());
        // candidate extensions of the last pair of the current sequences
        let extensions = |seq1: &[NodeIndex], seq2: &[NodeIndex], in1: &FixedBitSet, in2: &FixedBitSet| {
            let mut candidates = Vec::new();
            if seq1.len() >= limit {
                return candidates;
            }
            let (x1, x2) = (seq1[seq1.len() - 1], seq2[seq2.len() - 1]);
            for n1 in g1.neighbours(x1).filter(|n| !in1.contains(n.index())) {
                for n2 in g2.neighbours(x2).filter(|n| !in2.contains(n.index())) {
                    if !compatible(n1, n2) {
                        continue;
                    }
                    if let (Some(b1), Some(b2)) = (g1.find_bond(x1, n1), g2.find_bond(x2, n2)) {
                        if bonds_compatible(b1, b2, self.params.edge_match) {
                            candidates.push((n1, n2));
                        }
                    }
                }
            }
            candidates
        };
        //
        let mut value = 0.;
        let mut nb_pairs: usize = 0;
        if limit == 0 {
            return Ok(value);
        }
        for a1 in g1.get_graph().node_indices() {
            for a2 in g2.get_graph().node_indices() {
                if !compatible(a1, a2) {
                    continue;
                }
                seq1.push(a1);
                seq2.push(a2);
                in1.insert(a1.index());
                in2.insert(a2.index());
                value += self.model.path_weight(g1, f1, &seq1) * self.model.path_weight(g2, f2, &seq2);
                nb_pairs += 1;
                let mut stack = vec![PathFrame::new(extensions(&seq1, &seq2, &in1, &in2))];
                loop {
                    let next = match stack.last_mut() {
                        None => break,
                        Some(frame) => frame.next_candidate(),
                    };
                    match next {
                        Some((b1, b2)) => {
                            seq1.push(b1);
                            seq2.push(b2);
                            in1.insert(b1.index());
                            in2.insert(b2.index());
                            value += self.model.path_weight(g1, f1, &seq1) * self.model.path_weight(g2, f2, &seq2);
                            nb_pairs += 1;
                            stack.push(PathFrame::new(extensions(&seq1, &seq2, &in1, &in2)));
                        }
                        None => {
                            // frame exhausted, remove the pair it was extending
                            stack.pop();
                            if let (Some(b1), Some(b2)) = (seq1.pop(), seq2.pop()) {
                                in1.set(b1.index(), false);
                                in2.set(b2.index(), false);
                            }
                        }
                    }
                }
            }
        }
        log::trace!(
            "path_sum {} x {} : {} path pairs, value {:.3e}",
            g1.get_index(),
            g2.get_index(),
            nb_pairs,
            value
        );
        Ok(value)
    } // end of path_sum
} // end of impl SequenceKernel

struct PathFrame {
    candidates : Vec<(NodeIndex, NodeIndex)>,
    next : usize,
}

impl PathFrame {
    fn new(candidates: Vec<(NodeIndex, NodeIndex)>) -> Self {
        PathFrame { candidates, next: 0 }
    }

    fn next_candidate(&mut self) -> Option<(NodeIndex, NodeIndex)> {
        let candidate = self.candidates.get(self.next).copied();
        self.next += 1;
        candidate
    }
}

fn scaled_level(level: f64, l: usize, norms: Option<(&[f64], &[f64])>) -> f64 {
    match norms {
        None => level,
        Some((z1, z2)) => {
            let d = (z1.get(l).copied().unwrap_or(0.) * z2.get(l).copied().unwrap_or(0.)).sqrt();
            if d > 0. {
                level / d
            } else {
                0.
            }
        }
    }
}

// level relative to the sum accumulated before it
pub(crate) fn relative_increase(level: f64, sum: f64) -> f64 {
    if sum > 0. {
        level / sum
    } else if level > 0. {
        f64::INFINITY
    } else {
        0.
    }
}

impl<M: SequenceModel> GraphKernel for SequenceKernel<M> {
    fn get_name(&self) -> String {
        format!("{}-{}", self.model.get_name(), self.params.param_code())
    }

    fn prepare(&mut self, graphs: &[MolGraph]) -> anyhow::Result<()> {
        let cpu_start = cpu_time::ProcessTime::now();
        let sys_start = std::time::SystemTime::now();
        //
        self.weighter.prepare(graphs)?;
        let factors = graphs
            .par_iter()
            .map(|g| self.make_factor(g).map(|f| (g.get_index(), g.layout_key(), f)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let size = graphs.iter().map(|g| g.get_index() + 1).max().unwrap_or(0);
        self.factors = (0..size).map(|_| None).collect();
        for (index, key, f) in factors {
            if let Some(Some(_)) = self.factors.get(index) {
                return Err(anyhow!("two graphs of the batch have index {}", index));
            }
            self.factors[index] = Some((key, f));
        }
        //
        if self.params.partial_norm {
            let levels = graphs
                .par_iter()
                .map(|g| self.levels(g, g, None, false).map(|l| (g.get_index(), g.layout_key(), l)))
                .collect::<anyhow::Result<Vec<(usize, u64, Vec<f64>)>>>()?;
            self.self_levels = (0..size).map(|_| None).collect();
            for (index, key, l) in levels {
                self.self_levels[index] = Some((key, l));
            }
        }
        log::info!(
            "{} prepared on {} graphs, sys time(s) {:.2e} cpu time(s) {:.2e}",
            self.model.get_name(),
            graphs.len(),
            sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
            cpu_start.elapsed().as_secs_f64()
        );
        Ok(())
    } // end of prepare

    fn compute(&self, g1: &MolGraph, g2: &MolGraph) -> anyhow::Result<f64> {
        if !g1.has_core_distances() || !g2.has_core_distances() {
            return Err(anyhow!(
                "core distances must be computed before kernel evaluation of {} / {}",
                g1.get_name(),
                g2.get_name()
            ));
        }
        if self.params.mode == SequenceMode::Paths {
            return self.path_sum(g1, g2);
        }
        let levels = if self.params.partial_norm {
            let z1 = self.self_levels(g1)?;
            let z2 = self.self_levels(g2)?;
            self.levels(g1, g2, Some((&*z1, &*z2)), true)?
        } else {
            self.levels(g1, g2, None, true)?
        };
        log::trace!("levels {} x {} : {:?}", g1.get_index(), g2.get_index(), levels);
        Ok(levels.iter().sum())
    } // end of compute

    fn log_statistics(&self) {
        let histo = self.pg_sizes.lock();
        if histo.len() == 0 {
            return;
        }
        log::info!(
            "product graphs : nb built {}, mean nb nodes {:.2e}, max nb nodes {}",
            histo.len(),
            histo.mean(),
            histo.max()
        );
        for q in [0.5, 0.9, 0.99] {
            log::info!("fraction : {:.3e}, nb nodes : {}", q, histo.value_at_quantile(q));
        }
    } // end of log_statistics
} // end of impl GraphKernel for SequenceKernel

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;
    use crate::kernel::enumerative::EnumerativeModel;
    use crate::kernel::marginal::MarginalModel;
    use crate::kernel::params::Weighting;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn params(mode: SequenceMode, weighting: Weighting) -> KernelParams {
        let mut params = KernelParams::default();
        params.mode = mode;
        params.maxlen = 5;
        params.epsilon = 0.;
        params.weighting = weighting;
        params
    }

    // a kernel prepared on g then asked for values involving h, a renumbering of g with the same index
    fn check_renumbering<M: SequenceModel>(make: impl Fn() -> SequenceKernel<M>) {
        let g = with_core(&["C", "O", "N", "S"], &[(0, 1, 1), (1, 2, 0), (2, 3, 0)]);
        let h = with_core(&["S", "N", "O", "C"], &[(0, 1, 0), (1, 2, 0), (2, 3, 1)]);
        let mut x = g.clone();
        x.set_index(1);
        assert_eq!(g.get_index(), h.get_index());
        assert_eq!(g.get_hash(), h.get_hash());
        //
        let fresh = make();
        let mut prepared = make();
        prepared.prepare(std::slice::from_ref(&g)).unwrap();
        let expected = fresh.compute(&h, &x).unwrap();
        let got = prepared.compute(&h, &x).unwrap();
        assert!(
            (expected - got).abs() <= 1.0e-12 * expected.abs().max(1.),
            "{} : fresh {} prepared {}",
            fresh.get_name(),
            expected,
            got
        );
        // isomorphic graphs give the same value whatever their numbering
        let direct = prepared.compute(&g, &x).unwrap();
        assert!((direct - got).abs() <= 1.0e-9 * direct.abs().max(1.));
    } // end of check_renumbering

    #[test]
    fn renumbered_isomorph_not_served_from_cache() {
        log_init_test();
        //
        for mode in [SequenceMode::Walks, SequenceMode::NonTottering, SequenceMode::Paths] {
            for weighting in [Weighting::Exponential { alpha: 2. }, Weighting::Diffusion { beta: 1. }] {
                let p = params(mode, weighting);
                check_renumbering(|| SequenceKernel::new(p, EnumerativeModel::new(p.lambda)).unwrap());
                check_renumbering(|| SequenceKernel::new(p, MarginalModel::new(p.lambda).unwrap()).unwrap());
            }
        }
    }

    #[test]
    fn unprepared_graphs_fall_back_to_direct_computation() {
        log_init_test();
        //
        let mut graphs = vec![
            reaction_like(),
            from_edges(&["C", "C", "O", "N"], &[(0, 1, 1), (1, 2, 0), (2, 3, 0)]),
            ring(&["C", "O", "C", "C"], 0),
        ];
        for (i, g) in graphs.iter_mut().enumerate() {
            crate::graph::coredist::compute_core_distances(g);
            g.set_index(i);
        }
        let mut p = params(SequenceMode::Walks, Weighting::Logistic { beta: 2. });
        p.partial_norm = true;
        let fresh = SequenceKernel::new(p, MarginalModel::new(0.8).unwrap()).unwrap();
        let mut prepared = SequenceKernel::new(p, MarginalModel::new(0.8).unwrap()).unwrap();
        // only the first two graphs are prepared
        prepared.prepare(&graphs[..2]).unwrap();
        for i in 0..graphs.len() {
            for j in 0..=i {
                let v1 = fresh.compute(&graphs[i], &graphs[j]).unwrap();
                let v2 = prepared.compute(&graphs[i], &graphs[j]).unwrap();
                assert!((v1 - v2).abs() <= 1.0e-12 * v1.abs().max(1.), "pair ({}, {})", i, j);
            }
        }
    } // end of unprepared_graphs_fall_back_to_direct_computation

    #[test]
    fn duplicate_indexes_rejected() {
        log_init_test();
        //
        let graphs = vec![with_core(&["C", "O"], &[(0, 1, 1)]), with_core(&["C", "N"], &[(0, 1, 1)])];
        let p = params(SequenceMode::Walks, Weighting::Exponential { alpha: 2. });
        let mut kernel = SequenceKernel::new(p, EnumerativeModel::new(p.lambda)).unwrap();
        assert!(kernel.prepare(&graphs).is_err());
    }
} // end of mod tests
