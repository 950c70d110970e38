//! Marginal mechanism kernel.
//!
//! Each graph induces a Markov chain on its atoms :
//! - a walk starts on atom $a$ with probability $w(a) / \sum_b w(b)$,
//! - at each step it goes on with probability $\lambda$ to a neighbour $b$ chosen proportionally to $w(b)$,
//!   or stops with the remaining probability.
//!
//! The second order chain excludes the atom just left, the full order chain (used for paths) excludes all visited atoms.
//! Probabilities of walks in the product graph are products of the probabilities in the two factors,
//! so the kernel is the probability that two independent walks generate the same labelled sequence.
//!
//! For each atom, the outgoing transition probabilities and the end probability must sum to 1.
//! This is checked when the chain of a graph is built and a violation is an error.

use ahash::AHashMap;
use anyhow::anyhow;
use petgraph::graph::NodeIndex;

use crate::graph::model::MolGraph;
use crate::graph::product::PairNode;

use super::sequence::SequenceModel;

// tolerance of probability sums
const PROBA_TOLERANCE: f64 = 1.0e-9;

/// First and second order Markov chains on the atoms of a graph.
#[cfg_attr(doc, katexit::katexit)]
pub struct MarkovChain {
    lambda : f64,
    weights : Vec<f64>,
    pstart : Vec<f64>,
    pend : Vec<f64>,
    /// (from, to)
    ptrans : AHashMap<(usize, usize), f64>,
    /// (previous, current)
    pend2 : AHashMap<(usize, usize), f64>,
    /// (previous, current, next)
    ptrans2 : AHashMap<(usize, usize, usize), f64>,
}

impl MarkovChain {
    /// builds the chains and checks probabilities
    pub fn new(graph: &MolGraph, weights: Vec<f64>, lambda: f64) -> anyhow::Result<Self> {
        if weights.len() != graph.nb_atoms() {
            return Err(anyhow!(
                "graph {} : {} weights for {} atoms",
                graph.get_name(),
                weights.len(),
                graph.nb_atoms()
            ));
        }
        let n = graph.nb_atoms();
        let total: f64 = weights.iter().sum();
        let pstart: Vec<f64> = weights
            .iter()
            .map(|w| if total != 0. { w / total } else { 0. })
            .collect();
        //
        let mut ptrans = AHashMap::with_capacity(2 * graph.nb_bonds());
        let mut pend = vec![1.; n];
        for a in 0..n {
            let neighbours: Vec<usize> = graph.neighbours(NodeIndex::new(a)).map(|b| b.index()).collect();
            let sum: f64 = neighbours.iter().map(|b| weights[*b]).sum();
            for b in neighbours {
                let p = if sum != 0. { lambda * weights[b] / sum } else { 0. };
                ptrans.insert((a, b), p);
                pend[a] -= p;
            }
        }
        //
        let mut ptrans2 = AHashMap::new();
        let mut pend2 = AHashMap::with_capacity(2 * graph.nb_bonds());
        for (p, c) in ptrans.keys() {
            let nexts: Vec<usize> = graph
                .neighbours(NodeIndex::new(*c))
                .map(|b| b.index())
                .filter(|b| b != p)
                .collect();
            let sum: f64 = nexts.iter().map(|b| weights[*b]).sum();
            let mut end = 1.;
            for next in nexts {
                let proba = if sum != 0. { lambda * weights[next] / sum } else { 0. };
                ptrans2.insert((*p, *c, next), proba);
                end -= proba;
            }
            pend2.insert((*p, *c), end);
        }
        let chain = MarkovChain {
            lambda,
            weights,
            pstart,
            pend,
            ptrans,
            pend2,
            ptrans2,
        };
        chain.check(graph)?;
        Ok(chain)
    } // end of new

    /// Checks all probabilities are in [0,1] and that, for each atom (and each atom reached from a given neighbour),
    /// transitions and end probabilities sum to 1.
    pub fn check(&self, graph: &MolGraph) -> anyhow::Result<()> {
        let in_unit = |p: f64| (-PROBA_TOLERANCE..=1. + PROBA_TOLERANCE).contains(&p);
        let start_sum: f64 = self.pstart.iter().sum();
        if self.pstart.iter().any(|p| !in_unit(*p)) || (start_sum != 0. && (start_sum - 1.).abs() > PROBA_TOLERANCE) {
            return Err(anyhow!("graph {} : invalid start probabilities", graph.get_name()));
        }
        for a in graph.get_graph().node_indices() {
            let a = a.index();
            let out: f64 = graph.neighbours(NodeIndex::new(a)).map(|b| self.get_ptransition(a, b.index())).sum();
            if !in_unit(self.pend[a]) || (out + self.pend[a] - 1.).abs() > PROBA_TOLERANCE {
                return Err(anyhow!(
                    "graph {} atom {} : transitions {:.6e} and end {:.6e} do not sum to 1",
                    graph.get_name(),
                    a,
                    out,
                    self.pend[a]
                ));
            }
            for p in graph.neighbours(NodeIndex::new(a)) {
                let p = p.index();
                let out: f64 = graph
                    .neighbours(NodeIndex::new(a))
                    .map(|b| self.get_ptransition2(p, a, b.index()))
                    .sum();
                let end = self.get_pend2(p, a);
                if !in_unit(end) || (out + end - 1.).abs() > PROBA_TOLERANCE {
                    return Err(anyhow!(
                        "graph {} atom {} coming from {} : transitions {:.6e} and end {:.6e} do not sum to 1",
                        graph.get_name(),
                        a,
                        p,
                        out,
                        end
                    ));
                }
            }
        }
        Ok(())
    } // end of check

    pub fn get_pstart(&self, a: usize) -> f64 {
        self.pstart[a]
    }

    pub fn get_pend(&self, a: usize) -> f64 {
        self.pend[a]
    }

    /// 0 if atoms are not bonded
    pub fn get_ptransition(&self, from: usize, to: usize) -> f64 {
        self.ptrans.get(&(from, to)).copied().unwrap_or(0.)
    }

    /// end probability in current when coming from previous
    pub fn get_pend2(&self, previous: usize, current: usize) -> f64 {
        self.pend2.get(&(previous, current)).copied().unwrap_or(1.)
    }

    /// transition probability to next from current when coming from previous, 0 if next is previous
    pub fn get_ptransition2(&self, previous: usize, current: usize, next: usize) -> f64 {
        self.ptrans2.get(&(previous, current, next)).copied().unwrap_or(0.)
    }

    /// Probability of generating exactly this path with the full order chain : no visited atom can be reached again.
    pub fn path_probability(&self, graph: &MolGraph, atoms: &[NodeIndex]) -> f64 {
        if atoms.is_empty() {
            return 0.;
        }
        // sum of weights of the unvisited neighbours of current, visited being atoms[..upto]
        let free_weight = |current: NodeIndex, upto: usize| -> f64 {
            graph
                .neighbours(current)
                .filter(|n| !atoms[..upto].contains(n))
                .map(|n| self.weights[n.index()])
                .sum()
        };
        let mut proba = self.pstart[atoms[0].index()];
        for i in 1..atoms.len() {
            let (current, next) = (atoms[i - 1], atoms[i]);
            if atoms[..i].contains(&next) || !graph.are_bonded(current, next) {
                return 0.;
            }
            let sum = free_weight(current, i);
            if sum == 0. {
                return 0.;
            }
            proba *= self.lambda * self.weights[next.index()] / sum;
        }
        let last = atoms[atoms.len() - 1];
        let end = if free_weight(last, atoms.len()) != 0. {
            1. - self.lambda
        } else {
            1.
        };
        proba * end
    } // end of path_probability
} // end of impl MarkovChain

//=======================================================================================

/// Probabilistic weighting of sequences.
pub struct MarginalModel {
    lambda : f64,
}

impl MarginalModel {
    /// lambda is the probability of going on at each step
    pub fn new(lambda: f64) -> anyhow::Result<Self> {
        if !(0. ..=1.).contains(&lambda) {
            return Err(anyhow!("marginal kernel needs lambda in [0,1], got {}", lambda));
        }
        Ok(MarginalModel { lambda })
    }

    pub fn get_lambda(&self) -> f64 {
        self.lambda
    }
}

impl SequenceModel for MarginalModel {
    type Factor = MarkovChain;

    fn get_name(&self) -> &'static str {
        "marginal"
    }

    fn factor(&self, graph: &MolGraph, weights: Vec<f64>) -> anyhow::Result<MarkovChain> {
        MarkovChain::new(graph, weights, self.lambda)
    }

    fn start_end(&self, f1: &MarkovChain, f2: &MarkovChain, x: &PairNode) -> f64 {
        let (a1, a2) = (x.a1.index(), x.a2.index());
        f1.get_pstart(a1) * f1.get_pend(a1) * f2.get_pstart(a2) * f2.get_pend(a2)
    }

    fn transition(&self, f1: &MarkovChain, f2: &MarkovChain, u: &PairNode, v: &PairNode) -> f64 {
        f1.get_ptransition(u.a1.index(), v.a1.index()) * f2.get_ptransition(u.a2.index(), v.a2.index())
    }

    fn message_start(&self, f1: &MarkovChain, f2: &MarkovChain, s: &PairNode, t: &PairNode) -> f64 {
        f1.get_pstart(s.a1.index())
            * f1.get_ptransition(s.a1.index(), t.a1.index())
            * f2.get_pstart(s.a2.index())
            * f2.get_ptransition(s.a2.index(), t.a2.index())
    }

    fn message_transition(&self, f1: &MarkovChain, f2: &MarkovChain, u: &PairNode, s: &PairNode, t: &PairNode) -> f64 {
        f1.get_ptransition2(u.a1.index(), s.a1.index(), t.a1.index())
            * f2.get_ptransition2(u.a2.index(), s.a2.index(), t.a2.index())
    }

    fn message_end(&self, f1: &MarkovChain, f2: &MarkovChain, u: &PairNode, v: &PairNode) -> f64 {
        f1.get_pend2(u.a1.index(), v.a1.index()) * f2.get_pend2(u.a2.index(), v.a2.index())
    }

    fn path_weight(&self, graph: &MolGraph, f: &MarkovChain, atoms: &[NodeIndex]) -> f64 {
        f.path_probability(graph, atoms)
    }
} // end of impl SequenceModel for MarginalModel

// end of mod tests
