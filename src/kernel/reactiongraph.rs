//! Reaction graph kernel.
//!
//! Reactions are compared through their compound graphs. Pairs of compounds are all paired, links only if they have the same type.
//! A walk on a compound graph starts on a compound chosen uniformly, goes on with probability $\lambda$ to a neighbour
//! chosen uniformly, and stops otherwise. Each pair of compounds visited contributes the similarity $k(m, m')$ of their molecules,
//! so that with $p$ the walk probabilities :
//! $$K(R, R') = \sum_{w, w'} p(w) p(w') \prod_i k(m_{w_i}, m'_{w'_i})$$
//! the sum running over walks of same length in the two graphs, up to convergence or 50 compounds.
//!
//! The molecule similarity is the normalized marginal walk kernel with atoms and bonds matched and uniform atom weights,
//! computed once on the whole molecule batch.

use anyhow::anyhow;
use ndarray::Array2;
use petgraph::graph::NodeIndex;

use crate::graph::compound::CompoundGraph;
use crate::graph::model::MolGraph;
use crate::graph::BatchGraph;

use super::marginal::MarginalModel;
use super::matrix::KernelMatrix;
use super::params::{KernelParams, SequenceMode, Weighting};
use super::sequence::{relative_increase, SequenceKernel};
use super::GraphKernel;

/// walks run until convergence, this length is never reached in practice
pub const REACTION_GRAPH_MAXLEN: usize = 50;

// walk probabilities on a compound graph
struct CompoundWalks {
    pstart : f64,
    /// probability of each step leaving a compound
    pstep : Vec<f64>,
    pend : Vec<f64>,
}

impl CompoundWalks {
    fn new(graph: &CompoundGraph, lambda: f64) -> Self {
        let n = graph.nb_compounds();
        let pstart = if n > 0 { 1. / n as f64 } else { 0. };
        let mut pstep = vec![0.; n];
        let mut pend = vec![1.; n];
        for a in 0..n {
            let degree = graph.degree(NodeIndex::new(a));
            if degree > 0 {
                pstep[a] = lambda / degree as f64;
                pend[a] = 1. - lambda;
            }
        }
        CompoundWalks { pstart, pstep, pend }
    }
}

/// Kernel on compound graphs.
pub struct ReactionGraphKernel {
    params : KernelParams,
    /// normalized kernel between molecules
    molecules : KernelMatrix,
}

impl ReactionGraphKernel {
    /// Computes the molecule kernel on the molecule batch, molecule at position i must have index i.
    /// Of params only lambda, epsilon and normalize are used.
    pub fn new(params: &KernelParams, molecules: &[MolGraph]) -> anyhow::Result<Self> {
        let mut params = *params;
        params.maxlen = REACTION_GRAPH_MAXLEN;
        params.node_match = false;
        params.edge_match = true;
        params.partial_norm = false;
        params.check()?;
        //
        let mut inner = params;
        inner.mode = SequenceMode::Walks;
        inner.weighting = Weighting::Exponential { alpha: 1. };
        inner.node_match = true;
        inner.edge_match = true;
        inner.reduced = false;
        inner.normalize = true;
        log::info!("computing molecule walk kernel on {} molecules", molecules.len());
        let mut kernel = SequenceKernel::new(inner, MarginalModel::new(inner.lambda)?)?;
        let matrix = KernelMatrix::build(&mut kernel, molecules, 0..molecules.len(), true)?;
        Ok(ReactionGraphKernel {
            params,
            molecules: matrix,
        })
    } // end of new

    pub fn get_params(&self) -> &KernelParams {
        &self.params
    }

    pub fn nb_molecules(&self) -> usize {
        self.molecules.get_rows_range().end
    }

    /// normalized kernel value of two molecules
    pub fn molecule_value(&self, m1: usize, m2: usize) -> anyhow::Result<f64> {
        self.molecules
            .get_value(m1, m2)
            .ok_or_else(|| anyhow!("no molecule kernel value for molecules ({}, {})", m1, m2))
    }

    fn check_molecules(&self, graph: &CompoundGraph) -> anyhow::Result<()> {
        let nb_molecules = self.nb_molecules();
        match graph
            .get_graph()
            .node_weights()
            .find(|c| c.get_molecule() >= nb_molecules)
        {
            Some(c) => Err(anyhow!(
                "compound {} of {} refers to molecule {}, nb molecules : {}",
                c.get_ligand(),
                graph.get_name(),
                c.get_molecule(),
                nb_molecules
            )),
            None => Ok(()),
        }
    }
} // end of impl ReactionGraphKernel

impl GraphKernel<CompoundGraph> for ReactionGraphKernel {
    fn get_name(&self) -> String {
        format!("reactiongraph-l{:.2}", self.params.lambda)
    }

    fn prepare(&mut self, graphs: &[CompoundGraph]) -> anyhow::Result<()> {
        for g in graphs {
            self.check_molecules(g)?;
        }
        log::info!("{} compound graphs checked", graphs.len());
        Ok(())
    }

    fn compute(&self, g1: &CompoundGraph, g2: &CompoundGraph) -> anyhow::Result<f64> {
        self.check_molecules(g1)?;
        self.check_molecules(g2)?;
        let (n1, n2) = (g1.nb_compounds(), g2.nb_compounds());
        let n = n1 * n2;
        if n == 0 {
            return Ok(0.);
        }
        let (w1, w2) = (CompoundWalks::new(g1, self.params.lambda), CompoundWalks::new(g2, self.params.lambda));
        // product node x = a1 * n2 + a2
        let mut similarity = vec![0.; n];
        for a1 in 0..n1 {
            for a2 in 0..n2 {
                let m1 = g1.get_compound(NodeIndex::new(a1)).get_molecule();
                let m2 = g2.get_compound(NodeIndex::new(a2)).get_molecule();
                similarity[a1 * n2 + a2] = self.molecule_value(m1, m2)?;
            }
        }
        // product neighbours : links of same type in both graphs
        let mut neighbours: Vec<Vec<usize>> = vec![Vec::new(); n];
        for e1 in g1.get_graph().raw_edges() {
            for e2 in g2.get_graph().raw_edges() {
                if e1.weight != e2.weight {
                    continue;
                }
                let (s1, t1) = (e1.source().index(), e1.target().index());
                let (s2, t2) = (e2.source().index(), e2.target().index());
                for (x, y) in [(s1 * n2 + s2, t1 * n2 + t2), (s1 * n2 + t2, t1 * n2 + s2)] {
                    neighbours[x].push(y);
                    neighbours[y].push(x);
                }
            }
        }
        //
        let maxlen = self.params.maxlen;
        let mut table = Array2::<f64>::zeros((n, 2));
        let (mut previous, mut current) = (0, 1);
        let mut sum = 0.;
        for x in 0..n {
            table[[x, previous]] = w1.pstart * w2.pstart * similarity[x];
        }
        for l in 0..maxlen {
            if l > 0 {
                for x in 0..n {
                    let value: f64 = neighbours[x]
                        .iter()
                        .map(|u| table[[*u, previous]] * w1.pstep[*u / n2] * w2.pstep[*u % n2])
                        .sum();
                    table[[x, current]] = value * similarity[x];
                }
                std::mem::swap(&mut previous, &mut current);
            }
            let level: f64 = (0..n)
                .map(|x| table[[x, previous]] * w1.pend[x / n2] * w2.pend[x % n2])
                .sum();
            let increase = relative_increase(level, sum);
            sum += level;
            if l > 0 && increase < self.params.epsilon {
                log::trace!("reaction graph walks converged at length {}", l + 1);
                break;
            }
        }
        Ok(sum)
    } // end of compute
} // end of impl GraphKernel for ReactionGraphKernel

// end of mod tests
