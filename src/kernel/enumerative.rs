//! Enumerative mechanism kernel.
//!
//! Sequences are weighted deterministically : each product node $x = (a_1, a_2)$ visited contributes $\lambda \, w(a_1) w(a_2)$
//! where $w$ is the atom weighting, so that a walk of length $\ell$ decays as $\lambda^\ell$.
//! For paths, each path of a factor graph is weighted by $\prod_{a} \lambda \, w(a)$.

use petgraph::graph::NodeIndex;

use crate::graph::model::MolGraph;
use crate::graph::product::PairNode;

use super::sequence::SequenceModel;

/// Deterministic weighting of sequences.
#[cfg_attr(doc, katexit::katexit)]
pub struct EnumerativeModel {
    lambda : f64,
}

impl EnumerativeModel {
    pub fn new(lambda: f64) -> Self {
        EnumerativeModel { lambda }
    }

    pub fn get_lambda(&self) -> f64 {
        self.lambda
    }

    fn node_weight(&self, f1: &[f64], f2: &[f64], x: &PairNode) -> f64 {
        self.lambda * f1[x.a1.index()] * f2[x.a2.index()]
    }
}

impl SequenceModel for EnumerativeModel {
    type Factor = Vec<f64>;

    fn get_name(&self) -> &'static str {
        "enumerative"
    }

    fn factor(&self, _graph: &MolGraph, weights: Vec<f64>) -> anyhow::Result<Vec<f64>> {
        Ok(weights)
    }

    fn start_end(&self, f1: &Vec<f64>, f2: &Vec<f64>, x: &PairNode) -> f64 {
        self.node_weight(f1, f2, x)
    }

    fn transition(&self, f1: &Vec<f64>, f2: &Vec<f64>, _u: &PairNode, v: &PairNode) -> f64 {
        self.node_weight(f1, f2, v)
    }

    // a message on s -> t carries walks ending in s, t is not counted yet
    fn message_start(&self, f1: &Vec<f64>, f2: &Vec<f64>, s: &PairNode, _t: &PairNode) -> f64 {
        self.node_weight(f1, f2, s)
    }

    fn message_transition(&self, f1: &Vec<f64>, f2: &Vec<f64>, _u: &PairNode, s: &PairNode, _t: &PairNode) -> f64 {
        self.node_weight(f1, f2, s)
    }

    fn message_end(&self, f1: &Vec<f64>, f2: &Vec<f64>, _u: &PairNode, v: &PairNode) -> f64 {
        self.node_weight(f1, f2, v)
    }

    fn path_weight(&self, _graph: &MolGraph, f: &Vec<f64>, atoms: &[NodeIndex]) -> f64 {
        atoms.iter().map(|a| self.lambda * f[a.index()]).product()
    }
} // end of impl SequenceModel for EnumerativeModel

// end of mod tests
