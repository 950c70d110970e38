//! Graph kernels.
//!
//! A kernel gives a similarity value for each pair of graphs of a batch.
//! - [sequence::SequenceKernel] counts weighted walks, non tottering walks or paths common to both graphs,
//!   with a probabilistic model ([marginal]) or a deterministic decay ([enumerative]).
//! - [subgraphs::SubgraphsKernel] compares the censuses of connected induced subgraphs.
//! - [shortest::ShortestPathsKernel] compares labels of shortest paths between pairs of atoms.
//! - [reactiongraph::ReactionGraphKernel] compares reactions through their compound graphs,
//!   with a walk kernel on molecules as similarity of compounds.
//!
//! Kernel values of a batch are gathered in a [matrix::KernelMatrix].

use std::str::FromStr;

use anyhow::anyhow;

use crate::graph::model::MolGraph;

pub mod enumerative;
pub mod marginal;
pub mod matrix;
pub mod params;
pub mod reactiongraph;
pub mod sequence;
pub mod shortest;
pub mod subgraphs;
pub mod weight;

use enumerative::EnumerativeModel;
use marginal::MarginalModel;
use params::{KernelParams, Weighting};
use sequence::SequenceKernel;
use shortest::ShortestPathsKernel;
use subgraphs::SubgraphsKernel;

/// What a kernel must provide to fill a kernel matrix.
/// Kernels compare molecule or reaction graphs, except the reaction graph kernel working on compound graphs.
pub trait GraphKernel<G = MolGraph>: Send + Sync {
    /// a name with the parameters, for logs and output files
    fn get_name(&self) -> String;

    /// precomputations on the whole batch, done once before any call to compute.
    fn prepare(&mut self, graphs: &[G]) -> anyhow::Result<()>;

    /// the kernel value of a pair of graphs
    fn compute(&self, g1: &G, g2: &G) -> anyhow::Result<f64>;

    /// logs statistics gathered during computations
    fn log_statistics(&self) {}
}

/// The kernels available
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelType {
    /// marginal mechanism kernel
    Marginal,
    /// enumerative mechanism kernel
    Enumerative,
    /// subgraph census kernel
    Subgraphs,
    /// enumerative walks kernel without core weighting
    Walks,
    /// marginal walks kernel without core weighting
    RandomWalks,
    /// shortest paths kernel
    ShortestPaths,
    /// reaction graph kernel, on compound graphs
    ReactionGraph,
}

impl FromStr for KernelType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MMECH" => Ok(KernelType::Marginal),
            "EMECH" => Ok(KernelType::Enumerative),
            "SG" => Ok(KernelType::Subgraphs),
            "WK" => Ok(KernelType::Walks),
            "RWK" => Ok(KernelType::RandomWalks),
            "SP" => Ok(KernelType::ShortestPaths),
            "RGK" => Ok(KernelType::ReactionGraph),
            _ => Err(anyhow!(
                "unknown kernel type {}, expecting MMECH, EMECH, SG, WK, RWK, SP or RGK",
                s
            )),
        }
    }
}

/// Builds a kernel on molecule or reaction graphs. Walks and RandomWalks force uniform atom weights,
/// the sequence mode asked for is kept.
/// The reaction graph kernel needs its molecule batch, it is built by [ReactionGraphKernel::new](reactiongraph::ReactionGraphKernel::new).
pub fn build_kernel(ktype: KernelType, params: &KernelParams) -> anyhow::Result<Box<dyn GraphKernel>> {
    let mut params = *params;
    if ktype == KernelType::Walks || ktype == KernelType::RandomWalks {
        params.weighting = Weighting::Exponential { alpha: 1. };
    }
    log::info!("building kernel {:?}, params {:?}", ktype, params);
    let kernel: Box<dyn GraphKernel> = match ktype {
        KernelType::Marginal | KernelType::RandomWalks => {
            Box::new(SequenceKernel::new(params, MarginalModel::new(params.lambda)?)?)
        }
        KernelType::Enumerative | KernelType::Walks => {
            Box::new(SequenceKernel::new(params, EnumerativeModel::new(params.lambda))?)
        }
        KernelType::Subgraphs => Box::new(SubgraphsKernel::new(params)?),
        KernelType::ShortestPaths => Box::new(ShortestPathsKernel::new(params)?),
        KernelType::ReactionGraph => {
            return Err(anyhow!(
                "the reaction graph kernel compares compound graphs, it is built from a molecule batch"
            ));
        }
    };
    Ok(kernel)
} // end of build_kernel

// end of mod tests
