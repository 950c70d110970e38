//! To ease access to most frequently used items

pub use crate::graph::coredist::compute_core_distances;
pub use crate::graph::model::{Atom, Bond, BondChange, GraphBuilder, GraphKind, MolGraph, ReactionInfo};
pub use crate::graph::product::{PairingMode, ProductGraph, ProductParams};
pub use crate::graph::compound::{CompoundGraph, PairType};
pub use crate::graph::BatchGraph;

pub use crate::isomorphism::is_isomorphic;

pub use crate::kernel::matrix::KernelMatrix;
pub use crate::kernel::params::{KernelOperation, KernelParams, SequenceMode, Weighting};
pub use crate::kernel::reactiongraph::ReactionGraphKernel;
pub use crate::kernel::{build_kernel, GraphKernel, KernelType};

pub use crate::io::output::Output;
pub use crate::io::rpair::{load_compound_batch, read_rpairs};
pub use crate::io::{load_batch, FileFormat};
