//! Graph kernels on reaction and molecule graphs.
//!
//! Reaction graphs carry bond changes (formed, broken, unchanged). Kernels count weighted walks, non tottering walks
//! or paths common to two graphs through their product graph, atoms being weighted by their distance to the reaction core.
//! A subgraph census kernel compares counts of isomorphic connected subgraphs, a shortest paths kernel compares labels
//! of shortest paths, and a reaction graph kernel compares reactions through the graphs of their compounds.
//!
//! - [graph] : graph model, core distances, product graphs and compound graphs.
//! - [isomorphism] : VF2 isomorphism test.
//! - [diffusion] : heat kernel of a graph.
//! - [kernel] : kernels and kernel matrices.
//! - [io] : reading reaction, MOL and reactant pair files, dumping matrices.

pub mod graph;

pub mod isomorphism;

pub mod diffusion;

pub mod kernel;

pub mod io;

pub mod prelude;
