//! Molecule and reaction graphs, their core distances and product graphs.

/// Atoms, bonds and the graph container.
pub mod model;

/// Distances of atoms to the reaction core.
pub mod coredist;

/// Product graph of two graphs.
pub mod product;

/// Compound graphs of reactions.
pub mod compound;

#[cfg(test)]
pub(crate) mod samples;

/// What a graph needs to take place in a batch : its rank, which is also its row in kernel matrices, and a name.
pub trait BatchGraph: Sync {
    fn get_index(&self) -> usize;

    fn get_name(&self) -> &str;
}
