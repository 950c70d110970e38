//! small graphs shared by test modules

use super::model::*;

/// a graph from atom symbols and (atom, atom, change) triples, bond types are all 1
pub(crate) fn from_edges(symbols: &[&str], bonds: &[(usize, usize, i32)]) -> MolGraph {
    typed_from_edges(symbols, &bonds.iter().map(|&(a, b, c)| (a, b, c, 1)).collect::<Vec<_>>())
}

/// as from_edges with an explicit bond type as last tuple component
pub(crate) fn typed_from_edges(symbols: &[&str], bonds: &[(usize, usize, i32, i32)]) -> MolGraph {
    let mut builder = GraphBuilder::new("sample", GraphKind::Molecule);
    for s in symbols {
        builder.add_atom(s);
    }
    for &(a, b, change, btype) in bonds {
        let change = BondChange::from_i32(change).unwrap();
        builder.add_bond(a, b, Bond::new(btype, change, btype, btype)).unwrap();
    }
    builder.build()
}

/// a linear chain, all bonds with the same change
pub(crate) fn chain(symbols: &[&str], change: i32) -> MolGraph {
    let bonds: Vec<(usize, usize, i32)> = (1..symbols.len()).map(|i| (i - 1, i, change)).collect();
    from_edges(symbols, &bonds)
}

/// a ring, all bonds with the same change
pub(crate) fn ring(symbols: &[&str], change: i32) -> MolGraph {
    let n = symbols.len();
    let bonds: Vec<(usize, usize, i32)> = (0..n).map(|i| (i, (i + 1) % n, change)).collect();
    from_edges(symbols, &bonds)
}

/// a small reaction like graph : a ring with one formed and one broken bond and a side chain
pub(crate) fn reaction_like() -> MolGraph {
    from_edges(
        &["C", "C", "O", "C", "N", "C", "O"],
        &[
            (0, 1, 0),
            (1, 2, -1),
            (2, 3, 0),
            (3, 0, 0),
            (3, 4, 1),
            (4, 5, 0),
            (5, 6, 0),
        ],
    )
}

/// same as from_edges with the core distances computed
pub(crate) fn with_core(symbols: &[&str], bonds: &[(usize, usize, i32)]) -> MolGraph {
    let mut g = from_edges(symbols, bonds);
    crate::graph::coredist::compute_core_distances(&mut g);
    g
}
