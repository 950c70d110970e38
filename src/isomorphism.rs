//! Graph isomorphism by the VF2 algorithm.
//!
//! Atoms must carry the same symbol and mapped bonds the same change.
//! Before any search, graphs are compared on sizes, formula and spectra, which rejects most pairs.
//!
//! The search is depth first on an explicit stack of frames. A frame holds the candidate pairs
//! generated for its depth, a cursor on them and what must be undone when its current pair is removed
//! from the mapping. It stops at the first complete mapping.

use fixedbitset::FixedBitSet;
use petgraph::graph::NodeIndex;

use crate::graph::model::MolGraph;

const UNMAPPED: usize = usize::MAX;

/// Cheap necessary conditions for isomorphism. Returns true if the graphs can not be isomorphic.
pub fn quick_reject(g1: &MolGraph, g2: &MolGraph) -> bool {
    g1.nb_atoms() != g2.nb_atoms()
        || g1.nb_bonds() != g2.nb_bonds()
        || g1.get_formula() != g2.get_formula()
        || g1.get_node_spectrum() != g2.get_node_spectrum()
        || g1.get_edge_spectrum() != g2.get_edge_spectrum()
}

/// returns true if there is a mapping of atoms of g1 onto atoms of g2 preserving symbols, bonds and bond changes
pub fn is_isomorphic(g1: &MolGraph, g2: &MolGraph) -> bool {
    if quick_reject(g1, g2) {
        return false;
    }
    if g1.nb_atoms() == 0 {
        return true;
    }
    let mut state = Vf2State::new(g1, g2);
    let found = state.search();
    log::trace!(
        "vf2 {} / {} : {}, nb states explored {}",
        g1.get_name(),
        g2.get_name(),
        found,
        state.nb_explored
    );
    found
} // end of is_isomorphic

//=======================================================================================

/// one side of the search: the graph, its half of the mapping and its border
struct Side<'a> {
    graph: &'a MolGraph,
    /// index of the mapped atom in the other graph or UNMAPPED
    mapping: Vec<usize>,
    /// unmapped atoms adjacent to a mapped atom
    border: FixedBitSet,
}

impl<'a> Side<'a> {
    fn new(graph: &'a MolGraph) -> Self {
        let n = graph.nb_atoms();
        Side {
            graph,
            mapping: vec![UNMAPPED; n],
            border: FixedBitSet::with_capacity(n),
        }
    }

    fn is_mapped(&self, n: usize) -> bool {
        self.mapping[n] != UNMAPPED
    }

    /// maps ours to theirs, returns whether ours was on the border and the atoms newly on the border
    fn push(&mut self, ours: usize, theirs: usize) -> (bool, Vec<usize>) {
        self.mapping[ours] = theirs;
        let was_border = self.border.contains(ours);
        self.border.set(ours, false);
        let mut added = Vec::new();
        for m in self.graph.neighbours(NodeIndex::new(ours)) {
            let m = m.index();
            if !self.is_mapped(m) && !self.border.contains(m) {
                self.border.insert(m);
                added.push(m);
            }
        }
        (was_border, added)
    }

    fn pop(&mut self, ours: usize, was_border: bool, added: &[usize]) {
        for m in added {
            self.border.set(*m, false);
        }
        self.mapping[ours] = UNMAPPED;
        if was_border {
            self.border.insert(ours);
        }
    }

    /// counts (mapped, border, remote) neighbours of n
    fn neighbour_counts(&self, n: usize) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for m in self.graph.neighbours(NodeIndex::new(n)) {
            let m = m.index();
            if self.is_mapped(m) {
                counts.0 += 1;
            } else if self.border.contains(m) {
                counts.1 += 1;
            } else {
                counts.2 += 1;
            }
        }
        counts
    }
} // end of impl Side

/// what a depth of the search must remember
struct Frame {
    candidates: Vec<(usize, usize)>,
    next: usize,
    // pair currently in the mapping, border flags and border additions of both sides
    current: Option<(usize, usize)>,
    was_border: (bool, bool),
    added: (Vec<usize>, Vec<usize>),
}

impl Frame {
    fn new(candidates: Vec<(usize, usize)>) -> Self {
        Frame {
            candidates,
            next: 0,
            current: None,
            was_border: (false, false),
            added: (Vec::new(), Vec::new()),
        }
    }
}

struct Vf2State<'a> {
    lhs: Side<'a>,
    rhs: Side<'a>,
    nb_mapped: usize,
    nb_explored: usize,
}

impl<'a> Vf2State<'a> {
    fn new(g1: &'a MolGraph, g2: &'a MolGraph) -> Self {
        Vf2State {
            lhs: Side::new(g1),
            rhs: Side::new(g2),
            nb_mapped: 0,
            nb_explored: 0,
        }
    }

    // If both borders are non empty all lhs border atoms are tried against the first rhs border atom.
    // Otherwise the lowest unmapped rhs atom is tried against all unmapped lhs atoms.
    fn candidates(&self) -> Vec<(usize, usize)> {
        let rhs_border = self.rhs.border.ones().next();
        let lhs_border: Vec<usize> = self.lhs.border.ones().collect();
        match rhs_border {
            Some(r) if !lhs_border.is_empty() => lhs_border.into_iter().map(|l| (l, r)).collect(),
            _ => {
                let r = (0..self.rhs.mapping.len()).find(|r| !self.rhs.is_mapped(*r));
                match r {
                    Some(r) => (0..self.lhs.mapping.len())
                        .filter(|l| !self.lhs.is_mapped(*l))
                        .map(|l| (l, r))
                        .collect(),
                    None => Vec::new(),
                }
            }
        }
    } // end of candidates

    fn feasible(&self, l: usize, r: usize) -> bool {
        let (nl, nr) = (NodeIndex::new(l), NodeIndex::new(r));
        if self.lhs.graph.get_atom(nl).get_symbol() != self.rhs.graph.get_atom(nr).get_symbol() {
            return false;
        }
        // mapped neighbours of l must be sent onto neighbours of r by bonds with the same change
        for m in self.lhs.graph.neighbours(nl) {
            let image = self.lhs.mapping[m.index()];
            if image == UNMAPPED {
                continue;
            }
            let lbond = self.lhs.graph.find_bond(nl, m);
            let rbond = self.rhs.graph.find_bond(nr, NodeIndex::new(image));
            match (lbond, rbond) {
                (Some(lb), Some(rb)) if lb.get_change() == rb.get_change() => {}
                _ => return false,
            }
        }
        // with injectivity, equal counts of mapped neighbours make the correspondence exact
        self.lhs.neighbour_counts(l) == self.rhs.neighbour_counts(r)
    } // end of feasible

    fn push(&mut self, frame: &mut Frame, l: usize, r: usize) {
        let (lb, ladded) = self.lhs.push(l, r);
        let (rb, radded) = self.rhs.push(r, l);
        frame.current = Some((l, r));
        frame.was_border = (lb, rb);
        frame.added = (ladded, radded);
        self.nb_mapped += 1;
    }

    fn pop(&mut self, frame: &mut Frame) {
        if let Some((l, r)) = frame.current.take() {
            self.lhs.pop(l, frame.was_border.0, &frame.added.0);
            self.rhs.pop(r, frame.was_border.1, &frame.added.1);
            self.nb_mapped -= 1;
        }
    }

    fn search(&mut self) -> bool {
        let nb_atoms = self.lhs.mapping.len();
        let mut stack = vec![Frame::new(self.candidates())];
        //
        while let Some(mut frame) = stack.pop() {
            self.pop(&mut frame);
            let mut chosen = None;
            while frame.next < frame.candidates.len() {
                let (l, r) = frame.candidates[frame.next];
                frame.next += 1;
                self.nb_explored += 1;
                if self.feasible(l, r) {
                    chosen = Some((l, r));
                    break;
                }
            }
            // exhausted frames are dropped, which backtracks to the previous depth
            if let Some((l, r)) = chosen {
                self.push(&mut frame, l, r);
                if self.nb_mapped == nb_atoms {
                    return true;
                }
                let next = Frame::new(self.candidates());
                stack.push(frame);
                stack.push(next);
            }
        }
        false
    } // end of search
} // end of impl Vf2State

//=======================================================================================

// end of mod tests
