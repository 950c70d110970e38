//! Lower triangular kernel matrices.
//!
//! Row i holds the values K(i, j) for j in 0..=i. A matrix may cover only a range of rows,
//! so that a batch can be split between several runs.
//! Rows are computed in parallel, each cell independently of the others.

use std::ops::Range;

use anyhow::anyhow;
use rayon::prelude::*;

use crate::graph::BatchGraph;

use super::GraphKernel;

/// A lower triangular kernel matrix over a range of rows.
#[derive(Clone, Debug)]
pub struct KernelMatrix {
    rows_range : Range<usize>,
    rows : Vec<Vec<f64>>,
    normalized : bool,
}

impl KernelMatrix {
    /// computes rows in range (clamped to the number of graphs). Graph at position i must have index i.
    /// A NaN value in a cell is an error reporting the offending pair.
    pub fn compute<G, K>(kernel: &K, graphs: &[G], rows_range: Range<usize>) -> anyhow::Result<Self>
    where
        G: BatchGraph,
        K: GraphKernel<G> + ?Sized,
    {
        if let Some((i, g)) = graphs.iter().enumerate().find(|(i, g)| g.get_index() != *i) {
            return Err(anyhow!("graph {} at position {} has index {}", g.get_name(), i, g.get_index()));
        }
        let rows_range = rows_range.start.min(graphs.len())..rows_range.end.min(graphs.len());
        let cpu_start = cpu_time::ProcessTime::now();
        let sys_start = std::time::SystemTime::now();
        log::info!("computing {} kernel rows {:?}", kernel.get_name(), rows_range);
        //
        let rows = rows_range
            .clone()
            .into_par_iter()
            .map(|i| {
                let row = (0..=i)
                    .map(|j| {
                        let value = kernel.compute(&graphs[i], &graphs[j])?;
                        if value.is_nan() {
                            log::error!(
                                "NaN kernel value for pair ({}, {}) : {} / {}",
                                i,
                                j,
                                graphs[i].get_name(),
                                graphs[j].get_name()
                            );
                            return Err(anyhow!("NaN kernel value for pair ({}, {})", i, j));
                        }
                        Ok(value)
                    })
                    .collect::<anyhow::Result<Vec<f64>>>()?;
                log::debug!("row {} computed", i);
                Ok(row)
            })
            .collect::<anyhow::Result<Vec<Vec<f64>>>>()?;
        //
        log::info!(
            "kernel rows computed, sys time(s) {:.2e} cpu time(s) {:.2e}",
            sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
            cpu_start.elapsed().as_secs_f64()
        );
        Ok(KernelMatrix {
            rows_range,
            rows,
            normalized: false,
        })
    } // end of compute

    /// prepares the kernel on the batch, computes the rows and normalizes if asked for.
    pub fn build<G, K>(kernel: &mut K, graphs: &[G], rows_range: Range<usize>, normalize: bool) -> anyhow::Result<Self>
    where
        G: BatchGraph,
        K: GraphKernel<G> + ?Sized,
    {
        kernel.prepare(graphs)?;
        let mut matrix = KernelMatrix::compute(&*kernel, graphs, rows_range)?;
        kernel.log_statistics();
        if normalize {
            matrix.normalize()?;
        }
        Ok(matrix)
    }

    pub fn get_rows_range(&self) -> Range<usize> {
        self.rows_range.clone()
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// row i, values for columns 0..=i
    pub fn get_row(&self, i: usize) -> Option<&[f64]> {
        if self.rows_range.contains(&i) {
            Some(&self.rows[i - self.rows_range.start])
        } else {
            None
        }
    }

    /// K(i, j) whichever of i and j is larger, None if the cell is not in the rows range
    pub fn get_value(&self, i: usize, j: usize) -> Option<f64> {
        let (row, col) = if j <= i { (i, j) } else { (j, i) };
        self.get_row(row).map(|r| r[col])
    }

    /// K(i, j) / sqrt(K(i, i) K(j, j)), 0 when the denominator vanishes.
    /// Needs all rows from 0 as diagonal values of earlier rows are used.
    pub fn normalize(&mut self) -> anyhow::Result<()> {
        if self.rows_range.start != 0 {
            return Err(anyhow!(
                "normalization needs rows from 0, matrix covers {:?}",
                self.rows_range
            ));
        }
        if self.normalized {
            return Ok(());
        }
        let diagonal: Vec<f64> = self.rows.iter().enumerate().map(|(i, r)| r[i]).collect();
        for (i, row) in self.rows.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                let denominator = (diagonal[i] * diagonal[j]).sqrt();
                *value = if denominator > 0. { *value / denominator } else { 0. };
            }
        }
        self.normalized = true;
        Ok(())
    } // end of normalize
} // end of impl KernelMatrix

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::model::MolGraph;
    use crate::graph::samples::*;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    // kernel counting common atoms by symbol
    struct CommonAtoms;

    impl GraphKernel for CommonAtoms {
        fn get_name(&self) -> String {
            String::from("common atoms")
        }

        fn prepare(&mut self, _graphs: &[MolGraph]) -> anyhow::Result<()> {
            Ok(())
        }

        fn compute(&self, g1: &MolGraph, g2: &MolGraph) -> anyhow::Result<f64> {
            let mut value = 0.;
            for (symbol, n1) in g1.get_formula() {
                if let Some(n2) = g2.get_formula().get(symbol) {
                    value += (n1 * n2) as f64;
                }
            }
            Ok(value)
        }
    }

    fn batch() -> Vec<MolGraph> {
        let mut graphs = vec![
            chain(&["C", "O"], 0),
            chain(&["C", "C", "N"], 0),
            chain(&["S"], 0),
            chain(&["O", "O", "C"], 0),
        ];
        for (i, g) in graphs.iter_mut().enumerate() {
            g.set_index(i);
        }
        graphs
    }

    #[test]
    fn symmetric_access() {
        log_init_test();
        //
        let graphs = batch();
        let matrix = KernelMatrix::compute(&CommonAtoms, &graphs, 0..4).unwrap();
        assert_eq!(matrix.get_value(1, 0), Some(2.));
        assert_eq!(matrix.get_value(0, 1), Some(2.));
        assert_eq!(matrix.get_value(3, 3), Some(5.));
        assert_eq!(matrix.get_row(2).unwrap().len(), 3);
        //
        let partial = KernelMatrix::compute(&CommonAtoms, &graphs, 2..10).unwrap();
        assert_eq!(partial.get_rows_range(), 2..4);
        assert_eq!(partial.get_value(1, 0), None);
        assert_eq!(partial.get_value(0, 3), Some(3.));
    }

    #[test]
    fn normalization() {
        log_init_test();
        //
        let graphs = batch();
        let mut matrix = KernelMatrix::compute(&CommonAtoms, &graphs, 0..4).unwrap();
        matrix.normalize().unwrap();
        for i in 0..4 {
            assert!((matrix.get_value(i, i).unwrap() - 1.).abs() < 1.0e-12);
        }
        // S shares nothing
        assert_eq!(matrix.get_value(2, 0), Some(0.));
        assert!((matrix.get_value(3, 0).unwrap() - 3. / (2f64 * 5.).sqrt()).abs() < 1.0e-12);
        //
        let mut partial = KernelMatrix::compute(&CommonAtoms, &graphs, 1..4).unwrap();
        assert!(partial.normalize().is_err());
    }

    #[test]
    fn indexes_must_match_positions() {
        log_init_test();
        //
        let mut graphs = batch();
        graphs.swap(0, 1);
        assert!(KernelMatrix::compute(&CommonAtoms, &graphs, 0..4).is_err());
    }

    // kernel with a NaN value for pairs involving a graph with a given number of atoms
    struct NanOnSize(usize);

    impl GraphKernel for NanOnSize {
        fn get_name(&self) -> String {
            String::from("nan on size")
        }

        fn prepare(&mut self, _graphs: &[MolGraph]) -> anyhow::Result<()> {
            Ok(())
        }

        fn compute(&self, g1: &MolGraph, g2: &MolGraph) -> anyhow::Result<f64> {
            if g1.nb_atoms() == self.0 || g2.nb_atoms() == self.0 {
                Ok(f64::NAN)
            } else {
                Ok(1.)
            }
        }
    }

    #[test]
    fn nan_values_are_errors() {
        log_init_test();
        //
        let graphs = batch();
        // S is the only one atom graph, at position 2
        let mut kernel = NanOnSize(1);
        assert!(KernelMatrix::compute(&kernel, &graphs, 0..4).is_err());
        assert!(KernelMatrix::build(&mut kernel, &graphs, 0..4, true).is_err());
        // rows before the faulty graph are fine
        let rows = KernelMatrix::compute(&kernel, &graphs, 0..2).unwrap();
        assert_eq!(rows.get_value(1, 0), Some(1.));
        // the NaN of row 3 is at column 2
        assert!(KernelMatrix::compute(&kernel, &graphs, 3..4).is_err());
        let boxed: Box<dyn GraphKernel> = Box::new(NanOnSize(7));
        assert!(KernelMatrix::compute(boxed.as_ref(), &graphs, 0..4).is_ok());
    }
} // end of mod tests
