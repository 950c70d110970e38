//! To describe and write dumps of kernel matrices and graph batches.
//!
//! The kernel matrix is written as tab separated text, row i holding the values for columns 0..=i.
//! The graph summary is a tab separated table with a header line.

use std::fs::OpenOptions;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use serde::Serialize;

use crate::graph::model::MolGraph;
use crate::kernel::matrix::KernelMatrix;

/// One line of the graph summary table.
#[derive(Clone, Debug, Serialize)]
pub struct GraphSummary {
    pub index: usize,
    pub name: String,
    pub nb_atoms: usize,
    pub nb_bonds: usize,
    pub nb_core_atoms: usize,
    pub direction: i8,
}

impl GraphSummary {
    pub fn new(graph: &MolGraph) -> Self {
        GraphSummary {
            index: graph.get_index(),
            name: graph.get_name().to_string(),
            nb_atoms: graph.nb_atoms(),
            nb_bonds: graph.nb_bonds(),
            nb_core_atoms: graph.core_atoms().len(),
            direction: graph.get_direction(),
        }
    }
}

/// text form of a kernel value, 5 digits in scientific notation
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::from("NaN")
    } else if value.is_infinite() {
        if value > 0. {
            String::from("Inf")
        } else {
            String::from("-Inf")
        }
    } else {
        format!("{:.5e}", value)
    }
}

pub struct Output {
    /// directory where files go
    directory: PathBuf,
    /// name of output files without extension
    basename: String,
}

impl Output {
    /// if basename is None, default basename will be "kernel"
    pub fn new(directory: &Path, basename: &Option<String>) -> Self {
        let basename = match basename {
            Some(name) => name.clone(),
            None => String::from("kernel"),
        };
        Output {
            directory: directory.to_path_buf(),
            basename,
        }
    }

    pub fn get_directory(&self) -> &Path {
        &self.directory
    }

    pub fn get_basename(&self) -> &str {
        &self.basename
    }

    /// path of the kernel matrix file
    pub fn get_matrix_path(&self) -> PathBuf {
        self.directory.join(format!("{}.kernel", self.basename))
    }

    /// path of the graph summary file
    pub fn get_summary_path(&self) -> PathBuf {
        self.directory.join(format!("{}.graphs.tsv", self.basename))
    }

    fn create(path: &Path) -> anyhow::Result<BufWriter<std::fs::File>> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| anyhow!("could not open file {} : {}", path.display(), e))?;
        Ok(BufWriter::new(file))
    }

    /// writes the rows of the matrix, returns the path of the file
    pub fn dump_matrix(&self, matrix: &KernelMatrix) -> anyhow::Result<PathBuf> {
        let path = self.get_matrix_path();
        log::info!("dumping kernel rows {:?} in {}", matrix.get_rows_range(), path.display());
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_writer(Output::create(&path)?);
        for i in matrix.get_rows_range() {
            if let Some(row) = matrix.get_row(i) {
                writer.write_record(row.iter().map(|v| format_value(*v)))?;
            }
        }
        writer.flush()?;
        Ok(path)
    } // end of dump_matrix

    /// writes a summary line for each graph, returns the path of the file
    pub fn dump_summary(&self, graphs: &[MolGraph]) -> anyhow::Result<PathBuf> {
        let path = self.get_summary_path();
        log::info!("dumping summary of {} graphs in {}", graphs.len(), path.display());
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Output::create(&path)?);
        for graph in graphs {
            writer.serialize(GraphSummary::new(graph))?;
        }
        writer.flush()?;
        Ok(path)
    }
} // end of impl Output

impl Default for Output {
    fn default() -> Self {
        Output {
            directory: PathBuf::from("."),
            basename: String::from("kernel"),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::samples::*;
    use crate::kernel::params::{KernelOperation, KernelParams};
    use crate::kernel::subgraphs::SubgraphsKernel;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn output_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mechkernel-output-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn values() {
        assert_eq!(format_value(1.), "1.00000e0");
        assert_eq!(format_value(0.000123456), "1.23456e-4");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn dump_lower_triangle() {
        log_init_test();
        //
        let mut graphs = vec![chain(&["C", "O"], 0), ring(&["C", "C", "C"], 0), chain(&["C", "C", "O"], 1)];
        for (i, g) in graphs.iter_mut().enumerate() {
            g.set_index(i);
        }
        let mut params = KernelParams::default();
        params.maxlen = 2;
        params.operation = KernelOperation::Min;
        let mut kernel = SubgraphsKernel::new(params).unwrap();
        let matrix = KernelMatrix::build(&mut kernel, &graphs, 0..3, true).unwrap();
        //
        let output = Output::new(&output_dir(), &Some(String::from("triangle")));
        let path = output.dump_matrix(&matrix).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), i + 1);
            assert_eq!(fields[i], "1.00000e0");
        }
    }

    #[test]
    fn dump_graph_summary() {
        log_init_test();
        //
        let mut g = reaction_like();
        g.set_index(4);
        let output = Output::new(&output_dir(), &Some(String::from("summary")));
        let path = output.dump_summary(&[g]).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "index\tname\tnb_atoms\tnb_bonds\tnb_core_atoms\tdirection");
        assert_eq!(lines[1], "4\tsample\t7\t7\t4\t0");
    }
} // end of mod tests
