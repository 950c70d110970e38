//! Reading graphs from reaction and MOL files, writing kernel matrices.
//!
//! Both file formats share a header of 4 lines, the 4th one giving atom and bond counts in fixed width columns,
//! followed by one line per atom and one line per bond.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::anyhow;

use crate::graph::coredist::compute_core_distances;
use crate::graph::model::MolGraph;

/// Reaction files.
pub mod reaction;

/// MOL files of molecules.
pub mod molfile;

/// Reactant pair files and compound graphs of reactions.
pub mod rpair;

/// Kernel matrix and graph summary dumps.
pub mod output;

/// The kind of files in a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Reaction,
    Mol,
}

/// reads all lines of a file
pub(crate) fn read_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| anyhow!("could not open file {} : {}", path.display(), e))?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<Result<Vec<String>, _>>()
        .map_err(|e| anyhow!("error reading file {} : {}", path.display(), e))?;
    Ok(lines)
}

/// line lineno of a file, an error naming the file if missing
pub(crate) fn get_line<'a>(lines: &'a [String], lineno: usize, path: &Path) -> anyhow::Result<&'a str> {
    lines.get(lineno).map(|l| l.as_str()).ok_or_else(|| {
        anyhow!(
            "file {} : truncated, line {} missing",
            path.display(),
            lineno + 1
        )
    })
}

/// integer in a fixed width column, columns beyond the end of the line are cut.
pub(crate) fn parse_column(line: &str, columns: Range<usize>, lineno: usize, path: &Path) -> anyhow::Result<i32> {
    let end = columns.end.min(line.len());
    let field = line.get(columns.start..end).map(|f| f.trim()).unwrap_or("");
    field.parse::<i32>().map_err(|_| {
        anyhow!(
            "file {} line {} : expected an integer in columns {:?}, got {:?}",
            path.display(),
            lineno + 1,
            columns,
            field
        )
    })
}

/// atom and bond counts of the 4th header line
pub(crate) fn parse_counts(lines: &[String], path: &Path) -> anyhow::Result<(usize, usize)> {
    let line = get_line(lines, 3, path)?;
    let nb_atoms = parse_column(line, 0..3, 3, path)?;
    let nb_bonds = parse_column(line, 3..6, 3, path)?;
    if nb_atoms < 0 || nb_bonds < 0 {
        return Err(anyhow!("file {} : negative atom or bond count", path.display()));
    }
    Ok((nb_atoms as usize, nb_bonds as usize))
}

/// name of the graph from the file name, without directory and extension
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Loads a batch of files, numbers graphs in order and computes their core distances.
/// Files that cannot be read or parsed are reported and skipped, the others are kept.
pub fn load_batch(paths: &[PathBuf], format: FileFormat) -> Vec<MolGraph> {
    let cpu_start = cpu_time::ProcessTime::now();
    let sys_start = std::time::SystemTime::now();
    //
    let mut graphs = Vec::<MolGraph>::with_capacity(paths.len());
    let mut nb_errors = 0;
    for path in paths {
        let res = match format {
            FileFormat::Reaction => reaction::read_reaction(path),
            FileFormat::Mol => molfile::read_molfile(path),
        };
        match res {
            Ok(mut graph) => {
                graph.set_index(graphs.len());
                let nb_removed = compute_core_distances(&mut graph);
                if nb_removed > 0 {
                    log::debug!("graph {} : {} atoms unreachable from core removed", graph.get_name(), nb_removed);
                }
                graphs.push(graph);
            }
            Err(e) => {
                log::error!("skipping file {} : {}", path.display(), e);
                nb_errors += 1;
            }
        }
    }
    log::info!(
        "loaded {} graphs, {} files skipped, sys time(s) {:.2e} cpu time(s) {:.2e}",
        graphs.len(),
        nb_errors,
        sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
        cpu_start.elapsed().as_secs_f64()
    );
    graphs
} // end of load_batch

// end of mod tests
