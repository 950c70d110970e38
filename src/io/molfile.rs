//! MOL file reader.
//!
//! Same header and atom block as reaction files. Bond lines give source, target and bond type in columns of width 3.
//! Hydrogens (H and H+) and their bonds are dropped, remaining atoms are renumbered consecutively.

use std::path::Path;

use anyhow::anyhow;

use crate::graph::model::{Bond, GraphBuilder, GraphKind, MolGraph};

use super::{file_stem, get_line, parse_column, parse_counts, read_lines};

fn is_hydrogen(symbol: &str) -> bool {
    symbol == "H" || symbol == "H+"
}

/// reads a molecule graph named after the file stem. Core distances are not computed.
pub fn read_molfile(path: &Path) -> anyhow::Result<MolGraph> {
    let lines = read_lines(path)?;
    let (nb_atoms, nb_bonds) = parse_counts(&lines, path)?;
    let mut builder = GraphBuilder::new(&file_stem(path), GraphKind::Molecule);
    // rank in builder of each file atom, None for hydrogens
    let mut kept = Vec::<Option<usize>>::with_capacity(nb_atoms);
    for lineno in 4..4 + nb_atoms {
        let line = get_line(&lines, lineno, path)?;
        let symbol = line
            .split_whitespace()
            .nth(3)
            .ok_or_else(|| anyhow!("file {} line {} : no atom symbol", path.display(), lineno + 1))?;
        if is_hydrogen(symbol) {
            kept.push(None);
        } else {
            kept.push(Some(builder.add_atom(symbol).index()));
        }
    }
    //
    let mut nb_skipped = 0;
    for lineno in 4 + nb_atoms..4 + nb_atoms + nb_bonds {
        let line = get_line(&lines, lineno, path)?;
        let source = parse_column(line, 0..3, lineno, path)?;
        let target = parse_column(line, 3..6, lineno, path)?;
        let btype = parse_column(line, 6..9, lineno, path)?;
        let rank = |a: i32| -> anyhow::Result<Option<usize>> {
            if a < 1 || a as usize > kept.len() {
                return Err(anyhow!(
                    "file {} line {} : bond references atom {}, nb atoms : {}",
                    path.display(),
                    lineno + 1,
                    a,
                    kept.len()
                ));
            }
            Ok(kept[a as usize - 1])
        };
        match (rank(source)?, rank(target)?) {
            (Some(a), Some(b)) => {
                builder
                    .add_bond(a, b, Bond::plain(btype))
                    .map_err(|e| anyhow!("file {} line {} : {}", path.display(), lineno + 1, e))?;
            }
            _ => nb_skipped += 1,
        }
    }
    let graph = builder.build();
    log::debug!(
        "read molecule {}, nb atoms {}, nb bonds {}, hydrogen bonds skipped {}",
        graph.get_name(),
        graph.nb_atoms(),
        graph.nb_bonds(),
        nb_skipped
    );
    Ok(graph)
} // end of read_molfile

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::coredist::compute_core_distances;
    use crate::io::tests::temp_file;
    use petgraph::graph::NodeIndex;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const METHANOL: &str = "C00132
  KEGG      999 V2000

  6  5  0  0  0  0  0  0  0  0999 V2000
    0.0000    0.0000    0.0000 C   0  0  0  0  0  0
    0.0000    0.0000    0.0000 H   0  0  0  0  0  0
    0.0000    0.0000    0.0000 H   0  0  0  0  0  0
    0.0000    0.0000    0.0000 O   0  0  0  0  0  0
    0.0000    0.0000    0.0000 H   0  0  0  0  0  0
    0.0000    0.0000    0.0000 H+  0  0  0  0  0  0
  1  2  1  0  0  0
  1  3  1  0  0  0
  1  4  2  0  0  0
  4  5  1  0  0  0
  1  6  1  0  0  0
";

    #[test]
    fn hydrogens_skipped() {
        log_init_test();
        //
        let path = temp_file("molfile", "C00132.mol", METHANOL);
        let mut graph = read_molfile(&path).unwrap();
        assert_eq!(graph.get_name(), "C00132");
        assert_eq!(graph.nb_atoms(), 2);
        assert_eq!(graph.nb_bonds(), 1);
        let bond = graph.find_bond(NodeIndex::new(0), NodeIndex::new(1)).unwrap();
        assert_eq!(bond.get_type(), 2);
        assert!(!bond.is_changed());
        assert_eq!(graph.get_direction(), 0);
        // molecules have their whole structure at core distance 0
        assert_eq!(compute_core_distances(&mut graph), 0);
        assert_eq!(graph.core_distance_zero_atoms().len(), 2);
    }

    #[test]
    fn out_of_range_atom() {
        log_init_test();
        //
        let bad = METHANOL.replace("  4  5  1  0  0  0", "  4  9  1  0  0  0");
        let path = temp_file("molfile", "bad.mol", &bad);
        assert!(read_molfile(&path).is_err());
    }
} // end of mod tests
