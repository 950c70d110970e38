//! Reaction file reader.
//!
//! Layout :
//! - line 0 : ligand code in the first 6 characters, then EC codes separated by blanks.
//! - line 1 : the reaction equation `C1 C2 => C3 C4`.
//! - line 2 : free.
//! - line 3 : atom count in columns 0..3, bond count in columns 3..6.
//! - atom lines : the 4th blank separated token is the atom symbol.
//! - bond lines : source, target (numbered from 1), change, old type, new type, in columns of width 3.
//!
//! The file name `<ligand>_<mapnum>_<f|b>.<ext>` gives the mapping number and the direction of the reaction.

use std::path::Path;

use crate::graph::model::{Bond, BondChange, GraphBuilder, GraphKind, MolGraph, ReactionInfo};

use super::{file_stem, get_line, parse_column, parse_counts, read_lines};

/// direction and mapping number deduced from a file name
fn parse_file_name(name: &str) -> (i8, String) {
    let direction = if name.contains("_f") {
        1
    } else if name.contains("_b") {
        -1
    } else {
        0
    };
    let parts: Vec<&str> = name.split('_').collect();
    let mapnum = if parts.len() == 3 { parts[1].to_string() } else { String::new() };
    (direction, mapnum)
}

/// reads a reaction graph. Core distances are not computed.
pub fn read_reaction(path: &Path) -> anyhow::Result<MolGraph> {
    let lines = read_lines(path)?;
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (direction, mapnum) = parse_file_name(&file_name);
    let mut info = ReactionInfo {
        direction,
        mapnum,
        ..Default::default()
    };
    //
    let first = get_line(&lines, 0, path)?;
    if !first.trim().is_empty() {
        info.ligand = first.chars().take(6).collect::<String>().trim().to_string();
        info.ec_codes = first.split_whitespace().skip(1).map(String::from).collect();
    }
    let equation = get_line(&lines, 1, path)?;
    let mut products = false;
    for word in equation.split_whitespace() {
        if word.contains("=>") {
            products = true;
        } else if products {
            info.products.push(word.to_string());
        } else {
            info.reactants.push(word.to_string());
        }
    }
    //
    let (nb_atoms, nb_bonds) = parse_counts(&lines, path)?;
    let mut builder = GraphBuilder::new(&file_stem(path), GraphKind::Reaction(info));
    for lineno in 4..4 + nb_atoms {
        let line = get_line(&lines, lineno, path)?;
        let symbol = line.split_whitespace().nth(3).ok_or_else(|| {
            anyhow::anyhow!("file {} line {} : no atom symbol", path.display(), lineno + 1)
        })?;
        builder.add_atom(symbol);
    }
    for lineno in 4 + nb_atoms..4 + nb_atoms + nb_bonds {
        let line = get_line(&lines, lineno, path)?;
        let source = parse_column(line, 0..3, lineno, path)?;
        let target = parse_column(line, 3..6, lineno, path)?;
        let change = parse_column(line, 6..9, lineno, path)?;
        let old_type = parse_column(line, 9..12, lineno, path)?;
        let new_type = parse_column(line, 12..15, lineno, path)?;
        if source < 1 || target < 1 {
            return Err(anyhow::anyhow!(
                "file {} line {} : atoms are numbered from 1",
                path.display(),
                lineno + 1
            ));
        }
        let change = BondChange::from_i32(change)
            .map_err(|e| anyhow::anyhow!("file {} line {} : {}", path.display(), lineno + 1, e))?;
        builder
            .add_bond(
                source as usize - 1,
                target as usize - 1,
                Bond::new(0, change, old_type, new_type),
            )
            .map_err(|e| anyhow::anyhow!("file {} line {} : {}", path.display(), lineno + 1, e))?;
    }
    let graph = builder.build();
    log::debug!(
        "read reaction {}, nb atoms {}, nb bonds {}",
        graph.get_name(),
        graph.nb_atoms(),
        graph.nb_bonds()
    );
    Ok(graph)
} // end of read_reaction

// end of mod tests
