//! Reactant pair files and compound graph batches.
//!
//! A reactant pair file has one line per pair, blank separated : the reaction ligand, the two compounds and the pair type,
//! for example `R00010 C00208 C00031 main`.
//! Molecules of compounds are read in a directory of MOL files named `<compound>.mol`.

use std::collections::BTreeSet;
use std::path::Path;

use ahash::AHashMap;
use anyhow::anyhow;

use crate::graph::compound::{CompoundGraph, PairType};
use crate::graph::coredist::compute_core_distances;
use crate::graph::model::{GraphKind, MolGraph};

use super::molfile::read_molfile;
use super::read_lines;

/// pairs of a reaction as (compound, compound, type)
pub type ReactantPairs = Vec<(String, String, PairType)>;

/// reads a reactant pair file, pairs are grouped by reaction ligand. Blank lines are skipped.
pub fn read_rpairs(path: &Path) -> anyhow::Result<AHashMap<String, ReactantPairs>> {
    let lines = read_lines(path)?;
    let mut rpairs = AHashMap::<String, ReactantPairs>::new();
    let mut nb_pairs = 0;
    for (lineno, line) in lines.iter().enumerate() {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        if words.len() < 4 {
            return Err(anyhow!(
                "file {} line {} : expecting reaction, 2 compounds and pair type, got {:?}",
                path.display(),
                lineno + 1,
                line
            ));
        }
        rpairs.entry(words[0].to_string()).or_insert_with(Vec::new).push((
            words[1].to_string(),
            words[2].to_string(),
            PairType::from_name(words[3]),
        ));
        nb_pairs += 1;
    }
    log::info!("read {} reactant pairs of {} reactions in {}", nb_pairs, rpairs.len(), path.display());
    Ok(rpairs)
} // end of read_rpairs

/// Molecules and compound graphs built from a batch of reactions.
pub struct CompoundBatch {
    /// molecules of all compounds, numbered in increasing order of compound name
    pub molecules : Vec<MolGraph>,
    /// compound graphs, numbered consecutively
    pub compounds : Vec<CompoundGraph>,
    /// for each compound graph the position of its reaction in the input batch
    pub reactions : Vec<usize>,
}

/// Builds the compound graph of each reaction of the batch.
/// A compound whose MOL file cannot be read is reported, the reactions using it are skipped, as are graphs
/// without reaction data or without compound.
pub fn load_compound_batch(
    reactions: &[MolGraph],
    rpairs: &AHashMap<String, ReactantPairs>,
    moldir: &Path,
) -> CompoundBatch {
    let cpu_start = cpu_time::ProcessTime::now();
    let sys_start = std::time::SystemTime::now();
    //
    let ligands: BTreeSet<&str> = reactions
        .iter()
        .filter_map(|r| match r.get_kind() {
            GraphKind::Reaction(info) => Some(info.reactants.iter().chain(info.products.iter())),
            GraphKind::Molecule => None,
        })
        .flatten()
        .map(|s| s.as_str())
        .collect();
    let mut molecules = Vec::<MolGraph>::with_capacity(ligands.len());
    let mut molecule_of = AHashMap::<&str, usize>::with_capacity(ligands.len());
    for ligand in ligands {
        match read_molfile(&moldir.join(format!("{}.mol", ligand))) {
            Ok(mut molecule) => {
                compute_core_distances(&mut molecule);
                molecule.set_index(molecules.len());
                molecule_of.insert(ligand, molecules.len());
                molecules.push(molecule);
            }
            Err(e) => log::error!("compound {} : {}", ligand, e),
        }
    }
    //
    let mut compounds = Vec::<CompoundGraph>::with_capacity(reactions.len());
    let mut kept = Vec::<usize>::with_capacity(reactions.len());
    let empty = ReactantPairs::new();
    for (position, reaction) in reactions.iter().enumerate() {
        let info = match reaction.get_kind() {
            GraphKind::Reaction(info) => info,
            GraphKind::Molecule => {
                log::error!("skipping {} : not a reaction", reaction.get_name());
                continue;
            }
        };
        let side = |ligands: &[String]| -> Option<Vec<(String, usize)>> {
            ligands
                .iter()
                .map(|l| molecule_of.get(l.as_str()).map(|m| (l.clone(), *m)))
                .collect()
        };
        match (side(&info.reactants), side(&info.products)) {
            (Some(reactants), Some(products)) if !reactants.is_empty() || !products.is_empty() => {
                let pairs = rpairs.get(&info.ligand).unwrap_or(&empty);
                let mut graph = CompoundGraph::new(reaction.get_name(), &reactants, &products, pairs);
                graph.set_index(compounds.len());
                compounds.push(graph);
                kept.push(position);
            }
            _ => log::error!("skipping {} : compounds missing", reaction.get_name()),
        }
    }
    log::info!(
        "{} compound graphs on {} molecules, {} reactions skipped, sys time(s) {:.2e} cpu time(s) {:.2e}",
        compounds.len(),
        molecules.len(),
        reactions.len() - compounds.len(),
        sys_start.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.),
        cpu_start.elapsed().as_secs_f64()
    );
    CompoundBatch {
        molecules,
        compounds,
        reactions: kept,
    }
} // end of load_compound_batch

#[cfg(test)]
mod tests {

    use super::*;
    use crate::graph::BatchGraph;
    use crate::io::reaction::read_reaction;
    use crate::io::tests::temp_file;

    fn log_init_test() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    const METHANOL: &str = "METHANOL\n\n\n  2  1\n 0.0 0.0 0.0 C\n 0.0 0.0 0.0 O\n  1  2  1\n";
    const FORMALDEHYDE: &str = "FORMALDEHYDE\n\n\n  2  1\n 0.0 0.0 0.0 C\n 0.0 0.0 0.0 O\n  1  2  2\n";
    const WATER: &str = "WATER\n\n\n  1  0\n 0.0 0.0 0.0 O\n";

    fn reaction_file(name: &str, ligand: &str, equation: &str) -> std::path::PathBuf {
        let content = format!(
            "{} 1.1.1.1\n{}\n\n  2  1\n 0.0 0.0 0.0 C\n 0.0 0.0 0.0 O\n  1  2  1  1  2\n",
            ligand, equation
        );
        temp_file("rpair", name, &content)
    }

    #[test]
    fn pairs_by_reaction() {
        log_init_test();
        //
        let path = temp_file(
            "rpair",
            "rpairs.txt",
            "R00001 C00001 C00002 main\nR00001 C00003 C00002 cofac\n\nR00002 C00001 C00003 leave\n",
        );
        let rpairs = read_rpairs(&path).unwrap();
        assert_eq!(rpairs.len(), 2);
        assert_eq!(rpairs["R00001"].len(), 2);
        assert_eq!(rpairs["R00001"][1], (String::from("C00003"), String::from("C00002"), PairType::Cofac));
        assert_eq!(rpairs["R00002"][0].2, PairType::Leave);
        //
        let bad = temp_file("rpair", "bad_rpairs.txt", "R00001 C00001 main\n");
        assert!(read_rpairs(&bad).is_err());
    }

    #[test]
    fn compound_batch() {
        log_init_test();
        //
        let moldir = temp_file("rpair", "C00001.mol", METHANOL)
            .parent()
            .unwrap()
            .to_path_buf();
        temp_file("rpair", "C00002.mol", FORMALDEHYDE);
        temp_file("rpair", "C00003.mol", WATER);
        let rpairs = read_rpairs(&temp_file("rpair", "pairs.txt", "R00001 C00001 C00002 main\n")).unwrap();
        let mut reactions = vec![
            read_reaction(&reaction_file("R00001_1_f.rxn", "R00001", "C00001 => C00002 C00003")).unwrap(),
            // no MOL file for C00009
            read_reaction(&reaction_file("R00002_1_f.rxn", "R00002", "C00009 => C00002")).unwrap(),
            read_reaction(&reaction_file("R00003_1_f.rxn", "R00003", "C00003 => C00001")).unwrap(),
        ];
        for (i, r) in reactions.iter_mut().enumerate() {
            r.set_index(i);
        }
        let batch = load_compound_batch(&reactions, &rpairs, &moldir);
        assert_eq!(batch.molecules.len(), 3);
        assert_eq!(batch.molecules[2].get_name(), "C00003");
        assert_eq!(batch.reactions, vec![0, 2]);
        assert_eq!(batch.compounds.len(), 2);
        let first = &batch.compounds[0];
        assert_eq!((first.get_index(), first.get_name()), (0, "R00001_1_f"));
        // main pair and group link between products
        assert_eq!(first.nb_compounds(), 3);
        assert_eq!(first.nb_links(), 2);
        assert_eq!(batch.compounds[1].get_index(), 1);
        assert_eq!(batch.compounds[1].nb_links(), 0);
    } // end of compound_batch
} // end of mod tests
