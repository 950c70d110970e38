//! an executable computing a kernel matrix on a batch of reaction (or MOL) files.
//! example usage:
//! mechkernel --type MMECH --mode nontot --lambda 0.9 --weighting exp --alpha 2 --maxlen 10 --normalize --out res data/*.rxn
//! mechkernel --type SG --op minnorm --maxlen 6 --mol data/*.mol
//! mechkernel --type EMECH --weighting dif --beta 0.5 --start 0 --end 100 data/*.rxn
//! mechkernel --type RGK --lambda 0.5 --rpairs data/rpairs.txt --moldir data/mol --normalize data/*.rxn
//!
//! Kernel types are MMECH (marginal), EMECH (enumerative), SG (subgraphs), WK (walks), RWK (random walks),
//! SP (shortest paths) and RGK (reaction graphs). RGK reads the reactant pairs of reactions in the --rpairs file
//! and the MOL files of their compounds in the --moldir directory.
//! The kernel matrix is dumped as tab separated lower triangle in `<out>/<kernel name>.kernel`,
//! a summary of the graphs read in `<out>/<kernel name>.graphs.tsv`.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::anyhow;
use clap::{Arg, ArgMatches, Command};

use mechkernel::prelude::*;

/// value of an option, default if absent
fn parse_value<T: FromStr>(matches: &ArgMatches, name: &str, default: T) -> anyhow::Result<T> {
    match matches.value_of(name) {
        Some(str) => str
            .parse::<T>()
            .map_err(|_| anyhow!("could not parse argument {} : {}", name, str)),
        None => Ok(default),
    }
}

fn parse_kernel_params(matches: &ArgMatches) -> anyhow::Result<KernelParams> {
    log::debug!("in parse_kernel_params");
    let default = KernelParams::default();
    //
    let lambda = parse_value(matches, "lambda", default.lambda)?;
    let epsilon = parse_value(matches, "epsilon", default.epsilon)?;
    let maxlen = parse_value(matches, "maxlen", default.maxlen)?;
    let mode = match matches.value_of("mode") {
        Some("walks") | None => SequenceMode::Walks,
        Some("nontot") => SequenceMode::NonTottering,
        Some("paths") => SequenceMode::Paths,
        Some(other) => return Err(anyhow!("unknown mode {}, expecting walks, nontot or paths", other)),
    };
    let weighting = match matches.value_of("weighting") {
        Some("exp") | None => Weighting::Exponential {
            alpha: parse_value(matches, "alpha", 1.)?,
        },
        Some("log") => Weighting::Logistic {
            beta: parse_value(matches, "beta", f64::MAX)?,
        },
        Some("dif") => {
            let beta = parse_value::<f64>(matches, "beta", f64::NAN)?;
            if !beta.is_finite() {
                return Err(anyhow!("diffusion weighting needs a finite --beta"));
            }
            Weighting::Diffusion { beta }
        }
        Some(other) => return Err(anyhow!("unknown weighting {}, expecting exp, log or dif", other)),
    };
    let operation = match matches.value_of("op") {
        Some("dot") | None => KernelOperation::Dot,
        Some("ind") => KernelOperation::Indicator,
        Some("min") => KernelOperation::Min,
        Some("minnorm") => KernelOperation::MinNormalized,
        Some(other) => return Err(anyhow!("unknown operation {}, expecting dot, ind, min or minnorm", other)),
    };
    //
    let mut params = KernelParams::new(lambda, weighting, epsilon, maxlen, mode);
    params.node_match = !matches.is_present("nonodematch");
    params.edge_match = matches.is_present("edgematch");
    params.reduced = matches.is_present("reduced");
    params.normalize = matches.is_present("normalize");
    params.partial_norm = matches.is_present("partialnorm");
    params.operation = operation;
    params.check()?;
    Ok(params)
} // end of parse_kernel_params

// reaction graph kernel : compound graphs of the reactions, the reactions kept are returned renumbered
fn compound_matrix(
    matches: &ArgMatches,
    params: &KernelParams,
    reactions: Vec<MolGraph>,
    rows: std::ops::Range<usize>,
) -> anyhow::Result<(KernelMatrix, String, Vec<MolGraph>)> {
    let rpairs = match matches.value_of("rpairs") {
        Some(path) => read_rpairs(Path::new(path))?,
        None => return Err(anyhow!("the reaction graph kernel needs a --rpairs file")),
    };
    let moldir = Path::new(matches.value_of("moldir").unwrap_or("."));
    let batch = load_compound_batch(&reactions, &rpairs, moldir);
    if batch.compounds.is_empty() {
        return Err(anyhow!("no compound graph could be built"));
    }
    let mut kernel = ReactionGraphKernel::new(params, &batch.molecules)?;
    let matrix = KernelMatrix::build(&mut kernel, &batch.compounds, rows, params.normalize)?;
    let kept = batch
        .reactions
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let mut reaction = reactions[*r].clone();
            reaction.set_index(i);
            reaction
        })
        .collect();
    Ok((matrix, kernel.get_name(), kept))
} // end of compound_matrix

fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let ktype = KernelType::from_str(matches.value_of("type").unwrap_or("MMECH"))?;
    let params = parse_kernel_params(matches)?;
    let format = if matches.is_present("mol") {
        FileFormat::Mol
    } else {
        FileFormat::Reaction
    };
    let files: Vec<PathBuf> = match matches.values_of("files") {
        Some(values) => values.map(PathBuf::from).collect(),
        None => return Err(anyhow!("no input file")),
    };
    if ktype == KernelType::ReactionGraph && format == FileFormat::Mol {
        return Err(anyhow!("the reaction graph kernel needs reaction files"));
    }
    log::info!("{} input files, format {:?}", files.len(), format);
    //
    let graphs = load_batch(&files, format);
    if graphs.is_empty() {
        return Err(anyhow!("no graph could be read"));
    }
    let start = parse_value(matches, "start", 0usize)?;
    let end = parse_value(matches, "end", graphs.len())?;
    if start >= end {
        return Err(anyhow!("empty row range {}..{}", start, end));
    }
    // normalization needs the diagonal of all rows before start
    if params.normalize && start > 0 {
        return Err(anyhow!("--normalize needs rows starting at 0"));
    }
    //
    let (matrix, mut basename, graphs) = if ktype == KernelType::ReactionGraph {
        compound_matrix(matches, &params, graphs, start..end)?
    } else {
        let mut kernel = build_kernel(ktype, &params)?;
        let matrix = KernelMatrix::build(kernel.as_mut(), &graphs, start..end, params.normalize)?;
        (matrix, kernel.get_name(), graphs)
    };
    //
    if start > 0 || end < graphs.len() {
        basename.push_str(&format!("-rows{}-{}", start, end));
    }
    let directory = Path::new(matches.value_of("out").unwrap_or("."));
    std::fs::create_dir_all(directory)?;
    let output = Output::new(directory, &Some(basename));
    let matrix_path = output.dump_matrix(&matrix)?;
    let summary_path = output.dump_summary(&graphs)?;
    log::info!("kernel written in {}, graphs in {}", matrix_path.display(), summary_path.display());
    Ok(())
} // end of run

pub fn main() {
    //
    env_logger::Builder::from_default_env().init();
    log::info!("logger initialized");
    //
    let matches = Command::new("mechkernel")
        .arg_required_else_help(true)
        .arg(Arg::new("files")
            .takes_value(true)
            .multiple_values(true)
            .required(true)
            .help("reaction or MOL files"))
        .arg(Arg::new("type")
            .long("type")
            .takes_value(true)
            .help("MMECH, EMECH, SG, WK, RWK, SP or RGK, default MMECH"))
        .arg(Arg::new("mode")
            .long("mode")
            .takes_value(true)
            .help("walks, nontot or paths, default walks"))
        .arg(Arg::new("lambda")
            .long("lambda")
            .takes_value(true)
            .help("length decay or continuation probability, default 0.9"))
        .arg(Arg::new("weighting")
            .long("weighting")
            .takes_value(true)
            .help("exp, log or dif, default exp"))
        .arg(Arg::new("alpha")
            .long("alpha")
            .takes_value(true)
            .help("exponential weighting base, default 1"))
        .arg(Arg::new("beta")
            .long("beta")
            .takes_value(true)
            .help("logistic steepness or diffusion decay"))
        .arg(Arg::new("epsilon")
            .long("epsilon")
            .takes_value(true)
            .help("relative increase stopping iterations, default 1e-4"))
        .arg(Arg::new("maxlen")
            .long("maxlen")
            .takes_value(true)
            .help("maximal number of atoms of walks, paths or subgraphs, default 20"))
        .arg(Arg::new("op")
            .long("op")
            .takes_value(true)
            .help("subgraph count combination : dot, ind, min or minnorm, default dot"))
        .arg(Arg::new("reduced").long("reduced").help("exclude pairs mixing core and non core atoms"))
        .arg(Arg::new("edgematch").long("edgematch").help("pair only bonds of same type"))
        .arg(Arg::new("nonodematch").long("nonodematch").help("pair atoms whatever their symbol"))
        .arg(Arg::new("normalize").long("normalize").help("cosine normalization of the matrix"))
        .arg(Arg::new("partialnorm").long("partialnorm").help("normalize each walk length"))
        .arg(Arg::new("mol").long("mol").help("input files are MOL files"))
        .arg(Arg::new("rpairs")
            .long("rpairs")
            .takes_value(true)
            .help("reactant pair file, for RGK"))
        .arg(Arg::new("moldir")
            .long("moldir")
            .takes_value(true)
            .help("directory of compound MOL files, for RGK, default ."))
        .arg(Arg::new("start")
            .long("start")
            .takes_value(true)
            .help("first row computed, default 0"))
        .arg(Arg::new("end")
            .long("end")
            .takes_value(true)
            .help("row after the last one computed, default number of graphs"))
        .arg(Arg::new("out")
            .long("out")
            .takes_value(true)
            .help("output directory, default ."))
    .get_matches();
    //
    if let Err(e) = run(&matches) {
        log::error!("mechkernel failed : {:?}", e);
        eprintln!("mechkernel failed : {}", e);
        std::process::exit(1);
    }
} // end of main
