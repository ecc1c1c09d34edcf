//! Main CLI for planchain.
use mimalloc::MiMalloc;
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use anyhow::Result;
use clap::{value_t, App, Arg};
use planchain::init::from_precinct_json;
use planchain::recom::run::{parallel_chains, run_chain};
use planchain::recom::{RecomParams, TreeVariant};
use planchain::stats::{Ensemble, JsonlWriter, NullWriter, StatsWriter, TsvWriter};
use serde_json::{json, to_value};
use sha3::{Digest, Sha3_256};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::{fs, io};
use tracing_subscriber::EnvFilter;

/// Summarizes an ensemble for the final report line: distribution means
/// and the original plan's position in the distribution.
fn ensemble_summary(ensemble: &Ensemble) -> serde_json::Value {
    let gaps = ensemble.efficiency_gaps();
    let mean_gap = match gaps.len() {
        0 => None,
        n => Some(gaps.iter().sum::<f64>() / n as f64),
    };
    let dem = ensemble.dem_district_counts();
    let mean_dem = match dem.len() {
        0 => None,
        n => Some(dem.iter().sum::<u32>() as f64 / n as f64),
    };
    json!({
        "rounds": ensemble.len(),
        "original": to_value(&ensemble.original).unwrap(),
        "mean_efficiency_gap": mean_gap,
        "mean_dem_districts": mean_dem,
        "share_below_original": {
            "efficiency_gap": ensemble.rank_of_original(|s| s.efficiency_gap),
            "dem_districts": ensemble.rank_of_original(|s| s.dem_districts as f64),
        },
    })
}

fn main() -> Result<()> {
    let matches = App::new("planchain")
        .version("0.1.0")
        .about("ReCom Markov chain ensembles for districting plan outlier analysis")
        .arg(
            Arg::with_name("graph_json")
                .long("graph-json")
                .takes_value(true)
                .default_value("data/example.json")
                .help("The path of the precinct graph (in the precinct JSON schema)."),
        )
        .arg(
            Arg::with_name("cooling_period")
                .long("cooling-period")
                .takes_value(true)
                .default_value("50")
                .help("The number of initial steps to discard (burn-in)."),
        )
        .arg(
            Arg::with_name("rounds")
                .long("rounds")
                .takes_value(true)
                .default_value("200")
                .help("The number of plans to record into the ensemble."),
        )
        .arg(
            Arg::with_name("tol")
                .long("tol")
                .takes_value(true)
                .default_value("0.05")
                .help("The relative population tolerance (epsilon)."),
        )
        .arg(
            Arg::with_name("rng_seed")
                .long("rng-seed")
                .takes_value(true)
                .default_value("0")
                .help("The seed of the RNG used to draw proposals."),
        )
        .arg(
            Arg::with_name("max_retries")
                .long("max-retries")
                .takes_value(true)
                .default_value("1000")
                .help("The number of consecutive self-loops tolerated before aborting."),
        )
        .arg(
            Arg::with_name("variant")
                .long("variant")
                .takes_value(true)
                .default_value("ust"), // other option: rmst
        )
        .arg(
            Arg::with_name("writer")
                .long("writer")
                .takes_value(true)
                .default_value("jsonl"), // other options: jsonl-full, tsv
        )
        .arg(
            Arg::with_name("n_chains")
                .long("n-chains")
                .takes_value(true)
                .default_value("1")
                .help("The number of independent chains to run."),
        )
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .short("v")
                .help("Enables debug-level diagnostics on stderr."),
        )
        .get_matches();
    let cooling_period = value_t!(matches.value_of("cooling_period"), u64).unwrap_or_else(|e| e.exit());
    let rounds = value_t!(matches.value_of("rounds"), u64).unwrap_or_else(|e| e.exit());
    let tol = value_t!(matches.value_of("tol"), f64).unwrap_or_else(|e| e.exit());
    let rng_seed = value_t!(matches.value_of("rng_seed"), u64).unwrap_or_else(|e| e.exit());
    let max_retries = value_t!(matches.value_of("max_retries"), u64).unwrap_or_else(|e| e.exit());
    let n_chains = value_t!(matches.value_of("n_chains"), usize).unwrap_or_else(|e| e.exit());
    let graph_json = fs::canonicalize(PathBuf::from(matches.value_of("graph_json").unwrap()))?
        .into_os_string()
        .into_string()
        .unwrap();
    let variant_str = matches.value_of("variant").unwrap();
    let writer_str = matches.value_of("writer").unwrap();
    let verbose = matches.is_present("verbose");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let variant = match variant_str {
        "ust" => TreeVariant::Ust,
        "rmst" => TreeVariant::Rmst,
        bad => panic!("Parameter error: invalid variant '{}'", bad),
    };
    assert!(tol >= 0.0 && tol <= 1.0);
    assert!(n_chains >= 1);

    let (graph, mut partition, district_names) = from_precinct_json(&graph_json)?;
    let (min_pop, max_pop) =
        RecomParams::global_bounds(graph.total_pop, partition.num_dists, tol);
    let params = RecomParams {
        min_pop: min_pop,
        max_pop: max_pop,
        epsilon: tol,
        cooling_period: cooling_period,
        rounds: rounds,
        rng_seed: rng_seed,
        max_retries: max_retries,
        variant: variant,
    };

    let mut graph_file = fs::File::open(&graph_json)?;
    let mut graph_hasher = Sha3_256::new();
    io::copy(&mut graph_file, &mut graph_hasher)?;
    let graph_hash = format!("{:x}", graph_hasher.finalize());
    let meta = json!({
        "graph_path": graph_json,
        "graph_sha3": graph_hash,
        "districts": district_names,
        "tol": tol,
        "cooling_period": cooling_period,
        "rounds": rounds,
        "rng_seed": rng_seed,
        "max_retries": max_retries,
        "variant": variant_str,
        "n_chains": n_chains,
    });
    println!("{}", json!({ "meta": meta }).to_string());

    let stop = AtomicBool::new(false);
    let summaries: Vec<serde_json::Value>;
    if n_chains == 1 {
        let writer: Box<dyn StatsWriter> = match writer_str {
            "tsv" => Box::new(TsvWriter::new()),
            "jsonl" => Box::new(JsonlWriter::new(false)),
            "jsonl-full" => Box::new(JsonlWriter::new(true)),
            bad => panic!("Parameter error: invalid writer '{}'", bad),
        };
        let ensemble = run_chain(&graph, &mut partition, writer, &params, &stop)?;
        summaries = vec![ensemble_summary(&ensemble)];
    } else {
        // Interleaved per-step output from concurrent chains would be
        // unreadable; report summaries only.
        let writers: Vec<Box<dyn StatsWriter>> = (0..n_chains)
            .map(|_| Box::new(NullWriter::new()) as Box<dyn StatsWriter>)
            .collect();
        let ensembles = parallel_chains(&graph, &partition, writers, &params, &stop)?;
        summaries = ensembles.iter().map(ensemble_summary).collect();
    }
    println!("{}", json!({ "ensembles": summaries }).to_string());
    Ok(())
}
