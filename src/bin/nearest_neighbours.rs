//! Computes K nearest neighbours for every vertex of an adjacency-list file
//! and prints one row per vertex on stdout.
//!
//! Usage: `nearest-neighbours <MATRIX> <K> <MAPPING>`

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::FalseyValueParser;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sssp_knn::config::{THREADS_ENV, UNORDERED_ENV};
use sssp_knn::{run, KnnConfig, KnnError};

#[derive(Parser, Debug)]
#[command(name = "nearest-neighbours", version)]
#[command(about = "Truncated-Dijkstra K nearest neighbours for every graph vertex", long_about = None)]
struct Cli {
    /// Adjacency list: `<tag> <dest>,<raw_weight> ...` per line
    #[arg(value_name = "MATRIX")]
    matrix: PathBuf,

    /// Neighbours per vertex, excluding the vertex itself
    #[arg(value_name = "K")]
    k: usize,

    /// Output file for `<tag> <dense_index>` lines
    #[arg(value_name = "MAPPING")]
    mapping: PathBuf,

    /// Worker threads (0 = one per core)
    #[arg(long, env = THREADS_ENV)]
    threads: Option<usize>,

    /// Write rows as searches finish instead of by vertex index
    #[arg(long, env = UNORDERED_ENV, value_parser = FalseyValueParser::new())]
    unordered: bool,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}

fn execute(cli: &Cli) -> Result<(), KnnError> {
    let config = KnnConfig::new(cli.k).with_threads(cli.threads).with_ordered(!cli.unordered);
    let input = BufReader::new(File::open(&cli.matrix)?);
    let mapping = BufWriter::new(File::create(&cli.mapping)?);
    let stdout = io::stdout();
    let output = BufWriter::new(stdout.lock());

    let summary = run(&config, input, mapping, output)?;
    if let Some(path) = &cli.summary {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, &summary).map_err(io::Error::from)?;
        info!(path = %path.display(), "run summary written");
    }
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("nearest-neighbours: {err}");
            ExitCode::FAILURE
        }
    }
}
