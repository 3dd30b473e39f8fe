use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use btindex::{BTree, BTreeError, BTreeKey, BTreeStats, DEFAULT_MIN_DEGREE};

/// Keys inserted when none are given on the command line
const SAMPLE_KEYS: [BTreeKey; 10] = [8, 9, 10, 11, 15, 16, 17, 18, 20, 23];

#[derive(Debug, Error)]
enum CliError {
    #[error("B-tree error: {0}")]
    BTree(#[from] BTreeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

/// Build a B-tree from integer keys, then traverse and search it
#[derive(Debug, Parser)]
#[command(name = "btindex", version)]
struct Args {
    /// Minimum degree t (nodes hold at most 2t - 1 keys)
    #[arg(short = 't', long, default_value_t = DEFAULT_MIN_DEGREE)]
    min_degree: usize,

    /// Keys to insert, in order
    #[arg(allow_negative_numbers = true)]
    keys: Vec<BTreeKey>,

    /// Key to look up (repeatable)
    #[arg(short, long = "search", allow_negative_numbers = true)]
    search: Vec<BTreeKey>,

    /// Verify structural invariants after loading
    #[arg(long)]
    check: bool,

    /// Print a JSON report instead of plain text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct SearchResult {
    key: BTreeKey,
    found: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    stats: BTreeStats,
    keys: Vec<BTreeKey>,
    searches: Vec<SearchResult>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> CliResult<()> {
    let mut tree = BTree::new(args.min_degree)?;

    let keys = if args.keys.is_empty() {
        SAMPLE_KEYS.to_vec()
    } else {
        args.keys
    };
    for key in keys {
        tree.insert(key);
    }

    if args.check {
        tree.validate()?;
    }

    let searches: Vec<SearchResult> = args
        .search
        .iter()
        .map(|&key| SearchResult {
            key,
            found: tree.contains(key),
        })
        .collect();

    if args.json {
        let report = Report {
            stats: tree.stats(),
            keys: tree.traverse().collect(),
            searches,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let rendered: Vec<String> = tree.traverse().map(|k| k.to_string()).collect();
    println!("The B-tree is: {}", rendered.join(" "));
    for result in &searches {
        if result.found {
            println!("{} is found", result.key);
        } else {
            println!("{} is not found", result.key);
        }
    }
    if args.check {
        println!("Invariants OK ({} keys, height {})", tree.len(), tree.height());
    }

    Ok(())
}
