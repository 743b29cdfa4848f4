//! Detset: annotation ingestion and aspect-ratio batching for detection datasets.
//!
//! Detset turns per-image annotations (Pascal VOC XML or a JSON record index)
//! into uniform records, loads boxes, labels, instance masks and semantic
//! maps into per-sample results, and groups samples into batches of images
//! with the same orientation.
//!
//! # Modules
//!
//! - [`boxes`]: Box representations and the name registry for them
//! - [`mask`]: Polygon rasterization, RLE codec and mask validation
//! - [`pipeline`]: Per-sample transforms, including [`pipeline::LoadAnnotations`]
//! - [`dataset`]: Record sources and the [`dataset::DetDataset`] materializer
//! - [`sampler`]: Index samplers and the aspect-ratio batch sampler
//! - [`config`]: Configuration structs and file loading
//! - [`error`]: Error types for detset operations

pub mod boxes;
pub mod config;
pub mod dataset;
pub mod error;
pub mod mask;
pub mod pipeline;
pub mod sampler;

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

use boxes::BoxTypeRegistry;
use dataset::{DetDataset, RecordArena};
use pipeline::LoadAnnotations;
use sampler::{AnySampler, AspectRatioBatchSampler, Sampler};

pub use error::DetError;

/// The detset CLI application.
#[derive(Parser)]
#[command(name = "detset")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log at DEBUG level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build a dataset and summarize it.
    Inspect(InspectArgs),
    /// Print the aspect-ratio batches of one epoch.
    Batches(BatchesArgs),
    /// Serialize a dataset's records to a directory.
    Pack(PackArgs),
}

#[derive(clap::Args)]
struct InspectArgs {
    /// Configuration file (.yaml, .yml or .json).
    config: PathBuf,
}

#[derive(clap::Args)]
struct BatchesArgs {
    /// Configuration file (.yaml, .yml or .json).
    config: PathBuf,

    /// Epoch number, mixed into the shuffle seed.
    #[arg(long, default_value_t = 0)]
    epoch: u64,

    /// Stop after this many batches.
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(clap::Args)]
struct PackArgs {
    /// Configuration file (.yaml, .yml or .json).
    config: PathBuf,

    /// Output directory for `data_bytes.bin` and `data_address.json`.
    out: PathBuf,
}

/// Run the detset CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), DetError> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    // A subscriber may already be installed when embedded; keep that one.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();

    match cli.command {
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Batches(args)) => run_batches(args),
        Some(Commands::Pack(args)) => run_pack(args),
        None => {
            println!("detset {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Annotation ingestion and aspect-ratio batching for detection datasets.");
            println!();
            println!("Run 'detset --help' for usage information.");
            Ok(())
        }
    }
}

fn run_inspect(args: InspectArgs) -> Result<(), DetError> {
    let config = config::load_config(&args.config)?;
    let registry = BoxTypeRegistry::with_defaults();
    let loader = LoadAnnotations::from_config(&config.loader, &registry)?;
    let dataset = DetDataset::from_config(&config.dataset)?;

    let classes = &dataset.metainfo().classes;
    let mut per_class: BTreeMap<i64, usize> = BTreeMap::new();
    let mut instances = 0usize;
    let mut ignored = 0usize;

    for idx in 0..dataset.len() {
        for label in dataset.get_cat_ids(idx)? {
            *per_class.entry(label).or_default() += 1;
        }
        if let Some(results) = dataset.prepare(idx, &loader)? {
            instances += results.instances.len();
            ignored += match &results.gt_ignore_flags {
                Some(flags) => flags.iter().filter(|&&flag| flag).count(),
                None => results.instances.iter().filter(|i| i.ignore_flag).count(),
            };
        }
    }

    println!("Records: {}", dataset.len());
    println!("Instances: {instances} ({ignored} ignored)");
    println!("Classes: {}", classes.len());
    for (label, count) in &per_class {
        let name = usize::try_from(*label)
            .ok()
            .and_then(|label| classes.get(label))
            .map_or("<unknown>", String::as_str);
        println!("  {name}: {count}");
    }
    match dataset.arena() {
        Some(arena) => println!(
            "Arena: {} bytes across {} records",
            arena.byte_len(),
            arena.len()
        ),
        None => println!("Arena: disabled"),
    }
    Ok(())
}

fn run_batches(args: BatchesArgs) -> Result<(), DetError> {
    let config = config::load_config(&args.config)?;
    let dataset = DetDataset::from_config(&config.dataset)?;

    let mut inner = AnySampler::new(dataset.len(), config.sampler.shuffle, config.sampler.seed);
    inner.set_epoch(args.epoch);
    let batch_sampler = AspectRatioBatchSampler::new(
        inner,
        &dataset,
        config.sampler.batch_size,
        config.sampler.drop_last,
    )?;

    let limit = args.limit.unwrap_or(usize::MAX);
    let mut emitted = 0usize;
    for batch in batch_sampler.iter().take(limit) {
        let batch = batch?;
        println!("{emitted}: {batch:?}");
        emitted += 1;
    }
    println!("{emitted} batches (estimated {})", batch_sampler.len());
    Ok(())
}

fn run_pack(args: PackArgs) -> Result<(), DetError> {
    let config = config::load_config(&args.config)?;
    let dataset = DetDataset::from_config(&config.dataset)?;

    let arena = match dataset.arena() {
        Some(arena) => arena.clone(),
        None => {
            let records = (0..dataset.len())
                .map(|idx| dataset.get_data_info(idx))
                .collect::<Result<Vec<_>, _>>()?;
            RecordArena::build(&records)?
        }
    };
    arena.write_to_dir(&args.out)?;

    println!(
        "Packed {} records ({} bytes) into {}",
        arena.len(),
        arena.byte_len(),
        args.out.display()
    );
    Ok(())
}
