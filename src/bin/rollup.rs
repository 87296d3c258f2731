//! Kuba Rollup command line driver
//!
//! # CLI Commands
//!
//! - `check-config` - Validate a schema/config file and print a summary
//! - `ingest` - Roll up a JSON-lines file and write the facts to stdout
//!
//! # Ingest
//!
//! Each input line is one `InputRow`:
//!
//! ```text
//! {"timestamp": 1700000000000, "fields": {"city": "NY", "bytes": 512}}
//! ```
//!
//! Rows are spread over `--threads` writers sharing one index. When the
//! index reports capacity exceeded, it is written out as JSON lines, closed,
//! and replaced by a fresh one before the row is retried.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use kuba_rollup::{Error, IncrementalIndex, InputRow, RollupConfig};

#[derive(Parser)]
#[command(name = "rollup")]
#[command(version)]
#[command(about = "Concurrent in-memory rollup of event streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a schema/config file
    CheckConfig {
        /// Path to the TOML schema/config file
        #[arg(short, long, env = "ROLLUP_SCHEMA")]
        schema: PathBuf,
    },

    /// Roll up a JSON-lines file of input rows
    Ingest {
        /// Path to the TOML schema/config file
        #[arg(short, long, env = "ROLLUP_SCHEMA")]
        schema: PathBuf,

        /// JSON-lines input, one row per line
        #[arg(short, long)]
        input: PathBuf,

        /// Number of writer threads
        #[arg(short, long, default_value_t = 1)]
        threads: usize,

        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        print_metrics: bool,
    },
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

fn load_config(path: &Path) -> Result<RollupConfig, Error> {
    let config = RollupConfig::from_file_with_env(path)?;
    config.validate()?;
    Ok(config)
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

/// Validate configuration and print summary
fn cmd_check_config(schema: &Path) -> Result<(), Error> {
    let config = load_config(schema)?;

    println!("Configuration is valid!");
    println!();
    println!("Index Settings:");
    println!("  Max rows: {}", config.index.max_row_count);
    println!("  Max bytes in memory: {}", config.index.max_bytes_in_memory);
    println!("  Concurrent add: {}", config.index.concurrent_event_add);
    println!("  Sorted facts: {}", config.index.sort_facts);
    println!();
    println!("Schema:");
    println!("  Rollup: {}", config.schema.rollup);
    println!("  Granularity: {:?}", config.schema.query_granularity);
    for dim in &config.schema.dimensions {
        println!("  Dimension: {} ({:?})", dim.name, dim.kind);
    }
    for metric in &config.schema.metrics {
        println!("  Metric: {} ({})", metric.name(), metric.type_name());
    }
    println!();
    println!("Log level: {}", config.logging.level);

    Ok(())
}

/// Running totals of one writer thread
#[derive(Debug, Default)]
struct IngestStats {
    rows: u64,
    bad_lines: u64,
    parse_warnings: u64,
}

/// Shared state of an ingest run
struct Ingest {
    config: RollupConfig,
    current: RwLock<Arc<IncrementalIndex>>,
    out: Mutex<BufWriter<io::Stdout>>,
    rotations: Mutex<u64>,
}

impl Ingest {
    fn new(config: RollupConfig) -> Result<Self, Error> {
        let index = IncrementalIndex::from_config(&config)?;
        Ok(Self {
            config,
            current: RwLock::new(Arc::new(index)),
            out: Mutex::new(BufWriter::new(io::stdout())),
            rotations: Mutex::new(0),
        })
    }

    /// Add one row, rotating the index as often as needed
    fn add(&self, row: &InputRow, stats: &mut IngestStats) -> Result<(), Error> {
        loop {
            let guard = self.current.read();
            match guard.add(row) {
                Ok(result) => {
                    stats.rows += 1;
                    stats.parse_warnings += result.parse_warnings.len() as u64;
                    return Ok(());
                },
                Err(Error::CapacityExceeded { .. }) => {
                    let full = Arc::clone(&guard);
                    drop(guard);
                    self.rotate(&full)?;
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// Persist and replace `full` unless another writer already did
    fn rotate(&self, full: &Arc<IncrementalIndex>) -> Result<(), Error> {
        // Writers hold the read lock across add(), so close() cannot race them
        let mut current = self.current.write();
        if !Arc::ptr_eq(&current, full) {
            return Ok(());
        }
        // Refreshes out_of_rows_reason
        full.can_append_row();
        info!(
            facts = full.size(),
            bytes = full.bytes_in_memory(),
            reason = full.out_of_rows_reason().unwrap_or_default(),
            "Rotating full index"
        );
        self.persist(full)?;
        full.close();
        *current = Arc::new(IncrementalIndex::from_config(&self.config)?);
        *self.rotations.lock() += 1;
        Ok(())
    }

    fn persist(&self, index: &IncrementalIndex) -> Result<(), Error> {
        let rows = index.rows(false);
        let mut out = self.out.lock();
        for row in &rows {
            serde_json::to_writer(&mut *out, row)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        debug!(rows = rows.len(), "Persisted index snapshot");
        Ok(())
    }

    fn finish(self) -> Result<(usize, u64), Error> {
        let index = self.current.read().clone();
        let facts = index.size();
        self.persist(&index)?;
        index.close();
        Ok((facts, *self.rotations.lock()))
    }
}

fn ingest_lines(ingest: &Ingest, lines: &[String]) -> Result<IngestStats, Error> {
    let mut stats = IngestStats::default();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<InputRow>(line) {
            Ok(row) => match ingest.add(&row, &mut stats) {
                Ok(()) => {},
                Err(Error::TimestampOutOfRange { timestamp, .. }) => {
                    warn!(timestamp, "Skipping row below minimum timestamp");
                    stats.bad_lines += 1;
                },
                Err(e) => return Err(e),
            },
            Err(e) => {
                warn!(error = %e, "Skipping malformed input line");
                stats.bad_lines += 1;
            },
        }
    }
    Ok(stats)
}

/// Ingest a JSON-lines file with `threads` writers
fn cmd_ingest(schema: &Path, input: &Path, threads: usize, print_metrics: bool) -> Result<(), Error> {
    let config = load_config(schema)?;
    init_tracing(&config.logging.level);

    let lines: Vec<String> = BufReader::new(File::open(input)?)
        .lines()
        .collect::<io::Result<_>>()?;
    let threads = threads.max(1);
    let chunk_size = lines.len().div_ceil(threads).max(1);
    info!(lines = lines.len(), threads, "Starting ingest");

    let ingest = Ingest::new(config)?;
    let results: Vec<Result<IngestStats, Error>> = std::thread::scope(|scope| {
        let handles: Vec<_> = lines
            .chunks(chunk_size)
            .map(|chunk| {
                let ingest = &ingest;
                scope.spawn(move || ingest_lines(ingest, chunk))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(Error::Configuration("writer thread panicked".to_string())))
            })
            .collect()
    });

    let mut total = IngestStats::default();
    for result in results {
        let stats = result?;
        total.rows += stats.rows;
        total.bad_lines += stats.bad_lines;
        total.parse_warnings += stats.parse_warnings;
    }

    let (final_facts, rotations) = ingest.finish()?;
    eprintln!(
        "Ingested {} rows ({} skipped, {} parse warnings); {} rotations, {} facts in final index",
        total.rows, total.bad_lines, total.parse_warnings, rotations, final_facts
    );

    if print_metrics {
        eprintln!("{}", kuba_rollup::metrics::gather()?);
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::CheckConfig { schema } => cmd_check_config(schema)?,
        Commands::Ingest {
            schema,
            input,
            threads,
            print_metrics,
        } => cmd_ingest(schema, input, *threads, *print_metrics)?,
    }
    Ok(())
}
