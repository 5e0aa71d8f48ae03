//! eswire CLI
//!
//! Exports the stored documents of an Elasticsearch index by reading its
//! shard files from the local data directories. Shards are opened with
//! tantivy; Lucene-format shards written by Elasticsearch itself are not
//! readable yet.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::IgnoredAny;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use eswire::{DocumentRecord, DocumentSink, Error, Pipeline, TracingEvents, WireConfig};

#[derive(Parser)]
#[command(name = "eswire")]
#[command(version)]
#[command(
    about = "Export Elasticsearch documents straight from shard files",
    long_about = "Export Elasticsearch documents straight from shard files.\n\n\
                  Shard directories are read with tantivy. Lucene-format shards \
                  written by Elasticsearch itself cannot be read by this build."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate an index onto this node and export its documents
    ///
    /// Shards are read with tantivy, so Lucene shards written by
    /// Elasticsearch fail to open. Payloads that are not JSON are skipped
    /// and counted.
    Export {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE", env = "ESWIRE_CONFIG")]
        config: PathBuf,

        /// Index to export
        #[arg(short, long)]
        index: String,

        /// Output file (NDJSON); stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Stop after this many documents
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        limit: Option<u64>,
    },

    /// Validate configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long, value_name = "FILE", env = "ESWIRE_CONFIG")]
        config: PathBuf,
    },

    /// Generate example configuration
    Init {
        /// Output file path
        #[arg(short, long, default_value = "eswire.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; stdout carries the export
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Export {
            config,
            index,
            output,
            limit,
        } => {
            run_export(&config, &index, output.as_deref(), limit).await?;
        }
        Commands::Validate { config } => {
            validate_config(&config)?;
        }
        Commands::Init { output } => {
            generate_config(&output)?;
        }
    }

    Ok(())
}

/// Documents seen by an [`NdjsonSink`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct SinkTotals {
    written: u64,
    absent: u64,
    undecodable: u64,
}

/// Writes one JSON payload per line. Documents without a payload, or whose
/// payload is not JSON (SMILE, CBOR), are counted and skipped.
struct NdjsonSink<W: Write> {
    out: W,
    progress: Option<ProgressBar>,
    limit: Option<u64>,
    interrupted: Arc<AtomicBool>,
    totals: SinkTotals,
    error: Option<std::io::Error>,
}

impl<W: Write> NdjsonSink<W> {
    fn new(out: W, limit: Option<u64>, interrupted: Arc<AtomicBool>) -> Self {
        Self {
            out,
            progress: None,
            limit,
            interrupted,
            totals: SinkTotals::default(),
            error: None,
        }
    }

    fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Returns `false` when the payload is not JSON.
    fn write_payload(&mut self, payload: &[u8]) -> std::io::Result<bool> {
        if payload.contains(&b'\n') {
            // pretty-printed source: re-encode on one line
            match serde_json::from_slice::<serde_json::Value>(payload) {
                Ok(value) => serde_json::to_writer(&mut self.out, &value)?,
                Err(_) => return Ok(false),
            }
        } else if serde_json::from_slice::<IgnoredAny>(payload).is_err() {
            return Ok(false);
        } else {
            self.out.write_all(payload)?;
        }
        self.out.write_all(b"\n")?;
        Ok(true)
    }

    fn finish(mut self) -> std::io::Result<SinkTotals> {
        if let Some(pb) = &self.progress {
            pb.finish_with_message("Export complete");
        }
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.totals)
    }
}

impl<W: Write> DocumentSink for NdjsonSink<W> {
    fn accept(&mut self, record: DocumentRecord<'_>) -> bool {
        if let Some(pb) = &self.progress {
            if pb.length() != Some(record.total) {
                pb.set_length(record.total);
            }
            pb.set_position(record.ordinal + 1);
        }

        match record.payload {
            Some(payload) => match self.write_payload(payload) {
                Ok(true) => self.totals.written += 1,
                Ok(false) => {
                    debug!("document {} has a non-JSON payload, skipped", record.ordinal);
                    self.totals.undecodable += 1;
                }
                Err(e) => {
                    self.error = Some(e);
                    return false;
                }
            },
            None => self.totals.absent += 1,
        }

        if self.interrupted.load(Ordering::SeqCst) {
            return false;
        }
        self.limit.map_or(true, |limit| record.ordinal + 1 < limit)
    }
}

async fn run_export(
    config_path: &Path,
    index: &str,
    output: Option<&Path>,
    limit: Option<u64>,
) -> anyhow::Result<()> {
    info!("Loading configuration from {:?}", config_path);

    let config = WireConfig::from_file(config_path)?;
    let pipeline = Pipeline::from_config(config)?;

    // Ctrl-C cancels a cluster wait at once, and a scan at the next document
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupt = Arc::new(Notify::new());
    {
        let interrupted = Arc::clone(&interrupted);
        let interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupted.store(true, Ordering::SeqCst);
                interrupt.notify_one();
            }
        });
    }

    let out: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut sink = NdjsonSink::new(out, limit, Arc::clone(&interrupted));
    if output.is_some() {
        sink = sink.with_progress(create_progress_bar());
    }
    let mut events = TracingEvents;

    let result = pipeline
        .run_until(index, &mut sink, &mut events, interrupt.notified())
        .await;
    let totals = sink.finish()?;
    let report = match result {
        Err(Error::Cancelled) => anyhow::bail!("Export of {} interrupted", index),
        other => other?,
    };

    if interrupted.load(Ordering::SeqCst) {
        warn!("Export interrupted after {} documents", report.delivered());
    }

    eprintln!("\n✅ Export Complete!");
    eprintln!("   Index:      {} ({})", report.index, report.uuid);
    eprintln!("   Shards:     {}", report.shards);
    eprintln!("   Documents:  {} of {}", report.delivered(), report.total_docs);
    eprintln!("   Written:    {}", totals.written);
    eprintln!("   No payload: {}", totals.absent);
    if totals.undecodable > 0 {
        eprintln!("   Not JSON:   {} (skipped)", totals.undecodable);
    }
    if report.deleted {
        eprintln!("   Index deleted");
    }
    eprintln!("   Duration:   {:.2}s", report.duration_secs);
    eprintln!("   Throughput: {:.0} docs/sec", report.throughput());

    Ok(())
}

fn validate_config(config_path: &Path) -> anyhow::Result<()> {
    info!("Validating configuration from {:?}", config_path);

    let config = WireConfig::from_file(config_path)?;
    config.validate()?;

    println!("✅ Configuration is valid!");
    println!("   Cluster:   {}", config.cluster.url);
    println!("   Data dirs: {:?}", config.data_dirs);
    println!(
        "   Routing:   {}={}",
        config.relocation.setting_key(),
        config.relocation.node_attr_value
    );
    println!(
        "   Node id:   {}",
        config
            .relocation
            .node_id
            .as_deref()
            .unwrap_or("(not set, placement unconfirmed)")
    );

    Ok(())
}

fn generate_config(output: &Path) -> anyhow::Result<()> {
    std::fs::write(output, EXAMPLE_CONFIG)?;
    println!("✅ Generated configuration: {:?}", output);
    println!(
        "   Edit the file and run: eswire export --config {:?} --index <INDEX>",
        output
    );

    Ok(())
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}

const EXAMPLE_CONFIG: &str = r#"# eswire configuration
cluster:
  url: http://127.0.0.1:9200
  # username: elastic
  # password: changeme
  # api_key: base64-encoded-key
  request_timeout_secs: 30
  merge_timeout_secs: 21600

# Elasticsearch path.data of this node
data_dirs:
  - /var/lib/elasticsearch

relocation:
  # must match node.attr.<key>: <value> in this node's elasticsearch.yml
  node_attr_key: eswire
  node_attr_value: yup
  # node_id: id-of-this-node  # from GET _nodes/_local; confirms placement
  explicit_reroute: false

poll:
  interval_secs: 5
  max_attempts: 8640

store:
  payload_field: _source

options:
  delete_after_export: false
"#;
