//! canonry: command-line front end.
//!
//! Every subcommand works on one state directory holding the canonical
//! directory, the graph, the review queue, the settled ledger and any
//! unacknowledged UNSAFE reports.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use canonry::{
    read_candidates, BatchId, CanonicalDirectory, CanonryError, CanonryResult, Consolidator,
    EntityType, InMemoryGraph, IngestReport, Resolver, ResolverConfig, ReviewLedger,
};

const GRAPH_FILE: &str = "graph.json";
const UNSAFE_FILE: &str = "unsafe.json";

#[derive(Parser)]
#[command(name = "canonry")]
#[command(author, version, about = "Entity resolution for canonical directories")]
#[command(propagate_version = true)]
struct Cli {
    /// State directory shared by every subcommand
    #[arg(short, long, env = "CANONRY_STATE", default_value = ".canonry")]
    state_dir: PathBuf,

    /// Resolver configuration (TOML); built-in defaults when absent
    #[arg(short, long, env = "CANONRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve candidate files (JSON Lines) against the canonical directory
    Resolve {
        /// Candidate files
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        /// Print the batch outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write one review document per entity type with pending items
    Review {
        /// Output directory (default: <state-dir>/review)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Only this entity type
        #[arg(short, long)]
        entity_type: Option<EntityType>,
    },

    /// Apply an annotated review document
    ApplyReview {
        /// Annotated document
        document: PathBuf,
    },

    /// Merge a source directory into a destination directory
    Consolidate {
        source: PathBuf,
        destination: PathBuf,

        /// Compare digests of equal-size files
        #[arg(long)]
        verify: bool,

        /// Classify only; move and delete nothing
        #[arg(long)]
        dry_run: bool,

        /// Write the JSON report here
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Acknowledge an UNSAFE batch so automated batches can resume
    Acknowledge {
        /// Batch id from the UNSAFE report
        batch_id: BatchId,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("canonry=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Everything persisted in the state directory.
struct State {
    dir: PathBuf,
    graph: Arc<InMemoryGraph>,
    directory: CanonicalDirectory,
    ledger: ReviewLedger,
    resolver: Resolver,
}

impl State {
    fn open(dir: &Path, config: Option<&Path>) -> CanonryResult<Self> {
        fs::create_dir_all(dir).map_err(|e| CanonryError::io(dir, e))?;
        let config = match config {
            Some(path) => ResolverConfig::load(path)?,
            None => ResolverConfig::default(),
        };
        let graph = Arc::new(InMemoryGraph::load(dir.join(GRAPH_FILE))?);
        let resolver = Resolver::new(config, graph.clone());
        let restored = resolver.writer().load_unsafe(dir.join(UNSAFE_FILE))?;
        if restored > 0 {
            info!(unsafe_batches = restored, "restored unacknowledged UNSAFE batches");
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            directory: CanonicalDirectory::load(dir.join(canonry::directory::DIRECTORY_FILE))?,
            ledger: ReviewLedger::open(dir)?,
            graph,
            resolver,
        })
    }

    /// Graph state and UNSAFE reports; written even when a commit failed.
    fn save_graph(&self) -> CanonryResult<()> {
        self.graph.save(self.dir.join(GRAPH_FILE))?;
        self.resolver.writer().save_unsafe(self.dir.join(UNSAFE_FILE))
    }

    fn save(&self) -> CanonryResult<()> {
        self.save_graph()?;
        self.directory.save(self.dir.join(canonry::directory::DIRECTORY_FILE))?;
        self.ledger.persist()
    }

    /// Persists after a successful step; after a failed one keeps only the
    /// graph side so the UNSAFE state survives.
    fn finish<T>(&self, result: CanonryResult<T>) -> CanonryResult<T> {
        match result {
            Ok(value) => {
                self.save()?;
                Ok(value)
            }
            Err(e) => {
                if e.is_graph() {
                    self.save_graph()?;
                }
                Err(e)
            }
        }
    }
}

fn run(cli: Cli) -> CanonryResult<()> {
    match cli.command {
        Commands::Resolve { inputs, json } => {
            let mut state = State::open(&cli.state_dir, cli.config.as_deref())?;
            cmd_resolve(&mut state, &inputs, json)
        }
        Commands::Review { out_dir, entity_type } => {
            let state = State::open(&cli.state_dir, cli.config.as_deref())?;
            let out_dir = out_dir.unwrap_or_else(|| cli.state_dir.join("review"));
            cmd_review(&state, &out_dir, entity_type.as_ref())
        }
        Commands::ApplyReview { document } => {
            let mut state = State::open(&cli.state_dir, cli.config.as_deref())?;
            cmd_apply_review(&mut state, &document)
        }
        Commands::Consolidate {
            source,
            destination,
            verify,
            dry_run,
            report,
        } => cmd_consolidate(&source, &destination, verify, dry_run, report.as_deref()),
        Commands::Acknowledge { batch_id } => {
            let state = State::open(&cli.state_dir, cli.config.as_deref())?;
            let report = state.resolver.writer().acknowledge(batch_id)?;
            state.save_graph()?;
            println!("acknowledged {} ({} canary mismatch(es))", report.batch_id, report.diffs.len());
            Ok(())
        }
    }
}

fn cmd_resolve(state: &mut State, inputs: &[PathBuf], json: bool) -> CanonryResult<()> {
    let mut ingest = IngestReport::default();
    for input in inputs {
        ingest.extend(read_candidates(input)?);
    }
    let skipped = ingest.skipped.len();

    let result = state
        .resolver
        .run_batch(ingest.candidates, &mut state.directory, &mut state.ledger);
    let outcome = state.finish(result)?;

    if json {
        let text = serde_json::to_string_pretty(&outcome).map_err(CanonryError::serialization)?;
        println!("{text}");
    } else {
        println!(
            "merged {}, created {}, queued for review {} ({} already pending), rejected {}, skipped lines {}",
            outcome.merged(),
            outcome.created(),
            outcome.queued,
            outcome.already_pending,
            outcome.rejected.len(),
            skipped
        );
        for hint in &outcome.folder_merges {
            println!(
                "folder merge suggested for '{}': {} -> {}",
                hint.canonical_name,
                hint.source.display(),
                hint.destination.display()
            );
        }
    }
    Ok(())
}

fn review_file_name(entity_type: &EntityType) -> String {
    format!("review-{}.txt", entity_type.key().replace(':', "-"))
}

fn cmd_review(state: &State, out_dir: &Path, only: Option<&EntityType>) -> CanonryResult<()> {
    fs::create_dir_all(out_dir).map_err(|e| CanonryError::io(out_dir, e))?;
    let types = match only {
        Some(t) => vec![t.clone()],
        None => state.ledger.queue().entity_types(),
    };
    if types.is_empty() {
        println!("nothing pending");
    }
    for entity_type in types {
        let path = out_dir.join(review_file_name(&entity_type));
        fs::write(&path, state.ledger.render(&entity_type)).map_err(|e| CanonryError::io(&path, e))?;
        println!(
            "{}: {} pending -> {}",
            entity_type,
            state.ledger.queue().for_type(&entity_type).len(),
            path.display()
        );
    }
    Ok(())
}

fn cmd_apply_review(state: &mut State, document: &Path) -> CanonryResult<()> {
    let text = fs::read_to_string(document).map_err(|e| CanonryError::io(document, e))?;
    let result = state
        .resolver
        .apply_review(&text, &mut state.directory, &mut state.ledger);
    let applied = state.finish(result)?;
    println!(
        "settled {}, needs clarification {}, rejected {}, rerouted to review {}, notes {}, untouched {}, unknown ids {}, malformed lines {}",
        applied.settled.len(),
        applied.review.clarifications.len(),
        applied.rejected.len(),
        applied.requeued.len(),
        applied.review.noted.len(),
        applied.review.untouched,
        applied.review.unknown.len(),
        applied.review.malformed.len()
    );
    Ok(())
}

fn cmd_consolidate(
    source: &Path,
    destination: &Path,
    verify: bool,
    dry_run: bool,
    report_path: Option<&Path>,
) -> CanonryResult<()> {
    let report = Consolidator::new()
        .verify_content(verify)
        .dry_run(dry_run)
        .consolidate(source, destination)?;
    if let Some(path) = report_path {
        report.write_json(path)?;
    }
    println!(
        "moved {}, identical {}, conflicts {}, source removed: {}",
        report.moved(),
        report.identical(),
        report.conflicts.len(),
        report.source_removed
    );
    for conflict in &report.conflicts {
        println!("CONFLICT {}: {}", conflict.relative_path.display(), conflict.reason);
    }
    Ok(())
}
