//! Datatrace: content-addressed dataset versioning with an experiment ledger.
//!
//! Datasets are versioned by content. Adding a file or directory hashes it
//! (SHA-256), copies it into immutable storage keyed by that hash, and
//! records it in an embedded SQLite catalog. Experiments are logged
//! against a dataset version, and every action taken on a dataset can be
//! appended to a usage audit trail.
//!
//! # Guarantees
//!
//! - **Idempotent adds**: identical content resolves to one catalog row and
//!   one stored copy, whatever its source path.
//! - **Copy before register**: a catalog row never points at bytes that
//!   are not fully in place.
//! - **No silent prefix matches**: a version id matching more than one
//!   dataset is an error, never "first match".
//! - **Append-only history**: experiments and usage events are never
//!   updated or deleted.
//!
//! # Store layout
//!
//! ```text
//! <root>/
//!   datatrace.toml          optional configuration
//!   catalog.db              datasets, experiments, links, usage events
//!   catalog.events.jsonl    one line per catalog operation
//!   objects/<hash>/...      immutable dataset content
//!   tmp/                    staging area for in-flight copies
//! ```
//!
//! # Examples
//!
//! ```bash
//! datatrace add data/train.csv --meta note=baseline
//! datatrace experiment log --name e1 --dataset 3f2a9c1b --param lr=0.01 --metric accuracy=0.9
//! datatrace track 3f2a9c1b "used in training"
//! datatrace metric accuracy --format json
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: configuration, errors, hashing, the catalog and its broker
//! - [`plugins`]: version store, experiment ledger, usage log, metric queries
//! - [`api`]: the function surface front ends call

pub mod api;
pub mod core;
pub mod plugins;

use crate::core::catalog::{Catalog, Dataset, Experiment, UsageEvent};
use crate::core::config::Config;
use crate::core::error::DatatraceError;
use crate::core::scalar;
use crate::plugins::experiments::{self, ExperimentLedger};
use crate::plugins::metrics::{self, MetricQuery};
use crate::plugins::usage::{self, UsageAuditLog};
use crate::plugins::versions::{self, VersionStore};

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "datatrace",
    version = env!("CARGO_PKG_VERSION"),
    about = "Dataset versioning and experiment tracking"
)]
struct Cli {
    /// Store root (defaults to $DATATRACE_ROOT, then ./datastore).
    #[clap(long, global = true)]
    root: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, global = true, default_value = "text")]
    format: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the store layout and catalog
    Init,
    /// Version a file or directory
    Add {
        path: PathBuf,
        /// Metadata entry as key=value (repeatable)
        #[clap(long = "meta")]
        meta: Vec<String>,
    },
    /// List versioned datasets, newest first
    List,
    /// Show one dataset by version id or hash prefix
    Show { dataset: String },
    /// Re-hash stored content against the catalog
    Verify,
    /// Experiment ledger
    Experiment(ExperimentCli),
    /// Record an action taken against a dataset
    Track { dataset: String, action: String },
    /// Show usage events (for one dataset, or all)
    Usage { dataset: Option<String> },
    /// Metric values across experiments, oldest first
    Metric { name: String },
    /// Experiments logged per day
    Activity,
    /// Print subsystem schemas
    Schema {
        /// Optional: filter by subsystem name
        #[clap(long)]
        subsystem: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct ExperimentCli {
    #[clap(subcommand)]
    command: ExperimentCommand,
}

#[derive(Subcommand, Debug)]
enum ExperimentCommand {
    /// Log a run against a dataset version
    Log {
        #[clap(long)]
        name: String,
        /// Version id or hash prefix
        #[clap(long)]
        dataset: String,
        /// Parameter as key=value (repeatable)
        #[clap(long = "param")]
        params: Vec<String>,
        /// Metric as key=value (repeatable)
        #[clap(long = "metric")]
        metrics: Vec<String>,
    },
    /// List experiments, newest first
    List {
        /// Only experiments linked to this dataset
        #[clap(long)]
        dataset: Option<String>,
    },
    /// Show one experiment
    Show { id: i64 },
    /// Link an experiment to an additional dataset version
    Link { id: i64, dataset: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    fn parse(s: &str) -> Result<Self, DatatraceError> {
        match s {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(DatatraceError::InvalidArgument(format!(
                "unknown format '{}', expected text or json",
                other
            ))),
        }
    }
}

pub fn run() -> Result<(), DatatraceError> {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format)?;

    if let Command::Schema { subsystem } = &cli.command {
        return print_schema(subsystem.as_deref());
    }

    let root = Config::resolve_root(cli.root);
    let catalog = Catalog::open_at(&root)?;

    match cli.command {
        Command::Init => {
            let out = serde_json::json!({
                "root": catalog.root().display().to_string(),
                "catalog": catalog.db_path().display().to_string(),
                "schema_version": catalog.schema_version()?,
            });
            emit(format, &out, || {
                println!(
                    "{} catalog ready at {}",
                    "●".bright_green(),
                    catalog.db_path().display().to_string().bright_white()
                );
            })
        }
        Command::Add { path, meta } => {
            let metadata = parse_meta(&meta)?;
            let version_id = VersionStore::new(&catalog).add(&path, metadata)?;
            emit(format, &serde_json::json!({ "version_id": version_id }), || {
                println!("Dataset added → version {}", version_id.green());
            })
        }
        Command::List => {
            let datasets = VersionStore::new(&catalog).list()?;
            emit(format, &datasets, || print_datasets(&datasets))
        }
        Command::Show { dataset } => {
            let d = VersionStore::new(&catalog).get(&dataset)?;
            emit(format, &d, || print_datasets(std::slice::from_ref(&d)))
        }
        Command::Verify => {
            let report = VersionStore::new(&catalog).verify()?;
            emit(format, &report, || {
                if report.is_clean() {
                    println!(
                        "{} {} datasets verified",
                        "✓".bright_green(),
                        report.checked
                    );
                } else {
                    for f in &report.failures {
                        println!("{} {}", "✗".bright_red(), f);
                    }
                }
            })?;
            if report.is_clean() {
                Ok(())
            } else {
                Err(DatatraceError::IntegrityViolation(format!(
                    "{} of {} datasets failed verification",
                    report.failures.len(),
                    report.checked
                )))
            }
        }
        Command::Experiment(exp) => run_experiment(&catalog, format, exp.command),
        Command::Track { dataset, action } => {
            UsageAuditLog::new(&catalog).track(&dataset, &action)?;
            emit(format, &serde_json::json!({ "status": "ok" }), || {
                println!("Dataset usage tracked");
            })
        }
        Command::Usage { dataset } => {
            let log = UsageAuditLog::new(&catalog);
            let events = match dataset {
                Some(d) => log.for_dataset(&d)?,
                None => log.all()?,
            };
            emit(format, &events, || print_usage(&events))
        }
        Command::Metric { name } => {
            let points = MetricQuery::new(&catalog).series(&name)?;
            emit(format, &points, || {
                if points.is_empty() {
                    println!("{}", format!("No experiment has metric '{}'", name).yellow());
                }
                for p in &points {
                    println!("{:<24} {}", p.label, p.value);
                }
            })
        }
        Command::Activity => {
            let days = MetricQuery::new(&catalog).experiments_per_day()?;
            emit(format, &days, || {
                for d in &days {
                    println!("{}  {}", d.date, d.experiments);
                }
            })
        }
        Command::Schema { .. } => Ok(()),
    }
}

fn run_experiment(
    catalog: &Catalog,
    format: OutputFormat,
    command: ExperimentCommand,
) -> Result<(), DatatraceError> {
    let ledger = ExperimentLedger::new(catalog);
    match command {
        ExperimentCommand::Log {
            name,
            dataset,
            params,
            metrics,
        } => {
            let params = scalar::parse_pairs(&params)?;
            let metrics = scalar::parse_pairs(&metrics)?;
            let id = ledger.log(&name, &dataset, params, metrics)?;
            emit(format, &serde_json::json!({ "experiment_id": id }), || {
                println!("Experiment logged → id {}", id.to_string().green());
            })
        }
        ExperimentCommand::List { dataset } => {
            let experiments = match dataset {
                Some(d) => ledger.for_dataset(&d)?,
                None => ledger.history()?,
            };
            emit(format, &experiments, || print_experiments(&experiments))
        }
        ExperimentCommand::Show { id } => {
            let e = ledger.get(id)?;
            emit(format, &e, || print_experiments(std::slice::from_ref(&e)))
        }
        ExperimentCommand::Link { id, dataset } => {
            ledger.link(id, &dataset)?;
            emit(format, &serde_json::json!({ "status": "ok" }), || {
                println!("Experiment {} linked to {}", id, dataset);
            })
        }
    }
}

fn parse_meta(meta: &[String]) -> Result<Option<BTreeMap<String, String>>, DatatraceError> {
    if meta.is_empty() {
        return Ok(None);
    }
    let mut out = BTreeMap::new();
    for entry in meta {
        let (k, v) = entry.split_once('=').ok_or_else(|| {
            DatatraceError::InvalidArgument(format!("expected key=value, got '{}'", entry))
        })?;
        out.insert(k.trim().to_string(), v.trim().to_string());
    }
    Ok(Some(out))
}

fn emit<T: Serialize + ?Sized>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(),
) -> Result<(), DatatraceError> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(),
    }
    Ok(())
}

fn print_schema(subsystem: Option<&str>) -> Result<(), DatatraceError> {
    let mut schemas = BTreeMap::new();
    schemas.insert("versions", versions::schema());
    schemas.insert("experiments", experiments::schema());
    schemas.insert("usage", usage::schema());
    schemas.insert("metrics", metrics::schema());

    let out = match subsystem {
        Some(name) => schemas
            .remove(name)
            .ok_or_else(|| DatatraceError::NotFound(format!("subsystem '{}'", name)))?,
        None => serde_json::to_value(&schemas)?,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_datasets(datasets: &[Dataset]) {
    if datasets.is_empty() {
        println!("{}", "No datasets found".yellow());
        return;
    }
    println!(
        "{:<10} {:<9} {:>8} {:>8}  {:<24}  {}",
        "VERSION".bold(),
        "KIND".bold(),
        "ROWS".bold(),
        "COLS".bold(),
        "CREATED".bold(),
        "SOURCE".bold()
    );
    for d in datasets {
        println!(
            "{:<10} {:<9} {:>8} {:>8}  {:<24}  {}",
            d.version_id.cyan(),
            d.kind.as_str(),
            d.row_count,
            d.column_count,
            d.created_at.green(),
            d.source_path
        );
    }
}

fn print_experiments(experiments: &[Experiment]) {
    if experiments.is_empty() {
        println!("{}", "No experiments logged".yellow());
        return;
    }
    for e in experiments {
        let fmt_map = |m: &scalar::ScalarMap| {
            m.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "{:>5}  {:<20} {}  {}",
            e.id.to_string().cyan(),
            e.name.bright_white(),
            &e.dataset_ref[..e.dataset_ref.len().min(8)],
            e.created_at.green()
        );
        println!("       params:  {}", fmt_map(&e.params));
        println!("       metrics: {}", fmt_map(&e.metrics));
    }
}

fn print_usage(events: &[UsageEvent]) {
    if events.is_empty() {
        println!("{}", "No usage recorded".yellow());
        return;
    }
    for ev in events {
        println!(
            "{}  {}  {}",
            ev.created_at.green(),
            &ev.dataset_ref[..ev.dataset_ref.len().min(8)],
            ev.action
        );
    }
}
