//! IMP Cluster Classifier
//!
//! Reads a long-format scenario dataset, classifies every (model, scenario)
//! run against the requested clusters and writes the membership table.
//!
//! # Usage
//!
//! ```bash
//! imp_clusters --clusters HighRen,SDG,LowEnergyDemand data/scenarios.json
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use tracing::info;

use imp_clusters::frame::MetaRecord;
use imp_clusters::utils::init_logging;
use imp_clusters::{ClassifierSettings, ClusterClassifier, IamFrame};

/// Classify scenario runs into IMP clusters
#[derive(Parser, Debug)]
#[command(name = "imp_clusters")]
#[command(about = "Flag IAM scenario runs as members of IMP mitigation-pathway clusters")]
struct Args {
    /// Scenario data as a JSON array of observations
    data: PathBuf,

    /// Clusters to evaluate (comma-separated)
    #[arg(short, long, value_delimiter = ',', required = true)]
    clusters: Vec<String>,

    /// Optional YAML settings file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Definitions directory (overrides settings and environment)
    #[arg(short, long)]
    definitions: Option<PathBuf>,

    /// Write the membership table here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Classify runs in parallel
    #[arg(long)]
    parallel: bool,

    /// Log individual rule verdicts
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct MembershipReport<'a> {
    generated_at: DateTime<Utc>,
    clusters: &'a [String],
    membership: Vec<MetaRecord>,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = ClassifierSettings::load(args.settings.as_deref()).context("Failed to load settings")?;
    if let Some(dir) = args.definitions {
        settings.definitions_dir = dir;
    }

    let classifiers = args
        .clusters
        .iter()
        .map(|name| {
            settings
                .cluster_config(name)
                .map(ClusterClassifier::new)
                .with_context(|| format!("Failed to load definitions for cluster '{}'", name))
        })
        .collect::<Result<Vec<_>>>()?;

    let reader = BufReader::new(
        File::open(&args.data).with_context(|| format!("Failed to open {}", args.data.display()))?,
    );
    let mut frame = IamFrame::from_json_reader(reader).context("Failed to read scenario data")?;
    info!("Loaded {} observations across {} runs", frame.len(), frame.runs().len());

    for classifier in &classifiers {
        frame = if args.parallel {
            classifier.apply_parallel(frame)
        } else {
            classifier.apply(frame)
        }
        .with_context(|| format!("Classification failed for cluster '{}'", classifier.name()))?;
    }

    let report = MembershipReport {
        generated_at: Utc::now(),
        clusters: &args.clusters,
        membership: frame.meta().records(),
    };
    let json = serde_json::to_string_pretty(&report)?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Membership table written to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }

    Ok(())
}
