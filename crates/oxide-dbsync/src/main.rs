//! oxide-dbsync CLI
//!
//! Compares two MySQL/MariaDB schemas and writes the SQL that brings the
//! target in line with the source.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_dbsync::output::{write_atomic, write_json};
use oxide_dbsync::{DatabaseConfig, SchemaSource, SnapshotFile, SyncConfig};
use oxide_schema::prelude::{plan, MySqlDialect, ScriptHeader};

/// Database structure synchronization for MySQL and MariaDB.
#[derive(Parser)]
#[command(name = "oxide-dbsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Credentials file with SOURCE_* and TARGET_* keys.
    #[arg(short, long, env = "DBSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Output SQL file path.
    #[arg(short, long, default_value = "sync_queries.sql")]
    output: PathBuf,

    /// SQL dialect of the generated script.
    #[arg(short, long, value_enum, default_value_t = DialectArg::Mysql)]
    dialect: DialectArg,

    /// Read the source schema from a snapshot instead of connecting.
    #[arg(long)]
    source_snapshot: Option<PathBuf>,

    /// Read the target schema from a snapshot instead of connecting.
    #[arg(long)]
    target_snapshot: Option<PathBuf>,

    /// Save both schemas as `source.json` and `target.json` in this directory.
    #[arg(long)]
    save_snapshots: Option<PathBuf>,

    /// Also write the validation report as JSON.
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Exit with an error instead of writing a script that contains
    /// destructive operations.
    #[arg(long)]
    fail_on_destructive: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Mysql,
    Mariadb,
}

impl DialectArg {
    fn dialect(self) -> MySqlDialect {
        match self {
            Self::Mysql => MySqlDialect::mysql(),
            Self::Mariadb => MySqlDialect::mariadb(),
        }
    }
}

fn side(snapshot: Option<&PathBuf>, live: Option<&DatabaseConfig>) -> anyhow::Result<SchemaSource> {
    match (snapshot, live) {
        (Some(path), _) => Ok(SchemaSource::Snapshot(SnapshotFile::new(path))),
        (None, Some(config)) => Ok(SchemaSource::Live(config.clone())),
        (None, None) => bail!("no schema source configured"),
    }
}

fn schema_sources(cli: &Cli) -> anyhow::Result<(SchemaSource, SchemaSource)> {
    let config = match (&cli.source_snapshot, &cli.target_snapshot) {
        (Some(_), Some(_)) => None,
        _ => {
            let Some(path) = &cli.config else {
                bail!(
                    "--config is required unless both --source-snapshot and --target-snapshot are given"
                );
            };
            Some(SyncConfig::load(path)?)
        }
    };

    let source = side(
        cli.source_snapshot.as_ref(),
        config.as_ref().map(|c| &c.source),
    )?;
    let target = side(
        cli.target_snapshot.as_ref(),
        config.as_ref().map(|c| &c.target),
    )?;
    Ok((source, target))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let (source, target) = schema_sources(&cli)?;
    info!(source = %source.display_name(), target = %target.display_name(), "Reading schemas");

    let (source_schema, target_schema) = tokio::try_join!(
        async {
            source
                .load()
                .await
                .with_context(|| format!("reading source {}", source.display_name()))
        },
        async {
            target
                .load()
                .await
                .with_context(|| format!("reading target {}", target.display_name()))
        },
    )?;

    if let Some(dir) = &cli.save_snapshots {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating snapshot directory {}", dir.display()))?;
        SnapshotFile::new(dir.join("source.json")).save(&source_schema)?;
        SnapshotFile::new(dir.join("target.json")).save(&target_schema)?;
    }

    let plan = plan(&source_schema, &target_schema).context("planning synchronization")?;
    println!("{}", plan.report);

    if let Some(path) = &cli.report_json {
        write_json(path, &plan.report)?;
    }

    if cli.fail_on_destructive && plan.report.requires_confirmation() {
        bail!(
            "{} destructive operation(s) found; no script written",
            plan.report.destructive.len()
        );
    }
    if plan.report.requires_confirmation() {
        warn!(
            destructive = plan.report.destructive.len(),
            "Script contains destructive operations; review before running"
        );
    }

    let header = ScriptHeader::now(source.display_name(), target.display_name());
    let script = plan.script(&cli.dialect.dialect(), &header);
    write_atomic(&cli.output, &script)?;
    info!(
        "Generated {} statement(s) in {}",
        plan.operations.len(),
        cli.output.display()
    );

    Ok(())
}
