//! Command-line surface.
//!
//! One-shot commands print to the given writer and return the instances that
//! failed, so the caller can report them on stderr and pick an exit status.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qbfleet_core::{fanout, find_abandoned, CategoryReconciler, InstanceFailure, InstanceRegistry};
use tokio_util::sync::CancellationToken;

use crate::output::{self, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "qbfleet", version, about = "Manage a fleet of qBittorrent instances as one")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "QBFLEET_CONFIG", default_value = "config.toml", global = true)]
    pub config: PathBuf,

    /// Output format for listings
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub output: OutputFormat,

    /// Emit logs as JSON lines
    #[arg(long, env = "QBFLEET_LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run the HTTP control API
    Serve,
    /// List all torrents, sorted by host then name
    List,
    /// List torrents that have been deleted from their tracker
    Abandoned,
    /// Show the union of categories across instances
    Categories,
    /// Create missing categories on every instance
    SyncCategories,
}

impl Command {
    /// Default log filter when RUST_LOG is unset.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            Command::Serve => "info,tower_http=debug",
            _ => "warn",
        }
    }
}

pub async fn list<W: Write>(
    registry: &InstanceRegistry,
    out: &mut W,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<Vec<InstanceFailure>> {
    let instances = registry.all().await;
    let result = fanout::list_torrents(&instances, cancel).await;

    let mut torrents = result.items;
    output::sort_torrents(&mut torrents);
    output::write_torrents(out, &torrents, format).context("Failed to write torrent list")?;
    Ok(result.failures)
}

pub async fn abandoned<W: Write>(
    registry: &InstanceRegistry,
    out: &mut W,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<Vec<InstanceFailure>> {
    let instances = registry.all().await;
    let result = find_abandoned(&instances, cancel).await;

    let mut torrents = result.items;
    output::sort_abandoned(&mut torrents);
    output::write_abandoned(out, &torrents, format)
        .context("Failed to write abandoned torrents")?;
    Ok(result.failures)
}

pub async fn categories<W: Write>(
    reconciler: &CategoryReconciler,
    out: &mut W,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<Vec<InstanceFailure>> {
    let union = reconciler.compute_union(cancel).await;
    let categories: Vec<_> = union.categories.into_values().collect();
    output::write_categories(out, &categories, format).context("Failed to write categories")?;
    Ok(union.failures)
}

pub async fn sync_categories<W: Write>(
    reconciler: &CategoryReconciler,
    out: &mut W,
    format: OutputFormat,
    cancel: &CancellationToken,
) -> Result<Vec<InstanceFailure>> {
    let report = reconciler.sync(cancel).await?;
    output::write_sync_report(out, &report, format).context("Failed to write sync report")?;
    Ok(report.skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use qbfleet_core::testing::{fixtures, MockInstance};
    use qbfleet_core::{InstanceApi, InstanceError};

    fn registry(instances: &[Arc<MockInstance>]) -> Arc<InstanceRegistry> {
        Arc::new(InstanceRegistry::from_sessions(
            instances
                .iter()
                .map(|i| Arc::clone(i) as Arc<dyn InstanceApi>),
        ))
    }

    #[test]
    fn test_parse_command_line() {
        let cli = Cli::try_parse_from([
            "qbfleet",
            "--config",
            "/etc/qbfleet.toml",
            "sync-categories",
            "-o",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/qbfleet.toml"));
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.command, Command::SyncCategories);
        assert!(!cli.log_json);
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["qbfleet", "--output", "yaml", "list"]).is_err());
    }

    #[tokio::test]
    async fn test_list_reports_failed_instances() {
        let qb1 = Arc::new(MockInstance::new("http://qb1:8080"));
        qb1.set_failure(InstanceError::ConnectionFailed("refused".to_string()))
            .await;
        let qb2 = Arc::new(MockInstance::new("http://qb2:8080"));
        for (hash, name) in [("aa", "Charlie"), ("bb", "Alpha"), ("cc", "Bravo")] {
            qb2.add_torrent(fixtures::torrent(qb2.id(), hash, name)).await;
        }

        let registry = registry(&[qb1, qb2]);
        let mut out = Vec::new();
        let failures = list(&registry, &mut out, OutputFormat::Csv, &CancellationToken::new())
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let names: Vec<&str> = text
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert_eq!(names, vec!["Alpha", "Bravo", "Charlie"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].instance.as_str(), "http://qb1:8080");
    }

    #[tokio::test]
    async fn test_sync_categories_prints_created() {
        let qb1 = Arc::new(MockInstance::new("http://qb1:8080"));
        qb1.add_category("movies", "/data/movies").await;
        let qb2 = Arc::new(MockInstance::new("http://qb2:8080"));

        let reconciler = CategoryReconciler::new(registry(&[qb1, qb2]));
        let mut out = Vec::new();
        let failures = sync_categories(
            &reconciler,
            &mut out,
            OutputFormat::Tsv,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(failures.is_empty());
        assert!(text.contains("http://qb2:8080\tmovies"));
    }

    #[tokio::test]
    async fn test_sync_categories_conflict_is_error() {
        let qb1 = Arc::new(MockInstance::new("http://qb1:8080"));
        qb1.add_category("movies", "/data/movies").await;
        let qb2 = Arc::new(MockInstance::new("http://qb2:8080"));
        qb2.set_create_error(InstanceError::CategoryConflict("movies".to_string()))
            .await;

        let reconciler = CategoryReconciler::new(registry(&[qb1, qb2]));
        let mut out = Vec::new();
        let result = sync_categories(
            &reconciler,
            &mut out,
            OutputFormat::Table,
            &CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert!(out.is_empty());
    }
}
