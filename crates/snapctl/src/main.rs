//! snapctl - snapper snapshot control.
//!
//! Exposes the snapshot module and the baseline state as subcommands. Results
//! are printed to stdout as JSON; logs go to stderr.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::CliConfig;
use serde::Serialize;
use serde_json::Value;
use snapctl_snapshot::{
    exclude_paths, ConfigUpdate, ConfigValue, RunRequest, SnapshotKind, SnapshotModule,
    SnapshotRequest,
};
use snapctl_state::{BaselineSnapshot, SnapshotState};
use snapctl_util::log::{LogConfig, LogLevel};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(name = "snapctl")]
#[command(author, version, about = "Filesystem snapshots, diffs and undo via snapper", long_about = None)]
struct Cli {
    /// Read settings from this file instead of ~/.config/snapctl/config.json
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Snapper config to operate on [default: root]
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List snapshots
    ListSnapshots,
    /// Show one snapshot
    GetSnapshot {
        number: u32,
    },
    /// List configs with their settings
    ListConfigs,
    /// Show a config
    GetConfig {
        /// Config name [default: --config]
        name: Option<String>,
    },
    /// Change config settings
    SetConfig {
        /// Settings as KEY=VALUE; yes/no/true/false become booleans
        #[arg(required = true, value_parser = parse_key_value)]
        settings: Vec<(String, String)>,
    },
    /// Create a snapshot and print its number
    CreateSnapshot {
        /// Snapshot type: single, pre or post
        #[arg(long = "type", default_value = "single")]
        kind: SnapshotKind,
        /// Pre snapshot of a post snapshot
        #[arg(long)]
        pre_number: Option<u32>,
        #[arg(short, long)]
        description: Option<String>,
        /// Cleanup algorithm
        #[arg(long)]
        cleanup: Option<String>,
        /// Userdata as KEY=VALUE
        #[arg(short, long, value_parser = parse_key_value)]
        userdata: Vec<(String, String)>,
        /// Job to tag the snapshot with
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Delete snapshots
    DeleteSnapshot {
        #[arg(required = true)]
        numbers: Vec<u32>,
    },
    /// List files changed between two snapshots
    ChangedFiles {
        #[command(flatten)]
        interval: Interval,
    },
    /// Show unified diffs between two snapshots
    Diff {
        /// Only diff this file
        #[arg(short, long)]
        file: Option<String>,
        #[command(flatten)]
        interval: Interval,
    },
    /// Show how each changed file changed
    Status {
        #[command(flatten)]
        interval: Interval,
        /// Do not attach diffs to modified files
        #[arg(long)]
        no_diff: bool,
    },
    /// Revert changes made since a snapshot
    Undo {
        #[command(flatten)]
        interval: Interval,
        /// Leave this path (and anything below it) alone
        #[arg(short, long)]
        ignore: Vec<String>,
        /// Files to revert [default: every changed file]
        files: Vec<String>,
    },
    /// Run an operation between a pre and a post snapshot
    Run {
        /// Operation name, e.g. cmd.run
        operation: String,
        /// Operation arguments as JSON; anything else is passed as a string
        #[arg(short, long, value_parser = parse_args)]
        args: Option<Value>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        cleanup: Option<String>,
        #[arg(short, long, value_parser = parse_key_value)]
        userdata: Vec<(String, String)>,
        /// Job id for both snapshots [default: generated]
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Create a snapshot tagged as a named baseline
    CreateBaseline {
        tag: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Enforce that nothing changed since a snapshot
    Baseline {
        /// State name used in the report
        name: String,
        #[arg(short, long, conflicts_with = "tag")]
        number: Option<u32>,
        /// Use the newest snapshot with this baseline tag
        #[arg(short, long)]
        tag: Option<String>,
        #[arg(short, long)]
        ignore: Vec<String>,
        #[arg(long)]
        no_diff: bool,
        /// Report what would be undone without undoing it
        #[arg(long)]
        test: bool,
    },
    /// List operations available to `run`
    Operations,
}

/// Snapshot interval. Omitting --post compares against the live filesystem.
#[derive(clap::Args)]
struct Interval {
    /// Older snapshot [default: latest]
    #[arg(long)]
    pre: Option<u32>,
    /// Newer snapshot [default: live filesystem]
    #[arg(long)]
    post: Option<u32>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

fn parse_args(s: &str) -> Result<Value, String> {
    Ok(serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let file_config = CliConfig::load(cli.config_file.as_deref()).await?;

    init_logging(&cli, &file_config);
    debug!(config_file = ?cli.config_file, "Configuration loaded");

    let config = cli
        .config
        .clone()
        .unwrap_or_else(|| file_config.config_name().to_string());

    if let Commands::Operations = cli.command {
        let operations = snapctl_snapshot::OperationRegistry::with_builtins();
        return print_json(&operations.descriptions());
    }

    let module = Arc::new(SnapshotModule::load().await?);
    run_command(cli.command, module, &config, &file_config).await
}

fn init_logging(cli: &Cli, file_config: &CliConfig) {
    let level = cli
        .log_level
        .as_deref()
        .and_then(LogLevel::parse)
        .or(cli.verbose.then_some(LogLevel::Debug))
        .or(file_config.log_level())
        .unwrap_or_default();

    snapctl_util::log::init(LogConfig {
        level,
        include_location: cli.verbose,
    });
}

async fn run_command(
    command: Commands,
    module: Arc<SnapshotModule>,
    config: &str,
    file_config: &CliConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::ListSnapshots => print_json(&module.list_snapshots(config).await?),
        Commands::GetSnapshot { number } => print_json(&module.get_snapshot(config, number).await?),
        Commands::ListConfigs => print_json(&module.list_configs().await?),
        Commands::GetConfig { name } => {
            print_json(&module.get_config(name.as_deref().unwrap_or(config)).await?)
        }
        Commands::SetConfig { settings } => {
            let mut update = ConfigUpdate::new();
            for (key, value) in settings {
                update.insert(key, ConfigValue::parse(&value));
            }
            module.set_config(config, &update).await?;
            print_json(&update.normalize())
        }
        Commands::CreateSnapshot {
            kind,
            pre_number,
            description,
            cleanup,
            userdata,
            job_id,
        } => {
            let mut request = SnapshotRequest {
                kind,
                pre_number,
                description,
                cleanup_algorithm: cleanup.unwrap_or_else(|| file_config.cleanup().to_string()),
                userdata: userdata.into_iter().collect(),
                job_id: None,
            };
            if let Some(job_id) = job_id {
                request = request.with_job_id(job_id);
            }
            print_json(&module.create_snapshot(config, &request).await?)
        }
        Commands::DeleteSnapshot { numbers } => {
            print_json(&module.delete_snapshots(config, &numbers).await?)
        }
        Commands::ChangedFiles { interval } => print_json(
            &module
                .changed_files(config, interval.pre, interval.post)
                .await?,
        ),
        Commands::Diff { file, interval } => print_json(
            &module
                .diff(config, file.as_deref(), interval.pre, interval.post)
                .await?,
        ),
        Commands::Status { interval, no_diff } => print_json(
            &module
                .status_with_diff(config, interval.pre, interval.post, !no_diff)
                .await?,
        ),
        Commands::Undo {
            interval,
            ignore,
            files,
        } => {
            let selected = if ignore.is_empty() && files.is_empty() {
                None
            } else if files.is_empty() {
                let changed = module
                    .changed_files(config, interval.pre, interval.post)
                    .await?;
                Some(exclude_paths(&changed, &ignore))
            } else {
                Some(exclude_paths(&files, &ignore))
            };

            let summary = module
                .undo(config, interval.pre, interval.post, selected.as_deref())
                .await?;
            print_json(&summary)
        }
        Commands::Run {
            operation,
            args,
            description,
            cleanup,
            userdata,
            job_id,
        } => {
            let mut request = RunRequest::new(operation)
                .with_config(config)
                .with_args(args.unwrap_or(Value::Null))
                .with_cleanup(cleanup.unwrap_or_else(|| file_config.cleanup().to_string()))
                .with_userdata(userdata.into_iter().collect::<HashMap<_, _>>());
            if let Some(description) = description {
                request = request.with_description(description);
            }
            if let Some(job_id) = job_id {
                request = request.with_job_id(job_id);
            }
            print_json(&module.run(&request).await?)
        }
        Commands::CreateBaseline { tag, description } => print_json(
            &module
                .create_baseline(config, &tag, description.as_deref())
                .await?,
        ),
        Commands::Baseline {
            name,
            number,
            tag,
            ignore,
            no_diff,
            test,
        } => {
            let args = BaselineSnapshot {
                name,
                number,
                tag,
                config: config.to_string(),
                include_diff: !no_diff,
                ignore,
            };
            let report = SnapshotState::new(module)
                .with_test(test)
                .baseline_snapshot(&args)
                .await;
            let failed = report.result == Some(false);
            print_json(&report)?;
            if failed {
                anyhow::bail!("{}", report.comment);
            }
            Ok(())
        }
        Commands::Operations => print_json(&module.operations().descriptions()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize result")?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("SYNC_ACL=yes").unwrap(),
            ("SYNC_ACL".to_string(), "yes".to_string())
        );
        assert_eq!(
            parse_key_value("ALLOW_USERS=").unwrap(),
            ("ALLOW_USERS".to_string(), String::new())
        );
        assert!(parse_key_value("SYNC_ACL").is_err());
        assert!(parse_key_value("=yes").is_err());
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(r#"{"cmd": "ls"}"#).unwrap()["cmd"], "ls");
        assert_eq!(parse_args("ls -l /etc").unwrap(), Value::from("ls -l /etc"));
    }

    #[test]
    fn test_interval_flags() {
        let cli = Cli::try_parse_from(["snapctl", "-c", "home", "diff", "--pre", "4", "-f", "/etc/motd"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("home"));
        let Commands::Diff { file, interval } = cli.command else {
            panic!("expected diff");
        };
        assert_eq!(file.as_deref(), Some("/etc/motd"));
        assert_eq!(interval.pre, Some(4));
        assert_eq!(interval.post, None);
    }

    #[test]
    fn test_snapshot_type_flag() {
        let cli = Cli::try_parse_from([
            "snapctl",
            "create-snapshot",
            "--type",
            "post",
            "--pre-number",
            "42",
            "-u",
            "owner=ops",
        ])
        .unwrap();
        let Commands::CreateSnapshot {
            kind,
            pre_number,
            userdata,
            ..
        } = cli.command
        else {
            panic!("expected create-snapshot");
        };
        assert_eq!(kind, SnapshotKind::Post);
        assert_eq!(pre_number, Some(42));
        assert_eq!(userdata, vec![("owner".to_string(), "ops".to_string())]);

        assert!(Cli::try_parse_from(["snapctl", "create-snapshot", "--type", "weekly"]).is_err());
    }

    #[test]
    fn test_baseline_number_conflicts_with_tag() {
        assert!(
            Cli::try_parse_from(["snapctl", "baseline", "etc", "-n", "4", "-t", "golden"]).is_err()
        );
    }
}
