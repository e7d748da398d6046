//! CLI module for Agora
//!
//! Provides commands:
//! - `check`: Validate a workflow file and show its routing table
//! - `run`: Dispatch one event through a workflow (dry run with the echo model)
//! - `replay`: Inspect or continue a saved conversation snapshot

use agora_core::{format_error_for_cli, Workflow, WorkflowConfig};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

pub mod check;
pub mod replay;
pub mod run;

/// Agora multi-agent orchestrator CLI
#[derive(Parser, Debug)]
#[command(name = "agora")]
#[command(about = "Event-driven multi-agent conversation orchestrator")]
#[command(version)]
pub struct Cli {
    /// Log output format (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Log line format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a workflow file
    Check {
        /// Workflow file (.yaml, .yml or .json)
        workflow: PathBuf,
    },
    /// Start a conversation and dispatch one event
    Run {
        /// Workflow file (.yaml, .yml or .json)
        workflow: PathBuf,
        /// Event name
        #[arg(short, long)]
        event: String,
        /// Event payload
        #[arg(short, long, default_value = "")]
        value: String,
        /// Parse the payload as JSON
        #[arg(long)]
        json: bool,
        /// Deliver only to this agent
        #[arg(long)]
        target: Option<String>,
        /// Write the final conversation snapshot here
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Show a saved conversation, optionally dispatching another event into it
    Replay {
        /// Snapshot file written by `run --snapshot`
        snapshot: PathBuf,
        /// Event to dispatch into the restored conversation
        #[arg(short, long)]
        event: Option<String>,
        /// Event payload
        #[arg(short, long, default_value = "")]
        value: String,
        /// Parse the payload as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Check { workflow }) => check::run(&workflow),
        Some(Commands::Run {
            workflow,
            event,
            value,
            json,
            target,
            snapshot,
        }) => {
            let payload = parse_payload(&value, json)?;
            run::run(&workflow, &event, payload, target.as_deref(), snapshot.as_deref()).await
        }
        Some(Commands::Replay {
            snapshot,
            event,
            value,
            json,
        }) => {
            let next = match event {
                Some(name) => Some((name, parse_payload(&value, json)?)),
                None => None,
            };
            replay::run(&snapshot, next).await
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Load and validate a workflow file, choosing the format by extension
pub fn load_workflow(path: &Path) -> Result<Workflow> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file {}", path.display()))?;

    let config: WorkflowConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&raw)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        _ => serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
    };

    Workflow::try_from(config).map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))
}

fn parse_payload(value: &str, json: bool) -> Result<serde_json::Value> {
    if json {
        serde_json::from_str(value).context("--value is not valid JSON")
    } else {
        Ok(serde_json::Value::String(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_yaml_and_json_workflows() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("flow.yaml");
        std::fs::write(
            &yaml,
            "agents:\n  - id: planner\n    model: m\n    subscribe: [start]\n    tools: [emit_event]\n",
        )
        .unwrap();
        let workflow = load_workflow(&yaml).unwrap();
        assert_eq!(workflow.subscriber_ids("start"), vec!["planner".to_string()]);

        let json = dir.path().join("flow.json");
        std::fs::write(
            &json,
            r#"{"agents": [{"id": "a", "model": "m"}, {"id": "a", "model": "m"}]}"#,
        )
        .unwrap();
        let err = load_workflow(&json).unwrap_err();
        assert!(err.to_string().contains("duplicate agent id"));
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload("42", false).unwrap(), serde_json::json!("42"));
        assert_eq!(parse_payload("42", true).unwrap(), serde_json::json!(42));
        assert!(parse_payload("{", true).is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "agora", "run", "flow.yaml", "--event", "start", "--value", "go",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run { event, value, .. }) => {
                assert_eq!(event, "start");
                assert_eq!(value, "go");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_cli_log_format_is_global() {
        let cli = Cli::try_parse_from(["agora", "check", "flow.yaml", "--log-format", "json"])
            .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(Cli::try_parse_from(["agora", "--log-format", "xml", "check", "f.yaml"]).is_err());
    }
}
