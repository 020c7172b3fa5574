//! Command-line interface for crewscope.
//!
//! Provides commands for classifying tool payloads, deriving the agent panel
//! from an execution log, listing the detection chain and showing the
//! resolved configuration.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::config;
use crate::core::{AgentTracker, Detector, EventLog, RouteOptions, Router};
use crate::domain::{AgentPanel, DataType, Manifest};
use crate::renderers::{default_registry, FALLBACK_COMPONENT};

/// crewscope - Execution-stream interpretation for multi-agent jobs
#[derive(Parser, Debug)]
#[command(name = "crewscope")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify a tool payload and render it
    Detect {
        /// Payload file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Force a data type instead of detecting one
        #[arg(long = "as", value_name = "TYPE")]
        as_type: Option<DataType>,

        /// Name of the tool that produced the payload
        #[arg(short, long)]
        tool: Option<String>,

        /// Print the detection result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Derive per-agent status from a JSONL event log
    Agents {
        /// Event log (one JSON event per line)
        #[arg(short, long)]
        events: PathBuf,

        /// Crew manifest (YAML or JSON); defaults to the configured manifest
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Print the panel as JSON
        #[arg(long)]
        json: bool,

        /// Keep watching the log and print the panel as events arrive
        #[arg(short, long)]
        follow: bool,

        /// Poll interval for --follow
        #[arg(long, default_value = "1000")]
        interval_ms: u64,
    },

    /// List data types in detection priority order
    Types,

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Detect {
                input,
                as_type,
                tool,
                json,
            } => detect_payload(input, as_type, tool.as_deref(), json),
            Commands::Agents {
                events,
                manifest,
                json,
                follow,
                interval_ms,
            } => {
                let manifest = load_manifest(manifest)?;
                if follow {
                    follow_agents(&events, manifest.as_ref(), json, interval_ms).await
                } else {
                    show_agents(&events, manifest.as_ref(), json).await
                }
            }
            Commands::Types => list_types(),
            Commands::Config => show_config(),
        }
    }
}

/// Classify and render one payload
fn detect_payload(
    input_file: Option<PathBuf>,
    as_type: Option<DataType>,
    tool: Option<&str>,
    json: bool,
) -> Result<()> {
    let input = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No input provided. Use --input <file> or pipe to stdin");
    };

    let payload = Value::String(input);
    let cfg = config::config()?;
    let mut router = Router::with_capacity(default_registry()?, cfg.cache_capacity);
    let options = RouteOptions {
        override_type: as_type,
        tool_name: tool,
    };

    if json {
        let resolution = router.resolve_with(&payload, options);
        match resolution.detection() {
            Some(detection) => println!("{}", serde_json::to_string_pretty(detection)?),
            None => println!("null"),
        }
        return Ok(());
    }

    if as_type.is_none() {
        if let Err(reason) = router.detect(&payload, tool) {
            eprintln!("[Nothing to show: {}]", reason);
            return Ok(());
        }
    }

    match router.render_with(&payload, options) {
        Some(view) => {
            println!("{}", view);
            if view.component == FALLBACK_COMPONENT {
                eprintln!("\n[No renderer registered, showing generic preview]");
            }
        }
        None => eprintln!("[Nothing to show]"),
    }

    Ok(())
}

/// Manifest from the flag, or from configuration
fn load_manifest(flag: Option<PathBuf>) -> Result<Option<Manifest>> {
    let path = match flag {
        Some(path) => Some(path),
        None => config::config()?.manifest.clone(),
    };

    path.map(|p| Manifest::from_file(&p)).transpose()
}

fn new_tracker() -> Result<AgentTracker> {
    let cfg = config::config()?;
    Ok(AgentTracker::with_reserved_names(cfg.reserved_names.iter().cloned()))
}

/// Derive the panel once
async fn show_agents(events_path: &Path, manifest: Option<&Manifest>, json: bool) -> Result<()> {
    let log = EventLog::new(events_path);
    let chunk = log.read_from(0).await?;

    let mut tracker = new_tracker()?;
    tracker.extend(&chunk.events);
    print_panel(&tracker.snapshot(manifest), json)?;

    if chunk.dropped > 0 {
        eprintln!("\n[{} malformed event(s) skipped]", chunk.dropped);
    }

    Ok(())
}

/// Tail the log, folding only newly appended events
async fn follow_agents(
    events_path: &Path,
    manifest: Option<&Manifest>,
    json: bool,
    interval_ms: u64,
) -> Result<()> {
    let log = EventLog::new(events_path);
    let mut tracker = new_tracker()?;
    let mut offset = 0u64;
    let mut first = true;
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(50)));

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n[Stopped following {}]", events_path.display());
                return Ok(());
            }
        }

        let chunk = log.read_from(offset).await?;
        if chunk.next_offset < offset {
            // Log was truncated or rotated
            tracker = new_tracker()?;
        }
        offset = chunk.next_offset;

        if chunk.events.is_empty() && !first {
            continue;
        }
        first = false;

        tracker.extend(&chunk.events);
        tracing::debug!(applied = tracker.applied(), "Folded new events");
        print_panel(&tracker.snapshot(manifest), json)?;
        if !json {
            println!();
        }
    }
}

fn print_panel(panel: &AgentPanel, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(panel)?);
        return Ok(());
    }

    if panel.agents.is_empty() {
        println!("No agents observed");
        return Ok(());
    }

    println!(
        "{:<2} {:<24} {:<8} {:<21} {:<10} {}",
        "", "AGENT", "STATUS", "LAST SEEN", "TOOL MS", "ACTION"
    );
    println!("{}", "-".repeat(90));

    for agent in &panel.agents {
        let marker = if panel.active_agent_name.as_deref() == Some(agent.agent_name.as_str()) {
            "▶"
        } else {
            ""
        };
        let seen = agent
            .last_seen_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let duration = agent
            .last_tool_duration_ms
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<2} {:<24} {:<8} {:<21} {:<10} {}",
            marker,
            agent.agent_name,
            agent.status.to_string(),
            seen,
            duration,
            agent.current_action_label
        );
    }

    Ok(())
}

/// Show detection priority and registered components
fn list_types() -> Result<()> {
    let detector = Detector::default();
    let registry = default_registry()?;

    println!("{:<4} {:<14} {}", "#", "TYPE", "COMPONENT");
    println!("{}", "-".repeat(36));
    for (i, data_type) in detector.priority().into_iter().enumerate() {
        let component = registry
            .lookup(data_type)
            .map(|r| r.name().to_string())
            .unwrap_or_else(|| format!("({})", FALLBACK_COMPONENT));
        println!("{:<4} {:<14} {}", i + 1, data_type, component);
    }

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("crewscope configuration:");
    match &config.config_file {
        Some(path) => println!("  Config file: {}", path.display()),
        None => println!("  Config file: (none, using defaults)"),
    }
    println!("  Cache capacity: {}", config.cache_capacity);
    println!("  Reserved agent names: {}", config.reserved_names.join(", "));
    match &config.manifest {
        Some(path) => println!("  Manifest: {}", path.display()),
        None => println!("  Manifest: (none)"),
    }

    Ok(())
}
