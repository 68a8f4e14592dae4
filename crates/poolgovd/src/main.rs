//! poolgovd — the pool governor daemon.
//!
//! Runs the scaling governor against a simulated unit pool, with a
//! line-oriented control surface on stdin standing in for the external
//! config transport and power notifier:
//!
//! ```text
//! > set scale_up_pct 80      write one tunable (validated)
//! > get                      print the current config
//! > status                   print governor status + online units
//! > load 95                  steer the synthetic load (percent)
//! > suspend / resume         inject power-state events
//! > enable / disable         governor lifecycle
//! > quit
//! ```

mod sim;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use poolgov_config::ConfigStore;
use poolgov_governor::{Governor, GovernorHandle, PowerEvent};

use crate::sim::{SimManager, SimPool, SimProbe};

#[derive(Parser)]
#[command(name = "poolgovd", about = "pool scaling governor daemon")]
struct Cli {
    /// Number of present units in the simulated pool.
    #[arg(long, default_value = "4")]
    units: u32,

    /// Maximum rate of the simulated reference unit.
    #[arg(long, default_value = "1000000")]
    max_rate: u64,

    /// Initial synthetic load, percent of the max rate.
    #[arg(long, default_value = "50")]
    load: u32,

    /// Milliseconds before the first control cycle.
    #[arg(long, default_value = "1000")]
    startup_delay_ms: u64,

    /// Optional TOML file with starting tunables.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Starting tunables from `--config`. Every present field goes through the
/// store's validated setters; absent fields keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    tick_interval_ms: Option<u64>,
    min_units: Option<u64>,
    max_units: Option<u64>,
    scale_up_pct: Option<u64>,
    scale_down_pct: Option<u64>,
    cycles_to_scale_up: Option<u64>,
    cycles_to_scale_down: Option<u64>,
}

fn apply_file_config(store: &ConfigStore, path: &PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: FileConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    // max before min so a narrowed config never trips the cross-check.
    let fields = [
        ("tick_interval_ms", file.tick_interval_ms),
        ("max_units", file.max_units),
        ("min_units", file.min_units),
        ("scale_up_pct", file.scale_up_pct),
        ("scale_down_pct", file.scale_down_pct),
        ("cycles_to_scale_up", file.cycles_to_scale_up),
        ("cycles_to_scale_down", file.cycles_to_scale_down),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            store
                .set_field(field, value)
                .with_context(|| format!("invalid {field} in {}", path.display()))?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,poolgovd=debug,poolgov_governor=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let store = ConfigStore::new(cli.units);
    if let Some(path) = &cli.config {
        apply_file_config(&store, path)?;
    }

    let pool = SimPool::new(cli.units, cli.max_rate, cli.load);
    let mut governor = Governor::new(pool.manager(), pool.probe(), store.clone())
        .with_startup_delay(Duration::from_millis(cli.startup_delay_ms));

    let mut handle = Some(governor.enable()?);
    info!(units = cli.units, load = cli.load, "poolgovd running, type 'help'");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        let quit = handle_command(
                            line.trim(),
                            &store,
                            &pool,
                            &mut governor,
                            &mut handle,
                        )
                        .await;
                        if quit {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    if governor.is_enabled() {
        governor.disable().await?;
    }
    Ok(())
}

/// Execute one control-surface command. Returns `true` on `quit`.
async fn handle_command(
    line: &str,
    store: &ConfigStore,
    pool: &SimPool,
    governor: &mut Governor<SimManager, SimProbe>,
    handle: &mut Option<GovernorHandle>,
) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => {}
        Some("help") => {
            println!(
                "commands: set <field> <value> | get | status | load <pct> | \
                 suspend | resume | enable | disable | quit"
            );
        }
        Some("get") => match serde_json::to_string_pretty(&store.get()) {
            Ok(json) => println!("{json}"),
            Err(error) => println!("error: {error}"),
        },
        Some("status") => {
            match handle {
                Some(handle) => match serde_json::to_string(&handle.status()) {
                    Ok(json) => println!("{json}"),
                    Err(error) => println!("error: {error}"),
                },
                None => println!("governor disabled"),
            }
            println!("online units: {:?}, load: {}%", pool.online_units(), pool.load());
        }
        Some("set") => match (parts.next(), parts.next().map(str::parse::<u64>)) {
            (Some(field), Some(Ok(value))) => match store.set_field(field, value) {
                Ok(()) => println!("ok"),
                Err(error) => println!("rejected: {error}"),
            },
            _ => println!("usage: set <field> <value>"),
        },
        Some("load") => match parts.next().map(str::parse::<u32>) {
            Some(Ok(pct)) => {
                pool.set_load(pct);
                println!("load set to {}%", pool.load());
            }
            _ => println!("usage: load <pct>"),
        },
        Some("suspend") => send_event(handle, PowerEvent::PowerOff),
        Some("resume") => send_event(handle, PowerEvent::PowerOn),
        Some("enable") => match governor.enable() {
            Ok(new_handle) => {
                *handle = Some(new_handle);
                println!("enabled");
            }
            Err(error) => println!("error: {error}"),
        },
        Some("disable") => match governor.disable().await {
            Ok(()) => {
                *handle = None;
                println!("disabled, pool restored: {:?}", pool.online_units());
            }
            Err(error) => println!("error: {error}"),
        },
        Some("quit") | Some("exit") => return true,
        Some(other) => println!("unknown command: {other} (try 'help')"),
    }
    false
}

fn send_event(handle: &Option<GovernorHandle>, event: PowerEvent) {
    match handle {
        Some(handle) if handle.send_power_event(event) => println!("ok"),
        _ => println!("governor disabled"),
    }
}
