use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rust_ids::{
    model::Event,
    storage::manager::config as storage_config,
    IdsServer, SearchCriteria, ServerConfiguration,
};

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();

    print_banner();

    let mut args = std::env::args().skip(1);
    let config_path = args
        .next()
        .or_else(|| std::env::var("IDS_CONFIG").ok())
        .context("usage: rust_ids <config.toml|config.json> <events.jsonl> (or set IDS_CONFIG / IDS_EVENTS)")?;
    let events_path = args
        .next()
        .or_else(|| std::env::var("IDS_EVENTS").ok())
        .context("no events file given (argument 2 or IDS_EVENTS)")?;

    let server = initialize_server(&config_path)?;
    replay_events(&server, &events_path).await?;
    print_summary(&server).await?;

    Ok(())
}

/// Configure logging system
fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .init();
}

/// Display system banner
fn print_banner() {
    println!("\n{}", "=".repeat(60));
    println!("    RustIDS - Application Intrusion Detection");
    println!("    Threshold & Correlation Analysis Replay");
    println!("{}", "=".repeat(60));
    println!();
}

/// Initialize detection server
fn initialize_server(config_path: &str) -> Result<IdsServer> {
    info!("Loading configuration from {}", config_path);

    let config = ServerConfiguration::load(config_path)
        .with_context(|| format!("loading configuration {}", config_path))?;

    let server = IdsServer::new(Arc::new(config), storage_config::from_env())
        .context("initializing detection server")?;

    info!("Detection server initialized successfully");
    Ok(server)
}

/// Replay a JSON-lines event file; each line is `{"client": ..., "event": {...}}`
/// or a bare event reported under its own detection system id. Timestamps are
/// shifted so the latest event lands on the current time.
async fn replay_events(server: &IdsServer, events_path: &str) -> Result<()> {
    let contents = fs::read_to_string(events_path)
        .await
        .with_context(|| format!("reading events file {}", events_path))?;

    let mut rejected = 0usize;
    let mut parsed = Vec::new();

    for (line_number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok(entry) => parsed.push((line_number + 1, entry)),
            Err(e) => {
                warn!("Skipping line {}: {}", line_number + 1, e);
                rejected += 1;
            }
        }
    }

    let shift = parsed
        .iter()
        .map(|(_, (_, event))| event.timestamp)
        .max()
        .map(|latest| Utc::now().signed_duration_since(latest))
        .unwrap_or_else(Duration::zero);

    let mut accepted = 0usize;
    for (line_number, (client, mut event)) in parsed {
        event.timestamp = event.timestamp.checked_add_signed(shift).unwrap_or(event.timestamp);
        match server.add_event(&client, event).await {
            Ok(()) => accepted += 1,
            Err(e) => {
                error!("Event on line {} failed: {}", line_number, e);
                rejected += 1;
            }
        }
    }

    info!("Replay finished: {} accepted, {} rejected", accepted, rejected);
    Ok(())
}

#[derive(serde::Deserialize)]
struct ReplayLine {
    client: String,
    event: Event,
}

fn parse_line(line: &str) -> Result<(String, Event)> {
    if let Ok(wrapped) = serde_json::from_str::<ReplayLine>(line) {
        return Ok((wrapped.client, wrapped.event));
    }
    let event: Event = serde_json::from_str(line).context("invalid event JSON")?;
    Ok((event.detection_system.detection_system_id.clone(), event))
}

/// Display replay summary
async fn print_summary(server: &IdsServer) -> Result<()> {
    let all = SearchCriteria::new();
    let attacks = server.attack_store().find_attacks(&all).await?;
    let responses = server.response_store().find_responses(&all).await?;
    let stats = server.storage().get_stats().await?;

    println!("\n{}", "=".repeat(60));
    println!("  Events stored:    {}", stats.total_events);
    println!("  Attacks detected: {}", stats.total_attacks);
    for attack in &attacks {
        println!(
            "    - {} | user {} | {} | {}",
            attack.timestamp.format("%Y-%m-%d %H:%M:%S"),
            attack.user.username,
            attack.detection_system.detection_system_id,
            attack.name()
        );
    }
    println!("  Responses issued: {}", stats.total_responses);
    for response in &responses {
        let state = if response.is_active() { "active" } else { "inactive" };
        println!(
            "    - {} | user {} | {} ({})",
            response.timestamp.format("%Y-%m-%d %H:%M:%S"),
            response.user.username,
            response.action,
            state
        );
    }
    println!("{}", "=".repeat(60));
    Ok(())
}
