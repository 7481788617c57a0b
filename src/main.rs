mod cli;
mod config;
mod error;

use clap::Parser;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::error::TouchifyError;
use touchify_sync::{EntityRecord, SnapshotLoader, SyncClient, SyncError, SyncEvent};

#[tokio::main]
async fn main() -> Result<(), TouchifyError> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "touchify=debug,touchify_sync=debug,warn"
    } else {
        "touchify=info,touchify_sync=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();

    info!("Touchify attendance sync v{}", env!("CARGO_PKG_VERSION"));

    // Handle ConfigSample immediately without loading config
    if let Some(Commands::ConfigSample { output }) = &cli.command {
        let path = output.clone().unwrap_or_else(Config::default_path);
        Config::sample().save(&path)?;
        println!("✅ Sample config written: {}", path.display());
        return Ok(());
    }

    let mut config = Config::load(cli.config_path.as_deref())?;
    config.apply_overrides(cli.host.clone(), cli.port);
    config.validate()?;

    match cli.command {
        Some(Commands::Snapshot) => handle_snapshot(&config).await,
        Some(Commands::Watch) | None => handle_watch(&config).await,
        Some(Commands::ConfigSample { .. }) => Ok(()),
    }
}

async fn handle_snapshot(config: &Config) -> Result<(), TouchifyError> {
    let loader = SnapshotLoader::from_config(&config.sync);
    let records = loader.load().await?;

    if records.is_empty() {
        println!("Roster is empty");
        return Ok(());
    }
    print_roster(&records);
    Ok(())
}

type RosterReload<'a> = Pin<Box<dyn Future<Output = Result<usize, SyncError>> + 'a>>;

async fn handle_watch(config: &Config) -> Result<(), TouchifyError> {
    info!("Snapshot: {}", config.sync.snapshot_url());
    info!("Stream:   {}", config.sync.stream_url());

    let loader = SnapshotLoader::from_config(&config.sync);
    let mut client = SyncClient::spawn(&config.sync);
    let mut events = client.events();

    // At most one roster fetch in flight; polled alongside Ctrl-C and events
    let mut reload: Option<RosterReload<'_>> = Some(Box::pin(client.load_snapshot(&loader)));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            result = finish_reload(&mut reload) => {
                reload = None;
                match result {
                    Ok(count) => info!("Roster fetched: {} records", count),
                    Err(e) => warn!(
                        "Roster fetch failed: {}. Events for unknown ids are ignored until it loads",
                        e
                    ),
                }
            }
            event = events.recv() => match event {
                Ok(SyncEvent::Connected) => {
                    println!("🟢 Gateway live");
                    let roster_empty = client.view().records.is_empty();
                    if roster_empty && config.watch.reload_empty_roster && reload.is_none() {
                        reload = Some(Box::pin(client.load_snapshot(&loader)));
                    }
                }
                Ok(event) => report(&client, &event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Display fell behind, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    drop(reload);
    client.shutdown().await;
    let view = client.view();
    info!(
        "Stopped with {}/{} present",
        view.present_count(),
        view.records.len()
    );
    Ok(())
}

async fn finish_reload(reload: &mut Option<RosterReload<'_>>) -> Result<usize, SyncError> {
    match reload {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

fn report(client: &SyncClient, event: &SyncEvent) {
    match event {
        SyncEvent::Connected => println!("🟢 Gateway live"),
        SyncEvent::Disconnected { reason } => println!("🔴 Gateway offline: {}", reason),
        SyncEvent::SnapshotLoaded { count } => println!("📋 Roster loaded: {} students", count),
        SyncEvent::RecordUpdated {
            id,
            time,
            confidence,
        } => {
            let view = client.view();
            let name = view
                .record(id)
                .map(|r| format!("{} ({}-{})", r.display_name, r.group, r.subgroup))
                .unwrap_or_else(|| id.clone());
            match confidence {
                Some(score) => println!("✅ {} [{}] present at {} (match {})", name, id, time, score),
                None => println!("✅ {} [{}] present at {}", name, id, time),
            }
        }
        SyncEvent::MarkerCleared { id } => tracing::debug!("Highlight cleared: {}", id),
    }
}

fn print_roster(records: &[EntityRecord]) {
    let name_width = records
        .iter()
        .map(|r| r.display_name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    println!(
        "{:<10} {:<name_width$} {:<6} {:<8} {:<8} {}",
        "ID", "NAME", "CLASS", "SECTION", "STATUS", "TIME"
    );
    for record in records {
        println!(
            "{:<10} {:<name_width$} {:<6} {:<8} {:<8} {}",
            record.id,
            record.display_name,
            record.group,
            record.subgroup,
            record.status.as_str(),
            record.last_event_time.as_deref().unwrap_or("-"),
        );
    }

    let present = records.iter().filter(|r| r.is_present()).count();
    println!("\n{}/{} present", present, records.len());
}
