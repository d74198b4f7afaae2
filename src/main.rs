//! Epic Timeline CLI - browse saga events and characters
//!
//! A command-line client for the Epic Timeline backend. All data access goes
//! through a resilient caching layer: responses are cached with per-category
//! TTLs, failed calls are retried with exponential backoff, and endpoints
//! that keep failing are short-circuited to a static fallback catalog.

mod cache;
mod cli;
mod data;
mod health;
mod orchestrator;
mod retry;
mod transport;

use std::sync::Arc;

use clap::Parser;
use futures::FutureExt;

use cache::TtlCache;
use cli::{Cli, Command};
use data::{ApiEvent, Character, CharactersClient, EventFilterParams, EventsClient};
use health::EndpointHealth;
use orchestrator::{CacheHealthStatus, CacheOrchestrator, PreloadFn};

/// Installs the tracing subscriber; RUST_LOG overrides the -v flags
fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_events(events: &[ApiEvent], limit: usize) {
    if events.is_empty() {
        println!("No events found.");
        return;
    }

    for event in events.iter().take(limit) {
        println!(
            "{:>3}. {} [{}]",
            event.sequence_order, event.title, event.event_context.importance
        );
        println!("     {} ({})", event.location.name, event.saga.title);
        for song in &event.songs {
            println!("     track {}: {}", song.track_number, song.title);
        }
    }

    if events.len() > limit {
        println!("... and {} more (use --limit to see them)", events.len() - limit);
    }
}

fn print_character(character: &Character) {
    match &character.character_type {
        Some(character_type) => println!("{} ({})", character.name, character_type),
        None => println!("{}", character.name),
    }
    if let Some(description) = &character.description {
        println!("{}", description);
    }
    if let Some(aliases) = &character.aliases {
        println!("Aliases: {}", aliases.join(", "));
    }
    if let Some(powers) = &character.powers {
        println!("Powers: {}", powers.join(", "));
    }
    if let Some(relationships) = &character.relationships {
        println!("Relationships:");
        for rel in relationships {
            match &rel.description {
                Some(description) => {
                    println!("  {} ({}): {}", rel.character_name, rel.relationship_type, description)
                }
                None => println!("  {} ({})", rel.character_name, rel.relationship_type),
            }
        }
    }
}

fn print_health(orchestrator: &CacheOrchestrator, cache: &TtlCache) {
    let report = orchestrator.health_report();
    let status = match report.status {
        CacheHealthStatus::Healthy => "healthy",
        CacheHealthStatus::Warning => "warning",
        CacheHealthStatus::Error => "error",
    };

    println!("Status: {}", status);
    println!("Entries: {}", report.stats.total_entries);
    println!(
        "Estimated memory: {:.1} KB",
        report.stats.estimated_memory_bytes as f64 / 1024.0
    );
    println!("Hit rate: {:.1}%", report.stats.hit_rate_percent);
    println!("Miss rate: {:.1}%", report.stats.miss_rate_percent);
    println!(
        "Hot data cached: {}",
        if report.stats.hot_data_cached { "yes" } else { "no" }
    );
    if let Some(last_update) = report.stats.last_hot_update {
        println!("Last hot update: {}", last_update.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!(
        "Background refresh active: {}",
        if orchestrator.background_refresh_active() { "yes" } else { "no" }
    );
    println!("Recommendations:");
    for recommendation in &report.recommendations {
        println!("  - {}", recommendation);
    }
    println!();
    println!("{}", cache.status_summary());
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cache = Arc::new(TtlCache::new());
    let endpoint_health = Arc::new(EndpointHealth::new());

    let events_client = Arc::new(
        EventsClient::new(Arc::clone(&cache), Arc::clone(&endpoint_health))
            .with_base_url(cli.base_url.clone()),
    );
    let characters_client = Arc::new(
        CharactersClient::new(Arc::clone(&cache), Arc::clone(&endpoint_health))
            .with_base_url(cli.base_url.clone()),
    );

    let preload: PreloadFn = {
        let events_client = Arc::clone(&events_client);
        let characters_client = Arc::clone(&characters_client);
        Arc::new(move || {
            let events_client = Arc::clone(&events_client);
            let characters_client = Arc::clone(&characters_client);
            async move {
                events_client.preload_troy_data().await;
                characters_client.preload_key_characters().await;
            }
            .boxed()
        })
    };

    let orchestrator = CacheOrchestrator::new(Arc::clone(&cache), preload);
    orchestrator.initialize().await;

    match cli.command {
        Command::Events {
            location,
            saga,
            search,
            limit,
        } => {
            let params = EventFilterParams {
                location_id: location,
                saga_id: saga,
                search,
                sort_by: Some("sequenceOrder".to_string()),
                sort_dir: Some("asc".to_string()),
                ..Default::default()
            };
            let events = events_client.get_events(&params).await;
            print_events(&events, limit);
        }
        Command::Character { id } => match characters_client.get_character(id).await {
            Some(character) => print_character(&character),
            None => println!("No character with id {}", id),
        },
        Command::Health => print_health(&orchestrator, &cache),
        Command::Refresh => {
            orchestrator.force_refresh().await;
            println!("Hot data refreshed.");
            println!("{}", cache.status_summary());
        }
    }

    orchestrator.stop().await;
}
