//! NATS message handlers

pub mod itinerary;
pub mod ping;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::itinerary::ItineraryEngine;
use crate::services::itinerary_cache::ItineraryCache;
use crate::services::vrp::create_solver;
use itinerary::ItineraryService;

pub const PING_SUBJECT: &str = "dispatch.ping";
pub const ITINERARY_COMPUTE_SUBJECT: &str = "dispatch.itinerary.compute";

/// How often expired cache entries are evicted
const CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Build the itinerary service from configuration
pub fn build_service(config: &Config) -> ItineraryService {
    let solver = create_solver(config.solver_backend, &config.solver);
    let engine = ItineraryEngine::new(solver, config.solver_timeout);
    match engine.solver_name() {
        Some(name) => info!("Optimal solver initialized: {}", name),
        None => info!("No optimal solver configured, optimal requests use nearest-neighbor"),
    }

    ItineraryService::new(engine, ItineraryCache::new(config.cache_ttl), config.default_speed_kmh)
}

/// Serialize a reply body, logging instead of failing
fn encode_reply<T: Serialize>(value: &T) -> Option<Vec<u8>> {
    match serde_json::to_vec(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!("Failed to serialize reply: {}", e);
            None
        }
    }
}

/// Publish a JSON reply. Errors are logged so one bad message never stops a handler loop.
pub(crate) async fn reply_json<T: Serialize>(client: &Client, reply: Subject, value: &T) {
    let Some(body) = encode_reply(value) else {
        return;
    };
    if let Err(e) = client.publish(reply, body.into()).await {
        error!("Failed to publish reply: {}", e);
    }
}

/// Start all message handlers
pub async fn start_handlers(client: Client, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let service = Arc::new(build_service(config));

    // Subscribe to all subjects
    let ping_sub = client.subscribe(PING_SUBJECT).await?;
    let compute_sub = client.subscribe(ITINERARY_COMPUTE_SUBJECT).await?;

    info!("Subscribed to {} and {}", PING_SUBJECT, ITINERARY_COMPUTE_SUBJECT);

    // Clone for each handler
    let client_ping = client.clone();
    let client_compute = client.clone();
    let service_compute = Arc::clone(&service);
    let service_cleanup = Arc::clone(&service);

    // Spawn handlers
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let compute_handle = tokio::spawn(async move {
        itinerary::handle_compute(client_compute, compute_sub, service_compute).await
    });

    let cleanup_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            service_cleanup.cache().cleanup();
        }
    });

    info!("All handlers started");

    // Wait for any handler to finish (which would indicate an error)
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = compute_handle => {
            error!("Itinerary compute handler finished: {:?}", result);
        }
        result = cleanup_handle => {
            error!("Cache cleanup task finished: {:?}", result);
        }
    }

    Ok(())
}
