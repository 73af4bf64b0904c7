//! Itinerary compute handler

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ItineraryError;
use crate::services::comparison::summarize;
use crate::services::itinerary::{Itinerary, ItineraryEngine, ItineraryInput};
use crate::services::itinerary_cache::{cache_key, is_cacheable, ItineraryCache};
use crate::services::sequential_schedule::PropagationOptions;
use crate::types::{
    ErrorResponse, ItineraryRequest, ItineraryResponse, Request, Sequence, SequenceView, SuccessResponse,
    ViolationsView,
};
use super::reply_json;

/// Engine plus the caller-side cache in front of it
pub struct ItineraryService {
    engine: ItineraryEngine,
    cache: ItineraryCache,
    default_speed_kmh: f64,
}

impl ItineraryService {
    pub fn new(engine: ItineraryEngine, cache: ItineraryCache, default_speed_kmh: f64) -> Self {
        Self {
            engine,
            cache,
            default_speed_kmh,
        }
    }

    pub fn cache(&self) -> &ItineraryCache {
        &self.cache
    }

    /// Compute, or serve from cache.
    ///
    /// `use_cache = false` bypasses the cache entirely; `force` skips the read
    /// but still stores the fresh result. Requests without a start time are
    /// computed from the current clock and never cached.
    pub async fn compute(&self, request: ItineraryRequest) -> Result<ItineraryResponse, ItineraryError> {
        let speed_kmh = request.speed_kmh.unwrap_or(self.default_speed_kmh);
        let cacheable = is_cacheable(&request);
        let key = cache_key(&request, speed_kmh);

        if request.use_cache && !cacheable {
            debug!("No start time for technician {}, bypassing cache", request.technician_id);
        }

        if cacheable && !request.force {
            if let Some(mut cached) = self.cache.get(&key) {
                debug!("Cache hit for technician {}", request.technician_id);
                cached.cached = true;
                return Ok(cached);
            }
        }

        let input = ItineraryInput {
            stops: request.stops,
            start: request.start,
            start_time: request.start_time.unwrap_or_else(Utc::now),
            speed_kmh,
            algorithm: request.algorithm,
            options: PropagationOptions {
                wait_for_window_start: request.wait_for_window_start,
            },
            exclude_unlocated: request.exclude_unlocated,
        };

        let itinerary = self.engine.compute(input).await?;
        let response = build_response(request.technician_id, &itinerary);

        if cacheable {
            self.cache.insert(key, response.clone());
        }

        Ok(response)
    }
}

/// Shape an engine result into the wire response
pub fn build_response(technician_id: String, itinerary: &Itinerary) -> ItineraryResponse {
    ItineraryResponse {
        technician_id,
        as_of_timestamp: Utc::now(),
        algorithm_requested: itinerary.algorithm_requested,
        algorithm_used: itinerary.algorithm_used,
        note: itinerary.note(),
        solver: itinerary.solver_name.clone(),
        current: sequence_view(&itinerary.current),
        optimized: sequence_view(&itinerary.optimized),
        comparison: itinerary.comparison,
        violations: ViolationsView {
            current: itinerary.current.violations.clone(),
            optimized: itinerary.optimized.violations.clone(),
        },
        excluded_job_ids: itinerary.excluded_job_ids.clone(),
        cached: false,
    }
}

fn sequence_view(sequence: &Sequence) -> SequenceView {
    let summary = summarize(sequence);
    SequenceView {
        stops: sequence.stops.clone(),
        total_travel_km: summary.total_travel_distance_km,
        total_travel_minutes: summary.total_travel_minutes,
    }
}

/// Handle dispatch.itinerary.compute messages
pub async fn handle_compute(
    client: Client,
    mut subscriber: Subscriber,
    service: Arc<ItineraryService>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received itinerary.compute message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ItineraryRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse itinerary request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                reply_json(&client, reply, &error).await;
                continue;
            }
        };

        let technician_id = request.payload.technician_id.clone();
        match service.compute(request.payload).await {
            Ok(response) => {
                info!(
                    "Itinerary for technician {}: {} stops, {} used{}",
                    technician_id,
                    response.current.stops.len(),
                    response.algorithm_used,
                    if response.cached { " (cached)" } else { "" },
                );
                let success = SuccessResponse::new(request.id, response);
                reply_json(&client, reply, &success).await;
            }
            Err(e) => {
                warn!("Itinerary for technician {} rejected: {}", technician_id, e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string())
                    .with_details(serde_json::json!({ "technician_id": technician_id }));
                reply_json(&client, reply, &error).await;
            }
        }
    }

    Ok(())
}
