//! Itinerary engine services

pub mod comparison;
pub mod geo;
pub mod itinerary;
pub mod itinerary_cache;
pub mod routing;
pub mod sequential_schedule;
pub mod vrp;
