//! Type definitions

pub mod itinerary;
pub mod messages;
pub mod stop;

pub use itinerary::*;
pub use messages::*;
pub use stop::*;
