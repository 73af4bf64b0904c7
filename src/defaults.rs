use std::time::Duration;

/// Service time assumed when a job carries no estimate.
pub const DEFAULT_SERVICE_DURATION_MINUTES: u32 = 60;

/// Straight-line travel speed used when neither request nor config set one.
pub const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Itineraries are recomputed at least once a day.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 24);

/// Hard limit on one optimal solver run, including thread hand-off.
pub const DEFAULT_SOLVER_TIMEOUT: Duration = Duration::from_secs(10);
