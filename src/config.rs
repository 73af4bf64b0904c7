//! Configuration management

use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::defaults::{DEFAULT_CACHE_TTL, DEFAULT_SOLVER_TIMEOUT, DEFAULT_SPEED_KMH};
use crate::services::geo::validate_speed;
use crate::services::vrp::{SolverBackend, SolverConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// Speed applied when a request does not carry one
    pub default_speed_kmh: f64,

    /// Backend for the `optimal` algorithm
    pub solver_backend: SolverBackend,

    /// Termination settings for the metaheuristic backend
    pub solver: SolverConfig,

    /// Deadline for one optimal solve before falling back
    pub solver_timeout: Duration,

    /// How long computed itineraries stay cached
    pub cache_ttl: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let nats_url = lookup("NATS_URL").unwrap_or_else(|| "nats://localhost:4222".to_string());

        let nats_user = lookup("NATS_USER").filter(|user| !user.is_empty());
        let nats_password = lookup("NATS_PASSWORD");

        let default_speed_kmh = parse_or(&lookup, "DEFAULT_SPEED_KMH", DEFAULT_SPEED_KMH)?;
        if validate_speed(default_speed_kmh).is_err() {
            anyhow::bail!("DEFAULT_SPEED_KMH must be positive (got {})", default_speed_kmh);
        }

        let solver_backend = match lookup("SOLVER_BACKEND") {
            Some(value) => value.parse::<SolverBackend>().map_err(anyhow::Error::msg)?,
            None => SolverBackend::default(),
        };

        let fast = SolverConfig::fast();
        let solver = SolverConfig::new(
            parse_or(&lookup, "SOLVER_MAX_TIME_SECONDS", fast.max_time_seconds)?,
            parse_or(&lookup, "SOLVER_MAX_GENERATIONS", fast.max_generations)?,
        )
        .with_exact_stop_limit(parse_or(&lookup, "SOLVER_EXACT_STOP_LIMIT", fast.exact_stop_limit)?);

        let solver_timeout = Duration::from_secs(parse_or(
            &lookup,
            "SOLVER_TIMEOUT_SECONDS",
            DEFAULT_SOLVER_TIMEOUT.as_secs(),
        )?);

        let cache_ttl = Duration::from_secs(parse_or(
            &lookup,
            "CACHE_TTL_SECONDS",
            DEFAULT_CACHE_TTL.as_secs(),
        )?);

        if solver_timeout.as_secs() < solver.max_time_seconds as u64 {
            tracing::warn!(
                "SOLVER_TIMEOUT_SECONDS ({}) is shorter than SOLVER_MAX_TIME_SECONDS ({}), optimal requests will often fall back",
                solver_timeout.as_secs(),
                solver.max_time_seconds
            );
        }

        Ok(Self {
            nats_url,
            nats_user,
            nats_password,
            default_speed_kmh,
            solver_backend,
            solver,
            solver_timeout,
            cache_ttl,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
