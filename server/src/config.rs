//! Startup configuration for the simulation and the transport shell.
//!
//! Every value is fixed once the server starts. The binary builds a
//! [`SimConfig`] from command-line flags, optionally layered over a JSON
//! file, and refuses to start unless [`SimConfig::validate`] passes.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Longest trail a vehicle may carry. Keeps one vehicle's snapshot inside a
/// single datagram.
pub const MAX_TRAIL_LENGTH: usize = 4096;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("arena half-size must be positive, got {0}")]
    NonPositiveArena(i32),
    #[error("grid cell size must be positive, got {0}")]
    NonPositiveCellSize(f32),
    #[error("wall thickness must not be negative, got {0}")]
    NegativeThickness(f32),
    #[error("max trail length must be at least 1")]
    ZeroTrailLength,
    #[error("max trail length {0} exceeds the limit of {max}", max = MAX_TRAIL_LENGTH)]
    TrailTooLong(usize),
    #[error("tick rate must be at least 1 Hz")]
    ZeroTickRate,
    #[error("spawn attempt budget must be at least 1")]
    ZeroSpawnAttempts,
    #[error("spawn margin {margin} leaves no interior inside half-size {half_size}")]
    MarginTooLarge { margin: i32, half_size: i32 },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Vehicles die once |x| or |z| exceeds this value.
    pub arena_half_size: i32,
    pub cell_size: f32,
    pub wall_thickness: f32,
    pub max_trail_length: usize,
    pub tick_rate: u32,
    #[serde(with = "millis")]
    pub respawn_delay: Duration,
    pub spawn_safe_distance: f32,
    pub spawn_attempts: u32,
    /// Distance kept between spawn points and the arena boundary.
    pub spawn_margin: i32,
    /// Fixed seed for spawn sampling; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
    pub max_clients: usize,
    #[serde(with = "millis")]
    pub client_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            arena_half_size: 100,
            cell_size: 10.0,
            wall_thickness: 0.2,
            max_trail_length: 200,
            tick_rate: 20,
            respawn_delay: Duration::from_secs(3),
            spawn_safe_distance: 10.0,
            spawn_attempts: 50,
            spawn_margin: 10,
            rng_seed: None,
            max_clients: 32,
            client_timeout: Duration::from_secs(5),
        }
    }
}

impl SimConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena_half_size <= 0 {
            return Err(ConfigError::NonPositiveArena(self.arena_half_size));
        }
        if self.cell_size <= 0.0 || !self.cell_size.is_finite() {
            return Err(ConfigError::NonPositiveCellSize(self.cell_size));
        }
        if self.wall_thickness < 0.0 {
            return Err(ConfigError::NegativeThickness(self.wall_thickness));
        }
        if self.max_trail_length == 0 {
            return Err(ConfigError::ZeroTrailLength);
        }
        if self.max_trail_length > MAX_TRAIL_LENGTH {
            return Err(ConfigError::TrailTooLong(self.max_trail_length));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.spawn_attempts == 0 {
            return Err(ConfigError::ZeroSpawnAttempts);
        }
        if self.spawn_margin < 0 || self.spawn_margin >= self.arena_half_size {
            return Err(ConfigError::MarginTooLarge {
                margin: self.spawn_margin,
                half_size: self.arena_half_size,
            });
        }
        Ok(())
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
