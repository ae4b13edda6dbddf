//! Simulation tunables.
//!
//! Every replica must run with the same `SimulationConfig`; it is part of the
//! replicated session setup, not a per-client preference.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    default_effect_duration_ms, BALLAST_IMPULSE_FACTOR, COLLISION_RADIUS, FALLBACK_SPAWN,
    FRICTION, JOYSTICK_GAIN, PICKUP_POOL_SIZE, PICKUP_RADIUS, PLAYER_CENTER_OFFSET, POP_STRENGTH,
    PUSH_STRENGTH, RESPAWN_DELAY_MS, SLOWED_FRICTION, SLOW_DOWN_TICKS, SPEED_LIMIT,
    STRENGTH_IMPULSE_MULTIPLIER, SWIFTNESS_THRUST_MULTIPLIER, THRUST_FORCE, TICK_MS, TURN_STEP,
    WORLD_HEIGHT, WORLD_WIDTH,
};
use crate::types::{BoundaryPolicy, EffectKind, EntityKind, Vec2};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectDurations {
    pub strength_ms: u64,
    pub swiftness_ms: u64,
    pub ballast_ms: u64,
}

impl Default for EffectDurations {
    fn default() -> Self {
        Self {
            strength_ms: default_effect_duration_ms(EffectKind::Strength),
            swiftness_ms: default_effect_duration_ms(EffectKind::Swiftness),
            ballast_ms: default_effect_duration_ms(EffectKind::Ballast),
        }
    }
}

impl EffectDurations {
    pub fn get(&self, kind: EffectKind) -> u64 {
        match kind {
            EffectKind::Strength => self.strength_ms,
            EffectKind::Swiftness => self.swiftness_ms,
            EffectKind::Ballast => self.ballast_ms,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    pub seed: u32,
    pub tick_ms: u64,
    pub world_width: f64,
    pub world_height: f64,

    pub friction: f64,
    pub slowed_friction: f64,
    pub thrust_force: f64,
    pub turn_step: f64,
    pub joystick_gain: f64,
    pub speed_limit: f64,
    pub slow_down_ticks: u32,
    pub player_boundary: BoundaryPolicy,

    pub player_center_offset: f64,
    pub collision_radius: f64,
    pub push_strength: f64,
    pub pop_strength: f64,
    pub strength_multiplier: f64,
    pub swiftness_multiplier: f64,
    pub ballast_factor: f64,

    pub pickup_radius: f64,
    pub pickup_count: usize,
    pub pickup_kinds: Vec<EffectKind>,
    pub pickup_boundary: BoundaryPolicy,
    pub effect_durations: EffectDurations,

    pub respawn_delay_ms: u64,
    pub fallback_spawn: Vec2,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            tick_ms: TICK_MS,
            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,
            friction: FRICTION,
            slowed_friction: SLOWED_FRICTION,
            thrust_force: THRUST_FORCE,
            turn_step: TURN_STEP,
            joystick_gain: JOYSTICK_GAIN,
            speed_limit: SPEED_LIMIT,
            slow_down_ticks: SLOW_DOWN_TICKS,
            player_boundary: BoundaryPolicy::Eliminate,
            player_center_offset: PLAYER_CENTER_OFFSET,
            collision_radius: COLLISION_RADIUS,
            push_strength: PUSH_STRENGTH,
            pop_strength: POP_STRENGTH,
            strength_multiplier: STRENGTH_IMPULSE_MULTIPLIER,
            swiftness_multiplier: SWIFTNESS_THRUST_MULTIPLIER,
            ballast_factor: BALLAST_IMPULSE_FACTOR,
            pickup_radius: PICKUP_RADIUS,
            pickup_count: PICKUP_POOL_SIZE,
            pickup_kinds: EffectKind::ALL.to_vec(),
            pickup_boundary: BoundaryPolicy::Eliminate,
            effect_durations: EffectDurations::default(),
            respawn_delay_ms: RESPAWN_DELAY_MS,
            fallback_spawn: FALLBACK_SPAWN,
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tickMs must be positive"));
        }
        if !(self.world_width > 0.0 && self.world_height > 0.0) {
            return Err(ConfigError::Invalid("world size must be positive"));
        }
        for friction in [self.friction, self.slowed_friction] {
            if !(friction > 0.0 && friction <= 1.0) {
                return Err(ConfigError::Invalid("friction must be in (0, 1]"));
            }
        }
        if !(self.speed_limit.is_finite() && self.speed_limit > 0.0) {
            return Err(ConfigError::Invalid("speedLimit must be positive"));
        }
        let finite = [
            self.thrust_force,
            self.turn_step,
            self.joystick_gain,
            self.player_center_offset,
            self.collision_radius,
            self.push_strength,
            self.pop_strength,
            self.strength_multiplier,
            self.swiftness_multiplier,
            self.ballast_factor,
            self.pickup_radius,
        ];
        if finite.iter().any(|value| !value.is_finite()) {
            return Err(ConfigError::Invalid("tunables must be finite"));
        }
        if self.pickup_kinds.is_empty() {
            return Err(ConfigError::Invalid("pickupKinds must not be empty"));
        }
        if !self.fallback_spawn.is_finite() {
            return Err(ConfigError::Invalid("fallbackSpawn must be finite"));
        }
        Ok(())
    }

    pub fn effect_duration_ms(&self, kind: EffectKind) -> u64 {
        self.effect_durations.get(kind)
    }

    pub fn boundary_policy(&self, kind: EntityKind) -> BoundaryPolicy {
        match kind {
            EntityKind::Player => self.player_boundary,
            EntityKind::Pickup => self.pickup_boundary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = SimulationConfig::from_json_str("{}").expect("defaults parse");
        assert_eq!(config, SimulationConfig::default());
        assert_eq!(config.tick_ms, 50);
        assert_eq!(config.respawn_delay_ms, 2_100);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = SimulationConfig::from_json_str(
            r#"{"friction":0.96,"playerBoundary":"wrap","effectDurations":{"strengthMs":5000}}"#,
        )
        .expect("override parses");
        assert_eq!(config.friction, 0.96);
        assert_eq!(config.player_boundary, BoundaryPolicy::Wrap);
        assert_eq!(config.effect_duration_ms(EffectKind::Strength), 5_000);
        assert_eq!(
            config.effect_duration_ms(EffectKind::Ballast),
            default_effect_duration_ms(EffectKind::Ballast)
        );
        assert_eq!(config.speed_limit, SPEED_LIMIT);
        assert_eq!(config.boundary_policy(EntityKind::Player), BoundaryPolicy::Wrap);
        assert_eq!(
            SimulationConfig::default().boundary_policy(EntityKind::Player),
            BoundaryPolicy::Eliminate
        );
        assert_eq!(
            SimulationConfig::default().boundary_policy(EntityKind::Pickup),
            BoundaryPolicy::Eliminate
        );
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(SimulationConfig::from_json_str(r#"{"tickMs":0}"#).is_err());
        assert!(SimulationConfig::from_json_str(r#"{"friction":1.5}"#).is_err());
        assert!(SimulationConfig::from_json_str(r#"{"pickupKinds":[]}"#).is_err());
        assert!(SimulationConfig::from_json_str(r#"{"speedLimit":-1}"#).is_err());
        assert!(SimulationConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let path = std::env::temp_dir().join(format!(
            "monanimals-missing-config-{}.json",
            rand::random::<u32>()
        ));
        assert!(matches!(
            SimulationConfig::load(&path),
            Err(ConfigError::Read { .. })
        ));
    }
}
