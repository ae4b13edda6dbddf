use crate::types::{EffectKind, SafeArea, Vec2};

pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const WORLD_WIDTH: f64 = 1000.0;
pub const WORLD_HEIGHT: f64 = 1000.0;

pub const FRICTION: f64 = 0.98;
pub const SLOWED_FRICTION: f64 = 0.7;
pub const THRUST_FORCE: f64 = 0.7;
pub const TURN_STEP: f64 = 0.2;
pub const JOYSTICK_GAIN: f64 = 0.7;
pub const SPEED_LIMIT: f64 = 20.0;
pub const SLOW_DOWN_TICKS: u32 = 15;

pub const PLAYER_CENTER_OFFSET: f64 = 10.0;
pub const COLLISION_RADIUS: f64 = 48.0;
pub const PUSH_STRENGTH: f64 = 8.0;
pub const POP_STRENGTH: f64 = 3.0;
pub const STRENGTH_IMPULSE_MULTIPLIER: f64 = 2.0;
pub const SWIFTNESS_THRUST_MULTIPLIER: f64 = 1.5;
pub const BALLAST_IMPULSE_FACTOR: f64 = 0.5;

pub const PICKUP_RADIUS: f64 = 36.0;
pub const PICKUP_POOL_SIZE: usize = 3;
pub const STRENGTH_DURATION_MS: u64 = 60_000;
pub const SWIFTNESS_DURATION_MS: u64 = 10_000;
pub const BALLAST_DURATION_MS: u64 = 15_000;

pub const RESPAWN_DELAY_MS: u64 = 2_100;
pub const FALLBACK_SPAWN: Vec2 = Vec2 { x: 300.0, y: 600.0 };
pub const SPRITE_VARIANTS: u8 = 6;

/// Playable region the reference client publishes for a 1000x1000 world.
pub const DEFAULT_SAFE_AREA: SafeArea = SafeArea {
    x: WORLD_WIDTH * 0.09,
    y: WORLD_HEIGHT * 0.11,
    width: WORLD_WIDTH * 0.82,
    height: WORLD_HEIGHT * 0.78,
};

pub fn default_effect_duration_ms(kind: EffectKind) -> u64 {
    match kind {
        EffectKind::Strength => STRENGTH_DURATION_MS,
        EffectKind::Swiftness => SWIFTNESS_DURATION_MS,
        EffectKind::Ballast => BALLAST_DURATION_MS,
    }
}
