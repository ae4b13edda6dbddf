use std::collections::BTreeMap;
use std::f64::consts::TAU;

use crate::config::SimulationConfig;
use crate::types::{EntityKind, PickupView, PlayerView, SafeArea, Vec2};

pub trait Collidable {
    fn center(&self, config: &SimulationConfig) -> Vec2;
}

impl Collidable for PlayerView {
    fn center(&self, config: &SimulationConfig) -> Vec2 {
        Vec2::new(
            self.x + config.player_center_offset,
            self.y + config.player_center_offset,
        )
    }
}

impl Collidable for PickupView {
    fn center(&self, _config: &SimulationConfig) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

pub trait Movable {
    fn kind(&self) -> EntityKind;
    fn position(&self) -> Vec2;
    fn set_position(&mut self, position: Vec2);
    fn velocity(&self) -> Vec2;
    fn set_velocity(&mut self, velocity: Vec2);
}

impl Movable for PlayerView {
    fn kind(&self) -> EntityKind {
        EntityKind::Player
    }

    fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    fn set_position(&mut self, position: Vec2) {
        self.x = position.x;
        self.y = position.y;
    }

    fn velocity(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }

    fn set_velocity(&mut self, velocity: Vec2) {
        self.dx = velocity.x;
        self.dy = velocity.y;
    }
}

pub(super) fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

pub(super) fn wrap_coordinate(value: f64, extent: f64) -> f64 {
    let wrapped = value.rem_euclid(extent);
    if wrapped >= extent {
        0.0
    } else {
        wrapped
    }
}

pub(super) fn clamp_component(value: f64, limit: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(-limit, limit)
}

pub(super) fn world_area(config: &SimulationConfig) -> SafeArea {
    SafeArea {
        x: 0.0,
        y: 0.0,
        width: config.world_width,
        height: config.world_height,
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

struct Fnv1a(u64);

impl Fnv1a {
    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= u64::from(*byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u64(&mut self, value: u64) {
        self.write(&value.to_le_bytes());
    }

    fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    fn write_str(&mut self, value: &str) {
        self.write_u64(value.len() as u64);
        self.write(value.as_bytes());
    }
}

pub(super) fn digest_state<'a>(
    tick: u64,
    rng_state: u32,
    players: impl Iterator<Item = &'a PlayerView>,
    pickups: &[PickupView],
    scores: &BTreeMap<String, u64>,
) -> u64 {
    let mut hasher = Fnv1a(FNV_OFFSET);
    hasher.write_u64(tick);
    hasher.write_u64(u64::from(rng_state));
    for player in players {
        hasher.write_str(&player.id);
        for value in [player.x, player.y, player.dx, player.dy, player.a] {
            hasher.write_f64(value);
        }
        hasher.write(&[u8::from(player.lost), player.sprite]);
        hasher.write_u64(u64::from(player.slow_timer));
        hasher.write_str(player.last_pushed_by.as_deref().unwrap_or(""));
        for effect in &player.active_effects {
            hasher.write(&[*effect as u8]);
        }
    }
    for pickup in pickups {
        hasher.write_u64(u64::from(pickup.id));
        hasher.write(&[pickup.kind as u8]);
        hasher.write_f64(pickup.x);
        hasher.write_f64(pickup.y);
        hasher.write_str(pickup.taken_by.as_deref().unwrap_or(""));
    }
    for (player_id, score) in scores {
        hasher.write_str(player_id);
        hasher.write_u64(*score);
    }
    hasher.0
}
