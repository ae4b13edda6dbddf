use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned playable rectangle in virtual world coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafeArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SafeArea {
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Edges count as inside; only strictly beyond an edge is out.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Strength,
    Swiftness,
    Ballast,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [
        EffectKind::Strength,
        EffectKind::Swiftness,
        EffectKind::Ballast,
    ];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Player,
    Pickup,
}

/// What happens to an entity that leaves its playable region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Leaving the safe area eliminates the entity until it is reset.
    #[default]
    Eliminate,
    /// Position wraps around the world rectangle.
    Wrap,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    #[serde(rename = "turnLeft")]
    pub turn_left: bool,
    #[serde(rename = "turnRight")]
    pub turn_right: bool,
    #[serde(rename = "moveUp")]
    pub move_up: bool,
    pub joystick: Vec2,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerView {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
    pub a: f64,
    pub input: PlayerInput,
    pub lost: bool,
    #[serde(rename = "lastPushedBy")]
    pub last_pushed_by: Option<String>,
    #[serde(rename = "activeEffects")]
    pub active_effects: BTreeSet<EffectKind>,
    #[serde(rename = "slowTimer")]
    pub slow_timer: u32,
    pub sprite: u8,
}

impl PlayerView {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.dx, self.dy)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PickupView {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: EffectKind,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "takenBy")]
    pub taken_by: Option<String>,
}

impl PickupView {
    pub fn is_active(&self) -> bool {
        self.taken_by.is_none()
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    PlayerJoined {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    PlayerPushed {
        #[serde(rename = "playerId")]
        player_id: String,
        by: String,
    },
    PickupTaken {
        #[serde(rename = "pickupId")]
        pickup_id: u32,
        by: String,
        kind: EffectKind,
    },
    PickupRespawned {
        #[serde(rename = "pickupId")]
        pickup_id: u32,
        kind: EffectKind,
    },
    EffectExpired {
        #[serde(rename = "playerId")]
        player_id: String,
        kind: EffectKind,
    },
    PlayerLost {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    PlayerReset {
        #[serde(rename = "playerId")]
        player_id: String,
    },
    ScoreAwarded {
        #[serde(rename = "playerId")]
        player_id: String,
        score: u64,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    #[serde(rename = "safeArea")]
    pub safe_area: Option<SafeArea>,
    pub players: Vec<PlayerView>,
    pub pickups: Vec<PickupView>,
    pub scoreboard: BTreeMap<String, u64>,
    #[serde(rename = "nameMap")]
    pub name_map: BTreeMap<String, String>,
    pub events: Vec<RuntimeEvent>,
}
