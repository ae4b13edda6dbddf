use super::*;
use crate::constants::SPRITE_VARIANTS;

impl GameEngine {
    pub(super) fn make_player(&mut self, player_id: &str) -> PlayerInternal {
        let spawn = self.pick_player_spawn();
        let sprite = self.rng.pick_index(usize::from(SPRITE_VARIANTS)) as u8;
        let incarnation = self.next_incarnation;
        self.next_incarnation += 1;

        PlayerInternal {
            view: PlayerView {
                id: player_id.to_string(),
                x: spawn.x,
                y: spawn.y,
                dx: 0.0,
                dy: 0.0,
                a: 0.0,
                input: PlayerInput::default(),
                lost: false,
                last_pushed_by: None,
                active_effects: Default::default(),
                slow_timer: 0,
                sprite,
            },
            spawn,
            incarnation,
        }
    }

    pub(super) fn pick_player_spawn(&mut self) -> Vec2 {
        match self.safe_area {
            Some(area) => self.random_point_in(area),
            None => self.config.fallback_spawn,
        }
    }

    pub(super) fn spawn_pickup_pool(&mut self) {
        for id in 0..self.config.pickup_count {
            let kind = self.pick_pickup_kind();
            let position = self.random_point_in(self.pickup_area());
            self.pickups.push(PickupView {
                id: id as u32,
                kind,
                x: position.x,
                y: position.y,
                taken_by: None,
            });
        }
    }

    pub(super) fn respawn_pickup(&mut self, pickup_id: u32) {
        let Some(idx) = self.pickups.iter().position(|pickup| pickup.id == pickup_id) else {
            return;
        };
        let kind = self.pick_pickup_kind();
        let position = self.random_point_in(self.pickup_area());
        let pickup = &mut self.pickups[idx];
        pickup.kind = kind;
        pickup.x = position.x;
        pickup.y = position.y;
        pickup.taken_by = None;
        self.events
            .push(RuntimeEvent::PickupRespawned { pickup_id, kind });
        debug!(pickup_id, ?kind, x = position.x, y = position.y, "pickup respawned");
    }

    fn pickup_area(&self) -> SafeArea {
        self.safe_area
            .unwrap_or_else(|| utils::world_area(&self.config))
    }

    fn pick_pickup_kind(&mut self) -> EffectKind {
        let idx = self.rng.pick_index(self.config.pickup_kinds.len());
        self.config
            .pickup_kinds
            .get(idx)
            .copied()
            .unwrap_or(EffectKind::Strength)
    }

    fn random_point_in(&mut self, area: SafeArea) -> Vec2 {
        let x = self.rng.range(area.x, area.width);
        let y = self.rng.range(area.y, area.height);
        Vec2::new(x, y)
    }
}
