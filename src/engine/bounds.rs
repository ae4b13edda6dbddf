use super::*;
use crate::types::{BoundaryPolicy, EntityKind};

impl GameEngine {
    pub(super) fn check_player_bounds(&mut self) {
        if self.config.boundary_policy(EntityKind::Player) == BoundaryPolicy::Wrap {
            return;
        }
        let Some(area) = self.safe_area else {
            return;
        };
        for idx in 0..self.players.len() {
            let player = &self.players[idx];
            if player.view.lost || area.contains(player.view.position()) {
                continue;
            }
            self.eliminate_player(idx);
        }
    }

    pub(super) fn check_pickup_bounds(&mut self) {
        if self.config.boundary_policy(EntityKind::Pickup) == BoundaryPolicy::Wrap {
            return;
        }
        let Some(area) = self.safe_area else {
            return;
        };
        let stray: Vec<u32> = self
            .pickups
            .iter()
            .filter(|pickup| pickup.is_active() && !area.contains(pickup.position()))
            .map(|pickup| pickup.id)
            .collect();
        for pickup_id in stray {
            self.respawn_pickup(pickup_id);
        }
    }

    fn eliminate_player(&mut self, idx: usize) {
        let player = &mut self.players[idx];
        player.view.lost = true;
        let player_id = player.view.id.clone();
        let incarnation = player.incarnation;
        let pusher = player.view.last_pushed_by.clone();

        info!(
            tick = self.tick_counter,
            player_id = %player_id,
            pusher = pusher.as_deref().unwrap_or("-"),
            "player left the safe area"
        );
        self.events.push(RuntimeEvent::PlayerLost {
            player_id: player_id.clone(),
        });

        if let Some(pusher) = pusher {
            let score = self.scores.award_point(&pusher);
            self.persist_requested = true;
            self.events.push(RuntimeEvent::ScoreAwarded {
                player_id: pusher,
                score,
            });
        }

        self.scheduler.schedule_after(
            self.now_ms,
            self.config.respawn_delay_ms,
            ScheduledCall::ResetPlayer {
                player_id,
                incarnation,
            },
        );
    }

    pub(super) fn reset_player(&mut self, player_id: &str, incarnation: u64) {
        let Some(idx) = self.index_of_incarnation(player_id, incarnation) else {
            debug!(player_id, "reset for departed player skipped");
            return;
        };
        let player = &mut self.players[idx];
        let spawn = player.spawn;
        player.view.set_position(spawn);
        player.view.set_velocity(Vec2::ZERO);
        player.view.a = 0.0;
        player.view.slow_timer = 0;
        player.view.last_pushed_by = None;
        player.view.lost = false;

        debug!(player_id, "player reset");
        self.events.push(RuntimeEvent::PlayerReset {
            player_id: player_id.to_string(),
        });
    }
}
