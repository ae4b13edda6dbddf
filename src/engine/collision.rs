use super::*;

impl GameEngine {
    pub(super) fn resolve_pickup_collisions(&mut self) {
        for pickup_idx in 0..self.pickups.len() {
            let pickup = &self.pickups[pickup_idx];
            if !pickup.is_active() {
                continue;
            }
            let kind = pickup.kind;
            let center = pickup.center(&self.config);
            let taker = self.players.iter().position(|player| {
                !player.view.lost
                    && !player.view.active_effects.contains(&kind)
                    && player.view.center(&self.config).distance(center)
                        < self.config.pickup_radius
            });
            if let Some(player_idx) = taker {
                self.activate_effect(player_idx, pickup_idx);
            }
        }
    }

    pub(super) fn resolve_player_collisions(&mut self) {
        let count = self.players.len();
        for first in 0..count {
            for second in (first + 1)..count {
                if self.players[first].view.lost || self.players[second].view.lost {
                    continue;
                }
                self.push_pair(first, second);
            }
        }
    }

    fn push_pair(&mut self, first: usize, second: usize) {
        let config = &self.config;
        let p1 = &self.players[first].view;
        let p2 = &self.players[second].view;
        let c1 = p1.center(config);
        let c2 = p2.center(config);
        if c1.distance(c2) >= config.collision_radius {
            return;
        }

        let angle = (c1.y - c2.y).atan2(c1.x - c2.x);
        let (sin, cos) = angle.sin_cos();
        let to_first = config.push_strength * impulse_scale(p2, p1, config);
        let to_second = config.pop_strength * impulse_scale(p1, p2, config);
        let slow_down_ticks = config.slow_down_ticks;
        let first_id = p1.id.clone();
        let second_id = p2.id.clone();

        {
            let p1 = &mut self.players[first].view;
            p1.dx += cos * to_first;
            p1.dy += sin * to_first;
            p1.slow_timer = slow_down_ticks;
            p1.last_pushed_by = Some(second_id.clone());
        }
        {
            let p2 = &mut self.players[second].view;
            p2.dx -= cos * to_second;
            p2.dy -= sin * to_second;
            p2.last_pushed_by = Some(first_id.clone());
        }

        debug!(
            tick = self.tick_counter,
            first = %first_id,
            second = %second_id,
            "players collided"
        );
        self.events.push(RuntimeEvent::PlayerPushed {
            player_id: first_id.clone(),
            by: second_id.clone(),
        });
        self.events.push(RuntimeEvent::PlayerPushed {
            player_id: second_id,
            by: first_id,
        });
    }
}

fn impulse_scale(dealer: &PlayerView, receiver: &PlayerView, config: &SimulationConfig) -> f64 {
    let mut scale = 1.0;
    if dealer.active_effects.contains(&EffectKind::Strength) {
        scale *= config.strength_multiplier;
    }
    if receiver.active_effects.contains(&EffectKind::Ballast) {
        scale *= config.ballast_factor;
    }
    scale
}
