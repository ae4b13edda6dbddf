use super::*;

impl GameEngine {
    pub(super) fn activate_effect(&mut self, player_idx: usize, pickup_idx: usize) {
        let player = &mut self.players[player_idx];
        let pickup = &mut self.pickups[pickup_idx];
        let kind = pickup.kind;
        let pickup_id = pickup.id;
        pickup.taken_by = Some(player.view.id.clone());
        player.view.active_effects.insert(kind);

        let player_id = player.view.id.clone();
        let incarnation = player.incarnation;
        let duration_ms = self.config.effect_duration_ms(kind);
        self.scheduler.schedule_after(
            self.now_ms,
            duration_ms,
            ScheduledCall::ExpireEffect {
                player_id: player_id.clone(),
                incarnation,
                kind,
                pickup_id,
            },
        );

        debug!(
            tick = self.tick_counter,
            player_id = %player_id,
            pickup_id,
            ?kind,
            duration_ms,
            "pickup taken"
        );
        self.events.push(RuntimeEvent::PickupTaken {
            pickup_id,
            by: player_id,
            kind,
        });
    }

    pub(super) fn expire_effect(
        &mut self,
        player_id: &str,
        incarnation: u64,
        kind: EffectKind,
        pickup_id: u32,
    ) {
        if let Some(idx) = self.index_of_incarnation(player_id, incarnation) {
            if self.players[idx].view.active_effects.remove(&kind) {
                debug!(player_id, ?kind, "effect expired");
                self.events.push(RuntimeEvent::EffectExpired {
                    player_id: player_id.to_string(),
                    kind,
                });
            }
        }
        self.respawn_pickup(pickup_id);
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{EffectDurations, SimulationConfig};
    use crate::constants::DEFAULT_SAFE_AREA;
    use crate::engine::tests::engine_with_safe_area;
    use crate::engine::GameEngine;
    use crate::types::{EffectKind, RuntimeEvent};

    fn engine_with_odd_durations() -> GameEngine {
        let mut engine = GameEngine::new(SimulationConfig {
            seed: 31,
            effect_durations: EffectDurations {
                strength_ms: 1_025,
                swiftness_ms: 1_025,
                ballast_ms: 1_025,
            },
            ..SimulationConfig::default()
        });
        assert!(engine.set_safe_area(DEFAULT_SAFE_AREA));
        engine
    }

    fn grab_first_pickup(engine: &mut GameEngine) -> EffectKind {
        let target = engine.pickups[0].clone();
        for pickup in engine.pickups.iter_mut().skip(1) {
            pickup.taken_by = Some("nobody".to_string());
        }
        let view = &mut engine.players[0].view;
        view.x = target.x - 10.0;
        view.y = target.y - 10.0;
        engine.resolve_pickup_collisions();
        target.kind
    }

    #[test]
    fn pickup_stays_taken_for_exactly_its_duration() {
        let mut engine = engine_with_odd_durations();
        engine.join("p1");
        let kind = grab_first_pickup(&mut engine);
        assert!(!engine.pickups[0].is_active());

        engine.advance(1_024);
        assert!(!engine.pickups[0].is_active());
        assert!(engine.player("p1").expect("p1").active_effects.contains(&kind));

        engine.advance(1);
        assert!(engine.pickups[0].is_active());
        assert!(!engine.player("p1").expect("p1").active_effects.contains(&kind));

        let events = engine.build_snapshot(true).events;
        assert!(events.contains(&RuntimeEvent::EffectExpired {
            player_id: "p1".to_string(),
            kind,
        }));
        assert!(events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::PickupRespawned { pickup_id: 0, .. })));
    }

    #[test]
    fn expiry_for_departed_player_still_respawns_pickup() {
        let mut engine = engine_with_odd_durations();
        engine.join("p1");
        grab_first_pickup(&mut engine);
        engine.leave("p1");
        engine.join("p1");

        engine.advance(1_025);
        assert!(engine.pickups[0].is_active());
        assert!(engine.player("p1").expect("p1").active_effects.is_empty());
    }

    #[test]
    fn expiry_of_missing_effect_is_noop() {
        let mut engine = engine_with_safe_area();
        engine.join("p1");
        let incarnation = engine.players[0].incarnation;
        engine.expire_effect("p1", incarnation, EffectKind::Ballast, 99);
        engine.expire_effect("ghost", 1, EffectKind::Ballast, 0);
        assert!(engine.player("p1").expect("p1").active_effects.is_empty());
    }

    #[test]
    fn strength_pickup_within_reach_is_collected_then_returned() {
        let mut engine = engine_with_safe_area();
        engine.join("p1");
        {
            let pickup = &mut engine.pickups[0];
            pickup.kind = EffectKind::Strength;
            pickup.x = 500.0;
            pickup.y = 500.0;
        }
        for pickup in engine.pickups.iter_mut().skip(1) {
            pickup.taken_by = Some("nobody".to_string());
        }
        engine.players[0].view.x = 520.0;
        engine.players[0].view.y = 490.0;

        engine.run_ticks(1);
        assert_eq!(engine.pickups[0].taken_by.as_deref(), Some("p1"));
        assert!(engine
            .player("p1")
            .expect("p1")
            .active_effects
            .contains(&EffectKind::Strength));
        engine.build_snapshot(true);

        engine.advance(59_999);
        assert!(!engine.pickups[0].is_active());

        engine.advance(1);
        let events = engine.build_snapshot(true).events;
        assert!(events.contains(&RuntimeEvent::EffectExpired {
            player_id: "p1".to_string(),
            kind: EffectKind::Strength,
        }));
        assert!(events
            .iter()
            .any(|event| matches!(event, RuntimeEvent::PickupRespawned { pickup_id: 0, .. })));
        let pickup = &engine.pickups[0];
        assert_ne!((pickup.x, pickup.y), (500.0, 500.0));
        assert!(DEFAULT_SAFE_AREA.contains(pickup.position()));
    }
}
