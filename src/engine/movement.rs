use super::*;
use crate::types::BoundaryPolicy;

impl GameEngine {
    pub(super) fn integrate_players(&mut self) {
        for player in &mut self.players {
            if player.view.lost {
                continue;
            }
            integrate(&mut player.view, &self.config);
        }
    }
}

// Thrust uses the heading from the start of the tick.
pub(super) fn integrate(player: &mut PlayerView, config: &SimulationConfig) {
    let friction = if player.slow_timer > 0 {
        player.slow_timer -= 1;
        config.slowed_friction
    } else {
        config.friction
    };
    player.dx *= friction;
    player.dy *= friction;

    let gain = if player.active_effects.contains(&EffectKind::Swiftness) {
        config.swiftness_multiplier
    } else {
        1.0
    };

    if player.input.move_up {
        player.dx += player.a.cos() * config.thrust_force * gain;
        player.dy += player.a.sin() * config.thrust_force * gain;
    }
    if player.input.turn_left {
        player.a -= config.turn_step;
    }
    if player.input.turn_right {
        player.a += config.turn_step;
    }

    let stick = player.input.joystick;
    if !stick.is_zero() {
        player.dx += stick.x * config.joystick_gain * gain;
        player.dy += stick.y * config.joystick_gain * gain;
        player.a = stick.y.atan2(stick.x);
    }
    player.a = utils::wrap_angle(player.a);

    player.dx = utils::clamp_component(player.dx, config.speed_limit);
    player.dy = utils::clamp_component(player.dy, config.speed_limit);

    drift(player, config);
}

pub(super) fn drift<M: Movable>(body: &mut M, config: &SimulationConfig) {
    let position = body.position();
    let velocity = body.velocity();
    let mut next = Vec2::new(position.x + velocity.x, position.y + velocity.y);
    if config.boundary_policy(body.kind()) == BoundaryPolicy::Wrap {
        next.x = utils::wrap_coordinate(next.x, config.world_width);
        next.y = utils::wrap_coordinate(next.y, config.world_height);
    }
    body.set_position(next);
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, TAU};

    use super::*;
    use crate::types::PlayerInput;

    fn idle_player(x: f64, y: f64) -> PlayerView {
        PlayerView {
            id: "p1".to_string(),
            x,
            y,
            dx: 0.0,
            dy: 0.0,
            a: 0.0,
            input: PlayerInput::default(),
            lost: false,
            last_pushed_by: None,
            active_effects: Default::default(),
            slow_timer: 0,
            sprite: 0,
        }
    }

    #[test]
    fn friction_decays_velocity() {
        let config = SimulationConfig::default();
        let mut player = idle_player(500.0, 500.0);
        player.dx = 10.0;
        integrate(&mut player, &config);
        assert!((player.dx - 9.8).abs() < 1e-12);
        assert!((player.x - 509.8).abs() < 1e-12);
    }

    #[test]
    fn slow_down_uses_stronger_friction_and_counts_down() {
        let config = SimulationConfig::default();
        let mut player = idle_player(500.0, 500.0);
        player.dx = 10.0;
        player.slow_timer = 2;
        integrate(&mut player, &config);
        assert!((player.dx - 7.0).abs() < 1e-12);
        assert_eq!(player.slow_timer, 1);
        integrate(&mut player, &config);
        integrate(&mut player, &config);
        assert_eq!(player.slow_timer, 0);
        assert!((player.dx - 10.0 * 0.7 * 0.7 * 0.98).abs() < 1e-9);
    }

    #[test]
    fn thrust_uses_heading_before_turning() {
        let config = SimulationConfig::default();
        let mut player = idle_player(500.0, 500.0);
        player.input.move_up = true;
        player.input.turn_right = true;
        integrate(&mut player, &config);
        assert!((player.dx - 0.7).abs() < 1e-12);
        assert!(player.dy.abs() < 1e-12);
        assert!((player.a - 0.2).abs() < 1e-12);
    }

    #[test]
    fn turning_left_wraps_heading() {
        let config = SimulationConfig::default();
        let mut player = idle_player(500.0, 500.0);
        player.input.turn_left = true;
        integrate(&mut player, &config);
        assert!((player.a - (TAU - 0.2)).abs() < 1e-12);
    }

    #[test]
    fn joystick_adds_velocity_and_sets_heading() {
        let config = SimulationConfig::default();
        let mut player = idle_player(500.0, 500.0);
        player.input.joystick = Vec2::new(0.0, 1.0);
        integrate(&mut player, &config);
        assert!((player.dy - 0.7).abs() < 1e-12);
        assert!((player.a - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn swiftness_boosts_thrust() {
        let config = SimulationConfig::default();
        let mut player = idle_player(500.0, 500.0);
        player.active_effects.insert(EffectKind::Swiftness);
        player.input.move_up = true;
        integrate(&mut player, &config);
        assert!((player.dx - 0.7 * 1.5).abs() < 1e-12);
    }

    #[test]
    fn velocity_is_capped_per_axis() {
        let config = SimulationConfig::default();
        let mut player = idle_player(500.0, 500.0);
        player.dx = 500.0;
        player.dy = -500.0;
        integrate(&mut player, &config);
        assert_eq!(player.dx, config.speed_limit);
        assert_eq!(player.dy, -config.speed_limit);
    }

    #[test]
    fn wrap_policy_keeps_players_on_the_torus() {
        let config = SimulationConfig {
            player_boundary: BoundaryPolicy::Wrap,
            ..SimulationConfig::default()
        };
        let mut player = idle_player(995.0, 2.0);
        player.dx = 10.0;
        player.dy = -5.0;
        integrate(&mut player, &config);
        assert!((player.x - (995.0 + 9.8 - 1_000.0)).abs() < 1e-9);
        assert!((player.y - (2.0 - 4.9 + 1_000.0)).abs() < 1e-9);
    }

    #[test]
    fn lost_players_are_frozen() {
        let mut engine = super::super::tests::engine_with_safe_area();
        engine.join("p1");
        engine.players[0].view.lost = true;
        engine.players[0].view.dx = 5.0;
        let before = engine.players[0].view.position();
        engine.integrate_players();
        assert_eq!(engine.players[0].view.position(), before);
    }
}
