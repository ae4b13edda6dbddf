use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::SimulationConfig;
use crate::ledger::{LedgerError, NameDirectory, PersistedSession, ScoreLedger};
use crate::rng::Rng;
use crate::scheduler::Scheduler;
use crate::types::{
    EffectKind, PickupView, PlayerInput, PlayerView, RuntimeEvent, SafeArea, Snapshot, Vec2,
};

mod bounds;
mod collision;
mod effects;
mod movement;
mod spawn_system;
mod utils;

pub use self::utils::{Collidable, Movable};

#[derive(Clone, Debug, PartialEq)]
pub enum EngineCommand {
    Join { player_id: String },
    Leave { player_id: String },
    TurnLeft { player_id: String, active: bool },
    TurnRight { player_id: String, active: bool },
    MoveUp { player_id: String, active: bool },
    Joystick { player_id: String, vector: Vec2 },
    SetName { player_id: String, name: String },
    SetSafeArea(SafeArea),
}

// Player-targeted calls carry the incarnation they were scheduled for.
#[derive(Clone, Debug, PartialEq)]
pub enum ScheduledCall {
    Tick,
    ExpireEffect {
        player_id: String,
        incarnation: u64,
        kind: EffectKind,
        pickup_id: u32,
    },
    ResetPlayer {
        player_id: String,
        incarnation: u64,
    },
}

#[derive(Clone, Debug)]
struct PlayerInternal {
    view: PlayerView,
    spawn: Vec2,
    incarnation: u64,
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    pub config: SimulationConfig,

    rng: Rng,
    players: Vec<PlayerInternal>,
    pickups: Vec<PickupView>,
    safe_area: Option<SafeArea>,
    scores: ScoreLedger,
    names: NameDirectory,
    scheduler: Scheduler<ScheduledCall>,
    pending: VecDeque<EngineCommand>,
    events: Vec<RuntimeEvent>,

    now_ms: u64,
    tick_counter: u64,
    next_incarnation: u64,
    persist_requested: bool,
}

impl GameEngine {
    pub fn new(config: SimulationConfig) -> Self {
        Self::with_session(config, None)
    }

    pub fn with_session(config: SimulationConfig, persisted: Option<&Value>) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(config.tick_ms, ScheduledCall::Tick);

        let mut engine = Self {
            rng: Rng::new(config.seed),
            config,
            players: Vec::new(),
            pickups: Vec::new(),
            safe_area: None,
            scores: ScoreLedger::new(),
            names: NameDirectory::new(),
            scheduler,
            pending: VecDeque::new(),
            events: Vec::new(),
            now_ms: 0,
            tick_counter: 0,
            next_incarnation: 1,
            persist_requested: false,
        };
        engine.restore_session(persisted);
        engine.spawn_pickup_pool();
        engine
    }

    pub fn submit(&mut self, command: EngineCommand) {
        self.pending.push_back(command);
    }

    pub fn advance(&mut self, dt_ms: u64) {
        let target_ms = self.now_ms.saturating_add(dt_ms);
        while let Some((fire_at, call)) = self.scheduler.pop_due(target_ms) {
            self.now_ms = fire_at;
            self.dispatch(call);
        }
        self.now_ms = target_ms;
    }

    pub fn run_ticks(&mut self, ticks: u64) {
        self.advance(self.config.tick_ms.saturating_mul(ticks));
    }

    fn dispatch(&mut self, call: ScheduledCall) {
        match call {
            ScheduledCall::Tick => {
                self.run_tick();
                self.scheduler
                    .schedule_after(self.now_ms, self.config.tick_ms, ScheduledCall::Tick);
            }
            ScheduledCall::ExpireEffect {
                player_id,
                incarnation,
                kind,
                pickup_id,
            } => self.expire_effect(&player_id, incarnation, kind, pickup_id),
            ScheduledCall::ResetPlayer {
                player_id,
                incarnation,
            } => self.reset_player(&player_id, incarnation),
        }
    }

    fn run_tick(&mut self) {
        self.tick_counter += 1;
        self.apply_pending_commands();
        self.integrate_players();
        self.resolve_pickup_collisions();
        self.resolve_player_collisions();
        self.check_player_bounds();
    }

    fn apply_pending_commands(&mut self) {
        while let Some(command) = self.pending.pop_front() {
            self.apply_command(command);
        }
    }

    fn apply_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Join { player_id } => {
                self.join(&player_id);
            }
            EngineCommand::Leave { player_id } => self.leave(&player_id),
            EngineCommand::TurnLeft { player_id, active } => {
                self.update_input(&player_id, |input| input.turn_left = active);
            }
            EngineCommand::TurnRight { player_id, active } => {
                self.update_input(&player_id, |input| input.turn_right = active);
            }
            EngineCommand::MoveUp { player_id, active } => {
                self.update_input(&player_id, |input| input.move_up = active);
            }
            EngineCommand::Joystick { player_id, vector } => {
                let vector = sanitize_joystick(vector);
                self.update_input(&player_id, |input| input.joystick = vector);
            }
            EngineCommand::SetName { player_id, name } => {
                let _ = self.set_name(&player_id, &name);
            }
            EngineCommand::SetSafeArea(area) => {
                self.set_safe_area(area);
            }
        }
    }

    fn update_input(&mut self, player_id: &str, apply: impl FnOnce(&mut PlayerInput)) {
        match self.index_of(player_id) {
            Some(idx) => apply(&mut self.players[idx].view.input),
            None => debug!(player_id, "input for unknown player ignored"),
        }
    }

    pub fn join(&mut self, player_id: &str) -> &PlayerView {
        if let Some(idx) = self.index_of(player_id) {
            warn!(player_id, "duplicate join ignored");
            return &self.players[idx].view;
        }

        let player = self.make_player(player_id);
        info!(
            player_id,
            x = player.view.x,
            y = player.view.y,
            "player joined"
        );
        self.players.push(player);
        self.events.push(RuntimeEvent::PlayerJoined {
            player_id: player_id.to_string(),
        });
        let idx = self.players.len() - 1;
        &self.players[idx].view
    }

    pub fn leave(&mut self, player_id: &str) {
        let Some(idx) = self.index_of(player_id) else {
            warn!(player_id, "leave for unknown player ignored");
            return;
        };
        self.players.remove(idx);
        self.events.push(RuntimeEvent::PlayerLeft {
            player_id: player_id.to_string(),
        });
        info!(player_id, "player left");
    }

    pub fn set_safe_area(&mut self, area: SafeArea) -> bool {
        if self.safe_area.is_some() {
            debug!("safe area already configured");
            return false;
        }
        if !area.is_valid() {
            warn!(?area, "rejected invalid safe area");
            return false;
        }
        info!(?area, "safe area configured");
        self.safe_area = Some(area);
        self.check_pickup_bounds();
        true
    }

    pub fn set_name(&mut self, player_id: &str, raw_name: &str) -> Result<(), LedgerError> {
        self.names.set_name(player_id, raw_name)?;
        self.persist_requested = true;
        Ok(())
    }

    pub fn set_score(&mut self, player_id: &str, value: i64) -> Result<(), LedgerError> {
        self.scores.set_score(player_id, value)?;
        self.persist_requested = true;
        Ok(())
    }

    pub fn restore_session(&mut self, persisted: Option<&Value>) {
        let (scores, names) = PersistedSession::from_value(persisted).into_parts();
        info!(
            scores = scores.len(),
            names = names.entries().len(),
            "session restored"
        );
        self.scores = scores;
        self.names = names;
    }

    pub fn persisted_session(&self) -> PersistedSession {
        PersistedSession::capture(&self.scores, &self.names)
    }

    pub fn take_persist_request(&mut self) -> Option<PersistedSession> {
        if !self.persist_requested {
            return None;
        }
        self.persist_requested = false;
        Some(self.persisted_session())
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        Snapshot {
            tick: self.tick_counter,
            now_ms: self.now_ms,
            safe_area: self.safe_area,
            players: self.players.iter().map(|p| p.view.clone()).collect(),
            pickups: self.pickups.clone(),
            scoreboard: self.scores.entries().clone(),
            name_map: self.names.entries().clone(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerView> {
        self.index_of(player_id).map(|idx| &self.players[idx].view)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerView> {
        self.players.iter().map(|player| &player.view)
    }

    pub fn pickups(&self) -> &[PickupView] {
        &self.pickups
    }

    pub fn safe_area(&self) -> Option<SafeArea> {
        self.safe_area
    }

    pub fn scores(&self) -> &ScoreLedger {
        &self.scores
    }

    pub fn names(&self) -> &NameDirectory {
        &self.names
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn tick(&self) -> u64 {
        self.tick_counter
    }

    pub fn pending_callbacks(&self) -> usize {
        self.scheduler.len()
    }

    pub fn state_digest(&self) -> u64 {
        utils::digest_state(
            self.tick_counter,
            self.rng.state(),
            self.players.iter().map(|player| &player.view),
            &self.pickups,
            self.scores.entries(),
        )
    }

    fn index_of(&self, player_id: &str) -> Option<usize> {
        self.players
            .iter()
            .position(|player| player.view.id == player_id)
    }

    fn index_of_incarnation(&self, player_id: &str, incarnation: u64) -> Option<usize> {
        self.players
            .iter()
            .position(|player| player.view.id == player_id && player.incarnation == incarnation)
    }
}

fn sanitize_joystick(vector: Vec2) -> Vec2 {
    if !vector.is_finite() {
        return Vec2::ZERO;
    }
    Vec2::new(vector.x.clamp(-1.0, 1.0), vector.y.clamp(-1.0, 1.0))
}
