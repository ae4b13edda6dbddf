use std::collections::{HashMap, HashSet};
use std::f64::consts::TAU;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use clap::Parser;
use monanimals_party_server::config::SimulationConfig;
use monanimals_party_server::constants::DEFAULT_SAFE_AREA;
use monanimals_party_server::engine::{EngineCommand, GameEngine};
use monanimals_party_server::rng::Rng;
use monanimals_party_server::types::{BoundaryPolicy, RuntimeEvent, Snapshot, Vec2};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long)]
    single: bool,
    #[arg(long)]
    bots: Option<i32>,
    #[arg(long)]
    seconds: Option<i32>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    wrap: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct Scenario {
    name: String,
    bots: usize,
    seconds: i32,
    seed: u32,
    boundary: BoundaryPolicy,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioResultLine {
    scenario: String,
    seed: u32,
    bots: usize,
    seconds: i32,
    boundary: BoundaryPolicy,
    ticks: u64,
    pushes: u32,
    #[serde(rename = "pickupsTaken")]
    pickups_taken: u32,
    #[serde(rename = "pickupsRespawned")]
    pickups_respawned: u32,
    #[serde(rename = "effectsExpired")]
    effects_expired: u32,
    losses: u32,
    resets: u32,
    #[serde(rename = "pointsAwarded")]
    points_awarded: u32,
    #[serde(rename = "topScore")]
    top_score: u64,
    digest: String,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug, Serialize)]
struct ScenarioRunResult {
    #[serde(flatten)]
    result: ScenarioResultLine,
    #[serde(rename = "anomalyRecords")]
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAt")]
    started_at: String,
    #[serde(rename = "finishedAt")]
    finished_at: String,
    #[serde(rename = "scenarioCount")]
    scenario_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageTicks")]
    average_ticks: u64,
    #[serde(rename = "totalPoints")]
    total_points: u64,
    scenarios: Vec<ScenarioResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

/// Scripted participant. Re-rolls its intent every few ticks from its own
/// generator, so both replicas receive identical command streams.
struct Bot {
    id: String,
    rng: Rng,
    joined_at_tick: u64,
    leaves_at_tick: Option<u64>,
}

impl Bot {
    fn commands(&mut self, tick: u64) -> Vec<EngineCommand> {
        let player_id = self.id.clone();
        if tick == self.joined_at_tick {
            return vec![
                EngineCommand::Join {
                    player_id: player_id.clone(),
                },
                EngineCommand::SetName {
                    player_id,
                    name: format!(" Bot {} ", self.id),
                },
            ];
        }
        if Some(tick) == self.leaves_at_tick {
            return vec![EngineCommand::Leave { player_id }];
        }
        if tick < self.joined_at_tick || self.leaves_at_tick.is_some_and(|at| tick > at) {
            return Vec::new();
        }
        if tick % 10 != 0 {
            return Vec::new();
        }

        let turn = self.rng.pick_index(3);
        let mut commands = vec![
            EngineCommand::MoveUp {
                player_id: player_id.clone(),
                active: self.rng.chance(0.7),
            },
            EngineCommand::TurnLeft {
                player_id: player_id.clone(),
                active: turn == 1,
            },
            EngineCommand::TurnRight {
                player_id: player_id.clone(),
                active: turn == 2,
            },
        ];
        let vector = if self.rng.chance(0.2) {
            Vec2::new(self.rng.range(-1.0, 2.0), self.rng.range(-1.0, 2.0))
        } else {
            Vec2::ZERO
        };
        commands.push(EngineCommand::Joystick { player_id, vector });
        commands
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let base_config = match cli.config.as_ref() {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    let scenarios = resolve_scenarios(&cli);
    let started_at = now_iso();
    let seed_hint = scenarios.first().map(|scenario| scenario.seed).unwrap_or(0);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed_hint, now_ms()));
    let mut has_anomaly = false;
    let mut scenario_results = Vec::new();
    let mut total_anomalies = 0usize;

    for scenario in scenarios {
        emit_log(
            "info",
            "scenario_started",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            None,
            json!({
                "bots": scenario.bots,
                "seconds": scenario.seconds,
                "boundary": scenario.boundary,
            }),
        );
        let scenario_run = run_scenario(&scenario, &base_config);

        for anomaly in &scenario_run.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(&scenario.name),
                Some(scenario.seed),
                Some(anomaly.tick),
                json!({
                    "message": anomaly.message,
                }),
            );
        }

        if !scenario_run.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += scenario_run.anomaly_records.len();

        emit_log(
            "info",
            "scenario_finished",
            &match_id,
            Some(&scenario.name),
            Some(scenario.seed),
            Some(scenario_run.result.ticks),
            json!({
                "pushes": scenario_run.result.pushes,
                "pointsAwarded": scenario_run.result.points_awarded,
                "digest": scenario_run.result.digest,
                "anomalyCount": scenario_run.anomaly_records.len(),
            }),
        );

        if let Ok(line) = serde_json::to_string(&scenario_run.result) {
            println!("{line}");
        }
        scenario_results.push(scenario_run.result);
    }

    let summary = build_run_summary(
        match_id.clone(),
        started_at,
        now_iso(),
        scenario_results,
        total_anomalies,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "run_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "scenarioCount": summary.scenario_count,
            "anomalyCount": summary.anomaly_count,
            "averageTicks": summary.average_ticks,
            "totalPoints": summary.total_points,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
    Ok(())
}

fn make_bots(scenario: &Scenario, total_ticks: u64) -> Vec<Bot> {
    (0..scenario.bots)
        .map(|idx| {
            let late = idx % 4 == 3;
            Bot {
                id: format!("bot_{}", idx + 1),
                rng: Rng::new(scenario.seed ^ (0x9e37_79b9u32.wrapping_mul(idx as u32 + 1))),
                joined_at_tick: if late { total_ticks / 4 } else { 1 },
                leaves_at_tick: (idx % 5 == 4).then_some(total_ticks / 2),
            }
        })
        .collect()
}

fn scenario_ticks(scenario: &Scenario, tick_ms: u64) -> u64 {
    scenario.seconds.max(1) as u64 * 1_000 / tick_ms.max(1)
}

fn run_scenario(scenario: &Scenario, base_config: &SimulationConfig) -> ScenarioRunResult {
    let config = SimulationConfig {
        seed: scenario.seed,
        player_boundary: scenario.boundary,
        ..base_config.clone()
    };
    let total_ticks = scenario_ticks(scenario, config.tick_ms);
    let mut primary = GameEngine::new(config.clone());
    let mut replica = GameEngine::new(config);
    let mut bots = make_bots(scenario, total_ticks);

    let mut pushes = 0;
    let mut pickups_taken = 0;
    let mut pickups_respawned = 0;
    let mut effects_expired = 0;
    let mut losses = 0;
    let mut resets = 0;
    let mut points_awarded = 0;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut lost_positions: HashMap<String, Vec2> = HashMap::new();
    let mut last_tick = 0u64;

    for tick in 1..=total_ticks {
        let mut commands = Vec::new();
        if tick == 1 {
            commands.push(EngineCommand::SetSafeArea(DEFAULT_SAFE_AREA));
        }
        for bot in &mut bots {
            commands.extend(bot.commands(tick));
        }
        for command in commands {
            primary.submit(command.clone());
            replica.submit(command);
        }
        primary.run_ticks(1);
        replica.run_ticks(1);

        let snapshot = primary.build_snapshot(true);
        last_tick = snapshot.tick;
        if primary.state_digest() != replica.state_digest() {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "replica state diverged".to_string(),
            );
        }
        for message in collect_snapshot_anomalies(&snapshot, &mut lost_positions) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }

        for event in &snapshot.events {
            match event {
                RuntimeEvent::PlayerPushed { .. } => pushes += 1,
                RuntimeEvent::PickupTaken { .. } => pickups_taken += 1,
                RuntimeEvent::PickupRespawned { .. } => pickups_respawned += 1,
                RuntimeEvent::EffectExpired { .. } => effects_expired += 1,
                RuntimeEvent::PlayerLost { .. } => losses += 1,
                RuntimeEvent::PlayerReset { .. } => resets += 1,
                RuntimeEvent::ScoreAwarded { .. } => points_awarded += 1,
                _ => {}
            }
        }
        let _ = replica.build_snapshot(true);
    }

    let top_score = primary
        .scores()
        .entries()
        .values()
        .copied()
        .max()
        .unwrap_or(0);

    ScenarioRunResult {
        result: ScenarioResultLine {
            scenario: scenario.name.clone(),
            seed: scenario.seed,
            bots: scenario.bots,
            seconds: scenario.seconds,
            boundary: scenario.boundary,
            ticks: last_tick,
            pushes,
            pickups_taken,
            pickups_respawned,
            effects_expired,
            losses,
            resets,
            points_awarded,
            top_score,
            digest: format!("{:016x}", primary.state_digest()),
            anomalies,
        },
        anomaly_records,
    }
}

/// `lost_positions` remembers where each lost player froze so later
/// snapshots can verify it stays put until reset.
fn collect_snapshot_anomalies(
    snapshot: &Snapshot,
    lost_positions: &mut HashMap<String, Vec2>,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    let mut seen_ids = HashSet::new();

    for player in &snapshot.players {
        if !seen_ids.insert(player.id.as_str()) {
            anomalies.push(format!("duplicate player: {}", player.id));
        }
        if !player.position().is_finite() || !player.velocity().is_finite() {
            anomalies.push(format!("non-finite player state: {}", player.id));
        }
        if !(0.0..TAU).contains(&player.a) {
            anomalies.push(format!("heading out of range: {} {}", player.id, player.a));
        }

        if player.lost {
            match lost_positions.get(&player.id) {
                Some(frozen) if *frozen != player.position() => {
                    anomalies.push(format!("lost player moved: {}", player.id));
                }
                Some(_) => {}
                None => {
                    lost_positions.insert(player.id.clone(), player.position());
                }
            }
        } else {
            lost_positions.remove(&player.id);
        }
    }
    lost_positions.retain(|id, _| seen_ids.contains(id.as_str()));

    for name in snapshot.name_map.values() {
        if name.trim().is_empty() || name.trim() != name {
            anomalies.push(format!("unnormalized name: {name:?}"));
        }
    }

    let mut holders = HashSet::new();
    for pickup in &snapshot.pickups {
        if let Some(holder) = pickup.taken_by.as_deref() {
            if !holders.insert((holder, pickup.kind)) {
                anomalies.push(format!(
                    "player {holder} holds two {:?} pickups",
                    pickup.kind
                ));
            }
        }
    }
    anomalies
}

fn resolve_scenarios(cli: &Cli) -> Vec<Scenario> {
    let seed = normalize_seed(cli.seed.unwrap_or_else(now_ms));
    let boundary = if cli.wrap {
        BoundaryPolicy::Wrap
    } else {
        BoundaryPolicy::Eliminate
    };

    if cli.single || cli.bots.is_some() || cli.seconds.is_some() {
        let bots = cli.bots.unwrap_or(4).clamp(1, 64);
        return vec![Scenario {
            name: format!("custom-bots{bots}"),
            bots: bots as usize,
            seconds: cli.seconds.unwrap_or(60).clamp(1, 600),
            seed,
            boundary,
        }];
    }

    vec![
        Scenario {
            name: "quick-check-bots4".to_string(),
            bots: 4,
            seconds: 30,
            seed,
            boundary,
        },
        Scenario {
            name: "crowd-check-bots12".to_string(),
            bots: 12,
            seconds: 120,
            seed: normalize_seed(u64::from(seed) + 1),
            boundary,
        },
    ]
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at: String,
    finished_at: String,
    scenarios: Vec<ScenarioResultLine>,
    anomaly_count: usize,
) -> RunSummary {
    let scenario_count = scenarios.len();
    let total_ticks: u64 = scenarios.iter().map(|scenario| scenario.ticks).sum();
    let average_ticks = if scenario_count == 0 {
        0
    } else {
        total_ticks / scenario_count as u64
    };
    let total_points = scenarios
        .iter()
        .map(|scenario| u64::from(scenario.points_awarded))
        .sum();
    RunSummary {
        match_id,
        started_at,
        finished_at,
        scenario_count,
        anomaly_count,
        average_ticks,
        total_points,
        scenarios,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    scenario: Option<&str>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        scenario: scenario.map(|value| value.to_string()),
        seed,
        tick,
        details,
    };
    if let Ok(line) = serde_json::to_string(&log_line) {
        eprintln!("{line}");
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_scenario_result(ticks: u64, points_awarded: u32) -> ScenarioResultLine {
        ScenarioResultLine {
            scenario: "test".to_string(),
            seed: 42,
            bots: 3,
            seconds: 1,
            boundary: BoundaryPolicy::Eliminate,
            ticks,
            pushes: 0,
            pickups_taken: 0,
            pickups_respawned: 0,
            effects_expired: 0,
            losses: 0,
            resets: 0,
            points_awarded,
            top_score: 0,
            digest: "0".to_string(),
            anomalies: Vec::new(),
        }
    }

    fn scenario(bots: usize, seconds: i32, seed: u32) -> Scenario {
        Scenario {
            name: "unit".to_string(),
            bots,
            seconds,
            seed,
            boundary: BoundaryPolicy::Eliminate,
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_averages() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            "a".to_string(),
            "b".to_string(),
            vec![make_scenario_result(600, 2), make_scenario_result(1_000, 3)],
            1,
        );
        assert_eq!(summary.average_ticks, 800);
        assert_eq!(summary.total_points, 5);
        assert_eq!(summary.scenario_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("monanimals-missing-{}", rand::random::<u32>()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            "a".to_string(),
            "b".to_string(),
            vec![make_scenario_result(600, 0)],
            0,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn short_scenario_runs_clean_and_reproducibly() {
        let config = SimulationConfig::default();
        let first = run_scenario(&scenario(6, 20, 7), &config);
        let second = run_scenario(&scenario(6, 20, 7), &config);

        assert!(first.result.anomalies.is_empty(), "{:?}", first.result.anomalies);
        assert_eq!(first.result.ticks, 400);
        assert_eq!(first.result.digest, second.result.digest);
        assert_eq!(first.result.pushes, second.result.pushes);
    }

    #[test]
    fn wrap_scenario_never_loses_players() {
        let config = SimulationConfig::default();
        let mut wrap = scenario(4, 20, 11);
        wrap.boundary = BoundaryPolicy::Wrap;
        let run = run_scenario(&wrap, &config);
        assert!(run.result.anomalies.is_empty(), "{:?}", run.result.anomalies);
        assert_eq!(run.result.losses, 0);
    }

    #[test]
    fn bots_join_name_and_leave_on_schedule() {
        let mut bots = make_bots(&scenario(5, 20, 3), 400);
        let late = &mut bots[3];
        assert_eq!(late.joined_at_tick, 100);
        assert!(late.commands(1).is_empty());

        let leaver = &mut bots[4];
        assert_eq!(leaver.leaves_at_tick, Some(200));
        assert_eq!(
            leaver.commands(200),
            vec![EngineCommand::Leave {
                player_id: "bot_5".to_string()
            }]
        );
        assert!(leaver.commands(210).is_empty());
    }

    #[test]
    fn lost_player_that_moves_is_reported() {
        let mut engine = GameEngine::new(SimulationConfig::default());
        engine.join("p1");
        let mut snapshot = engine.build_snapshot(false);
        snapshot.players[0].lost = true;
        let mut lost_positions = HashMap::new();
        assert!(collect_snapshot_anomalies(&snapshot, &mut lost_positions).is_empty());

        snapshot.players[0].x += 1.0;
        let anomalies = collect_snapshot_anomalies(&snapshot, &mut lost_positions);
        assert_eq!(anomalies, vec!["lost player moved: p1".to_string()]);
    }
}
