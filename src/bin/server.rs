use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use monanimals_party_server::config::SimulationConfig;
use monanimals_party_server::engine::{EngineCommand, GameEngine};
use monanimals_party_server::server_protocol::{parse_client_message, ParsedClientMessage};
use monanimals_party_server::server_utils::{
    make_identity, normalize_identity, parse_port, parse_scoreboard_limit, parse_seed,
};
use monanimals_party_server::session_store::SessionStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    player_id: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    active_client_by_player_id: HashMap<String, String>,
    engine: GameEngine,
    session_store: SessionStore,
}

impl ServerState {
    fn new(engine: GameEngine, session_store: SessionStore) -> Self {
        Self {
            clients: HashMap::new(),
            active_client_by_player_id: HashMap::new(),
            engine,
            session_store,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScoreboardQuery {
    limit: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScoreboardEntry {
    #[serde(rename = "playerId")]
    player_id: String,
    name: String,
    score: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = parse_port(std::env::var("PORT").ok().as_deref(), 8080);
    let config = load_config()?;

    let session_path = std::env::var("SESSION_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/session.json"));
    let session_store = SessionStore::new(session_path);
    let persisted = session_store.load_or_default().to_value();

    info!(seed = config.seed, tick_ms = config.tick_ms, "starting simulation");
    let engine = GameEngine::with_session(config, Some(&persisted));
    let state = Arc::new(Mutex::new(ServerState::new(engine, session_store)));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/scoreboard", get(scoreboard_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        warn!("static file root not found; serving API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(port, "listening");
    axum::serve(listener, app)
        .await
        .context("server runtime failed")?;
    Ok(())
}

fn load_config() -> Result<SimulationConfig> {
    let mut config = match std::env::var("SIM_CONFIG_PATH") {
        Ok(raw) => {
            let path = PathBuf::from(raw);
            SimulationConfig::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        Err(_) => SimulationConfig {
            seed: parse_seed(None),
            ..SimulationConfig::default()
        },
    };
    if let Ok(raw) = std::env::var("SIM_SEED") {
        config.seed = parse_seed(Some(&raw));
    }
    Ok(config)
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("dist"), PathBuf::from("public")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn scoreboard_handler(
    State(state): State<SharedState>,
    Query(query): Query<ScoreboardQuery>,
) -> impl IntoResponse {
    let guard = state.lock().await;
    let names = guard.engine.names();
    let mut entries: Vec<ScoreboardEntry> = guard
        .engine
        .scores()
        .entries()
        .iter()
        .map(|(player_id, score)| ScoreboardEntry {
            player_id: player_id.clone(),
            name: names.display_name(player_id).to_string(),
            score: *score,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    entries.truncate(parse_scoreboard_limit(query.limit.as_deref()));
    Json(json!({ "entries": entries }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_identity();
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                player_id: None,
            },
        );
    }
    debug!(client_id = %client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = std::str::from_utf8(&raw) {
                    handle_client_message(&state, &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(&state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error_to_client(state, client_id, "invalid message").await;
        return;
    };

    let mut guard = state.lock().await;
    match message {
        ParsedClientMessage::Hello { identity, name } => {
            handle_hello(&mut guard, client_id, identity, name);
        }
        ParsedClientMessage::Ping { t } => {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        gameplay => {
            let player_id = guard
                .clients
                .get(client_id)
                .and_then(|ctx| ctx.player_id.clone());
            let Some(player_id) = player_id else {
                send_to_client(
                    &mut guard,
                    client_id,
                    &json!({
                        "type": "error",
                        "message": "send hello first",
                    }),
                    QueuePolicy::DisconnectOnFull,
                );
                return;
            };
            if let Some(command) = gameplay.into_command(&player_id) {
                guard.engine.submit(command);
            }
        }
    }
}

fn handle_hello(
    state: &mut ServerState,
    client_id: &str,
    identity: Option<String>,
    name: Option<String>,
) {
    let already_bound = state
        .clients
        .get(client_id)
        .and_then(|ctx| ctx.player_id.clone());
    if already_bound.is_some() {
        send_to_client(
            state,
            client_id,
            &json!({
                "type": "error",
                "message": "hello already received",
            }),
            QueuePolicy::DisconnectOnFull,
        );
        return;
    }

    let player_id = normalize_identity(identity.as_deref()).unwrap_or_else(make_identity);
    let rejoining = state.active_client_by_player_id.contains_key(&player_id);
    bind_client_to_player(state, client_id, &player_id);

    if !rejoining {
        state.engine.submit(EngineCommand::Join {
            player_id: player_id.clone(),
        });
    }
    if let Some(name) = name {
        state.engine.submit(EngineCommand::SetName {
            player_id: player_id.clone(),
            name,
        });
    }
    info!(client_id, player_id = %player_id, rejoining, "hello");

    let seed = state.engine.config.seed;
    let tick_ms = state.engine.config.tick_ms;
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "welcome",
            "playerId": player_id,
            "seed": seed,
            "tickMs": tick_ms,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

async fn handle_disconnect(state: &SharedState, client_id: &str) {
    let mut guard = state.lock().await;
    disconnect_client_internal(&mut guard, client_id);
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    let Some(context) = state.clients.remove(client_id) else {
        return;
    };
    let Some(bound_player_id) = context.player_id else {
        return;
    };

    if state
        .active_client_by_player_id
        .get(&bound_player_id)
        .map(|active| active != client_id)
        .unwrap_or(true)
    {
        return;
    }

    state.active_client_by_player_id.remove(&bound_player_id);
    state.engine.submit(EngineCommand::Leave {
        player_id: bound_player_id.clone(),
    });
    info!(client_id, player_id = %bound_player_id, "client disconnected");
}

fn bind_client_to_player(state: &mut ServerState, client_id: &str, player_id: &str) {
    if let Some(old_client_id) = state.active_client_by_player_id.get(player_id).cloned() {
        if old_client_id != client_id {
            if let Some(old_client) = state.clients.get_mut(&old_client_id) {
                old_client.player_id = None;
                let _ = old_client.tx.try_send(OutboundMessage::Close {
                    code: 4001,
                    reason: "superseded by new connection".to_string(),
                });
            }
        }
    }

    if let Some(ctx) = state.clients.get_mut(client_id) {
        ctx.player_id = Some(player_id.to_string());
    }
    state
        .active_client_by_player_id
        .insert(player_id.to_string(), client_id.to_string());
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let tick_ms = state.lock().await.engine.config.tick_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_simulation(&mut guard, tick_ms);
        }
    });
}

fn tick_simulation(state: &mut ServerState, tick_ms: u64) {
    state.engine.advance(tick_ms);
    let snapshot = state.engine.build_snapshot(true);

    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
        QueuePolicy::DropOnFull,
    );

    if let Some(session) = state.engine.take_persist_request() {
        if let Err(error) = state.session_store.save(&session) {
            error!(%error, "failed to persist session");
        }
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        disconnect_client_internal(state, client_id);
    }
}

fn broadcast(state: &mut ServerState, message: &Value, policy: QueuePolicy) {
    let payload = message.to_string();
    let mut failed_clients = Vec::new();
    for (client_id, client) in &state.clients {
        if !can_receive_broadcast(state, client_id, client) {
            continue;
        }
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        disconnect_client_internal(state, &client_id);
    }
}

fn can_receive_broadcast(state: &ServerState, client_id: &str, client: &ClientContext) -> bool {
    let Some(player_id) = client.player_id.as_ref() else {
        return false;
    };
    state
        .active_client_by_player_id
        .get(player_id)
        .map(|id| id.as_str())
        == Some(client_id)
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}
