use serde_json::{Map, Value};

use crate::engine::EngineCommand;
use crate::types::{SafeArea, Vec2};

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Hello {
        identity: Option<String>,
        name: Option<String>,
    },
    TurnLeft {
        active: bool,
    },
    TurnRight {
        active: bool,
    },
    MoveUp {
        active: bool,
    },
    Joystick {
        vector: Vec2,
    },
    SetName {
        name: String,
    },
    SafeAreaSet {
        area: SafeArea,
    },
    Ping {
        t: f64,
    },
}

impl ParsedClientMessage {
    /// Maps a gameplay message onto the engine intent for `player_id`.
    /// Session-level messages (`hello`, `ping`) have no engine counterpart.
    pub fn into_command(self, player_id: &str) -> Option<EngineCommand> {
        let player_id = player_id.to_string();
        match self {
            Self::TurnLeft { active } => Some(EngineCommand::TurnLeft { player_id, active }),
            Self::TurnRight { active } => Some(EngineCommand::TurnRight { player_id, active }),
            Self::MoveUp { active } => Some(EngineCommand::MoveUp { player_id, active }),
            Self::Joystick { vector } => Some(EngineCommand::Joystick { player_id, vector }),
            Self::SetName { name } => Some(EngineCommand::SetName { player_id, name }),
            Self::SafeAreaSet { area } => Some(EngineCommand::SetSafeArea(area)),
            Self::Hello { .. } | Self::Ping { .. } => None,
        }
    }
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "hello" => {
            let identity = parse_optional_string(object.get("identity"))?;
            let name = parse_optional_string(object.get("name"))?;
            Some(ParsedClientMessage::Hello { identity, name })
        }
        "turn-left" => Some(ParsedClientMessage::TurnLeft {
            active: parse_active(object)?,
        }),
        "turn-right" => Some(ParsedClientMessage::TurnRight {
            active: parse_active(object)?,
        }),
        "move-up" => Some(ParsedClientMessage::MoveUp {
            active: parse_active(object)?,
        }),
        "joystick" => {
            let x = parse_finite(object.get("x"))?;
            let y = parse_finite(object.get("y"))?;
            Some(ParsedClientMessage::Joystick {
                vector: Vec2::new(x, y),
            })
        }
        "set-name" => {
            let name = object.get("name")?.as_str()?.to_string();
            Some(ParsedClientMessage::SetName { name })
        }
        "safe-area-set" => {
            let area = SafeArea {
                x: parse_finite(object.get("x"))?,
                y: parse_finite(object.get("y"))?,
                width: parse_finite(object.get("width"))?,
                height: parse_finite(object.get("height"))?,
            };
            if !area.is_valid() {
                return None;
            }
            Some(ParsedClientMessage::SafeAreaSet { area })
        }
        "ping" => {
            let t = parse_finite(object.get("t"))?;
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

fn parse_active(object: &Map<String, Value>) -> Option<bool> {
    object.get("active")?.as_bool()
}

fn parse_finite(value: Option<&Value>) -> Option<f64> {
    let number = value?.as_f64()?;
    number.is_finite().then_some(number)
}

fn parse_optional_string(value: Option<&Value>) -> Option<Option<String>> {
    match value {
        None | Some(Value::Null) => Some(None),
        Some(value) => Some(Some(value.as_str()?.to_string())),
    }
}
