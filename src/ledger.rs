//! Score and display-name bookkeeping plus the persisted session layout.
//!
//! Both mappings only change through validated setters. A rejected write is
//! logged and leaves the mapping untouched; callers may inspect the returned
//! error but nothing escalates past them.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

pub const SESSION_VERSION: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("score for {player_id} must not be negative (got {value})")]
    NegativeScore { player_id: String, value: String },
    #[error("score for {player_id} is not a whole number: {value}")]
    NonNumericScore { player_id: String, value: String },
    #[error("name for {player_id} is empty after trimming")]
    EmptyName { player_id: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreLedger {
    scores: BTreeMap<String, u64>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player_id: &str) -> u64 {
        self.scores.get(player_id).copied().unwrap_or(0)
    }

    /// Overwrites the score. Not monotonic: a lower value replaces a higher one.
    pub fn set_score(&mut self, player_id: &str, value: i64) -> Result<(), LedgerError> {
        let Ok(score) = u64::try_from(value) else {
            let error = LedgerError::NegativeScore {
                player_id: player_id.to_string(),
                value: value.to_string(),
            };
            warn!(%error, "rejected score");
            return Err(error);
        };
        self.scores.insert(player_id.to_string(), score);
        Ok(())
    }

    /// Same as [`ScoreLedger::set_score`] for untyped input such as wire or
    /// restore payloads.
    pub fn set_score_value(&mut self, player_id: &str, value: &Value) -> Result<(), LedgerError> {
        match parse_score(player_id, value) {
            Ok(score) => {
                self.scores.insert(player_id.to_string(), score);
                Ok(())
            }
            Err(error) => {
                warn!(%error, "rejected score");
                Err(error)
            }
        }
    }

    pub fn award_point(&mut self, player_id: &str) -> u64 {
        let score = self.get(player_id).saturating_add(1);
        self.scores.insert(player_id.to_string(), score);
        score
    }

    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.scores
    }

    pub(crate) fn len(&self) -> usize {
        self.scores.len()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameDirectory {
    names: BTreeMap<String, String>,
}

impl NameDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player_id: &str) -> Option<&str> {
        self.names.get(player_id).map(String::as_str)
    }

    /// Name to show for a player, falling back to the identity itself.
    pub fn display_name<'a>(&'a self, player_id: &'a str) -> &'a str {
        self.get(player_id).unwrap_or(player_id)
    }

    pub fn set_name(&mut self, player_id: &str, raw_name: &str) -> Result<(), LedgerError> {
        let trimmed = raw_name.trim();
        if trimmed.is_empty() {
            let error = LedgerError::EmptyName {
                player_id: player_id.to_string(),
            };
            warn!(%error, "rejected name");
            return Err(error);
        }
        self.names.insert(player_id.to_string(), trimmed.to_string());
        Ok(())
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.names
    }
}

/// Opaque persisted layout: `{ version, nameMap, scoreboard }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PersistedSession {
    pub version: u8,
    #[serde(rename = "nameMap")]
    pub name_map: BTreeMap<String, String>,
    pub scoreboard: BTreeMap<String, u64>,
}

impl PersistedSession {
    pub fn capture(scores: &ScoreLedger, names: &NameDirectory) -> Self {
        Self {
            version: SESSION_VERSION,
            name_map: names.names.clone(),
            scoreboard: scores.scores.clone(),
        }
    }

    pub fn into_parts(self) -> (ScoreLedger, NameDirectory) {
        (
            ScoreLedger {
                scores: self.scoreboard,
            },
            NameDirectory {
                names: self.name_map,
            },
        )
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Restores a session from whatever shape was stored.
    ///
    /// Each mapping may be absent/null, a plain object, or a list of
    /// `[key, value]` pairs (the shape a native map takes when it is
    /// serialized entry-wise). Invalid entries are dropped with a warning.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(root) = value.filter(|value| !value.is_null()) else {
            return Self {
                version: SESSION_VERSION,
                ..Self::default()
            };
        };
        let Some(object) = root.as_object() else {
            warn!("persisted session is not an object; starting empty");
            return Self {
                version: SESSION_VERSION,
                ..Self::default()
            };
        };

        if let Some(version) = object.get("version").and_then(Value::as_u64) {
            if version > SESSION_VERSION as u64 {
                warn!(version, "persisted session is newer than supported; loading best effort");
            }
        }

        let mut scores = ScoreLedger::new();
        for (player_id, raw) in mapping_entries("scoreboard", object.get("scoreboard")) {
            // rejected entries are logged by the ledger and dropped
            let _ = scores.set_score_value(&player_id, &raw);
        }

        let mut name_map = BTreeMap::new();
        for (player_id, raw) in mapping_entries("nameMap", object.get("nameMap")) {
            let trimmed = raw.as_str().map(str::trim).unwrap_or_default();
            if trimmed.is_empty() {
                warn!(player_id = %player_id, "dropped persisted name");
                continue;
            }
            name_map.insert(player_id, trimmed.to_string());
        }

        Self {
            version: SESSION_VERSION,
            name_map,
            scoreboard: scores.scores,
        }
    }
}

fn mapping_entries(field: &str, value: Option<&Value>) -> Vec<(String, Value)> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        Some(Value::Array(pairs)) => pairs
            .iter()
            .filter_map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([Value::String(key), value]) => Some((key.clone(), value.clone())),
                _ => {
                    warn!(field, "dropped malformed map entry");
                    None
                }
            })
            .collect(),
        Some(_) => {
            warn!(field, "persisted mapping has unexpected shape; treating as empty");
            Vec::new()
        }
    }
}

fn parse_score(player_id: &str, value: &Value) -> Result<u64, LedgerError> {
    if let Some(score) = value.as_u64() {
        return Ok(score);
    }
    if value.as_i64().is_some() {
        return Err(LedgerError::NegativeScore {
            player_id: player_id.to_string(),
            value: value.to_string(),
        });
    }
    if let Some(number) = value.as_f64() {
        if number.is_finite() && number < 0.0 {
            return Err(LedgerError::NegativeScore {
                player_id: player_id.to_string(),
                value: value.to_string(),
            });
        }
        if number.is_finite() && number.fract() == 0.0 && number <= u64::MAX as f64 {
            return Ok(number as u64);
        }
    }
    Err(LedgerError::NonNumericScore {
        player_id: player_id.to_string(),
        value: value.to_string(),
    })
}
