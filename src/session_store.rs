use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ledger::{PersistedSession, SESSION_VERSION};

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode session for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported session version {found} at {path}")]
    UnsupportedVersion { path: String, found: u64 },
}

#[derive(Serialize)]
struct SessionFile<'a> {
    version: u8,
    #[serde(rename = "savedAt")]
    saved_at: String,
    #[serde(rename = "nameMap")]
    name_map: &'a std::collections::BTreeMap<String, String>,
    scoreboard: &'a std::collections::BTreeMap<String, u64>,
}

/// JSON file holding the last persisted `{nameMap, scoreboard}` pair.
pub struct SessionStore {
    file_path: PathBuf,
}

impl SessionStore {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// A missing file is an empty session, not an error.
    pub fn load(&self) -> Result<PersistedSession, SessionStoreError> {
        let text = match fs::read_to_string(&self.file_path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.file_path.display(), "no stored session");
                return Ok(PersistedSession::from_value(None));
            }
            Err(source) => {
                return Err(SessionStoreError::Io {
                    path: self.display_path(),
                    source,
                })
            }
        };
        let raw: Value =
            serde_json::from_str(&text).map_err(|source| SessionStoreError::Parse {
                path: self.display_path(),
                source,
            })?;
        if let Some(found) = raw.get("version").and_then(Value::as_u64) {
            if found > u64::from(SESSION_VERSION) {
                return Err(SessionStoreError::UnsupportedVersion {
                    path: self.display_path(),
                    found,
                });
            }
        }

        let session = PersistedSession::from_value(Some(&raw));
        info!(
            path = %self.file_path.display(),
            scores = session.scoreboard.len(),
            names = session.name_map.len(),
            "session loaded"
        );
        Ok(session)
    }

    /// Like `load`, but any failure is logged and yields an empty session.
    pub fn load_or_default(&self) -> PersistedSession {
        match self.load() {
            Ok(session) => session,
            Err(error) => {
                warn!(%error, "ignoring stored session");
                PersistedSession::from_value(None)
            }
        }
    }

    /// Writes through a sibling temp file so a crash never leaves a torn file.
    pub fn save(&self, session: &PersistedSession) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SessionStoreError::Io {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let payload = SessionFile {
            version: SESSION_VERSION,
            saved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            name_map: &session.name_map,
            scoreboard: &session.scoreboard,
        };
        let text =
            serde_json::to_string_pretty(&payload).map_err(|source| SessionStoreError::Encode {
                path: self.display_path(),
                source,
            })?;

        let tmp_path = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_path, text).map_err(|source| SessionStoreError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        fs::rename(&tmp_path, &self.file_path).map_err(|source| SessionStoreError::Io {
            path: self.display_path(),
            source,
        })?;
        debug!(path = %self.file_path.display(), "session saved");
        Ok(())
    }

    fn display_path(&self) -> String {
        self.file_path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{NameDirectory, ScoreLedger};

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u32>()
        );
        std::env::temp_dir().join(unique).join("session.json")
    }

    fn cleanup(path: &Path) {
        let _ = fs::remove_file(path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn missing_file_loads_empty_session() {
        let path = temp_file("session-store-missing");
        let store = SessionStore::new(path);
        let session = store.load().expect("missing file is fine");
        assert!(session.scoreboard.is_empty());
        assert!(session.name_map.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = temp_file("session-store-round-trip");
        let store = SessionStore::new(path.clone());

        let mut scores = ScoreLedger::new();
        scores.set_score("p1", 3).expect("valid score");
        scores.set_score("p2", 0).expect("valid score");
        let mut names = NameDirectory::new();
        names.set_name("p1", " Aria ").expect("valid name");
        let session = PersistedSession::capture(&scores, &names);

        store.save(&session).expect("save");
        let text = fs::read_to_string(&path).expect("file written");
        let raw: Value = serde_json::from_str(&text).expect("valid json");
        assert!(raw.get("savedAt").and_then(Value::as_str).is_some());

        let loaded = store.load().expect("load");
        assert_eq!(loaded, session);

        cleanup(&path);
    }

    #[test]
    fn load_accepts_pair_lists() {
        let path = temp_file("session-store-pairs");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        let raw = r#"{
  "version": 1,
  "nameMap": [["p1", "Aria"]],
  "scoreboard": [["p1", 7], ["p2", -1]]
}"#;
        fs::write(&path, raw).expect("write file");

        let session = SessionStore::new(path.clone()).load().expect("load");
        assert_eq!(session.scoreboard.get("p1"), Some(&7));
        assert_eq!(session.scoreboard.get("p2"), None);
        assert_eq!(session.name_map.get("p1").map(String::as_str), Some("Aria"));

        cleanup(&path);
    }

    #[test]
    fn corrupt_or_newer_files_are_reported() {
        let path = temp_file("session-store-corrupt");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        let store = SessionStore::new(path.clone());

        fs::write(&path, "{ not json").expect("write file");
        assert!(matches!(store.load(), Err(SessionStoreError::Parse { .. })));
        assert!(store.load_or_default().scoreboard.is_empty());

        fs::write(&path, r#"{"version": 9, "scoreboard": {"p1": 1}}"#).expect("write file");
        assert!(matches!(
            store.load(),
            Err(SessionStoreError::UnsupportedVersion { found: 9, .. })
        ));

        cleanup(&path);
    }
}
