use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted session artifact, one per session key.
///
/// Validity is not self-describing: whether the token is still accepted
/// is only discoverable through a probe call against the provider.
/// There is no schema version field; format changes are not backward
/// compatible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token_type: String,
    pub access_token: String,
    pub refresh_token: String,
    pub device_token: String,
    pub saved_at: DateTime<Utc>,
}

/// Session key derived from a username: the text preceding `@`.
/// A username without `@` is its own key.
pub fn session_key(username: &str) -> &str {
    match username.find('@') {
        Some(idx) => &username[..idx],
        None => username,
    }
}

/// File-backed store for session records.
///
/// Records are JSON files named `session_<key>.json` under one
/// directory. Writes go through a temp file and an atomic rename so a
/// record on disk is never partially written.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("session_{}.json", key))
    }

    /// Load the record for a key. A missing file is `Ok(None)`; an
    /// unreadable or malformed file is an error the caller treats as a
    /// cache miss.
    pub fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        let path = self.record_path(key);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to read session record for {}", key))
            }
        };
        let record: SessionRecord = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session record for {}", key))?;
        Ok(Some(record))
    }

    /// Persist a record for a key, overwriting any prior record.
    pub fn save(&self, key: &str, record: &SessionRecord) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .context("Failed to create session directory")?;
        let path = self.record_path(key);
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(record)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write session record for {}", key))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to store session record for {}", key))?;
        Ok(())
    }

    /// Delete the record for a key. Succeeds if none exists.
    pub fn clear(&self, key: &str) -> Result<()> {
        let path = self.record_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to delete session record for {}", key))
            }
        }
    }

    /// Whether a record exists on disk for this key.
    pub fn exists(&self, key: &str) -> bool {
        self.record_path(key).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record() -> SessionRecord {
        SessionRecord {
            token_type: "Bearer".to_string(),
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            device_token: "device".to_string(),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn session_key_takes_local_part() {
        assert_eq!(session_key("trader@example.com"), "trader");
        assert_eq!(session_key("a@b@c"), "a");
    }

    #[test]
    fn session_key_without_at_is_whole_username() {
        assert_eq!(session_key("trader"), "trader");
    }

    #[test]
    fn record_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        store.save("trader", &sample_record()).unwrap();

        let loaded = store.load("trader").unwrap().unwrap();
        assert_eq!(loaded.access_token, "access");
        assert_eq!(loaded.device_token, "device");
    }

    #[test]
    fn load_missing_record_is_none() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        assert!(store.load("trader").unwrap().is_none());
    }

    #[test]
    fn clear_removes_record_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        store.save("trader", &sample_record()).unwrap();
        store.clear("trader").unwrap();
        assert!(!store.exists("trader"));
        store.clear("trader").unwrap();
    }

    #[test]
    fn malformed_record_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        std::fs::write(dir.path().join("session_trader.json"), "{not json").unwrap();
        assert!(store.load("trader").is_err());
    }

    #[test]
    fn record_missing_access_token_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        std::fs::write(
            dir.path().join("session_trader.json"),
            r#"{"token_type": "Bearer", "refresh_token": "r", "device_token": "d", "saved_at": "2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(store.load("trader").is_err());
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        store.save("trader", &sample_record()).unwrap();
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["session_trader.json".to_string()]);
    }
}
