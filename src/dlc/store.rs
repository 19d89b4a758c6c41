//! File-backed persistence for DLC announcements, nonce secrets, and
//! attestations: one JSON file per artifact, keyed by event id, with the
//! nonce-secrets file written at owner-only permissions and unlinked
//! immediately after the matching attestation is durably written.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DlcError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub event_id: String,
    pub pair: String,
    pub maturity: String,
    pub oracle_pubkey: String,
    pub num_digits: usize,
    pub r_points: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceSecrets {
    pub event_id: String,
    pub nonce_secrets: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attestation {
    pub event_id: String,
    pub pair: String,
    pub maturity: String,
    pub oracle_pubkey: String,
    pub price: i64,
    pub price_digits: Vec<u8>,
    pub s_values: Vec<String>,
    pub attested_at: String,
}

pub struct DlcStore {
    data_dir: PathBuf,
}

impl DlcStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, DlcError> {
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    fn path_for(&self, event_id: &str, suffix: &str) -> PathBuf {
        self.data_dir.join(format!("{event_id}.{suffix}"))
    }

    pub fn write_announcement(&self, announcement: &Announcement) -> Result<(), DlcError> {
        write_json_atomic(&self.path_for(&announcement.event_id, "announcement.json"), announcement, false)
    }

    pub fn read_announcement(&self, event_id: &str) -> Result<Announcement, DlcError> {
        let path = self.path_for(event_id, "announcement.json");
        let contents = fs::read_to_string(&path).map_err(|_| DlcError::AnnouncementNotFound(event_id.to_string()))?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write_nonces(&self, nonces: &NonceSecrets) -> Result<(), DlcError> {
        write_json_atomic(&self.path_for(&nonces.event_id, "nonces.json"), nonces, true)
    }

    pub fn read_nonces(&self, event_id: &str) -> Result<NonceSecrets, DlcError> {
        let path = self.path_for(event_id, "nonces.json");
        let contents = fs::read_to_string(&path).map_err(|_| DlcError::MissingNonces(event_id.to_string()))?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn delete_nonces(&self, event_id: &str) -> Result<(), DlcError> {
        let path = self.path_for(event_id, "nonces.json");
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn write_attestation(&self, attestation: &Attestation) -> Result<(), DlcError> {
        write_json_atomic(&self.path_for(&attestation.event_id, "attestation.json"), attestation, false)
    }

    pub fn read_attestation(&self, event_id: &str) -> Option<Attestation> {
        let path = self.path_for(event_id, "attestation.json");
        let contents = fs::read_to_string(path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn has_attestation(&self, event_id: &str) -> bool {
        self.path_for(event_id, "attestation.json").exists()
    }

    /// All event ids with a durable announcement, newest maturity last.
    pub fn list_announced_event_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = fs::read_dir(&self.data_dir)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".announcement.json").map(String::from)
            })
            .collect();
        ids.sort();
        ids
    }
}

/// Write `value` as JSON to `path` via a temp-file-then-rename, so a
/// reader never observes a partially written file. `owner_only` sets 0600
/// permissions before the data (not just the rename) becomes visible.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T, owner_only: bool) -> Result<(), DlcError> {
    let tmp_path = path.with_extension("tmp");
    let json = serde_json::to_vec_pretty(value)?;
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    if owner_only {
        set_owner_only_perms(&tmp_path)?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_perms(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_perms(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> DlcStore {
        let dir = std::env::temp_dir().join(format!("sovereign-oracle-dlc-store-test-{:?}", std::thread::current().id()));
        let _ = fs::remove_dir_all(&dir);
        DlcStore::new(dir).unwrap()
    }

    #[test]
    fn announcement_round_trips() {
        let store = temp_store();
        let ann = Announcement {
            event_id: "BTCUSD-2026-08-01T15:00:00Z".to_string(),
            pair: "BTCUSD".to_string(),
            maturity: "2026-08-01T15:00:00Z".to_string(),
            oracle_pubkey: "02".repeat(33),
            num_digits: 5,
            r_points: vec!["03".repeat(33); 5],
            created_at: "2026-07-31T15:00:00Z".to_string(),
        };
        store.write_announcement(&ann).unwrap();
        let loaded = store.read_announcement(&ann.event_id).unwrap();
        assert_eq!(loaded.event_id, ann.event_id);
    }

    #[test]
    fn reading_missing_nonces_is_an_error() {
        let store = temp_store();
        assert!(matches!(store.read_nonces("no-such-event"), Err(DlcError::MissingNonces(_))));
    }

    #[test]
    fn nonces_are_deleted_after_write() {
        let store = temp_store();
        let nonces = NonceSecrets { event_id: "evt".to_string(), nonce_secrets: vec!["aa".repeat(32)] };
        store.write_nonces(&nonces).unwrap();
        assert!(store.read_nonces("evt").is_ok());
        store.delete_nonces("evt").unwrap();
        assert!(store.read_nonces("evt").is_err());
    }
}
