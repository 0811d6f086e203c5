//! Player identity provisioning

use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::ws::protocol::PlayerId;

/// Length of generated player ids
pub const PLAYER_ID_LEN: usize = 9;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity store io: {0}")]
    Io(#[from] io::Error),
}

/// Where the local player id lives between sessions
pub trait IdentityStore: Send + Sync {
    fn load(&self) -> Result<Option<PlayerId>, IdentityError>;
    fn save(&self, id: &PlayerId) -> Result<(), IdentityError>;
}

/// Random opaque id: lowercase alphanumerics
pub fn generate_player_id() -> PlayerId {
    let id: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PLAYER_ID_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    PlayerId::new(id)
}

/// Return the stored id, generating and persisting one on first run
pub fn load_or_generate(store: &dyn IdentityStore) -> Result<PlayerId, IdentityError> {
    if let Some(id) = store.load()? {
        return Ok(id);
    }
    let id = generate_player_id();
    store.save(&id)?;
    info!(player_id = %id, "Generated new player identity");
    Ok(id)
}

/// Identity persisted as a single line in a file
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<PlayerId>, IdentityError> {
        match fs::read_to_string(&self.path) {
            // A blank file counts as first run
            Ok(raw) => {
                let trimmed = raw.trim();
                Ok((!trimmed.is_empty()).then(|| PlayerId::new(trimmed)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, id: &PlayerId) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, id.as_str())?;
        Ok(())
    }
}

/// Identity held in memory only
#[derive(Default)]
pub struct MemoryIdentityStore {
    id: Mutex<Option<PlayerId>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Mutex::new(Some(PlayerId::new(id))),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<PlayerId>, IdentityError> {
        Ok(self.id.lock().clone())
    }

    fn save(&self, id: &PlayerId) -> Result<(), IdentityError> {
        *self.id.lock() = Some(id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn generated_ids_are_opaque_and_lowercase() {
        let id = generate_player_id();
        assert_eq!(id.as_str().len(), PLAYER_ID_LEN);
        assert!(id
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn first_run_generates_then_reuses() {
        let store = MemoryIdentityStore::new();
        let first = assert_ok!(load_or_generate(&store));
        let second = assert_ok!(load_or_generate(&store));
        assert_eq!(first, second);
    }

    #[test]
    fn existing_identity_is_kept() {
        let store = MemoryIdentityStore::with_id("known");
        assert_eq!(load_or_generate(&store).unwrap(), PlayerId::new("known"));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("duel-arena-id-{}", uuid::Uuid::new_v4()));
        let store = FileIdentityStore::new(dir.join("player_id"));
        assert!(assert_ok!(store.load()).is_none());

        let id = assert_ok!(load_or_generate(&store));
        let reopened = FileIdentityStore::new(dir.join("player_id"));
        assert_eq!(reopened.load().unwrap(), Some(id));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn blank_identity_file_is_regenerated() {
        let dir = std::env::temp_dir().join(format!("duel-arena-id-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("player_id"), "  \n").unwrap();

        let store = FileIdentityStore::new(dir.join("player_id"));
        assert!(assert_ok!(store.load()).is_none());

        let id = assert_ok!(load_or_generate(&store));
        assert_eq!(id.as_str().len(), PLAYER_ID_LEN);
        assert_eq!(assert_ok!(store.load()), Some(id));

        let _ = fs::remove_dir_all(dir);
    }
}
