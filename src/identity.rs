//! Local persistence of the user's identity across reloads.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::model::Role;

/// Default location of the identity file.
const DEFAULT_IDENTITY_PATH: &str = ".pointdeck/identity.json";
/// Environment variable that overrides [`DEFAULT_IDENTITY_PATH`].
const IDENTITY_PATH_ENV: &str = "POINTDECK_IDENTITY_PATH";

/// The locally-owned identity a client carries into every room it joins.
///
/// The id is generated once and persisted, so reloading the client rejoins
/// as the same participant instead of minting a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable client-generated id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Client-chosen role.
    pub role: Role,
    /// Avatar handle.
    #[serde(default)]
    pub avatar: String,
}

impl Identity {
    /// Mint a fresh identity.
    pub fn new(name: String, role: Role, avatar: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            role,
            avatar,
        }
    }
}

/// File-backed identity store: read once at startup, cleared on logout.
pub struct IdentityFile {
    path: PathBuf,
}

impl IdentityFile {
    /// Store at an explicit path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default path, honoring the environment override.
    pub fn at_default_location() -> Self {
        let path = env::var_os(IDENTITY_PATH_ENV)
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_IDENTITY_PATH));
        Self::new(path)
    }

    /// Load the persisted identity, if a readable one exists.
    pub fn load(&self) -> Option<Identity> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read identity file");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(identity) => Some(identity),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "identity file is malformed");
                None
            }
        }
    }

    /// Persist the identity, creating parent directories as needed.
    pub fn save(&self, identity: &Identity) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(identity)
            .map_err(|err| std::io::Error::new(ErrorKind::InvalidData, err))?;
        fs::write(&self.path, contents)
    }

    /// Remove the persisted identity; already-missing is fine.
    pub fn clear(&self) -> std::io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file() -> IdentityFile {
        let path = env::temp_dir()
            .join("pointdeck-tests")
            .join(format!("{}.json", Uuid::new_v4()));
        IdentityFile::new(path)
    }

    #[test]
    fn save_load_clear_round_trip() {
        let file = scratch_file();
        assert!(file.load().is_none());

        let identity = Identity::new("ada".into(), Role::Developer, "owl".into());
        file.save(&identity).unwrap();
        assert_eq!(file.load(), Some(identity));

        file.clear().unwrap();
        assert!(file.load().is_none());
        // Clearing again is a no-op.
        file.clear().unwrap();
    }

    #[test]
    fn malformed_file_loads_as_none() {
        let file = scratch_file();
        if let Some(parent) = file.path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&file.path, "not json").unwrap();
        assert!(file.load().is_none());
        file.clear().unwrap();
    }
}
