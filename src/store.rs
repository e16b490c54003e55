use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::scrabble::{MatchState, SCHEMA_VERSION};

#[derive(Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no saved game {0}")]
    NotFound(String),
    #[error("saved game has version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Where matches are kept between commands.
#[async_trait]
pub trait Store: Send + Sync {
    async fn save(&self, state: &MatchState) -> Result<(), Error>;
    async fn load(&self, key: &str) -> Result<MatchState, Error>;
    async fn keys(&self) -> Result<Vec<String>, Error>;
}

pub fn to_json(state: &MatchState) -> Result<String, Error> {
    Ok(serde_json::to_string(state)?)
}

/// Parse a saved match, refusing ones written by an incompatible version.
pub fn from_json(body: &str) -> Result<MatchState, Error> {
    let state: MatchState = serde_json::from_str(body)?;
    if state.version != SCHEMA_VERSION {
        return Err(Error::UnsupportedVersion {
            found: state.version,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(state)
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    games: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn save(&self, state: &MatchState) -> Result<(), Error> {
        let body = to_json(state)?;
        self.games.lock().insert(state.key.clone(), body);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<MatchState, Error> {
        let body = self
            .games
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_owned()))?;
        from_json(&body)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys: Vec<String> = self.games.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One `<key>.json` file per match.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn save(&self, state: &MatchState) -> Result<(), Error> {
        tokio::fs::create_dir_all(&self.dir).await?;

        // write then rename, so a crash never leaves half a file
        let path = self.path(&state.key);
        let partial = path.with_extension("json.partial");
        tokio::fs::write(&partial, to_json(state)?).await?;
        tokio::fs::rename(&partial, &path).await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<MatchState, Error> {
        let body = match tokio::fs::read_to_string(self.path(key)).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::NotFound(key.to_owned())),
            Err(e) => return Err(e.into()),
        };
        from_json(&body)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let mut keys = vec![];
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_owned());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
