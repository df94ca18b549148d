//! Best-score persistence.
//!
//! The engine and session never touch storage. Callers load the best score
//! before starting a session and save it back whenever it grows.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use serde_json::{Map, Value};

use crate::engine::Score;

/// Key the best score is stored under.
pub const BEST_SCORE_KEY: &str = "bestScore";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("value under {key:?} is not a non-negative integer")]
    InvalidValue { key: String },
}

pub trait BestScoreStore {
    fn load(&self) -> Result<Score, StoreError>;
    /// Persist `score` if it beats the stored value.
    fn save(&mut self, score: Score) -> Result<(), StoreError>;
}

/// Process-local store for hosts without a filesystem.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    best: Score,
}

impl MemoryStore {
    pub fn new(best: Score) -> Self {
        Self { best }
    }
}

impl BestScoreStore for MemoryStore {
    fn load(&self) -> Result<Score, StoreError> {
        Ok(self.best)
    }

    fn save(&mut self, score: Score) -> Result<(), StoreError> {
        self.best = self.best.max(score);
        Ok(())
    }
}

/// JSON object file holding the best score under [`BEST_SCORE_KEY`].
/// Other keys in the file are left alone.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => {
                warn!("{} does not hold a JSON object, starting fresh", self.path.display());
                Ok(Map::new())
            }
        }
    }
}

impl BestScoreStore for JsonFileStore {
    fn load(&self) -> Result<Score, StoreError> {
        let map = self.read_object()?;
        match map.get(BEST_SCORE_KEY) {
            None => Ok(0),
            Some(v) => v.as_u64().ok_or_else(|| StoreError::InvalidValue { key: BEST_SCORE_KEY.to_string() }),
        }
    }

    fn save(&mut self, score: Score) -> Result<(), StoreError> {
        let mut map = self.read_object()?;
        let current = match map.get(BEST_SCORE_KEY) {
            None => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| StoreError::InvalidValue { key: BEST_SCORE_KEY.to_string() })?),
        };
        if current.is_some_and(|c| score <= c) {
            return Ok(());
        }
        map.insert(BEST_SCORE_KEY.to_string(), Value::from(score));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&Value::Object(map))?)?;
        Ok(())
    }
}
