//! File-backed browser state: durable storage and cookies survive between
//! replay runs the way they survive page loads in a real browser.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use behavior_tracker::{CookieJar, KeyValueStore, TrackerError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    storage: BTreeMap<String, String>,
    #[serde(default)]
    cookies: BTreeMap<String, String>,
}

pub struct FileState {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl FileState {
    /// Load state from `path`; a missing file starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        let snapshot = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("corrupt state file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading state file {}", path.display()))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            snapshot: Mutex::new(snapshot),
        })
    }

    fn update(&self, f: impl FnOnce(&mut Snapshot)) -> behavior_tracker::Result<()> {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut snapshot);
        let raw = serde_json::to_string_pretty(&*snapshot)
            .map_err(|e| TrackerError::Storage(e.to_string()))?;
        fs::write(&self.path, raw)
            .map_err(|e| TrackerError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileState {
    fn get(&self, key: &str) -> Option<String> {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .storage
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> behavior_tracker::Result<()> {
        self.update(|s| {
            s.storage.insert(key.to_string(), value.to_string());
        })
    }
}

impl CookieJar for FileState {
    fn cookie_header(&self) -> String {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cookies
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set_cookie(&self, line: &str) -> behavior_tracker::Result<()> {
        let pair = line.split(';').next().unwrap_or_default();
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| TrackerError::Storage(format!("malformed cookie: {line}")))?;
        self.update(|s| {
            s.cookies
                .insert(name.trim().to_string(), value.trim().to_string());
        })
    }
}
