use crate::error::PreferenceError;
use crate::models::ThemePreference;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const THEME_KEY: &str = "rag-lab-dark";
pub const PREFERENCES_FILE: &str = "preferences.json";

/// Durable key-value storage for client preferences.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Preferences kept as a flat JSON object in a single file.
#[derive(Debug, Clone)]
pub struct FilePreferenceStore {
    path: PathBuf,
}

impl FilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(PREFERENCES_FILE))
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, PreferenceError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl PreferenceStore for FilePreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError> {
        let mut values = match self.read_all() {
            Ok(values) => values,
            Err(error) => {
                warn!(
                    %error,
                    path = %self.path.display(),
                    "replacing unreadable preferences file"
                );
                BTreeMap::new()
            }
        };
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&values)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: HashMap<String, String>,
    reads: Cell<usize>,
    writes: usize,
}

impl MemoryPreferenceStore {
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut store = Self::default();
        store.values.insert(key.to_string(), value.to_string());
        store
    }

    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        self.reads.set(self.reads.get() + 1);
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.writes += 1;
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Display-mode preference: read once at boot, written once per toggle.
///
/// The platform signal is consulted only when nothing is stored, and only
/// at boot; later platform changes are not observed.
#[derive(Debug)]
pub struct ThemePersistence<S: PreferenceStore> {
    store: S,
    current: ThemePreference,
}

impl<S: PreferenceStore> ThemePersistence<S> {
    pub fn boot(store: S, platform_prefers_dark: bool) -> Self {
        let stored = match store.get(THEME_KEY) {
            Ok(value) => value,
            Err(error) => {
                warn!(%error, "could not read theme preference, using platform default");
                None
            }
        };

        let current = match stored {
            Some(token) => ThemePreference::from_token(&token),
            None => ThemePreference::from_dark(platform_prefers_dark),
        };
        debug!(theme = ?current, "theme initialised");

        Self { store, current }
    }

    pub fn current(&self) -> ThemePreference {
        self.current
    }

    pub fn toggle(&mut self) -> Result<ThemePreference, PreferenceError> {
        let next = self.current.toggled();
        self.store.set(THEME_KEY, next.token())?;
        self.current = next;
        Ok(next)
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Reads the terminal's `COLORFGBG` hint (`"fg;bg"`); dark backgrounds are
/// the ANSI colours 0-6 and 8.
pub fn parse_colorfgbg(value: &str) -> Option<bool> {
    let background = value.rsplit(';').next()?.trim().parse::<u8>().ok()?;
    Some(background < 7 || background == 8)
}

pub fn platform_prefers_dark() -> bool {
    std::env::var("COLORFGBG")
        .ok()
        .and_then(|value| parse_colorfgbg(&value))
        .unwrap_or(false)
}
