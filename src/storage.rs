//! Durable client-side state: the session token and the draft booking that
//! survives a sign-in redirect.
//!
//! Both live in one [`KeyValueStore`]. Writes are read-modify-write without
//! coordination between processes, so the last writer wins.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BookingError;
use crate::model::{Passenger, Trip};

pub const TOKEN_KEY: &str = "authToken";
pub const DRAFT_KEY: &str = "pendingBooking";

/// Drafts older than this are discarded instead of resumed.
pub const DRAFT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, BookingError>;
    fn set(&self, key: &str, value: &str) -> Result<(), BookingError>;
    fn remove(&self, key: &str) -> Result<(), BookingError>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> BookingError {
    BookingError::Storage("store lock poisoned".into())
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, BookingError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BookingError> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BookingError> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

/// JSON object on disk, one entry per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tripbook")
            .join("storage.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, BookingError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(BookingError::Storage(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            BookingError::Storage(format!("{} is not a valid store: {e}", self.path.display()))
        })
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), BookingError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BookingError::Storage(format!("cannot create {}: {e}", parent.display())))?;
        }
        let text = serde_json::to_string_pretty(entries)
            .map_err(|e| BookingError::Storage(e.to_string()))?;
        std::fs::write(&self.path, text)
            .map_err(|e| BookingError::Storage(format!("cannot write {}: {e}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, BookingError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BookingError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), BookingError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct SessionTokenStore {
    store: SharedStore,
}

impl SessionTokenStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Missing, empty, and unreadable tokens all mean "not signed in".
    pub fn token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "cannot read session token");
                None
            }
        }
    }

    pub fn set_token(&self, token: &str) -> Result<(), BookingError> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn clear(&self) -> Result<(), BookingError> {
        self.store.remove(TOKEN_KEY)
    }
}

/// Search parameters recorded with a draft so the trip can be searched for again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftBooking {
    #[serde(default, alias = "originalTripData", skip_serializing_if = "Option::is_none")]
    pub trip_data: Option<Trip>,
    #[serde(default)]
    pub booker_name: String,
    #[serde(default)]
    pub booker_email: String,
    #[serde(default)]
    pub booker_phone: String,
    #[serde(default)]
    pub number_of_adults: u32,
    #[serde(default)]
    pub number_of_infants: u32,
    #[serde(default)]
    pub passengers: Vec<Passenger>,
    #[serde(default)]
    pub selected_seats: Vec<String>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_params: Option<SearchParams>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub should_reopen_modal: bool,
    #[serde(default)]
    pub timestamp: i64,
}

impl DraftBooking {
    pub fn is_stale_at(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp >= DRAFT_TTL_MS
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now().timestamp_millis())
    }

    pub fn trip_id(&self) -> Option<&str> {
        self.trip_data.as_ref().and_then(|t| t.id.as_deref())
    }
}

#[derive(Clone)]
pub struct DraftBookingStore {
    store: SharedStore,
}

impl DraftBookingStore {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The stored draft. Unreadable or malformed entries are logged, dropped, and
    /// reported as absent.
    pub fn load(&self) -> Option<DraftBooking> {
        let raw = match self.store.get(DRAFT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "cannot read draft booking");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!(error = %e, "discarding malformed draft booking");
                if let Err(e) = self.store.remove(DRAFT_KEY) {
                    warn!(error = %e, "cannot remove malformed draft booking");
                }
                None
            }
        }
    }

    pub fn save(&self, draft: &DraftBooking) -> Result<(), BookingError> {
        let raw = serde_json::to_string(draft).map_err(|e| BookingError::Storage(e.to_string()))?;
        self.store.set(DRAFT_KEY, &raw)?;
        debug!(from = %draft.from, to = %draft.to, "draft booking saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), BookingError> {
        self.store.remove(DRAFT_KEY)
    }

    /// Sets the reopen flag on the stored draft. Returns whether a draft existed.
    pub fn set_reopen(&self, reopen: bool) -> Result<bool, BookingError> {
        match self.load() {
            Some(mut draft) => {
                draft.should_reopen_modal = reopen;
                self.save(&draft)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
