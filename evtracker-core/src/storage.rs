//! Store keys and an in-memory [`TrackerStorage`] implementation.
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::TrackerStorage;
use crate::constants::{SELECTED_MACHINE_KEY, SESSION_KEY_PREFIX, TOTALS_KEY_PREFIX};
use crate::session::SessionState;
use crate::totals::CumulativeTotals;

#[must_use]
pub fn totals_key(machine_id: &str) -> String {
    format!("{TOTALS_KEY_PREFIX}{machine_id}")
}

#[must_use]
pub fn session_key(machine_id: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{machine_id}")
}

#[must_use]
pub const fn selected_machine_key() -> &'static str {
    SELECTED_MACHINE_KEY
}

/// Key/value store held in memory. Clones share the same entries, so a test
/// can keep a handle after moving one into a tracker.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, serde_json::Value>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// Raw JSON stored under `key`.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
        self.entries.borrow().get(key).cloned()
    }

    /// Overwrite a record directly, bypassing the typed API.
    pub fn insert_raw(&self, key: &str, value: serde_json::Value) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }

    fn put<T: Serialize>(&self, key: String, value: &T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.entries.borrow_mut().insert(key, value);
        Ok(())
    }

    /// Corrupt records read as absent.
    fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.entries.borrow().get(key).cloned()?;
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                log::warn!("ignoring unreadable record `{key}`: {err}");
                None
            }
        }
    }
}

impl TrackerStorage for MemoryStorage {
    type Error = serde_json::Error;

    fn load_totals(&self, machine_id: &str) -> Result<Option<CumulativeTotals>, Self::Error> {
        Ok(self.get(&totals_key(machine_id)))
    }

    fn save_totals(&self, machine_id: &str, totals: &CumulativeTotals) -> Result<(), Self::Error> {
        self.put(totals_key(machine_id), totals)
    }

    fn load_session(&self, machine_id: &str) -> Result<Option<SessionState>, Self::Error> {
        Ok(self.get(&session_key(machine_id)))
    }

    fn save_session(&self, machine_id: &str, session: &SessionState) -> Result<(), Self::Error> {
        self.put(session_key(machine_id), session)
    }

    fn clear_session(&self, machine_id: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(&session_key(machine_id));
        Ok(())
    }

    fn load_selected_machine(&self) -> Result<Option<String>, Self::Error> {
        Ok(self.get(selected_machine_key()))
    }

    fn save_selected_machine(&self, machine_id: &str) -> Result<(), Self::Error> {
        self.put(selected_machine_key().to_string(), &machine_id)
    }
}
