//! Process-wide correlation state.
//!
//! The lifecycle manager publishes the current [`CorrelationRecord`] as three
//! string keys in a [`StateStore`]. By default this is [`ProcessState`], a single
//! map shared by everything running in the process, so code deep inside a
//! handler can read the correlation id without it being threaded through:
//!
//! ```
//! use lambda_correlation_id::state::{current, current_correlation_id};
//!
//! fn log_line(message: &str) {
//!     let id = current_correlation_id().unwrap_or_default();
//!     println!("[{id}] {message}");
//! }
//!
//! // Outside of an invocation nothing is published.
//! assert!(current().is_none());
//! log_line("hello");
//! ```
//!
//! [`InMemoryState`] is an independent store that can be injected into a
//! manager instead, mostly useful for tests.

use crate::constants::{keys, status};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Key-value storage the lifecycle manager writes correlation keys into.
pub trait StateStore: Send + Sync {
    fn set(&self, key: &str, value: String);

    fn get(&self, key: &str) -> Option<String>;

    fn delete(&self, key: &str);
}

/// Whether the correlation id was minted locally or received from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationStatus {
    /// Derived from invocation metadata (request id, message id, ...).
    Created,
    /// Found in data the caller attached to the event.
    Passed,
}

impl fmt::Display for CorrelationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationStatus::Created => write!(f, "{}", status::CREATED),
            CorrelationStatus::Passed => write!(f, "{}", status::PASSED),
        }
    }
}

impl FromStr for CorrelationStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            status::CREATED => Ok(CorrelationStatus::Created),
            status::PASSED => Ok(CorrelationStatus::Passed),
            _ => Err(()),
        }
    }
}

/// Correlation data for the invocation in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationRecord {
    pub id: String,
    pub trigger: String,
    pub status: CorrelationStatus,
}

impl CorrelationRecord {
    /// Read the record back from a store.
    ///
    /// Returns `None` unless all three keys are present and the status is valid.
    pub fn load(store: &dyn StateStore) -> Option<Self> {
        Some(Self {
            id: store.get(keys::CORRELATION_ID)?,
            trigger: store.get(keys::CORRELATION_TRIGGER)?,
            status: store.get(keys::CORRELATION_STATUS)?.parse().ok()?,
        })
    }

    pub(crate) fn store(&self, store: &dyn StateStore) {
        store.set(keys::CORRELATION_ID, self.id.clone());
        store.set(keys::CORRELATION_TRIGGER, self.trigger.clone());
        store.set(keys::CORRELATION_STATUS, self.status.to_string());
    }
}

type Values = RwLock<HashMap<String, String>>;

fn read(values: &Values, key: &str) -> Option<String> {
    values
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(key)
        .cloned()
}

fn write(values: &Values, key: &str, value: Option<String>) {
    let mut values = values.write().unwrap_or_else(PoisonError::into_inner);
    match value {
        Some(value) => values.insert(key.to_string(), value),
        None => values.remove(key),
    };
}

static PROCESS_VALUES: OnceLock<Values> = OnceLock::new();

/// Handle to the map shared by the whole process.
///
/// All handles refer to the same storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessState;

impl ProcessState {
    fn values() -> &'static Values {
        PROCESS_VALUES.get_or_init(Default::default)
    }
}

impl StateStore for ProcessState {
    fn set(&self, key: &str, value: String) {
        write(Self::values(), key, Some(value));
    }

    fn get(&self, key: &str) -> Option<String> {
        read(Self::values(), key)
    }

    fn delete(&self, key: &str) {
        write(Self::values(), key, None);
    }
}

/// Store with its own storage; clones share it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryState {
    values: Arc<Values>,
}

impl InMemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently set.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StateStore for InMemoryState {
    fn set(&self, key: &str, value: String) {
        write(&self.values, key, Some(value));
    }

    fn get(&self, key: &str) -> Option<String> {
        read(&self.values, key)
    }

    fn delete(&self, key: &str) {
        write(&self.values, key, None);
    }
}

/// The record currently published in process-wide state, if any.
pub fn current() -> Option<CorrelationRecord> {
    CorrelationRecord::load(&ProcessState)
}

/// The correlation id currently published in process-wide state, if any.
pub fn current_correlation_id() -> Option<String> {
    ProcessState.get(keys::CORRELATION_ID)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn record() -> CorrelationRecord {
        CorrelationRecord {
            id: "abc".to_string(),
            trigger: "SQS".to_string(),
            status: CorrelationStatus::Passed,
        }
    }

    #[test]
    fn test_status_round_trips_through_strings() {
        assert_eq!(CorrelationStatus::Created.to_string(), "created");
        assert_eq!(CorrelationStatus::Passed.to_string(), "passed");
        assert_eq!(
            "passed".parse::<CorrelationStatus>(),
            Ok(CorrelationStatus::Passed)
        );
        assert!("PASSED".parse::<CorrelationStatus>().is_err());
    }

    #[test]
    fn test_in_memory_store_and_load() {
        let state = InMemoryState::new();
        assert_eq!(CorrelationRecord::load(&state), None);

        record().store(&state);
        assert_eq!(state.len(), 3);
        assert_eq!(state.get("x_correlation_id").as_deref(), Some("abc"));
        assert_eq!(state.get("x_correlation_status").as_deref(), Some("passed"));
        assert_eq!(CorrelationRecord::load(&state), Some(record()));

        // Clones share storage.
        let clone = state.clone();
        clone.delete(keys::CORRELATION_TRIGGER);
        assert_eq!(CorrelationRecord::load(&state), None);
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_load_rejects_unknown_status() {
        let state = InMemoryState::new();
        record().store(&state);
        state.set(keys::CORRELATION_STATUS, "forwarded".to_string());
        assert_eq!(CorrelationRecord::load(&state), None);
    }

    #[test]
    #[serial]
    fn test_process_state_is_shared() {
        record().store(&ProcessState);
        assert_eq!(current(), Some(record()));
        assert_eq!(current_correlation_id().as_deref(), Some("abc"));

        for key in keys::ALL {
            ProcessState::default().delete(key);
        }
        assert_eq!(current(), None);
        assert_eq!(current_correlation_id(), None);
    }
}
