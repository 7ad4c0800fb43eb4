//! Provider-scoped working state.
//!
//! Each provider gets durable scratch space per (learner, course) so it can
//! remember facts between evaluations. One learner/course blob holds the
//! states of every provider, keyed by provider id:
//!
//! ```json
//! {"manual":{"d":{"enrolled":true},"l":[[1760000000000,"Enrolled manually"]]}}
//! ```
//!
//! `d` holds stored values (nulls are never written), `l` holds log lines
//! oldest → newest. Key order is preserved so a parsed blob re-serializes to
//! the same bytes.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

/// Default maximum number of log lines kept per provider state.
pub const DEFAULT_LOG_CAP: usize = 30;

/// A `(timestamp_millis, message)` log line.
pub type LogLine = (i64, String);

/// Working state of one provider for one (learner, course).
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProviderState {
    #[serde(rename = "d")]
    stored_values: IndexMap<String, Value>,

    #[serde(rename = "l")]
    logs: Vec<LogLine>,

    #[serde(skip)]
    log_cap: usize,

    #[serde(skip)]
    changed: bool,
}

impl PartialEq for ProviderState {
    fn eq(&self, other: &Self) -> bool {
        self.stored_values == other.stored_values && self.logs == other.logs
    }
}

impl ProviderState {
    #[must_use]
    pub fn new(log_cap: usize) -> Self {
        Self {
            stored_values: IndexMap::new(),
            logs: Vec::new(),
            log_cap: log_cap.max(1),
            changed: false,
        }
    }

    /// Rebuild a state from its serialized `{"d":…,"l":…}` value.
    ///
    /// Anything unexpected is dropped rather than rejected: a non-object `d`
    /// yields no values, null values are skipped, and log lines that are not
    /// `[integer, string]` pairs are ignored.
    #[must_use]
    pub fn from_value(value: &Value, log_cap: usize) -> Self {
        let mut state = Self::new(log_cap);

        if let Some(values) = value.get("d").and_then(Value::as_object) {
            state.stored_values = values
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
        }

        if let Some(lines) = value.get("l").and_then(Value::as_array) {
            state.logs = lines
                .iter()
                .filter_map(|line| {
                    let pair = line.as_array()?;
                    match pair.as_slice() {
                        [at, message] => Some((at.as_i64()?, message.as_str()?.to_string())),
                        _ => None,
                    }
                })
                .collect();
        }

        state
    }

    /// Parse a standalone state blob. Malformed input yields an empty state.
    #[must_use]
    pub fn from_json(json: &str, log_cap: usize) -> Self {
        serde_json::from_str::<Value>(json)
            .map(|value| Self::from_value(&value, log_cap))
            .unwrap_or_else(|_| Self::new(log_cap))
    }

    /// Serialize to the `{"d":…,"l":…}` blob shape.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if a stored value cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    #[must_use]
    pub fn get_stored_value(&self, key: &str) -> Option<&Value> {
        self.stored_values.get(key)
    }

    /// Set a stored value. Setting `Value::Null` removes the key.
    pub fn set_stored_value(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if value.is_null() {
            if self.stored_values.shift_remove(&key).is_some() {
                self.changed = true;
            }
            return;
        }
        if self.stored_values.get(&key) != Some(&value) {
            self.stored_values.insert(key, value);
            self.changed = true;
        }
    }

    #[must_use]
    pub const fn stored_values(&self) -> &IndexMap<String, Value> {
        &self.stored_values
    }

    /// Append a log line, evicting the oldest lines beyond the cap.
    pub fn add_log_message(&mut self, at: i64, message: impl Into<String>) {
        self.logs.push((at, message.into()));
        if self.logs.len() > self.log_cap {
            let excess = self.logs.len() - self.log_cap;
            self.logs.drain(..excess);
        }
        self.changed = true;
    }

    /// Log lines, oldest first.
    #[must_use]
    pub fn get_logs(&self) -> &[LogLine] {
        &self.logs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stored_values.is_empty() && self.logs.is_empty()
    }

    #[must_use]
    pub const fn has_changed(&self) -> bool {
        self.changed
    }

    fn mark_saved(&mut self) {
        self.changed = false;
    }
}

/// All provider states for one (learner, course).
///
/// Tracks whether anything changed since it was loaded so unchanged stores
/// are never written back.
#[derive(Debug, Clone)]
pub struct ProviderStateStore {
    states: IndexMap<String, ProviderState>,
    log_cap: usize,
    changed: bool,
}

impl ProviderStateStore {
    #[must_use]
    pub fn new(log_cap: usize) -> Self {
        Self {
            states: IndexMap::new(),
            log_cap,
            changed: false,
        }
    }

    /// Parse a persisted store blob.
    ///
    /// Empty or malformed input yields a valid, empty store.
    #[must_use]
    pub fn from_json(json: &str, log_cap: usize) -> Self {
        let mut store = Self::new(log_cap);
        if json.trim().is_empty() {
            return store;
        }
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => {
                store.states = map
                    .iter()
                    .map(|(id, value)| (id.clone(), ProviderState::from_value(value, log_cap)))
                    .collect();
            }
            Ok(_) => tracing::warn!("provider state blob is not an object; starting empty"),
            Err(error) => {
                tracing::warn!(%error, "discarding malformed provider state blob");
            }
        }
        store
    }

    /// Serialize every provider state, preserving provider order.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if a stored value cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.states)
    }

    /// Mutable state for `provider_id`, created empty on first access.
    ///
    /// Creating an empty state does not by itself mark the store dirty.
    pub fn get_provider_state(&mut self, provider_id: &str) -> &mut ProviderState {
        let log_cap = self.log_cap;
        self.states
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderState::new(log_cap))
    }

    #[must_use]
    pub fn provider_state(&self, provider_id: &str) -> Option<&ProviderState> {
        self.states.get(provider_id)
    }

    /// Drop a provider's state entirely. Returns whether it existed.
    pub fn remove_provider_state(&mut self, provider_id: &str) -> bool {
        let removed = self.states.shift_remove(provider_id).is_some();
        self.changed |= removed;
        removed
    }

    pub fn provider_ids(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.values().all(ProviderState::is_empty)
    }

    /// Whether any contained state mutated since load or the last save.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.changed || self.states.values().any(ProviderState::has_changed)
    }

    /// Clear dirty flags after the store was persisted.
    pub fn mark_saved(&mut self) {
        self.changed = false;
        for state in self.states.values_mut() {
            state.mark_saved();
        }
    }
}
