//! Provider journals: bounded audit history of enrolment status transitions.
//!
//! One blob per learner holds every journaled course, then every provider:
//!
//! ```json
//! {"12":{"manual":{"h":[{"t":1760000000500,"s":false},{"t":1760000000000,"s":true}],
//!                  "l":[{"t":1760000000000,"m":"Enrolled manually"}]}}}
//! ```
//!
//! History and logs are stored newest first. A history status of `null`
//! means the provider stopped reporting (e.g. it was removed).

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::CourseId;

/// Default cap for both history entries and log lines.
pub const DEFAULT_JOURNAL_CAP: usize = 30;

/// One recorded status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
    #[serde(rename = "t")]
    pub at: i64,
    #[serde(rename = "s")]
    pub status: Option<bool>,
}

/// One free-text diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JournalLog {
    #[serde(rename = "t")]
    pub at: i64,
    #[serde(rename = "m")]
    pub message: String,
}

/// Journal of one provider for one (learner, course).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderJournal {
    #[serde(rename = "h", default)]
    history: Vec<HistoryEntry>,
    #[serde(rename = "l", default)]
    logs: Vec<JournalLog>,
}

impl ProviderJournal {
    /// Most recent status, or `None` when nothing was ever recorded.
    #[must_use]
    pub fn last_status(&self) -> Option<Option<bool>> {
        self.history.first().map(|entry| entry.status)
    }

    /// Record `status` at `at` if it differs from the last recorded status.
    ///
    /// Returns whether an entry was added.
    pub fn record_status(&mut self, at: i64, status: Option<bool>, cap: usize) -> bool {
        if self.last_status() == Some(status) {
            return false;
        }
        self.history.insert(0, HistoryEntry { at, status });
        self.history.truncate(cap.max(1));
        true
    }

    pub fn add_log(&mut self, at: i64, message: impl Into<String>, cap: usize) {
        self.logs.insert(
            0,
            JournalLog {
                at,
                message: message.into(),
            },
        );
        self.logs.truncate(cap.max(1));
    }

    /// Status in effect at `at`: the newest entry stamped at or before it.
    ///
    /// Entries sharing a timestamp resolve to the one inserted last.
    /// `None` means no entry existed yet at that time.
    #[must_use]
    pub fn status_at(&self, at: i64) -> Option<Option<bool>> {
        self.history
            .iter()
            .find(|entry| entry.at <= at)
            .map(|entry| entry.status)
    }

    /// History entries, newest first.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Log lines, newest first.
    #[must_use]
    pub fn logs(&self) -> &[JournalLog] {
        &self.logs
    }

    /// Whether this provider ever granted enrolment.
    #[must_use]
    pub fn has_positive_entry(&self) -> bool {
        self.history.iter().any(|entry| entry.status == Some(true))
    }
}

/// Provider journals of one course, keyed by provider id.
pub type CourseJournal = IndexMap<String, ProviderJournal>;

/// Every journaled course of one learner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct LearnerJournal {
    courses: IndexMap<CourseId, CourseJournal>,
}

impl LearnerJournal {
    /// Parse a persisted learner journal. Malformed input yields an empty journal.
    #[must_use]
    pub fn from_json(json: &str) -> Self {
        if json.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(json).unwrap_or_else(|error| {
            tracing::warn!(%error, "discarding malformed provider journal blob");
            Self::default()
        })
    }

    /// Serialize only the courses for which `keep` returns true.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json_filtered<F>(&self, keep: F) -> Result<String, serde_json::Error>
    where
        F: Fn(CourseId, &CourseJournal) -> bool,
    {
        let filtered: IndexMap<&CourseId, &CourseJournal> = self
            .courses
            .iter()
            .filter(|(course, journal)| keep(**course, journal))
            .collect();
        serde_json::to_string(&filtered)
    }

    #[must_use]
    pub fn course(&self, course: CourseId) -> Option<&CourseJournal> {
        self.courses.get(&course)
    }

    pub fn course_mut(&mut self, course: CourseId) -> &mut CourseJournal {
        self.courses.entry(course).or_default()
    }

    #[must_use]
    pub fn provider(&self, course: CourseId, provider_id: &str) -> Option<&ProviderJournal> {
        self.courses.get(&course)?.get(provider_id)
    }

    pub fn provider_mut(&mut self, course: CourseId, provider_id: &str) -> &mut ProviderJournal {
        self.course_mut(course)
            .entry(provider_id.to_string())
            .or_default()
    }

    /// Whether any provider ever granted enrolment in `course`.
    #[must_use]
    pub fn course_has_positive_entry(&self, course: CourseId) -> bool {
        self.courses
            .get(&course)
            .is_some_and(|journal| journal.values().any(ProviderJournal::has_positive_entry))
    }

    /// Status per provider at time `at`; providers without an entry by then
    /// are omitted.
    #[must_use]
    pub fn snapshot(&self, course: CourseId, at: i64) -> IndexMap<String, Option<bool>> {
        self.courses
            .get(&course)
            .map(|journal| {
                journal
                    .iter()
                    .filter_map(|(id, provider)| Some((id.clone(), provider.status_at(at)?)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn courses(&self) -> impl Iterator<Item = CourseId> + '_ {
        self.courses.keys().copied()
    }

    pub fn remove_course(&mut self, course: CourseId) -> bool {
        self.courses.shift_remove(&course).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}
