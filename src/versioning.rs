// 🕰️ Versioning - Identity + timeline of immutable values
//
// An EntryInfo keeps a stable id while its values change. Each resubmission
// closes the current version and appends the next one, so we can always
// answer "what exactly did the traveler submit at time T?".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// VERSIONED VALUE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedValue<T> {
    /// The immutable value
    pub value: T,

    /// Version number (monotonically increasing, starts at 1)
    pub version: i64,

    /// When this value became true
    pub valid_from: DateTime<Utc>,

    /// When this value stopped being true (None = current)
    pub valid_until: Option<DateTime<Utc>>,

    /// Who created this version
    pub created_by: String,

    /// Why this version was created
    pub change_reason: Option<String>,
}

impl<T> VersionedValue<T> {
    pub fn new(value: T, created_by: &str, now: DateTime<Utc>) -> Self {
        VersionedValue {
            value,
            version: 1,
            valid_from: now,
            valid_until: None,
            created_by: created_by.to_string(),
            change_reason: None,
        }
    }

    pub fn is_current(&self) -> bool {
        self.valid_until.is_none()
    }

    pub fn was_valid_at(&self, time: DateTime<Utc>) -> bool {
        self.valid_from <= time && self.valid_until.map_or(true, |until| until > time)
    }
}

// ============================================================================
// TEMPORAL ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalEntity<T> {
    /// Stable identity (never changes)
    pub id: String,

    /// Timeline of values (append-only, ordered by version)
    pub versions: Vec<VersionedValue<T>>,
}

impl<T: Clone> TemporalEntity<T> {
    pub fn new(id: &str, initial: T, created_by: &str, now: DateTime<Utc>) -> Self {
        TemporalEntity {
            id: id.to_string(),
            versions: vec![VersionedValue::new(initial, created_by, now)],
        }
    }

    /// Rebuild from stored versions (sorted by version number)
    pub fn from_versions(id: &str, mut versions: Vec<VersionedValue<T>>) -> Option<Self> {
        if versions.is_empty() {
            return None;
        }
        versions.sort_by_key(|v| v.version);

        Some(TemporalEntity {
            id: id.to_string(),
            versions,
        })
    }

    pub fn current(&self) -> Option<&VersionedValue<T>> {
        self.versions.last()
    }

    pub fn at_version(&self, version: i64) -> Option<&VersionedValue<T>> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// Value as it was at a point in time
    pub fn as_of(&self, time: DateTime<Utc>) -> Option<&VersionedValue<T>> {
        self.versions.iter().find(|v| v.was_valid_at(time))
    }

    pub fn history(&self) -> &[VersionedValue<T>] {
        &self.versions
    }

    /// Close the current version and append the next one; returns its number
    pub fn update(
        &mut self,
        value: T,
        actor: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> i64 {
        let next_version = match self.versions.last_mut() {
            Some(current) => {
                current.valid_until = Some(now);
                current.version + 1
            }
            None => 1,
        };

        self.versions.push(VersionedValue {
            value,
            version: next_version,
            valid_from: now,
            valid_until: None,
            created_by: actor.to_string(),
            change_reason: reason,
        });

        next_version
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    pub fn has_history(&self) -> bool {
        self.versions.len() > 1
    }
}
