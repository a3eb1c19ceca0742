//! Audit metadata carried by every stored entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who last changed an entity, when, and how many times it has changed.
///
/// `version` starts at 1 on create and increases by exactly one on every
/// successful mutation. Reads never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub last_updated_by: String,
    pub version: i64,
}

impl Audit {
    /// Audit block for a freshly created entity.
    pub fn new(updated_by: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            last_updated_by: updated_by.unwrap_or_default(),
            version: 1,
        }
    }

    /// Records a mutation. Keeps the previous author when none is given.
    pub fn touch(&mut self, updated_by: Option<&str>, now: DateTime<Utc>) {
        self.last_updated = now;
        if let Some(by) = updated_by {
            self.last_updated_by = by.to_string();
        }
        self.version += 1;
    }
}
