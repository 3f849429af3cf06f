use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named configuration template body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigTemplate {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: u64,

    /// Unique template name
    pub name: String,

    /// Template body
    pub content: String,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl ConfigTemplate {
    /// Create an unsaved template stamped with the current time
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
