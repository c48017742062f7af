//! Project model for storage and API.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Stored project record in Firestore.
///
/// Counted by the aggregator when a template rule references project count;
/// `created_at` plays the role `occurred_at` plays for hour entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project ID (also used as document ID)
    pub project_id: String,
    /// Owning apprentice's user ID
    pub owner_id: String,
    /// Mentor this project is attributed to, if any
    #[serde(default)]
    pub mentor_id: Option<String>,
    /// Project title
    pub title: String,
    /// When the project was created (naive local time)
    pub created_at: NaiveDateTime,
}
