//! User and mentorship models for storage and API.

use serde::{Deserialize, Serialize};

/// Role a user acts in. Stored on the profile and carried in the session JWT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Tracked learner whose hours and projects accrue achievements.
    Apprentice,
    /// Supervisor connected to one or more apprentices.
    Mentor,
    /// Guild administrator with the audit view over everyone.
    Host,
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (also used as document ID)
    pub user_id: String,
    /// First name
    pub firstname: String,
    /// Last name
    pub lastname: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    /// Role within the guild
    pub role: Role,
    /// When the account was created (ISO 8601)
    pub created_at: String,
}

impl User {
    /// Initials used for attribution lists ("Ada Lovelace" -> "AL").
    pub fn initials(&self) -> String {
        let mut out = String::new();
        for name in [&self.firstname, &self.lastname] {
            if let Some(c) = name.chars().next() {
                out.extend(c.to_uppercase());
            }
        }
        out
    }

    /// Full display name.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Mentor-apprentice relationship row.
///
/// One row per connected pair; per-mentor achievement scopes evaluate
/// once per row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mentorship {
    /// Mentor user ID
    pub mentor_id: String,
    /// Apprentice user ID
    pub apprentice_id: String,
    /// When the relationship was established (ISO 8601)
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            user_id: "u1".to_string(),
            firstname: first.to_string(),
            lastname: last.to_string(),
            email: None,
            role: Role::Apprentice,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_initials() {
        assert_eq!(user("Ada", "Lovelace").initials(), "AL");
        assert_eq!(user("ada", "lovelace").initials(), "AL");
        assert_eq!(user("Ada", "").initials(), "A");
    }
}
