//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const MENTORSHIPS: &str = "mentorships";
    pub const ENTRIES: &str = "entries";
    pub const PROJECTS: &str = "projects";
    pub const TEMPLATES: &str = "templates";
    pub const RULES: &str = "rules";
    /// Persisted unlock state (keyed by user/template/mentor)
    pub const RECORDS: &str = "records";
    /// Attribution rows, one per (user, template) pair
    pub const UNLOCK_HISTORY: &str = "unlock_history";
    pub const HOUR_LIMITS: &str = "hour_limits";
}
