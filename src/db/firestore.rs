// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users and mentor-apprentice relationships
//! - Activity entries and projects
//! - Achievement templates and unlock rules
//! - Persisted unlock records and attribution history
//! - Hour-limit configuration

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    AchievementRecord, AchievementTemplate, ActivityEntry, HourLimits, Mentorship, Project,
    UnlockHistoryEntry, UnlockRule, User,
};

/// Document ID of the global hour-limits singleton.
const GLOBAL_LIMITS_DOC: &str = "global";

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated
        // connection to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List all users (host/audit view).
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Mentorship Operations ───────────────────────────────────

    /// Relationship rows for one apprentice.
    pub async fn mentors_for_apprentice(
        &self,
        apprentice_id: &str,
    ) -> Result<Vec<Mentorship>, AppError> {
        let apprentice_id = apprentice_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MENTORSHIPS)
            .filter(move |q| q.field("apprentice_id").eq(apprentice_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Relationship rows for one mentor.
    pub async fn apprentices_for_mentor(
        &self,
        mentor_id: &str,
    ) -> Result<Vec<Mentorship>, AppError> {
        let mentor_id = mentor_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::MENTORSHIPS)
            .filter(move |q| q.field("mentor_id").eq(mentor_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a mentorship row.
    pub async fn upsert_mentorship(&self, link: &Mentorship) -> Result<(), AppError> {
        let doc_id = format!("{}_{}", link.mentor_id, link.apprentice_id);
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::MENTORSHIPS)
            .document_id(&doc_id)
            .object(link)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Activity Entry Operations ───────────────────────────────

    /// Get a single entry by ID.
    pub async fn get_entry(&self, entry_id: &str) -> Result<Option<ActivityEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ENTRIES)
            .obj()
            .one(entry_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All entries owned by one apprentice.
    pub async fn entries_for_user(&self, owner_id: &str) -> Result<Vec<ActivityEntry>, AppError> {
        let owner_id = owner_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ENTRIES)
            .filter(move |q| q.field("owner_id").eq(owner_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store an entry.
    pub async fn upsert_entry(&self, entry: &ActivityEntry) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ENTRIES)
            .document_id(&entry.entry_id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete an entry.
    pub async fn delete_entry(&self, entry_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ENTRIES)
            .document_id(entry_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Project Operations ──────────────────────────────────────

    /// All projects owned by one apprentice.
    pub async fn projects_for_user(&self, owner_id: &str) -> Result<Vec<Project>, AppError> {
        let owner_id = owner_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PROJECTS)
            .filter(move |q| q.field("owner_id").eq(owner_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a project.
    pub async fn upsert_project(&self, project: &Project) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PROJECTS)
            .document_id(&project.project_id)
            .object(project)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Template & Rule Operations ──────────────────────────────

    /// Get a template by ID.
    pub async fn get_template(
        &self,
        template_id: &str,
    ) -> Result<Option<AchievementTemplate>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TEMPLATES)
            .obj()
            .one(template_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List templates, optionally restricted to the visible subset.
    pub async fn list_templates(
        &self,
        only_visible: bool,
    ) -> Result<Vec<AchievementTemplate>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::TEMPLATES);

        let query = if only_visible {
            query.filter(|q| q.field("visible").eq(true))
        } else {
            query
        };

        query
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a template.
    pub async fn upsert_template(&self, template: &AchievementTemplate) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TEMPLATES)
            .document_id(&template.template_id)
            .object(template)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Unlock rules belonging to one template.
    pub async fn rules_for_template(
        &self,
        template_id: &str,
    ) -> Result<Vec<UnlockRule>, AppError> {
        let template_id = template_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RULES)
            .filter(move |q| q.field("template_id").eq(template_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All unlock rules at once, for a full reconciliation pass.
    pub async fn list_rules(&self) -> Result<Vec<UnlockRule>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RULES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update an unlock rule.
    pub async fn upsert_rule(&self, rule: &UnlockRule) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RULES)
            .document_id(&rule.rule_id)
            .object(rule)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Unlock Record Operations ────────────────────────────────

    /// Persisted unlock states for one user.
    pub async fn records_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<AchievementRecord>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RECORDS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store an unlock record at its combination-derived document ID.
    pub async fn upsert_record(
        &self,
        doc_id: &str,
        record: &AchievementRecord,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RECORDS)
            .document_id(doc_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Unlock History Operations ───────────────────────────────

    /// Attribution rows for one user.
    pub async fn history_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<UnlockHistoryEntry>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::UNLOCK_HISTORY)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Write the single attribution row for a (user, template) pair.
    ///
    /// The document ID is derived from the pair, so this overwrites any
    /// previous row: replace-on-change, not an append-only log.
    pub async fn upsert_history(&self, entry: &UnlockHistoryEntry) -> Result<(), AppError> {
        let doc_id = UnlockHistoryEntry::doc_id(&entry.user_id, &entry.template_id);
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::UNLOCK_HISTORY)
            .document_id(&doc_id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove the attribution row for a (user, template) pair.
    pub async fn delete_history(&self, user_id: &str, template_id: &str) -> Result<(), AppError> {
        let doc_id = UnlockHistoryEntry::doc_id(user_id, template_id);
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::UNLOCK_HISTORY)
            .document_id(&doc_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Hour Limit Operations ───────────────────────────────────

    /// The global hour-limits singleton, if configured.
    pub async fn get_global_limits(&self) -> Result<Option<HourLimits>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::HOUR_LIMITS)
            .obj()
            .one(GLOBAL_LIMITS_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A per-user hour-limits override, if one exists.
    pub async fn get_user_limits(&self, user_id: &str) -> Result<Option<HourLimits>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::HOUR_LIMITS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a limits record (global singleton or per-user override).
    pub async fn upsert_limits(&self, limits: &HourLimits) -> Result<(), AppError> {
        let doc_id = match &limits.scope {
            crate::models::LimitScope::Global => GLOBAL_LIMITS_DOC.to_string(),
            crate::models::LimitScope::PerUser { user_id } => user_id.clone(),
        };
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::HOUR_LIMITS)
            .document_id(&doc_id)
            .object(limits)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove a per-user limits override (the user falls back to global).
    pub async fn delete_user_limits(&self, user_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::HOUR_LIMITS)
            .document_id(user_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
