// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Achievement reconciliation engine.
//!
//! For each (user, template[, mentor]) combination the engine computes the
//! desired lock state from the unlock rules, compares it against the
//! persisted record, and executes the resulting sync intent (unlock, lock,
//! or nothing). Transitions are idempotent, so re-running a pass after a
//! failed write converges to the same state.
//!
//! All store reads degrade to empty data on failure: a missing snapshot
//! renders as "nothing unlocked yet" rather than an error. Failed sync
//! writes are queued and retried at the start of the next pass.

use std::collections::BTreeMap;

use dashmap::DashMap;
use futures_util::{stream, StreamExt};

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{
    AchievementRecord, AchievementTemplate, ActivityEntry, Project, RuleType, TemplateScope,
    UnlockHistoryEntry, User, UNLOCKED_BY_SYSTEM,
};
use crate::services::aggregate::aggregate;
use crate::services::display::{self, AchievementView};
use crate::services::rules::{evaluate, RuleSet, RuleVerdict};
use crate::time_windows::all_time;

const MAX_CONCURRENT_SYNC_WRITES: usize = 16;

/// Identity of one persisted unlock state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub user_id: String,
    pub template_id: String,
    /// Present iff the template scope is per-mentor
    pub mentor_id: Option<String>,
}

impl RecordKey {
    fn doc_id(&self) -> String {
        AchievementRecord::doc_id(&self.user_id, &self.template_id, self.mentor_id.as_deref())
    }
}

/// Who or what caused an unlock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    System,
    Mentor(String),
}

/// Write the engine wants executed against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncIntent {
    Unlock {
        attributed_to: Attribution,
        /// First satisfied rule, recorded in the history row
        rule_id: Option<String>,
    },
    Lock,
    Noop,
}

/// The slice of persisted record state the transition function needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordState {
    pub locked: bool,
    /// Whether the current unlock came from an explicit mentor grant
    pub manually_granted: bool,
}

impl From<&AchievementRecord> for RecordState {
    fn from(record: &AchievementRecord) -> Self {
        Self {
            locked: record.locked,
            manually_granted: record.granted_by.is_some(),
        }
    }
}

/// The automatic-path transition function.
///
/// Manual-only rule sets never transition automatically; in particular a
/// manually granted unlock survives a statistics regression. Unlocking and
/// locking both require an actual state difference, everything else is a
/// no-op.
pub fn decide(verdict: &RuleVerdict, state: &RecordState) -> SyncIntent {
    if verdict.manual_only {
        return SyncIntent::Noop;
    }
    match (state.locked, verdict.satisfied) {
        (true, true) => SyncIntent::Unlock {
            attributed_to: Attribution::System,
            rule_id: verdict.satisfied_rule_ids.first().cloned(),
        },
        (false, false) if !state.manually_granted => SyncIntent::Lock,
        _ => SyncIntent::Noop,
    }
}

/// Who is asking, and under which mentor context.
#[derive(Debug, Clone)]
pub enum Viewer {
    /// The owning apprentice, optionally scoped to one selected mentor.
    Apprentice {
        user_id: String,
        mentor_context: Option<String>,
    },
    /// A mentor looking at one apprentice, or at all connected apprentices.
    Mentor {
        mentor_id: String,
        apprentice_id: Option<String>,
    },
    /// The audit role: global truth across every user.
    Host,
}

/// One reconciled achievement, ready for projection.
#[derive(Debug, Clone)]
pub struct ReconciledAchievement {
    pub template: AchievementTemplate,
    pub rule_set: RuleSet,
    /// Mentor the unlock state belongs to, for per-mentor templates
    pub mentor_id: Option<String>,
    pub locked: bool,
    /// Whether a persisted unlock-history row backs the unlock. A freshly
    /// computed unlock whose sync write has not landed is not attributed.
    pub attributed: bool,
    /// Apprentices currently holding the unlock
    pub earners: Vec<User>,
    /// Granting mentor, for manual unlocks
    pub granted_by: Option<User>,
}

/// Raw per-user store data a reconciliation pass runs on.
#[derive(Default)]
struct UserBundle {
    entries: Vec<ActivityEntry>,
    projects: Vec<Project>,
    records: Vec<AchievementRecord>,
    history: Vec<UnlockHistoryEntry>,
}

/// The orchestrator owning store access and the write-retry set.
pub struct ReconcileEngine {
    db: FirestoreDb,
    pending_retries: DashMap<RecordKey, SyncIntent>,
}

impl ReconcileEngine {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            pending_retries: DashMap::new(),
        }
    }

    /// Reconcile and project every achievement relevant to `viewer`.
    pub async fn reconcile(&self, viewer: &Viewer) -> Result<Vec<AchievementView>> {
        self.retry_pending().await;

        match viewer {
            Viewer::Apprentice {
                user_id,
                mentor_context,
            } => {
                let items = self
                    .reconcile_apprentice(user_id, mentor_context.as_deref())
                    .await;
                Ok(items
                    .iter()
                    .filter(|item| !item.locked)
                    .map(|item| display::project(item, viewer))
                    .collect())
            }
            Viewer::Mentor {
                mentor_id,
                apprentice_id: Some(apprentice_id),
            } => {
                let items = self
                    .reconcile_apprentice(apprentice_id, Some(mentor_id))
                    .await;
                Ok(items
                    .iter()
                    .map(|item| display::project(item, viewer))
                    .collect())
            }
            Viewer::Mentor {
                mentor_id,
                apprentice_id: None,
            } => {
                let links = or_empty(
                    self.db.apprentices_for_mentor(mentor_id).await,
                    "mentorships",
                );
                let apprentice_ids: Vec<String> =
                    links.into_iter().map(|l| l.apprentice_id).collect();
                let merged = self
                    .reconcile_across(&apprentice_ids, Some(mentor_id))
                    .await;
                Ok(merged
                    .iter()
                    .map(|item| display::project(item, viewer))
                    .collect())
            }
            Viewer::Host => {
                let users = or_empty(self.db.list_users().await, "users");
                let apprentice_ids: Vec<String> = users
                    .into_iter()
                    .filter(|u| u.role == crate::models::Role::Apprentice)
                    .map(|u| u.user_id)
                    .collect();
                let merged = self.reconcile_across(&apprentice_ids, None).await;
                // The audit view reflects persisted state only: a computed
                // unlock whose sync write never landed stays hidden until a
                // later pass writes its history row.
                Ok(merged
                    .iter()
                    .filter(|item| !item.earners.is_empty() && item.attributed)
                    .map(|item| display::project(item, viewer))
                    .collect())
            }
        }
    }

    /// Manually unlock a manual-rule template for an apprentice.
    ///
    /// Only a mentor connected to the apprentice may grant. Unlike the
    /// read path, failures here surface to the caller.
    pub async fn grant(&self, user_id: &str, template_id: &str, mentor_id: &str) -> Result<()> {
        self.require_mentorship(user_id, mentor_id).await?;
        let (template, rule_set) = self.template_with_rules(template_id).await?;
        if !rule_set
            .rules
            .iter()
            .any(|r| r.rule_type == RuleType::Manual)
        {
            return Err(AppError::BadRequest(format!(
                "Template {} has no manual rule and cannot be granted",
                template_id
            )));
        }

        let manual_rule_id = rule_set
            .rules
            .iter()
            .find(|r| r.rule_type == RuleType::Manual)
            .map(|r| r.rule_id.clone());

        let key = RecordKey {
            user_id: user_id.to_string(),
            template_id: template_id.to_string(),
            mentor_id: match template.scope {
                TemplateScope::PerMentor => Some(mentor_id.to_string()),
                TemplateScope::Global => None,
            },
        };

        let intent = SyncIntent::Unlock {
            attributed_to: Attribution::Mentor(mentor_id.to_string()),
            rule_id: manual_rule_id,
        };
        self.execute_intent(&key, &intent).await?;
        tracing::info!(user_id, template_id, mentor_id, "Manual unlock granted");
        Ok(())
    }

    /// Manually lock an achievement back.
    pub async fn revoke(
        &self,
        user_id: &str,
        template_id: &str,
        mentor_id: Option<&str>,
    ) -> Result<()> {
        if let Some(mentor_id) = mentor_id {
            self.require_mentorship(user_id, mentor_id).await?;
        }
        let (template, _) = self.template_with_rules(template_id).await?;

        let key = RecordKey {
            user_id: user_id.to_string(),
            template_id: template_id.to_string(),
            mentor_id: match template.scope {
                TemplateScope::PerMentor => Some(
                    mentor_id
                        .ok_or_else(|| {
                            AppError::BadRequest(
                                "Per-mentor template requires a mentor id".to_string(),
                            )
                        })?
                        .to_string(),
                ),
                TemplateScope::Global => None,
            },
        };

        self.execute_intent(&key, &SyncIntent::Lock).await?;
        tracing::info!(user_id, template_id, "Achievement revoked");
        Ok(())
    }

    /// Reject mentors acting on apprentices they are not connected to.
    async fn require_mentorship(&self, user_id: &str, mentor_id: &str) -> Result<()> {
        let links = self.db.mentors_for_apprentice(user_id).await?;
        if links.iter().any(|l| l.mentor_id == mentor_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    // ─── Internals ───────────────────────────────────────────────

    /// Run one reconciliation pass for a single apprentice.
    ///
    /// `mentor_scope` narrows both which per-mentor states are evaluated
    /// and how the statistics snapshot is sliced. Sync intents are only
    /// written back from canonical evaluations: the unfiltered one for
    /// global templates, the owning mentor's one for per-mentor templates.
    /// A mentor-filtered look at a global template is display-only.
    async fn reconcile_apprentice(
        &self,
        user_id: &str,
        mentor_scope: Option<&str>,
    ) -> Vec<ReconciledAchievement> {
        let catalog = self.fetch_catalog().await;
        let bundle = self.fetch_user_bundle(user_id).await;
        let subject = self.fetch_user(user_id).await;

        let needs_mentors = catalog
            .iter()
            .any(|(t, _)| t.scope == TemplateScope::PerMentor);
        let mentor_ids: Vec<String> = if needs_mentors {
            or_empty(self.db.mentors_for_apprentice(user_id).await, "mentorships")
                .into_iter()
                .map(|l| l.mentor_id)
                .filter(|m| mentor_scope.map_or(true, |scope| scope == m))
                .collect()
        } else {
            Vec::new()
        };

        let window = all_time();
        let mut items = Vec::new();
        let mut intents: Vec<(RecordKey, SyncIntent)> = Vec::new();

        for (template, rule_set) in &catalog {
            let contexts: Vec<Option<&str>> = match template.scope {
                TemplateScope::Global => vec![mentor_scope],
                TemplateScope::PerMentor => {
                    mentor_ids.iter().map(|m| Some(m.as_str())).collect()
                }
            };

            for mentor_ctx in contexts {
                let snapshot =
                    aggregate(&bundle.entries, &bundle.projects, &window, mentor_ctx);
                let verdict = evaluate(rule_set, &snapshot);

                let record_mentor = match template.scope {
                    TemplateScope::Global => None,
                    TemplateScope::PerMentor => mentor_ctx,
                };
                let record = bundle
                    .records
                    .iter()
                    .find(|r| {
                        r.template_id == template.template_id
                            && r.mentor_id.as_deref() == record_mentor
                    })
                    .cloned()
                    .unwrap_or_else(|| {
                        AchievementRecord::locked(user_id, &template.template_id, record_mentor)
                    });
                let state = RecordState::from(&record);

                let canonical = match template.scope {
                    TemplateScope::Global => mentor_scope.is_none(),
                    TemplateScope::PerMentor => true,
                };

                let locked = if canonical {
                    let intent = decide(&verdict, &state);
                    let locked = match intent {
                        SyncIntent::Unlock { .. } => false,
                        SyncIntent::Lock => true,
                        SyncIntent::Noop => state.locked,
                    };
                    if intent != SyncIntent::Noop {
                        intents.push((
                            RecordKey {
                                user_id: user_id.to_string(),
                                template_id: template.template_id.clone(),
                                mentor_id: record_mentor.map(str::to_string),
                            },
                            intent,
                        ));
                    }
                    locked
                } else if verdict.manual_only {
                    state.locked
                } else {
                    !verdict.satisfied
                };

                let granted_by = match granting_mentor(&record, &bundle.history) {
                    Some(mentor_id) => self.fetch_user(&mentor_id).await,
                    None => None,
                };

                let attributed = bundle
                    .history
                    .iter()
                    .any(|h| h.template_id == template.template_id);

                let earners = match (&subject, locked) {
                    (Some(user), false) => vec![user.clone()],
                    _ => Vec::new(),
                };

                items.push(ReconciledAchievement {
                    template: template.clone(),
                    rule_set: rule_set.clone(),
                    mentor_id: record_mentor.map(str::to_string),
                    locked,
                    attributed,
                    earners,
                    granted_by,
                });
            }
        }

        self.apply_intents(intents).await;
        items
    }

    /// Reconcile several apprentices and union the results per
    /// (template, mentor) pair, accumulating earners for attribution.
    async fn reconcile_across(
        &self,
        apprentice_ids: &[String],
        mentor_scope: Option<&str>,
    ) -> Vec<ReconciledAchievement> {
        let mut merged: BTreeMap<(String, Option<String>), ReconciledAchievement> =
            BTreeMap::new();

        for apprentice_id in apprentice_ids {
            let items = self.reconcile_apprentice(apprentice_id, mentor_scope).await;
            for item in items {
                let key = (item.template.template_id.clone(), item.mentor_id.clone());
                match merged.get_mut(&key) {
                    Some(existing) => {
                        existing.attributed |= item.attributed;
                        if !item.locked {
                            existing.locked = false;
                            existing.earners.extend(item.earners);
                        }
                    }
                    None => {
                        merged.insert(key, item);
                    }
                }
            }
        }

        merged.into_values().collect()
    }

    /// Fetch the template catalog and group each template with its rules.
    async fn fetch_catalog(&self) -> Vec<(AchievementTemplate, RuleSet)> {
        let (templates, rules) = tokio::join!(self.db.list_templates(true), self.db.list_rules());
        let templates = or_empty(templates, "templates");
        let mut rules_by_template: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for rule in or_empty(rules, "rules") {
            rules_by_template
                .entry(rule.template_id.clone())
                .or_default()
                .push(rule);
        }

        templates
            .into_iter()
            .map(|template| {
                let rules = rules_by_template
                    .remove(&template.template_id)
                    .unwrap_or_default();
                let rule_set = RuleSet {
                    combinator: template.combinator,
                    rules,
                };
                (template, rule_set)
            })
            .collect()
    }

    /// Fetch all per-user inputs concurrently, degrading each independently.
    async fn fetch_user_bundle(&self, user_id: &str) -> UserBundle {
        let (entries, projects, records, history) = tokio::join!(
            self.db.entries_for_user(user_id),
            self.db.projects_for_user(user_id),
            self.db.records_for_user(user_id),
            self.db.history_for_user(user_id),
        );
        UserBundle {
            entries: or_empty(entries, "entries"),
            projects: or_empty(projects, "projects"),
            records: or_empty(records, "records"),
            history: or_empty(history, "unlock history"),
        }
    }

    async fn fetch_user(&self, user_id: &str) -> Option<User> {
        match self.db.get_user(user_id).await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "User fetch failed, degrading");
                None
            }
        }
    }

    async fn template_with_rules(
        &self,
        template_id: &str,
    ) -> Result<(AchievementTemplate, RuleSet)> {
        let template = self
            .db
            .get_template(template_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Template {}", template_id)))?;
        let rules = self.db.rules_for_template(template_id).await?;
        let rule_set = RuleSet {
            combinator: template.combinator,
            rules,
        };
        Ok((template, rule_set))
    }

    /// Execute intents for distinct record keys concurrently. Failures go
    /// to the retry set instead of failing the pass.
    async fn apply_intents(&self, intents: Vec<(RecordKey, SyncIntent)>) {
        stream::iter(intents)
            .map(|(key, intent)| async move {
                if let Err(err) = self.execute_intent(&key, &intent).await {
                    tracing::warn!(
                        user_id = %key.user_id,
                        template_id = %key.template_id,
                        error = %err,
                        "Sync write failed, queued for retry"
                    );
                    self.pending_retries.insert(key, intent);
                }
            })
            .buffer_unordered(MAX_CONCURRENT_SYNC_WRITES)
            .collect::<Vec<()>>()
            .await;
    }

    /// Re-run sync writes that failed on a previous pass.
    async fn retry_pending(&self) {
        if self.pending_retries.is_empty() {
            return;
        }
        let queued: Vec<(RecordKey, SyncIntent)> = self
            .pending_retries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        for (key, _) in &queued {
            self.pending_retries.remove(key);
        }
        tracing::info!(count = queued.len(), "Retrying failed sync writes");
        self.apply_intents(queued).await;
    }

    /// Apply one sync intent to the store: flip the record and replace the
    /// (user, template) history row. Applying the same intent twice lands
    /// on identical state.
    async fn execute_intent(&self, key: &RecordKey, intent: &SyncIntent) -> Result<()> {
        match intent {
            SyncIntent::Noop => Ok(()),
            SyncIntent::Unlock {
                attributed_to,
                rule_id,
            } => {
                let now = chrono::Utc::now().to_rfc3339();
                let granted_by = match attributed_to {
                    Attribution::System => None,
                    Attribution::Mentor(mentor_id) => Some(mentor_id.clone()),
                };
                let record = AchievementRecord {
                    user_id: key.user_id.clone(),
                    template_id: key.template_id.clone(),
                    mentor_id: key.mentor_id.clone(),
                    locked: false,
                    earned_at: Some(now.clone()),
                    granted_by: granted_by.clone(),
                };
                self.db.upsert_record(&key.doc_id(), &record).await?;

                let history = UnlockHistoryEntry {
                    user_id: key.user_id.clone(),
                    template_id: key.template_id.clone(),
                    unlocked_by: granted_by.unwrap_or_else(|| UNLOCKED_BY_SYSTEM.to_string()),
                    rule_id: rule_id.clone(),
                    unlocked_at: now,
                };
                self.db.upsert_history(&history).await?;
                tracing::info!(
                    user_id = %key.user_id,
                    template_id = %key.template_id,
                    "Achievement unlocked"
                );
                Ok(())
            }
            SyncIntent::Lock => {
                let record = AchievementRecord::locked(
                    &key.user_id,
                    &key.template_id,
                    key.mentor_id.as_deref(),
                );
                self.db.upsert_record(&key.doc_id(), &record).await?;
                self.db
                    .delete_history(&key.user_id, &key.template_id)
                    .await?;
                tracing::info!(
                    user_id = %key.user_id,
                    template_id = %key.template_id,
                    "Achievement locked"
                );
                Ok(())
            }
        }
    }
}

/// Mentor to credit for the current unlock, from the record or, failing
/// that, the attribution history.
fn granting_mentor(record: &AchievementRecord, history: &[UnlockHistoryEntry]) -> Option<String> {
    if let Some(mentor_id) = &record.granted_by {
        return Some(mentor_id.clone());
    }
    history
        .iter()
        .find(|h| h.template_id == record.template_id && h.unlocked_by != UNLOCKED_BY_SYSTEM)
        .map(|h| h.unlocked_by.clone())
}

/// Degrade a failed store read to empty data with a warning.
fn or_empty<T>(result: Result<Vec<T>>, what: &str) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read {}, degrading to empty", what);
            Vec::new()
        }
    }
}
