// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    resolve_limits, ActivityEntry, EntryKind, HourLimits, LimitScope, Role,
};
use crate::services::display::AchievementView;
use crate::services::quota::{check_quota, QuotaCheck};
use crate::services::reconcile::Viewer;
use crate::time_windows::trailing_days;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Default span of the entry listing, in days.
const DEFAULT_ENTRY_LISTING_DAYS: u64 = 30;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/achievements", get(get_own_achievements))
        .route("/api/mentor/achievements", get(get_mentor_achievements))
        .route("/api/host/achievements", get(get_host_achievements))
        .route("/api/achievements/{template_id}/grant", post(grant_achievement))
        .route("/api/achievements/{template_id}/revoke", post(revoke_achievement))
        .route("/api/entries", get(list_entries).post(create_entry))
        .route("/api/entries/{entry_id}", put(update_entry).delete(delete_entry))
        .route("/api/limits", get(get_limits).put(put_limits))
        .route("/api/limits/{user_id}", delete(delete_limits))
}

fn require_role(user: &AuthUser, role: Role) -> Result<()> {
    if user.role == role {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

// ─── Achievement Views ───────────────────────────────────────

#[derive(Deserialize)]
pub struct MentorContextQuery {
    /// Selected mentor context, if the apprentice picked one
    pub mentor: Option<String>,
}

/// The apprentice's own reconciled achievements (unlocked items only).
async fn get_own_achievements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MentorContextQuery>,
) -> Result<Json<Vec<AchievementView>>> {
    let viewer = Viewer::Apprentice {
        user_id: user.user_id,
        mentor_context: query.mentor,
    };
    let views = state.engine.reconcile(&viewer).await?;
    Ok(Json(views))
}

#[derive(Deserialize)]
pub struct MentorViewQuery {
    /// One apprentice, or all connected apprentices when absent
    pub apprentice: Option<String>,
}

/// Mentor view: one apprentice's achievements under this mentor, or the
/// aggregate across all connected apprentices.
async fn get_mentor_achievements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MentorViewQuery>,
) -> Result<Json<Vec<AchievementView>>> {
    require_role(&user, Role::Mentor)?;
    let viewer = Viewer::Mentor {
        mentor_id: user.user_id,
        apprentice_id: query.apprentice,
    };
    let views = state.engine.reconcile(&viewer).await?;
    Ok(Json(views))
}

/// Host/audit view across all users.
async fn get_host_achievements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<AchievementView>>> {
    require_role(&user, Role::Host)?;
    let views = state.engine.reconcile(&Viewer::Host).await?;
    Ok(Json(views))
}

// ─── Manual Grant / Revoke ───────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct GrantPayload {
    #[validate(length(min = 1))]
    pub apprentice_id: String,
}

/// Manually unlock a manual-rule achievement for an apprentice.
async fn grant_achievement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(template_id): Path<String>,
    Json(payload): Json<GrantPayload>,
) -> Result<Json<StatusResponse>> {
    require_role(&user, Role::Mentor)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .engine
        .grant(&payload.apprentice_id, &template_id, &user.user_id)
        .await?;
    Ok(Json(StatusResponse::ok()))
}

/// Manually lock an achievement back.
async fn revoke_achievement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(template_id): Path<String>,
    Json(payload): Json<GrantPayload>,
) -> Result<Json<StatusResponse>> {
    require_role(&user, Role::Mentor)?;
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .engine
        .revoke(&payload.apprentice_id, &template_id, Some(&user.user_id))
        .await?;
    Ok(Json(StatusResponse::ok()))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatusResponse {
    pub success: bool,
}

impl StatusResponse {
    fn ok() -> Self {
        Self { success: true }
    }
}

// ─── Activity Entries ────────────────────────────────────────

#[derive(Deserialize)]
pub struct EntryListingQuery {
    pub days: Option<u64>,
}

/// List the apprentice's own recent entries.
async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<EntryListingQuery>,
) -> Result<Json<Vec<ActivityEntry>>> {
    let days = query.days.unwrap_or(DEFAULT_ENTRY_LISTING_DAYS);
    let window = trailing_days(chrono::Local::now().date_naive(), days);

    let mut entries = state.db.entries_for_user(&user.user_id).await?;
    entries.retain(|e| window.contains(e.occurred_at));
    entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    Ok(Json(entries))
}

#[derive(Deserialize, Validate)]
pub struct EntryPayload {
    pub kind: EntryKind,
    #[validate(range(min = 0.0, max = 24.0))]
    pub hours: f64,
    pub occurred_at: NaiveDateTime,
    pub mentor_id: Option<String>,
    #[serde(default)]
    pub note: String,
}

impl EntryPayload {
    /// Hours are logged on a half-hour grid.
    fn validate_increments(&self) -> Result<()> {
        if (self.hours * 2.0).fract() != 0.0 {
            return Err(AppError::BadRequest(
                "Hours must be in 0.5 increments".to_string(),
            ));
        }
        Ok(())
    }
}

/// Create an hour entry after validating it against the owner's quotas.
///
/// Unlike reconciliation reads, store failures here surface to the caller
/// so the save can be retried.
async fn create_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<EntryPayload>,
) -> Result<Json<ActivityEntry>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    payload.validate_increments()?;

    let entries = state.db.entries_for_user(&user.user_id).await?;
    let limits = effective_limits(&state, &user.user_id).await?;

    let check = check_quota(
        &entries,
        payload.kind,
        payload.hours,
        0.0,
        payload.occurred_at.date(),
        payload.mentor_id.as_deref(),
        &limits,
    );
    if let QuotaCheck::Violation { period, limit } = check {
        return Err(AppError::QuotaExceeded { period, limit });
    }

    let entry = ActivityEntry {
        entry_id: format!("{}-{}", user.user_id, chrono::Utc::now().timestamp_millis()),
        owner_id: user.user_id.clone(),
        kind: payload.kind,
        hours: payload.hours,
        occurred_at: payload.occurred_at,
        mentor_id: payload.mentor_id,
        note: payload.note,
    };
    state.db.upsert_entry(&entry).await?;

    tracing::info!(
        user_id = %user.user_id,
        entry_id = %entry.entry_id,
        hours = entry.hours,
        "Entry created"
    );
    Ok(Json(entry))
}

/// Edit an hour entry.
///
/// The stored row is dropped from the quota sums and the proposal charged
/// in full: an edit may move the entry to another day, kind, or mentor,
/// where the old hours no longer offset anything.
async fn update_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(entry_id): Path<String>,
    Json(payload): Json<EntryPayload>,
) -> Result<Json<ActivityEntry>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    payload.validate_increments()?;

    let existing = state
        .db
        .get_entry(&entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {}", entry_id)))?;
    if existing.owner_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let mut entries = state.db.entries_for_user(&user.user_id).await?;
    entries.retain(|e| e.entry_id != entry_id);
    let limits = effective_limits(&state, &user.user_id).await?;

    let check = check_quota(
        &entries,
        payload.kind,
        payload.hours,
        0.0,
        payload.occurred_at.date(),
        payload.mentor_id.as_deref(),
        &limits,
    );
    if let QuotaCheck::Violation { period, limit } = check {
        return Err(AppError::QuotaExceeded { period, limit });
    }

    let entry = ActivityEntry {
        entry_id: existing.entry_id,
        owner_id: existing.owner_id,
        kind: payload.kind,
        hours: payload.hours,
        occurred_at: payload.occurred_at,
        mentor_id: payload.mentor_id,
        note: payload.note,
    };
    state.db.upsert_entry(&entry).await?;
    Ok(Json(entry))
}

/// Delete an owned entry.
async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(entry_id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let existing = state
        .db
        .get_entry(&entry_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {}", entry_id)))?;
    if existing.owner_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    state.db.delete_entry(&entry_id).await?;
    Ok(Json(StatusResponse::ok()))
}

// ─── Hour Limits ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LimitsQuery {
    pub user: Option<String>,
}

/// Effective limits for a user: per-user override or global defaults.
async fn get_limits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LimitsQuery>,
) -> Result<Json<HourLimits>> {
    let subject = match query.user {
        Some(other) if other != user.user_id => {
            require_role(&user, Role::Host)?;
            other
        }
        _ => user.user_id,
    };
    let limits = effective_limits(&state, &subject).await?;
    Ok(Json(limits))
}

/// Store a limits record (global singleton or per-user override).
async fn put_limits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(limits): Json<HourLimits>,
) -> Result<Json<StatusResponse>> {
    require_role(&user, Role::Host)?;
    state.db.upsert_limits(&limits).await?;

    let scope = match &limits.scope {
        LimitScope::Global => "global".to_string(),
        LimitScope::PerUser { user_id } => user_id.clone(),
    };
    tracing::info!(scope = %scope, "Hour limits updated");
    Ok(Json(StatusResponse::ok()))
}

/// Remove a per-user override; the user falls back to the global record.
async fn delete_limits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(user_id): Path<String>,
) -> Result<Json<StatusResponse>> {
    require_role(&user, Role::Host)?;
    state.db.delete_user_limits(&user_id).await?;
    Ok(Json(StatusResponse::ok()))
}

async fn effective_limits(state: &AppState, user_id: &str) -> Result<HourLimits> {
    let (per_user, global) = tokio::join!(
        state.db.get_user_limits(user_id),
        state.db.get_global_limits(),
    );
    let global = global?.unwrap_or_else(HourLimits::default_global);
    Ok(resolve_limits(per_user?, global))
}
