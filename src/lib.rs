// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Guildhall: apprentice hour tracking and achievement reconciliation
//!
//! This crate provides the backend API for a craft-guild mentorship app:
//! logged hours and projects accrue toward badge/certificate unlock rules,
//! and the reconciliation engine keeps persisted unlock state in step with
//! the computed one.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_windows;

use config::Config;
use db::FirestoreDb;
use services::ReconcileEngine;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub engine: ReconcileEngine,
}
