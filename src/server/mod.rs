//! HTTP layer: the thin routing surface over the answer pipeline.
//!
//! # Endpoints
//!
//! - `GET  /health`                    — Liveness probe
//! - `POST /ask`                       — Resolve a question
//! - `GET  /open-days`                 — Cached open-events payload
//! - `POST /tasks/refresh-open-days`   — Secret-guarded cache refresh
//! - `GET  /conversation/:session_id`  — Tracker summary for the dashboard
//! - `GET  /family/:family_id`         — Family profile lookup
//! - `POST /realtime/session`          — Create a provider voice session

pub mod routes;

pub use routes::{app_router, AppState};
