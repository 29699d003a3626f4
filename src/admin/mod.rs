//! Admin surface (§6 External Interfaces): pushing a new configuration
//! snapshot and reading back the change log.
//!
//! Grounded on the teacher's `admin/mod.rs` routing shape (`is_handled_path`
//! plus a `handle_request` dispatcher) and JSON response conventions, with
//! the Pingora `Session`/JWT-claims plumbing replaced by plain
//! request/response values so this module stays independent of whichever
//! HTTP framework eventually drives it. Dropped in the final trim: JWT
//! admin-claims verification (`auth::jwks`) and cache prewarming
//! (`admin::prewarm`, `cache::warming`) — this deployment's admin surface
//! is config push and changelog read only.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ConfigManager;

/// A fully formed admin response, independent of the HTTP layer that
/// eventually writes it out.
pub struct AdminResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl AdminResponse {
    fn ok(body: serde_json::Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: serde_json::json!({ "status": "error", "message": message.into() }),
        }
    }
}

/// True for any path this module owns, so a caller's router can dispatch
/// here before falling through to request resolution.
pub fn is_handled_path(path: &str) -> bool {
    path == "/admin/config" || path == "/admin/config/changelog"
}

/// Dispatch one admin request. `body` is the raw request body, relevant
/// only for `PUT /admin/config`.
pub async fn handle_request(manager: &Arc<ConfigManager>, path: &str, method: &str, body: &str) -> AdminResponse {
    match (method, path) {
        ("PUT", "/admin/config") => push_config(manager, body),
        ("GET", "/admin/config") => AdminResponse::ok(serde_json::to_value(&*manager.current()).unwrap_or(serde_json::Value::Null)),
        ("GET", "/admin/config/changelog") => read_changelog(manager),
        _ => AdminResponse::error(404, format!("no admin route for {method} {path}")),
    }
}

fn push_config(manager: &Arc<ConfigManager>, yaml: &str) -> AdminResponse {
    match manager.apply_update(yaml) {
        Ok(applied) => AdminResponse::ok(serde_json::json!({
            "status": "accepted",
            "version": applied.version,
        })),
        Err(e) => AdminResponse::error(422, e.to_string()),
    }
}

#[derive(Serialize)]
struct ChangelogResponse {
    entries: Vec<crate::config::ChangeLogEntry>,
}

fn read_changelog(manager: &Arc<ConfigManager>) -> AdminResponse {
    let entries = manager.change_log();
    AdminResponse::ok(serde_json::to_value(ChangelogResponse { entries }).unwrap_or(serde_json::Value::Null))
}
