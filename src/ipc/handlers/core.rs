use std::path::PathBuf;

use serde_json::json;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing path", None);
    };
    let workspace = PathBuf::from(path);
    let conn = match db::open_db(&workspace) {
        Ok(conn) => conn,
        Err(e) => return err(&req.id, "workspace_open_failed", e.to_string(), None),
    };
    tracing::info!(workspace = %workspace.display(), "workspace selected");
    state.workspace = Some(workspace.clone());
    state.db = Some(conn);
    ok(&req.id, json!({ "workspace": workspace.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
