use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line on stdin: `{id, method, params}`.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Session state: the selected workspace and its roster store. Both are
/// None until `workspace.select` succeeds.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
