use thiserror::Error;

/// Failures that abort an import request outright. Per-row validation
/// problems and unresolved natural keys are not errors at this level;
/// they travel in the report as field messages and warnings, and the
/// per-entity commit policy decides what they void.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Bad file: unsupported extension, oversize upload, or a workbook
    /// with no sheets. Always fatal for the whole request.
    #[error("{0}")]
    Format(String),

    /// Store failure surfaced by rusqlite. Partial-acceptance batches
    /// skip the row and keep going; all-or-nothing batches fail the
    /// request once validation has already passed.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}
