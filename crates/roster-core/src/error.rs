use thiserror::Error;

/// Application-wide error types for Roster.
///
/// Extraction misses are not errors: a strategy cascade that finds nothing
/// yields an empty field (see [`crate::strategy::Miss`]). Everything here is
/// either a collaborator failure or a configuration/IO problem.
#[derive(Error, Debug)]
pub enum AppError {
    /// Navigation to a page failed (bad status, DNS, CDP error).
    #[error("Navigation error: {0}")]
    NavigationError(String),

    /// Navigation or rendering timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The page loaded but could not be read back (content, scroll, screenshot).
    #[error("Render error: {0}")]
    RenderError(String),

    /// The collaborator does not support this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Record sink, queue, or artifact store failure.
    #[error("Store error: {0}")]
    StoreError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// CSV export failed.
    #[error("Export error: {0}")]
    ExportError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error came from the renderer while loading a page.
    ///
    /// These abandon the work item; they never abort the run.
    pub fn is_navigation_failure(&self) -> bool {
        matches!(
            self,
            AppError::NavigationError(_)
                | AppError::Timeout(_)
                | AppError::NetworkError(_)
                | AppError::RenderError(_)
        )
    }
}
