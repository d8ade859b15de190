use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A path segment is absent and creation was disabled.
    #[error("path not found: {path}")]
    NotFound { path: String },

    /// A stored row does not have the shape its table requires.
    /// The whole table is rejected.
    #[error("table '{table}' row {lineno}: {reason}")]
    Validation {
        table: String,
        lineno: u32,
        reason: String,
    },

    #[error("remote call '{operation}' failed: {message}")]
    RemoteIo { operation: String, message: String },

    #[error("spreadsheet at '{path}' no longer resolves to {cached} (now {resolved})")]
    DriftDetected {
        path: String,
        cached: String,
        resolved: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn remote(operation: &str, message: impl ToString) -> Self {
        StoreError::RemoteIo {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn validation(table: &str, lineno: u32, reason: impl Into<String>) -> Self {
        StoreError::Validation {
            table: table.to_string(),
            lineno,
            reason: reason.into(),
        }
    }

    /// Whether a cached spreadsheet id can no longer be trusted after this error.
    pub fn invalidates_identity(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. }
                | StoreError::RemoteIo { .. }
                | StoreError::DriftDetected { .. }
        )
    }

    /// Message shown to the person using the app.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Validation {
                table,
                lineno,
                reason,
            } => format!(
                "The '{}' sheet has a bad row at line {}: {}. Fix the spreadsheet and reload.",
                table, lineno, reason
            ),
            StoreError::DriftDetected { .. } => {
                "WARNING: the current sheet has changed its id remotely, refresh to reload it."
                    .to_string()
            }
            StoreError::InvalidInput(msg) => msg.clone(),
            other => format!(
                "Reload page. There was an error loading spreadsheets: {}",
                other
            ),
        }
    }
}

impl From<opendal::Error> for StoreError {
    fn from(err: opendal::Error) -> Self {
        StoreError::remote("storage", err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::remote("decode", err)
    }
}
