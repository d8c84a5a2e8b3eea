use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// One rejected form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("server responded with status {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("connection refused")]
    ConnectionRefused(#[source] reqwest::Error),

    #[error("unexpected transport error")]
    Unknown(#[source] reqwest::Error),

    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),

    #[error("a {0} is already in progress")]
    AlreadyInFlight(String),

    #[error("failed to save {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ClientError {
    /// The text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(errors) => errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("\n"),
            ClientError::Server { status, detail } => {
                format!("Server error ({}): {}", status, detail)
            }
            ClientError::Timeout(_) => {
                "Request timed out. Scraping can take several minutes; try fewer pages.".to_string()
            }
            ClientError::ConnectionRefused(_) => {
                "Cannot connect to the server. Make sure the backend is running.".to_string()
            }
            ClientError::Unknown(e) => format!("Unexpected error: {}", e),
            ClientError::UnsupportedFormat(format) => format!(
                "Unsupported export format '{}'. Use one of: csv, excel, json.",
                format
            ),
            ClientError::AlreadyInFlight(what) => {
                format!("A {} is already in progress. Please wait for it to finish.", what)
            }
            ClientError::Io { path, source } => {
                format!("Could not save {}: {}", path.display(), source)
            }
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ClientError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        // Connect timeouts report both flags; the timeout wins.
        if err.is_timeout() {
            ClientError::Timeout(err)
        } else if err.is_connect() {
            ClientError::ConnectionRefused(err)
        } else {
            ClientError::Unknown(err)
        }
    }
}
