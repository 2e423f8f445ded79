use thiserror::Error;

use crate::geo::GridError;

/// Coarse error taxonomy the controller uses to pick a reporting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Fetch or decode failures. Shown to the user as a non-fatal notice.
    Network,
    /// Store read/write failures. Logged; the next fetch fills the gap.
    Persistence,
    /// Programmer errors such as misaligned grid input.
    Logic,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Api(_) | AppError::Decode(_) | AppError::Request(_) | AppError::Json(_) => {
                ErrorCategory::Network
            }
            AppError::Database(_) | AppError::Pool(_) | AppError::Io(_) => {
                ErrorCategory::Persistence
            }
            AppError::Grid(_) | AppError::Task(_) | AppError::Internal(_) => ErrorCategory::Logic,
        }
    }

    /// Network and persistence failures are retried by the next camera event.
    pub fn is_recoverable(&self) -> bool {
        self.category() != ErrorCategory::Logic
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Task(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
