use thiserror::Error;

/// Failures surfaced by the progress engine. Storage adapters speak `anyhow`;
/// everything is folded into one of these kinds at the service boundary.
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("user {user_id} is not enrolled in challenge {challenge_id}")]
    NotEnrolled {
        user_id: String,
        challenge_id: String,
    },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] anyhow::Error),

    #[error("invalid grading input: {0}")]
    GradingInputInvalid(String),
}

impl ProgressError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ProgressError::NotFound(what.into())
    }

    pub fn not_enrolled(user_id: &str, challenge_id: &str) -> Self {
        ProgressError::NotEnrolled {
            user_id: user_id.to_string(),
            challenge_id: challenge_id.to_string(),
        }
    }

    /// Stable machine-readable kind for API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressError::NotFound(_) => "not_found",
            ProgressError::NotEnrolled { .. } => "not_enrolled",
            ProgressError::StorageUnavailable(_) => "storage_unavailable",
            ProgressError::GradingInputInvalid(_) => "grading_input_invalid",
        }
    }
}

pub type ProgressResult<T> = Result<T, ProgressError>;
