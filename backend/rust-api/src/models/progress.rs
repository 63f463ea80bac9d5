use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Per-user, per-challenge counters stored in MongoDB "user_progress" collection.
/// At most one document exists per (user_id, challenge_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub challenge_id: String,
    /// Highest day number reached
    pub completed_days: u32,
    pub streak_count: u32,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    pub last_activity_date: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub enrolled_at: DateTime<Utc>,
}

impl UserProgress {
    /// Zeroed record for a fresh enrollment
    pub fn new(user_id: &str, challenge_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            challenge_id: challenge_id.to_string(),
            completed_days: 0,
            streak_count: 0,
            last_activity_date: None,
            enrolled_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Enrollment {
    Created(UserProgress),
    Existing(UserProgress),
}

impl Enrollment {
    pub fn into_progress(self) -> UserProgress {
        match self {
            Enrollment::Created(p) | Enrollment::Existing(p) => p,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Enrollment::Created(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub id: String,
    pub user_id: String,
    pub challenge_id: String,
    pub completed_days: u32,
    pub streak_count: u32,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
}

impl From<UserProgress> for ProgressResponse {
    fn from(progress: UserProgress) -> Self {
        ProgressResponse {
            id: progress.id,
            user_id: progress.user_id,
            challenge_id: progress.challenge_id,
            completed_days: progress.completed_days,
            streak_count: progress.streak_count,
            last_activity_date: progress.last_activity_date,
            enrolled_at: progress.enrolled_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskCompletionResponse {
    pub submission: super::submission::SubmissionResponse,
    pub progress: ProgressResponse,
}
