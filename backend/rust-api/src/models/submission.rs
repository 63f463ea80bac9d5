use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::bson_datetime_as_chrono;

/// A user's attempt at a task, stored in MongoDB "submissions" collection.
/// At most one document exists per (user_id, task_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    pub status: SubmissionStatus,
    #[serde(default)]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CompletionMetadata>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn completed(
        user_id: &str,
        task_id: &str,
        score: Option<u32>,
        metadata: Option<CompletionMetadata>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            status: SubmissionStatus::Completed,
            score,
            metadata,
            submitted_at: now,
        }
    }

    pub fn pending(user_id: &str, task_id: &str, score: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            status: SubmissionStatus::Pending,
            score: Some(score),
            metadata: None,
            submitted_at: now,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SubmissionStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Completed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Completed => "completed",
        }
    }
}

/// Client-reported context of a completion. Stored as given, never used for scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_viewed: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learning_time_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_score: Option<u32>,
}

impl CompletionMetadata {
    pub fn is_empty(&self) -> bool {
        self.resources_viewed.is_none()
            && self.learning_time_seconds.is_none()
            && self.quiz_score.is_none()
    }
}

/// Result of the atomic insert-or-complete on the submission ledger
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    /// The submission moved to `completed` with this call
    Completed(Submission),
    /// A completed submission already existed and was left untouched
    AlreadyCompleted(Submission),
}

impl CompletionOutcome {
    pub fn submission(&self) -> &Submission {
        match self {
            CompletionOutcome::Completed(s) | CompletionOutcome::AlreadyCompleted(s) => s,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CompleteTaskRequest {
    #[validate(range(max = 10_000))]
    pub resources_viewed: Option<u32>,
    #[validate(range(max = 604_800))]
    pub learning_time_seconds: Option<u32>,
    pub quiz_score: Option<u32>,
    #[validate(length(max = 256, message = "Too many quiz answers"))]
    pub quiz_answers: Option<Vec<i64>>,
}

impl CompleteTaskRequest {
    pub fn metadata(&self) -> Option<CompletionMetadata> {
        let metadata = CompletionMetadata {
            resources_viewed: self.resources_viewed,
            learning_time_seconds: self.learning_time_seconds,
            quiz_score: self.quiz_score,
        };
        (!metadata.is_empty()).then_some(metadata)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    #[validate(length(max = 256, message = "Too many quiz answers"))]
    pub answers: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizGrade {
    pub score: u32,
    pub total_questions: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub id: String,
    pub user_id: String,
    pub task_id: String,
    pub status: SubmissionStatus,
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CompletionMetadata>,
    pub submitted_at: DateTime<Utc>,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        SubmissionResponse {
            id: submission.id,
            user_id: submission.user_id,
            task_id: submission.task_id,
            status: submission.status,
            score: submission.score,
            metadata: submission.metadata,
            submitted_at: submission.submitted_at,
        }
    }
}
