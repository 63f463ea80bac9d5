//! Storage boundary for the progress engine.
//!
//! One trait covers the read-only content store (challenges, tasks) and the two
//! ledgers the engine owns (submissions, user progress). Implementations must make
//! `complete_submission`, `record_quiz_score`, `enroll` and `advance_progress`
//! atomic with respect to concurrent callers: the engine never relies on a
//! leading read to guarantee uniqueness.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    content::{Challenge, Task},
    progress::{Enrollment, UserProgress},
    submission::{CompletionOutcome, Submission},
};

pub mod memory;
pub mod mongo;

pub use memory::{ContentSeed, MemoryStore};
pub use mongo::MongoStore;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>>;

    async fn list_challenges(&self) -> Result<Vec<Challenge>>;

    async fn find_task(&self, task_id: &str) -> Result<Option<Task>>;

    /// Tasks of a challenge ordered by day number
    async fn list_tasks(&self, challenge_id: &str) -> Result<Vec<Task>>;

    async fn find_submission(&self, user_id: &str, task_id: &str) -> Result<Option<Submission>>;

    /// Insert `candidate` or flip the existing pending submission to completed.
    ///
    /// An existing pending submission keeps its id; its score is replaced only when
    /// `candidate.score` is set. A completed submission is returned untouched as
    /// [`CompletionOutcome::AlreadyCompleted`].
    async fn complete_submission(&self, candidate: Submission) -> Result<CompletionOutcome>;

    /// Store a quiz score on a pending submission, creating it if needed.
    /// Completed submissions are returned unchanged.
    async fn record_quiz_score(&self, candidate: Submission) -> Result<Submission>;

    async fn find_progress(&self, user_id: &str, challenge_id: &str)
        -> Result<Option<UserProgress>>;

    /// All enrollments of a user ordered by enrollment time
    async fn list_progress(&self, user_id: &str) -> Result<Vec<UserProgress>>;

    /// Insert `candidate` unless a record for the same (user, challenge) exists.
    async fn enroll(&self, candidate: UserProgress) -> Result<Enrollment>;

    /// Persist `updated` only if the stored record still has
    /// `completed_days == expected_completed_days`. Returns `None` when another
    /// writer got there first.
    async fn advance_progress(
        &self,
        updated: &UserProgress,
        expected_completed_days: u32,
    ) -> Result<Option<UserProgress>>;

    async fn ping(&self) -> Result<()>;
}
