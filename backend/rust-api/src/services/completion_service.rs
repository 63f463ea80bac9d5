use chrono::{DateTime, Utc};

use super::{progress_rules, quiz_grader, EngineContext};
use crate::errors::{ProgressError, ProgressResult};
use crate::metrics::{PROGRESS_ADVANCEMENTS_TOTAL, QUIZ_SUBMISSIONS_TOTAL, TASK_COMPLETIONS_TOTAL};
use crate::models::{
    content::Task,
    progress::UserProgress,
    submission::{CompleteTaskRequest, CompletionOutcome, QuizGrade, Submission},
};

/// Conditional progress writes lost to concurrent requests before giving up
const MAX_ADVANCE_ATTEMPTS: usize = 5;

/// Submission and progress after a completion request
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCompletion {
    pub submission: Submission,
    pub progress: UserProgress,
}

pub struct CompletionService {
    ctx: EngineContext,
}

impl CompletionService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn complete_task(
        &self,
        user_id: &str,
        task_id: &str,
        req: &CompleteTaskRequest,
    ) -> ProgressResult<TaskCompletion> {
        self.complete_task_at(user_id, task_id, req, Utc::now()).await
    }

    /// Marks the task completed for the user and advances their challenge
    /// progress when the task's day is a new highest day.
    ///
    /// Re-completing a completed task returns the stored submission; progress
    /// only moves if that task's day was never applied. Enrollment is checked before anything is written, so
    /// a rejected request never leaves a submission behind.
    pub async fn complete_task_at(
        &self,
        user_id: &str,
        task_id: &str,
        req: &CompleteTaskRequest,
        now: DateTime<Utc>,
    ) -> ProgressResult<TaskCompletion> {
        let task = self
            .ctx
            .storage("find_task", self.ctx.store.find_task(task_id))
            .await?
            .ok_or_else(|| ProgressError::not_found(format!("Task {}", task_id)))?;

        let score = match (&task.quiz, &req.quiz_answers) {
            (Some(quiz), Some(answers)) => Some(quiz_grader::grade(quiz, answers).score),
            _ => None,
        };

        let progress = self
            .ctx
            .storage(
                "find_progress",
                self.ctx.store.find_progress(user_id, &task.challenge_id),
            )
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    "User {} completed task {} without enrolling in {}",
                    user_id,
                    task_id,
                    task.challenge_id
                );
                ProgressError::not_enrolled(user_id, &task.challenge_id)
            })?;

        let candidate = Submission::completed(user_id, task_id, score, req.metadata(), now);
        let (submission, newly_completed) = match self
            .ctx
            .storage("complete_submission", self.ctx.store.complete_submission(candidate))
            .await?
        {
            CompletionOutcome::AlreadyCompleted(existing) => {
                TASK_COMPLETIONS_TOTAL
                    .with_label_values(&["already_completed"])
                    .inc();
                tracing::debug!(
                    "Task {} already completed by {}, returning stored submission",
                    task_id,
                    user_id
                );
                (existing, false)
            }
            CompletionOutcome::Completed(submission) => {
                TASK_COMPLETIONS_TOTAL.with_label_values(&["completed"]).inc();
                (submission, true)
            }
        };

        // Also runs for an already completed task: a day whose advance failed
        // after the submission committed is applied on the retry.
        let (progress, advanced) = self.apply_day(user_id, &task, progress, now).await?;

        if newly_completed || advanced {
            self.ctx.invalidate_dashboard(user_id).await;
        }
        if newly_completed {
            tracing::info!("Task {} completed by {}", task_id, user_id);
        }

        Ok(TaskCompletion {
            submission,
            progress,
        })
    }

    /// Raises the user's progress to the task's day with a conditional write.
    ///
    /// When a concurrent request moves the record first, the rules are applied
    /// again to the stored record, so the highest completed day always wins.
    /// Returns the resulting record and whether this call changed it.
    async fn apply_day(
        &self,
        user_id: &str,
        task: &Task,
        mut current: UserProgress,
        now: DateTime<Utc>,
    ) -> ProgressResult<(UserProgress, bool)> {
        for attempt in 1..=MAX_ADVANCE_ATTEMPTS {
            let advancement = match progress_rules::advance(&current, task.day_number, now) {
                Some(advancement) => advancement,
                None => {
                    tracing::debug!(
                        "Task {} (day {}) does not exceed day {} for {}, progress unchanged",
                        task.id,
                        task.day_number,
                        current.completed_days,
                        user_id
                    );
                    return Ok((current, false));
                }
            };

            let stored = self
                .ctx
                .storage(
                    "advance_progress",
                    self.ctx
                        .store
                        .advance_progress(&advancement.progress, current.completed_days),
                )
                .await?;

            match stored {
                Some(updated) => {
                    let label = if advancement.streak_continued {
                        "continued"
                    } else {
                        "reset"
                    };
                    PROGRESS_ADVANCEMENTS_TOTAL.with_label_values(&[label]).inc();
                    tracing::info!(
                        "User {} reached day {} of {} (streak {})",
                        user_id,
                        updated.completed_days,
                        updated.challenge_id,
                        updated.streak_count
                    );
                    return Ok((updated, true));
                }
                None => {
                    tracing::debug!(
                        "Progress for {} on {} changed concurrently (attempt {}), re-reading",
                        user_id,
                        task.challenge_id,
                        attempt
                    );
                    current = self
                        .ctx
                        .storage(
                            "find_progress",
                            self.ctx.store.find_progress(user_id, &task.challenge_id),
                        )
                        .await?
                        .ok_or_else(|| ProgressError::not_enrolled(user_id, &task.challenge_id))?;
                }
            }
        }

        tracing::error!(
            "Progress for {} on {} kept changing, gave up after {} attempts",
            user_id,
            task.challenge_id,
            MAX_ADVANCE_ATTEMPTS
        );
        Err(ProgressError::StorageUnavailable(anyhow::anyhow!(
            "progress for {} on {} kept changing",
            user_id,
            task.challenge_id
        )))
    }

    /// Grades the answers and stores the score on the user's pending submission.
    /// A completed submission keeps its original score.
    pub async fn submit_quiz(
        &self,
        user_id: &str,
        task_id: &str,
        answers: &[i64],
    ) -> ProgressResult<QuizGrade> {
        let task = self
            .ctx
            .storage("find_task", self.ctx.store.find_task(task_id))
            .await?
            .ok_or_else(|| ProgressError::not_found(format!("Task {}", task_id)))?;
        let quiz = task
            .quiz
            .as_ref()
            .ok_or_else(|| ProgressError::not_found(format!("Quiz for task {}", task_id)))?;

        let grade = quiz_grader::grade(quiz, answers);
        let perfect = if grade.score == grade.total_questions {
            "true"
        } else {
            "false"
        };
        QUIZ_SUBMISSIONS_TOTAL.with_label_values(&[perfect]).inc();

        let candidate = Submission::pending(user_id, task_id, grade.score, Utc::now());
        let stored = self
            .ctx
            .storage("record_quiz_score", self.ctx.store.record_quiz_score(candidate))
            .await?;

        tracing::info!(
            "Quiz for task {} graded for {}: {}/{} (submission {})",
            task_id,
            user_id,
            grade.score,
            grade.total_questions,
            stored.status.as_str()
        );

        Ok(grade)
    }

    pub async fn get_submission(&self, user_id: &str, task_id: &str) -> ProgressResult<Submission> {
        self.ctx
            .storage(
                "find_submission",
                self.ctx.store.find_submission(user_id, task_id),
            )
            .await?
            .ok_or_else(|| ProgressError::not_found(format!("Submission for task {}", task_id)))
    }
}
