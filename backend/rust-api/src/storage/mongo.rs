use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{self, doc, Document},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Client, Collection, Database, IndexModel,
};

use super::ProgressStore;
use crate::metrics::track_db_operation;
use crate::models::{
    content::{Challenge, Task},
    progress::{Enrollment, UserProgress},
    submission::{CompletionOutcome, Submission, SubmissionStatus},
};
use crate::utils::{
    retry::{retry_async_with_config, RetryConfig},
    time::chrono_to_bson,
};

const CHALLENGES: &str = "challenges";
const TASKS: &str = "tasks";
const SUBMISSIONS: &str = "submissions";
const USER_PROGRESS: &str = "user_progress";

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    mongo: Database,
    retry: RetryConfig,
}

impl MongoStore {
    pub fn new(mongo: Database) -> Self {
        Self {
            mongo,
            retry: RetryConfig::default(),
        }
    }

    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .context("Failed to connect to MongoDB")?;
        let store = Self::new(client.database(database));
        store.ensure_indexes().await?;
        tracing::info!("MongoDB connected, database: {}", database);
        Ok(store)
    }

    /// Unique indexes back the one-submission-per-task and one-progress-per-challenge rules.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.submissions()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "task_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create submissions index")?;

        self.progress()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "challenge_id": 1 })
                    .options(unique())
                    .build(),
            )
            .await
            .context("Failed to create user_progress index")?;

        self.tasks()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "challenge_id": 1, "day_number": 1 })
                    .build(),
            )
            .await
            .context("Failed to create tasks index")?;

        Ok(())
    }

    fn challenges(&self) -> Collection<Challenge> {
        self.mongo.collection(CHALLENGES)
    }

    fn tasks(&self) -> Collection<Task> {
        self.mongo.collection(TASKS)
    }

    fn submissions(&self) -> Collection<Submission> {
        self.mongo.collection(SUBMISSIONS)
    }

    fn progress(&self) -> Collection<UserProgress> {
        self.mongo.collection(USER_PROGRESS)
    }

    fn upsert_returning_new() -> FindOneAndUpdateOptions {
        FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build()
    }

    async fn read_submission(&self, user_id: &str, task_id: &str) -> Result<Option<Submission>> {
        let filter = doc! { "user_id": user_id, "task_id": task_id };
        retry_async_with_config("find_submission", &self.retry, || async {
            self.submissions()
                .find_one(filter.clone())
                .await
                .context("Failed to query submissions")
        })
        .await
    }

    async fn read_progress(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<Option<UserProgress>> {
        let filter = doc! { "user_id": user_id, "challenge_id": challenge_id };
        retry_async_with_config("find_progress", &self.retry, || async {
            self.progress()
                .find_one(filter.clone())
                .await
                .context("Failed to query user_progress")
        })
        .await
    }

    /// Existing completed row for a pair whose conditional upsert hit the unique index
    async fn completed_after_conflict(&self, user_id: &str, task_id: &str) -> Result<Submission> {
        self.read_submission(user_id, task_id)
            .await?
            .ok_or_else(|| anyhow!("Submission vanished after duplicate key on {}", task_id))
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// `$set` document shared by the completion upsert
fn completion_set(candidate: &Submission) -> Result<Document> {
    let mut set = doc! {
        "status": SubmissionStatus::Completed.as_str(),
        "submitted_at": chrono_to_bson(candidate.submitted_at),
    };
    if let Some(score) = candidate.score {
        set.insert("score", i64::from(score));
    }
    if let Some(metadata) = &candidate.metadata {
        set.insert(
            "metadata",
            bson::to_bson(metadata).context("Failed to encode completion metadata")?,
        );
    }
    Ok(set)
}

#[async_trait]
impl ProgressStore for MongoStore {
    async fn find_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        track_db_operation("find_one", CHALLENGES, async {
            retry_async_with_config("find_challenge", &self.retry, || async {
                self.challenges()
                    .find_one(doc! { "_id": challenge_id })
                    .await
                    .context("Failed to query challenges")
            })
            .await
        })
        .await
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>> {
        track_db_operation("find", CHALLENGES, async {
            retry_async_with_config("list_challenges", &self.retry, || async {
                let cursor = self
                    .challenges()
                    .find(doc! {})
                    .sort(doc! { "_id": 1 })
                    .await
                    .context("Failed to query challenges")?;
                cursor
                    .try_collect::<Vec<_>>()
                    .await
                    .context("Challenge cursor error")
            })
            .await
        })
        .await
    }

    async fn find_task(&self, task_id: &str) -> Result<Option<Task>> {
        track_db_operation("find_one", TASKS, async {
            retry_async_with_config("find_task", &self.retry, || async {
                self.tasks()
                    .find_one(doc! { "_id": task_id })
                    .await
                    .context("Failed to query tasks")
            })
            .await
        })
        .await
    }

    async fn list_tasks(&self, challenge_id: &str) -> Result<Vec<Task>> {
        track_db_operation("find", TASKS, async {
            retry_async_with_config("list_tasks", &self.retry, || async {
                let cursor = self
                    .tasks()
                    .find(doc! { "challenge_id": challenge_id })
                    .sort(doc! { "day_number": 1 })
                    .await
                    .context("Failed to query tasks")?;
                cursor
                    .try_collect::<Vec<_>>()
                    .await
                    .context("Task cursor error")
            })
            .await
        })
        .await
    }

    async fn find_submission(&self, user_id: &str, task_id: &str) -> Result<Option<Submission>> {
        track_db_operation(
            "find_one",
            SUBMISSIONS,
            self.read_submission(user_id, task_id),
        )
        .await
    }

    async fn complete_submission(&self, candidate: Submission) -> Result<CompletionOutcome> {
        track_db_operation("find_one_and_update", SUBMISSIONS, async {
            // Matches only a missing or pending row; a completed row makes the
            // upsert collide with the unique (user_id, task_id) index.
            let filter = doc! {
                "user_id": &candidate.user_id,
                "task_id": &candidate.task_id,
                "status": { "$ne": SubmissionStatus::Completed.as_str() },
            };
            let update = doc! {
                "$set": completion_set(&candidate)?,
                "$setOnInsert": { "_id": &candidate.id },
            };

            let result = self
                .submissions()
                .find_one_and_update(filter, update)
                .with_options(Self::upsert_returning_new())
                .await;

            match result {
                Ok(Some(submission)) => Ok(CompletionOutcome::Completed(submission)),
                Ok(None) => Err(anyhow!("Completion upsert returned no document")),
                Err(e) if is_duplicate_key(&e) => {
                    let existing = self
                        .completed_after_conflict(&candidate.user_id, &candidate.task_id)
                        .await?;
                    Ok(CompletionOutcome::AlreadyCompleted(existing))
                }
                Err(e) => Err(anyhow!(e).context("Failed to complete submission")),
            }
        })
        .await
    }

    async fn record_quiz_score(&self, candidate: Submission) -> Result<Submission> {
        track_db_operation("find_one_and_update", SUBMISSIONS, async {
            let score = candidate
                .score
                .ok_or_else(|| anyhow!("Quiz score missing on candidate submission"))?;
            let filter = doc! {
                "user_id": &candidate.user_id,
                "task_id": &candidate.task_id,
                "status": { "$ne": SubmissionStatus::Completed.as_str() },
            };
            let update = doc! {
                "$set": {
                    "score": i64::from(score),
                    "submitted_at": chrono_to_bson(candidate.submitted_at),
                },
                "$setOnInsert": {
                    "_id": &candidate.id,
                    "status": SubmissionStatus::Pending.as_str(),
                },
            };

            let result = self
                .submissions()
                .find_one_and_update(filter, update)
                .with_options(Self::upsert_returning_new())
                .await;

            match result {
                Ok(Some(submission)) => Ok(submission),
                Ok(None) => Err(anyhow!("Quiz score upsert returned no document")),
                Err(e) if is_duplicate_key(&e) => {
                    self.completed_after_conflict(&candidate.user_id, &candidate.task_id)
                        .await
                }
                Err(e) => Err(anyhow!(e).context("Failed to record quiz score")),
            }
        })
        .await
    }

    async fn find_progress(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<Option<UserProgress>> {
        track_db_operation(
            "find_one",
            USER_PROGRESS,
            self.read_progress(user_id, challenge_id),
        )
        .await
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<UserProgress>> {
        track_db_operation("find", USER_PROGRESS, async {
            retry_async_with_config("list_progress", &self.retry, || async {
                let cursor = self
                    .progress()
                    .find(doc! { "user_id": user_id })
                    .sort(doc! { "enrolled_at": 1, "_id": 1 })
                    .await
                    .context("Failed to query user_progress")?;
                cursor
                    .try_collect::<Vec<_>>()
                    .await
                    .context("Progress cursor error")
            })
            .await
        })
        .await
    }

    async fn enroll(&self, candidate: UserProgress) -> Result<Enrollment> {
        track_db_operation("find_one_and_update", USER_PROGRESS, async {
            let filter = doc! {
                "user_id": &candidate.user_id,
                "challenge_id": &candidate.challenge_id,
            };
            let update = doc! {
                "$setOnInsert": {
                    "_id": &candidate.id,
                    "completed_days": i64::from(candidate.completed_days),
                    "streak_count": i64::from(candidate.streak_count),
                    "last_activity_date": bson::Bson::Null,
                    "enrolled_at": chrono_to_bson(candidate.enrolled_at),
                },
            };

            let result = self
                .progress()
                .find_one_and_update(filter, update)
                .with_options(Self::upsert_returning_new())
                .await;

            match result {
                Ok(Some(stored)) if stored.id == candidate.id => Ok(Enrollment::Created(stored)),
                Ok(Some(stored)) => Ok(Enrollment::Existing(stored)),
                Ok(None) => Err(anyhow!("Enrollment upsert returned no document")),
                // Two concurrent first enrollments: the loser reads the winner's row
                Err(e) if is_duplicate_key(&e) => self
                    .read_progress(&candidate.user_id, &candidate.challenge_id)
                    .await?
                    .map(Enrollment::Existing)
                    .ok_or_else(|| anyhow!("Progress vanished after duplicate key")),
                Err(e) => Err(anyhow!(e).context("Failed to enroll")),
            }
        })
        .await
    }

    async fn advance_progress(
        &self,
        updated: &UserProgress,
        expected_completed_days: u32,
    ) -> Result<Option<UserProgress>> {
        track_db_operation("find_one_and_update", USER_PROGRESS, async {
            let filter = doc! {
                "_id": &updated.id,
                "completed_days": i64::from(expected_completed_days),
            };
            let update = doc! {
                "$set": {
                    "completed_days": i64::from(updated.completed_days),
                    "streak_count": i64::from(updated.streak_count),
                    "last_activity_date": updated.last_activity_date.map(chrono_to_bson),
                },
            };

            self.progress()
                .find_one_and_update(filter, update)
                .with_options(
                    FindOneAndUpdateOptions::builder()
                        .return_document(ReturnDocument::After)
                        .build(),
                )
                .await
                .context("Failed to advance progress")
        })
        .await
    }

    async fn ping(&self) -> Result<()> {
        self.mongo
            .run_command(doc! { "ping": 1 })
            .await
            .context("MongoDB ping failed")?;
        Ok(())
    }
}
