use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::ProgressStore;
use crate::models::{
    content::{Challenge, Task},
    progress::{Enrollment, UserProgress},
    submission::{CompletionOutcome, Submission, SubmissionStatus},
};

/// Challenges and tasks to preload into a [`MemoryStore`]
#[derive(Debug, Default, Deserialize)]
pub struct ContentSeed {
    #[serde(default)]
    pub challenges: Vec<Challenge>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ContentSeed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read content seed {:?}", path))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse content seed {:?}", path))
    }
}

type PairKey = (String, String);

#[derive(Default)]
struct MemoryState {
    challenges: HashMap<String, Challenge>,
    tasks: HashMap<String, Task>,
    submissions: HashMap<PairKey, Submission>,
    progress: HashMap<PairKey, UserProgress>,
}

/// In-process store. Every mutation runs under one write lock, which gives the
/// same per-pair atomicity the MongoDB unique indexes provide.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

fn key(a: &str, b: &str) -> PairKey {
    (a.to_string(), b.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_seed(seed: ContentSeed) -> Self {
        let store = Self::new();
        store.load_seed(seed).await;
        store
    }

    pub async fn load_seed(&self, seed: ContentSeed) {
        let mut state = self.state.write().await;
        for challenge in seed.challenges {
            state.challenges.insert(challenge.id.clone(), challenge);
        }
        for task in seed.tasks {
            state.tasks.insert(task.id.clone(), task);
        }
    }

    pub async fn insert_challenge(&self, challenge: Challenge) {
        self.state
            .write()
            .await
            .challenges
            .insert(challenge.id.clone(), challenge);
    }

    pub async fn insert_task(&self, task: Task) {
        self.state.write().await.tasks.insert(task.id.clone(), task);
    }

    /// Overwrite a progress record as-is (fixtures, imports)
    pub async fn put_progress(&self, progress: UserProgress) {
        self.state.write().await.progress.insert(
            key(&progress.user_id, &progress.challenge_id),
            progress,
        );
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn find_challenge(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        Ok(self.state.read().await.challenges.get(challenge_id).cloned())
    }

    async fn list_challenges(&self) -> Result<Vec<Challenge>> {
        let mut challenges: Vec<Challenge> =
            self.state.read().await.challenges.values().cloned().collect();
        challenges.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(challenges)
    }

    async fn find_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.state.read().await.tasks.get(task_id).cloned())
    }

    async fn list_tasks(&self, challenge_id: &str) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .state
            .read()
            .await
            .tasks
            .values()
            .filter(|task| task.challenge_id == challenge_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.day_number);
        Ok(tasks)
    }

    async fn find_submission(&self, user_id: &str, task_id: &str) -> Result<Option<Submission>> {
        Ok(self
            .state
            .read()
            .await
            .submissions
            .get(&key(user_id, task_id))
            .cloned())
    }

    async fn complete_submission(&self, candidate: Submission) -> Result<CompletionOutcome> {
        let mut state = self.state.write().await;
        let slot = key(&candidate.user_id, &candidate.task_id);

        match state.submissions.get_mut(&slot) {
            Some(existing) if existing.is_completed() => {
                Ok(CompletionOutcome::AlreadyCompleted(existing.clone()))
            }
            Some(existing) => {
                existing.status = SubmissionStatus::Completed;
                if candidate.score.is_some() {
                    existing.score = candidate.score;
                }
                if candidate.metadata.is_some() {
                    existing.metadata = candidate.metadata;
                }
                existing.submitted_at = candidate.submitted_at;
                Ok(CompletionOutcome::Completed(existing.clone()))
            }
            None => {
                state.submissions.insert(slot, candidate.clone());
                Ok(CompletionOutcome::Completed(candidate))
            }
        }
    }

    async fn record_quiz_score(&self, candidate: Submission) -> Result<Submission> {
        let mut state = self.state.write().await;
        let slot = key(&candidate.user_id, &candidate.task_id);

        match state.submissions.get_mut(&slot) {
            Some(existing) if existing.is_completed() => Ok(existing.clone()),
            Some(existing) => {
                existing.score = candidate.score;
                existing.submitted_at = candidate.submitted_at;
                Ok(existing.clone())
            }
            None => {
                state.submissions.insert(slot, candidate.clone());
                Ok(candidate)
            }
        }
    }

    async fn find_progress(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> Result<Option<UserProgress>> {
        Ok(self
            .state
            .read()
            .await
            .progress
            .get(&key(user_id, challenge_id))
            .cloned())
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<UserProgress>> {
        let mut rows: Vec<UserProgress> = self
            .state
            .read()
            .await
            .progress
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.enrolled_at.cmp(&b.enrolled_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn enroll(&self, candidate: UserProgress) -> Result<Enrollment> {
        let mut state = self.state.write().await;
        let slot = key(&candidate.user_id, &candidate.challenge_id);

        if let Some(existing) = state.progress.get(&slot) {
            return Ok(Enrollment::Existing(existing.clone()));
        }
        state.progress.insert(slot, candidate.clone());
        Ok(Enrollment::Created(candidate))
    }

    async fn advance_progress(
        &self,
        updated: &UserProgress,
        expected_completed_days: u32,
    ) -> Result<Option<UserProgress>> {
        let mut state = self.state.write().await;
        let slot = key(&updated.user_id, &updated.challenge_id);

        match state.progress.get_mut(&slot) {
            Some(current)
                if current.id == updated.id
                    && current.completed_days == expected_completed_days =>
            {
                current.completed_days = updated.completed_days;
                current.streak_count = updated.streak_count;
                current.last_activity_date = updated.last_activity_date;
                Ok(Some(current.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
