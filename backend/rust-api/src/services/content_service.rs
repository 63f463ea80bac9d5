use super::EngineContext;
use crate::errors::{ProgressError, ProgressResult};
use crate::models::content::{ChallengeDetailResponse, ChallengeSummary, TaskView};

/// Read-only access to authored challenges and tasks
pub struct ContentService {
    ctx: EngineContext,
}

impl ContentService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn list_challenges(&self) -> ProgressResult<Vec<ChallengeSummary>> {
        let challenges = self
            .ctx
            .storage("list_challenges", self.ctx.store.list_challenges())
            .await?;
        Ok(challenges.into_iter().map(ChallengeSummary::from).collect())
    }

    pub async fn challenge_detail(&self, challenge_id: &str) -> ProgressResult<ChallengeDetailResponse> {
        let challenge = self
            .ctx
            .storage("find_challenge", self.ctx.store.find_challenge(challenge_id))
            .await?
            .ok_or_else(|| ProgressError::not_found(format!("Challenge {}", challenge_id)))?;
        let tasks = self
            .ctx
            .storage("list_tasks", self.ctx.store.list_tasks(challenge_id))
            .await?;

        Ok(ChallengeDetailResponse {
            challenge: challenge.into(),
            tasks: tasks.into_iter().map(TaskView::from).collect(),
        })
    }
}
