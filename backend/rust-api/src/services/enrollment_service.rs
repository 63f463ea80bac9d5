use chrono::Utc;

use super::EngineContext;
use crate::errors::{ProgressError, ProgressResult};
use crate::metrics::ENROLLMENTS_TOTAL;
use crate::models::progress::UserProgress;

pub struct EnrollmentService {
    ctx: EngineContext,
}

impl EnrollmentService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Idempotent: a second enrollment returns the stored record unchanged.
    pub async fn enroll(&self, user_id: &str, challenge_id: &str) -> ProgressResult<UserProgress> {
        self.ctx
            .storage("find_challenge", self.ctx.store.find_challenge(challenge_id))
            .await?
            .ok_or_else(|| ProgressError::not_found(format!("Challenge {}", challenge_id)))?;

        let candidate = UserProgress::new(user_id, challenge_id, Utc::now());
        let enrollment = self
            .ctx
            .storage("enroll", self.ctx.store.enroll(candidate))
            .await?;

        if enrollment.is_created() {
            ENROLLMENTS_TOTAL.with_label_values(&["created"]).inc();
            self.ctx.invalidate_dashboard(user_id).await;
            tracing::info!("User {} enrolled in challenge {}", user_id, challenge_id);
        } else {
            ENROLLMENTS_TOTAL.with_label_values(&["existing"]).inc();
            tracing::debug!(
                "User {} already enrolled in challenge {}",
                user_id,
                challenge_id
            );
        }

        Ok(enrollment.into_progress())
    }

    pub async fn get_progress(
        &self,
        user_id: &str,
        challenge_id: &str,
    ) -> ProgressResult<UserProgress> {
        self.ctx
            .storage(
                "find_progress",
                self.ctx.store.find_progress(user_id, challenge_id),
            )
            .await?
            .ok_or_else(|| ProgressError::not_enrolled(user_id, challenge_id))
    }
}
