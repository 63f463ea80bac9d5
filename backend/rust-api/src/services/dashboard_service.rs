use super::EngineContext;
use crate::errors::ProgressResult;
use crate::metrics::{record_cache_hit, record_cache_miss};
use crate::models::{
    content::Challenge,
    dashboard::{DashboardSummary, EnrolledChallenge},
    progress::UserProgress,
};

pub struct DashboardService {
    ctx: EngineContext,
}

impl DashboardService {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub async fn summary(&self, user_id: &str) -> ProgressResult<DashboardSummary> {
        let epoch = self.ctx.dashboard_epoch.current();

        match self.ctx.cache.get(user_id).await {
            Ok(Some(cached)) => {
                record_cache_hit();
                tracing::debug!("Dashboard cache hit for {}", user_id);
                return Ok(cached);
            }
            Ok(None) => record_cache_miss(),
            Err(e) => {
                record_cache_miss();
                tracing::warn!("Dashboard cache read failed for {}: {:#}", user_id, e);
            }
        }

        let rows = self
            .ctx
            .storage("list_progress", self.ctx.store.list_progress(user_id))
            .await?;

        let mut enrolled = Vec::with_capacity(rows.len());
        for progress in rows {
            let challenge = self
                .ctx
                .storage(
                    "find_challenge",
                    self.ctx.store.find_challenge(&progress.challenge_id),
                )
                .await?;
            if challenge.is_none() {
                tracing::warn!(
                    "User {} is enrolled in missing challenge {}",
                    user_id,
                    progress.challenge_id
                );
            }
            enrolled.push((progress, challenge));
        }

        let summary = summarize(&enrolled);
        if self.ctx.dashboard_epoch.current() != epoch {
            tracing::debug!("Dashboard for {} invalidated while computing, not caching", user_id);
            return Ok(summary);
        }
        if let Err(e) = self.ctx.cache.put(user_id, &summary).await {
            tracing::warn!("Dashboard cache write failed for {}: {:#}", user_id, e);
        }
        // An invalidation between the check and the write must still win
        if self.ctx.dashboard_epoch.current() != epoch {
            if let Err(e) = self.ctx.cache.invalidate(user_id).await {
                tracing::warn!("Failed to drop stale dashboard for {}: {:#}", user_id, e);
            }
        }

        Ok(summary)
    }
}

/// Aggregates enrollments into dashboard figures. A challenge that no longer
/// exists contributes its completed days but no duration.
pub fn summarize(enrolled: &[(UserProgress, Option<Challenge>)]) -> DashboardSummary {
    let total_completed: u64 = enrolled
        .iter()
        .map(|(p, _)| u64::from(p.completed_days))
        .sum();
    let total_duration: u64 = enrolled
        .iter()
        .filter_map(|(_, c)| c.as_ref().map(|c| u64::from(c.duration)))
        .sum();

    let completion_rate = if total_duration == 0 {
        0
    } else {
        (100.0 * total_completed as f64 / total_duration as f64).round() as u32
    };

    let current_streak = enrolled
        .iter()
        .map(|(p, _)| p.streak_count)
        .max()
        .unwrap_or(0);

    DashboardSummary {
        active_challenges: enrolled.len(),
        completion_rate,
        current_streak,
        enrolled_challenges: enrolled
            .iter()
            .map(|(p, c)| EnrolledChallenge {
                challenge_id: p.challenge_id.clone(),
                title: c.as_ref().map(|c| c.title.clone()),
                duration: c.as_ref().map(|c| c.duration).unwrap_or(0),
                completed_days: p.completed_days,
                streak_count: p.streak_count,
                last_activity_date: p.last_activity_date,
            })
            .collect(),
    }
}
