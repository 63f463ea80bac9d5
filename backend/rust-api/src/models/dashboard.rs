use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-side aggregate over a user's enrollments. Cached as JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub active_challenges: usize,
    /// Percentage of enrolled days completed, rounded
    pub completion_rate: u32,
    /// Highest streak across all enrolled challenges
    pub current_streak: u32,
    pub enrolled_challenges: Vec<EnrolledChallenge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolledChallenge {
    pub challenge_id: String,
    pub title: Option<String>,
    pub duration: u32,
    pub completed_days: u32,
    pub streak_count: u32,
    pub last_activity_date: Option<DateTime<Utc>>,
}
