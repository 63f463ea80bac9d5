use serde::{Deserialize, Serialize};

/// Challenge document stored in MongoDB "challenges" collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Length of the program in days
    pub duration: u32,
}

/// One day of a challenge, stored in MongoDB "tasks" collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub challenge_id: String,
    /// 1-indexed, unique within a challenge
    pub day_number: u32,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`
    pub correct_answer: u32,
}

#[derive(Debug, Serialize)]
pub struct ChallengeSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: u32,
}

impl From<Challenge> for ChallengeSummary {
    fn from(challenge: Challenge) -> Self {
        ChallengeSummary {
            id: challenge.id,
            title: challenge.title,
            description: challenge.description,
            duration: challenge.duration,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChallengeListResponse {
    pub challenges: Vec<ChallengeSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChallengeDetailResponse {
    #[serde(flatten)]
    pub challenge: ChallengeSummary,
    pub tasks: Vec<TaskView>,
}

/// Task as shown to students: quiz answers are stripped
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: String,
    pub day_number: u32,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<QuizView>,
}

#[derive(Debug, Serialize)]
pub struct QuizView {
    pub questions: Vec<QuizQuestionView>,
}

#[derive(Debug, Serialize)]
pub struct QuizQuestionView {
    pub question: String,
    pub options: Vec<String>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        TaskView {
            id: task.id,
            day_number: task.day_number,
            title: task.title,
            content: task.content,
            quiz: task.quiz.map(|quiz| QuizView {
                questions: quiz
                    .questions
                    .into_iter()
                    .map(|q| QuizQuestionView {
                        question: q.question,
                        options: q.options,
                    })
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_view_hides_correct_answers() {
        let task = Task {
            id: "t1".to_string(),
            challenge_id: "c1".to_string(),
            day_number: 1,
            title: "Day 1".to_string(),
            content: "Read chapter one".to_string(),
            quiz: Some(Quiz {
                questions: vec![QuizQuestion {
                    question: "2 + 2?".to_string(),
                    options: vec!["3".to_string(), "4".to_string()],
                    correct_answer: 1,
                }],
            }),
        };

        let json = serde_json::to_value(TaskView::from(task)).unwrap();
        assert_eq!(json["quiz"]["questions"][0]["options"][1], "4");
        assert!(json["quiz"]["questions"][0].get("correct_answer").is_none());
    }
}
