use crate::models::{content::Quiz, submission::QuizGrade};

/// Counts answers that match the correct option index of the question at the
/// same position. Missing, negative or out-of-range answers count as wrong.
pub fn grade(quiz: &Quiz, answers: &[i64]) -> QuizGrade {
    let score = quiz
        .questions
        .iter()
        .enumerate()
        .filter(|(i, question)| {
            answers
                .get(*i)
                .is_some_and(|answer| *answer == i64::from(question.correct_answer))
        })
        .count();

    QuizGrade {
        score: score as u32,
        total_questions: quiz.questions.len() as u32,
    }
}
