//! Answer admission, correctness, and scoring.
//!
//! Single-choice is correct iff exactly one option is selected and it is the
//! question's one correct option. Multiple-choice is correct iff the
//! selected set equals the correct set exactly -- partial credit is not
//! awarded. Scoring is flat, not a continuous curve: a correct answer is
//! worth `BASE_SCORE`, plus `TIME_BONUS` iff it lands in the first half of
//! the question's time limit.

use std::collections::HashSet;

use quiz_protocol::{AnswerReceivedPayload, EventPayload, QuestionType, WsEvent};
use uuid::Uuid;

use crate::engine::compose::parse_question_type;
use crate::engine::QuizEngine;
use crate::error::EngineError;
use crate::repo;
use crate::repo::answer::SubmitResult;

const BASE_SCORE: i32 = 100;
const TIME_BONUS: i32 = 20;
/// Grace window past a question's nominal close, to absorb client/server
/// clock skew and in-flight network latency on a last-second answer.
const CLOSING_GRACE: std::time::Duration = std::time::Duration::from_millis(500);

pub struct GradedAnswer {
    pub correct: bool,
    pub score: i32,
}

fn grade(
    question_type: QuestionType,
    selected: &[Uuid],
    correct_ids: &HashSet<Uuid>,
    time_taken_secs: f64,
    time_limit_secs: i32,
) -> GradedAnswer {
    let selected_set: HashSet<Uuid> = selected.iter().copied().collect();
    let correct = match question_type {
        QuestionType::SingleChoice => {
            selected.len() == 1 && correct_ids.contains(&selected[0])
        }
        QuestionType::MultipleChoice => selected_set == *correct_ids,
    };

    if !correct {
        return GradedAnswer { correct: false, score: 0 };
    }

    let fast_enough = time_taken_secs < f64::from(time_limit_secs) / 2.0;
    let score = BASE_SCORE + if fast_enough { TIME_BONUS } else { 0 };
    GradedAnswer { correct: true, score }
}

impl QuizEngine {
    pub async fn submit_answer(
        &self,
        quiz_id: Uuid,
        participant_id: Uuid,
        question_id: Uuid,
        selected_option_ids: Vec<Uuid>,
        time_taken_secs: f64,
    ) -> Result<GradedAnswer, EngineError> {
        let quiz = repo::quiz::find(&self.pool, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;

        if quiz.status != "ACTIVE" {
            return Err(EngineError::InvalidState("quiz is not active".to_owned()));
        }
        if quiz.current_question_id != Some(question_id) {
            return Err(EngineError::InvalidState(
                "question is not the current active question".to_owned(),
            ));
        }

        let question = repo::question::find(&self.pool, question_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("question".to_owned()))?;

        let started_at = quiz
            .current_question_started_at
            .ok_or_else(|| EngineError::InvalidState("question has no start time".to_owned()))?;
        let now = chrono::Utc::now();
        let deadline = started_at
            + chrono::Duration::seconds(i64::from(question.time_limit_seconds))
            + chrono::Duration::from_std(CLOSING_GRACE).unwrap();
        if now > deadline {
            return Err(EngineError::Closed("question has closed".to_owned()));
        }
        // Scoring is computed server-side from the wall-clock elapsed since
        // the question started; the client-reported `time_taken_secs` is
        // accepted for telemetry only and never trusted for the time bonus,
        // since a client could otherwise always report 0 and collect it.
        #[allow(clippy::cast_precision_loss)]
        let server_time_taken_secs = (now - started_at).num_milliseconds().max(0) as f64 / 1000.0;

        repo::participant::find(&self.pool, participant_id)
            .await?
            .filter(|p| p.quiz_id == quiz_id)
            .ok_or_else(|| EngineError::NotFound("participant".to_owned()))?;

        let options = repo::question::options_for(&self.pool, question_id).await?;
        let valid_ids: HashSet<Uuid> = options.iter().map(|o| o.option_id).collect();
        if selected_option_ids.iter().any(|id| !valid_ids.contains(id)) {
            return Err(EngineError::InvalidOption(
                "selected option does not belong to this question".to_owned(),
            ));
        }

        let question_type = parse_question_type(&question.question_type);
        if question_type == QuestionType::SingleChoice && selected_option_ids.len() > 1 {
            return Err(EngineError::InvalidOption(
                "single-choice questions accept exactly one option".to_owned(),
            ));
        }

        let correct_ids: HashSet<Uuid> = options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.option_id)
            .collect();
        let graded = grade(
            question_type,
            &selected_option_ids,
            &correct_ids,
            server_time_taken_secs,
            question.time_limit_seconds,
        );

        let mut tx = self.pool.begin().await?;
        #[allow(clippy::cast_possible_truncation)]
        let time_taken_ms = (time_taken_secs * 1000.0).round() as i32;
        let result = repo::answer::insert(
            &mut tx,
            quiz_id,
            question_id,
            participant_id,
            &selected_option_ids,
            graded.correct,
            graded.score,
            time_taken_ms,
        )
        .await?;
        if result == SubmitResult::AlreadyAnswered {
            tx.rollback().await?;
            return Err(EngineError::Duplicate(
                "participant already answered this question".to_owned(),
            ));
        }
        repo::participant::add_score(&mut tx, participant_id, graded.score).await?;
        tx.commit().await?;

        let event = WsEvent::new(
            EventPayload::AnswerReceived(AnswerReceivedPayload {
                participant_id,
                question_id,
                selected_option_ids,
                time_taken: time_taken_secs,
            }),
            None,
        );
        // Published like any other event rather than sent directly to this
        // process's hub: the submitter may be attached to a different
        // instance than the one handling this HTTP/WS request.
        if let Err(e) = self.bus.publish(quiz_id, &event).await {
            tracing::warn!(%quiz_id, %participant_id, error = %e, "failed to publish ANSWER_RECEIVED");
        }

        self.refresh_leaderboard(quiz_id).await?;

        Ok(graded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn single_choice_is_correct_only_for_the_one_right_option() {
        let options = ids(3);
        let correct: HashSet<Uuid> = [options[1]].into_iter().collect();

        let right = grade(QuestionType::SingleChoice, &[options[1]], &correct, 2.0, 20);
        assert!(right.correct);

        let wrong = grade(QuestionType::SingleChoice, &[options[0]], &correct, 2.0, 20);
        assert!(!wrong.correct);
        assert_eq!(wrong.score, 0);
    }

    #[test]
    fn single_choice_rejects_multiple_selections_as_incorrect() {
        let options = ids(3);
        let correct: HashSet<Uuid> = [options[1]].into_iter().collect();
        let result = grade(
            QuestionType::SingleChoice,
            &[options[0], options[1]],
            &correct,
            2.0,
            20,
        );
        assert!(!result.correct);
    }

    #[test]
    fn multiple_choice_requires_exact_set_match() {
        let options = ids(4);
        let correct: HashSet<Uuid> = [options[0], options[2]].into_iter().collect();

        let exact = grade(
            QuestionType::MultipleChoice,
            &[options[2], options[0]],
            &correct,
            5.0,
            20,
        );
        assert!(exact.correct);

        let partial = grade(QuestionType::MultipleChoice, &[options[0]], &correct, 5.0, 20);
        assert!(!partial.correct);

        let extra = grade(
            QuestionType::MultipleChoice,
            &[options[0], options[1], options[2]],
            &correct,
            5.0,
            20,
        );
        assert!(!extra.correct);
    }

    #[test]
    fn time_bonus_applies_only_inside_the_first_half_of_the_time_limit() {
        let options = ids(2);
        let correct: HashSet<Uuid> = [options[0]].into_iter().collect();

        let fast = grade(QuestionType::SingleChoice, &[options[0]], &correct, 0.0, 20);
        let slow = grade(QuestionType::SingleChoice, &[options[0]], &correct, 20.0, 20);

        assert_eq!(fast.score, BASE_SCORE + TIME_BONUS);
        assert_eq!(slow.score, BASE_SCORE);
        assert!(fast.score > slow.score);
    }
}
