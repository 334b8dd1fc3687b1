//! Builds per-audience wire views from storage rows. A creator always sees
//! `is_correct`; a participant sees it only once the question has ended.

use quiz_protocol::{EventPayload, OptionView, QuestionType, WsEvent};

use crate::repo::question::OptionRow;

/// A single event is published to the bus carrying full (creator-grade)
/// detail; each instance's fan-out strips per-option correctness before
/// handing it to participant sockets. Avoids composing and publishing two
/// payloads for every state change.
pub fn strip_correctness_for_participants(event: &WsEvent) -> WsEvent {
    let mut stripped = event.clone();
    match &mut stripped.payload {
        EventPayload::QuestionStart(p) => {
            for opt in &mut p.options {
                opt.is_correct = None;
            }
        }
        EventPayload::StateSync(p) => {
            if let Some(q) = &mut p.active_question {
                for opt in &mut q.options {
                    opt.is_correct = None;
                }
            }
        }
        _ => {}
    }
    stripped
}

pub fn option_views(rows: &[OptionRow], reveal_correctness: bool) -> Vec<OptionView> {
    rows.iter()
        .map(|r| OptionView {
            id: r.option_id,
            text: r.text.clone(),
            display_order: r.display_order,
            is_correct: reveal_correctness.then_some(r.is_correct),
        })
        .collect()
}

pub fn parse_question_type(raw: &str) -> QuestionType {
    match raw {
        "MULTIPLE_CHOICE" => QuestionType::MultipleChoice,
        _ => QuestionType::SingleChoice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_rows() -> Vec<OptionRow> {
        vec![OptionRow {
            option_id: Uuid::nil(),
            question_id: Uuid::nil(),
            text: "A".to_owned(),
            display_order: 1,
            is_correct: true,
        }]
    }

    #[test]
    fn option_views_hides_correctness_for_participants() {
        let views = option_views(&sample_rows(), false);
        assert_eq!(views[0].is_correct, None);
    }

    #[test]
    fn option_views_reveals_correctness_for_creators() {
        let views = option_views(&sample_rows(), true);
        assert_eq!(views[0].is_correct, Some(true));
    }

    #[test]
    fn strip_correctness_clears_question_start_options() {
        use quiz_protocol::{EventPayload, QuestionStartPayload, WsEvent};

        let event = WsEvent::new(
            EventPayload::QuestionStart(QuestionStartPayload {
                question_id: Uuid::nil(),
                text: "Q".to_owned(),
                question_type: QuestionType::SingleChoice,
                options: option_views(&sample_rows(), true),
                time_limit_seconds: 20,
                order: 1,
                total_questions: 5,
                start_time: chrono::Utc::now(),
            }),
            Some(1),
        );

        let stripped = strip_correctness_for_participants(&event);
        match stripped.payload {
            EventPayload::QuestionStart(p) => {
                assert!(p.options.iter().all(|o| o.is_correct.is_none()));
            }
            _ => panic!("expected question start"),
        }
    }
}
