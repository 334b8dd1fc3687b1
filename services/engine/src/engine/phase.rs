//! The session/phase state machine: WAITING -> ACTIVE{BETWEEN_QUESTIONS <->
//! QUESTION_ACTIVE <-> SHOWING_RESULTS} -> COMPLETED. One method per
//! command; every mutation is a single transaction that locks the quiz row,
//! allocates the next sequence number, writes the event log row, and
//! commits before the event is handed to the bus -- a client never
//! observes an event whose sequence number isn't already durable.

use std::time::Duration;

use chrono::Utc;
use quiz_protocol::{
    ActiveQuestionView, EventPayload, Phase, PhaseChangePayload, ParticipantView, QuestionEndPayload,
    QuestionStartPayload, QuizEndPayload, QuizId, QuizStartPayload, QuizStatus, StateSyncPayload,
    TimerUpdatePayload, TimerView, UserJoinedPayload, WsEvent,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::compose::{option_views, parse_question_type};
use crate::engine::QuizEngine;
use crate::error::EngineError;
use crate::repo;

/// Countdown tick cadence for `TIMER_UPDATE` broadcasts during an active
/// question.
const TIMER_TICK: Duration = Duration::from_secs(1);

impl QuizEngine {
    pub async fn start_quiz(&self, quiz_id: QuizId) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        let quiz = repo::quiz::find_for_update(&mut tx, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        if quiz.status != "WAITING" {
            return Err(EngineError::InvalidState(
                "quiz must be WAITING to start".to_owned(),
            ));
        }
        let now = Utc::now();
        repo::quiz::set_status_and_phase(&mut tx, quiz_id, "ACTIVE", "BETWEEN_QUESTIONS").await?;
        repo::quiz::set_start_time(&mut tx, quiz_id, now).await?;

        let seq = repo::event_log::next_sequence(&mut tx, quiz_id).await?;
        let payload = EventPayload::QuizStart(QuizStartPayload {
            quiz_id,
            started_at: now,
        });
        self.append_and_commit(tx, quiz_id, seq, payload).await
    }

    pub async fn start_question(&self, quiz_id: QuizId, question_id: Uuid) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        let quiz = repo::quiz::find_for_update(&mut tx, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        if quiz.status != "ACTIVE" {
            return Err(EngineError::InvalidState("quiz is not active".to_owned()));
        }
        if quiz.current_phase != "BETWEEN_QUESTIONS" {
            return Err(EngineError::InvalidState(
                "a question is already active or being shown".to_owned(),
            ));
        }
        let question = repo::question::find(&self.pool, question_id)
            .await?
            .filter(|q| q.quiz_id == quiz_id)
            .ok_or_else(|| EngineError::NotFound("question".to_owned()))?;
        let total_questions = repo::question::count(&self.pool, quiz_id).await?;
        let options = repo::question::options_for(&self.pool, question_id).await?;

        let now = Utc::now();
        repo::quiz::set_status_and_phase(&mut tx, quiz_id, "ACTIVE", "QUESTION_ACTIVE").await?;
        repo::quiz::set_current_question(&mut tx, quiz_id, Some(question_id), Some(now)).await?;
        // This question is starting now, so it is no longer "next".
        repo::quiz::set_next_question(&mut tx, quiz_id, None).await?;

        let seq = repo::event_log::next_sequence(&mut tx, quiz_id).await?;
        let payload = EventPayload::QuestionStart(QuestionStartPayload {
            question_id,
            text: question.text,
            question_type: parse_question_type(&question.question_type),
            options: option_views(&options, true),
            time_limit_seconds: question.time_limit_seconds,
            order: question.display_order,
            #[allow(clippy::cast_possible_truncation)]
            total_questions: total_questions as i32,
            start_time: now,
        });
        self.append_and_commit(tx, quiz_id, seq, payload).await?;

        self.spawn_timer_broadcast(quiz_id, question_id, question.time_limit_seconds, now);
        Ok(())
    }

    /// 1 Hz `TIMER_UPDATE` countdown for one active question. Published to
    /// the bus like any other broadcast (not sent straight to the local
    /// hub) so every instance's attached clients see it, not only this
    /// instance's. Stops itself once the quiz moves off this question --
    /// by a manual `EndQuestion` or by reaching zero here -- so it never
    /// outlives the question it is timing.
    fn spawn_timer_broadcast(
        &self,
        quiz_id: QuizId,
        question_id: Uuid,
        time_limit_seconds: i32,
        started_at: chrono::DateTime<Utc>,
    ) {
        let bus = self.bus.clone();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TIMER_TICK);
            loop {
                ticker.tick().await;
                let Ok(Some(quiz)) = repo::quiz::find(&pool, quiz_id).await else {
                    break;
                };
                if quiz.current_question_id != Some(question_id) {
                    break;
                }
                let elapsed = (Utc::now() - started_at).num_seconds();
                let remaining = i64::from(time_limit_seconds) - elapsed;
                if remaining < 0 {
                    break;
                }
                let event = WsEvent::new(
                    EventPayload::TimerUpdate(TimerUpdatePayload {
                        #[allow(clippy::cast_possible_truncation)]
                        remaining_seconds: remaining as i32,
                        total_seconds: time_limit_seconds,
                        end_time: started_at + chrono::Duration::seconds(i64::from(time_limit_seconds)),
                    }),
                    None,
                );
                if let Err(e) = bus.publish(quiz_id, &event).await {
                    warn!(%quiz_id, error = %e, "failed to publish TIMER_UPDATE");
                }
            }
        });
    }

    pub async fn end_question(&self, quiz_id: QuizId) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        let quiz = repo::quiz::find_for_update(&mut tx, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        if quiz.current_phase != "QUESTION_ACTIVE" {
            return Err(EngineError::InvalidState(
                "no question is currently active".to_owned(),
            ));
        }
        let question_id = quiz
            .current_question_id
            .ok_or_else(|| EngineError::Fatal("active phase without a current question".to_owned()))?;
        let options = repo::question::options_for(&self.pool, question_id).await?;
        let question = repo::question::find(&self.pool, question_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("question".to_owned()))?;

        let now = Utc::now();
        repo::quiz::set_status_and_phase(&mut tx, quiz_id, "ACTIVE", "SHOWING_RESULTS").await?;
        repo::quiz::set_current_question_ended_at(&mut tx, quiz_id, now).await?;

        let seq = repo::event_log::next_sequence(&mut tx, quiz_id).await?;
        let payload = EventPayload::QuestionEnd(QuestionEndPayload {
            question_id,
            correct_option_ids: options.iter().filter(|o| o.is_correct).map(|o| o.option_id).collect(),
            question_type: parse_question_type(&question.question_type),
            end_time: now,
        });
        self.append_and_commit(tx, quiz_id, seq, payload).await
    }

    pub async fn move_to_next_question(&self, quiz_id: QuizId) -> Result<bool, EngineError> {
        let mut tx = self.pool.begin().await?;
        let quiz = repo::quiz::find_for_update(&mut tx, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        if quiz.status != "ACTIVE" {
            return Err(EngineError::InvalidState("quiz is not active".to_owned()));
        }
        // currentQuestionId=null means no question has started yet; the
        // next one to offer is order=1, i.e. whatever follows order=0.
        let current_order = match quiz.current_question_id {
            Some(question_id) => {
                repo::question::find(&self.pool, question_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound("question".to_owned()))?
                    .display_order
            }
            None => 0,
        };
        let next = repo::question::find_next(&self.pool, quiz_id, current_order).await?;

        repo::quiz::set_status_and_phase(&mut tx, quiz_id, "ACTIVE", "BETWEEN_QUESTIONS").await?;
        repo::quiz::set_current_question(&mut tx, quiz_id, None, None).await?;
        repo::quiz::set_next_question(&mut tx, quiz_id, next.as_ref().map(|q| q.question_id)).await?;

        let seq = repo::event_log::next_sequence(&mut tx, quiz_id).await?;
        let payload = EventPayload::PhaseChange(PhaseChangePayload {
            phase: Phase::BetweenQuestions,
            has_next: next.is_some(),
        });
        self.append_and_commit(tx, quiz_id, seq, payload).await?;
        Ok(next.is_some())
    }

    pub async fn end_quiz(&self, quiz_id: QuizId) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await?;
        let quiz = repo::quiz::find_for_update(&mut tx, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        if quiz.status != "ACTIVE" {
            return Err(EngineError::InvalidState("quiz is not active".to_owned()));
        }
        let now = Utc::now();
        // BETWEEN_QUESTIONS is the terminal phase sentinel here: ending
        // mid-question still clears currentQuestionId, which is what the
        // 1Hz timer task polls to know to stop ticking.
        repo::quiz::set_status_and_phase(&mut tx, quiz_id, "COMPLETED", "BETWEEN_QUESTIONS").await?;
        repo::quiz::set_current_question(&mut tx, quiz_id, None, None).await?;
        repo::quiz::set_end_time(&mut tx, quiz_id, now).await?;

        let duration_seconds = quiz
            .start_time
            .map(|start| (now - start).num_seconds())
            .unwrap_or(0);

        let seq = repo::event_log::next_sequence(&mut tx, quiz_id).await?;
        let payload = EventPayload::QuizEnd(QuizEndPayload {
            quiz_id,
            duration_seconds,
        });
        self.append_and_commit(tx, quiz_id, seq, payload).await
    }

    /// Creates a participant and publishes `USER_JOINED`. Only legal while
    /// the quiz is `WAITING` (invariant 6): once a creator starts the quiz
    /// the roster is closed, so latecomers can watch but not compete.
    pub async fn join_quiz(&self, quiz_id: QuizId, nickname: &str) -> Result<Uuid, EngineError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(EngineError::InvalidOption("nickname must not be empty".to_owned()));
        }

        let quiz = repo::quiz::find(&self.pool, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        if quiz.status != "WAITING" {
            return Err(EngineError::InvalidState(
                "participants may only join while the quiz is waiting to start".to_owned(),
            ));
        }

        let participant = repo::participant::create(&self.pool, quiz_id, nickname).await?;
        let mut tx = self.pool.begin().await?;
        let seq = repo::event_log::next_sequence(&mut tx, quiz_id).await?;
        let payload = EventPayload::UserJoined(UserJoinedPayload {
            participant_id: participant.participant_id,
            nickname: participant.nickname.clone(),
        });
        self.append_and_commit(tx, quiz_id, seq, payload).await?;
        Ok(participant.participant_id)
    }

    /// Resolves a quiz by its access code and delegates to [`Self::join_quiz`].
    /// Backs `POST /quizzes/join`, the code-based alternative to joining by
    /// path-scoped id.
    pub async fn join_quiz_by_code(&self, access_code: &str, nickname: &str) -> Result<(Uuid, Uuid), EngineError> {
        let quiz = repo::quiz::find_by_access_code(&self.pool, access_code)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        let participant_id = self.join_quiz(quiz.quiz_id, nickname).await?;
        Ok((quiz.quiz_id, participant_id))
    }

    /// Common tail shared by every command: write the log row, commit, then
    /// publish to the bus. A failure between commit and publish only
    /// delays delivery -- the missed-events catch-up path (handshake and
    /// the standalone HTTP endpoint) makes it eventually consistent.
    async fn append_and_commit(
        &self,
        mut tx: sqlx::Transaction<'_, sqlx::Postgres>,
        quiz_id: QuizId,
        seq: i64,
        payload: EventPayload,
    ) -> Result<(), EngineError> {
        let payload_json =
            serde_json::to_value(&payload).map_err(|e| EngineError::Fatal(e.to_string()))?;
        repo::event_log::append(&mut tx, quiz_id, seq, payload.type_name(), &payload_json).await?;
        tx.commit().await?;

        let event = WsEvent::new(payload, Some(seq));
        if let Err(e) = self.bus.publish(quiz_id, &event).await {
            warn!(%quiz_id, seq, error = %e, "failed to publish event to bus");
        }
        Ok(())
    }

    pub async fn state_sync(
        &self,
        quiz_id: QuizId,
        for_creator: bool,
    ) -> Result<StateSyncPayload, EngineError> {
        let quiz = repo::quiz::find(&self.pool, quiz_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("quiz".to_owned()))?;
        let participants = repo::participant::list_for_quiz(&self.pool, quiz_id).await?;
        let active = repo::presence::active_participants(&self.pool, quiz_id).await?;
        let active_ids: std::collections::HashSet<Uuid> =
            active.iter().map(|p| p.participant_id).collect();

        let active_question = if let Some(question_id) = quiz.current_question_id {
            let question = repo::question::find(&self.pool, question_id).await?;
            let options = repo::question::options_for(&self.pool, question_id).await?;
            question.map(|q| ActiveQuestionView {
                question_id,
                text: q.text,
                options: option_views(&options, for_creator),
                question_type: parse_question_type(&q.question_type),
                time_limit_seconds: q.time_limit_seconds,
                start_time: quiz.current_question_started_at.unwrap_or_else(Utc::now),
                order: q.display_order,
                #[allow(clippy::cast_possible_truncation)]
                total_questions: repo::question::count(&self.pool, quiz_id).await? as i32,
            })
        } else {
            None
        };

        let timer = match (&active_question, quiz.current_question_started_at) {
            (Some(q), Some(started_at)) => {
                let elapsed = (Utc::now() - started_at).num_seconds();
                Some(TimerView {
                    start_time: started_at,
                    duration_seconds: q.time_limit_seconds,
                    #[allow(clippy::cast_possible_truncation)]
                    remaining_seconds: (i64::from(q.time_limit_seconds) - elapsed).max(0) as i32,
                    is_running: quiz.current_phase == "QUESTION_ACTIVE",
                })
            }
            _ => None,
        };

        let participants_view = participants
            .into_iter()
            .map(|p| {
                (
                    p.participant_id,
                    ParticipantView {
                        id: p.participant_id,
                        nickname: p.nickname,
                        is_connected: active_ids.contains(&p.participant_id),
                        last_seen: p.joined_at,
                        score: p.score,
                    },
                )
            })
            .collect();

        let sequence_number = repo::event_log::latest_sequence(&self.pool, quiz_id).await?;
        let status = match quiz.status.as_str() {
            "ACTIVE" => QuizStatus::Active,
            "COMPLETED" => QuizStatus::Completed,
            _ => QuizStatus::Waiting,
        };
        let current_phase = match quiz.current_phase.as_str() {
            "QUESTION_ACTIVE" => Phase::QuestionActive,
            "SHOWING_RESULTS" => Phase::ShowingResults,
            _ => Phase::BetweenQuestions,
        };

        info!(%quiz_id, for_creator, "composed state sync");

        Ok(StateSyncPayload {
            quiz_id,
            title: quiz.title,
            status,
            current_phase,
            active_question,
            timer,
            participants: participants_view,
            #[allow(clippy::cast_possible_truncation)]
            active_count: active_ids.len() as i32,
            sequence_number,
            start_time: quiz.start_time,
            end_time: quiz.end_time,
        })
    }
}
