use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct QuizRow {
    pub quiz_id: Uuid,
    pub creator_user_id: Uuid,
    pub title: String,
    pub status: String,
    pub current_phase: String,
    pub current_question_id: Option<Uuid>,
    pub current_question_started_at: Option<DateTime<Utc>>,
    pub current_question_ended_at: Option<DateTime<Utc>>,
    pub next_question_id: Option<Uuid>,
    pub access_code: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

fn row_to_quiz(row: sqlx::postgres::PgRow) -> QuizRow {
    QuizRow {
        quiz_id: row.get("quiz_id"),
        creator_user_id: row.get("creator_user_id"),
        title: row.get("title"),
        status: row.get("status"),
        current_phase: row.get("current_phase"),
        current_question_id: row.get("current_question_id"),
        current_question_started_at: row.get("current_question_started_at"),
        current_question_ended_at: row.get("current_question_ended_at"),
        next_question_id: row.get("next_question_id"),
        access_code: row.get("access_code"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
    }
}

pub async fn find(pool: &PgPool, quiz_id: Uuid) -> Result<Option<QuizRow>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM quizzes WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_quiz))
}

pub async fn find_by_access_code(
    pool: &PgPool,
    access_code: &str,
) -> Result<Option<QuizRow>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM quizzes WHERE access_code = $1")
        .bind(access_code)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(row_to_quiz))
}

/// Locks the quiz row for the duration of the caller's transaction so
/// concurrent commands against the same quiz serialize on it.
pub async fn find_for_update(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
) -> Result<Option<QuizRow>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM quizzes WHERE quiz_id = $1 FOR UPDATE")
        .bind(quiz_id)
        .fetch_optional(&mut *tx)
        .await?;
    Ok(row.map(row_to_quiz))
}

pub async fn set_status_and_phase(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    status: &str,
    phase: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE quizzes SET status = $1, current_phase = $2 WHERE quiz_id = $3")
        .bind(status)
        .bind(phase)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;
    Ok(())
}

pub async fn set_current_question(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    question_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quizzes SET current_question_id = $1, current_question_started_at = $2 WHERE quiz_id = $3",
    )
    .bind(question_id)
    .bind(started_at)
    .bind(quiz_id)
    .execute(&mut *tx)
    .await?;
    Ok(())
}

pub async fn set_current_question_ended_at(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    ended_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE quizzes SET current_question_ended_at = $1 WHERE quiz_id = $2")
        .bind(ended_at)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;
    Ok(())
}

/// Stores the UI hint for which question `MoveToNextQuestion` would start;
/// does not gate which question the creator actually starts next.
pub async fn set_next_question(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    next_question_id: Option<Uuid>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE quizzes SET next_question_id = $1 WHERE quiz_id = $2")
        .bind(next_question_id)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;
    Ok(())
}

pub async fn set_start_time(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    start_time: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE quizzes SET start_time = $1 WHERE quiz_id = $2")
        .bind(start_time)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;
    Ok(())
}

pub async fn set_end_time(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    end_time: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE quizzes SET end_time = $1 WHERE quiz_id = $2")
        .bind(end_time)
        .bind(quiz_id)
        .execute(&mut *tx)
        .await?;
    Ok(())
}
