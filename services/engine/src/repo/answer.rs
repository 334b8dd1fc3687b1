use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq)]
pub enum SubmitResult {
    Accepted,
    AlreadyAnswered,
}

/// Records an answer for `(question_id, participant_id)` exactly once. The
/// primary key on that pair makes a second submission a no-op conflict
/// instead of a silent overwrite.
#[allow(clippy::too_many_arguments)]
pub async fn insert(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    question_id: Uuid,
    participant_id: Uuid,
    selected_option_ids: &[Uuid],
    is_correct: bool,
    score_awarded: i32,
    time_taken_ms: i32,
) -> Result<SubmitResult, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO answers (quiz_id, question_id, participant_id, selected_option_ids, is_correct, score_awarded, time_taken_ms)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (question_id, participant_id) DO NOTHING",
    )
    .bind(quiz_id)
    .bind(question_id)
    .bind(participant_id)
    .bind(selected_option_ids)
    .bind(is_correct)
    .bind(score_awarded)
    .bind(time_taken_ms)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        Ok(SubmitResult::AlreadyAnswered)
    } else {
        Ok(SubmitResult::Accepted)
    }
}

pub async fn has_answered(
    pool: &PgPool,
    question_id: Uuid,
    participant_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        "SELECT EXISTS(SELECT 1 FROM answers WHERE question_id = $1 AND participant_id = $2) AS exists",
    )
    .bind(question_id)
    .bind(participant_id)
    .fetch_one(pool)
    .await?;
    Ok(row.get::<bool, _>("exists"))
}
