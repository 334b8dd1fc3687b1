use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct QuestionRow {
    pub question_id: Uuid,
    pub quiz_id: Uuid,
    pub text: String,
    pub question_type: String,
    pub time_limit_seconds: i32,
    pub display_order: i32,
}

pub struct OptionRow {
    pub option_id: Uuid,
    pub question_id: Uuid,
    pub text: String,
    pub display_order: i32,
    pub is_correct: bool,
}

pub async fn find(pool: &PgPool, question_id: Uuid) -> Result<Option<QuestionRow>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM questions WHERE question_id = $1")
        .bind(question_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| QuestionRow {
        question_id: r.get("question_id"),
        quiz_id: r.get("quiz_id"),
        text: r.get("text"),
        question_type: r.get("question_type"),
        time_limit_seconds: r.get("time_limit_seconds"),
        display_order: r.get("display_order"),
    }))
}

/// The question that follows `after_order` in the quiz, if any.
pub async fn find_next(
    pool: &PgPool,
    quiz_id: Uuid,
    after_order: i32,
) -> Result<Option<QuestionRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT * FROM questions WHERE quiz_id = $1 AND display_order > $2 ORDER BY display_order ASC LIMIT 1",
    )
    .bind(quiz_id)
    .bind(after_order)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| QuestionRow {
        question_id: r.get("question_id"),
        quiz_id: r.get("quiz_id"),
        text: r.get("text"),
        question_type: r.get("question_type"),
        time_limit_seconds: r.get("time_limit_seconds"),
        display_order: r.get("display_order"),
    }))
}

pub async fn count(pool: &PgPool, quiz_id: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(pool)
        .await?;
    Ok(row.get("n"))
}

pub async fn options_for(pool: &PgPool, question_id: Uuid) -> Result<Vec<OptionRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM options WHERE question_id = $1 ORDER BY display_order ASC",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| OptionRow {
            option_id: r.get("option_id"),
            question_id: r.get("question_id"),
            text: r.get("text"),
            display_order: r.get("display_order"),
            is_correct: r.get("is_correct"),
        })
        .collect())
}
