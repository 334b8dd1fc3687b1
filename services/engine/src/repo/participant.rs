use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct ParticipantRow {
    pub participant_id: Uuid,
    pub quiz_id: Uuid,
    pub nickname: String,
    pub score: i32,
    pub joined_at: DateTime<Utc>,
}

pub async fn create(
    pool: &PgPool,
    quiz_id: Uuid,
    nickname: &str,
) -> Result<ParticipantRow, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO participants (participant_id, quiz_id, nickname) VALUES ($1, $2, $3)
         RETURNING participant_id, quiz_id, nickname, score, joined_at",
    )
    .bind(Uuid::new_v4())
    .bind(quiz_id)
    .bind(nickname)
    .fetch_one(pool)
    .await?;
    Ok(ParticipantRow {
        participant_id: row.get("participant_id"),
        quiz_id: row.get("quiz_id"),
        nickname: row.get("nickname"),
        score: row.get("score"),
        joined_at: row.get("joined_at"),
    })
}

pub async fn find(
    pool: &PgPool,
    participant_id: Uuid,
) -> Result<Option<ParticipantRow>, sqlx::Error> {
    let row = sqlx::query("SELECT * FROM participants WHERE participant_id = $1")
        .bind(participant_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| ParticipantRow {
        participant_id: r.get("participant_id"),
        quiz_id: r.get("quiz_id"),
        nickname: r.get("nickname"),
        score: r.get("score"),
        joined_at: r.get("joined_at"),
    }))
}

pub async fn list_for_quiz(
    pool: &PgPool,
    quiz_id: Uuid,
) -> Result<Vec<ParticipantRow>, sqlx::Error> {
    let rows = sqlx::query("SELECT * FROM participants WHERE quiz_id = $1 ORDER BY joined_at ASC")
        .bind(quiz_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| ParticipantRow {
            participant_id: r.get("participant_id"),
            quiz_id: r.get("quiz_id"),
            nickname: r.get("nickname"),
            score: r.get("score"),
            joined_at: r.get("joined_at"),
        })
        .collect())
}

pub async fn add_score(
    tx: &mut sqlx::PgConnection,
    participant_id: Uuid,
    delta: i32,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        "UPDATE participants SET score = score + $1 WHERE participant_id = $2 RETURNING score",
    )
    .bind(delta)
    .bind(participant_id)
    .fetch_one(&mut *tx)
    .await?;
    Ok(row.get("score"))
}

/// Top-`limit` participants by score, tie-broken by earliest join time.
pub async fn leaderboard(
    pool: &PgPool,
    quiz_id: Uuid,
    limit: i64,
) -> Result<Vec<ParticipantRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT * FROM participants WHERE quiz_id = $1 ORDER BY score DESC, joined_at ASC LIMIT $2",
    )
    .bind(quiz_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| ParticipantRow {
            participant_id: r.get("participant_id"),
            quiz_id: r.get("quiz_id"),
            nickname: r.get("nickname"),
            score: r.get("score"),
            joined_at: r.get("joined_at"),
        })
        .collect())
}
