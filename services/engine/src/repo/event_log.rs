use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct EventLogRow {
    pub seq: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Allocates the next sequence number for a quiz in a single round trip.
/// `quiz_sequences` holds one row per quiz; the row lock taken by the
/// `UPDATE` serializes concurrent callers so two commands against the same
/// quiz never observe the same `seq`. This replaces a `SELECT MAX(seq)+1`
/// read-then-write, which races under concurrent writers.
pub async fn next_sequence(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        "INSERT INTO quiz_sequences (quiz_id, seq) VALUES ($1, 1)
         ON CONFLICT (quiz_id) DO UPDATE SET seq = quiz_sequences.seq + 1
         RETURNING seq",
    )
    .bind(quiz_id)
    .fetch_one(&mut *tx)
    .await?;
    Ok(row.get("seq"))
}

pub async fn append(
    tx: &mut sqlx::PgConnection,
    quiz_id: Uuid,
    seq: i64,
    event_type: &str,
    payload: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO quiz_events (quiz_id, seq, event_type, payload) VALUES ($1, $2, $3, $4)",
    )
    .bind(quiz_id)
    .bind(seq)
    .bind(event_type)
    .bind(payload)
    .execute(&mut *tx)
    .await?;
    Ok(())
}

/// Largest page of missed events a single catch-up request may request.
const MAX_MISSED_LIMIT: i64 = 100;

/// Events for `quiz_id` strictly after `after_seq`, oldest first, capped at
/// `limit` (clamped to `[1, 100]` regardless of what the caller passes, per
/// the catch-up contract every client -- WS handshake or HTTP -- relies on).
pub async fn missed(
    pool: &PgPool,
    quiz_id: Uuid,
    after_seq: i64,
    limit: i64,
) -> Result<Vec<EventLogRow>, sqlx::Error> {
    let limit = limit.clamp(1, MAX_MISSED_LIMIT);
    let rows = sqlx::query(
        "SELECT seq, event_type, payload, created_at FROM quiz_events
         WHERE quiz_id = $1 AND seq > $2 ORDER BY seq ASC LIMIT $3",
    )
    .bind(quiz_id)
    .bind(after_seq)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| EventLogRow {
            seq: r.get("seq"),
            event_type: r.get("event_type"),
            payload: r.get("payload"),
            created_at: r.get("created_at"),
        })
        .collect())
}

pub async fn latest_sequence(pool: &PgPool, quiz_id: Uuid) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT seq FROM quiz_sequences WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.get("seq")).unwrap_or(0))
}
