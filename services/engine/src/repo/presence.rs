use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PresenceRow {
    pub participant_id: Uuid,
    pub instance_id: String,
    pub connected: bool,
    pub last_seen_at: DateTime<Utc>,
}

pub async fn register_instance(pool: &PgPool, instance_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO instances (instance_id) VALUES ($1)
         ON CONFLICT (instance_id) DO UPDATE SET last_heartbeat_at = now()",
    )
    .bind(instance_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn heartbeat(pool: &PgPool, instance_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE instances SET last_heartbeat_at = now() WHERE instance_id = $1")
        .bind(instance_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_presence(
    pool: &PgPool,
    quiz_id: Uuid,
    participant_id: Uuid,
    instance_id: &str,
    connected: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO presence (quiz_id, participant_id, instance_id, connected, last_seen_at)
         VALUES ($1, $2, $3, $4, now())
         ON CONFLICT (quiz_id, participant_id)
         DO UPDATE SET instance_id = EXCLUDED.instance_id, connected = EXCLUDED.connected, last_seen_at = now()",
    )
    .bind(quiz_id)
    .bind(participant_id)
    .bind(instance_id)
    .bind(connected)
    .execute(pool)
    .await?;
    Ok(())
}

/// Window within which an instance's heartbeat must have landed for its
/// participants to count as actually connected. Decoupled from the
/// background sweep's (longer, configurable) interval: a reader calling
/// this between sweeps should not see a participant as present just
/// because the sweep hasn't yet caught up to their owning instance's
/// crash.
const LIVENESS_WINDOW_SECS: i64 = 30;

pub async fn active_participants(
    pool: &PgPool,
    quiz_id: Uuid,
) -> Result<Vec<PresenceRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT p.participant_id, p.instance_id, p.connected, p.last_seen_at FROM presence p
         JOIN instances i ON i.instance_id = p.instance_id
         WHERE p.quiz_id = $1 AND p.connected = true
           AND p.last_seen_at > now() - make_interval(secs => $2)
           AND i.last_heartbeat_at > now() - make_interval(secs => $2)",
    )
    .bind(quiz_id)
    .bind(LIVENESS_WINDOW_SECS as f64)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| PresenceRow {
            participant_id: r.get("participant_id"),
            instance_id: r.get("instance_id"),
            connected: r.get("connected"),
            last_seen_at: r.get("last_seen_at"),
        })
        .collect())
}

/// Rows still marked `connected` whose owning instance's last heartbeat is
/// older than `stale_before`. The periodic sweep uses this to find
/// participants orphaned by a crashed instance.
pub async fn stale_connected(
    pool: &PgPool,
    stale_before: DateTime<Utc>,
) -> Result<Vec<(Uuid, Uuid)>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT p.quiz_id, p.participant_id FROM presence p
         JOIN instances i ON i.instance_id = p.instance_id
         WHERE p.connected = true AND i.last_heartbeat_at < $1",
    )
    .bind(stale_before)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get("quiz_id"), r.get("participant_id")))
        .collect())
}

pub async fn mark_disconnected(
    pool: &PgPool,
    quiz_id: Uuid,
    participant_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE presence SET connected = false WHERE quiz_id = $1 AND participant_id = $2",
    )
    .bind(quiz_id)
    .bind(participant_id)
    .execute(pool)
    .await?;
    Ok(())
}
