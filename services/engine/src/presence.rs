//! Presence tracking: which participants are currently connected, to which
//! instance, and a background sweep that reclaims presence rows orphaned by
//! an instance that crashed without a clean disconnect.

use std::time::Duration;

use chrono::Utc;
use quiz_protocol::{EventPayload, ParticipantId, QuizId, UserLeftPayload, WsEvent};
use sqlx::PgPool;
use tracing::{error, info};

use crate::bus::NatsBus;
use crate::repo;

pub struct PresenceRegistry {
    pool: PgPool,
    instance_id: String,
}

impl PresenceRegistry {
    pub fn new(pool: PgPool, instance_id: String) -> Self {
        Self { pool, instance_id }
    }

    pub async fn register_instance(&self) -> Result<(), sqlx::Error> {
        repo::presence::register_instance(&self.pool, &self.instance_id).await
    }

    pub async fn heartbeat(&self) -> Result<(), sqlx::Error> {
        repo::presence::heartbeat(&self.pool, &self.instance_id).await
    }

    pub async fn set_connected(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
    ) -> Result<(), sqlx::Error> {
        repo::presence::set_presence(&self.pool, quiz_id, participant_id, &self.instance_id, true)
            .await
    }

    pub async fn set_disconnected(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
    ) -> Result<(), sqlx::Error> {
        repo::presence::set_presence(&self.pool, quiz_id, participant_id, &self.instance_id, false)
            .await
    }

    pub async fn active_count(&self, quiz_id: QuizId) -> Result<usize, sqlx::Error> {
        Ok(repo::presence::active_participants(&self.pool, quiz_id)
            .await?
            .len())
    }
}

/// Marks presence rows owned by instances that have not heartbeat within
/// `liveness_window` as disconnected, and publishes `USER_LEFT` for each so
/// every instance's clients see the participant leave.
pub async fn run_stale_sweep(pool: PgPool, bus: NatsBus, liveness_window: Duration) {
    let mut interval = tokio::time::interval(liveness_window);
    interval.tick().await;
    loop {
        interval.tick().await;
        let stale_before = Utc::now() - chrono::Duration::from_std(liveness_window).unwrap();
        let stale = match repo::presence::stale_connected(&pool, stale_before).await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "presence sweep: failed to query stale rows");
                continue;
            }
        };
        for (quiz_id, participant_id) in stale {
            if let Err(e) = repo::presence::mark_disconnected(&pool, quiz_id, participant_id).await
            {
                error!(%quiz_id, %participant_id, error = %e, "presence sweep: failed to mark disconnected");
                continue;
            }
            info!(%quiz_id, %participant_id, "presence sweep: reclaimed stale connection");
            let event = WsEvent::new(
                EventPayload::UserLeft(UserLeftPayload { participant_id }),
                None,
            );
            if let Err(e) = bus.publish(quiz_id, &event).await {
                error!(%quiz_id, error = %e, "presence sweep: failed to publish USER_LEFT");
            }
        }
    }
}
