//! Top-K leaderboard projection. Recomputed from `participants` on demand
//! rather than maintained incrementally -- the table is small (one row per
//! participant) and reads are infrequent relative to answer submissions.

use quiz_protocol::{EventPayload, LeaderboardEntry, LeaderboardUpdatePayload, WsEvent};
use uuid::Uuid;

use crate::engine::QuizEngine;
use crate::error::EngineError;
use crate::repo;

const DEFAULT_TOP_K: i64 = 10;

impl QuizEngine {
    pub async fn get_leaderboard(
        &self,
        quiz_id: Uuid,
        top_k: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, EngineError> {
        let rows =
            repo::participant::leaderboard(&self.pool, quiz_id, top_k.unwrap_or(DEFAULT_TOP_K))
                .await?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                #[allow(clippy::cast_possible_truncation)]
                rank: (i + 1) as i32,
                participant_id: p.participant_id,
                name: p.nickname,
                score: p.score,
            })
            .collect())
    }

    /// Recomputes and broadcasts the leaderboard. Called after every scored
    /// answer; cheap enough at expected quiz sizes (tens to low hundreds of
    /// participants) to run synchronously rather than debounce. Published
    /// to the bus so every instance's attached clients see it, matching
    /// every other broadcast type.
    pub async fn refresh_leaderboard(&self, quiz_id: Uuid) -> Result<(), EngineError> {
        let entries = self.get_leaderboard(quiz_id, None).await?;
        let event = WsEvent::new(
            EventPayload::LeaderboardUpdate(LeaderboardUpdatePayload { entries }),
            None,
        );
        if let Err(e) = self.bus.publish(quiz_id, &event).await {
            tracing::warn!(%quiz_id, error = %e, "failed to publish LEADERBOARD_UPDATE");
        }
        Ok(())
    }
}
