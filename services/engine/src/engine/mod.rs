pub mod compose;
pub mod grader;
pub mod leaderboard;
pub mod phase;

use std::collections::HashSet;
use std::sync::Arc;

use quiz_protocol::QuizId;
use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};

use crate::bus::{BusError, NatsBus};
use crate::hub::ConnectionHub;

/// Bounded buffer for events a quiz's bus forwarder hands to the local
/// fan-out task before they reach client sockets.
const FORWARDER_QUEUE_CAPACITY: usize = 256;

/// Owns the storage pool, connection hub, and cross-instance bus that every
/// command needs. One instance is shared (via `Arc` inside `AppState`)
/// across all HTTP handlers and WS sessions on this process.
pub struct QuizEngine {
    pub pool: PgPool,
    pub hub: ConnectionHub,
    pub bus: NatsBus,
    /// Quizzes this process has already wired a fan-out task for. Guards
    /// `ensure_quiz_forwarder` so a busy quiz with many connects doesn't
    /// spin up a redundant channel and task per socket.
    wired_quizzes: Arc<Mutex<HashSet<QuizId>>>,
}

impl QuizEngine {
    pub fn new(pool: PgPool, hub: ConnectionHub, bus: NatsBus) -> Self {
        Self {
            pool,
            hub,
            bus,
            wired_quizzes: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Ensures this process is subscribed to `quiz_id`'s bus subject and is
    /// fanning incoming events out to its locally attached clients. Safe to
    /// call on every connect; idempotent per process per quiz.
    pub async fn ensure_quiz_forwarder(&self, quiz_id: QuizId) -> Result<(), BusError> {
        let mut wired = self.wired_quizzes.lock().await;
        if wired.contains(&quiz_id) {
            return Ok(());
        }
        let (tx, mut rx) = mpsc::channel(FORWARDER_QUEUE_CAPACITY);
        self.bus.ensure_subscribed(quiz_id, tx).await?;
        wired.insert(quiz_id);
        drop(wired);

        let hub = self.hub.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                crate::ws::fan_out(&hub, quiz_id, &event).await;
            }
        });
        Ok(())
    }
}
