//! Per-instance registry of attached WebSocket clients for every quiz this
//! instance is serving. Mutated only through the hub's own methods
//! (single-writer discipline over each quiz's client map).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use quiz_protocol::{ParticipantId, QuizId, UserId};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

/// Outbound queue capacity per client. A client whose queue is full is
/// assumed stuck or gone; the hub drops it rather than letting one slow
/// reader back up fan-out for everyone else in the quiz.
const CLIENT_QUEUE_CAPACITY: usize = 256;

pub type ClientId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    Creator(UserId),
    Participant(ParticipantId),
}

struct ClientHandle {
    kind: ClientKind,
    tx: mpsc::Sender<Bytes>,
}

#[derive(Default)]
struct QuizRegistry {
    clients: HashMap<ClientId, ClientHandle>,
}

#[derive(Clone, Default)]
pub struct ConnectionHub {
    quizzes: Arc<RwLock<HashMap<QuizId, QuizRegistry>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client and returns the bounded receiver the caller's
    /// writer task should drain. A participant (or creator) may hold at
    /// most one active socket per instance: if one is already registered
    /// for this `kind` in this quiz, its sender is dropped first, which
    /// closes its outbound queue and lets its writer task exit -- the old
    /// connection is evicted, not left to linger alongside the new one.
    pub async fn register(
        &self,
        quiz_id: QuizId,
        kind: ClientKind,
    ) -> (ClientId, mpsc::Receiver<Bytes>) {
        let client_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        let mut quizzes = self.quizzes.write().await;
        let registry = quizzes.entry(quiz_id).or_default();
        if let Some(stale_id) = registry
            .clients
            .iter()
            .find(|(_, handle)| handle.kind == kind)
            .map(|(id, _)| *id)
        {
            debug!(%quiz_id, %stale_id, "evicting duplicate connection for the same principal");
            registry.clients.remove(&stale_id);
        }
        registry.clients.insert(client_id, ClientHandle { kind, tx });
        (client_id, rx)
    }

    pub async fn unregister(&self, quiz_id: QuizId, client_id: ClientId) {
        let mut quizzes = self.quizzes.write().await;
        if let Some(registry) = quizzes.get_mut(&quiz_id) {
            registry.clients.remove(&client_id);
            if registry.clients.is_empty() {
                quizzes.remove(&quiz_id);
            }
        }
    }

    pub async fn active_count(&self, quiz_id: QuizId) -> usize {
        self.quizzes
            .read()
            .await
            .get(&quiz_id)
            .map_or(0, |r| r.clients.len())
    }

    /// Sends `bytes` to every client attached to `quiz_id`. A client whose
    /// queue is full is evicted (its sender dropped so its writer task's
    /// `recv()` observes a closed channel and exits).
    pub async fn broadcast(&self, quiz_id: QuizId, bytes: Bytes) {
        self.broadcast_filtered(quiz_id, bytes, |_| true).await;
    }

    pub async fn broadcast_creators(&self, quiz_id: QuizId, bytes: Bytes) {
        self.broadcast_filtered(quiz_id, bytes, |k| matches!(k, ClientKind::Creator(_)))
            .await;
    }

    pub async fn broadcast_participants(&self, quiz_id: QuizId, bytes: Bytes) {
        self.broadcast_filtered(quiz_id, bytes, |k| matches!(k, ClientKind::Participant(_)))
            .await;
    }

    async fn broadcast_filtered(
        &self,
        quiz_id: QuizId,
        bytes: Bytes,
        predicate: impl Fn(&ClientKind) -> bool,
    ) {
        let mut to_evict = Vec::new();
        {
            let quizzes = self.quizzes.read().await;
            let Some(registry) = quizzes.get(&quiz_id) else {
                return;
            };
            for (client_id, handle) in &registry.clients {
                if !predicate(&handle.kind) {
                    continue;
                }
                if handle.tx.try_send(bytes.clone()).is_err() {
                    to_evict.push(*client_id);
                }
            }
        }
        if !to_evict.is_empty() {
            let mut quizzes = self.quizzes.write().await;
            if let Some(registry) = quizzes.get_mut(&quiz_id) {
                for client_id in to_evict {
                    warn!(%quiz_id, %client_id, "evicting client: outbound queue full");
                    registry.clients.remove(&client_id);
                }
            }
        }
    }

    pub async fn send_to_participant(
        &self,
        quiz_id: QuizId,
        participant_id: ParticipantId,
        bytes: Bytes,
    ) -> bool {
        let quizzes = self.quizzes.read().await;
        let Some(registry) = quizzes.get(&quiz_id) else {
            return false;
        };
        for handle in registry.clients.values() {
            if handle.kind == ClientKind::Participant(participant_id) {
                let sent = handle.tx.try_send(bytes.clone()).is_ok();
                if sent {
                    return true;
                }
                debug!(%quiz_id, %participant_id, "participant queue full, message dropped");
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_and_unregister_tracks_active_count() {
        let hub = ConnectionHub::new();
        let quiz_id = Uuid::new_v4();
        let (client_id, _rx) = hub.register(quiz_id, ClientKind::Participant(Uuid::new_v4())).await;
        assert_eq!(hub.active_count(quiz_id).await, 1);
        hub.unregister(quiz_id, client_id).await;
        assert_eq!(hub.active_count(quiz_id).await, 0);
    }

    #[tokio::test]
    async fn broadcast_creators_skips_participants() {
        let hub = ConnectionHub::new();
        let quiz_id = Uuid::new_v4();
        let (_creator_id, mut creator_rx) =
            hub.register(quiz_id, ClientKind::Creator(Uuid::new_v4())).await;
        let (_participant_id, mut participant_rx) = hub
            .register(quiz_id, ClientKind::Participant(Uuid::new_v4()))
            .await;

        hub.broadcast_creators(quiz_id, Bytes::from_static(b"hello")).await;

        assert_eq!(creator_rx.recv().await, Some(Bytes::from_static(b"hello")));
        creator_rx.close();
        assert!(participant_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_outbound_queue_evicts_the_client() {
        let hub = ConnectionHub::new();
        let quiz_id = Uuid::new_v4();
        let (client_id, _rx) = hub.register(quiz_id, ClientKind::Participant(Uuid::new_v4())).await;

        for _ in 0..CLIENT_QUEUE_CAPACITY + 1 {
            hub.broadcast(quiz_id, Bytes::from_static(b"x")).await;
        }

        assert_eq!(hub.active_count(quiz_id).await, 0);
        hub.unregister(quiz_id, client_id).await;
    }
}
