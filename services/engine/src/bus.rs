//! Cross-instance fan-out so a quiz's events reach every engine instance
//! holding a WebSocket connection for it, not only the instance that
//! produced the event.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::StreamExt;
use quiz_protocol::{QuizId, WsEvent};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus transport error: {0}")]
    Transport(#[from] async_nats::client::PublishError),
    #[error("bus connect error: {0}")]
    Connect(#[from] async_nats::ConnectError),
    #[error("bus subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),
}

fn subject_for(quiz_id: QuizId) -> String {
    format!("quiz.{quiz_id}.events")
}

/// A handle to the cross-instance event bus. `subscribe` is idempotent per
/// process: calling it twice for the same quiz returns a fresh local
/// receiver without opening a second NATS subscription.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
    local_subs: Arc<Mutex<HashSet<QuizId>>>,
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .retry_on_initial_connect()
            .connect(url)
            .await?;
        Ok(Self {
            client,
            local_subs: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    pub async fn publish(&self, quiz_id: QuizId, event: &WsEvent) -> Result<(), BusError> {
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, "failed to serialize event for bus publish");
                return Ok(());
            }
        };
        self.client
            .publish(subject_for(quiz_id), payload.into())
            .await?;
        Ok(())
    }

    /// Ensures a background task is forwarding `quiz_id`'s subject into
    /// `tx`. Returns immediately if a forwarder is already running for this
    /// quiz on this process.
    pub async fn ensure_subscribed(
        &self,
        quiz_id: QuizId,
        tx: mpsc::Sender<WsEvent>,
    ) -> Result<(), BusError> {
        let mut subs = self.local_subs.lock().await;
        if subs.contains(&quiz_id) {
            return Ok(());
        }
        let mut sub = self.client.subscribe(subject_for(quiz_id)).await?;
        subs.insert(quiz_id);
        drop(subs);

        tokio::spawn(async move {
            while let Some(msg) = sub.next().await {
                match serde_json::from_slice::<WsEvent>(&msg.payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            debug!(%quiz_id, "bus forwarder channel closed, stopping");
                            break;
                        }
                    }
                    Err(e) => warn!(%quiz_id, error = %e, "dropping malformed bus event"),
                }
            }
        });
        Ok(())
    }
}
