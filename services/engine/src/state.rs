use std::sync::Arc;

use sqlx::PgPool;

use crate::bus::NatsBus;
use crate::engine::QuizEngine;
use crate::hub::ConnectionHub;
use crate::presence::PresenceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub hub: ConnectionHub,
    pub bus: NatsBus,
    pub engine: Arc<QuizEngine>,
    pub presence: Arc<PresenceRegistry>,
    pub instance_id: String,
}

impl AppState {
    pub fn new(pool: PgPool, bus: NatsBus, instance_id: String) -> Self {
        let hub = ConnectionHub::new();
        let engine = Arc::new(QuizEngine::new(pool.clone(), hub.clone(), bus.clone()));
        let presence = Arc::new(PresenceRegistry::new(pool.clone(), instance_id.clone()));
        Self {
            pool,
            hub,
            bus,
            engine,
            presence,
            instance_id,
        }
    }
}
