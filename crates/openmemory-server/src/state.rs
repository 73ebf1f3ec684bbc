//! Shared application state

use std::sync::Arc;

use openmemory_core::{
    AgentMemory, Config, EnforcementGate, HashEmbedder, HsgEngine, MemoryStore, Result,
};

/// Everything a handler needs, shared behind `Arc`
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HsgEngine>,
    pub agent: Arc<AgentMemory>,
    pub gate: Arc<EnforcementGate>,
}

impl AppState {
    /// Build the full stack from a config
    pub fn from_config(config: Config) -> Result<Self> {
        let store = Arc::new(MemoryStore::open(config.db_path.clone())?);
        let embedder = Box::new(HashEmbedder::new(config.vector_dim));
        let engine = Arc::new(HsgEngine::new(store, embedder, config));
        Ok(Self::from_engine(engine))
    }

    /// Build from an existing engine; tests hand in an in-memory store
    pub fn from_engine(engine: Arc<HsgEngine>) -> Self {
        let agent = Arc::new(AgentMemory::new(engine.clone()));
        let gate = Arc::new(EnforcementGate::new(engine.clone()));
        Self { engine, agent, gate }
    }
}
