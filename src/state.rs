use std::sync::Arc;

use crate::config::RenderConfig;
use crate::store::{AllowAll, FileStore, MemoryStore, QrStore, SubscriptionGate};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QrStore>,
    pub files: Arc<FileStore>,
    pub gate: Arc<dyn SubscriptionGate>,
    pub config: Arc<RenderConfig>,
}

impl AppState {
    /// In-memory store and allow-all gate; production wiring swaps these.
    pub fn new(config: RenderConfig) -> Self {
        let files = FileStore::new(&config.upload_root, config.max_logo_bytes);
        Self {
            store: Arc::new(MemoryStore::new()),
            files: Arc::new(files),
            gate: Arc::new(AllowAll),
            config: Arc::new(config),
        }
    }
}
