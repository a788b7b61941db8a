use crate::health::RefreshTracker;
use crate::live::LiveCache;
use crate::storage::Storage;
use parking_lot::Mutex;
use std::sync::Arc;

pub type Shared<T> = Arc<Mutex<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// État unique pour Axum : stockage durable + caches live + suivi du refresher
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub live: LiveCache,
    pub tracker: RefreshTracker,
    /// Clé attendue dans `x-api-key` (None = API ouverte)
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            live: LiveCache::new(),
            tracker: RefreshTracker::new(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.map(Arc::from);
        self
    }
}
