use std::sync::Arc;

use sentiscope_ai::SentimentBackend;
use sentiscope_store::Store;

use crate::{AuthConfig, ServerSettings};

/// Shared application state: cheap to clone, one per router.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub model: Arc<dyn SentimentBackend>,
    pub auth: Arc<AuthConfig>,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        model: Arc<dyn SentimentBackend>,
        auth: AuthConfig,
        settings: ServerSettings,
    ) -> Self {
        Self {
            store,
            model,
            auth: Arc::new(auth),
            settings: Arc::new(settings),
        }
    }
}
