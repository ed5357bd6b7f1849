use std::sync::Arc;

use crate::config::Settings;
use crate::hub::RealtimeHub;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub hub: Arc<RealtimeHub>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let hub = Arc::new(RealtimeHub::new(&settings.presence));
        Self::with_hub(settings, hub)
    }

    /// Build state around an existing hub (shared with background tasks)
    pub fn with_hub(settings: Settings, hub: Arc<RealtimeHub>) -> Self {
        Self {
            settings: Arc::new(settings),
            hub,
        }
    }
}
