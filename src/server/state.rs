use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::notification::Dispatcher;
use crate::queue::ChannelQueues;
use crate::repository::{NotificationRepository, TemplateRepository};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dispatcher: Arc<Dispatcher>,
    pub records: Arc<dyn NotificationRepository>,
    pub templates: Arc<dyn TemplateRepository>,
    pub queues: ChannelQueues,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        queues: ChannelQueues,
        records: Arc<dyn NotificationRepository>,
        templates: Arc<dyn TemplateRepository>,
    ) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(queues.clone(), records.clone()));

        Self {
            settings: Arc::new(settings),
            dispatcher,
            records,
            templates,
            queues,
            started_at: Instant::now(),
        }
    }
}
