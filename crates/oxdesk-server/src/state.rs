use crate::cache::OpenTicketCache;
use crate::config::ServerConfig;
use chrono::{DateTime, Utc};
use oxdesk_notify::manager::NotificationManager;
use oxdesk_storage::TicketStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TicketStore>,
    pub notifier: Arc<NotificationManager>,
    pub open_tickets: Arc<OpenTicketCache>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}
