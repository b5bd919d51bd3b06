use std::sync::Arc;

use checkin_db::Database;
use checkin_line::Messenger;

use crate::config::AppConfig;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub messenger: Arc<dyn Messenger>,
    pub config: AppConfig,
}

impl AppStateInner {
    pub fn new(db: Database, messenger: Arc<dyn Messenger>, config: AppConfig) -> AppState {
        Arc::new(Self { db, messenger, config })
    }
}
