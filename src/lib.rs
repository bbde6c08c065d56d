pub mod config;
pub mod cutover;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routing;
pub mod security;
pub mod topology;

use std::sync::Arc;

use config::ResponderConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ResponderConfig>,
}

impl AppState {
    pub fn new(config: ResponderConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}
