//! API module for Planogram Vision
//!
//! Provides REST endpoints for the dashboard front-end.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

pub mod handlers;
pub mod models;
pub mod server;

/// API Server for handling REST requests
#[derive(Debug)]
pub struct ApiServer {
    config: Arc<Config>,
    port: u16,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: Arc<Config>, port: u16) -> Self {
        Self { config, port }
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on port {}", self.port);
        server::start_http_server(self.config, self.port).await
    }
}
