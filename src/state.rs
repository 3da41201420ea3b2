use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::session::SessionStore;
use crate::transport::BackendTransport;

/// Shared application state accessible to all handlers and the refresh loop.
pub struct AppState {
    pub config: AppConfig,
    pub transport: BackendTransport,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, ProxyError> {
        let transport = BackendTransport::new(&config.backend)?;
        Ok(Self {
            config,
            transport,
            sessions: SessionStore::new(),
        })
    }
}
