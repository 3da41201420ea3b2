//! Anonymous session credential lifecycle: a process-wide credential pair
//! replaced as a whole by one unattended refresh task.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::state::AppState;
use crate::util::{random_uuid, unix_now_secs};

/// The backend session credential pair. Token and device id are issued
/// together and only ever replaced together.
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub device_id: String,
    pub token: String,
    pub issued_at: u64,
}

/// Shared holder for the current credential.
///
/// Readers get a consistent snapshot via the `Arc`: the whole credential is
/// swapped under the lock, so a token is never observed paired with a
/// device id from a different issuance.
pub struct SessionStore {
    current: RwLock<Option<Arc<SessionCredential>>>,
    ready: Notify,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
            ready: Notify::new(),
        }
    }

    /// Latest credential snapshot, without blocking. `None` until the first
    /// refresh succeeds.
    #[must_use]
    pub fn current(&self) -> Option<Arc<SessionCredential>> {
        self.current.read().clone()
    }

    /// Atomically replace the credential and wake tasks waiting for
    /// readiness.
    pub fn install(&self, credential: SessionCredential) {
        *self.current.write() = Some(Arc::new(credential));
        self.ready.notify_waiters();
    }

    /// Suspend until a credential exists, then return it.
    pub async fn ready(&self) -> Arc<SessionCredential> {
        loop {
            let notified = self.ready.notified();
            if let Some(credential) = self.current() {
                return credential;
            }
            notified.await;
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Unattended refresh loop, started once at startup and never terminating.
///
/// Each round rotates the device id, asks the backend for a matching token,
/// and installs the pair; failures keep the previous credential and back
/// off. Errors go nowhere but the log.
pub async fn run_refresh_loop(state: Arc<AppState>) {
    let refresh_interval = Duration::from_secs(state.config.session.refresh_interval_secs);
    let error_backoff = Duration::from_secs(state.config.session.error_backoff_secs);

    loop {
        let device_id = random_uuid();
        match state.transport.issue_credential(&device_id).await {
            Ok(token) => {
                let first = state.sessions.current().is_none();
                state.sessions.install(SessionCredential {
                    device_id,
                    token,
                    issued_at: unix_now_secs(),
                });
                if first {
                    tracing::info!("session credential acquired; ready to process requests");
                } else {
                    tracing::info!("session credential refreshed");
                }
                tokio::time::sleep(refresh_interval).await;
            }
            Err(err) => {
                tracing::warn!(
                    "session refresh failed, retrying in {}s: {err}",
                    error_backoff.as_secs()
                );
                tokio::time::sleep(error_backoff).await;
            }
        }
    }
}
