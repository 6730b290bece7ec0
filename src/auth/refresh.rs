//! Background session refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::provider::AuthProvider;

/// How often the refresher reads the session. Must stay below the provider's
/// refresh margin so a token is renewed before it lapses.
pub const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Reads the provider session on a fixed interval so that an expiring token
/// is refreshed even when no request asks for it.
///
/// Dropping the handle stops the task as well.
pub struct SessionRefresher {
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SessionRefresher {
    pub fn spawn(provider: Arc<dyn AuthProvider>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = provider.current_session().await {
                            tracing::warn!("Session check failed: {}", e);
                        }
                    }
                }
            }
            tracing::debug!("Session refresher stopped");
        });

        Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stop the timer and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Session refresher ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SessionRefresher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
