//! Ordered write-behind persistence.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::db::KeyValueStore;

enum WriteOp {
    Put { key: String, value: String },
    Flush(oneshot::Sender<()>),
}

/// Single background writer per store. Writes land in enqueue order;
/// failures are logged and dropped.
pub(crate) struct WriteBehind {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehind {
    /// Spawn the writer task on the current tokio runtime.
    pub(crate) fn spawn(storage: Arc<dyn KeyValueStore>, store: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Put { key, value } => {
                        if let Err(e) = storage.set(&key, &value).await {
                            tracing::warn!(store, key = %key, "Failed to persist state: {}", e);
                        }
                    }
                    WriteOp::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!(store, "Writer stopped");
        });

        Self { tx }
    }

    /// Queue a write. Never blocks.
    pub(crate) fn enqueue(&self, key: String, value: String) {
        if self.tx.send(WriteOp::Put { key, value }).is_err() {
            tracing::warn!("Writer task is gone, dropping write");
        }
    }

    /// Resolve once every write queued before this call has been attempted.
    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(WriteOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
