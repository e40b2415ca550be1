//! Background config writer.
//!
//! [`ConfigWriter`] wraps any [`ConfigStore`] and moves saves off the caller's
//! task. Saves queued while a write is in progress collapse into the most
//! recent one, so a burst of mutations produces a single write of the latest
//! document.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use geohub_app::ports::{ConfigStore, GeofenceConfig};
use geohub_domain::error::GeohubError;

use crate::error::JsonStoreError;

enum Request {
    Save(GeofenceConfig),
    Flush(oneshot::Sender<()>),
}

/// A [`ConfigStore`] whose `save` only enqueues the document.
///
/// Write failures are logged by the background task; they never reach the
/// caller of `save`.
pub struct ConfigWriter<S> {
    inner: Arc<S>,
    tx: mpsc::UnboundedSender<Request>,
    task: JoinHandle<()>,
}

impl<S: ConfigStore + 'static> ConfigWriter<S> {
    /// Spawn the background task writing into `inner`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(inner: S) -> Self {
        let inner = Arc::new(inner);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(Arc::clone(&inner), rx));
        Self { inner, tx, task }
    }

    /// Wait until every save queued before this call has been written.
    ///
    /// # Errors
    ///
    /// Returns [`JsonStoreError::WriterClosed`] when the background task is gone.
    pub async fn flush(&self) -> Result<(), JsonStoreError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Request::Flush(ack))
            .map_err(|_| JsonStoreError::WriterClosed)?;
        done.await.map_err(|_| JsonStoreError::WriterClosed)
    }

    /// Flush pending saves, then stop the background task.
    pub async fn shutdown(&self) {
        if let Err(err) = self.flush().await {
            tracing::warn!(error = %err, "config writer could not flush before shutdown");
        }
        self.task.abort();
    }
}

impl<S> Drop for ConfigWriter<S> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<S: ConfigStore>(inner: Arc<S>, mut rx: mpsc::UnboundedReceiver<Request>) {
    while let Some(first) = rx.recv().await {
        let mut latest = None;
        let mut acks = Vec::new();
        let mut next = Some(first);
        while let Some(request) = next.take() {
            match request {
                Request::Save(config) => latest = Some(config),
                Request::Flush(ack) => acks.push(ack),
            }
            next = rx.try_recv().ok();
        }

        if let Some(config) = latest {
            if let Err(err) = inner.save(config).await {
                tracing::error!(error = %err, "failed to persist geofence configuration");
            }
        }
        for ack in acks {
            let _ = ack.send(());
        }
    }
}

impl<S: ConfigStore> ConfigStore for ConfigWriter<S> {
    fn load(&self) -> impl Future<Output = Result<Option<GeofenceConfig>, GeohubError>> + Send {
        self.inner.load()
    }

    fn save(&self, config: GeofenceConfig) -> impl Future<Output = Result<(), GeohubError>> + Send {
        let sent = self
            .tx
            .send(Request::Save(config))
            .map_err(|_| GeohubError::from(JsonStoreError::WriterClosed));
        async move { sent }
    }
}
