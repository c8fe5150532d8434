use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::cache::QueryState;
use crate::error::CoreError;
use crate::key::OperationKey;
use crate::stream::StateStream;
use crate::subscription::{SubscriptionEngine, SubscriptionStatus};

/// A mounted subscription operation.
///
/// Results stream into the cache entry for the operation key; this
/// binding reads that entry and exposes the engine's tri-state status.
/// Dropping the binding stops the engine exactly once.
pub struct SubscriptionBinding {
    key: OperationKey,
    state_rx: watch::Receiver<QueryState>,
    engine: Arc<SubscriptionEngine>,
}

impl SubscriptionBinding {
    pub(crate) fn new(
        key: OperationKey,
        state_rx: watch::Receiver<QueryState>,
        engine: Arc<SubscriptionEngine>,
    ) -> Self {
        Self {
            key,
            state_rx,
            engine,
        }
    }

    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Snapshot the cache entry state for this key.
    pub fn state(&self) -> QueryState {
        self.state_rx.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<Value>> {
        self.state().data()
    }

    pub fn data_as<D: serde::de::DeserializeOwned>(&self) -> Result<Option<D>, CoreError> {
        match self.data() {
            None => Ok(None),
            Some(value) => serde::Deserialize::deserialize(&*value)
                .map(Some)
                .map_err(|e: serde_json::Error| CoreError::Deserialization {
                    message: e.to_string(),
                }),
        }
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.state().error()
    }

    /// Engine status for this subscription.
    pub fn status(&self) -> SubscriptionStatus {
        self.engine.status()
    }

    pub fn is_subscribed(&self) -> bool {
        self.engine.is_subscribed()
    }

    pub fn is_loading(&self) -> bool {
        self.engine.status().is_loading()
    }

    /// Wait for the next delivered result (cache entry change).
    pub async fn changed(&mut self) -> Option<QueryState> {
        self.state_rx.changed().await.ok()?;
        Some(self.state_rx.borrow_and_update().clone())
    }

    /// Observe delivered results as a stream.
    pub fn watch(&self) -> StateStream<QueryState> {
        StateStream::new(self.state_rx.clone())
    }

    /// Observe engine status transitions.
    pub fn watch_status(&self) -> StateStream<SubscriptionStatus> {
        self.engine.watch_status()
    }

    /// Stop the subscription early. Idempotent; dropping the binding
    /// does the same.
    pub fn stop(&self) {
        self.engine.stop();
    }
}

impl Drop for SubscriptionBinding {
    fn drop(&mut self) {
        self.engine.stop();
    }
}
