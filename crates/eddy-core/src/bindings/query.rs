use std::sync::Arc;

use serde_json::Value;

use crate::cache::{QueryCache, QueryHandle, QueryState};
use crate::error::CoreError;
use crate::key::OperationKey;
use crate::stream::StateStream;
use crate::subscription::{SubscriptionEngine, SubscriptionStatus};

/// A mounted query: the union of one cache entry's state and, for live
/// queries, the subscription engine's status.
///
/// Dropping the binding is the unmount: in-flight fetch work is
/// cancelled and the engine (if any) is stopped exactly once. The cache
/// entry itself outlives the binding.
pub struct QueryBinding {
    cache: Arc<QueryCache>,
    handle: QueryHandle,
    engine: Option<Arc<SubscriptionEngine>>,
}

impl QueryBinding {
    pub(crate) fn new(
        cache: Arc<QueryCache>,
        handle: QueryHandle,
        engine: Option<Arc<SubscriptionEngine>>,
    ) -> Self {
        Self {
            cache,
            handle,
            engine,
        }
    }

    pub fn key(&self) -> &OperationKey {
        self.handle.key()
    }

    /// Snapshot the entry state.
    pub fn state(&self) -> QueryState {
        self.handle.state()
    }

    pub fn data(&self) -> Option<Arc<Value>> {
        self.handle.data()
    }

    /// Decode the current payload into a typed value.
    pub fn data_as<D: serde::de::DeserializeOwned>(&self) -> Result<Option<D>, CoreError> {
        self.handle.data_as()
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.handle.error()
    }

    pub fn is_loading(&self) -> bool {
        self.handle.is_loading()
    }

    /// The engine status, when this is a live query.
    pub fn subscription_status(&self) -> Option<SubscriptionStatus> {
        self.engine.as_ref().map(|e| e.status())
    }

    /// Whether the live stream has produced its first result. Always
    /// `false` for plain queries.
    pub fn is_subscribed(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_subscribed())
    }

    /// Wait for the next entry state change.
    pub async fn changed(&mut self) -> Option<QueryState> {
        self.handle.changed().await
    }

    /// Wait until the entry settles into `Ready` or `Failed`.
    pub async fn settled(&mut self) -> QueryState {
        self.handle.settled().await
    }

    /// Observe entry state changes as a stream.
    pub fn watch(&self) -> StateStream<QueryState> {
        self.handle.watch()
    }

    /// Observe engine status changes, when this is a live query.
    pub fn watch_status(&self) -> Option<StateStream<SubscriptionStatus>> {
        self.engine.as_ref().map(|e| e.watch_status())
    }

    /// Mark the key stale so every live handle for it refetches.
    /// No-op for live queries (their entry is stream-fed).
    pub fn refetch(&self) {
        if self.engine.is_none() {
            self.cache.invalidate(self.handle.key());
        }
    }
}

impl Drop for QueryBinding {
    fn drop(&mut self) {
        if let Some(engine) = &self.engine {
            engine.stop();
        }
    }
}
