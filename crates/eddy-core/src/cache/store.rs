// ── Key-addressed reactive query cache ──
//
// The cache owns every entry and is the sole arbiter of consistency for
// cached values. Declarative primitives (`create_query`,
// `create_mutation`) manage fetch lifecycles and expose watch-backed
// handles; imperative writes (`set_query_data`, `fail_query`) let the
// subscription engine feed streaming results into the same entries.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cell::{CacheCell, ErrorHook, QueryState, SuccessHook};
use crate::error::CoreError;
use crate::fetch::{FetchFn, MutateFn};
use crate::key::OperationKey;
use crate::stream::StateStream;

const INVALIDATION_CHANNEL_CAPACITY: usize = 64;

/// Options for the declarative query primitive.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Spawn the fetch at all. Live-query bindings force this off.
    pub enabled: bool,

    /// Refetch when the key is invalidated, for as long as the handle
    /// is alive. Live-query bindings force this off.
    pub refetch_on_invalidate: bool,

    /// Extra attempts after a failed fetch. Applies to the
    /// request/response path only; streaming never retries.
    pub retry: u32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            refetch_on_invalidate: true,
            retry: 0,
        }
    }
}

/// Options for the declarative mutation primitive.
#[derive(Default)]
pub struct MutationOptions {
    pub on_success: Option<SuccessHook>,
    pub on_error: Option<ErrorHook>,
}

/// Key-addressed store of observable async values.
pub struct QueryCache {
    cells: DashMap<OperationKey, Arc<CacheCell>>,
    invalidation_tx: broadcast::Sender<OperationKey>,
}

impl QueryCache {
    pub fn new() -> Self {
        let (invalidation_tx, _) = broadcast::channel(INVALIDATION_CHANNEL_CAPACITY);
        Self {
            cells: DashMap::new(),
            invalidation_tx,
        }
    }

    fn cell(&self, key: &OperationKey) -> Arc<CacheCell> {
        self.cells
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CacheCell::new()))
            .clone()
    }

    // ── Imperative surface ───────────────────────────────────────────

    /// Snapshot the current state for a key. Unknown keys read as idle.
    pub fn state(&self, key: &OperationKey) -> QueryState {
        self.cells
            .get(key)
            .map_or(QueryState::Idle, |cell| cell.state())
    }

    /// Subscribe to state changes for a key, creating the entry if needed.
    pub fn watch(&self, key: &OperationKey) -> watch::Receiver<QueryState> {
        self.cell(key).subscribe()
    }

    /// Blind-write a payload into the entry for `key`.
    ///
    /// This is the streaming-path write: no fetch bookkeeping, no
    /// refetch, just the latest value broadcast to watchers.
    pub fn set_query_data(&self, key: &OperationKey, data: Value) {
        self.cell(key).set_ready(data);
    }

    /// Blind-write a failure into the entry for `key`, so declarative
    /// readers observe the same failure contract as a failed fetch.
    pub fn fail_query(&self, key: &OperationKey, error: Arc<CoreError>) {
        self.cell(key).set_failed(error);
    }

    /// Clear the entry for `key` back to idle.
    pub fn remove_queries(&self, key: &OperationKey) {
        if let Some(cell) = self.cells.get(key) {
            cell.reset();
            if cell.watcher_count() == 0 {
                drop(cell);
                self.cells.remove(key);
            }
        }
        debug!(key = %key, "cache entry cleared");
    }

    /// Mark `key` stale: every live handle for it refetches.
    pub fn invalidate(&self, key: &OperationKey) {
        // A send error just means no active handles right now
        let _ = self.invalidation_tx.send(key.clone());
    }

    pub(crate) fn subscribe_invalidation(&self) -> broadcast::Receiver<OperationKey> {
        self.invalidation_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    // ── Declarative primitives ───────────────────────────────────────

    /// Track `fetch` under `key`: fetch now (if enabled), refetch on
    /// invalidation, and expose the entry state through the returned
    /// handle. Dropping the handle cancels any in-flight work.
    pub fn create_query(
        self: &Arc<Self>,
        key: OperationKey,
        fetch: FetchFn,
        options: &QueryOptions,
    ) -> QueryHandle {
        let cell = self.cell(&key);
        let rx = cell.subscribe();
        let cancel = CancellationToken::new();

        if options.enabled {
            let cache = Arc::clone(self);
            let task_key = key.clone();
            let task_cancel = cancel.clone();
            let refetch = options.refetch_on_invalidate;
            let retry = options.retry;
            tokio::spawn(async move {
                run_query(cache, task_key, cell, fetch, retry, refetch, task_cancel).await;
            });
        }

        QueryHandle { key, rx, cancel }
    }

    /// Build a mutation handle for `key`. The input is supplied at call
    /// time; state is tracked per handle, and no other cache entry is
    /// touched implicitly.
    pub fn create_mutation(
        &self,
        key: OperationKey,
        mutate: MutateFn,
        options: MutationOptions,
    ) -> MutationHandle {
        let (state, _) = watch::channel(QueryState::Idle);
        MutationHandle {
            inner: Arc::new(MutationInner {
                key,
                state,
                mutate,
                success_hook: options.on_success,
                error_hook: options.on_error,
            }),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

// ── Fetch task ───────────────────────────────────────────────────────

/// Fetch once, then refetch on every invalidation of our key until the
/// handle is dropped.
async fn run_query(
    cache: Arc<QueryCache>,
    key: OperationKey,
    cell: Arc<CacheCell>,
    fetch: FetchFn,
    retry: u32,
    refetch_on_invalidate: bool,
    cancel: CancellationToken,
) {
    let mut invalidations = cache.subscribe_invalidation();

    execute_fetch(&cell, &fetch, retry, &cancel).await;

    if !refetch_on_invalidate {
        return;
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            received = invalidations.recv() => match received {
                Ok(invalidated) if invalidated == key => {
                    debug!(key = %key, "invalidated, refetching");
                    execute_fetch(&cell, &fetch, retry, &cancel).await;
                }
                Ok(_) => {}
                // Lagged receivers may have dropped our key -- refetch
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    execute_fetch(&cell, &fetch, retry, &cancel).await;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

/// One fetch attempt cycle: loading, then ready/failed, retrying up to
/// `retry` extra times on non-cancellation errors.
async fn execute_fetch(
    cell: &CacheCell,
    fetch: &FetchFn,
    retry: u32,
    cancel: &CancellationToken,
) {
    cell.set_loading();
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = fetch(cancel.child_token()) => result,
        };

        match result {
            Ok(data) => {
                cell.set_ready(data);
                return;
            }
            Err(CoreError::Cancelled) => return,
            Err(e) if attempt < retry => {
                debug!(error = %e, attempt, "fetch failed, retrying");
                attempt += 1;
            }
            Err(e) => {
                cell.set_failed(Arc::new(e));
                return;
            }
        }
    }
}

// ── QueryHandle ──────────────────────────────────────────────────────

/// Live handle onto one cache entry.
///
/// Mirrors the entry's `{data, error, loading}` state; dropping it
/// cancels any fetch work this handle started. The entry itself stays
/// in the cache.
pub struct QueryHandle {
    key: OperationKey,
    rx: watch::Receiver<QueryState>,
    cancel: CancellationToken,
}

impl QueryHandle {
    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Snapshot the current entry state.
    pub fn state(&self) -> QueryState {
        self.rx.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<Value>> {
        self.state().data()
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.state().error()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// Decode the current payload into a typed value.
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

    /// Wait for the next state change. Returns `None` if the cache
    /// dropped the entry's sender.
    pub async fn changed(&mut self) -> Option<QueryState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the entry settles into `Ready` or `Failed`.
    pub async fn settled(&mut self) -> QueryState {
        loop {
            let state = self.rx.borrow_and_update().clone();
            if state.is_ready() || state.is_failed() {
                return state;
            }
            if self.rx.changed().await.is_err() {
                return self.rx.borrow().clone();
            }
        }
    }

    /// Convert into a `Stream` of state snapshots.
    pub fn watch(&self) -> StateStream<QueryState> {
        StateStream::new(self.rx.clone())
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── MutationHandle ───────────────────────────────────────────────────

struct MutationInner {
    key: OperationKey,
    state: watch::Sender<QueryState>,
    mutate: MutateFn,
    success_hook: Option<SuccessHook>,
    error_hook: Option<ErrorHook>,
}

/// Handle for a declarative mutation.
///
/// State is per-handle (mutations don't share cache entries); input is
/// supplied per call. Cheaply cloneable.
#[derive(Clone)]
pub struct MutationHandle {
    inner: Arc<MutationInner>,
}

impl MutationHandle {
    pub fn key(&self) -> &OperationKey {
        &self.inner.key
    }

    pub fn state(&self) -> QueryState {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<Value>> {
        self.state().data()
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.state().error()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub fn watch(&self) -> StateStream<QueryState> {
        StateStream::new(self.inner.state.subscribe())
    }

    /// Execute the mutation and await its result.
    pub async fn mutate(&self, input: Option<Value>) -> Result<Arc<Value>, Arc<CoreError>> {
        Self::run(&self.inner, input).await
    }

    /// Execute the mutation without awaiting it; observe the outcome
    /// through the handle state or the hooks.
    pub fn mutate_detached(&self, input: Option<Value>) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _ = Self::run(&inner, input).await;
        });
    }

    async fn run(
        inner: &Arc<MutationInner>,
        input: Option<Value>,
    ) -> Result<Arc<Value>, Arc<CoreError>> {
        inner.state.send_replace(QueryState::Loading);

        match (inner.mutate)(input).await {
            Ok(data) => {
                let data = Arc::new(data);
                inner.state.send_replace(QueryState::Ready {
                    data: Arc::clone(&data),
                    fetched_at: std::time::Instant::now(),
                });
                if let Some(hook) = &inner.success_hook {
                    hook(&data);
                }
                Ok(data)
            }
            Err(e) => {
                let error = Arc::new(e);
                inner.state.send_replace(QueryState::Failed {
                    error: Arc::clone(&error),
                });
                if let Some(hook) = &inner.error_hook {
                    hook(&error);
                }
                Err(error)
            }
        }
    }
}
