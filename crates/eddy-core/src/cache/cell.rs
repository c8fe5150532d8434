// ── Observable async cells ──
//
// One cell per operation key. State transitions are broadcast through a
// `watch` channel; readers either snapshot the latest state or await
// changes. Writers blind-write -- there is no read-modify-write.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::watch;

use crate::error::CoreError;

/// Hook invoked with the payload of a successful operation.
pub type SuccessHook = Box<dyn Fn(&Value) + Send + Sync>;

/// Hook invoked with the error of a failed operation.
pub type ErrorHook = Box<dyn Fn(&CoreError) + Send + Sync>;

/// The observable state of one cache entry (or mutation).
#[derive(Debug, Clone, Default)]
pub enum QueryState {
    /// Nothing has happened for this key yet.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// Latest payload, with the instant it was stored.
    Ready { data: Arc<Value>, fetched_at: Instant },
    /// Latest failure.
    Failed { error: Arc<CoreError> },
}

impl QueryState {
    pub fn data(&self) -> Option<Arc<Value>> {
        match self {
            Self::Ready { data, .. } => Some(Arc::clone(data)),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        match self {
            Self::Failed { error } => Some(Arc::clone(error)),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// How long ago the payload was stored, if there is one.
    pub fn age(&self) -> Option<Duration> {
        match self {
            Self::Ready { fetched_at, .. } => Some(fetched_at.elapsed()),
            _ => None,
        }
    }
}

/// Watch-backed holder for one entry's state.
pub(crate) struct CacheCell {
    state: watch::Sender<QueryState>,
}

impl CacheCell {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(QueryState::Idle);
        Self { state }
    }

    pub(crate) fn set_loading(&self) {
        self.state.send_replace(QueryState::Loading);
    }

    pub(crate) fn set_ready(&self, data: Value) {
        self.state.send_replace(QueryState::Ready {
            data: Arc::new(data),
            fetched_at: Instant::now(),
        });
    }

    pub(crate) fn set_failed(&self, error: Arc<CoreError>) {
        self.state.send_replace(QueryState::Failed { error });
    }

    pub(crate) fn reset(&self) {
        self.state.send_replace(QueryState::Idle);
    }

    pub(crate) fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    pub(crate) fn watcher_count(&self) -> usize {
        self.state.receiver_count()
    }
}
