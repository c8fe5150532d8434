// ── Subscription engine ──
//
// One engine per mounted consumer of an operation key. Owns the
// lifecycle of a long-lived streaming operation -- start,
// deliver-result, error, abort -- and mirrors its state into both a
// dedicated status cell and the cache entry for the same key.
//
// The state machine is explicit: status, first-delivery marker, and
// cancellation handle are fields mutated only by this instance's own
// methods, never by closures over shared mutables.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde_json::Value;
use strum::{AsRefStr, Display};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use eddy_api::{GatewayClient, SubscriptionRequest};

use crate::cache::{ErrorHook, QueryCache, SuccessHook};
use crate::error::CoreError;
use crate::key::OperationKey;
use crate::stream::StateStream;

/// Status of one logical subscription.
///
/// `idle → loading → subscribed`; back to `loading` only through an
/// error/abort-then-restart cycle, and to `idle` on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Idle,
    Loading,
    Subscribed,
}

impl SubscriptionStatus {
    pub fn is_subscribed(self) -> bool {
        matches!(self, Self::Subscribed)
    }

    pub fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// State machine for one streaming operation.
///
/// Every delivered envelope is blind-written into the cache entry for
/// the engine's key, so declarative readers of that key observe the
/// stream without knowing it exists. The status cell is this engine's
/// own; it is reset to idle when the owning consumer goes away.
pub struct SubscriptionEngine {
    key: OperationKey,
    cache: Arc<QueryCache>,
    status: watch::Sender<SubscriptionStatus>,

    /// Set when the first envelope of a (re)start is delivered; cleared
    /// on error/abort. Gates the one-shot `on_success` hook.
    started_at: Mutex<Option<Instant>>,

    /// Cancellation handle for the live network subscription, recorded
    /// by `start` and invoked at most once by `stop`.
    cancel: Mutex<Option<CancellationToken>>,

    subscribe_once: bool,
    success_hook: Option<SuccessHook>,
    error_hook: Option<ErrorHook>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SubscriptionEngine {
    pub fn new(
        key: OperationKey,
        cache: Arc<QueryCache>,
        subscribe_once: bool,
        success_hook: Option<SuccessHook>,
        error_hook: Option<ErrorHook>,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(SubscriptionStatus::Idle);
        Arc::new(Self {
            key,
            cache,
            status,
            started_at: Mutex::new(None),
            cancel: Mutex::new(None),
            subscribe_once,
            success_hook,
            error_hook,
        })
    }

    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    /// Snapshot the current status.
    pub fn status(&self) -> SubscriptionStatus {
        *self.status.borrow()
    }

    pub fn is_subscribed(&self) -> bool {
        self.status().is_subscribed()
    }

    /// Observe status changes.
    pub fn watch_status(&self) -> StateStream<SubscriptionStatus> {
        StateStream::new(self.status.subscribe())
    }

    /// When the current stream attempt first delivered, if it has.
    pub fn started_at(&self) -> Option<Instant> {
        *lock(&self.started_at)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the streaming call and record its cancellation handle.
    ///
    /// Returns `false` without side effects if this instance already
    /// started. Otherwise transitions to `loading` and spawns the
    /// stream task; envelopes flow through [`on_result`](Self::on_result)
    /// and an establishment rejection lands in
    /// [`on_error`](Self::on_error).
    pub fn start(
        self: &Arc<Self>,
        client: &Arc<GatewayClient>,
        input: Option<Value>,
        live_query: bool,
    ) -> bool {
        let mut slot = lock(&self.cancel);
        if slot.is_some() {
            debug!(key = %self.key, "subscription already started");
            return false;
        }
        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());
        drop(slot);

        self.status.send_replace(SubscriptionStatus::Loading);

        let req = SubscriptionRequest {
            operation_name: self.key.name().to_string(),
            input,
            live_query,
            subscribe_once: self.subscribe_once,
        };

        let engine = Arc::clone(self);
        let client = Arc::clone(client);
        tokio::spawn(async move {
            let sink = Arc::clone(&engine);
            let result = client
                .subscribe(&req, cancel.clone(), move |envelope| sink.on_result(envelope))
                .await;

            if let Err(e) = result {
                if !cancel.is_cancelled() {
                    engine.on_error(&CoreError::from(e));
                }
            }
        });

        true
    }

    /// Deliver one envelope from the stream.
    ///
    /// The first envelope after a (re)start flips the status to
    /// `subscribed` and fires the success hook exactly once. Every
    /// envelope, first or not, is written into the cache entry for the
    /// same key; the write is fire-and-forget -- its outcome is not
    /// awaited or retried here.
    pub fn on_result(&self, envelope: eddy_api::ResultEnvelope) {
        match envelope.into_result() {
            Ok(data) => {
                let first = {
                    let mut marker = lock(&self.started_at);
                    if marker.is_none() {
                        *marker = Some(Instant::now());
                        true
                    } else {
                        false
                    }
                };

                if first {
                    self.status.send_replace(SubscriptionStatus::Subscribed);
                    if let Some(hook) = &self.success_hook {
                        hook(&data);
                    }
                    debug!(key = %self.key, "subscription produced first result");
                }

                self.cache.set_query_data(&self.key, data);
            }
            Err(gateway_error) => {
                let error = Arc::new(CoreError::from(eddy_api::Error::Gateway(gateway_error)));
                self.cache.fail_query(&self.key, Arc::clone(&error));
                self.on_error(&error);
            }
        }
    }

    /// Handle a stream failure (establishment or delivered error).
    ///
    /// Not fatal to the engine: the first-delivery marker is cleared so
    /// a subsequent delivery counts as a fresh first success.
    pub fn on_error(&self, error: &CoreError) {
        *lock(&self.started_at) = None;
        self.status.send_replace(SubscriptionStatus::Idle);
        warn!(key = %self.key, error = %error, "subscription error");
        if let Some(hook) = &self.error_hook {
            hook(error);
        }
    }

    /// Explicit teardown of the status machine, without touching the
    /// network handle.
    pub fn on_abort(&self) {
        *lock(&self.started_at) = None;
        self.status.send_replace(SubscriptionStatus::Idle);
    }

    /// Stop the subscription. Idempotent, and safe to call when
    /// `start` was never invoked: the status reset always applies, the
    /// recorded cancellation handle is invoked at most once.
    pub fn stop(&self) {
        self.on_abort();
        if let Some(cancel) = lock(&self.cancel).take() {
            cancel.cancel();
            debug!(key = %self.key, "subscription stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_api::{GatewayError, ResultEnvelope};
    use serde_json::json;

    fn engine_with_hooks() -> (
        Arc<SubscriptionEngine>,
        Arc<QueryCache>,
        Arc<std::sync::atomic::AtomicUsize>,
        Arc<std::sync::atomic::AtomicUsize>,
    ) {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = Arc::new(QueryCache::new());
        let successes = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let s = Arc::clone(&successes);
        let e = Arc::clone(&errors);
        let engine = SubscriptionEngine::new(
            OperationKey::new("users/subscribe", Some(&json!({"id": "42"}))),
            Arc::clone(&cache),
            false,
            Some(Box::new(move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            })),
            Some(Box::new(move |_| {
                e.fetch_add(1, Ordering::SeqCst);
            })),
        );
        (engine, cache, successes, errors)
    }

    #[test]
    fn first_delivery_gates_success_hook() {
        use std::sync::atomic::Ordering;
        let (engine, _cache, successes, _errors) = engine_with_hooks();

        engine.on_result(ResultEnvelope::ok(json!({"name": "Ada"})));
        assert_eq!(engine.status(), SubscriptionStatus::Subscribed);
        assert_eq!(successes.load(Ordering::SeqCst), 1);

        engine.on_result(ResultEnvelope::ok(json!({"name": "Ada2"})));
        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert!(engine.started_at().is_some());
    }

    #[test]
    fn error_resets_gate_and_status() {
        use std::sync::atomic::Ordering;
        let (engine, cache, successes, errors) = engine_with_hooks();
        let key = engine.key().clone();

        engine.on_result(ResultEnvelope::ok(json!({"name": "Ada"})));
        engine.on_result(ResultEnvelope::err(GatewayError {
            message: "disconnected".into(),
            code: None,
            status_code: None,
        }));

        assert_eq!(engine.status(), SubscriptionStatus::Idle);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(engine.started_at().is_none());
        assert!(cache.state(&key).is_failed());

        // Subsequent delivery counts as a fresh first success
        engine.on_result(ResultEnvelope::ok(json!({"name": "Ada2"})));
        assert_eq!(engine.status(), SubscriptionStatus::Subscribed);
        assert_eq!(successes.load(Ordering::SeqCst), 2);
        assert_eq!(cache.state(&key).data().unwrap()["name"], "Ada2");
    }

    #[test]
    fn deliveries_mirror_into_cache() {
        let (engine, cache, _s, _e) = engine_with_hooks();
        let key = engine.key().clone();

        engine.on_result(ResultEnvelope::ok(json!({"n": 1})));
        assert_eq!(cache.state(&key).data().unwrap()["n"], 1);

        engine.on_result(ResultEnvelope::ok(json!({"n": 2})));
        assert_eq!(cache.state(&key).data().unwrap()["n"], 2);
    }

    #[test]
    fn stop_before_start_is_a_noop() {
        let (engine, _cache, _s, _e) = engine_with_hooks();
        engine.stop();
        engine.stop();
        assert_eq!(engine.status(), SubscriptionStatus::Idle);
    }

    #[test]
    fn abort_resets_status_without_handle() {
        let (engine, _cache, _s, _e) = engine_with_hooks();
        engine.on_result(ResultEnvelope::ok(json!(1)));
        assert!(engine.is_subscribed());

        engine.on_abort();
        assert_eq!(engine.status(), SubscriptionStatus::Idle);
        assert!(engine.started_at().is_none());
    }

    #[test]
    fn status_display() {
        assert_eq!(SubscriptionStatus::Idle.to_string(), "idle");
        assert_eq!(SubscriptionStatus::Subscribed.as_ref(), "subscribed");
    }
}
