// ── Session facade ──
//
// The main entry point for consumers. Owns an explicitly-constructed
// transport client plus the query cache, and hands out per-mount
// bindings. Built at the application's composition root; cheaply
// cloneable, one per gateway.

use std::sync::Arc;

use serde_json::Value;

use eddy_api::{GatewayClient, OperationRequest};

use crate::bindings::{
    Auth, CreateMutationOptions, CreateQueryOptions, CreateSubscriptionOptions,
    FileUploadBinding, QueryBinding, SubscriptionBinding, UserOptions,
};
use crate::cache::{MutationHandle, MutationOptions, QueryCache, QueryOptions};
use crate::fetch;
use crate::key::OperationKey;
use crate::subscription::SubscriptionEngine;

/// Binds a gateway client's operations to reactive cache primitives.
#[derive(Clone)]
pub struct Session {
    client: Arc<GatewayClient>,
    cache: Arc<QueryCache>,
}

impl Session {
    /// Create a session with a fresh cache.
    pub fn new(client: Arc<GatewayClient>) -> Self {
        Self::with_cache(client, Arc::new(QueryCache::new()))
    }

    /// Create a session over an existing cache (shared between
    /// sessions, or pre-seeded in tests).
    pub fn with_cache(client: Arc<GatewayClient>, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    pub fn client(&self) -> &Arc<GatewayClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// The cache key a query binding would use for this operation.
    pub fn query_key(&self, operation_name: &str, input: Option<&Value>) -> OperationKey {
        OperationKey::new(operation_name, input)
    }

    // ── Bindings ─────────────────────────────────────────────────────

    /// Mount a query.
    ///
    /// Plain queries fetch once through the declarative cache primitive
    /// and refetch on invalidation. With `live_query` set, the
    /// declarative fetch is forced off and a subscription engine feeds
    /// the same cache entry instead -- mixing live and polled bindings
    /// on one key is unsupported, and this is what prevents it.
    pub fn create_query(&self, options: CreateQueryOptions) -> QueryBinding {
        let CreateQueryOptions {
            operation_name,
            input,
            live_query,
            enabled,
            refetch_on_invalidate,
            retry,
            subscribe_once,
            reset_on_mount,
            on_success,
            on_error,
        } = options;

        let key = OperationKey::new(&operation_name, input.as_ref());

        let cache_options = QueryOptions {
            enabled: !live_query && enabled,
            refetch_on_invalidate: !live_query && refetch_on_invalidate,
            retry,
        };
        let request = OperationRequest {
            operation_name,
            input: input.clone(),
        };
        let fetch = fetch::query_fetch(&self.client, &request);
        let handle = self.cache.create_query(key.clone(), fetch, &cache_options);

        let engine = if live_query && enabled {
            let engine = SubscriptionEngine::new(
                key.clone(),
                Arc::clone(&self.cache),
                subscribe_once,
                on_success,
                on_error,
            );
            if reset_on_mount && engine.started_at().is_none() {
                self.cache.remove_queries(&key);
            }
            engine.start(&self.client, input, true);
            Some(engine)
        } else {
            None
        };

        QueryBinding::new(Arc::clone(&self.cache), handle, engine)
    }

    /// Mount a mutation. Keyed by operation name alone; the input is
    /// supplied when [`mutate`](MutationHandle::mutate) is called. No
    /// other cache entry is invalidated implicitly -- use the
    /// `on_success` hook for that.
    pub fn create_mutation(&self, options: CreateMutationOptions) -> MutationHandle {
        let CreateMutationOptions {
            operation_name,
            on_success,
            on_error,
        } = options;

        let key = OperationKey::new(&operation_name, None);
        let mutate = fetch::mutation_fetch(&self.client, &operation_name);
        self.cache.create_mutation(
            key,
            mutate,
            MutationOptions {
                on_success,
                on_error,
            },
        )
    }

    /// Mount a subscription operation.
    pub fn create_subscription(&self, options: CreateSubscriptionOptions) -> SubscriptionBinding {
        let CreateSubscriptionOptions {
            operation_name,
            input,
            enabled,
            subscribe_once,
            reset_on_mount,
            on_success,
            on_error,
        } = options;

        let key = OperationKey::new(&operation_name, input.as_ref());
        let state_rx = self.cache.watch(&key);

        let engine = SubscriptionEngine::new(
            key.clone(),
            Arc::clone(&self.cache),
            subscribe_once,
            on_success,
            on_error,
        );

        if enabled {
            if reset_on_mount && engine.started_at().is_none() {
                self.cache.remove_queries(&key);
            }
            engine.start(&self.client, input, false);
        }

        SubscriptionBinding::new(key, state_rx, engine)
    }

    /// Mount a file upload.
    pub fn create_file_upload(&self) -> FileUploadBinding {
        FileUploadBinding::new(Arc::clone(&self.client))
    }

    /// Login/logout surface bound to this session's cache.
    pub fn auth(&self) -> Auth {
        Auth::new(Arc::clone(&self.client), Arc::clone(&self.cache))
    }

    /// Mount the current-user read, keyed by the fixed user key.
    pub fn user(&self, options: &UserOptions) -> QueryBinding {
        let key = OperationKey::user();
        let fetch = fetch::user_fetch(&self.client, options.revalidate);
        let cache_options = QueryOptions {
            enabled: options.enabled,
            refetch_on_invalidate: true,
            retry: options.retry,
        };
        let handle = self.cache.create_query(key, fetch, &cache_options);
        QueryBinding::new(Arc::clone(&self.cache), handle, None)
    }
}
