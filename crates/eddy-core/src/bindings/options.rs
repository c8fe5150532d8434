// Options structs for the binding constructors. Builder-style, with
// the operation name as the only required field.

use serde_json::Value;

use crate::cache::{ErrorHook, SuccessHook};
use crate::error::CoreError;

/// Options for [`Session::create_query`](crate::session::Session::create_query).
pub struct CreateQueryOptions {
    /// Remote operation to execute, e.g. `"users/get"`.
    pub operation_name: String,

    /// Operation-specific input payload.
    pub input: Option<Value>,

    /// Stream the query as a live query instead of fetching once. The
    /// declarative fetch and invalidation refetch are forced off; the
    /// entry is populated exclusively by the subscription engine.
    pub live_query: bool,

    /// Master switch: nothing touches the network while `false`.
    pub enabled: bool,

    /// Refetch when the key is invalidated (request/response path only).
    pub refetch_on_invalidate: bool,

    /// Extra fetch attempts on failure (request/response path only).
    pub retry: u32,

    /// Live path: ask the gateway to end the stream after one result.
    pub subscribe_once: bool,

    /// Live path: clear the cache entry once before subscribing,
    /// provided no first result has been produced yet.
    pub reset_on_mount: bool,

    /// Live path: invoked once per (re)start, on the first delivery.
    pub on_success: Option<SuccessHook>,

    /// Live path: invoked on establishment failure or delivered error.
    pub on_error: Option<ErrorHook>,
}

impl CreateQueryOptions {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            input: None,
            live_query: false,
            enabled: true,
            refetch_on_invalidate: true,
            retry: 0,
            subscribe_once: false,
            reset_on_mount: false,
            on_success: None,
            on_error: None,
        }
    }

    pub fn input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn live(mut self) -> Self {
        self.live_query = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn retry(mut self, attempts: u32) -> Self {
        self.retry = attempts;
        self
    }

    pub fn subscribe_once(mut self) -> Self {
        self.subscribe_once = true;
        self
    }

    pub fn reset_on_mount(mut self) -> Self {
        self.reset_on_mount = true;
        self
    }

    pub fn on_success(mut self, hook: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&CoreError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// Options for [`Session::create_mutation`](crate::session::Session::create_mutation).
pub struct CreateMutationOptions {
    pub operation_name: String,
    pub on_success: Option<SuccessHook>,
    pub on_error: Option<ErrorHook>,
}

impl CreateMutationOptions {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            on_success: None,
            on_error: None,
        }
    }

    pub fn on_success(mut self, hook: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&CoreError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// Options for [`Session::create_subscription`](crate::session::Session::create_subscription).
pub struct CreateSubscriptionOptions {
    pub operation_name: String,
    pub input: Option<Value>,
    pub enabled: bool,
    pub subscribe_once: bool,
    pub reset_on_mount: bool,
    pub on_success: Option<SuccessHook>,
    pub on_error: Option<ErrorHook>,
}

impl CreateSubscriptionOptions {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            input: None,
            enabled: true,
            subscribe_once: false,
            reset_on_mount: false,
            on_success: None,
            on_error: None,
        }
    }

    pub fn input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn subscribe_once(mut self) -> Self {
        self.subscribe_once = true;
        self
    }

    pub fn reset_on_mount(mut self) -> Self {
        self.reset_on_mount = true;
        self
    }

    pub fn on_success(mut self, hook: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&CoreError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }
}

/// Options for [`Session::user`](crate::session::Session::user).
#[derive(Debug, Clone)]
pub struct UserOptions {
    /// Ask the gateway to re-validate the session with the provider.
    pub revalidate: bool,
    pub enabled: bool,
    pub retry: u32,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            revalidate: false,
            enabled: true,
            retry: 0,
        }
    }
}
