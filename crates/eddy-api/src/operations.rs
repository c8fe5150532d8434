// ── Operation request/response types ──
//
// Wire-level shapes shared by every client surface: the result envelope
// every call resolves to, the request options for one-shot and streaming
// operations, and the typed `Operation` pass-through used by generated
// code.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::OperationKind;
use crate::error::GatewayError;

/// The discriminated success/error wrapper every remote call resolves to.
///
/// Exactly one of `data`/`error` is populated per delivery. An envelope
/// with neither is malformed and surfaces as an error from
/// [`into_result`](Self::into_result).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<GatewayError>,
}

impl ResultEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: GatewayError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }

    /// Collapse into `Result`, matching the fetcher contract: the error
    /// side wins if both are somehow present.
    pub fn into_result(self) -> Result<Value, GatewayError> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err(GatewayError {
                message: "malformed envelope: neither data nor error".into(),
                code: None,
                status_code: None,
            }),
        }
    }
}

/// Request options for a one-shot `query` or `mutate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    /// Operation name as the gateway knows it, e.g. `"users/get"`.
    pub operation_name: String,

    /// Operation-specific input payload, absent for nullary operations.
    pub input: Option<Value>,
}

impl OperationRequest {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            input: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }
}

/// Request options for a streaming `subscribe` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub operation_name: String,
    pub input: Option<Value>,

    /// Stream a query operation as a live query instead of a declared
    /// subscription.
    pub live_query: bool,

    /// Ask the gateway to close the stream after the first result.
    pub subscribe_once: bool,
}

impl SubscriptionRequest {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            input: None,
            live_query: false,
            subscribe_once: false,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    pub fn live(mut self) -> Self {
        self.live_query = true;
        self
    }

    pub fn once(mut self) -> Self {
        self.subscribe_once = true;
        self
    }
}

/// Options for [`GatewayClient::fetch_user`](crate::client::GatewayClient::fetch_user).
#[derive(Debug, Clone, Default)]
pub struct FetchUserOptions {
    /// Ask the gateway to re-validate the session against the identity
    /// provider instead of answering from its session store.
    pub revalidate: bool,
}

/// Options for [`GatewayClient::logout`](crate::client::GatewayClient::logout).
#[derive(Debug, Clone, Default)]
pub struct LogoutOptions {
    /// Also end the session at the OpenID Connect provider.
    pub logout_openid_connect_provider: bool,
}

/// One file in an upload request.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content: Vec<u8>,
    pub content_type: Option<String>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, mime: impl Into<String>) -> Self {
        self.content_type = Some(mime.into());
        self
    }
}

/// Request options for a file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Storage provider name configured on the gateway.
    pub provider: String,

    /// Optional named upload profile (size/mime policy) on the provider.
    pub profile: Option<String>,

    pub files: Vec<UploadFile>,
}

impl UploadRequest {
    pub fn new(provider: impl Into<String>, files: Vec<UploadFile>) -> Self {
        Self {
            provider: provider.into(),
            profile: None,
            files,
        }
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }
}

/// Compile-time description of one generated operation.
///
/// Generated modules implement this per operation so callers get typed
/// inputs and outputs while the client stays payload-agnostic:
///
/// ```rust,ignore
/// struct UsersGet;
///
/// impl Operation for UsersGet {
///     const NAME: &'static str = "users/get";
///     const KIND: OperationKind = OperationKind::Query;
///     type Input = UsersGetInput;
///     type Data = UsersGetResponse;
/// }
///
/// let user = client.query_typed::<UsersGet>(Some(&input)).await?;
/// ```
pub trait Operation {
    const NAME: &'static str;
    const KIND: OperationKind;
    type Input: Serialize + Send + Sync;
    type Data: DeserializeOwned;
}
