// ── Gateway client configuration ──
//
// Generated-client artifacts live here: the base URL and build hash the
// code generator stamps out, plus the per-operation metadata registry the
// binding layer consults. Construction is builder-style so a generated
// module can declare the whole surface in one expression.

use std::collections::HashMap;

use strum::{AsRefStr, Display};
use url::Url;

/// What kind of remote operation a name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// Static facts about one named operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationInfo {
    pub kind: OperationKind,
    pub requires_authentication: bool,
}

/// Registry of operation name → metadata, stamped out by codegen.
///
/// An empty registry disables name validation -- useful for tests and
/// for talking to a gateway whose schema is not known at compile time.
#[derive(Debug, Clone, Default)]
pub struct OperationMetadata {
    ops: HashMap<String, OperationInfo>,
}

impl OperationMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one operation. Builder-style, chainable.
    pub fn operation(
        mut self,
        name: impl Into<String>,
        kind: OperationKind,
        requires_authentication: bool,
    ) -> Self {
        self.ops.insert(
            name.into(),
            OperationInfo {
                kind,
                requires_authentication,
            },
        );
        self
    }

    /// Look up metadata for an operation name.
    pub fn info(&self, name: &str) -> Option<OperationInfo> {
        self.ops.get(name).copied()
    }

    /// Whether the named operation needs an authenticated session.
    /// Unknown names default to `false`.
    pub fn requires_authentication(&self, name: &str) -> bool {
        self.info(name).is_some_and(|i| i.requires_authentication)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}

/// Configuration for a single gateway client instance.
///
/// Built by the application's composition root (usually via
/// `eddy-config`) and handed to [`GatewayClient::new`] -- there is no
/// process-wide default client.
///
/// [`GatewayClient::new`]: crate::client::GatewayClient::new
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Gateway root URL, e.g. `http://localhost:9991`.
    pub base_url: Url,

    /// Hash of the deployed gateway build; sent with every operation so
    /// the gateway can reject clients generated against a stale schema.
    pub application_hash: String,

    /// Client SDK version, sent as a request header.
    pub sdk_version: String,

    /// Attach a CSRF token to mutations and uploads.
    pub csrf_enabled: bool,

    /// Auth providers the gateway exposes for cookie-based login.
    /// Empty means "don't validate provider ids client-side".
    pub auth_providers: Vec<String>,

    /// Generated per-operation metadata.
    pub metadata: OperationMetadata,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            application_hash: String::new(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            csrf_enabled: true,
            auth_providers: Vec::new(),
            metadata: OperationMetadata::default(),
        }
    }

    pub fn with_application_hash(mut self, hash: impl Into<String>) -> Self {
        self.application_hash = hash.into();
        self
    }

    pub fn with_csrf(mut self, enabled: bool) -> Self {
        self.csrf_enabled = enabled;
        self
    }

    pub fn with_auth_provider(mut self, provider: impl Into<String>) -> Self {
        self.auth_providers.push(provider.into());
        self
    }

    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Url::parse("http://localhost:9991").expect("static default URL"))
    }
}
