use std::sync::Arc;

use serde_json::Value;
use url::Url;

use eddy_api::{GatewayClient, LogoutOptions};

use crate::cache::QueryCache;
use crate::error::CoreError;
use crate::key::OperationKey;

/// Login/logout surface bound to the session's cache.
pub struct Auth {
    client: Arc<GatewayClient>,
    cache: Arc<QueryCache>,
}

impl Auth {
    pub(crate) fn new(client: Arc<GatewayClient>, cache: Arc<QueryCache>) -> Self {
        Self { client, cache }
    }

    /// Build the authorize URL for a cookie-auth provider. The caller
    /// navigates to it; no local state changes.
    pub fn login(&self, provider_id: &str, redirect_uri: Option<&str>) -> Result<Url, CoreError> {
        self.client
            .login(provider_id, redirect_uri)
            .map_err(CoreError::from)
    }

    /// End the session at the gateway, then overwrite the user cache
    /// entry with an empty value -- post-logout reads observe "no user"
    /// immediately, with no refetch and no stale identity.
    pub async fn logout(&self, options: &LogoutOptions) -> Result<bool, CoreError> {
        let acknowledged = self.client.logout(options).await.map_err(CoreError::from)?;
        self.cache.set_query_data(&OperationKey::user(), Value::Null);
        Ok(acknowledged)
    }
}
