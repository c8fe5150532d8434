// Gateway HTTP client
//
// Wraps `reqwest::Client` with gateway-specific URL construction,
// envelope parsing, CSRF handling, and the streaming read loop for
// subscriptions and live queries. The reactive layer (`eddy-core`)
// builds on these transport mechanics; nothing here tracks state beyond
// the CSRF token cell.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, GatewayError};
use crate::operations::{
    FetchUserOptions, LogoutOptions, Operation, OperationRequest, ResultEnvelope,
    SubscriptionRequest, UploadRequest,
};
use crate::transport::TransportConfig;
use crate::user::User;

const CSRF_HEADER: &str = "x-csrf-token";
const SDK_VERSION_HEADER: &str = "eddy-sdk-version";

/// Transport client for an eddy operations gateway.
///
/// Performs typed `query`, `mutate`, `subscribe`, auth, and upload calls
/// and resolves each to a [`ResultEnvelope`] (or a stream of them).
/// Construct one per gateway at the application's composition root and
/// share it via `Arc` -- there is no global instance.
pub struct GatewayClient {
    http: reqwest::Client,
    config: ClientConfig,
    csrf_token: ArcSwapOption<String>,
}

impl GatewayClient {
    /// Create a client with default transport settings.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Self::with_transport(config, &TransportConfig::default())
    }

    /// Create a client with explicit transport settings.
    ///
    /// If the transport doesn't already include a cookie jar, one is
    /// created automatically (gateway auth is cookie-session based).
    pub fn with_transport(
        config: ClientConfig,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let transport = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };

        let mut headers = HeaderMap::new();
        let version = HeaderValue::from_str(&config.sdk_version)
            .map_err(|e| Error::InvalidInput(format!("sdk version header: {e}")))?;
        headers.insert(SDK_VERSION_HEADER, version);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            config,
            csrf_token: ArcSwapOption::empty(),
        })
    }

    /// The client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The underlying HTTP client (for auth flows that need direct access).
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL for an operation: `{base}/operations/{name}`.
    ///
    /// Operation names may contain slashes (`"users/get"`); they map to
    /// path segments as-is.
    fn operation_url(&self, name: &str) -> Result<Url, Error> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/operations/{name}"))?)
    }

    /// Build a cookie-auth endpoint URL: `{base}/auth/cookie/{path}`.
    fn auth_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/auth/cookie/{path}"))?)
    }

    /// Build an upload endpoint URL: `{base}/s3/{provider}/upload`.
    fn upload_url(&self, provider: &str) -> Result<Url, Error> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/s3/{provider}/upload"))?)
    }

    /// Reject names absent from a non-empty metadata registry.
    fn check_operation(&self, name: &str) -> Result<(), Error> {
        if !self.config.metadata.is_empty() && !self.config.metadata.contains(name) {
            return Err(Error::UnknownOperation { name: name.into() });
        }
        Ok(())
    }

    fn append_operation_params(&self, url: &mut Url, input: Option<&Value>) -> Result<(), Error> {
        let mut pairs = url.query_pairs_mut();
        if !self.config.application_hash.is_empty() {
            pairs.append_pair("eddy_api_hash", &self.config.application_hash);
        }
        if let Some(input) = input {
            let variables =
                serde_json::to_string(input).map_err(|e| Error::InvalidInput(e.to_string()))?;
            pairs.append_pair("eddy_variables", &variables);
        }
        Ok(())
    }

    // ── Request/response operations ──────────────────────────────────

    /// Execute a query operation.
    ///
    /// Resolves to the gateway's result envelope; only transport-level
    /// failures surface as `Err`.
    pub async fn query(&self, req: &OperationRequest) -> Result<ResultEnvelope, Error> {
        self.check_operation(&req.operation_name)?;

        let mut url = self.operation_url(&req.operation_name)?;
        self.append_operation_params(&mut url, req.input.as_ref())?;

        debug!(operation = %req.operation_name, "GET {url}");
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        self.parse_envelope(resp).await
    }

    /// Execute a mutation operation.
    ///
    /// The input travels as the JSON body. When CSRF is enabled, the
    /// token is fetched lazily and attached; a 403 response drops the
    /// cached token so the next mutation fetches a fresh one.
    pub async fn mutate(&self, req: &OperationRequest) -> Result<ResultEnvelope, Error> {
        self.check_operation(&req.operation_name)?;

        let mut url = self.operation_url(&req.operation_name)?;
        self.append_operation_params(&mut url, None)?;

        debug!(operation = %req.operation_name, "POST {url}");
        let body = req.input.clone().unwrap_or(Value::Null);
        let mut request = self.http.post(url).json(&body);

        if self.config.csrf_enabled {
            let token = self.csrf_token().await?;
            request = request.header(CSRF_HEADER, token.as_str());
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            self.csrf_token.store(None);
        }
        self.parse_envelope(resp).await
    }

    /// Parse a response into a result envelope.
    ///
    /// Non-2xx responses may still carry a structured envelope; if not,
    /// a synthetic gateway error is built from the status line so the
    /// caller always sees the uniform envelope contract.
    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<ResultEnvelope, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            });
        }

        if let Ok(envelope) = serde_json::from_str::<ResultEnvelope>(&body) {
            if envelope.is_err() {
                return Ok(envelope);
            }
        }
        Ok(ResultEnvelope::err(GatewayError::from_status(
            status.as_u16(),
            &body,
        )))
    }

    // ── Streaming operations ─────────────────────────────────────────

    /// Open a streaming operation and deliver envelopes until cancelled.
    ///
    /// Establishes a streaming GET (`eddy_live=true` for live queries,
    /// `eddy_subscribe_once=true` for one-shot subscriptions) and feeds
    /// each newline-delimited JSON envelope to `on_result` in delivery
    /// order. Returns `Ok(())` on cancellation or clean stream end.
    ///
    /// Errors are establishment failures (connect error or non-2xx
    /// upgrade) and mid-stream transport drops; gateway-side operation
    /// failures arrive in-band as error envelopes.
    pub async fn subscribe<F>(
        &self,
        req: &SubscriptionRequest,
        cancel: CancellationToken,
        mut on_result: F,
    ) -> Result<(), Error>
    where
        F: FnMut(ResultEnvelope) + Send,
    {
        self.check_operation(&req.operation_name)?;

        let mut url = self.operation_url(&req.operation_name)?;
        self.append_operation_params(&mut url, req.input.as_ref())?;
        {
            let mut pairs = url.query_pairs_mut();
            if req.live_query {
                pairs.append_pair("eddy_live", "true");
            }
            if req.subscribe_once {
                pairs.append_pair("eddy_subscribe_once", "true");
            }
        }

        debug!(operation = %req.operation_name, "opening stream {url}");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::SubscribeConnect(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::SubscribeConnect(format!(
                "HTTP {status}: {}",
                body.trim()
            )));
        }

        tracing::info!(operation = %req.operation_name, "subscription stream established");

        let mut stream = resp.bytes_stream();
        let mut buf = BytesMut::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(operation = %req.operation_name, "subscription cancelled");
                    return Ok(());
                }
                chunk = stream.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            buf.extend_from_slice(&bytes);
                            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                                let line = buf.split_to(pos + 1);
                                deliver_frame(&line[..pos], &mut on_result);
                            }
                        }
                        Some(Err(e)) => {
                            return Err(Error::SubscribeConnect(e.to_string()));
                        }
                        None => {
                            // Stream ended; flush any trailing partial frame
                            if !buf.is_empty() {
                                deliver_frame(&buf, &mut on_result);
                            }
                            tracing::info!(operation = %req.operation_name, "subscription stream ended");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    // ── Authentication ───────────────────────────────────────────────

    /// Build the cookie-auth authorize URL for the given provider.
    ///
    /// The caller navigates to it (browser redirect, system browser,
    /// device flow shim); no local state changes here. Provider ids are
    /// validated against the configured registry when one is present.
    pub fn login(&self, provider_id: &str, redirect_uri: Option<&str>) -> Result<Url, Error> {
        if !self.config.auth_providers.is_empty()
            && !self.config.auth_providers.iter().any(|p| p == provider_id)
        {
            return Err(Error::UnknownAuthProvider {
                provider: provider_id.into(),
            });
        }

        let mut url = self.auth_url(&format!("authorize/{provider_id}"))?;
        if let Some(redirect) = redirect_uri {
            url.query_pairs_mut().append_pair("redirect_uri", redirect);
        }
        Ok(url)
    }

    /// End the current cookie session. Returns whether the gateway
    /// acknowledged the logout.
    pub async fn logout(&self, options: &LogoutOptions) -> Result<bool, Error> {
        let mut url = self.auth_url("user/logout")?;
        if options.logout_openid_connect_provider {
            url.query_pairs_mut()
                .append_pair("logout_openid_connect_provider", "true");
        }

        debug!("GET {url}");
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let ok = resp.status().is_success();
        if ok {
            // Session is gone; any cached CSRF token is now invalid
            self.csrf_token.store(None);
        }
        Ok(ok)
    }

    /// Fetch the identity behind the current cookie session.
    pub async fn fetch_user(&self, options: &FetchUserOptions) -> Result<User, Error> {
        let mut url = self.auth_url("user")?;
        if options.revalidate {
            url.query_pairs_mut().append_pair("revalidate", "true");
        }

        debug!("GET {url}");
        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::NotAuthenticated);
        }
        if !status.is_success() {
            return Err(Error::Authentication {
                message: format!("user fetch failed with HTTP {status}"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Fetch (and cache) the CSRF token for this session.
    async fn csrf_token(&self) -> Result<Arc<String>, Error> {
        if let Some(token) = self.csrf_token.load_full() {
            return Ok(token);
        }

        let url = self.auth_url("csrf")?;
        debug!("GET {url}");
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(Error::Transport)?
            .error_for_status()
            .map_err(Error::Transport)?;
        let token = resp.text().await.map_err(Error::Transport)?;

        let token = Arc::new(token.trim().to_string());
        self.csrf_token.store(Some(Arc::clone(&token)));
        Ok(token)
    }

    // ── File upload ──────────────────────────────────────────────────

    /// Upload files to a storage provider; returns the stored file keys.
    pub async fn upload_files(&self, req: &UploadRequest) -> Result<Vec<String>, Error> {
        let mut url = self.upload_url(&req.provider)?;
        if let Some(ref profile) = req.profile {
            url.query_pairs_mut()
                .append_pair("eddy_upload_profile", profile);
        }

        let mut form = reqwest::multipart::Form::new();
        for file in &req.files {
            let mut part = reqwest::multipart::Part::bytes(file.content.clone())
                .file_name(file.name.clone());
            if let Some(ref mime) = file.content_type {
                part = part
                    .mime_str(mime)
                    .map_err(|e| Error::InvalidInput(format!("bad content type: {e}")))?;
            }
            form = form.part("files", part);
        }

        debug!(provider = %req.provider, files = req.files.len(), "POST {url}");
        let mut request = self.http.post(url).multipart(form);
        if self.config.csrf_enabled {
            let token = self.csrf_token().await?;
            request = request.header(CSRF_HEADER, token.as_str());
        }

        let resp = request.send().await.map_err(Error::Transport)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Gateway(GatewayError::from_status(
                status.as_u16(),
                &body,
            )));
        }

        #[derive(Deserialize)]
        struct UploadedFile {
            key: String,
        }

        let files: Vec<UploadedFile> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;
        Ok(files.into_iter().map(|f| f.key).collect())
    }

    // ── Typed pass-through ───────────────────────────────────────────

    /// Execute a generated query operation with typed input and output.
    pub async fn query_typed<O: Operation>(
        &self,
        input: Option<&O::Input>,
    ) -> Result<O::Data, Error> {
        let req = typed_request::<O>(input)?;
        let data = self.query(&req).await?.into_result()?;
        decode::<O::Data>(&data)
    }

    /// Execute a generated mutation operation with typed input and output.
    pub async fn mutate_typed<O: Operation>(
        &self,
        input: Option<&O::Input>,
    ) -> Result<O::Data, Error> {
        let req = typed_request::<O>(input)?;
        let data = self.mutate(&req).await?.into_result()?;
        decode::<O::Data>(&data)
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Parse one newline-delimited stream frame and deliver it.
///
/// Blank keep-alive lines and unparseable frames are skipped with a
/// debug log, matching the envelope-or-nothing stream contract.
fn deliver_frame<F: FnMut(ResultEnvelope)>(frame: &[u8], on_result: &mut F) {
    let frame = frame.strip_suffix(b"\r").unwrap_or(frame);
    if frame.is_empty() {
        return;
    }
    match serde_json::from_slice::<ResultEnvelope>(frame) {
        Ok(envelope) => on_result(envelope),
        Err(e) => {
            debug!(error = %e, "skipping malformed stream frame");
        }
    }
}

// ── Typed helpers ────────────────────────────────────────────────────

fn typed_request<O: Operation>(input: Option<&O::Input>) -> Result<OperationRequest, Error> {
    let input = input
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    Ok(OperationRequest {
        operation_name: O::NAME.to_string(),
        input,
    })
}

fn decode<D: serde::de::DeserializeOwned>(data: &Value) -> Result<D, Error> {
    D::deserialize(data).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: data.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OperationKind, OperationMetadata};

    fn client() -> GatewayClient {
        GatewayClient::new(ClientConfig::default()).unwrap()
    }

    #[test]
    fn operation_url_keeps_path_segments() {
        let url = client().operation_url("users/get").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9991/operations/users/get");
    }

    #[test]
    fn auth_url_shape() {
        let url = client().auth_url("user/logout").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9991/auth/cookie/user/logout");
    }

    #[test]
    fn login_builds_authorize_url() {
        let url = client()
            .login("github", Some("http://localhost:3000/app"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9991/auth/cookie/authorize/github?redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fapp"
        );
    }

    #[test]
    fn login_rejects_unknown_provider() {
        let config = ClientConfig::default().with_auth_provider("github");
        let client = GatewayClient::new(config).unwrap();
        let err = client.login("gitlab", None).unwrap_err();
        assert!(matches!(err, Error::UnknownAuthProvider { .. }));
    }

    #[test]
    fn unknown_operation_rejected_when_registry_present() {
        let config = ClientConfig::default().with_metadata(
            OperationMetadata::new().operation("users/get", OperationKind::Query, false),
        );
        let client = GatewayClient::new(config).unwrap();
        let err = client.check_operation("users/delete").unwrap_err();
        assert!(matches!(err, Error::UnknownOperation { .. }));
        assert!(client.check_operation("users/get").is_ok());
    }

    #[test]
    fn frame_delivery_skips_blanks_and_garbage() {
        let mut seen = Vec::new();
        let mut sink = |e: ResultEnvelope| seen.push(e);

        deliver_frame(b"", &mut sink);
        deliver_frame(b"\r", &mut sink);
        deliver_frame(b"not json", &mut sink);
        deliver_frame(br#"{"data":{"n":1}}"#, &mut sink);
        deliver_frame(b"{\"data\":{\"n\":2}}\r", &mut sink);

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].clone().into_result().unwrap()["n"], 1);
        assert_eq!(seen[1].clone().into_result().unwrap()["n"], 2);
    }
}
