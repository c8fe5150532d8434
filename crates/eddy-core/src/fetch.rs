// ── Fetcher adapters ──
//
// Bridge the transport client's envelope contract to the cache's fetch
// contract: resolve with the `data` payload, or fail with the envelope's
// `error` as-is. No retry, no transformation -- one network call per
// invocation, abandoned when the supplied token fires.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use eddy_api::{GatewayClient, OperationRequest};

use crate::error::CoreError;

/// A cache-compatible fetch function: one cancellable async call
/// resolving to a payload or a failure.
pub type FetchFn =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<Value, CoreError>> + Send + Sync>;

/// A cache-compatible mutate function: call-time input, payload or
/// failure out.
pub type MutateFn =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, Result<Value, CoreError>> + Send + Sync>;

/// Adapter over [`GatewayClient::query`] for one fixed request.
pub fn query_fetch(client: &Arc<GatewayClient>, req: &OperationRequest) -> FetchFn {
    let client = Arc::clone(client);
    let req = req.clone();

    Arc::new(move |cancel: CancellationToken| {
        let client = Arc::clone(&client);
        let req = req.clone();
        Box::pin(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(CoreError::Cancelled),
                result = async {
                    let envelope = client.query(&req).await?;
                    let data = envelope.into_result().map_err(eddy_api::Error::Gateway)?;
                    Ok::<_, eddy_api::Error>(data)
                } => result.map_err(CoreError::from),
            }
        })
    })
}

/// Adapter over [`GatewayClient::mutate`], parameterized by call-time
/// input rather than at binding time.
pub fn mutation_fetch(client: &Arc<GatewayClient>, operation_name: &str) -> MutateFn {
    let client = Arc::clone(client);
    let operation_name = operation_name.to_string();

    Arc::new(move |input: Option<Value>| {
        let client = Arc::clone(&client);
        let req = OperationRequest {
            operation_name: operation_name.clone(),
            input,
        };
        Box::pin(async move {
            let envelope = client.mutate(&req).await.map_err(CoreError::from)?;
            envelope
                .into_result()
                .map_err(|e| CoreError::from(eddy_api::Error::Gateway(e)))
        })
    })
}

/// Adapter over [`GatewayClient::fetch_user`] for the fixed user entry.
pub fn user_fetch(client: &Arc<GatewayClient>, revalidate: bool) -> FetchFn {
    let client = Arc::clone(client);

    Arc::new(move |cancel: CancellationToken| {
        let client = Arc::clone(&client);
        Box::pin(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => Err(CoreError::Cancelled),
                result = async {
                    let user = client
                        .fetch_user(&eddy_api::FetchUserOptions { revalidate })
                        .await?;
                    serde_json::to_value(user)
                        .map_err(|e| eddy_api::Error::InvalidInput(e.to_string()))
                } => result.map_err(CoreError::from),
            }
        })
    })
}
