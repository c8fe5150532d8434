use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tokio::sync::watch;

use eddy_api::{GatewayClient, UploadRequest};

use crate::cache::QueryState;
use crate::error::CoreError;
use crate::stream::StateStream;

/// A mounted file-upload operation.
///
/// One mutation-shaped call per `upload`; state is tracked per binding
/// (uploads don't share cache entries).
pub struct FileUploadBinding {
    client: Arc<GatewayClient>,
    state: watch::Sender<QueryState>,
}

impl FileUploadBinding {
    pub(crate) fn new(client: Arc<GatewayClient>) -> Self {
        let (state, _) = watch::channel(QueryState::Idle);
        Self { client, state }
    }

    /// Upload files and await the stored file keys.
    pub async fn upload(&self, req: UploadRequest) -> Result<Vec<String>, Arc<CoreError>> {
        self.state.send_replace(QueryState::Loading);

        match self.client.upload_files(&req).await {
            Ok(keys) => {
                self.state.send_replace(QueryState::Ready {
                    data: Arc::new(json!(keys)),
                    fetched_at: Instant::now(),
                });
                Ok(keys)
            }
            Err(e) => {
                let error = Arc::new(CoreError::from(e));
                self.state.send_replace(QueryState::Failed {
                    error: Arc::clone(&error),
                });
                Err(error)
            }
        }
    }

    pub fn state(&self) -> QueryState {
        self.state.borrow().clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.state().is_loading()
    }

    /// File keys from the most recent successful upload.
    pub fn file_keys(&self) -> Option<Vec<String>> {
        let data = self.state().data()?;
        serde_json::from_value(data.as_ref().clone()).ok()
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.state().error()
    }

    pub fn watch(&self) -> StateStream<QueryState> {
        StateStream::new(self.state.subscribe())
    }
}
