// eddy-api: Async Rust transport client for an eddy operations gateway.

pub mod client;
pub mod config;
pub mod error;
pub mod operations;
pub mod transport;
pub mod user;

pub use client::GatewayClient;
pub use config::{ClientConfig, OperationInfo, OperationKind, OperationMetadata};
pub use error::{Error, GatewayError};
pub use operations::{
    FetchUserOptions, LogoutOptions, Operation, OperationRequest, ResultEnvelope,
    SubscriptionRequest, UploadFile, UploadRequest,
};
pub use user::User;
