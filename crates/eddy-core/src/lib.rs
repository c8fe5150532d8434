// eddy-core: Reactive binding layer between eddy-api and consumers.

pub mod bindings;
pub mod cache;
pub mod error;
pub mod fetch;
pub mod key;
pub mod session;
pub mod stream;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::CoreError;
pub use key::{OperationKey, USER_KEY_NAME};
pub use session::Session;
pub use subscription::{SubscriptionEngine, SubscriptionStatus};

pub use cache::{
    ErrorHook, MutationHandle, MutationOptions, QueryCache, QueryHandle, QueryOptions,
    QueryState, SuccessHook,
};

pub use bindings::{
    Auth, CreateMutationOptions, CreateQueryOptions, CreateSubscriptionOptions,
    FileUploadBinding, QueryBinding, SubscriptionBinding, UserOptions,
};

pub use stream::StateStream;
