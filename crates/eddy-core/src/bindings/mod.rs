// ── Consumer-facing bindings ──
//
// The surface a UI-ish consumer holds: one binding per mounted use of
// an operation. Bindings tie cache handles and subscription engines to
// an owner's lifetime -- dropping a binding is the unmount.

mod auth;
mod options;
mod query;
mod subscription;
mod upload;

pub use auth::Auth;
pub use options::{
    CreateMutationOptions, CreateQueryOptions, CreateSubscriptionOptions, UserOptions,
};
pub use query::QueryBinding;
pub use subscription::SubscriptionBinding;
pub use upload::FileUploadBinding;
