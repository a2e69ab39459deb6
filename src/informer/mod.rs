pub mod backoff;
pub mod config;
pub mod directory;
pub mod event;
pub mod registry;
mod session;

pub use backoff::{FailureKind, RetryPolicy};
pub use directory::{ApiDirectory, ApiResourceInfo};
pub use event::{ResourceEvent, WatchKey};
pub use registry::{Subscription, WatchRegistry};
pub use session::SessionState;
