//! Shared Kubernetes watch sessions with in-process fan-out.
//!
//! `kubemux` mirrors live cluster state into an in-process cache and streams
//! change events to any number of independent subscribers without each of
//! them opening its own upstream connection. One [`WatchRegistry`] holds at
//! most one list+watch session per (kind, namespace) key; subscribers attach
//! a callback, receive a replay of the current cache, then live deltas.
//!
//! ```no_run
//! use kubemux::{ResourceEvent, WatchRegistry};
//!
//! # async fn demo() -> kubemux::Result<()> {
//! let client = kubemux::client::new(Some(kubemux::USER_AGENT)).await?;
//! let registry = WatchRegistry::new(client);
//!
//! let subscription = registry.subscribe("pods", Some("default"), |event: &ResourceEvent| {
//!     println!("{}", event.to_json());
//! });
//! // dropping (or detaching) the last subscription tears the session down
//! # drop(subscription);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod informer;

pub use error::{Error, Result};
pub use informer::{
    ApiDirectory, ApiResourceInfo, FailureKind, ResourceEvent, RetryPolicy, SessionState,
    Subscription, WatchKey, WatchRegistry,
};

/// Default user agent for `kubemux` - automatically uses the package version
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
