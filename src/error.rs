use thiserror::Error;

use crate::informer::WatchKey;

pub type Result<T> = core::result::Result<T, Error>;

/// Failure taxonomy for the watch multiplexer.
///
/// Only `UnknownKind`, `RetriesExhausted` and individual `TransientWatch`
/// occurrences ever surface to subscribers as ERROR events; everything else
/// is retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// No usable cluster connection. Fatal at startup, never retried.
    #[error("no usable cluster connection: {0}")]
    Configuration(#[from] kube::config::InferConfigError),

    /// The kubeconfig on disk could not be read or parsed.
    #[error("failed to read kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// The whole discovery enumeration failed. Not cached; the next resolve
    /// retries discovery from scratch.
    #[error("api discovery failed: {0}")]
    Discovery(#[source] kube::Error),

    /// The cluster does not expose the requested kind. Terminal per key.
    #[error("unknown resource kind {0:?}")]
    UnknownKind(String),

    /// Network or stream reset while watching. Retried with backoff.
    #[error("watch stream failed for {key}: {source}")]
    TransientWatch {
        key: WatchKey,
        #[source]
        source: kube::Error,
    },

    /// Gave up on a key after the maximum number of consecutive transient
    /// failures. Terminal per key.
    #[error("watch retries exhausted for {key} after {attempts} attempts")]
    RetriesExhausted { key: WatchKey, attempts: u32 },

    /// Any other Kubernetes API failure.
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
}
