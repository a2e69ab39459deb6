// Client creation with custom user-agent support for kube 2.x
use hyper::http::{HeaderName, HeaderValue};
use kube::config::Kubeconfig;
use kube::{Client, Config};
use tracing::warn;

use crate::error::Result;

/// Create a new k8s client to interact with the k8s cluster api.
///
/// Connection parameters (endpoint, credentials, TLS policy) are resolved
/// once from the environment; the resulting client is the opaque connection
/// context handed to [`crate::WatchRegistry`].
///
/// # Errors
///
/// Will return `Err` if no usable cluster configuration can be inferred.
pub async fn new(custom_user_agent: Option<&str>) -> Result<Client> {
    let mut config = Config::infer().await?;

    // Set custom user-agent header if provided. This helps identify
    // multiplexer API calls in apiserver audit logs.
    if let Some(user_agent) = custom_user_agent {
        if let Ok(header_value) = HeaderValue::from_str(user_agent) {
            config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value));
        } else {
            warn!(user_agent, "invalid user-agent header, using the default");
        }
    }

    let client = Client::try_from(config)?;

    Ok(client)
}

/// Name of the kubeconfig context the process would connect with, if a
/// kubeconfig is present.
///
/// # Errors
///
/// Will return `Err` if the kubeconfig exists but cannot be read or parsed.
pub fn current_context() -> Result<Option<String>> {
    let kubeconfig = Kubeconfig::read()?;
    Ok(kubeconfig.current_context)
}
