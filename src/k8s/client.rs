// Client creation with custom user-agent support for kube 2.x
use crate::error::Result as PlResult;
use hyper::http::{HeaderName, HeaderValue};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use std::time::Duration;

/// Connection timeout applied to every cluster api client
pub const CONNECT_TIMEOUT_SECS: u64 = 120;

/// Create a new k8s client to interact with k8s cluster api
///
/// Configuration comes from an explicit kubeconfig path when one is given,
/// otherwise it is inferred (in-cluster service account or `KUBECONFIG`).
///
/// # Errors
///
/// Will return `Err` if client configuration can not be established
pub async fn new(custom_user_agent: Option<&str>, kubeconfig: Option<&Path>) -> PlResult<Client> {
    let mut config = match kubeconfig {
        Some(path) => {
            let kc = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kc, &KubeConfigOptions::default()).await?
        }
        None => Config::infer().await?,
    };

    config.connect_timeout = Some(Duration::from_secs(CONNECT_TIMEOUT_SECS));

    // Set custom user-agent header if provided
    // In kube 2.x, we can add custom headers directly to the Config
    if let Some(user_agent) = custom_user_agent {
        // Create a valid HeaderValue from the user agent string
        if let Ok(header_value) = HeaderValue::from_str(user_agent) {
            config
                .headers
                .push((HeaderName::from_static("user-agent"), header_value));
        }
        // If the header value is invalid, we'll just use the default user-agent
    }

    // Create kube client with the config
    let client = Client::try_from(config)?;

    Ok(client)
}
