//! Cluster client construction
//!
//! Resolves an endpoint and bearer token into a `kube::Client`. An empty
//! endpoint means "whatever the environment provides": the in-cluster API
//! address when running in a pod, otherwise the local kubeconfig.

use std::path::Path;

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::adapters::{BuildClient, KubeBuildClient};
use crate::config::Credential;
use crate::error::{Error, Result};

/// Token file mounted into pods with a service account
pub const SERVICE_ACCOUNT_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// CA bundle mounted into pods with a service account
pub const SERVICE_ACCOUNT_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

const CONTEXT_NAME: &str = "build-canceller";

/// Produces an authenticated client for one run
#[async_trait]
pub trait ClusterConnector: Send + Sync {
    type Client: BuildClient;

    /// Connect to `endpoint` (empty for the environment default) with
    /// `credential` (empty for the ambient one)
    async fn connect(&self, endpoint: &str, credential: &Credential) -> Result<Self::Client>;
}

/// Connector producing `kube` clients
#[derive(Clone, Debug, Default)]
pub struct KubeConnector {
    /// Accept any server certificate
    pub skip_tls_verify: bool,
}

impl KubeConnector {
    pub fn new(skip_tls_verify: bool) -> Self {
        Self { skip_tls_verify }
    }

    async fn config(&self, endpoint: &str, credential: &Credential) -> Result<Config> {
        let endpoint = match config_source(endpoint, credential, |key| std::env::var(key).ok()) {
            ConfigSource::Endpoint(url) => url,
            ConfigSource::Infer => {
                if !credential.is_empty() {
                    warn!("No API endpoint given outside a cluster; ignoring the supplied token");
                }
                info!("Using the default Kubernetes configuration");
                return Config::infer()
                    .await
                    .map_err(|e| Error::connection(e.to_string()));
            }
        };

        let token = if credential.is_empty() {
            read_trimmed(Path::new(SERVICE_ACCOUNT_TOKEN_FILE))
        } else {
            Some(credential.token().to_string())
        };
        let ca_file = Path::new(SERVICE_ACCOUNT_CA_FILE);
        let ca = (!self.skip_tls_verify && ca_file.exists())
            .then(|| SERVICE_ACCOUNT_CA_FILE.to_string());

        debug!(
            endpoint = %endpoint,
            authenticated = token.is_some(),
            ca = ca.is_some(),
            "Building client configuration"
        );

        let kubeconfig = kubeconfig_for(
            &endpoint,
            token.as_deref(),
            ca.as_deref(),
            self.skip_tls_verify,
        )?;
        Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| Error::connection(e.to_string()))
    }
}

#[async_trait]
impl ClusterConnector for KubeConnector {
    type Client = KubeBuildClient;

    async fn connect(&self, endpoint: &str, credential: &Credential) -> Result<KubeBuildClient> {
        let config = self.config(endpoint, credential).await?;
        let client = Client::try_from(config).map_err(|e| Error::connection(e.to_string()))?;
        Ok(KubeBuildClient::new(client))
    }
}

/// Where the client configuration comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigSource {
    /// `Config::infer()`: in-cluster service account or local kubeconfig
    Infer,
    /// A single-context kubeconfig for this server URL
    Endpoint(String),
}

/// Pick the configuration source. With neither endpoint nor credential
/// the environment decides everything; a credential without an endpoint
/// needs the in-cluster API address.
pub fn config_source<F>(endpoint: &str, credential: &Credential, env: F) -> ConfigSource
where
    F: Fn(&str) -> Option<String>,
{
    if !endpoint.is_empty() {
        return ConfigSource::Endpoint(endpoint.to_string());
    }
    if credential.is_empty() {
        return ConfigSource::Infer;
    }
    in_cluster_endpoint(env).map_or(ConfigSource::Infer, ConfigSource::Endpoint)
}

/// In-cluster API server URL from the service environment variables
pub fn in_cluster_endpoint<F>(env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let host = env("KUBERNETES_SERVICE_HOST").filter(|h| !h.is_empty())?;
    let port = env("KUBERNETES_SERVICE_PORT")
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "443".to_string());

    // IPv6 hosts must be bracketed in URLs
    if host.contains(':') {
        Some(format!("https://[{}]:{}", host, port))
    } else {
        Some(format!("https://{}:{}", host, port))
    }
}

/// Single-context kubeconfig pointing at `endpoint`
pub fn kubeconfig_for(
    endpoint: &str,
    token: Option<&str>,
    certificate_authority: Option<&str>,
    skip_tls_verify: bool,
) -> Result<Kubeconfig> {
    let mut cluster = json!({ "server": endpoint });
    if skip_tls_verify {
        cluster["insecure-skip-tls-verify"] = json!(true);
    } else if let Some(ca) = certificate_authority {
        cluster["certificate-authority"] = json!(ca);
    }

    let mut user = json!({});
    if let Some(token) = token {
        user["token"] = json!(token);
    }

    let kubeconfig = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": CONTEXT_NAME, "cluster": cluster }],
        "users": [{ "name": CONTEXT_NAME, "user": user }],
        "contexts": [{
            "name": CONTEXT_NAME,
            "context": { "cluster": CONTEXT_NAME, "user": CONTEXT_NAME }
        }],
        "current-context": CONTEXT_NAME,
    }))?;
    Ok(kubeconfig)
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_pod(key: &str) -> Option<String> {
        match key {
            "KUBERNETES_SERVICE_HOST" => Some("10.0.0.1".to_string()),
            "KUBERNETES_SERVICE_PORT" => Some("6443".to_string()),
            _ => None,
        }
    }

    #[test]
    fn no_endpoint_and_no_credential_infers_even_in_a_pod() {
        assert_eq!(
            config_source("", &Credential::default(), in_pod),
            ConfigSource::Infer
        );
    }

    #[test]
    fn credential_without_endpoint_uses_in_cluster_address() {
        assert_eq!(
            config_source("", &Credential::new("sha256~abc"), in_pod),
            ConfigSource::Endpoint("https://10.0.0.1:6443".to_string())
        );
        assert_eq!(
            config_source("", &Credential::new("sha256~abc"), |_| None),
            ConfigSource::Infer
        );
    }

    #[test]
    fn explicit_endpoint_always_wins() {
        assert_eq!(
            config_source("https://api.example.com", &Credential::default(), |_| None),
            ConfigSource::Endpoint("https://api.example.com".to_string())
        );
    }

    #[test]
    fn in_cluster_endpoint_from_service_env() {
        let url = in_cluster_endpoint(|key| match key {
            "KUBERNETES_SERVICE_HOST" => Some("10.0.0.1".to_string()),
            "KUBERNETES_SERVICE_PORT" => Some("6443".to_string()),
            _ => None,
        });
        assert_eq!(url.as_deref(), Some("https://10.0.0.1:6443"));
    }

    #[test]
    fn in_cluster_endpoint_brackets_ipv6() {
        let url = in_cluster_endpoint(|key| {
            (key == "KUBERNETES_SERVICE_HOST").then(|| "fd00::1".to_string())
        });
        assert_eq!(url.as_deref(), Some("https://[fd00::1]:443"));
    }

    #[test]
    fn no_in_cluster_endpoint_outside_a_pod() {
        assert!(in_cluster_endpoint(|_| None).is_none());
    }

    #[test]
    fn kubeconfig_selects_the_single_context() {
        let kubeconfig = kubeconfig_for(
            "https://api.example.com:6443",
            Some("sha256~abc"),
            Some(SERVICE_ACCOUNT_CA_FILE),
            false,
        )
        .unwrap();

        assert_eq!(kubeconfig.current_context.as_deref(), Some(CONTEXT_NAME));
        assert_eq!(kubeconfig.clusters.len(), 1);
        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_deref(), Some("https://api.example.com:6443"));
        assert_eq!(
            cluster.certificate_authority.as_deref(),
            Some(SERVICE_ACCOUNT_CA_FILE)
        );
        assert_eq!(kubeconfig.auth_infos.len(), 1);
    }

    #[test]
    fn skip_tls_verify_drops_certificate_authority() {
        let kubeconfig =
            kubeconfig_for("https://api.example.com", None, Some("/ca.crt"), true).unwrap();
        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.insecure_skip_tls_verify, Some(true));
        assert!(cluster.certificate_authority.is_none());
    }
}
