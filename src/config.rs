//! Action configuration, field validation and environment resolution

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the project the job runs in
pub const PROJECT_NAME_ENV: &str = "PROJECT_NAME";

/// Namespace file mounted into pods with a service account
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Namespace used when nothing else resolves
pub const DEFAULT_NAMESPACE: &str = "default";

/// Settings of one "Cancel OpenShift Builds" action
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionConfig {
    /// API server URL; empty means the environment default
    pub api_url: String,

    /// Project the builds live in; empty means the resolved default
    pub namespace: String,

    /// Bearer token; empty means the service account token if available
    pub auth_token: String,

    /// Build config whose builds are cancelled (name prefix)
    pub build_config: String,

    /// Log per-build details
    pub verbose: bool,

    /// Accept any server certificate
    pub skip_tls_verify: bool,
}

/// Outcome of checking a single field
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldCheck {
    Ok,
    Warning(String),
    Error(String),
}

/// Check the API URL field
pub fn check_api_url(value: &str) -> FieldCheck {
    if value.is_empty() {
        return FieldCheck::Warning(
            "Unless you specify a value here, one of the default API endpoints will be used"
                .to_string(),
        );
    }
    FieldCheck::Ok
}

/// Check the build config field
pub fn check_build_config(value: &str) -> FieldCheck {
    if value.is_empty() {
        return FieldCheck::Error("You must set a BuildConfig name".to_string());
    }
    FieldCheck::Ok
}

/// Check the namespace field
pub fn check_namespace(value: &str) -> FieldCheck {
    if value.is_empty() {
        return FieldCheck::Warning(
            "Unless you specify a value here, the default namespace will be used".to_string(),
        );
    }
    FieldCheck::Ok
}

/// Input of one reconciliation run, fixed for its duration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconciliationRequest {
    pub endpoint: String,
    pub credential: Credential,
    pub namespace: String,
    pub target_config_name: String,
    pub verbose: bool,
    pub skip_tls_verify: bool,
}

/// Opaque bearer token
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("Credential(<none>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

impl ActionConfig {
    /// Load a configuration file (YAML)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Run every field check. Fails on the first error, otherwise
    /// returns the warnings.
    pub fn validate(&self) -> Result<Vec<String>> {
        let checks = [
            check_api_url(&self.api_url),
            check_namespace(&self.namespace),
            check_build_config(&self.build_config),
        ];

        let mut warnings = Vec::new();
        for check in checks {
            match check {
                FieldCheck::Ok => {}
                FieldCheck::Warning(msg) => warnings.push(msg),
                FieldCheck::Error(msg) => return Err(Error::validation(msg)),
            }
        }
        Ok(warnings)
    }

    /// Turn the settings into a request, filling the namespace from the
    /// environment when it is empty
    pub fn resolve<F>(&self, env: F) -> ReconciliationRequest
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = if self.namespace.is_empty() {
            default_namespace(env)
        } else {
            self.namespace.clone()
        };

        ReconciliationRequest {
            endpoint: self.api_url.clone(),
            credential: Credential::new(self.auth_token.clone()),
            namespace,
            target_config_name: self.build_config.clone(),
            verbose: self.verbose,
            skip_tls_verify: self.skip_tls_verify,
        }
    }
}

fn default_namespace<F>(env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    env(PROJECT_NAME_ENV)
        .filter(|ns| !ns.is_empty())
        .or_else(|| {
            std::fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE_FILE)
                .ok()
                .map(|ns| ns.trim().to_string())
                .filter(|ns| !ns.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string())
}
