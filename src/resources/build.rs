//! OpenShift Build resource
//!
//! The `Build` kind is owned by the cluster, so only the fields the
//! canceller reads are modelled here. Everything else is ignored on
//! deserialization and never written back.

use std::fmt;

use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// Build resource specification (`build.openshift.io/v1`). No `spec`
/// field is read, so none are modelled
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize)]
#[kube(
    group = "build.openshift.io",
    version = "v1",
    kind = "Build",
    plural = "builds",
    namespaced,
    status = "BuildStatus",
    schema = "disabled"
)]
pub struct BuildSpec {}

/// Build status as reported by the cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    /// Current phase (New, Pending, Running, Complete, Failed, Error, Cancelled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Set once a cancellation has been requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
}

/// Lifecycle phase of a build
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildPhase {
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
    /// Any phase string the cluster reports that is not listed above
    Other(String),
}

impl BuildPhase {
    /// Parse a phase string, ignoring ASCII case
    pub fn parse(phase: &str) -> Self {
        match phase.to_ascii_lowercase().as_str() {
            "new" => BuildPhase::New,
            "pending" => BuildPhase::Pending,
            "running" => BuildPhase::Running,
            "complete" => BuildPhase::Complete,
            "failed" => BuildPhase::Failed,
            "error" => BuildPhase::Error,
            "cancelled" => BuildPhase::Cancelled,
            _ => BuildPhase::Other(phase.to_string()),
        }
    }

    /// Complete, Failed and Cancelled are terminal. Every other phase,
    /// including ones this crate does not know, counts as active.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BuildPhase::Complete | BuildPhase::Failed | BuildPhase::Cancelled
        )
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildPhase::New => "New",
            BuildPhase::Pending => "Pending",
            BuildPhase::Running => "Running",
            BuildPhase::Complete => "Complete",
            BuildPhase::Failed => "Failed",
            BuildPhase::Error => "Error",
            BuildPhase::Cancelled => "Cancelled",
            BuildPhase::Other(other) => other,
        };
        f.write_str(s)
    }
}

/// A single build instance as seen by the canceller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildResource {
    pub name: String,
    pub namespace: String,
    pub phase: BuildPhase,
    /// `status.cancelled` has already been set
    pub cancelled: bool,
    pub resource_version: Option<String>,
}

impl BuildResource {
    /// Create a build with the given phase and no cancel request
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, phase: &str) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: BuildPhase::parse(phase),
            cancelled: false,
            resource_version: None,
        }
    }

    /// The cancel capability, available only while the build is active
    /// and no cancellation has been requested yet
    pub fn as_cancelable(&self) -> Option<Cancelable> {
        if self.phase.is_terminal() || self.cancelled {
            return None;
        }

        Some(Cancelable {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            resource_version: self.resource_version.clone(),
        })
    }
}

impl From<&Build> for BuildResource {
    fn from(build: &Build) -> Self {
        let status = build.status.as_ref();
        let phase = status
            .and_then(|s| s.phase.as_deref())
            .map(BuildPhase::parse)
            .unwrap_or(BuildPhase::New);

        Self {
            name: build.name_any(),
            namespace: build.namespace().unwrap_or_default(),
            phase,
            cancelled: status.and_then(|s| s.cancelled).unwrap_or(false),
            resource_version: build.resource_version(),
        }
    }
}

/// Proof that a freshly read build may be cancelled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cancelable {
    pub name: String,
    pub namespace: String,
    /// Version observed at re-read; the cancel write is conditional on it
    pub resource_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parsing_ignores_case() {
        assert_eq!(BuildPhase::parse("FAILED"), BuildPhase::Failed);
        assert_eq!(BuildPhase::parse("complete"), BuildPhase::Complete);
        assert_eq!(BuildPhase::parse("Cancelled"), BuildPhase::Cancelled);
        assert_eq!(
            BuildPhase::parse("Queued"),
            BuildPhase::Other("Queued".to_string())
        );
    }

    #[test]
    fn only_three_phases_are_terminal() {
        for phase in ["Complete", "Failed", "Cancelled"] {
            assert!(BuildPhase::parse(phase).is_terminal(), "{phase}");
        }
        for phase in ["New", "Pending", "Running", "Error", "Queued", ""] {
            assert!(!BuildPhase::parse(phase).is_terminal(), "{phase}");
        }
    }

    #[test]
    fn cancel_capability_absent_for_terminal_or_already_cancelled() {
        assert!(BuildResource::new("app-1", "ci", "Running")
            .as_cancelable()
            .is_some());
        assert!(BuildResource::new("app-1", "ci", "Complete")
            .as_cancelable()
            .is_none());

        let mut requested = BuildResource::new("app-1", "ci", "Running");
        requested.cancelled = true;
        assert!(requested.as_cancelable().is_none());
    }

    #[test]
    fn build_resource_from_cluster_object() {
        let build: Build = serde_json::from_value(serde_json::json!({
            "apiVersion": "build.openshift.io/v1",
            "kind": "Build",
            "metadata": {
                "name": "app-7",
                "namespace": "ci",
                "resourceVersion": "4711"
            },
            "spec": {
                "serviceAccount": "builder",
                "output": { "to": { "kind": "ImageStreamTag", "name": "app:latest" } }
            },
            "status": { "phase": "Running" }
        }))
        .unwrap();

        let resource = BuildResource::from(&build);
        assert_eq!(resource.name, "app-7");
        assert_eq!(resource.namespace, "ci");
        assert_eq!(resource.phase, BuildPhase::Running);
        assert!(!resource.cancelled);
        assert_eq!(resource.resource_version.as_deref(), Some("4711"));

        let cancelable = resource.as_cancelable().unwrap();
        assert_eq!(cancelable.resource_version.as_deref(), Some("4711"));
    }
}
