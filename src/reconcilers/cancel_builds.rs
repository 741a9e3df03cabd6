//! Cancel OpenShift Builds reconciler
//!
//! Lists the builds of a namespace, picks the ones that belong to the
//! target build config and are still active, and cancels them one at a
//! time in list order.

use std::fmt;
use std::str::FromStr;

use tracing::{error, info, instrument, warn};

use crate::adapters::{BuildClient, ClusterConnector};
use crate::config::ReconciliationRequest;
use crate::error::Result;
use crate::reconcilers::{log_error_chain, ActionLog};
use crate::resources::BuildResource;

/// Name of the action as shown in the action log
pub const DISPLAY_NAME: &str = "Cancel OpenShift Builds";

/// Result of the build that triggered the action, best to worst
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildOutcome {
    Success,
    Unstable,
    Failure,
    NotBuilt,
    Aborted,
}

impl BuildOutcome {
    pub fn is_worse_than(self, other: BuildOutcome) -> bool {
        self > other
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildOutcome::Success => "SUCCESS",
            BuildOutcome::Unstable => "UNSTABLE",
            BuildOutcome::Failure => "FAILURE",
            BuildOutcome::NotBuilt => "NOT_BUILT",
            BuildOutcome::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

impl FromStr for BuildOutcome {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "success" => Ok(BuildOutcome::Success),
            "unstable" => Ok(BuildOutcome::Unstable),
            "failure" => Ok(BuildOutcome::Failure),
            "not_built" => Ok(BuildOutcome::NotBuilt),
            "aborted" => Ok(BuildOutcome::Aborted),
            other => Err(format!("unknown build result '{}'", other)),
        }
    }
}

/// Outcome of one run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub cancelled_count: usize,
    pub succeeded: bool,
}

impl ReconciliationResult {
    fn success(cancelled_count: usize) -> Self {
        Self {
            cancelled_count,
            succeeded: true,
        }
    }

    fn failure(cancelled_count: usize) -> Self {
        Self {
            cancelled_count,
            succeeded: false,
        }
    }
}

/// True when `build` belongs to the build config named `prefix` (literal
/// name prefix) and is not in a terminal phase
pub fn is_target(build: &BuildResource, prefix: &str) -> bool {
    build.name.starts_with(prefix) && !build.phase.is_terminal()
}

/// Re-read `build` and cancel the fresh copy.
///
/// Returns `Ok(None)` when the re-read build no longer accepts a cancel,
/// e.g. because it finished after it was listed.
pub async fn cancel_build<C>(client: &C, build: &BuildResource) -> Result<Option<BuildResource>>
where
    C: BuildClient + ?Sized,
{
    let current = client.get(&build.name, &build.namespace).await?;

    match current.as_cancelable() {
        Some(cancelable) => client.cancel(cancelable).await.map(Some),
        None => Ok(None),
    }
}

/// The "Cancel OpenShift Builds" action
#[derive(Clone, Debug)]
pub struct BuildCanceller {
    request: ReconciliationRequest,
}

impl BuildCanceller {
    pub fn new(request: ReconciliationRequest) -> Self {
        Self { request }
    }

    /// Run the action once.
    ///
    /// Connection and listing failures end the run before anything is
    /// cancelled. A failing cancel stops the run; builds already
    /// cancelled stay cancelled and are counted in the result.
    #[instrument(
        skip_all,
        fields(build_config = %self.request.target_config_name, namespace = %self.request.namespace)
    )]
    pub async fn run<K>(
        &self,
        connector: &K,
        log: &mut dyn ActionLog,
        outcome: Option<BuildOutcome>,
    ) -> ReconciliationResult
    where
        K: ClusterConnector + ?Sized,
    {
        let request = &self.request;
        let verbose = request.verbose;

        // The triggering build's result is reported but never gates the run
        if verbose {
            let shown = outcome.map_or_else(|| "unknown".to_string(), |o| o.to_string());
            match outcome {
                Some(o) if o.is_worse_than(BuildOutcome::Success) => {
                    log.line(&format!("Build did not succeed / result is {}", shown))
                }
                _ => log.line(&format!("Build succeeded / result is {}", shown)),
            }
        }

        log.line(&format!(
            "Starting the \"{}\" action for build config \"{}\" from the project \"{}\".",
            DISPLAY_NAME, request.target_config_name, request.namespace
        ));
        info!(outcome = ?outcome, "Starting build cancellation");

        let client = match connector
            .connect(&request.endpoint, &request.credential)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                error!(endpoint = %request.endpoint, error = %e, "Could not obtain a cluster client");
                log.line(&format!(
                    "Exiting \"{}\" unsuccessfully; a client connection to \"{}\" could not be obtained.",
                    DISPLAY_NAME, request.endpoint
                ));
                return ReconciliationResult::failure(0);
            }
        };

        let builds = match client.list(&request.namespace).await {
            Ok(builds) => builds,
            Err(e) => {
                error!(error = %e, "Listing builds failed");
                log_error_chain(log, &e);
                return ReconciliationResult::failure(0);
            }
        };
        info!(listed = builds.len(), "Listed builds");

        let mut count = 0;
        for build in builds
            .iter()
            .filter(|b| is_target(b, &request.target_config_name))
        {
            if verbose {
                log.line(&format!("Found active build \"{}\".", build.name));
            }

            match cancel_build(&client, build).await {
                Ok(Some(_)) => {
                    info!(build = %build.name, "Cancelled build");
                }
                Ok(None) => {
                    info!(build = %build.name, "Build finished before it could be cancelled");
                    if verbose {
                        log.line(&format!(
                            "Build \"{}\" had already finished when re-read.",
                            build.name
                        ));
                    }
                }
                Err(e) => {
                    warn!(
                        build = %build.name,
                        cancelled = count,
                        error = %e,
                        "Cancelling build failed, abandoning remaining builds"
                    );
                    log_error_chain(log, &e);
                    return ReconciliationResult::failure(count);
                }
            }

            log.line(&format!("  Cancelled build \"{}\".", build.name));
            count += 1;
        }

        log.line(&format!(
            "Exiting \"{}\" successfully with {} builds cancelled.",
            DISPLAY_NAME, count
        ));
        info!(cancelled = count, "Build cancellation finished");

        ReconciliationResult::success(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_literal_prefix() {
        let build = BuildResource::new("app-1", "ci", "Running");
        assert!(is_target(&build, "app"));
        assert!(is_target(&build, "app-1"));
        assert!(!is_target(&build, "ap*"));
        assert!(!is_target(&build, "other"));
        assert!(is_target(&build, ""));
    }

    #[test]
    fn terminal_builds_are_never_targets() {
        for phase in ["Complete", "Failed", "Cancelled", "FAILED", "complete", "CANCELLED"] {
            let build = BuildResource::new("app-1", "ci", phase);
            assert!(!is_target(&build, "app"), "{phase}");
        }
    }

    #[test]
    fn unknown_phases_are_active() {
        for phase in ["New", "Pending", "Running", "Error", "Queued"] {
            let build = BuildResource::new("app-1", "ci", phase);
            assert!(is_target(&build, "app"), "{phase}");
        }
    }

    #[test]
    fn outcome_ordering() {
        assert!(BuildOutcome::Failure.is_worse_than(BuildOutcome::Success));
        assert!(BuildOutcome::Unstable.is_worse_than(BuildOutcome::Success));
        assert!(!BuildOutcome::Success.is_worse_than(BuildOutcome::Success));
    }

    #[test]
    fn outcome_parsing() {
        assert_eq!("SUCCESS".parse::<BuildOutcome>(), Ok(BuildOutcome::Success));
        assert_eq!("not-built".parse::<BuildOutcome>(), Ok(BuildOutcome::NotBuilt));
        assert!("green".parse::<BuildOutcome>().is_err());
    }
}
