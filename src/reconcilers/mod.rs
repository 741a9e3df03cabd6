//! Reconcilers for build resources
//!
//! This module contains the business logic of the canceller:
//! - Deciding which builds are still active for a build config
//! - Re-reading and cancelling each of them
//! - Reporting the run to the action log

mod action_log;
pub mod cancel_builds;

pub use action_log::*;
pub use cancel_builds::{
    cancel_build, is_target, BuildCanceller, BuildOutcome, ReconciliationResult, DISPLAY_NAME,
};
