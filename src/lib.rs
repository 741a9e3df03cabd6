//! OpenShift build canceller
//!
//! Post-build action that cancels every build of a build config that is
//! still active in an OpenShift project.

pub mod adapters;
pub mod config;
pub mod error;
pub mod reconcilers;
pub mod resources;

pub use error::{Error, Result};
