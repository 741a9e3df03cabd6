//! Cluster resource types handled by the canceller

mod build;

pub use build::*;
