//! Adapters between the canceller and the cluster API
//!
//! The traits here are the seam the reconciliation loop is written
//! against; the `kube` implementations live alongside them.

mod builds;
mod connection;

pub use builds::*;
pub use connection::*;
