//! Core types, error handling, configuration, and retry policy for the
//! cluster host status probe subsystem.
//!
//! # Examples
//!
//! ```
//! use clusterprobe_core::{Host, HostStatus, ProbeStatusMap, ReservationState};
//!
//! let map = ProbeStatusMap::new();
//! let hosts = vec![Host::new("node01", "10.0.0.1", ReservationState::InUse)];
//! map.rebuild(&hosts);
//! assert_eq!(map.get("node01"), Some(HostStatus::Unknown));
//! ```

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::ProbeConfig;
pub use error::{Error, Result};
pub use retry::{retry_with_backoff, RetryConfig};
pub use types::{Host, HostStatus, ProbeStatusMap, ReservationState};
