//! clusterprobe engine
//!
//! Command templating, subprocess execution, and the power/TCP/ICMP probe
//! cascade that keeps a cluster reservation server's view of host status
//! current.
//!
//! # Architecture
//!
//! - [`command_template`]: renders a configured command template into an
//!   argv for a target host, validating the target first.
//! - [`process_runner`]: runs a single argv under a timeout, capturing
//!   combined stdout+stderr.
//! - [`bounded_runner`]: runs an operation over many items with bounded
//!   concurrency and per-item retry.
//! - [`power_probe`]: classifies host power state from a command template's
//!   output.
//! - [`tcp_probe`]: classifies host liveness via a bounded TCP dial.
//! - [`icmp_probe`]: classifies host liveness via ICMP echo.
//! - [`probe_manager`]: drives the fast/slow adaptive probe loop.

pub mod bounded_runner;
pub mod command_template;
pub mod icmp_probe;
pub mod power_probe;
pub mod probe_manager;
pub mod process_runner;
pub mod tcp_probe;

pub use bounded_runner::run_all;
pub use command_template::{render, validate_target};
pub use probe_manager::{spawn, HostInventory, ProbeManagerHandle};
pub use process_runner::run;
