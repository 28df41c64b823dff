//! Configuration for the host status probe subsystem

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Full configuration for the probe pipeline.
///
/// Covers both the options spec.md names directly (command templates,
/// markers, probed ports, development mode) and the worker/timing constants
/// it leaves as configuration values without fixing a source: bounded
/// runner concurrency/retries, TCP timeouts, ICMP worker count/deadline, and
/// the fast/slow refresh cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Command template invoked to query a host's power state, e.g.
    /// `"ipmitool -H {target} power status"`.
    pub power_status_template: String,
    /// TCP ports probed for liveness, in order, first positive wins.
    #[serde(default = "default_probe_ports")]
    pub probe_ports: Vec<u16>,
    /// Substring (case-insensitive) identifying a powered-on host in the
    /// power status command's output.
    pub power_on_marker: String,
    /// Substring (case-insensitive) identifying a powered-off host in the
    /// power status command's output.
    pub power_off_marker: String,
    /// When set, skips the Power/TCP/ICMP cascade: on the first probe cycle
    /// only, every reserved host is marked Up and every other host Off.
    #[serde(default)]
    pub devmode: bool,

    /// Bounded runner: max concurrent subprocess invocations.
    #[serde(default = "default_runner_concurrency")]
    pub runner_concurrency: usize,
    /// Bounded runner: retries per failed invocation.
    #[serde(default = "default_runner_retries")]
    pub runner_retries: u32,
    /// Timeout for a single power-status subprocess invocation.
    #[serde(default = "default_power_timeout_ms")]
    pub power_timeout_ms: u64,

    /// Per-dial TCP connect timeout.
    #[serde(default = "default_tcp_dial_timeout_ms")]
    pub tcp_dial_timeout_ms: u64,
    /// Overall timeout across all probed ports for one host.
    #[serde(default = "default_tcp_overall_timeout_ms")]
    pub tcp_overall_timeout_ms: u64,
    /// Max concurrent TCP probe workers.
    #[serde(default = "default_tcp_max_workers")]
    pub tcp_max_workers: usize,

    /// Max concurrent ICMP probe workers (one blocking socket each).
    #[serde(default = "default_icmp_max_workers")]
    pub icmp_max_workers: usize,
    /// Per-host ICMP echo reply deadline.
    #[serde(default = "default_icmp_timeout_ms")]
    pub icmp_timeout_ms: u64,

    /// Refresh period while activity keeps the manager in fast mode.
    #[serde(default = "default_fast_refresh_ms")]
    pub fast_refresh_ms: u64,
    /// Refresh period once the fast-mode dwell count is exhausted.
    #[serde(default = "default_slow_refresh_ms")]
    pub slow_refresh_ms: u64,
    /// Number of fast-mode refreshes granted after activity before falling
    /// back to the slow period.
    #[serde(default = "default_fast_refreshes")]
    pub fast_refreshes: u32,
    /// Delay before the very first probe cycle after startup.
    #[serde(default = "default_startup_delay_ms")]
    pub startup_delay_ms: u64,
}

fn default_probe_ports() -> Vec<u16> {
    vec![22]
}
fn default_runner_concurrency() -> usize {
    16
}
fn default_runner_retries() -> u32 {
    0
}
fn default_power_timeout_ms() -> u64 {
    5_000
}
fn default_tcp_dial_timeout_ms() -> u64 {
    1_000
}
fn default_tcp_overall_timeout_ms() -> u64 {
    3_000
}
fn default_tcp_max_workers() -> usize {
    64
}
fn default_icmp_max_workers() -> usize {
    64
}
fn default_icmp_timeout_ms() -> u64 {
    2_000
}
fn default_fast_refresh_ms() -> u64 {
    3_000
}
fn default_slow_refresh_ms() -> u64 {
    10_000
}
fn default_fast_refreshes() -> u32 {
    20
}
fn default_startup_delay_ms() -> u64 {
    10
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            power_status_template: String::new(),
            probe_ports: default_probe_ports(),
            power_on_marker: "PowerOn".to_string(),
            power_off_marker: "PowerOff".to_string(),
            devmode: false,
            runner_concurrency: default_runner_concurrency(),
            runner_retries: default_runner_retries(),
            power_timeout_ms: default_power_timeout_ms(),
            tcp_dial_timeout_ms: default_tcp_dial_timeout_ms(),
            tcp_overall_timeout_ms: default_tcp_overall_timeout_ms(),
            tcp_max_workers: default_tcp_max_workers(),
            icmp_max_workers: default_icmp_max_workers(),
            icmp_timeout_ms: default_icmp_timeout_ms(),
            fast_refresh_ms: default_fast_refresh_ms(),
            slow_refresh_ms: default_slow_refresh_ms(),
            fast_refreshes: default_fast_refreshes(),
            startup_delay_ms: default_startup_delay_ms(),
        }
    }
}

impl ProbeConfig {
    /// Load configuration from a TOML string, validating before returning.
    pub fn load_from_str(contents: &str) -> Result<Self> {
        let mut config: ProbeConfig = toml::from_str(contents)?;
        if config.probe_ports.is_empty() {
            config.probe_ports = default_probe_ports();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.power_timeout_ms == 0 {
            return Err(Error::Config(
                "power_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.tcp_dial_timeout_ms == 0 {
            return Err(Error::Config(
                "tcp_dial_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.tcp_overall_timeout_ms == 0 {
            return Err(Error::Config(
                "tcp_overall_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.tcp_dial_timeout_ms > self.tcp_overall_timeout_ms {
            return Err(Error::Config(
                "tcp_dial_timeout_ms cannot exceed tcp_overall_timeout_ms".to_string(),
            ));
        }
        if self.icmp_timeout_ms == 0 {
            return Err(Error::Config(
                "icmp_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.runner_retries > 10 {
            return Err(Error::Config("runner_retries cannot exceed 10".to_string()));
        }
        if self.runner_concurrency == 0 {
            return Err(Error::Config(
                "runner_concurrency must be greater than 0".to_string(),
            ));
        }
        if self.tcp_max_workers == 0 || self.icmp_max_workers == 0 {
            return Err(Error::Config(
                "tcp_max_workers and icmp_max_workers must be greater than 0".to_string(),
            ));
        }
        if self.fast_refresh_ms == 0 || self.slow_refresh_ms == 0 {
            return Err(Error::Config(
                "fast_refresh_ms and slow_refresh_ms must be greater than 0".to_string(),
            ));
        }
        if self.fast_refresh_ms > self.slow_refresh_ms {
            return Err(Error::Config(
                "fast_refresh_ms cannot exceed slow_refresh_ms".to_string(),
            ));
        }
        Ok(())
    }
}
