//! Core data model for the host status probe subsystem

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Where a host stands relative to the scheduler's reservation queue.
///
/// Ordered so that `state > Available` identifies a host currently held by
/// a reservation, matching the check the power/DEVMODE probes make against
/// the external inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReservationState {
    /// Free for new reservations.
    Available,
    /// Reserved but not yet in use.
    Reserved,
    /// Actively in use by a reservation.
    InUse,
}

/// A single cluster host as seen by the probe subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// DNS hostname, used as the key throughout the status maps.
    pub hostname: String,
    /// IP address used for TCP/ICMP probing. Empty if unknown.
    pub ip: String,
    /// Current reservation state, as reported by the inventory.
    pub reservation_state: ReservationState,
}

impl Host {
    pub fn new(hostname: impl Into<String>, ip: impl Into<String>, state: ReservationState) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
            reservation_state: state,
        }
    }

    /// True for hosts currently held by a reservation (power/devmode probes
    /// only ever promote these hosts to `Up`).
    pub fn is_reserved(&self) -> bool {
        self.reservation_state > ReservationState::Available
    }
}

/// Observed liveness/power state of a host.
///
/// Ordered from least to most "alive": a later probe stage may only promote
/// a host's status, never move it backwards, within a single probe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum HostStatus {
    /// No classification has been made yet, or the last probe cycle could
    /// not reach a verdict. Preserves whatever status preceded it.
    #[default]
    Unknown,
    /// Confirmed powered off.
    Off,
    /// Powered on (or assumed on), not yet confirmed reachable over the
    /// network. Normal during boot.
    On,
    /// Responds to ICMP echo but not to any probed TCP port — usually a
    /// firewall or service misconfiguration, not a dead host.
    Pingable,
    /// Confirmed reachable over TCP (including a refused connection, which
    /// still proves a live TCP/IP stack).
    Up,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Unknown => write!(f, "unknown"),
            HostStatus::Off => write!(f, "off"),
            HostStatus::On => write!(f, "on"),
            HostStatus::Pingable => write!(f, "pingable"),
            HostStatus::Up => write!(f, "up"),
        }
    }
}

/// The authoritative + scratch status maps and the host→IP map, behind a
/// single lock.
///
/// Every probe stage and the manager's promotion step touch all three maps
/// together; wrapping them in one type makes the single-mutex discipline a
/// property of the type rather than something every caller has to remember.
#[derive(Default)]
pub struct ProbeStatusMap {
    inner: Mutex<ProbeStatusMapInner>,
}

#[derive(Default)]
struct ProbeStatusMapInner {
    /// Status visible to external readers between probe cycles.
    status: HashMap<String, HostStatus>,
    /// Working map rebuilt at the start of every probe cycle.
    scratch: HashMap<String, HostStatus>,
    /// hostname -> IP, rebuilt whenever the cluster's host list changes.
    ip_by_host: HashMap<String, String>,
}

impl ProbeStatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the IP map and re-key the status map for a new host list,
    /// preserving existing status for hosts that are still present and
    /// initializing newly seen hosts to `Unknown`.
    pub fn rebuild(&self, hosts: &[Host]) {
        let mut inner = self.inner.lock();
        let mut status = HashMap::with_capacity(hosts.len());
        let mut ip_by_host = HashMap::with_capacity(hosts.len());
        for host in hosts {
            let prior = inner
                .status
                .get(&host.hostname)
                .copied()
                .unwrap_or_default();
            status.insert(host.hostname.clone(), prior);
            if !host.ip.is_empty() {
                ip_by_host.insert(host.hostname.clone(), host.ip.clone());
            }
        }
        inner.status = status;
        inner.ip_by_host = ip_by_host;
        inner.scratch.clear();
    }

    /// Reset the scratch map to `Unknown` for every currently tracked host,
    /// at the start of a probe cycle.
    pub fn reset_scratch(&self) {
        let mut inner = self.inner.lock();
        let keys: Vec<String> = inner.status.keys().cloned().collect();
        inner.scratch = keys.into_iter().map(|k| (k, HostStatus::Unknown)).collect();
    }

    /// hostname -> ip for every host that has a known IP.
    pub fn ip_map(&self) -> HashMap<String, String> {
        self.inner.lock().ip_by_host.clone()
    }

    /// Hostnames whose scratch status is currently `On` (the input set for
    /// the TCP probe, and for the ICMP probe after TCP runs).
    pub fn scratch_on_hosts(&self) -> Vec<String> {
        self.inner
            .lock()
            .scratch
            .iter()
            .filter(|(_, status)| **status == HostStatus::On)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Write classifications into the scratch map (and, for terminal
    /// results, into the authoritative map). `authoritative_filter` selects
    /// which classifications are promoted into the authoritative map
    /// immediately rather than waiting for end-of-cycle promotion.
    pub fn apply(
        &self,
        classifications: &HashMap<String, HostStatus>,
        authoritative_filter: impl Fn(HostStatus) -> bool,
    ) {
        let mut inner = self.inner.lock();
        for (name, status) in classifications {
            inner.scratch.insert(name.clone(), *status);
            if authoritative_filter(*status) {
                inner.status.insert(name.clone(), *status);
            }
        }
    }

    /// Promote any host still `On` in the scratch map into the
    /// authoritative map at the end of a probe cycle (hosts that nothing
    /// promoted further stay `On`, not `Unknown`).
    pub fn promote_scratch_on(&self) {
        let mut inner = self.inner.lock();
        let promotions: Vec<String> = inner
            .scratch
            .iter()
            .filter(|(_, s)| **s == HostStatus::On)
            .map(|(k, _)| k.clone())
            .collect();
        for name in promotions {
            inner.status.insert(name, HostStatus::On);
        }
    }

    /// Write directly into the authoritative map, bypassing the scratch
    /// map and the cascade (used by development mode's one-shot classify).
    pub fn set_authoritative(&self, classifications: &HashMap<String, HostStatus>) {
        let mut inner = self.inner.lock();
        for (name, status) in classifications {
            inner.status.insert(name.clone(), *status);
        }
    }

    /// Snapshot of the authoritative status map.
    pub fn snapshot(&self) -> HashMap<String, HostStatus> {
        self.inner.lock().status.clone()
    }

    pub fn get(&self, hostname: &str) -> Option<HostStatus> {
        self.inner.lock().status.get(hostname).copied()
    }
}
