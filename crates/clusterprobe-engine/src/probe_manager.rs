//! Probe Manager: the adaptive scheduler that sequences Power -> TCP -> ICMP
//! each tick, owns the status maps, and reacts to external signals.

use crate::{icmp_probe, power_probe, tcp_probe};
use clusterprobe_core::{Host, HostStatus, ProbeConfig, ProbeStatusMap};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Supplies the current cluster inventory. Implemented by whatever owns the
/// reservation/persistence layer; the probe subsystem only ever reads it.
#[async_trait::async_trait]
pub trait HostInventory: Send + Sync {
    /// All hosts currently known to the cluster.
    async fn read_hosts(&self) -> Vec<Host>;

    /// Hosts currently held by a reservation, used only in development mode.
    async fn reserved_hosts(&self) -> Vec<Host> {
        self.read_hosts()
            .await
            .into_iter()
            .filter(|h| h.is_reserved())
            .collect()
    }
}

/// Handles used to signal the manager from the rest of the server.
pub struct ProbeManagerHandle {
    pub shutdown: mpsc::Sender<()>,
    pub cluster_update: mpsc::Sender<()>,
    pub activity: mpsc::Sender<()>,
}

/// Spawn the manager as a long-lived task. Returns the signal handles and a
/// shared reference to the status map the rest of the server reads from.
pub fn spawn(
    config: ProbeConfig,
    inventory: Arc<dyn HostInventory>,
) -> (ProbeManagerHandle, Arc<ProbeStatusMap>) {
    let map = Arc::new(ProbeStatusMap::new());
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let (cluster_update_tx, cluster_update_rx) = mpsc::channel(1);
    let (activity_tx, activity_rx) = mpsc::channel(1);

    let handle = ProbeManagerHandle {
        shutdown: shutdown_tx,
        cluster_update: cluster_update_tx,
        activity: activity_tx,
    };

    tokio::spawn(run(
        config,
        inventory,
        map.clone(),
        shutdown_rx,
        cluster_update_rx,
        activity_rx,
    ));

    (handle, map)
}

async fn run(
    config: ProbeConfig,
    inventory: Arc<dyn HostInventory>,
    map: Arc<ProbeStatusMap>,
    mut shutdown_rx: mpsc::Receiver<()>,
    mut cluster_update_rx: mpsc::Receiver<()>,
    mut activity_rx: mpsc::Receiver<()>,
) {
    let hosts = inventory.read_hosts().await;
    map.rebuild(&hosts);

    let mut fast_refreshes = config.fast_refreshes;
    let mut devmode_ticked = false;

    let mut timer = Box::pin(time::sleep(Duration::from_millis(config.startup_delay_ms)));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("probe manager: shutting down");
                return;
            }
            _ = cluster_update_rx.recv() => {
                let hosts = inventory.read_hosts().await;
                map.rebuild(&hosts);
                debug!(count = hosts.len(), "probe manager: cluster updated");
            }
            _ = activity_rx.recv() => {
                let was_slow = fast_refreshes == 0;
                fast_refreshes = config.fast_refreshes;
                if was_slow {
                    timer = Box::pin(time::sleep(Duration::from_millis(config.startup_delay_ms)));
                    debug!("probe manager: activity observed, scheduling immediate tick");
                }
            }
            _ = &mut timer => {
                let period = if fast_refreshes == 0 {
                    Duration::from_millis(config.slow_refresh_ms)
                } else {
                    fast_refreshes -= 1;
                    Duration::from_millis(config.fast_refresh_ms)
                };

                if config.devmode {
                    if !devmode_ticked {
                        devmode_tick(&inventory, &map).await;
                        devmode_ticked = true;
                    }
                } else {
                    tick(&config, &map).await;
                }

                timer = Box::pin(time::sleep_until(Instant::now() + period));
            }
        }
    }
}

/// One full Power -> TCP -> ICMP cascade over the current host list.
async fn tick(config: &ProbeConfig, map: &ProbeStatusMap) {
    map.reset_scratch();

    // The power probe runs on every tracked host, including ones with no
    // known IP: the template is rendered against the hostname, not the
    // data-plane address. `ip_map()` only supplies the IP where known.
    let ip_map = map.ip_map();
    let hosts: Vec<Host> = map
        .snapshot()
        .into_keys()
        .map(|hostname| {
            let ip = ip_map.get(&hostname).cloned().unwrap_or_default();
            Host::new(hostname, ip, clusterprobe_core::ReservationState::Available)
        })
        .collect();

    power_probe::run(
        map,
        &hosts,
        &power_probe::PowerProbeOptions {
            template: &config.power_status_template,
            power_on_marker: &config.power_on_marker,
            power_off_marker: &config.power_off_marker,
            timeout: Duration::from_millis(config.power_timeout_ms),
            concurrency: config.runner_concurrency,
            retries: config.runner_retries,
        },
    )
    .await;

    let on_after_power = map.scratch_on_hosts();
    tcp_probe::run(
        map,
        &on_after_power,
        &config.probe_ports,
        Duration::from_millis(config.tcp_dial_timeout_ms),
        Duration::from_millis(config.tcp_overall_timeout_ms),
        config.tcp_max_workers,
    )
    .await;

    let on_after_tcp = map.scratch_on_hosts();
    icmp_probe::run(
        map,
        &on_after_tcp,
        Duration::from_millis(config.icmp_timeout_ms),
        config.icmp_max_workers,
    )
    .await;

    map.promote_scratch_on();
}

/// Development mode's one-shot classify: skip the cascade entirely, mark
/// every reserved host `Up` and every other host `Off`, once.
async fn devmode_tick(inventory: &Arc<dyn HostInventory>, map: &ProbeStatusMap) {
    let hosts = inventory.read_hosts().await;
    let mut classifications = HashMap::with_capacity(hosts.len());
    for host in &hosts {
        let status = if host.is_reserved() {
            HostStatus::Up
        } else {
            HostStatus::Off
        };
        classifications.insert(host.hostname.clone(), status);
    }
    debug!(count = classifications.len(), "probe manager: devmode one-shot classify");
    map.set_authoritative(&classifications);
}
