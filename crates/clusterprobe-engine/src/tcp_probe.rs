//! TCP Probe: dials the configured port set against the hosts still
//! candidate for liveness after the Power Probe, treating a successful
//! connect or an active refusal (RST) as "up".

use clusterprobe_core::{HostStatus, ProbeStatusMap};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace};

/// Dial one host across `ports`, stopping at the first positive outcome.
///
/// A successful connect or a "connection refused" error both count as up --
/// a RST proves a live TCP/IP stack even though nothing is listening on
/// that port. Every other error, and exhausting every port, counts as down.
async fn dial_host(ip: &str, ports: &[u16], dial_timeout: Duration) -> bool {
    let Ok(addr) = ip.parse() else {
        return false;
    };

    for &port in ports {
        let socket_addr = SocketAddr::new(addr, port);
        match timeout(dial_timeout, TcpStream::connect(socket_addr)).await {
            Ok(Ok(_stream)) => {
                trace!(host = %ip, port, "tcp probe: connected");
                return true;
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                trace!(host = %ip, port, "tcp probe: connection refused, counts as up");
                return true;
            }
            Ok(Err(e)) => {
                trace!(host = %ip, port, error = %e, "tcp probe: dial failed");
            }
            Err(_) => {
                trace!(host = %ip, port, "tcp probe: dial timed out");
            }
        }
    }
    false
}

/// Dial every host in `hosts` (the Power Probe's `On` subset) across
/// `ports`, bounded by `max_workers` worker tasks sharing a job queue, each
/// dial bounded by `dial_timeout` per port and `overall_timeout` per host.
/// Hosts without a known IP are skipped. Positive results are written into
/// both the authoritative and scratch maps as `Up`; negative hosts keep
/// whatever the scratch map already held (`On`).
pub async fn run(
    map: &ProbeStatusMap,
    hosts: &[String],
    ports: &[u16],
    dial_timeout: Duration,
    overall_timeout: Duration,
    max_workers: usize,
) {
    if hosts.is_empty() {
        return;
    }

    let ip_map = map.ip_map();
    let worker_count = max_workers.max(1).min(hosts.len());

    let (tx, rx) = mpsc::channel::<String>(hosts.len());
    for hostname in hosts {
        if ip_map.contains_key(hostname) {
            let _ = tx.send(hostname.clone()).await;
        } else {
            debug!(host = %hostname, "tcp probe: skipped, no known ip");
        }
    }
    drop(tx);

    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let results = Arc::new(tokio::sync::Mutex::new(HashMap::new()));
    let ports = Arc::new(ports.to_vec());

    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let rx = rx.clone();
        let results = results.clone();
        let ip_map = ip_map.clone();
        let ports = ports.clone();

        workers.push(tokio::spawn(async move {
            loop {
                let hostname = {
                    let mut rx = rx.lock().await;
                    match rx.recv().await {
                        Some(hostname) => hostname,
                        None => break,
                    }
                };

                let Some(ip) = ip_map.get(&hostname) else {
                    continue;
                };
                let up = timeout(overall_timeout, dial_host(ip, &ports, dial_timeout))
                    .await
                    .unwrap_or(false);
                if up {
                    results.lock().await.insert(hostname, HostStatus::Up);
                }
            }
        }));
    }

    for worker in workers {
        let _ = worker.await;
    }

    let classifications = Arc::try_unwrap(results)
        .map(tokio::sync::Mutex::into_inner)
        .unwrap_or_default();

    debug!(up = ?classifications.keys().collect::<Vec<_>>(), "tcp probe: classified hosts");
    map.apply(&classifications, |_| true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clusterprobe_core::{Host, ReservationState};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn open_port_counts_as_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let up = dial_host("127.0.0.1", &[port], Duration::from_millis(500)).await;
        assert!(up);
    }

    #[tokio::test]
    async fn connection_refused_counts_as_up() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let up = dial_host("127.0.0.1", &[port], Duration::from_millis(500)).await;
        assert!(up);
    }

    #[tokio::test]
    async fn unparseable_ip_counts_as_down() {
        let up = dial_host("not-an-ip", &[22], Duration::from_millis(100)).await;
        assert!(!up);
    }

    #[tokio::test]
    async fn run_writes_positive_hosts_into_authoritative_map() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let map = ProbeStatusMap::new();
        let hosts = vec![Host::new("h1", "127.0.0.1", ReservationState::Available)];
        map.rebuild(&hosts);

        run(
            &map,
            &["h1".to_string()],
            &[port],
            Duration::from_millis(500),
            Duration::from_secs(1),
            4,
        )
        .await;

        assert_eq!(map.get("h1"), Some(HostStatus::Up));
    }

    #[tokio::test]
    async fn empty_host_list_is_a_no_op() {
        let map = ProbeStatusMap::new();
        run(
            &map,
            &[],
            &[22],
            Duration::from_millis(100),
            Duration::from_secs(1),
            4,
        )
        .await;
        assert!(map.snapshot().is_empty());
    }

    #[tokio::test]
    async fn host_with_no_known_ip_is_skipped() {
        let map = ProbeStatusMap::new();
        let hosts = vec![Host::new("h1", "", ReservationState::Available)];
        map.rebuild(&hosts);

        run(
            &map,
            &["h1".to_string()],
            &[22],
            Duration::from_millis(100),
            Duration::from_secs(1),
            4,
        )
        .await;

        assert_eq!(map.get("h1"), Some(HostStatus::Unknown));
    }
}
