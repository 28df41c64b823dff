//! ICMP Probe: one ICMP Echo socket per worker (not per host), matched by
//! (identifier, sequence) plus peer address, with a raw-socket-first,
//! unprivileged-UDP-fallback strategy.

use clusterprobe_core::{Error, HostStatus, ProbeStatusMap, Result};
use pnet::packet::icmp::echo_reply::EchoReplyPacket;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{checksum, IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use socket2::{Domain, Protocol, Type};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::os::unix::io::{FromRawFd, IntoRawFd};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

const ICMP_HEADER_SIZE: usize = 8;
const PAYLOAD_TAG: &[u8] = b"clusterprobe";

/// Whether a worker's socket is a raw IPv4 socket (replies carry a leading
/// IP header) or the unprivileged UDP-wrapped fallback (replies are the bare
/// ICMP payload, and the kernel rewrites the echo identifier to the local
/// UDP port).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketKind {
    Raw,
    Udp,
}

struct IcmpSocket {
    inner: UdpSocket,
    kind: SocketKind,
}

impl IcmpSocket {
    /// Open a raw ICMP socket; if that fails (insufficient privileges), fall
    /// back to an unprivileged UDP-wrapped ICMP socket. Returns
    /// `SocketUnavailable` only if both attempts fail.
    fn open() -> Result<Self> {
        match Self::open_kind(Domain::IPV4, Type::RAW, Protocol::ICMPV4, SocketKind::Raw) {
            Ok(socket) => Ok(socket),
            Err(raw_err) => {
                debug!(error = %raw_err, "raw icmp socket unavailable, trying udp fallback");
                Self::open_kind(Domain::IPV4, Type::DGRAM, Protocol::ICMPV4, SocketKind::Udp)
                    .map_err(|udp_err| {
                        Error::SocketUnavailable(format!(
                            "raw socket failed ({raw_err}), udp fallback failed ({udp_err})"
                        ))
                    })
            }
        }
    }

    fn open_kind(
        domain: Domain,
        ty: Type,
        protocol: Protocol,
        kind: SocketKind,
    ) -> std::io::Result<Self> {
        let socket = socket2::Socket::new(domain, ty, Some(protocol))?;
        socket.set_nonblocking(true)?;
        let inner = UdpSocket::from_std(unsafe {
            std::net::UdpSocket::from_raw_fd(socket.into_raw_fd())
        })?;
        Ok(Self { inner, kind })
    }

    /// The 16-bit identifier this socket's replies will actually carry: the
    /// process ID for a raw socket, the local UDP port for the fallback
    /// (the kernel rewrites the echo ID to the port on DGRAM ICMP sockets).
    fn effective_id(&self) -> u16 {
        match self.kind {
            SocketKind::Raw => std::process::id() as u16,
            SocketKind::Udp => self
                .inner
                .local_addr()
                .map(|addr| addr.port())
                .unwrap_or(0),
        }
    }

    async fn send_echo(&self, target: Ipv4Addr, ident: u16, seq: u16, hostname: &str) -> Result<()> {
        let mut payload = Vec::with_capacity(PAYLOAD_TAG.len() + hostname.len());
        payload.extend_from_slice(PAYLOAD_TAG);
        payload.extend_from_slice(hostname.as_bytes());

        let mut buf = vec![0u8; ICMP_HEADER_SIZE + payload.len()];
        let mut packet =
            MutableEchoRequestPacket::new(&mut buf).ok_or_else(|| Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "buffer too small for echo request",
            )))?;
        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(IcmpCode(0));
        packet.set_identifier(ident);
        packet.set_sequence_number(seq);
        packet.set_payload(&payload);
        let checksum = checksum(&IcmpPacket::new(packet.packet()).ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "malformed icmp packet",
            ))
        })?);
        packet.set_checksum(checksum);

        let dest = SocketAddr::new(IpAddr::V4(target), 0);
        self.inner.send_to(&buf, dest).await?;
        Ok(())
    }

    /// Receive one datagram and, if it is a matching Echo Reply from
    /// `target` with identifier `ident` and sequence `seq`, return `true`.
    /// Any other packet (wrong peer, wrong type, wrong id/seq, malformed) is
    /// ignored -- the caller keeps reading until its deadline.
    async fn recv_matching(&self, target: Ipv4Addr, ident: u16, seq: u16) -> Option<bool> {
        let mut buf = [0u8; 1024];
        let (n, peer) = self.inner.recv_from(&mut buf).await.ok()?;

        let IpAddr::V4(peer_ip) = peer.ip() else {
            return None;
        };
        if peer_ip != target {
            trace!(peer = %peer_ip, target = %target, "icmp probe: reply from unrelated peer, ignoring");
            return None;
        }

        let body = match self.kind {
            SocketKind::Raw => Ipv4Packet::new(&buf[..n])?.payload().to_vec(),
            SocketKind::Udp => buf[..n].to_vec(),
        };

        let reply = EchoReplyPacket::new(&body)?;
        if reply.get_icmp_type() != IcmpTypes::EchoReply {
            return None;
        }
        if reply.get_identifier() != ident || reply.get_sequence_number() != seq {
            trace!("icmp probe: reply id/seq mismatch, ignoring");
            return None;
        }

        Some(true)
    }
}

/// Ping `target` once over `socket`, returning true on a matching reply
/// before `deadline`.
async fn ping_once(socket: &IcmpSocket, target: Ipv4Addr, hostname: &str, seq: u16, deadline: Duration) -> bool {
    let ident = socket.effective_id();
    if socket.send_echo(target, ident, seq, hostname).await.is_err() {
        return false;
    }

    let start = Instant::now();
    loop {
        let remaining = deadline.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return false;
        }
        match timeout(remaining, socket.recv_matching(target, ident, seq)).await {
            Ok(Some(true)) => return true,
            Ok(Some(false)) | Ok(None) => continue,
            Err(_) => return false,
        }
    }
}

/// ICMP-probe every host in `hosts` (the scratch-`On` subset remaining after
/// TCP), bounded by `max_workers` sockets, each socket serving a share of
/// the job queue with a per-host deadline of `per_host_timeout`. Successful
/// targets are promoted to `Pingable` in both the scratch and authoritative
/// maps.
pub async fn run(
    map: &ProbeStatusMap,
    hosts: &[String],
    per_host_timeout: Duration,
    max_workers: usize,
) {
    if hosts.is_empty() {
        return;
    }

    let ip_map = map.ip_map();
    let worker_count = max_workers.max(1).min(hosts.len());

    let (tx, rx) = mpsc::channel::<String>(hosts.len());
    for host in hosts {
        let _ = tx.send(host.clone()).await;
    }
    drop(tx);

    let rx = Arc::new(tokio::sync::Mutex::new(rx));
    let results = Arc::new(tokio::sync::Mutex::new(HashMap::new()));
    let seq_counter = Arc::new(AtomicU16::new(0));

    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let rx = rx.clone();
        let results = results.clone();
        let ip_map = ip_map.clone();
        let seq_counter = seq_counter.clone();

        workers.push(tokio::spawn(async move {
            let socket = match IcmpSocket::open() {
                Ok(socket) => socket,
                Err(e) => {
                    warn!(error = %e, "icmp probe: worker draining queue without a socket");
                    let mut rx = rx.lock().await;
                    while rx.recv().await.is_some() {}
                    return;
                }
            };

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
                let Ok(IpAddr::V4(target)) = ip.parse::<IpAddr>() else {
                    continue;
                };

                let seq = seq_counter.fetch_add(1, Ordering::Relaxed);
                let up = ping_once(&socket, target, &hostname, seq, per_host_timeout).await;
                if up {
                    results.lock().await.insert(hostname, HostStatus::Pingable);
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

    debug!(pingable = ?classifications.keys().collect::<Vec<_>>(), "icmp probe: classified hosts");
    map.apply(&classifications, |_| true);
}
