//! Latest-packet channel: UDP receiver with a single-slot mailbox.
//!
//! Tracking datagrams arrive at the controller's measurement rate while the
//! consumer polls at its own pace. The channel runs one background receive
//! task per open socket and keeps at most one pending payload: every arrival
//! overwrites the slot (last-write-wins, no queue, no backpressure), so a
//! consumer is never handed a datagram older than one it has already seen.
//!
//! Guarantees:
//!
//! - at most one buffered payload,
//! - no payload delivered twice,
//! - a payload may be silently superseded and never observed; this is
//!   freshest-sample delivery, not reliable delivery.
//!
//! Closing the channel actively unblocks a waiting consumer instead of
//! letting it run out its timeout.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, TrackError};

/// Default receive buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 32768;

/// Lifecycle of the receive task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unstarted,
    Running,
    Terminated,
}

#[derive(Debug)]
struct Lifecycle {
    phase: Phase,
    cancel: CancellationToken,
}

/// State shared between the receive task and the consumer. The slot is the
/// only data both sides touch; it is guarded by one mutex per channel.
#[derive(Debug, Default)]
struct Mailbox {
    slot: Mutex<Option<String>>,
    wakeup: Notify,
}

/// UDP channel delivering the freshest tracking datagram on demand.
#[derive(Debug)]
pub struct DataChannel {
    socket: Arc<UdpSocket>,
    mailbox: Arc<Mailbox>,
    lifecycle: Mutex<Lifecycle>,
}

impl DataChannel {
    /// Bind a plain UDP receive socket. Port 0 lets the OS choose.
    pub async fn bind(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|e| TrackError::network_with_source("can't create UDP socket", e))?;

        Ok(Self::from_socket(socket))
    }

    /// Bind a multicast receive socket: address reuse plus group join, so
    /// several listeners on one host can share the tracking stream.
    pub async fn multicast(group: Ipv4Addr, port: u16) -> Result<Self> {
        if !group.is_multicast() {
            return Err(TrackError::network(format!("{group} is not a multicast address")));
        }

        let raw = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )
        .map_err(|e| TrackError::network_with_source("can't create multicast UDP socket", e))?;
        raw.set_reuse_address(true)
            .map_err(|e| TrackError::network_with_source("can't set address reuse", e))?;
        raw.set_nonblocking(true)
            .map_err(|e| TrackError::network_with_source("can't configure multicast socket", e))?;
        let bind_addr: SocketAddr = (Ipv4Addr::UNSPECIFIED, port).into();
        raw.bind(&bind_addr.into())
            .map_err(|e| TrackError::network_with_source("can't bind multicast UDP socket", e))?;

        let socket = UdpSocket::from_std(raw.into())
            .map_err(|e| TrackError::network_with_source("can't register multicast socket", e))?;
        socket
            .join_multicast_v4(group, Ipv4Addr::UNSPECIFIED)
            .map_err(|e| TrackError::network_with_source("can't join multicast group", e))?;

        Ok(Self::from_socket(socket))
    }

    fn from_socket(socket: UdpSocket) -> Self {
        Self {
            socket: Arc::new(socket),
            mailbox: Arc::new(Mailbox::default()),
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::Unstarted,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Locally bound UDP port.
    pub fn port(&self) -> u16 {
        self.socket.local_addr().map(|a| a.port()).unwrap_or(0)
    }

    /// Whether the receive task is currently running.
    pub fn is_running(&self) -> bool {
        let lifecycle = self.lifecycle.lock().unwrap();
        lifecycle.phase == Phase::Running && !lifecycle.cancel.is_cancelled()
    }

    /// Start the background receive task. Idempotent while running; after
    /// a terminate, a fresh task is spawned.
    pub fn start(&self, buffer_size: usize) {
        let mut lifecycle = self.lifecycle.lock().unwrap();
        if lifecycle.phase == Phase::Running && !lifecycle.cancel.is_cancelled() {
            return;
        }

        let cancel = CancellationToken::new();
        lifecycle.cancel = cancel.clone();
        lifecycle.phase = Phase::Running;

        let socket = Arc::clone(&self.socket);
        let mailbox = Arc::clone(&self.mailbox);
        let size = if buffer_size == 0 { DEFAULT_BUFFER_SIZE } else { buffer_size };
        tokio::spawn(async move {
            Self::receive_task(socket, mailbox, cancel, size).await;
        });
    }

    /// Background receive loop: overwrite the mailbox on every datagram and
    /// wake a waiting consumer.
    async fn receive_task(
        socket: Arc<UdpSocket>,
        mailbox: Arc<Mailbox>,
        cancel: CancellationToken,
        buffer_size: usize,
    ) {
        debug!(port = socket.local_addr().map(|a| a.port()).unwrap_or(0), "receive task started");
        let mut buf = vec![0u8; buffer_size];

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("receive task cancelled");
                    break;
                }
                received = socket.recv_from(&mut buf) => received,
            };

            match received {
                Ok((len, _source)) => {
                    let payload = String::from_utf8_lossy(&buf[..len]).into_owned();
                    *mailbox.slot.lock().unwrap() = Some(payload);
                    mailbox.wakeup.notify_one();
                }
                Err(e) => {
                    warn!(error = %e, "UDP receive failed, stopping receive task");
                    break;
                }
            }
        }
    }

    /// Take the freshest pending datagram, waiting up to `timeout` for one
    /// to arrive. The slot is left empty: no payload is delivered twice.
    ///
    /// A timeout and a channel closed mid-wait are both "no data", reported
    /// as the distinguishable [`TrackError::Timeout`] and
    /// [`TrackError::ChannelClosed`].
    pub async fn take_latest(&self, timeout: Duration) -> Result<String> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Arm the wakeup before inspecting the slot, so a write between
            // the check and the wait is not lost.
            let notified = self.mailbox.wakeup.notified();

            if let Some(payload) = self.mailbox.slot.lock().unwrap().take() {
                return Ok(payload);
            }

            let cancel = self.lifecycle.lock().unwrap().cancel.clone();
            if cancel.is_cancelled() {
                return Err(TrackError::ChannelClosed);
            }

            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(TrackError::ChannelClosed),
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(TrackError::Timeout { duration: timeout });
                }
            }
        }
    }

    /// Fire-and-forget single-datagram write to an explicit destination,
    /// used for out-of-band commands. Errors are reported synchronously;
    /// there is no retry.
    pub async fn send(&self, dest: SocketAddr, payload: &[u8]) -> Result<()> {
        self.socket
            .send_to(payload, dest)
            .await
            .map_err(|e| TrackError::network_with_source("can't send UDP data", e))?;
        Ok(())
    }

    /// Stop the receive task and wake any waiting consumer immediately.
    pub fn terminate(&self) {
        {
            let mut lifecycle = self.lifecycle.lock().unwrap();
            lifecycle.cancel.cancel();
            lifecycle.phase = Phase::Terminated;
        }
        self.mailbox.wakeup.notify_waiters();
    }
}

impl Drop for DataChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}
