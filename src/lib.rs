//! Type-safe async Rust client for real-time motion-tracking controllers.
//!
//! Tracklink decodes the controller's ASCII tracking datagrams into typed
//! per-entity pose snapshots and exchanges DTrack2/DTrack3 command strings
//! over a persistent TCP connection.
//!
//! # Features
//!
//! - **Freshest-sample delivery**: a consumer always observes the most
//!   recently arrived datagram, never blocks past its deadline, and close
//!   is cleanly cancellable
//! - **Typed snapshots**: bodies, Flysticks, measurement tools and
//!   references, hands, human models, hybrid bodies and single markers
//! - **Command protocol**: parameter get/set, measurement control, event
//!   messages and tactile feedback
//! - **Offline replay**: feed captured packets through the same decode path
//!   without a network
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tracklink::Tracklink;
//!
//! #[tokio::main]
//! async fn main() -> tracklink::Result<()> {
//!     let mut session = Tracklink::connect("controller.local", 5000).await?;
//!     session.start_measurement().await;
//!
//!     loop {
//!         if session.receive().await {
//!             for body in &session.snapshot().bodies {
//!                 if body.is_tracked() {
//!                     println!("body {} at {:?}", body.id, body.loc);
//!                 }
//!             }
//!         }
//!     }
//! }
//! ```

mod error;
mod session;

// Wire protocol and network channels
pub mod net;
mod protocol;
pub mod types;

// Core exports
pub use error::{DataError, Result, ServerError, TrackError};
pub use session::{ControllerMessage, Session};
pub use types::*;

// Channel exports
pub use net::{CommandChannel, DataChannel, Response};

use std::net::Ipv4Addr;

/// Unified entry point for tracking sessions.
///
/// This factory provides a consistent API for creating sessions in the
/// three controller modes: pure listening, multicast listening, and
/// communicating.
///
/// # Examples
///
/// ## Pure listening
/// ```rust,no_run
/// use tracklink::Tracklink;
///
/// #[tokio::main]
/// async fn main() -> tracklink::Result<()> {
///     let mut session = Tracklink::listen(5000).await?;
///     session.receive().await;
///     Ok(())
/// }
/// ```
///
/// ## Communicating with a controller
/// ```rust,no_run
/// use tracklink::Tracklink;
///
/// #[tokio::main]
/// async fn main() -> tracklink::Result<()> {
///     let mut session = Tracklink::connect("192.168.0.1", 5000).await?;
///     session.start_measurement().await;
///     Ok(())
/// }
/// ```
pub struct Tracklink;

impl Tracklink {
    /// Pure listening mode: receive tracking data on `data_port` without a
    /// controller connection. Measurement must be started externally.
    /// Port 0 lets the OS choose; query it with
    /// [`Session::data_port`].
    ///
    /// # Errors
    ///
    /// Returns an error if the UDP socket cannot be bound.
    pub async fn listen(data_port: u16) -> Result<Session> {
        Session::listen(data_port).await
    }

    /// Multicast listening mode: join `group` and receive tracking data on
    /// `data_port`, sharing the stream with other listeners on this host.
    ///
    /// # Errors
    ///
    /// Returns an error if `group` is not a multicast address or the
    /// socket cannot be set up.
    pub async fn multicast(group: Ipv4Addr, data_port: u16) -> Result<Session> {
        Session::multicast(group, data_port).await
    }

    /// Communicating mode: connect to the controller's command port and
    /// receive tracking data on `data_port`. Measurement can be started
    /// and stopped through the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be resolved, the command
    /// connection fails, or the UDP socket cannot be bound. A session is
    /// never half-connected: command failures here are hard errors, not a
    /// silent fallback to listening mode.
    pub async fn connect(host: &str, data_port: u16) -> Result<Session> {
        Session::connect(host, data_port).await
    }

    /// Communicating mode with an explicit command port, for controllers
    /// reached through port forwarding.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Tracklink::connect`].
    pub async fn connect_to(
        host: &str,
        command_port: u16,
        data_port: u16,
    ) -> Result<Session> {
        Session::connect_to(host, command_port, data_port).await
    }
}
