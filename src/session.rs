//! Session: the library's main entry point.
//!
//! A session owns the frame decoder with its snapshot, the UDP data
//! channel, and (in communicating mode) the TCP command channel. The data
//! path is poll-style: `receive()` returns `true` when a fresh frame was
//! decoded and `false` otherwise, with the failure category queryable from
//! the sticky last-error accessors. No expected failure mode crosses the
//! call boundary as a panic.
//!
//! ```rust,no_run
//! use tracklink::Tracklink;
//!
//! #[tokio::main]
//! async fn main() -> tracklink::Result<()> {
//!     let mut session = Tracklink::listen(5000).await?;
//!     loop {
//!         if session.receive().await {
//!             let snapshot = session.snapshot();
//!             println!("frame {}: {} bodies", snapshot.frame_counter, snapshot.bodies.len());
//!         }
//!     }
//! }
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{DataError, Result, ServerError, TrackError};
use crate::net::{CommandChannel, DataChannel, Response};
use crate::protocol::FrameDecoder;
use crate::types::FrameSnapshot;

/// Controller port (TCP) for command strings.
const CONTROLLER_COMMAND_PORT: u16 = 50105;
/// Controller port (UDP) for tactile-feedback commands.
const CONTROLLER_TACTILE_PORT: u16 = 50110;

/// Default timeout waiting for a tracking datagram.
const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default timeout waiting for a command reply.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(10000);

/// Event message fetched from the controller via `getmsg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerMessage {
    /// Originating controller component.
    pub origin: String,
    /// Severity word (e.g. `info`, `warning`, `error`).
    pub status: String,
    /// Frame counter at which the event occurred.
    pub frame: u32,
    /// Controller error id.
    pub error_id: u32,
    /// Human-readable message text.
    pub message: String,
}

/// Client session for one tracking controller.
///
/// Create one via [`Tracklink`](crate::Tracklink). The session is a
/// single-consumer object: `receive` and `process_packet` take `&mut self`,
/// which makes concurrent decoding on one session unrepresentable.
#[derive(Debug)]
pub struct Session {
    decoder: FrameDecoder,
    data: DataChannel,
    command: Option<CommandChannel>,
    controller_ip: Option<IpAddr>,

    data_timeout: Duration,
    command_timeout: Duration,
    buffer_size: usize,

    last_packet: Option<String>,
    last_data_error: DataError,
    last_server_error: ServerError,
    last_controller_error: (i32, String),
}

impl Session {
    /// Pure listening mode: UDP receiver only, no command channel.
    /// Measurement must be started externally.
    pub(crate) async fn listen(data_port: u16) -> Result<Self> {
        let data = DataChannel::bind(data_port).await?;
        Ok(Self::assemble(data, None, None))
    }

    /// Multicast listening mode.
    pub(crate) async fn multicast(group: Ipv4Addr, data_port: u16) -> Result<Self> {
        let data = DataChannel::multicast(group, data_port).await?;
        Ok(Self::assemble(data, None, None))
    }

    /// Communicating mode on the standard controller command port.
    pub(crate) async fn connect(host: &str, data_port: u16) -> Result<Self> {
        Self::connect_to(host, CONTROLLER_COMMAND_PORT, data_port).await
    }

    /// Communicating mode: UDP receiver plus a TCP command connection to
    /// the controller. Unlike listening mode, an unreachable controller is
    /// a hard error here.
    pub(crate) async fn connect_to(
        host: &str,
        command_port: u16,
        data_port: u16,
    ) -> Result<Self> {
        let addr = tokio::net::lookup_host((host, command_port))
            .await
            .map_err(|e| TrackError::network_with_source("can't resolve controller host", e))?
            .next()
            .ok_or_else(|| TrackError::network(format!("no address for host {host}")))?;

        let command = CommandChannel::connect(addr, DEFAULT_COMMAND_TIMEOUT).await?;
        let data = DataChannel::bind(data_port).await?;
        Ok(Self::assemble(data, Some(command), Some(addr.ip())))
    }

    fn assemble(
        data: DataChannel,
        command: Option<CommandChannel>,
        controller_ip: Option<IpAddr>,
    ) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            data,
            command,
            controller_ip,
            data_timeout: DEFAULT_DATA_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            buffer_size: crate::net::data::DEFAULT_BUFFER_SIZE,
            last_packet: None,
            last_data_error: DataError::None,
            last_server_error: ServerError::None,
            last_controller_error: (0, String::new()),
        }
    }

    // --- data path ---------------------------------------------------------

    /// Receive and decode one tracking datagram, waiting no longer than the
    /// data timeout.
    ///
    /// Returns `true` when the snapshot was updated from a fresh datagram.
    /// On `false` the snapshot is untouched (except for any partial
    /// mutation of a malformed packet's own lines) and
    /// [`last_data_error`](Self::last_data_error) holds the category.
    pub async fn receive(&mut self) -> bool {
        self.last_data_error = DataError::None;

        // Lazy start keeps pure listening sessions usable without an
        // explicit start_measurement call.
        if !self.data.is_running() {
            self.data.start(self.buffer_size);
        }

        match self.data.take_latest(self.data_timeout).await {
            Ok(payload) => {
                let decoded = self.decoder.decode_packet(&payload);
                self.last_packet = Some(payload);
                match decoded {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(error = %e, "datagram decode failed");
                        self.last_data_error = DataError::Parse;
                        false
                    }
                }
            }
            Err(TrackError::Timeout { .. }) => {
                self.last_data_error = DataError::Timeout;
                false
            }
            Err(e) => {
                debug!(error = %e, "datagram receive failed");
                self.last_data_error = DataError::Network;
                false
            }
        }
    }

    /// Decode a caller-supplied packet, bypassing the network (offline
    /// replay and testing). Any well-formed non-empty payload is accepted.
    pub fn process_packet(&mut self, data: &str) -> bool {
        self.last_data_error = DataError::None;

        if data.is_empty() {
            self.last_data_error = DataError::Parse;
            return false;
        }

        match self.decoder.decode_packet(data) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "packet decode failed");
                self.last_data_error = DataError::Parse;
                false
            }
        }
    }

    /// Latest decoded tracking state.
    pub fn snapshot(&self) -> &FrameSnapshot {
        self.decoder.snapshot()
    }

    /// Raw text of the last received datagram, for diagnostics and replay
    /// capture.
    pub fn last_packet(&self) -> Option<&str> {
        self.last_packet.as_deref()
    }

    // --- commands ----------------------------------------------------------

    /// Send one raw command string and classify the reply.
    ///
    /// `None` means the exchange itself failed (no channel, timeout,
    /// transport error, oversize command); see
    /// [`last_server_error`](Self::last_server_error). An application error
    /// reply is a successful exchange and also updates
    /// [`last_controller_error`](Self::last_controller_error).
    pub async fn send_command(&mut self, command: &str) -> Option<Response> {
        self.last_server_error = ServerError::None;
        self.last_controller_error = (0, String::new());

        let Some(channel) = self.command.as_mut() else {
            self.last_server_error = ServerError::Network;
            return None;
        };

        match channel.exchange(command, self.command_timeout).await {
            Ok(response) => {
                match &response {
                    Response::Error { code, message } => {
                        self.last_controller_error = (*code, message.clone());
                    }
                    Response::Malformed { code, message } => {
                        self.last_server_error = ServerError::Parse;
                        self.last_controller_error = (*code, message.clone());
                    }
                    Response::Ok | Response::Payload(_) => {}
                }
                Some(response)
            }
            Err(TrackError::Timeout { .. }) => {
                self.last_server_error = ServerError::Timeout;
                None
            }
            Err(e) => {
                warn!(error = %e, "command exchange failed");
                self.last_server_error = ServerError::Network;
                None
            }
        }
    }

    /// Get a controller parameter.
    ///
    /// `None` means failure; the category is in
    /// [`last_server_error`](Self::last_server_error) or, for controller
    /// errors, [`last_controller_error`](Self::last_controller_error).
    pub async fn get_param(&mut self, category: &str, name: &str) -> Option<String> {
        self.get_param_key(&format!("{category} {name}")).await
    }

    /// Get a controller parameter using a combined `category name` key.
    pub async fn get_param_key(&mut self, key: &str) -> Option<String> {
        let response = self.send_command(&format!("dtrack2 get {key}")).await?;
        let Response::Payload(payload) = response else {
            return None;
        };

        let Some(echoed) = payload.strip_prefix("dtrack2 set ") else {
            self.last_server_error = ServerError::Parse;
            return None;
        };

        match echo_match(echoed, key) {
            Some(value) if !value.is_empty() => Some(value),
            _ => {
                self.last_server_error = ServerError::Parse;
                None
            }
        }
    }

    /// Set a controller parameter.
    pub async fn set_param(&mut self, category: &str, name: &str, value: &str) -> bool {
        self.set_param_key(&format!("{category} {name} {value}")).await
    }

    /// Set a controller parameter using a combined `category name value`
    /// string.
    pub async fn set_param_key(&mut self, parameter: &str) -> bool {
        matches!(self.send_command(&format!("dtrack2 set {parameter}")).await, Some(Response::Ok))
    }

    /// Start measurement on the controller (when connected) and start the
    /// UDP receiver.
    pub async fn start_measurement(&mut self) -> bool {
        if self.command.is_some()
            && !matches!(self.send_command("dtrack2 tracking start").await, Some(Response::Ok))
        {
            return false;
        }

        self.data.start(self.buffer_size);
        true
    }

    /// Stop the UDP receiver and stop measurement on the controller (when
    /// connected).
    pub async fn stop_measurement(&mut self) -> bool {
        self.data.terminate();

        if self.command.is_some()
            && !matches!(self.send_command("dtrack2 tracking stop").await, Some(Response::Ok))
        {
            return false;
        }

        true
    }

    /// Fetch the next event message from the controller.
    ///
    /// `None` covers both "no message available" and a malformed reply;
    /// neither is a channel failure.
    pub async fn get_message(&mut self) -> Option<ControllerMessage> {
        let response = self.send_command("dtrack2 getmsg").await?;
        let Response::Payload(payload) = response else {
            return None;
        };
        parse_message(&payload)
    }

    // --- tactile feedback --------------------------------------------------

    /// Set tactile feedback strength on one finger of a hand.
    /// `strength` must lie within `0.0..=1.0`.
    pub async fn tactile_finger(&mut self, hand: usize, finger: usize, strength: f64) -> bool {
        let Some(request) = tactile_request(hand, &[(finger, strength)]) else {
            return false;
        };
        self.send_tactile(&request).await
    }

    /// Set tactile feedback strength on all fingers of a hand; one strength
    /// per finger, each within `0.0..=1.0`.
    pub async fn tactile_hand(&mut self, hand: usize, strengths: &[f64]) -> bool {
        let entries: Vec<(usize, f64)> =
            strengths.iter().copied().enumerate().collect();
        let Some(request) = tactile_request(hand, &entries) else {
            return false;
        };
        self.send_tactile(&request).await
    }

    /// Turn tactile feedback off on all fingers of a hand.
    pub async fn tactile_hand_off(&mut self, hand: usize, num_fingers: usize) -> bool {
        self.tactile_hand(hand, &vec![0.0; num_fingers]).await
    }

    /// Tactile commands go out-of-band over UDP, not the command channel.
    async fn send_tactile(&mut self, request: &str) -> bool {
        let Some(ip) = self.controller_ip else {
            warn!("tactile feedback needs a controller connection");
            return false;
        };

        let dest = SocketAddr::new(ip, CONTROLLER_TACTILE_PORT);
        match self.data.send(dest, request.as_bytes()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "tactile send failed");
                false
            }
        }
    }

    // --- configuration and error state -------------------------------------

    /// Timeout for receiving tracking data; zero restores the default
    /// (1000 ms).
    pub fn set_data_timeout(&mut self, timeout: Duration) {
        self.data_timeout =
            if timeout.is_zero() { DEFAULT_DATA_TIMEOUT } else { timeout };
    }

    /// Timeout for command replies; zero restores the default (10 s).
    pub fn set_command_timeout(&mut self, timeout: Duration) {
        self.command_timeout =
            if timeout.is_zero() { DEFAULT_COMMAND_TIMEOUT } else { timeout };
    }

    /// UDP receive buffer size in bytes; zero restores the default (32768).
    /// Takes effect the next time the receiver starts.
    pub fn set_data_buffer_size(&mut self, size: usize) {
        self.buffer_size =
            if size == 0 { crate::net::data::DEFAULT_BUFFER_SIZE } else { size };
    }

    /// Locally bound UDP data port.
    pub fn data_port(&self) -> u16 {
        self.data.port()
    }

    /// Whether this session has a command channel (communicating mode).
    pub fn has_command_channel(&self) -> bool {
        self.command.is_some()
    }

    /// Category of the last data-path failure.
    pub fn last_data_error(&self) -> DataError {
        self.last_data_error
    }

    /// Category of the last command-path failure.
    pub fn last_server_error(&self) -> ServerError {
        self.last_server_error
    }

    /// Code and message of the last controller application error. Reset to
    /// `(0, "")` at the start of every command.
    pub fn last_controller_error(&self) -> (i32, &str) {
        (self.last_controller_error.0, &self.last_controller_error.1)
    }
}

/// Build a `tfb` request: one `[hand finger 1.0 strength]` group per entry.
/// Returns `None` when any strength is outside `0.0..=1.0`.
fn tactile_request(hand: usize, entries: &[(usize, f64)]) -> Option<String> {
    let mut request = format!("tfb {} ", entries.len());

    for &(finger, strength) in entries {
        if !(0.0..=1.0).contains(&strength) {
            warn!(strength, "tactile strength not in range (0.0 - 1.0)");
            return None;
        }
        request.push_str(&format!("[{hand} {finger} 1.0 {strength}]"));
    }

    request.push('\0');
    Some(request)
}

/// Compare the requested parameter key against the controller-echoed key
/// and return the trailing value.
///
/// The controller normalizes keys when echoing them: runs of spaces
/// collapse and numeric fields may gain or lose leading zeros. The walk is
/// lock-step; at a run of `'0'` not itself preceded by a digit on either
/// side all leading zeros are skipped on both sides, at a run of spaces on
/// either side all spaces are skipped on both sides, and anything else must
/// match exactly. Once the key is consumed, the rest of the echoed string
/// (after separating spaces, NULs stripped) is the value.
fn echo_match(echoed: &str, requested: &str) -> Option<String> {
    let e = echoed.as_bytes();
    let r = requested.as_bytes();
    let mut ie = 0;
    let mut ir = 0;
    let mut last_was_digit = false;

    while ir < r.len() {
        if ie >= e.len() {
            return None;
        }

        let cr = r[ir];
        let ce = e[ie];

        if !last_was_digit && (cr == b'0' || ce == b'0') {
            while ir < r.len() && r[ir] == b'0' {
                ir += 1;
            }
            while ie < e.len() && e[ie] == b'0' {
                ie += 1;
            }
            last_was_digit = true;
            continue;
        }

        if cr == b' ' || ce == b' ' {
            while ir < r.len() && r[ir] == b' ' {
                ir += 1;
            }
            while ie < e.len() && e[ie] == b' ' {
                ie += 1;
            }
            last_was_digit = false;
            continue;
        }

        if cr != ce {
            return None;
        }

        last_was_digit = cr.is_ascii_digit();
        ir += 1;
        ie += 1;
    }

    while ie < e.len() && e[ie] == b' ' {
        ie += 1;
    }

    Some(echoed[ie..].replace('\0', ""))
}

/// Parse a `dtrack2 msg <origin> <status> <frame> 0x<hex> "<text>"` reply.
fn parse_message(payload: &str) -> Option<ControllerMessage> {
    let rest = payload.strip_prefix("dtrack2 msg ")?;

    let mut words = rest.splitn(4, ' ');
    let origin = words.next().filter(|w| !w.is_empty())?;
    let status = words.next().filter(|w| !w.is_empty())?;
    let frame = words.next()?.parse::<u32>().ok()?;
    let tail = words.next()?;

    let (code_word, text) = tail.split_once(' ')?;
    let error_id = u32::from_str_radix(code_word.strip_prefix("0x")?, 16).ok()?;

    let quote_start = text.find('"')?;
    let quoted = &text[quote_start + 1..];
    let quote_end = quoted.find('"')?;

    Some(ControllerMessage {
        origin: origin.to_string(),
        status: status.to_string(),
        frame,
        error_id,
        message: quoted[..quote_end].to_string(),
    })
}
