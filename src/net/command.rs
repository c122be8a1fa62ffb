//! Command channel: synchronous TCP request/response with the controller.
//!
//! Commands are NUL-terminated ASCII strings over one persistent
//! connection. The exchange runs entirely on the caller's task; send and
//! receive each use the channel's command timeout as their I/O deadline.
//!
//! Replies are classified by prefix: `dtrack2 ok` is plain success,
//! `dtrack2 err <code> "<message>"` is an application error raised by the
//! controller, and anything else is an opaque payload handed back for
//! caller-specific parsing (parameter and event-message replies).

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{Result, TrackError};

/// Maximum command length in bytes, including the NUL terminator.
pub const MAX_COMMAND_LEN: usize = 200;

/// Fallback application-error code reported for unparsable `err` replies.
pub const REPLY_PARSE_ERROR_CODE: i32 = -1100;

/// Classified controller reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `dtrack2 ok`: the command succeeded, no payload.
    Ok,
    /// `dtrack2 err <code> "<message>"`: the controller raised an error.
    Error { code: i32, message: String },
    /// An `err` reply whose code or message was malformed. The fields hold
    /// best-effort fallback values.
    Malformed { code: i32, message: String },
    /// Any other reply, NUL padding stripped, for caller-specific parsing.
    Payload(String),
}

/// Persistent TCP connection to the controller's command port.
///
/// A failed [`connect`](CommandChannel::connect) permanently invalidates
/// the channel instance; there is no automatic reconnect.
#[derive(Debug)]
pub struct CommandChannel {
    stream: TcpStream,
}

impl CommandChannel {
    /// Connect to the controller with a bounded connect timeout.
    pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TrackError::Timeout { duration: timeout })?
            .map_err(|e| TrackError::network_with_source("TCP connection failed", e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| TrackError::network_with_source("can't configure TCP socket", e))?;

        debug!(%addr, "command channel connected");
        Ok(Self { stream })
    }

    /// Send one command and classify the controller's reply.
    ///
    /// A command exceeding [`MAX_COMMAND_LEN`] (including the appended NUL
    /// terminator) is rejected locally before any write.
    pub async fn exchange(&mut self, command: &str, timeout: Duration) -> Result<Response> {
        let mut request = command.as_bytes().to_vec();
        if request.last() != Some(&0) {
            request.push(0);
        }
        if request.len() > MAX_COMMAND_LEN {
            return Err(TrackError::SizeLimit { len: request.len(), max: MAX_COMMAND_LEN });
        }

        tokio::time::timeout(timeout, self.stream.write_all(&request))
            .await
            .map_err(|_| TrackError::Timeout { duration: timeout })?
            .map_err(|e| TrackError::network_with_source("can't send TCP data", e))?;

        let mut buf = [0u8; MAX_COMMAND_LEN];
        let len = tokio::time::timeout(timeout, self.stream.read(&mut buf))
            .await
            .map_err(|_| TrackError::Timeout { duration: timeout })?
            .map_err(|e| TrackError::network_with_source("can't receive TCP data", e))?;
        if len == 0 {
            return Err(TrackError::network("connection closed by controller"));
        }

        let reply = String::from_utf8_lossy(&buf[..len]);
        Ok(classify(&reply))
    }
}

/// Classify a raw controller reply by its protocol prefix.
fn classify(reply: &str) -> Response {
    if reply.starts_with("dtrack2 ok") {
        return Response::Ok;
    }

    if let Some(rest) = reply.strip_prefix("dtrack2 err ") {
        let code = rest.split(' ').next().and_then(|word| word.parse::<i32>().ok());
        let message = extract_quoted(rest);

        return match (code, message) {
            (Some(code), Some(message)) => Response::Error { code, message },
            (None, Some(message)) => {
                warn!(reply = %rest, "error reply with malformed code");
                Response::Malformed { code: REPLY_PARSE_ERROR_CODE, message }
            }
            (_, None) => {
                warn!(reply = %rest, "error reply with malformed message");
                Response::Malformed {
                    code: REPLY_PARSE_ERROR_CODE,
                    message: "reply parse error".to_string(),
                }
            }
        };
    }

    Response::Payload(reply.replace('\0', ""))
}

/// First double-quoted section of a reply, if present.
fn extract_quoted(text: &str) -> Option<String> {
    let start = text.find('"')?;
    let rest = &text[start + 1..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ok() {
        assert_eq!(classify("dtrack2 ok"), Response::Ok);
        assert_eq!(classify("dtrack2 ok\0\0"), Response::Ok);
    }

    #[test]
    fn classifies_application_error() {
        let response = classify("dtrack2 err 3 \"invalid parameter\"");
        assert_eq!(response, Response::Error { code: 3, message: "invalid parameter".into() });

        let response = classify("dtrack2 err -4711 \"tracking halted\"\0");
        assert_eq!(response, Response::Error { code: -4711, message: "tracking halted".into() });
    }

    #[test]
    fn malformed_code_keeps_message() {
        let response = classify("dtrack2 err xx \"still told you why\"");
        assert_eq!(
            response,
            Response::Malformed {
                code: REPLY_PARSE_ERROR_CODE,
                message: "still told you why".into()
            }
        );
    }

    #[test]
    fn malformed_message_gets_fallback() {
        let response = classify("dtrack2 err 3 no quotes here");
        assert_eq!(
            response,
            Response::Malformed { code: REPLY_PARSE_ERROR_CODE, message: "reply parse error".into() }
        );
    }

    #[test]
    fn opaque_payload_strips_nul_padding() {
        let response = classify("dtrack2 set system access full\0\0\0");
        assert_eq!(response, Response::Payload("dtrack2 set system access full".into()));
    }

    #[test]
    fn err_without_separator_is_payload() {
        // Not a well-formed error reply; hand it back for the caller.
        assert!(matches!(classify("dtrack2 err"), Response::Payload(_)));
    }

    #[tokio::test]
    async fn oversize_command_rejected_before_write() {
        // The listener accepts but never reads: a write would be observable.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });

        let mut channel =
            CommandChannel::connect(addr, Duration::from_secs(2)).await.unwrap();
        let server = accept.await.unwrap();

        let oversize = "x".repeat(MAX_COMMAND_LEN);
        let err = channel.exchange(&oversize, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, TrackError::SizeLimit { len: 201, max: MAX_COMMAND_LEN }));

        drop(server);
    }

    #[tokio::test]
    async fn exchange_roundtrip_with_mock_controller() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; MAX_COMMAND_LEN];
            let len = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], b"dtrack2 tracking start\0");
            stream.write_all(b"dtrack2 ok\0").await.unwrap();
        });

        let mut channel =
            CommandChannel::connect(addr, Duration::from_secs(2)).await.unwrap();
        let response =
            channel.exchange("dtrack2 tracking start", Duration::from_secs(2)).await.unwrap();
        assert_eq!(response, Response::Ok);
    }

    #[tokio::test]
    async fn reply_timeout_is_distinguishable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; MAX_COMMAND_LEN];
            let _ = stream.read(&mut buf).await;
            // Never reply; hold the connection open past the client timeout.
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut channel =
            CommandChannel::connect(addr, Duration::from_secs(2)).await.unwrap();
        let err =
            channel.exchange("dtrack2 getmsg", Duration::from_millis(200)).await.unwrap_err();
        assert!(matches!(err, TrackError::Timeout { .. }));

        accept.abort();
    }
}
