//! Tor control-port client.
//!
//! Replies are `<status><sep><text>` lines where `sep` is `-` (more lines
//! follow), `+` (a dot-terminated data block follows) or ` ` (last line).
//! Status `650` marks an asynchronous event, which can arrive between a
//! command and its reply; those are queued for `wait_for_upload`.

use crate::adapters::line_io::read_line;
use crate::domain::errors::TransportError;
use shared_types::TransportType;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

const STATUS_OK: u16 = 250;
const STATUS_EVENT: u16 = 650;
const NEW_ED25519_KEY: &str = "NEW:ED25519-V3";

/// A complete reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ControlReply {
    pub status: u16,
    pub lines: Vec<String>,
}

impl ControlReply {
    /// Value of the first `key=value` line.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }
}

/// Result of `ADD_ONION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AddedOnion {
    pub service_id: String,
    /// Present only when Tor generated a fresh key.
    pub private_key: Option<String>,
}

/// An authenticated control connection.
#[derive(Debug)]
pub(crate) struct TorControl {
    stream: TcpStream,
    events: VecDeque<String>,
}

impl TorControl {
    pub async fn connect(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| TransportError::connection_failed(format!("{host}:{port}"), e))?;
        Ok(Self {
            stream,
            events: VecDeque::new(),
        })
    }

    pub async fn authenticate(&mut self, password: Option<&str>) -> Result<(), TransportError> {
        let command = match password {
            Some(password) => format!("AUTHENTICATE \"{}\"", escape_quoted(password)),
            None => "AUTHENTICATE".to_string(),
        };
        self.expect_ok(&command).await.map(|_| ())
    }

    pub async fn version(&mut self) -> Result<String, TransportError> {
        let reply = self.expect_ok("GETINFO version").await?;
        reply
            .value("version")
            .map(str::to_string)
            .ok_or_else(|| control_error("GETINFO version reply carries no version"))
    }

    pub async fn set_events(&mut self, events: &[&str]) -> Result<(), TransportError> {
        self.expect_ok(&format!("SETEVENTS {}", events.join(" ")))
            .await
            .map(|_| ())
    }

    /// Publish a hidden service mapping `virtual_port` to `target`.
    ///
    /// `key` is a previously returned `ED25519-V3:<base64>` blob; `None`
    /// asks Tor for a new one.
    pub async fn add_onion(
        &mut self,
        key: Option<&str>,
        virtual_port: u16,
        target: SocketAddr,
    ) -> Result<AddedOnion, TransportError> {
        let key_spec = key.unwrap_or(NEW_ED25519_KEY);
        let reply = self
            .expect_ok(&format!("ADD_ONION {key_spec} Port={virtual_port},{target}"))
            .await?;

        let service_id = reply
            .value("ServiceID")
            .ok_or_else(|| control_error("ADD_ONION reply carries no ServiceID"))?
            .to_string();
        Ok(AddedOnion {
            service_id,
            private_key: reply.value("PrivateKey").map(str::to_string),
        })
    }

    pub async fn del_onion(&mut self, service_id: &str) -> Result<(), TransportError> {
        self.expect_ok(&format!("DEL_ONION {service_id}"))
            .await
            .map(|_| ())
    }

    /// Wait until an `HS_DESC UPLOADED` event names `service_id`.
    ///
    /// Requires `SETEVENTS HS_DESC` to be active.
    pub async fn wait_for_upload(
        &mut self,
        service_id: &str,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            while let Some(event) = self.events.pop_front() {
                if is_upload_of(&event, service_id) {
                    return Ok(());
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = tokio::time::timeout(remaining, self.read_reply())
                .await
                .map_err(|_| TransportError::Timeout {
                    operation: format!("publishing {service_id}.onion"),
                    after_ms: timeout.as_millis() as u64,
                })??;
            if line.status == STATUS_EVENT {
                self.events.extend(line.lines);
            }
        }
    }

    async fn expect_ok(&mut self, command: &str) -> Result<ControlReply, TransportError> {
        let reply = self.command(command).await?;
        if reply.status == STATUS_OK {
            Ok(reply)
        } else {
            let verb = command.split_whitespace().next().unwrap_or(command);
            Err(control_error(format!(
                "{verb} failed with {}: {}",
                reply.status,
                reply.lines.join(" ")
            )))
        }
    }

    async fn command(&mut self, command: &str) -> Result<ControlReply, TransportError> {
        let verb = command.split_whitespace().next().unwrap_or(command);
        debug!(verb, "[vn-01] tor control command");
        self.stream
            .write_all(format!("{command}\r\n").as_bytes())
            .await?;

        loop {
            let reply = self.read_reply().await?;
            if reply.status == STATUS_EVENT {
                self.events.extend(reply.lines);
            } else {
                return Ok(reply);
            }
        }
    }

    async fn read_reply(&mut self) -> Result<ControlReply, TransportError> {
        let mut lines = Vec::new();
        loop {
            let line = read_line(&mut self.stream).await?;
            let (status, separator, text) = split_reply_line(&line)?;
            lines.push(text.to_string());

            match separator {
                '-' => continue,
                '+' => {
                    loop {
                        let data = read_line(&mut self.stream).await?;
                        if data == "." {
                            break;
                        }
                        lines.push(data);
                    }
                }
                _ => return Ok(ControlReply { status, lines }),
            }
        }
    }
}

fn split_reply_line(line: &str) -> Result<(u16, char, &str), TransportError> {
    if line.len() < 4 || !line.is_char_boundary(3) || !line.is_char_boundary(4) {
        return Err(control_error(format!("malformed reply line {line:?}")));
    }
    let status = line[..3]
        .parse::<u16>()
        .map_err(|_| control_error(format!("malformed status in {line:?}")))?;
    let separator = line[3..4].chars().next().unwrap_or(' ');
    if !matches!(separator, '-' | '+' | ' ') {
        return Err(control_error(format!("malformed separator in {line:?}")));
    }
    Ok((status, separator, &line[4..]))
}

fn is_upload_of(event: &str, service_id: &str) -> bool {
    let mut tokens = event.split_whitespace();
    tokens.next() == Some("HS_DESC")
        && tokens.next() == Some("UPLOADED")
        && tokens.next() == Some(service_id)
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn control_error(reason: impl Into<String>) -> TransportError {
    TransportError::protocol(TransportType::Tor, reason)
}
