//! SAM v3.1 bridge client.
//!
//! Every command is one `\n`-terminated line answered by one line of the
//! form `TOPIC KIND KEY=VALUE ...`. A session lives as long as the socket
//! that created it; stream sockets turn into raw data pipes after a
//! successful `STREAM CONNECT`.

use crate::adapters::line_io::read_line;
use crate::domain::errors::TransportError;
use shared_types::TransportType;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

pub(crate) const SAM_VERSION: &str = "3.1";
/// EdDSA-SHA512-Ed25519.
pub(crate) const SIGNATURE_TYPE: u8 = 7;
pub(crate) const TRANSIENT: &str = "TRANSIENT";

/// One parsed SAM reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SamReply {
    pub topic: String,
    pub kind: String,
    params: HashMap<String, String>,
}

impl SamReply {
    pub fn parse(line: &str) -> Result<Self, TransportError> {
        let mut tokens = tokenize(line).into_iter();
        let topic = tokens
            .next()
            .ok_or_else(|| sam_error("empty reply"))?;
        let kind = tokens
            .next()
            .ok_or_else(|| sam_error(format!("reply {line:?} has no kind")))?;

        let params = tokens
            .filter_map(|token| {
                token
                    .split_once('=')
                    .map(|(k, v)| (k.to_string(), v.trim_matches('"').to_string()))
            })
            .collect();
        Ok(Self {
            topic,
            kind,
            params,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Fail unless the reply is `topic kind` with `RESULT=OK`.
    fn expect(self, topic: &str, kind: &str) -> Result<Self, TransportError> {
        if self.topic != topic || self.kind != kind {
            return Err(sam_error(format!(
                "expected {topic} {kind}, got {} {}",
                self.topic, self.kind
            )));
        }
        if self.get("RESULT") == Some("OK") {
            return Ok(self);
        }
        Err(sam_error(format!(
            "{topic} {kind} failed: {} {}",
            self.get("RESULT").unwrap_or("NO_RESULT"),
            self.get("MESSAGE").unwrap_or_default()
        )))
    }

    fn required(&self, key: &str) -> Result<String, TransportError> {
        self.get(key)
            .map(str::to_string)
            .ok_or_else(|| sam_error(format!("{} {} reply lacks {key}", self.topic, self.kind)))
    }
}

/// Split on spaces, keeping `KEY="quoted value"` intact.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ' ' if !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn sam_error(reason: impl Into<String>) -> TransportError {
    TransportError::protocol(TransportType::I2p, reason)
}

async fn command(stream: &mut TcpStream, line: &str) -> Result<SamReply, TransportError> {
    let verb: String = line.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
    debug!(%verb, "[vn-01] sam command");
    stream.write_all(format!("{line}\n").as_bytes()).await?;
    let reply = read_line(stream).await?;
    SamReply::parse(&reply)
}

/// Open a bridge connection and negotiate the protocol version.
pub(crate) async fn hello(host: &str, port: u16) -> Result<TcpStream, TransportError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| TransportError::connection_failed(format!("{host}:{port}"), e))?;
    stream.set_nodelay(true)?;
    command(
        &mut stream,
        &format!("HELLO VERSION MIN={SAM_VERSION} MAX={SAM_VERSION}"),
    )
    .await?
    .expect("HELLO", "REPLY")?;
    Ok(stream)
}

/// A fresh destination keypair: `(public, private)` in I2P base64.
pub(crate) async fn generate_destination(
    stream: &mut TcpStream,
) -> Result<(String, String), TransportError> {
    let reply = command(
        stream,
        &format!("DEST GENERATE SIGNATURE_TYPE={SIGNATURE_TYPE}"),
    )
    .await?;
    if reply.topic != "DEST" || reply.kind != "REPLY" {
        return Err(sam_error(format!(
            "expected DEST REPLY, got {} {}",
            reply.topic, reply.kind
        )));
    }
    Ok((reply.required("PUB")?, reply.required("PRIV")?))
}

/// Create a streaming session bound to this control socket.
///
/// `destination` is a private key or `TRANSIENT`. Returns the private key
/// the router actually used.
pub(crate) async fn create_session(
    stream: &mut TcpStream,
    session_id: &str,
    destination: &str,
) -> Result<String, TransportError> {
    command(
        stream,
        &format!(
            "SESSION CREATE STYLE=STREAM ID={session_id} DESTINATION={destination} SIGNATURE_TYPE={SIGNATURE_TYPE}"
        ),
    )
    .await?
    .expect("SESSION", "STATUS")?
    .required("DESTINATION")
}

/// Resolve a `.i2p` name to a base64 destination.
pub(crate) async fn naming_lookup(stream: &mut TcpStream, name: &str) -> Result<String, TransportError> {
    command(stream, &format!("NAMING LOOKUP NAME={name}"))
        .await?
        .expect("NAMING", "REPLY")?
        .required("VALUE")
}

/// Turn `stream` into a connection to `destination`.
pub(crate) async fn stream_connect(
    stream: &mut TcpStream,
    session_id: &str,
    destination: &str,
) -> Result<(), TransportError> {
    command(
        stream,
        &format!("STREAM CONNECT ID={session_id} DESTINATION={destination} SILENT=false"),
    )
    .await?
    .expect("STREAM", "STATUS")
    .map(|_| ())
}

/// Forward inbound streams of the session to a local port, without headers.
pub(crate) async fn stream_forward(
    stream: &mut TcpStream,
    session_id: &str,
    local_port: u16,
) -> Result<(), TransportError> {
    command(
        stream,
        &format!("STREAM FORWARD ID={session_id} PORT={local_port} SILENT=true"),
    )
    .await?
    .expect("STREAM", "STATUS")
    .map(|_| ())
}
