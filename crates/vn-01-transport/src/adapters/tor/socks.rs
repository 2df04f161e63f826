//! Minimal SOCKS5 client (RFC 1928, no-auth, CONNECT only).
//!
//! Hostnames are always sent unresolved (ATYP 0x03) so `.onion` names
//! reach the Tor daemon instead of the local resolver.

use crate::domain::errors::TransportError;
use shared_types::TransportType;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const SOCKS_VERSION: u8 = 0x05;
const NO_AUTH: u8 = 0x00;
const NO_ACCEPTABLE_METHODS: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;
const REPLY_SUCCEEDED: u8 = 0x00;

/// Connect to `host:port` through the proxy at `proxy`.
pub(crate) async fn connect(proxy: &str, host: &str, port: u16) -> Result<TcpStream, TransportError> {
    if host.is_empty() || host.len() > 255 {
        return Err(socks_error(format!("hostname length {} out of range", host.len())));
    }

    let mut stream = TcpStream::connect(proxy)
        .await
        .map_err(|e| TransportError::connection_failed(proxy, e))?;
    stream.set_nodelay(true)?;

    stream.write_all(&[SOCKS_VERSION, 1, NO_AUTH]).await?;
    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != SOCKS_VERSION {
        return Err(socks_error(format!("unexpected version {:#04x}", choice[0])));
    }
    if choice[1] == NO_ACCEPTABLE_METHODS || choice[1] != NO_AUTH {
        return Err(socks_error("proxy requires authentication"));
    }

    let mut request = Vec::with_capacity(7 + host.len());
    request.extend_from_slice(&[SOCKS_VERSION, CMD_CONNECT, 0x00, ATYP_DOMAIN, host.len() as u8]);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != SOCKS_VERSION {
        return Err(socks_error(format!("unexpected version {:#04x}", head[0])));
    }
    if head[1] != REPLY_SUCCEEDED {
        return Err(socks_error(format!(
            "connect to {host}:{port} refused: {}",
            reply_reason(head[1])
        )));
    }

    // Consume the bound address so the caller starts at payload bytes.
    let addr_len = match head[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => usize::from(stream.read_u8().await?),
        other => return Err(socks_error(format!("unknown address type {other:#04x}"))),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(stream)
}

fn socks_error(reason: impl Into<String>) -> TransportError {
    TransportError::protocol(TransportType::Tor, reason)
}

/// Human-readable SOCKS5 reply codes, including Tor's onion extensions.
pub(crate) fn reply_reason(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        0xF0 => "onion service descriptor can not be found",
        0xF1 => "onion service descriptor is invalid",
        0xF2 => "onion service introduction failed",
        0xF3 => "onion service rendezvous failed",
        0xF4 => "onion service missing client authorization",
        0xF5 => "onion service wrong client authorization",
        0xF6 => "onion service invalid address",
        0xF7 => "onion service introduction timed out",
        _ => "unknown error",
    }
}
