//! Line reads for the text protocols (Tor control, SAM).

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest reply line accepted. SAM destinations are under 1 KiB; Tor
/// `ADD_ONION` replies are shorter.
pub(crate) const MAX_LINE_LEN: usize = 16 * 1024;

/// Read one `\n`-terminated line byte by byte, stripping `\r\n`.
///
/// Unbuffered on purpose: after a SAM `STREAM CONNECT` reply the same socket
/// carries peer data, which must not be swallowed by a read-ahead buffer.
pub(crate) async fn read_line<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<String> {
    let mut bytes = Vec::with_capacity(128);
    loop {
        let byte = reader.read_u8().await?;
        if byte == b'\n' {
            break;
        }
        if bytes.len() >= MAX_LINE_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "reply line too long"));
        }
        bytes.push(byte);
    }
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_lines_and_leaves_rest() {
        let mut input: &[u8] = b"250 OK\r\nSTREAM STATUS RESULT=OK\nraw";
        assert_eq!(read_line(&mut input).await.unwrap(), "250 OK");
        assert_eq!(read_line(&mut input).await.unwrap(), "STREAM STATUS RESULT=OK");
        assert_eq!(input, b"raw");
    }

    #[tokio::test]
    async fn test_eof_is_error() {
        let mut input: &[u8] = b"partial";
        let err = read_line(&mut input).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
