//! Shared I/O helpers for the fake POP3 server.
//!
//! Every write is flushed immediately so the client sees responses
//! in lockstep with its commands.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Write a string to the stream and flush.
pub async fn write_line<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    line: &str,
) -> std::io::Result<()> {
    stream.get_mut().write_all(line.as_bytes()).await?;
    stream.get_mut().flush().await
}

/// Write raw bytes to the stream and flush.
pub async fn write_bytes<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    data: &[u8],
) -> std::io::Result<()> {
    stream.get_mut().write_all(data).await?;
    stream.get_mut().flush().await
}

/// Encode `lines` as a POP3 multi-line body: CRLF line endings, lines
/// starting with `.` byte-stuffed, terminated by `.\r\n`.
pub fn multiline_body<'a>(lines: impl IntoIterator<Item = &'a [u8]>) -> Vec<u8> {
    let mut out = Vec::new();
    for line in lines {
        if line.starts_with(b".") {
            out.push(b'.');
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
pub mod testing {
    use tokio::io::{AsyncReadExt, BufReader, DuplexStream};

    /// A server-side stream plus the client end to read responses from.
    pub fn pair() -> (BufReader<DuplexStream>, DuplexStream) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        (BufReader::new(server), client)
    }

    /// Drop the server side and return everything written to the client.
    pub async fn output(stream: BufReader<DuplexStream>, mut client: DuplexStream) -> String {
        drop(stream);
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        String::from_utf8(buf).unwrap()
    }
}
