//! RETR command handler.
//!
//! Sends the whole message as a multi-line response. Any line that
//! begins with `.` gets an extra `.` prepended so the client cannot
//! mistake it for the terminator.

use crate::fake_pop3::io::{multiline_body, write_bytes, write_line};
use crate::fake_pop3::state::SessionState;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_retr<S: AsyncRead + AsyncWrite + Unpin>(
    arg: &str,
    state: &SessionState,
    stream: &mut BufReader<S>,
) -> bool {
    let (seq, message) = match state.message(arg) {
        Ok(found) => found,
        Err(e) => return write_line(stream, &format!("-ERR {e}\r\n")).await.is_ok(),
    };
    if state.failing_retrieve == Some(seq) {
        return write_line(stream, "-ERR message unavailable\r\n").await.is_ok();
    }

    let header = format!("+OK {} octets\r\n", message.raw.len());
    write_line(stream, &header).await.is_ok()
        && write_bytes(stream, &multiline_body(split_lines(&message.raw)))
            .await
            .is_ok()
}

/// Split on LF, dropping a trailing CR from each line and the empty
/// remainder after a final newline.
fn split_lines(raw: &[u8]) -> Vec<&[u8]> {
    let mut lines: Vec<&[u8]> = raw
        .split(|b| *b == b'\n')
        .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
        .collect();
    if raw.ends_with(b"\n") {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_pop3::io::testing::{output, pair};
    use crate::fake_pop3::mailbox::TestMessage;

    fn state_with(raw: &[u8]) -> SessionState {
        SessionState {
            maildrop: Some(vec![TestMessage {
                uid: "u1".into(),
                raw: raw.to_vec(),
            }]),
            ..SessionState::default()
        }
    }

    #[tokio::test]
    async fn stuffs_leading_dots() {
        let state = state_with(b"Subject: x\r\n\r\n.hidden\r\n");
        let (mut stream, client) = pair();

        handle_retr("1", &state, &mut stream).await;

        assert_eq!(
            output(stream, client).await,
            "+OK 23 octets\r\nSubject: x\r\n\r\n..hidden\r\n.\r\n"
        );
    }

    #[tokio::test]
    async fn unknown_message_is_error() {
        let state = state_with(b"x");
        let (mut stream, client) = pair();

        handle_retr("7", &state, &mut stream).await;

        assert_eq!(output(stream, client).await, "-ERR no such message\r\n");
    }

    #[test]
    fn split_handles_missing_final_newline() {
        assert_eq!(split_lines(b"a\r\nb"), vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(split_lines(b"a\nb\n"), vec![&b"a"[..], &b"b"[..]]);
    }
}
