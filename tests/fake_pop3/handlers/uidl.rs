//! UIDL command handler: unique-id listing, same shape as LIST.

use crate::fake_pop3::io::{multiline_body, write_bytes, write_line};
use crate::fake_pop3::state::SessionState;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_uidl<S: AsyncRead + AsyncWrite + Unpin>(
    arg: &str,
    state: &SessionState,
    stream: &mut BufReader<S>,
) -> bool {
    if !arg.is_empty() {
        let resp = match state.message(arg) {
            Ok((seq, m)) => format!("+OK {seq} {}\r\n", m.uid),
            Err(e) => format!("-ERR {e}\r\n"),
        };
        return write_line(stream, &resp).await.is_ok();
    }

    let lines: Vec<String> = state
        .live()
        .iter()
        .map(|(seq, m)| format!("{seq} {}", m.uid))
        .collect();
    write_line(stream, "+OK\r\n").await.is_ok()
        && write_bytes(stream, &multiline_body(lines.iter().map(String::as_bytes)))
            .await
            .is_ok()
}
