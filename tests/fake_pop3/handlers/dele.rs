//! DELE and RSET command handlers.
//!
//! DELE only marks a message; nothing leaves the shared mailbox until
//! QUIT. RSET clears every mark made in this session.

use crate::fake_pop3::io::write_line;
use crate::fake_pop3::state::SessionState;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

pub async fn handle_dele<S: AsyncRead + AsyncWrite + Unpin>(
    arg: &str,
    state: &mut SessionState,
    stream: &mut BufReader<S>,
) -> bool {
    let resp = match state.message(arg) {
        Ok((seq, _)) => {
            state.deleted.insert(seq);
            format!("+OK message {seq} deleted\r\n")
        }
        Err(e) => format!("-ERR {e}\r\n"),
    };
    write_line(stream, &resp).await.is_ok()
}

pub async fn handle_rset<S: AsyncRead + AsyncWrite + Unpin>(
    state: &mut SessionState,
    stream: &mut BufReader<S>,
) -> bool {
    state.deleted.clear();
    let resp = format!("+OK maildrop has {} messages\r\n", state.live().len());
    write_line(stream, &resp).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_pop3::io::testing::{output, pair};
    use crate::fake_pop3::mailbox::TestMessage;

    fn state() -> SessionState {
        SessionState {
            maildrop: Some(vec![TestMessage {
                uid: "u1".into(),
                raw: b"x".to_vec(),
            }]),
            ..SessionState::default()
        }
    }

    #[tokio::test]
    async fn marks_once() {
        let mut state = state();
        let (mut stream, client) = pair();

        handle_dele("1", &mut state, &mut stream).await;
        handle_dele("1", &mut state, &mut stream).await;

        assert_eq!(state.deleted_uids(), vec!["u1"]);
        assert_eq!(
            output(stream, client).await,
            "+OK message 1 deleted\r\n-ERR message already deleted\r\n"
        );
    }

    #[tokio::test]
    async fn rset_clears_marks() {
        let mut state = state();
        state.deleted.insert(1);
        let (mut stream, client) = pair();

        handle_rset(&mut state, &mut stream).await;

        assert!(state.deleted.is_empty());
        assert_eq!(output(stream, client).await, "+OK maildrop has 1 messages\r\n");
    }
}
