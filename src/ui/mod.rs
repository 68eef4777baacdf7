//! Line-oriented terminal UI.
//!
//! - [`persona_form`]: the configuration view that produces a validated
//!   [`crate::core::persona::PersonaConfig`].
//! - [`transcript`]: prints transcript mutations as they happen.
//! - [`chat_loop`]: reads user lines, handles slash commands and drives
//!   [`crate::core::chat_stream::Conversation::send_message`].
//!
//! Everything here works over generic async readers and `std::io::Write`
//! sinks so it can run against in-memory buffers.

pub mod chat_loop;
pub mod persona_form;
pub mod transcript;

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Read one line without its line terminator. `None` at end of input.
pub(crate) async fn read_line<R>(input: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed_len);
    Ok(Some(line))
}
