//! Bounded line reads for untrusted peers.
//!
//! A peer that never sends a newline must not grow a buffer without limit, so
//! every read is capped and the tail of an oversized line is skipped in
//! bounded chunks.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest plaintext auth line, terminator excluded.
pub const MAX_AUTH_LINE: usize = 1024;

/// Longest sealed command token, terminator excluded.
pub const MAX_TOKEN_LINE: usize = 256;

/// Outcome of [`read_bounded_line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRead {
    /// The buffer holds one line with `\n` or `\r\n` stripped.
    Line,
    /// The line was longer than the limit and has been discarded.
    TooLong,
    /// The peer closed the stream.
    Eof,
}

/// Reads one line of at most `max` bytes into `buf`.
pub async fn read_bounded_line<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    // Room for the terminator.
    let limit = max as u64 + 1;

    if (&mut *reader).take(limit).read_until(b'\n', buf).await? == 0 {
        return Ok(LineRead::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(LineRead::Line);
    }

    if buf.len() <= max {
        // Unterminated final line.
        return Ok(LineRead::Line);
    }

    loop {
        buf.clear();
        let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
        if read == 0 || buf.last() == Some(&b'\n') {
            break;
        }
    }
    buf.clear();
    Ok(LineRead::TooLong)
}
