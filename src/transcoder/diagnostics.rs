//! Transcoder stderr diagnostics
//!
//! ffmpeg reports progress several times per second, terminating those
//! updates with `\r` instead of `\n`. Only the remaining lines are worth
//! logging: stream info, warnings and errors.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::ChildStderr;

/// Longest line kept; the rest of an overlong line is discarded
pub const MAX_LINE_BYTES: usize = 4096;

/// Check whether a line is a periodic progress report
pub fn is_progress_line(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with("frame=")
        || line.starts_with("size=")
        || (line.contains("time=") && line.contains("bitrate="))
}

/// Filtered line stream over a transcoder's stderr
pub struct Diagnostics<R = ChildStderr> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> Diagnostics<R> {
    /// Wrap a raw stderr stream
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::with_capacity(MAX_LINE_BYTES),
        }
    }

    /// Next relevant line, or `None` once the stream closes
    pub async fn next_line(&mut self) -> Option<String> {
        loop {
            let more = self.read_segment().await;

            if !self.buf.is_empty() {
                let text = String::from_utf8_lossy(&self.buf);
                let line = text.trim_end();
                if !line.is_empty() && !is_progress_line(line) {
                    return Some(line.to_string());
                }
            }

            if !more {
                return None;
            }
        }
    }

    /// Fill `buf` with the next `\r`- or `\n`-terminated segment
    ///
    /// Returns `false` once the stream is exhausted.
    async fn read_segment(&mut self) -> bool {
        self.buf.clear();

        loop {
            let chunk = match self.reader.fill_buf().await {
                Ok(chunk) if !chunk.is_empty() => chunk,
                _ => return false,
            };

            let end = chunk.iter().position(|&b| b == b'\r' || b == b'\n');
            let take = end.unwrap_or(chunk.len());

            let room = MAX_LINE_BYTES.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&chunk[..take.min(room)]);

            match end {
                Some(pos) => {
                    self.reader.consume(pos + 1);
                    return true;
                }
                None => self.reader.consume(take),
            }
        }
    }
}
