use std::io::{self, Write};
use std::sync::LazyLock;

use regex::Regex;

/// CSI sequences (`ESC [ params intermediates final`) and OSC sequences
/// (`ESC ] ... BEL` or `ESC ] ... ESC \`).
static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)")
        .expect("valid ANSI escape regex")
});

/// Writer that reformats a byte stream into clean, prefixed lines.
///
/// Input is split on `\n`, `\r` and `\r\n` (each one terminator). Every
/// complete line has its ANSI escapes removed and surrounding whitespace
/// trimmed; non-empty results are written to the sink as
/// `prefix + line + "\n"`, empty ones are dropped. Bytes after the last
/// terminator stay buffered until a later `write` completes the line or
/// `flush` forces it out.
///
/// `write` always reports the whole input as consumed, independent of how
/// much reached the sink. Formatted output the sink refused stays queued and
/// is sent, from the first byte not taken, on the next `write` or `flush`.
pub struct PrefixWriter<W: Write> {
    inner: W,
    prefix: String,
    pending: Vec<u8>,
    unsent: Vec<u8>,
}

impl<W: Write> PrefixWriter<W> {
    pub fn new(inner: W, prefix: impl Into<String>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            pending: Vec::new(),
            unsent: Vec::new(),
        }
    }

    #[allow(dead_code)] // Accessor for callers that reuse a writer's prefix; exercised in tests.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[allow(dead_code)] // Sink inspection for callers and tests.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Bytes received since the last terminator.
    #[allow(dead_code)] // Sink inspection for callers and tests.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Flush any partial line and hand back the sink.
    #[allow(dead_code)] // Executors flush in place; kept for callers owning the writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn emit_complete_lines(&mut self) -> io::Result<()> {
        let mut start = 0;
        while let Some(offset) = self.pending[start..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        {
            let end = start + offset;
            let terminator_len = match &self.pending[end..] {
                [b'\r', b'\n', ..] => 2,
                _ => 1,
            };
            self.format_line(start, end);
            start = end + terminator_len;
        }
        self.pending.drain(..start);
        self.send_unsent()
    }

    fn format_line(&mut self, start: usize, end: usize) {
        let line = strip_line(&String::from_utf8_lossy(&self.pending[start..end]));
        if line.is_empty() {
            return;
        }
        self.unsent.extend_from_slice(self.prefix.as_bytes());
        self.unsent.extend_from_slice(line.as_bytes());
        self.unsent.push(b'\n');
    }

    /// Whatever the sink has not accepted when it fails stays queued.
    fn send_unsent(&mut self) -> io::Result<()> {
        let mut sent = 0;
        let result = loop {
            if sent == self.unsent.len() {
                break Ok(());
            }
            match self.inner.write(&self.unsent[sent..]) {
                Ok(0) => {
                    break Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "sink accepted no bytes",
                    ))
                }
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        self.unsent.drain(..sent);
        result
    }
}

impl<W: Write> Write for PrefixWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.emit_complete_lines()?;
        Ok(buf.len())
    }

    /// Emits the buffered partial line, if any, as a complete line, then
    /// flushes the sink.
    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let end = self.pending.len();
            self.format_line(0, end);
            self.pending.clear();
        }
        self.send_unsent()?;
        self.inner.flush()
    }
}

/// Remove ANSI escape sequences and surrounding whitespace. Escapes that are
/// unterminated or not recognized are left in place.
pub fn strip_line(line: &str) -> String {
    ANSI_ESCAPE.replace_all(line, "").trim().to_string()
}
