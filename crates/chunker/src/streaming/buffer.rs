//! Line buffer over a pull-based text source.

use mdchunk_core::{AppError, AppResult};
use std::io::{BufRead, ErrorKind};

/// Holds the unconsumed lines of the active window.
///
/// Lines are stored without terminators; `\r\n` and lone `\r` both end a line.
pub struct BufferManager<R> {
    reader: R,
    lines: Vec<String>,
    chars: usize,
    bytes: usize,
    /// 1-indexed source line number of `lines[0]`
    first_line: usize,
    eof: bool,
}

impl<R: BufRead> BufferManager<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            lines: Vec::new(),
            chars: 0,
            bytes: 0,
            first_line: 1,
            eof: false,
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Buffered characters, one per line terminator included.
    pub fn chars(&self) -> usize {
        self.chars
    }

    /// Buffered bytes, one per line terminator included.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn first_line(&self) -> usize {
        self.first_line
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Read until at least `target` characters are buffered or the source ends.
    pub fn fill(&mut self, target: usize) -> AppResult<()> {
        while self.chars < target && self.read_line()? {}
        Ok(())
    }

    /// Read one source line; `false` once the source is exhausted.
    pub fn read_line(&mut self) -> AppResult<bool> {
        if self.eof {
            return Ok(false);
        }

        let mut buf = String::new();
        let read = self.reader.read_line(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => {
                AppError::InputValidation(format!("stream is not valid UTF-8: {}", e))
            }
            _ => AppError::Io(e),
        })?;

        if read == 0 {
            self.eof = true;
            return Ok(false);
        }

        if buf.contains('\0') {
            return Err(AppError::InputValidation(
                "stream contains NUL bytes and is not text".to_string(),
            ));
        }

        if buf.ends_with('\n') {
            buf.pop();
        }
        if buf.ends_with('\r') {
            buf.pop();
        }

        if buf.contains('\r') {
            for part in buf.split('\r') {
                self.push(part.to_string());
            }
        } else {
            self.push(buf);
        }

        Ok(true)
    }

    fn push(&mut self, line: String) {
        self.chars += line.chars().count() + 1;
        self.bytes += line.len() + 1;
        self.lines.push(line);
    }

    /// Remove and return the first `count` lines.
    pub fn take(&mut self, count: usize) -> Vec<String> {
        let count = count.min(self.lines.len());
        let rest = self.lines.split_off(count);
        let taken = std::mem::replace(&mut self.lines, rest);

        for line in &taken {
            self.chars -= line.chars().count() + 1;
            self.bytes -= line.len() + 1;
        }
        self.first_line += taken.len();

        taken
    }
}
