//! Incremental server-sent events decoder.
//!
//! Bytes arrive from the network in arbitrary chunks. [`SseDecoder`] buffers
//! partial lines across chunks and emits one [`SseFrame`] per blank-line
//! delimited event. Lines are only decoded as UTF-8 once complete, so a
//! multi-byte character split across two chunks decodes correctly.
//!
//! Supported fields: `data`, `event`, `id`, `retry`. Lines starting with `:`
//! are comments (servers use them as keep-alives). Unknown fields are
//! ignored. Line endings may be `\n`, `\r\n`, or `\r`. A UTF-8 byte order
//! mark at the very start of the stream is skipped.
//!
//! A line longer than the decoder's limit is never buffered in full: its
//! bytes are discarded up to the next line ending, the frame it belongs to
//! is dropped, and [`SseDecoder::dropped_frames`] counts it.

/// Default cap on a single line, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the last `event:` line, if any.
    pub event: Option<String>,
    /// Last event id seen on the stream, if any.
    pub id: Option<String>,
    /// All `data:` lines of the frame joined with `\n`.
    pub data: String,
}

/// Stateful byte-to-frame decoder. One decoder per connection.
#[derive(Debug)]
pub struct SseDecoder {
    line: Vec<u8>,
    pending_cr: bool,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
    retry_ms: Option<u64>,
    max_line: usize,
    /// Bytes of the current line are being thrown away.
    overflow: bool,
    /// The current frame lost a line; discard it at the next blank line.
    skip_frame: bool,
    dropped: u64,
    /// At least one line has been seen, so the BOM check is done.
    started: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that drops any line longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            line: Vec::new(),
            pending_cr: false,
            data: Vec::new(),
            event: None,
            last_id: None,
            retry_ms: None,
            max_line,
            overflow: false,
            skip_frame: false,
            dropped: 0,
            started: false,
        }
    }

    /// Feed a chunk of bytes, returning every frame it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            match byte {
                // Second half of a CRLF whose CR ended the previous line.
                b'\n' if self.pending_cr => {
                    self.pending_cr = false;
                }
                b'\n' | b'\r' => {
                    self.pending_cr = byte == b'\r';
                    if self.overflow {
                        self.end_overflow();
                        continue;
                    }
                    let line = std::mem::take(&mut self.line);
                    if let Some(frame) = self.process_line(&line) {
                        frames.push(frame);
                    }
                }
                _ => {
                    self.pending_cr = false;
                    if self.overflow {
                        continue;
                    }
                    if self.line.len() >= self.max_line {
                        self.overflow = true;
                        self.line = Vec::new();
                        continue;
                    }
                    self.line.push(byte);
                }
            }
        }
        frames
    }

    /// Flush at end of stream.
    ///
    /// An unterminated final line is processed, and any buffered data is
    /// dispatched as a last frame even without the closing blank line.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.pending_cr = false;
        if self.overflow {
            self.end_overflow();
        }
        if self.skip_frame {
            self.discard_frame();
            return None;
        }
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    /// Reconnection delay the server asked for, if it sent one.
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    /// Frames discarded because one of their lines was over the limit.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    fn end_overflow(&mut self) {
        self.overflow = false;
        self.started = true;
        if !self.skip_frame {
            self.skip_frame = true;
            self.dropped += 1;
        }
    }

    fn discard_frame(&mut self) {
        self.skip_frame = false;
        self.data.clear();
        self.event = None;
    }

    fn process_line(&mut self, raw: &[u8]) -> Option<SseFrame> {
        let raw = if self.started {
            raw
        } else {
            self.started = true;
            raw.strip_prefix(BOM).unwrap_or(raw)
        };

        if raw.is_empty() {
            if self.skip_frame {
                self.discard_frame();
                return None;
            }
            return self.dispatch();
        }
        if self.skip_frame {
            return None;
        }

        let line = String::from_utf8_lossy(raw);
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_ref(), ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry_ms = Some(ms);
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event,
            id: self.last_id.clone(),
            data,
        })
    }
}
