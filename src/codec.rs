//! Streaming framers that turn raw bytes into complete `Message`s.
//!
//! `LineFramer` handles newline-delimited JSON (stdio, and the decoded body
//! of each SSE `data:` block). `SseFramer` sits in front of it and
//! reassembles `event:`/`data:` blocks per the SSE spec before handing a
//! complete JSON body to the line framer's caller.

use crate::error::McpError;
use crate::message::Message;

/// Default cap on a single frame, matching `ServerInfo.maxFrameBytes`.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Accumulates bytes and yields complete newline-delimited JSON messages.
pub struct LineFramer {
    buf: Vec<u8>,
    max_frame_bytes: usize,
}

impl LineFramer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_bytes,
        }
    }

    /// Feed a chunk of bytes, returning zero or more complete messages.
    /// Any incomplete trailing line is buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Message>, McpError> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            let newline_pos = self.buf.iter().position(|&b| b == b'\n');
            let Some(pos) = newline_pos else {
                if self.buf.len() > self.max_frame_bytes {
                    return Err(McpError::FrameTooLarge {
                        limit: self.max_frame_bytes,
                    });
                }
                break;
            };

            if pos > self.max_frame_bytes {
                return Err(McpError::FrameTooLarge {
                    limit: self.max_frame_bytes,
                });
            }

            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1]; // strip the \n
            let line = trim_trailing_cr(line);
            if line.is_empty() {
                continue;
            }
            out.push(Message::decode(line)?);
        }

        Ok(out)
    }
}

fn trim_trailing_cr(line: &[u8]) -> &[u8] {
    if line.last() == Some(&b'\r') {
        &line[..line.len() - 1]
    } else {
        line
    }
}

/// One parsed SSE event block.
#[derive(Debug, Default)]
struct RawSseEvent {
    event: Option<String>,
    data_lines: Vec<String>,
}

impl RawSseEvent {
    fn data(&self) -> String {
        self.data_lines.join("\n")
    }
}

/// Output of feeding a chunk into the SSE framer.
pub enum SseEvent {
    /// A `message` event whose data decoded to a complete JSON-RPC frame.
    Frame(Message),
    /// The server's `endpoint` event, advertising the companion POST URL.
    Endpoint(String),
}

/// Reassembles `text/event-stream` byte chunks into SSE events, per SSE §6:
/// consecutive `data:` lines within one block are joined with `\n` before
/// the payload is parsed. Event types other than `message`/`endpoint` are
/// ignored.
pub struct SseFramer {
    buf: Vec<u8>,
    current: RawSseEvent,
    max_frame_bytes: usize,
}

impl SseFramer {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            current: RawSseEvent::default(),
            max_frame_bytes,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, McpError> {
        self.buf.extend_from_slice(chunk);
        if self.buf.len() > self.max_frame_bytes {
            return Err(McpError::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }

        let mut out = Vec::new();

        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = trim_trailing_cr(&line[..line.len() - 1]);
            let line = String::from_utf8_lossy(line).into_owned();

            if line.is_empty() {
                // Blank line terminates the event block.
                if let Some(sse_event) = self.dispatch_current()? {
                    out.push(sse_event);
                }
                self.current = RawSseEvent::default();
                continue;
            }

            if let Some(rest) = line.strip_prefix("event:") {
                self.current.event = Some(rest.trim_start().to_string());
            } else if let Some(rest) = line.strip_prefix("data:") {
                self.current.data_lines.push(rest.trim_start().to_string());
            }
            // Other fields (id:, retry:, comments starting with ':') are ignored.
        }

        Ok(out)
    }

    fn dispatch_current(&self) -> Result<Option<SseEvent>, McpError> {
        if self.current.data_lines.is_empty() {
            return Ok(None);
        }
        let data = self.current.data();
        match self.current.event.as_deref() {
            Some("endpoint") => Ok(Some(SseEvent::Endpoint(data))),
            Some("message") | None => Ok(Some(SseEvent::Frame(Message::decode(data.as_bytes())?))),
            Some(_) => Ok(None),
        }
    }
}
