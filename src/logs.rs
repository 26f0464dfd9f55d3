// ABOUTME: Log interpreter: build output collection and runtime log demultiplexing.
// ABOUTME: The demultiplexer is a pure function that degrades on malformed input instead of failing.

use crate::runtime::{BuildEvent, BuildStream};
use futures::StreamExt;

/// Size of the frame header on multiplexed runtime logs.
const HEADER_LEN: usize = 8;

const STREAM_STDERR: u8 = 2;

/// Marker prefixed to every line that came from stderr.
pub const STDERR_PREFIX: &str = "[stderr] ";

/// Everything read from a build's output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedBuildLog {
    /// Output lines, newline-joined, in the order the runtime sent them.
    pub log: String,
    /// The failure reported by a build instruction, if any.
    pub failure: Option<String>,
    /// Why the stream could not be read to the end, if it couldn't.
    pub read_error: Option<String>,
}

/// Drain a build stream into a single log text.
///
/// Stops at the first read error and keeps whatever was collected before it.
pub async fn collect_build_log(mut stream: BuildStream<'_>) -> CollectedBuildLog {
    let mut lines: Vec<String> = Vec::new();
    let mut collected = CollectedBuildLog::default();

    while let Some(item) = stream.next().await {
        match item {
            Ok(BuildEvent::Output(chunk)) => push_chunk(&mut lines, &chunk),
            Ok(BuildEvent::Failed(message)) => {
                push_chunk(&mut lines, &message);
                collected.failure.get_or_insert(message);
            }
            Err(e) => {
                collected.read_error = Some(e.to_string());
                break;
            }
        }
    }

    collected.log = lines.join("\n");
    collected
}

fn push_chunk(lines: &mut Vec<String>, chunk: &str) {
    let chunk = chunk.strip_suffix('\n').unwrap_or(chunk);
    if chunk.is_empty() {
        return;
    }
    lines.extend(chunk.split('\n').map(str::to_string));
}

/// Why a runtime log buffer was only partly decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DemuxError {
    /// Fewer than eight bytes were left where a header should start.
    #[error("truncated frame header: {remaining} trailing bytes")]
    TruncatedHeader { remaining: usize },

    /// A frame declared more payload than the buffer holds.
    #[error("truncated frame: declared {declared} bytes, {available} available")]
    TruncatedPayload { declared: usize, available: usize },

    /// Bytes at `offset` do not form a frame header.
    #[error("invalid frame header at byte {offset}")]
    InvalidHeader { offset: usize },
}

/// Result of demultiplexing a runtime log buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemuxOutput {
    /// Decoded lines, stderr lines carrying [`STDERR_PREFIX`].
    pub lines: Vec<String>,
    /// Set when part of the buffer had to be decoded best-effort.
    pub error: Option<DemuxError>,
}

impl DemuxOutput {
    /// Lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Decode a runtime log buffer into plain text lines.
///
/// Multiplexed buffers are walked frame by frame: byte 0 selects the stream
/// (0 stdin, 1 stdout, 2 stderr), bytes 1-3 are zero, bytes 4-7 hold the
/// big-endian payload length. A buffer that does not start with such a
/// header came from a TTY container and is decoded as plain text.
///
/// Payloads are split on `\n`, trailing `\r`s are stripped, and empty lines
/// are dropped. Truncated or corrupt trailing data is decoded as far as
/// possible and reported through [`DemuxOutput::error`].
pub fn demux_runtime_log(buf: &[u8]) -> DemuxOutput {
    if !is_header(buf) {
        if is_header_prefix(buf) {
            return DemuxOutput {
                lines: Vec::new(),
                error: Some(DemuxError::TruncatedHeader {
                    remaining: buf.len(),
                }),
            };
        }
        return decode_plain_text(buf);
    }

    let mut out = DemuxOutput::default();

    let mut pos = 0;
    while pos < buf.len() {
        let rest = &buf[pos..];

        if rest.len() < HEADER_LEN {
            let visible: Vec<u8> = rest
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_control() || *b == b'\n')
                .collect();
            push_text(&mut out.lines, &visible, false);
            out.error = Some(DemuxError::TruncatedHeader {
                remaining: rest.len(),
            });
            break;
        }

        if !is_header(rest) {
            push_text(&mut out.lines, rest, false);
            out.error = Some(DemuxError::InvalidHeader { offset: pos });
            break;
        }

        let stderr = rest[0] == STREAM_STDERR;
        let declared = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let available = rest.len() - HEADER_LEN;
        let take = declared.min(available);

        push_text(&mut out.lines, &rest[HEADER_LEN..HEADER_LEN + take], stderr);

        if declared > available {
            out.error = Some(DemuxError::TruncatedPayload {
                declared,
                available,
            });
            break;
        }
        pos += HEADER_LEN + declared;
    }

    out
}

/// Decode bytes that carry no frame headers: TTY output, or text this
/// module already produced.
///
/// Applies the same line rules as [`demux_runtime_log`], so decoding its
/// [`DemuxOutput::text`] again yields the same lines.
pub fn decode_plain_text(buf: &[u8]) -> DemuxOutput {
    let mut out = DemuxOutput::default();
    push_text(&mut out.lines, buf, false);
    out
}

fn is_header(buf: &[u8]) -> bool {
    buf.len() >= HEADER_LEN && buf[0] <= STREAM_STDERR && buf[1..4] == [0, 0, 0]
}

/// A buffer cut off inside its first header.
fn is_header_prefix(buf: &[u8]) -> bool {
    !buf.is_empty()
        && buf.len() < HEADER_LEN
        && buf[0] <= STREAM_STDERR
        && buf[1..buf.len().min(4)].iter().all(|b| *b == 0)
}

fn push_text(lines: &mut Vec<String>, payload: &[u8], stderr: bool) {
    let text = String::from_utf8_lossy(payload);
    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if stderr {
            lines.push(format!("{}{}", STDERR_PREFIX, line));
        } else {
            lines.push(line.to_string());
        }
    }
}
