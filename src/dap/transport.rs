//! `Content-Length` framing shared by the reader thread and the writer.

use std::io::{self, BufRead, Write};

use super::protocol::DapMessage;

const CONTENT_LENGTH: &str = "Content-Length:";

/// Read one framed message. `Ok(None)` means the stream ended.
///
/// Frames whose body is not a valid message are skipped.
pub fn read_message<R: BufRead>(reader: &mut R) -> io::Result<Option<DapMessage>> {
    loop {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                if content_length.is_some() {
                    break;
                }
                continue;
            }
            if let Some(len) = line.strip_prefix(CONTENT_LENGTH) {
                content_length = len.trim().parse().ok();
            }
        }

        let mut buffer = vec![0u8; content_length.unwrap_or(0)];
        reader.read_exact(&mut buffer)?;
        match serde_json::from_slice(&buffer) {
            Ok(msg) => return Ok(Some(msg)),
            Err(e) => tracing::warn!(error = %e, "Dropping undecodable DAP frame"),
        }
    }
}

/// Write one framed message and flush.
pub fn write_message<W: Write>(writer: &mut W, msg: &DapMessage) -> io::Result<()> {
    let json = serde_json::to_string(msg)?;
    write!(writer, "{CONTENT_LENGTH} {}\r\n\r\n{json}", json.len())?;
    writer.flush()
}
