//! Replays packets recorded as newline-delimited JSON (one `RawPacket` per line).
//!
//! A line that is not UTF-8 or not a packet record surfaces as
//! [`IdsError::PacketDecode`] and the next call resumes on the following line.

use super::{PacketSource, RawPacket};
use crate::error::{IdsError, Result};
use std::io::BufRead;

pub struct NdjsonReplay<R> {
    reader: R,
    line: Vec<u8>,
    line_no: u64,
}

impl<R: BufRead> NdjsonReplay<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> PacketSource for NdjsonReplay<R> {
    fn next_packet(&mut self) -> Result<Option<RawPacket>> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.line_no;
            let text = std::str::from_utf8(&self.line).map_err(|e| IdsError::PacketDecode {
                line,
                reason: e.to_string(),
            })?;
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|e| IdsError::PacketDecode {
                    line,
                    reason: e.to_string(),
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn invalid_utf8_line_is_skippable() {
        let good = serde_json::to_string(&RawPacket::non_ip(60)).unwrap();
        let mut input = b"\xff\xfe garbage\n".to_vec();
        input.extend_from_slice(good.as_bytes());
        let mut replay = NdjsonReplay::new(Cursor::new(input));

        match replay.next_packet() {
            Err(IdsError::PacketDecode { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected decode error, got {other:?}"),
        }
        assert_eq!(replay.next_packet().unwrap(), Some(RawPacket::non_ip(60)));
        assert!(replay.next_packet().unwrap().is_none());
    }

    #[test]
    fn bad_json_names_its_line() {
        let mut replay = NdjsonReplay::new(Cursor::new("\n\n{\"len\":\n"));
        assert!(matches!(
            replay.next_packet(),
            Err(IdsError::PacketDecode { line: 3, .. })
        ));
    }
}
