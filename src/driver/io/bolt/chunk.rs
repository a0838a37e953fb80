// Copyright Rouven Bauer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, Read, Write};

use super::packstream::{PackStreamDeserializer, PackStreamDeserializerImpl};
use super::response::{BoltMeta, BoltRecordFields};
use crate::value::ValueReceive;
use crate::{Neo4jError, Result};

/// Maximum payload a single chunk may carry.
pub(crate) const MAX_CHUNK_SIZE: usize = 16 * 1024;

/// Write-side framing buffer.
///
/// Accumulates one message's chunks (and the zero-length terminator that ends it) into a single
/// contiguous byte buffer that the Connection can hand to the socket in one `write_all`.
#[derive(Debug)]
pub(crate) struct Outbox {
    buffer: Vec<u8>,
    header: usize,
    start: usize,
    end: usize,
}

impl Outbox {
    pub(crate) fn new() -> Self {
        let mut outbox = Self {
            buffer: Vec::new(),
            header: 0,
            start: 0,
            end: 0,
        };
        outbox.clear();
        outbox
    }

    /// Appends opaque bytes to the currently open chunk, splitting across chunk boundaries (and
    /// opening new chunks) as needed.
    pub(crate) fn write(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let remaining = MAX_CHUNK_SIZE - (self.end - self.start);
            let to_write = bytes.len();
            if remaining == 0 || (remaining < to_write && to_write <= MAX_CHUNK_SIZE) {
                self.chunk();
                continue;
            }
            let n = remaining.min(to_write);
            self.buffer.extend_from_slice(&bytes[..n]);
            self.end += n;
            let chunk_len = (self.end - self.start) as u16;
            self.buffer[self.header..self.header + 2].copy_from_slice(&chunk_len.to_be_bytes());
            bytes = &bytes[n..];
        }
    }

    /// Closes the current chunk (its length header is already correct) and opens the next one,
    /// stamped with a length of zero until more bytes are written into it.
    pub(crate) fn chunk(&mut self) {
        self.header = self.end;
        self.buffer.extend_from_slice(&[0, 0]);
        self.start = self.header + 2;
        self.end = self.start;
    }

    /// The bytes ready to be sent: everything up to (and including) the terminating zero-length
    /// chunk, or up to the still-open header if the current chunk carries no data yet.
    pub(crate) fn view(&self) -> &[u8] {
        if self.end > self.start {
            &self.buffer[..self.end]
        } else {
            &self.buffer[..self.header]
        }
    }

    /// Resets to the initial empty state, ready to accumulate the next message.
    pub(crate) fn clear(&mut self) {
        self.buffer.clear();
        self.buffer.extend_from_slice(&[0, 0]);
        self.header = 0;
        self.start = 2;
        self.end = 2;
    }
}

impl Write for Outbox {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Outbox::write(self, buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A fully-assembled incoming message: either a RECORD's sole field (a list of values) or a
/// summary's signature and metadata.
#[derive(Debug)]
pub(crate) enum InboxMessage {
    Record(BoltRecordFields),
    Summary { signature: u8, meta: BoltMeta },
}

/// Read-side framing buffer.
///
/// Assembles chunks read from any `Read` into messages, amortizing one syscall per chunk by
/// reading each chunk's payload together with the following chunk's length prefix. Does not own
/// the socket: the same reader must be passed to every call so `pending_len` stays meaningful.
#[derive(Debug, Default)]
pub(crate) struct Inbox {
    buffer: Vec<u8>,
    pending_len: Option<u16>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn next_chunk_len<R: Read>(&mut self, reader: &mut R) -> Result<u16> {
        match self.pending_len.take() {
            Some(len) => Ok(len),
            None => {
                let mut len_buf = [0u8; 2];
                Neo4jError::wrap_read(reader.read_exact(&mut len_buf))?;
                Ok(u16::from_be_bytes(len_buf))
            }
        }
    }

    /// Reads one chunk, appending its payload to `self.buffer`. Returns the chunk's length (0 =
    /// end-of-message marker).
    fn load_chunk<R: Read>(&mut self, reader: &mut R) -> Result<u16> {
        let len = self.next_chunk_len(reader)?;
        if len == 0 {
            return Ok(0);
        }
        let start = self.buffer.len();
        self.buffer.resize(start + len as usize + 2, 0);
        Neo4jError::wrap_read(reader.read_exact(&mut self.buffer[start..]))?;
        let tail_at = start + len as usize;
        self.pending_len = Some(u16::from_be_bytes([
            self.buffer[tail_at],
            self.buffer[tail_at + 1],
        ]));
        self.buffer.truncate(tail_at);
        Ok(len)
    }

    /// Reads chunks until the terminator, then decodes the assembled payload into one message.
    pub(crate) fn receive<R: Read>(&mut self, reader: &mut R) -> Result<InboxMessage> {
        self.buffer.clear();
        self.pending_len = None;
        loop {
            let len = self.load_chunk(reader)?;
            if len == 0 {
                break;
            }
        }
        let mut cursor = io::Cursor::new(&self.buffer[..]);
        let mut unpacker = PackStreamDeserializerImpl::new(&mut cursor);
        let (size, signature) = unpacker.read_structure_header()?;
        if signature == 0x71 {
            if size != 1 {
                return Err(Neo4jError::protocol_error(format!(
                    "RECORD structure should have exactly 1 field but found {size}"
                )));
            }
            let record = unpacker.load::<ValueReceive>()?;
            let fields = match record {
                ValueReceive::List(fields) => fields,
                _ => return Err(Neo4jError::protocol_error("RECORD's field was not a List")),
            };
            return Ok(InboxMessage::Record(fields));
        }
        let meta = match size {
            0 => BoltMeta::new(),
            1 => match unpacker.load::<ValueReceive>()? {
                ValueReceive::Map(meta) => meta,
                _ => return Err(Neo4jError::protocol_error("summary metadata was not a Map")),
            },
            _ => {
                return Err(Neo4jError::protocol_error(format!(
                    "summary structure should have 0 or 1 field(s) but found {size}"
                )))
            }
        };
        Ok(InboxMessage::Summary { signature, meta })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"hello".as_slice())]
    #[case(&[0u8; 100])]
    #[case(&[42u8; MAX_CHUNK_SIZE])]
    #[case(&[7u8; MAX_CHUNK_SIZE + 1])]
    #[case(&[9u8; 3 * MAX_CHUNK_SIZE + 17])]
    fn write_chunk_reassembles_to_original(#[case] payload: &[u8]) {
        let mut outbox = Outbox::new();
        outbox.write(payload);
        outbox.chunk();
        outbox.chunk();
        let view = outbox.view();

        let mut reassembled = Vec::new();
        let mut pos = 0;
        loop {
            let len = u16::from_be_bytes([view[pos], view[pos + 1]]) as usize;
            pos += 2;
            if len == 0 {
                break;
            }
            reassembled.extend_from_slice(&view[pos..pos + len]);
            pos += len;
        }
        assert_eq!(reassembled, payload);
        assert_eq!(pos, view.len());
    }

    #[test]
    fn no_chunk_exceeds_max_size() {
        let mut outbox = Outbox::new();
        outbox.write(&[1u8; 5 * MAX_CHUNK_SIZE]);
        outbox.chunk();
        outbox.chunk();
        let view = outbox.view();

        let mut pos = 0;
        loop {
            let len = u16::from_be_bytes([view[pos], view[pos + 1]]) as usize;
            pos += 2;
            if len == 0 {
                break;
            }
            assert!(len <= MAX_CHUNK_SIZE);
            pos += len;
        }
    }

    #[test]
    fn clear_resets_to_empty_message() {
        let mut outbox = Outbox::new();
        outbox.write(b"abc");
        outbox.chunk();
        outbox.chunk();
        outbox.clear();
        assert_eq!(outbox.view(), &[] as &[u8]);
    }

    #[test]
    fn empty_outbox_view_has_no_terminator() {
        let outbox = Outbox::new();
        assert_eq!(outbox.view(), &[] as &[u8]);
    }

    fn chunked(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&[0, 0]);
        buf
    }

    #[test]
    fn inbox_decodes_a_record() {
        // structure tag 0x71 (RECORD), 1 field: a list with a single tiny int
        let payload: &[u8] = &[0xB1, 0x71, 0x91, 0x01];
        let wire = chunked(payload);
        let mut reader = io::Cursor::new(wire);
        let mut inbox = Inbox::new();
        match inbox.receive(&mut reader).unwrap() {
            InboxMessage::Record(fields) => assert_eq!(fields, vec![ValueReceive::Integer(1)]),
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[test]
    fn inbox_decodes_a_success_summary() {
        // structure tag 0x70 (SUCCESS), 1 field: empty map
        let payload: &[u8] = &[0xB1, 0x70, 0xA0];
        let wire = chunked(payload);
        let mut reader = io::Cursor::new(wire);
        let mut inbox = Inbox::new();
        match inbox.receive(&mut reader).unwrap() {
            InboxMessage::Summary { signature, meta } => {
                assert_eq!(signature, 0x70);
                assert!(meta.is_empty());
            }
            other => panic!("expected a summary, got {other:?}"),
        }
    }

    #[test]
    fn inbox_rejects_oversized_record() {
        // structure tag 0x71 (RECORD) claiming 2 fields: a protocol violation
        let payload: &[u8] = &[0xB2, 0x71, 0x91, 0x01, 0x91, 0x02];
        let wire = chunked(payload);
        let mut reader = io::Cursor::new(wire);
        let mut inbox = Inbox::new();
        assert!(matches!(
            inbox.receive(&mut reader),
            Err(Neo4jError::ProtocolError { .. })
        ));
    }

    #[test]
    fn inbox_assembles_multi_chunk_messages() {
        let payload: &[u8] = &[0xB1, 0x70, 0xA0];
        let (first, second) = payload.split_at(2);
        let mut wire = Vec::new();
        wire.extend_from_slice(&(first.len() as u16).to_be_bytes());
        wire.extend_from_slice(first);
        wire.extend_from_slice(&(second.len() as u16).to_be_bytes());
        wire.extend_from_slice(second);
        wire.extend_from_slice(&[0, 0]);
        let mut reader = io::Cursor::new(wire);
        let mut inbox = Inbox::new();
        assert!(matches!(
            inbox.receive(&mut reader).unwrap(),
            InboxMessage::Summary { signature: 0x70, .. }
        ));
    }
}
