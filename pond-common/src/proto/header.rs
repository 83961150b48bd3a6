use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// `id(u16 be) command(u16 be) size(u16 be)`, exactly 6 bytes, followed by
/// `size` bytes of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PondHeader {
    pub id: u16,
    pub command: u16,
    pub size: u16,
}

impl PondHeader {
    pub const ENCODED_SIZE: usize = 6;

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.id);
        buf.put_u16(self.command);
        buf.put_u16(self.size);
    }

    /// Decodes a header from exactly [`Self::ENCODED_SIZE`] bytes. Callers
    /// are responsible for buffering at least that many bytes first; this
    /// never partially consumes `buf`.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        if buf.remaining() < Self::ENCODED_SIZE {
            return Err(ProtocolError::WrongPayloadSize {
                expected: Self::ENCODED_SIZE,
                got: buf.remaining(),
            });
        }
        Ok(PondHeader {
            id: buf.get_u16(),
            command: buf.get_u16(),
            size: buf.get_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let h = PondHeader { id: 42, command: 3, size: 100 };
        let mut buf = Vec::new();
        h.encode_into(&mut buf);
        assert_eq!(buf.len(), PondHeader::ENCODED_SIZE);
        let mut slice = &buf[..];
        assert_eq!(PondHeader::decode(&mut slice).unwrap(), h);
    }
}
