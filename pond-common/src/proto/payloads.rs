use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

fn require(buf: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if buf.len() != expected {
        return Err(ProtocolError::WrongPayloadSize { expected, got: buf.len() });
    }
    Ok(())
}

/// Payload for `GROUP_SITE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PondGroupSitePayload {
    pub max_sites: u32,
    pub skip_sites: u32,
}

impl PondGroupSitePayload {
    pub const ENCODED_SIZE: usize = 8;

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, Self::ENCODED_SIZE)?;
        let mut b = buf;
        Ok(Self {
            max_sites: b.get_u32(),
            skip_sites: b.get_u32(),
        })
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.max_sites);
        buf.put_u32(self.skip_sites);
    }
}

/// Payload for `PondResponseCommand::Stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PondStatsPayload {
    pub memory_capacity: u64,
    pub memory_usage: u64,
    pub n_records: u64,
    pub n_received: u64,
    pub n_malformed: u64,
    pub n_discarded: u64,
}

impl PondStatsPayload {
    pub const ENCODED_SIZE: usize = 8 * 6;

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, Self::ENCODED_SIZE)?;
        let mut b = buf;
        Ok(Self {
            memory_capacity: b.get_u64(),
            memory_usage: b.get_u64(),
            n_records: b.get_u64(),
            n_received: b.get_u64(),
            n_malformed: b.get_u64(),
            n_discarded: b.get_u64(),
        })
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.memory_capacity);
        buf.put_u64(self.memory_usage);
        buf.put_u64(self.n_records);
        buf.put_u64(self.n_received);
        buf.put_u64(self.n_malformed);
        buf.put_u64(self.n_discarded);
    }
}

/// Payload for `WINDOW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PondWindowPayload {
    pub max: u64,
    pub skip: u64,
}

impl PondWindowPayload {
    pub const ENCODED_SIZE: usize = 16;

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, Self::ENCODED_SIZE)?;
        let mut b = buf;
        Ok(Self {
            max: b.get_u64(),
            skip: b.get_u64(),
        })
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u64(self.max);
        buf.put_u64(self.skip);
    }
}

/// Payload for `FILTER_HTTP_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PondFilterHttpStatusPayload {
    pub begin: u16,
    pub end: u16,
}

impl PondFilterHttpStatusPayload {
    pub const ENCODED_SIZE: usize = 4;

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        require(buf, Self::ENCODED_SIZE)?;
        let mut b = buf;
        Ok(Self {
            begin: b.get_u16(),
            end: b.get_u16(),
        })
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.begin);
        buf.put_u16(self.end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_site_round_trips() {
        let p = PondGroupSitePayload { max_sites: 10, skip_sites: 1 };
        let mut buf = Vec::new();
        p.encode_into(&mut buf);
        assert_eq!(PondGroupSitePayload::decode(&buf).unwrap(), p);
    }

    #[test]
    fn stats_round_trips() {
        let p = PondStatsPayload {
            memory_capacity: 1,
            memory_usage: 2,
            n_records: 3,
            n_received: 4,
            n_malformed: 5,
            n_discarded: 6,
        };
        let mut buf = Vec::new();
        p.encode_into(&mut buf);
        assert_eq!(PondStatsPayload::decode(&buf).unwrap(), p);
    }

    #[test]
    fn rejects_wrong_size() {
        assert_eq!(
            PondWindowPayload::decode(&[0u8; 4]),
            Err(ProtocolError::WrongPayloadSize { expected: 16, got: 4 })
        );
    }
}
