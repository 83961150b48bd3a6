//! Codec for the UDP log datagram payload.
//!
//! Producers serialize one structured log event per datagram. The format is
//! a leading bit-packed flag field naming which optional attributes follow,
//! each in a fixed order, terminated by a free-form message body that runs
//! to the end of the buffer.

use bytes::{Buf, BufMut, Bytes};
use compact_str::CompactString;

use crate::error::DatagramError;
use crate::http_method::HttpMethod;
use crate::log_type::LogType;
use crate::summary::Summary;
use crate::time::{Micros, TimePoint};

/// Declares `const` bit masks and a `RESERVED_MASK` covering everything
/// above the highest named bit, used to reject datagrams from a newer,
/// unknown producer up front rather than silently misparsing them.
macro_rules! bitflags_like {
    ($($name:ident = $bit:expr),+ $(,)?) => {
        $(const $name: u16 = 1 << $bit;)+
        const RESERVED_MASK: u16 = !(0 $(| $name)+);
    };
}

bitflags_like! {
    TIMESTAMP = 0,
    SITE = 1,
    LOG_TYPE = 2,
    HOST = 3,
    GENERATOR = 4,
    HTTP_URI = 5,
    HTTP_METHOD = 6,
    HTTP_STATUS = 7,
    DURATION = 8,
}

/// One parsed log datagram: the cheap [`Summary`] fields plus the
/// additional attributes a full filter match may need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDatagram {
    pub timestamp: Option<TimePoint>,
    pub site: Option<CompactString>,
    pub log_type: LogType,
    pub host: Option<CompactString>,
    pub generator: Option<CompactString>,
    pub http_uri: Option<CompactString>,
    pub http_method: Option<HttpMethod>,
    pub http_status: Option<u16>,
    pub duration: Option<Micros>,
    pub message: Bytes,
}

impl LogDatagram {
    pub fn summary(&self) -> Summary {
        Summary {
            timestamp: self.timestamp,
            site: self.site.clone(),
            log_type: self.log_type,
        }
    }

    pub fn encoded_size(&self) -> usize {
        let mut n = 2; // flags
        if self.timestamp.is_some() {
            n += 8;
        }
        if let Some(s) = &self.site {
            n += 1 + s.len();
        }
        if self.log_type != LogType::Unspecified {
            n += 1;
        }
        if let Some(s) = &self.host {
            n += 1 + s.len();
        }
        if let Some(s) = &self.generator {
            n += 1 + s.len();
        }
        if let Some(s) = &self.http_uri {
            n += 2 + s.len();
        }
        if self.http_method.is_some() {
            n += 1;
        }
        if self.http_status.is_some() {
            n += 2;
        }
        if self.duration.is_some() {
            n += 8;
        }
        n + self.message.len()
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) {
        let mut flags: u16 = 0;
        if self.timestamp.is_some() {
            flags |= TIMESTAMP;
        }
        if self.site.is_some() {
            flags |= SITE;
        }
        if self.log_type != LogType::Unspecified {
            flags |= LOG_TYPE;
        }
        if self.host.is_some() {
            flags |= HOST;
        }
        if self.generator.is_some() {
            flags |= GENERATOR;
        }
        if self.http_uri.is_some() {
            flags |= HTTP_URI;
        }
        if self.http_method.is_some() {
            flags |= HTTP_METHOD;
        }
        if self.http_status.is_some() {
            flags |= HTTP_STATUS;
        }
        if self.duration.is_some() {
            flags |= DURATION;
        }

        buf.put_u16(flags);
        if let Some(ts) = self.timestamp {
            buf.put_u64(ts.as_micros());
        }
        if let Some(s) = &self.site {
            buf.put_u8(s.len() as u8);
            buf.put_slice(s.as_bytes());
        }
        if self.log_type != LogType::Unspecified {
            buf.put_u8(self.log_type as u8);
        }
        if let Some(s) = &self.host {
            buf.put_u8(s.len() as u8);
            buf.put_slice(s.as_bytes());
        }
        if let Some(s) = &self.generator {
            buf.put_u8(s.len() as u8);
            buf.put_slice(s.as_bytes());
        }
        if let Some(s) = &self.http_uri {
            buf.put_u16(s.len() as u16);
            buf.put_slice(s.as_bytes());
        }
        if let Some(m) = self.http_method {
            buf.put_u8(m as u8);
        }
        if let Some(status) = self.http_status {
            buf.put_u16(status);
        }
        if let Some(d) = self.duration {
            buf.put_u64(d.as_micros());
        }
        buf.put_slice(&self.message);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.encoded_size());
        self.encode_into(&mut buf);
        Bytes::from(buf)
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, DatagramError> {
        if buf.len() < 2 {
            return Err(DatagramError::Empty);
        }
        let flags = buf.get_u16();
        if flags & RESERVED_MASK != 0 {
            return Err(DatagramError::ReservedBits);
        }

        let timestamp = if flags & TIMESTAMP != 0 {
            need(&buf, 8)?;
            Some(TimePoint::from_micros(buf.get_u64()))
        } else {
            None
        };

        let site = if flags & SITE != 0 {
            Some(get_string(&mut buf, 1)?)
        } else {
            None
        };

        let log_type = if flags & LOG_TYPE != 0 {
            need(&buf, 1)?;
            let raw = buf.get_u8();
            LogType::from_repr(raw).ok_or(DatagramError::InvalidLogType(raw))?
        } else {
            LogType::Unspecified
        };

        let host = if flags & HOST != 0 {
            Some(get_string(&mut buf, 1)?)
        } else {
            None
        };

        let generator = if flags & GENERATOR != 0 {
            Some(get_string(&mut buf, 1)?)
        } else {
            None
        };

        let http_uri = if flags & HTTP_URI != 0 {
            Some(get_string(&mut buf, 2)?)
        } else {
            None
        };

        let http_method = if flags & HTTP_METHOD != 0 {
            need(&buf, 1)?;
            let raw = buf.get_u8();
            Some(HttpMethod::from_bit(raw).ok_or(DatagramError::InvalidHttpMethod(raw))?)
        } else {
            None
        };

        let http_status = if flags & HTTP_STATUS != 0 {
            need(&buf, 2)?;
            Some(buf.get_u16())
        } else {
            None
        };

        let duration = if flags & DURATION != 0 {
            need(&buf, 8)?;
            Some(Micros::from_micros(buf.get_u64()))
        } else {
            None
        };

        Ok(LogDatagram {
            timestamp,
            site,
            log_type,
            host,
            generator,
            http_uri,
            http_method,
            http_status,
            duration,
            message: buf,
        })
    }
}

fn need(buf: &Bytes, n: usize) -> Result<(), DatagramError> {
    if buf.len() < n {
        Err(DatagramError::Truncated)
    } else {
        Ok(())
    }
}

fn get_string(buf: &mut Bytes, len_bytes: usize) -> Result<CompactString, DatagramError> {
    need(buf, len_bytes)?;
    let len = buf.get_uint(len_bytes) as usize;
    need(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    if raw.contains(&0u8) {
        return Err(DatagramError::EmbeddedNul);
    }
    std::str::from_utf8(&raw)
        .map(CompactString::from)
        .map_err(|_| DatagramError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LogDatagram {
        LogDatagram {
            timestamp: Some(TimePoint::from_micros(1_700_000_000_000_000)),
            site: Some("example.com".into()),
            log_type: LogType::HttpAccess,
            host: Some("www.example.com".into()),
            generator: Some("nginx".into()),
            http_uri: Some("/index.html".into()),
            http_method: Some(HttpMethod::Get),
            http_status: Some(200),
            duration: Some(Micros::from_micros(1234)),
            message: Bytes::from_static(b"hello world"),
        }
    }

    #[test]
    fn round_trips_all_fields() {
        let original = sample();
        let decoded = LogDatagram::decode(original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn round_trips_minimal_datagram() {
        let original = LogDatagram {
            timestamp: None,
            site: None,
            log_type: LogType::Unspecified,
            host: None,
            generator: None,
            http_uri: None,
            http_method: None,
            http_status: None,
            duration: None,
            message: Bytes::new(),
        };
        let decoded = LogDatagram::decode(original.to_bytes()).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn rejects_reserved_bits() {
        let mut raw = vec![0xFFu8, 0xFF];
        raw.extend_from_slice(b"junk");
        assert_eq!(LogDatagram::decode(Bytes::from(raw)), Err(DatagramError::ReservedBits));
    }

    #[test]
    fn rejects_truncated_timestamp() {
        // flags = TIMESTAMP, but only 2 bytes follow instead of the required 8.
        let buf = vec![0x00u8, 0x01, 0, 0];
        assert_eq!(LogDatagram::decode(Bytes::from(buf)), Err(DatagramError::Truncated));
    }

    #[test]
    fn rejects_embedded_nul_in_site() {
        let flags = SITE.to_be_bytes();
        let mut buf = vec![flags[0], flags[1], 1, 0];
        let _ = &mut buf;
        assert_eq!(LogDatagram::decode(Bytes::from(buf)), Err(DatagramError::EmbeddedNul));
    }

    proptest::proptest! {
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..64)) {
            let _ = LogDatagram::decode(Bytes::from(bytes));
        }
    }
}
