/// HTTP methods recognized by `FILTER_HTTP_METHODS`'s bitmask payload. Bit
/// position equals the enum's discriminant, matching the wire's `u32 mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HttpMethod {
    Get = 0,
    Head = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
    Options = 5,
    Trace = 6,
    Connect = 7,
    Patch = 8,
    Propfind = 9,
    Proppatch = 10,
    Mkcol = 11,
    Copy = 12,
    Move = 13,
    Lock = 14,
    Unlock = 15,
    Report = 16,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 17] = [
        HttpMethod::Get,
        HttpMethod::Head,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Trace,
        HttpMethod::Connect,
        HttpMethod::Patch,
        HttpMethod::Propfind,
        HttpMethod::Proppatch,
        HttpMethod::Mkcol,
        HttpMethod::Copy,
        HttpMethod::Move,
        HttpMethod::Lock,
        HttpMethod::Unlock,
        HttpMethod::Report,
    ];

    pub fn bit(self) -> u32 {
        1u32 << (self as u8)
    }

    pub fn from_bit(bit: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| *m as u8 == bit)
    }

    /// RFC 9110 §9.2.1: GET, HEAD, OPTIONS, TRACE are the "safe" methods;
    /// everything else is unsafe. `PROPFIND` is also safe per RFC 4918.
    pub fn is_unsafe(self) -> bool {
        !matches!(
            self,
            HttpMethod::Get | HttpMethod::Head | HttpMethod::Options | HttpMethod::Trace | HttpMethod::Propfind
        )
    }
}

/// A bitmask over [`HttpMethod`], as carried by `FILTER_HTTP_METHODS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct HttpMethodMask(u32);

impl HttpMethodMask {
    pub fn from_raw(mask: u32) -> Self {
        HttpMethodMask(mask)
    }

    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub fn contains(self, m: HttpMethod) -> bool {
        self.0 & m.bit() != 0
    }
}

impl FromIterator<HttpMethod> for HttpMethodMask {
    fn from_iter<I: IntoIterator<Item = HttpMethod>>(iter: I) -> Self {
        HttpMethodMask(iter.into_iter().fold(0u32, |acc, m| acc | m.bit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsafe_classification_matches_rfc9110() {
        assert!(!HttpMethod::Get.is_unsafe());
        assert!(!HttpMethod::Head.is_unsafe());
        assert!(!HttpMethod::Options.is_unsafe());
        assert!(!HttpMethod::Trace.is_unsafe());
        assert!(HttpMethod::Post.is_unsafe());
        assert!(HttpMethod::Put.is_unsafe());
        assert!(HttpMethod::Delete.is_unsafe());
        assert!(HttpMethod::Patch.is_unsafe());
    }

    #[test]
    fn mask_round_trips_through_raw_bits() {
        let mask: HttpMethodMask = [HttpMethod::Get, HttpMethod::Post].into_iter().collect();
        let raw = mask.as_raw();
        assert_eq!(raw, HttpMethod::Get.bit() | HttpMethod::Post.bit());
        assert!(HttpMethodMask::from_raw(raw).contains(HttpMethod::Get));
        assert!(!HttpMethodMask::from_raw(raw).contains(HttpMethod::Delete));
    }
}
