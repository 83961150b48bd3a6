use strum::FromRepr;

/// `Net::Log::Type` from the wire datagram format and `FILTER_TYPE`'s payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
#[repr(u8)]
pub enum LogType {
    Unspecified = 0,
    HttpAccess = 1,
    HttpError = 2,
    Submission = 3,
}

impl LogType {
    pub fn matches_filter(self, wanted: LogType) -> bool {
        wanted == LogType::Unspecified || wanted == self
    }

    /// The rate limiter in `Database::check_emplace` only throttles
    /// messages of this type.
    pub fn is_rate_limited_kind(self) -> bool {
        self == LogType::HttpError
    }
}

impl Default for LogType {
    fn default() -> Self {
        LogType::Unspecified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_matches_anything() {
        assert!(LogType::HttpAccess.matches_filter(LogType::Unspecified));
        assert!(LogType::HttpError.matches_filter(LogType::HttpError));
        assert!(!LogType::HttpAccess.matches_filter(LogType::HttpError));
    }
}
