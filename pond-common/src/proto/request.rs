use strum::FromRepr;

/// Client-to-server commands. Codes are fixed on the wire so that
/// `pond-server` can interoperate with existing Pond clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u16)]
pub enum PondRequestCommand {
    Nop = 0,
    Commit = 1,
    Cancel = 2,
    Query = 3,
    FilterSite = 4,
    Follow = 5,
    FilterSince = 6,
    FilterUntil = 7,
    GroupSite = 8,
    Clone = 9,
    FilterType = 10,
    InjectLogRecord = 11,
    Stats = 12,
    Window = 13,
    CancelOperation = 14,
    FilterHttpStatus = 15,
    FilterHttpUriStartsWith = 16,
    FilterHost = 17,
    FilterGenerator = 18,
    FilterDurationLonger = 19,
    Continue = 20,
    Last = 21,
    FilterHttpMethodUnsafe = 22,
    FilterHttpMethods = 23,
    FilterHttpUri = 24,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_wire_table() {
        assert_eq!(PondRequestCommand::Nop as u16, 0);
        assert_eq!(PondRequestCommand::FilterHttpUri as u16, 24);
        assert_eq!(PondRequestCommand::from_repr(9), Some(PondRequestCommand::Clone));
        assert_eq!(PondRequestCommand::from_repr(25), None);
    }
}
