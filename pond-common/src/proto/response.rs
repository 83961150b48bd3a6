use strum::FromRepr;

/// Server-to-client commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u16)]
pub enum PondResponseCommand {
    Nop = 0,
    Error = 1,
    End = 2,
    LogRecord = 3,
    Stats = 4,
}
