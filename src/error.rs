use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the fiscal protocol crate.
///
/// Mirrors the three disjoint error kinds of the protocol design: protocol
/// framing errors (handled at the link layer, never surfaced past it),
/// fiscal errors (carried as a status-word bit, the reply is still
/// produced), and communication errors (host-side, fatal to the current
/// exchange).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("fiscal error: {0}")]
    Fiscal(#[from] FiscalError),

    #[error("communication error: {0}")]
    Communication(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    pub fn communication<S: Into<String>>(message: S) -> Self {
        Self::Communication(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serialport::Error> for Error {
    fn from(err: serialport::Error) -> Self {
        Self::Io(format!("serial port error: {err}"))
    }
}

/// Errors raised while encoding/decoding a wire frame.
///
/// These never cross the link-layer boundary on their own: the device side
/// answers with NAK and keeps reading; the host side counts a retry.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("bad block check character")]
    BadBcc,
    #[error("malformed frame")]
    Malformed,
    #[error("sequence number mismatch")]
    SequenceMismatch,
    #[error("opcode or sequence number out of range")]
    OutOfRange,
}

/// A fiscal-layer error: surfaces as a status-word bit in the reply, the
/// command still replies. `error_state` names the flag dispatch (C6) must
/// set before building the reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FiscalError {
    pub kind: FiscalErrorKind,
    pub message: String,
}

impl FiscalError {
    pub fn new<S: Into<String>>(kind: FiscalErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Name of the status-word flag this error must set, if any.
    ///
    /// `NotImplemented` sets no flag of its own in the modeled subset; the
    /// device still answers, it simply hasn't performed the action.
    pub fn error_state(&self) -> Option<&'static str> {
        self.kind.status_flag()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalErrorKind {
    UnknownCommand,
    NotValidData,
    NotValidCommand,
    NotImplemented,
    BadDate,
    OverflowOfTotal,
}

impl FiscalErrorKind {
    pub fn status_flag(&self) -> Option<&'static str> {
        match self {
            Self::UnknownCommand => Some("unknown-command"),
            Self::NotValidData => Some("not-valid-data"),
            Self::NotValidCommand => Some("not-valid-command"),
            Self::NotImplemented => None,
            Self::BadDate => Some("bad-date"),
            Self::OverflowOfTotal => Some("overflow-of-total"),
        }
    }
}

impl fmt::Display for FiscalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownCommand => "unknown command",
            Self::NotValidData => "not valid data",
            Self::NotValidCommand => "not valid command",
            Self::NotImplemented => "not implemented",
            Self::BadDate => "bad date",
            Self::OverflowOfTotal => "overflow of total",
        };
        write!(f, "{s}")
    }
}

/// Convenience constructors matching the original driver's exception
/// hierarchy (`UnknownCommandError`, `NotValidDataError`, ...).
impl FiscalError {
    pub fn unknown_command<S: Into<String>>(message: S) -> Self {
        Self::new(FiscalErrorKind::UnknownCommand, message)
    }

    pub fn not_valid_data<S: Into<String>>(message: S) -> Self {
        Self::new(FiscalErrorKind::NotValidData, message)
    }

    pub fn not_valid_command<S: Into<String>>(message: S) -> Self {
        Self::new(FiscalErrorKind::NotValidCommand, message)
    }

    pub fn not_implemented<S: Into<String>>(message: S) -> Self {
        Self::new(FiscalErrorKind::NotImplemented, message)
    }

    pub fn bad_date<S: Into<String>>(message: S) -> Self {
        Self::new(FiscalErrorKind::BadDate, message)
    }
}
