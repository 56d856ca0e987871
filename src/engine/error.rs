//! Typed error hierarchy for the verification engine.
//!
//! Every variant maps to one of the five error kinds in the design: a
//! caller that only cares about the coarse kind can match on
//! [`PamTotpError::kind`] rather than the variant itself. None of these
//! messages ever carry the secret, the submitted code, or a scratch code.

use std::fmt;

/// Coarse error classification used for audit logging and verdict mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Environment,
    Protocol,
    Policy,
    Mismatch,
    Transient,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Environment => "environment",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Policy => "policy",
            ErrorKind::Mismatch => "mismatch",
            ErrorKind::Transient => "transient",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PamTotpError {
    #[error("unknown module option: {0}")]
    UnknownOption(String),

    #[error("malformed option value for {key}: {reason}")]
    MalformedOption { key: &'static str, reason: &'static str },

    #[error("no home directory for user")]
    NoHomeDir,

    #[error("state file not found or unreadable: {0}")]
    StateFileUnreadable(std::io::Error),

    #[error("state file has wrong ownership or permissions")]
    WrongOwnerOrMode,

    #[error("state file size out of bounds")]
    SizeOutOfBounds,

    #[error("state file contains a NUL byte")]
    ContainsNul,

    #[error("no verification code supplied")]
    NoCode,

    #[error("verification code is not numeric")]
    NonNumericCode,

    #[error("verification code is out of range")]
    CodeOutOfRange,

    #[error("rate limit exceeded, try again later")]
    RateLimitExceeded,

    #[error("code already used (replay)")]
    ReplayDetected,

    #[error("code did not match any accepted window")]
    NoWindowMatch,

    #[error("account is not configured for time-based codes")]
    NotTotpAccount,

    #[error("out of memory")]
    OutOfMemory,

    #[error("concurrent modification lost the commit race")]
    CommitRaceLost,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("privilege drop failed: {0}")]
    Privilege(String),
}

impl PamTotpError {
    pub fn kind(&self) -> ErrorKind {
        use PamTotpError::*;
        match self {
            UnknownOption(_) | MalformedOption { .. } => ErrorKind::Configuration,
            NoHomeDir
            | StateFileUnreadable(_)
            | WrongOwnerOrMode
            | SizeOutOfBounds
            | ContainsNul
            | Io(_)
            | Privilege(_) => ErrorKind::Environment,
            NoCode | NonNumericCode | CodeOutOfRange => ErrorKind::Protocol,
            RateLimitExceeded | ReplayDetected => ErrorKind::Policy,
            NoWindowMatch | NotTotpAccount => ErrorKind::Mismatch,
            OutOfMemory | CommitRaceLost => ErrorKind::Transient,
        }
    }
}

pub type Result<T> = std::result::Result<T, PamTotpError>;
