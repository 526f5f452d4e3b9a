use std::io;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Every failure the codecs and the container can report.
///
/// Nothing in this crate recovers from these locally; they are classified
/// and handed back to the caller.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed data: {0}")]
    Format(String),

    #[error("Unsupported version {found} (newest supported is {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("Truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: u64, remaining: u64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid texture target bits {0:#05b}")]
    InvalidTarget(u8),

    #[error("Handle is already closed")]
    Closed,

    #[error("No entry named {0:?}")]
    EntryNotFound(String),

    #[error("Entry {0:?} was added twice")]
    DuplicateEntry(String),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
