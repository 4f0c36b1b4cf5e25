// SPDX-License-Identifier: MIT
//! Error taxonomy shared by encode, decode and validation

/// Errors returned by every fallible MDOCX operation.
///
/// Each structural variant maps to exactly one [`ErrorKind`]. I/O failures
/// (including short reads) are carried through untouched.
#[derive(Debug, thiserror::Error)]
pub enum MdocxError {
    #[error("mdocx: invalid magic")]
    InvalidMagic,

    #[error("mdocx: unsupported version {0}")]
    UnsupportedVersion(u16),

    #[error("mdocx: invalid fixed header: {0}")]
    InvalidHeader(String),

    #[error("mdocx: invalid section header: {0}")]
    InvalidSection(String),

    #[error("mdocx: invalid payload: {0}")]
    InvalidPayload(String),

    #[error("mdocx: limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("mdocx: validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fieldless error category, for matching and exit-code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidMagic,
    UnsupportedVersion,
    InvalidHeader,
    InvalidSection,
    InvalidPayload,
    LimitExceeded,
    Validation,
    Io,
}

impl ErrorKind {
    /// Stable, lowercase name of the kind
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::InvalidMagic => "invalid_magic",
            ErrorKind::UnsupportedVersion => "unsupported_version",
            ErrorKind::InvalidHeader => "invalid_header",
            ErrorKind::InvalidSection => "invalid_section",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::Validation => "validation_failed",
            ErrorKind::Io => "io",
        }
    }

    /// Distinct process exit status for command-line front-ends.
    ///
    /// 0 and 1 stay free for success and usage errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::InvalidMagic => 10,
            ErrorKind::UnsupportedVersion => 11,
            ErrorKind::InvalidHeader => 12,
            ErrorKind::InvalidSection => 13,
            ErrorKind::InvalidPayload => 14,
            ErrorKind::LimitExceeded => 15,
            ErrorKind::Validation => 16,
            ErrorKind::Io => 17,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl MdocxError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            MdocxError::InvalidMagic => ErrorKind::InvalidMagic,
            MdocxError::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            MdocxError::InvalidHeader(_) => ErrorKind::InvalidHeader,
            MdocxError::InvalidSection(_) => ErrorKind::InvalidSection,
            MdocxError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            MdocxError::LimitExceeded(_) => ErrorKind::LimitExceeded,
            MdocxError::Validation(_) => ErrorKind::Validation,
            MdocxError::Io(_) => ErrorKind::Io,
            // Serializing a JSON object map only fails on writer errors
            MdocxError::Json(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, MdocxError>;
