//! Error types for the relocator.
//!
//! This module defines every error this crate can raise, from the one
//! fatal core condition through the collaborator (container, plan)
//! parsing failures.

use thiserror::Error;

/// Primary error type for this crate.
#[derive(Debug, Error)]
pub enum RelocatorError {
    /// The input image is malformed: `data_end <= original_base`, or the
    /// byte buffer is empty. The only condition the core itself treats
    /// as fatal rather than resolving silently.
    #[error("malformed image: {reason}")]
    MalformedImage { reason: String },

    /// A relocation job was submitted with no entry points.
    #[error("relocation job has no entry points")]
    EmptyEntryPoints,

    /// `sid_offset` was not one of the four legal page offsets.
    #[error("invalid SID offset 0x{value:02X}, expected one of 0x00, 0x20, 0x40, 0x60")]
    InvalidSidOffset { value: u8 },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The PSID/RSID container header failed to parse.
    #[error("invalid container: {message}")]
    InvalidContainer { message: String },

    /// The container's declared format version is not one this crate
    /// understands.
    #[error("unsupported PSID/RSID version {version}")]
    UnsupportedPsidVersion { version: u16 },

    /// The container declared more data than the file actually holds.
    #[error("truncated container: expected at least {expected} bytes, got {actual}")]
    TruncatedContainer { expected: usize, actual: usize },

    /// A relocation plan document failed to parse.
    #[error("invalid relocation plan: {message}")]
    PlanParseError { message: String },
}

/// Result type alias for operations in this crate.
pub type Result<T> = std::result::Result<T, RelocatorError>;
