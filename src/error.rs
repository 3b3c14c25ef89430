//! The error and result types used throughout this crate.

use std::{fmt, result};

/// The error kinds produced while parsing, re-serializing or demangling.
///
/// Non-exhaustive: new variants may be added without a breaking change.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The file does not begin with a recognized Mach-O or fat magic number.
    NotMachO,
    /// The magic number is recognized but names an unsupported file kind
    /// (e.g. a byte order or bitness this build does not decode).
    UnsupportedVariant,
    /// A read extended past the end of the file or the current slice.
    TruncatedFile,
    /// A fixed-size on-disk record failed its length or layout check.
    MalformedRecord(&'static str),
    /// A load command's stored length did not match the fixed size implied
    /// by its tag.
    BadLoadCommandLength,
    /// A `__z*` section's compression header or stream was invalid.
    BadCompression(&'static str),
    /// A VM address has no segment mapping.
    AddressOutOfMap(u64),
    /// The Swift mangling grammar was violated at the given byte offset.
    MangledParseError {
        /// Byte offset into the mangled input at which parsing failed.
        offset: usize,
        /// A short, human-readable description of what was expected.
        reason: &'static str,
    },
    /// A symbolic-reference resolver returned an error.
    ResolverFailure,
    /// An operation was attempted on a `File` after its backing storage was
    /// closed (see the concurrency/resource model).
    ClosedFile,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotMachO => write!(f, "not a Mach-O file"),
            Error::UnsupportedVariant => write!(f, "unsupported Mach-O variant"),
            Error::TruncatedFile => write!(f, "truncated file or short read"),
            Error::MalformedRecord(what) => write!(f, "malformed record: {}", what),
            Error::BadLoadCommandLength => write!(f, "load command length mismatch"),
            Error::BadCompression(what) => write!(f, "bad compression: {}", what),
            Error::AddressOutOfMap(addr) => {
                write!(f, "address {:#x} is not mapped by any segment", addr)
            }
            Error::MangledParseError { offset, reason } => {
                write!(f, "mangled name parse error at byte {}: {}", offset, reason)
            }
            Error::ResolverFailure => write!(f, "symbolic reference resolver failed"),
            Error::ClosedFile => write!(f, "operation on a closed file"),
        }
    }
}

impl std::error::Error for Error {}

/// The result type used throughout this crate.
pub type Result<T> = result::Result<T, Error>;

/// Adapts a fallible primitive operation (bounds check, UTF-8 decode, ...)
/// into this crate's [`Error`], so a `.ok_or(Error::TruncatedFile)`-style
/// chain can be written as a single `.read_error(...)` call instead.
pub(crate) trait ReadError<T> {
    fn read_error(self, error: Error) -> Result<T>;
}

impl<T> ReadError<T> for result::Result<T, ()> {
    fn read_error(self, error: Error) -> Result<T> {
        self.map_err(|()| error)
    }
}

impl<T> ReadError<T> for Option<T> {
    fn read_error(self, error: Error) -> Result<T> {
        self.ok_or(error)
    }
}
