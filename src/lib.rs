//! A Mach-O object file reader/writer with a Swift ABI name demangler.
//!
//! The crate is two mostly-independent halves:
//!
//! - [`macho`] (plus [`fat`], [`endian`], [`pod`] and [`error`]) reads (and,
//!   with the `write` feature, re-serializes) Mach-O and fat-archive
//!   container structure: headers, load commands, segments/sections, the
//!   symbol table, relocations, the code-signature super-blob and Swift
//!   reflection metadata.
//! - [`demangle`] turns a Swift-mangled symbol or type string into a node
//!   tree ([`demangle::Arena`]) and back into readable text
//!   ([`demangle::format`]), independently of whether a `File` is ever
//!   involved.
//!
//! [`demangle::MachOResolver`] is the one bridge between the two: it lets a
//! caller who already has a [`macho::file::File`] resolve a mangled name's
//! symbolic references against that file's own reflection sections.
//!
//! # Features
//!
//! - `read` (default): parse Mach-O/fat files.
//! - `write` (default, implies `std`): re-serialize load commands back to
//!   bytes (`LoadCommand::write`).
//! - `compression` (default, implies `std`): decompress `__z*` sections
//!   with `flate2`.
//! - `std`: enables `log`-based diagnostics and the `std::error::Error`
//!   impl on [`error::Error`].
//! - `unaligned`: treat all on-disk records as potentially unaligned reads.
//! - `all`: every user-facing feature above.

#[cfg(feature = "read_core")]
pub mod demangle;
#[cfg(feature = "read_core")]
pub mod endian;
#[cfg(feature = "read_core")]
pub mod error;
#[cfg(feature = "read_core")]
pub mod fat;
#[cfg(feature = "read_core")]
pub mod macho;
#[cfg(feature = "read_core")]
pub mod pod;

#[cfg(feature = "read_core")]
pub use error::{Error, Result};
#[cfg(feature = "read_core")]
pub use macho::file::{File, FileTOC, FileTOCOwned};

/// Open a Mach-O (or fat-container) file already read into memory.
///
/// `data` is borrowed for the lifetime of the returned handle; callers
/// reading from disk typically `mmap` or `fs::read` first and hand the
/// resulting bytes here, mirroring a typical `File::parse` entry point
/// in this style of reader.
#[cfg(feature = "read_core")]
pub fn open(data: &[u8]) -> Result<FileTOCOwned> {
    FileTOCOwned::parse(data)
}
