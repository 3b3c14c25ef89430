//! Mach-O object file support.
//!
//! Submodules mirror the distilled component list: byte-level plumbing
//! (`address`, `raw`, `constants`), the load-command decoder
//! (`load_command`, `section`, `segment`, `relocation`, `symbol`), the
//! assembled file view (`file`), and the two lazily-parsed LINKEDIT
//! subsystems (`compression`, `code_signature`, `reflect`).

pub mod address;
pub mod code_signature;
pub mod compression;
pub mod constants;
pub mod file;
pub mod load_command;
pub mod raw;
pub mod reflect;
pub mod relocation;
pub mod section;
pub mod segment;
pub mod symbol;
