//! The load-command decoder.
//!
//! Every command implements four logical operations — `command()`,
//! `load_size()`, `write()`, `raw()` — realized here as inherent `match`
//! functions over one tagged-sum `enum` rather than a trait with
//! per-variant impls: each variant's fields are flat and owned, with no
//! virtual dispatch.

use crate::endian::{Endian, U32, U64};
use crate::error::{Error, ReadError, Result};
use crate::macho::constants::*;
use crate::macho::raw;
use crate::macho::section::Section;
use crate::pod::{self, Bytes};

/// The dylib-family commands all share the same on-disk shape
/// (timestamp, current-version, compatibility-version, name); only the
/// command tag distinguishes their semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DylibKind {
    Load,
    LoadWeak,
    Reexport,
    LazyLoad,
    Upward,
    Id,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DylibData {
    pub kind: DylibKind,
    pub name: Vec<u8>,
    pub timestamp: u32,
    pub current_version: u32,
    pub compatibility_version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DylinkerKind {
    Load,
    Id,
    DyldEnvironment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineStringKind {
    Rpath,
    SubFramework,
    SubUmbrella,
    SubClient,
    SubLibrary,
}

/// The LINKEDIT-pointer family: `(offset, size)` pairs whose payload is
/// parsed lazily on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkeditDataKind {
    CodeSignature,
    SegmentSplitInfo,
    FunctionStarts,
    DataInCode,
    DylibCodeSignDrs,
    LinkerOptimizationHint,
    DyldExportsTrie,
    DyldChainedFixups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMinKind {
    MacOsx,
    IPhoneOs,
    TvOs,
    WatchOs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DyldInfoKind {
    DyldInfo,
    DyldInfoOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    Thread,
    UnixThread,
}

/// One `(flavor, state)` register dump inside an `LC_THREAD`/`LC_UNIXTHREAD`
/// command. `state` is kept opaque; decoding architecture-specific
/// register layouts is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadState {
    pub flavor: u32,
    pub count: u32,
    pub data: Vec<u8>,
}

/// A segment's fixed header fields, independent of 32/64-bitness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentData {
    pub is_64: bool,
    pub segname: [u8; 16],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: u32,
    pub initprot: u32,
    pub flags: u32,
    /// Absolute index of this segment's first section in the file's flat
    /// section list; filled in by `FileTOC::parse`.
    pub firstsect: usize,
    pub sections: Vec<Section>,
}

impl SegmentData {
    /// Segment name with trailing NUL padding stripped.
    pub fn name(&self) -> &str {
        let end = self.segname.iter().position(|&b| b == 0).unwrap_or(16);
        std::str::from_utf8(&self.segname[..end]).unwrap_or("")
    }

    pub fn nsect(&self) -> usize {
        self.sections.len()
    }
}

/// A raw, unrecognized load command. Round-trips losslessly since every
/// byte (including the `(cmd, cmdsize)` preamble) is retained verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub cmd: u32,
    pub bytes: Vec<u8>,
}

/// The tagged sum over every recognized Mach-O load command, plus the
/// `Raw` fallback for anything this crate does not specifically decode
/// (an *unknown-command* error is deliberately downgraded to this variant,
/// not surfaced as an `Error`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LoadCommand {
    Segment(SegmentData),
    Symtab {
        symoff: u32,
        nsyms: u32,
        stroff: u32,
        strsize: u32,
    },
    Dysymtab(DysymtabFields),
    Dylib(DylibData),
    Dylinker {
        kind: DylinkerKind,
        name: Vec<u8>,
    },
    InlineString {
        kind: InlineStringKind,
        text: Vec<u8>,
    },
    Uuid([u8; 16]),
    LinkeditData {
        kind: LinkeditDataKind,
        dataoff: u32,
        datasize: u32,
    },
    EncryptionInfo32 {
        cryptoff: u32,
        cryptsize: u32,
        cryptid: u32,
    },
    EncryptionInfo64 {
        cryptoff: u32,
        cryptsize: u32,
        cryptid: u32,
        pad: u32,
    },
    DyldInfo {
        kind: DyldInfoKind,
        rebase_off: u32,
        rebase_size: u32,
        bind_off: u32,
        bind_size: u32,
        weak_bind_off: u32,
        weak_bind_size: u32,
        lazy_bind_off: u32,
        lazy_bind_size: u32,
        export_off: u32,
        export_size: u32,
    },
    Main {
        entryoff: u64,
        stacksize: u64,
    },
    VersionMin {
        kind: VersionMinKind,
        version: u32,
        sdk: u32,
    },
    BuildVersion {
        platform: u32,
        minos: u32,
        sdk: u32,
        tools: Vec<(u32, u32)>,
    },
    SourceVersion(u64),
    Thread {
        kind: ThreadKind,
        states: Vec<ThreadState>,
    },
    Raw(RawCommand),
}

/// Read a length-prefixed-by-offset C string (the "name-style string"
/// encoding used by dylib/dylinker/rpath/sub_* commands: a 32-bit offset
/// into the command's own bytes, NUL-terminated).
fn read_inline_string<E: Endian>(cmd_bytes: &[u8], offset_field: U32<E>, endian: E) -> Vec<u8> {
    let offset = offset_field.get(endian) as usize;
    match cmd_bytes.get(offset..) {
        Some(data) => match memchr::memchr(0, data) {
            Some(end) => data[..end].to_vec(),
            None => data.to_vec(),
        },
        None => Vec::new(),
    }
}

/// Pad a byte vector length up to the next multiple of `align` (Mach-O
/// pads every load command's `cmdsize` to a pointer-sized multiple).
fn padded_len(len: usize, align: usize) -> usize {
    (len + align - 1) & !(align - 1)
}

impl LoadCommand {
    /// The command's own tag.
    pub fn command(&self) -> u32 {
        match self {
            LoadCommand::Segment(s) => {
                if s.is_64 {
                    LC_SEGMENT_64
                } else {
                    LC_SEGMENT
                }
            }
            LoadCommand::Symtab { .. } => LC_SYMTAB,
            LoadCommand::Dysymtab(_) => LC_DYSYMTAB,
            LoadCommand::Dylib(d) => match d.kind {
                DylibKind::Load => LC_LOAD_DYLIB,
                DylibKind::LoadWeak => LC_LOAD_WEAK_DYLIB,
                DylibKind::Reexport => LC_REEXPORT_DYLIB,
                DylibKind::LazyLoad => LC_LAZY_LOAD_DYLIB,
                DylibKind::Upward => LC_LOAD_UPWARD_DYLIB,
                DylibKind::Id => LC_ID_DYLIB,
            },
            LoadCommand::Dylinker { kind, .. } => match kind {
                DylinkerKind::Load => LC_LOAD_DYLINKER,
                DylinkerKind::Id => LC_ID_DYLINKER,
                DylinkerKind::DyldEnvironment => LC_DYLD_ENVIRONMENT,
            },
            LoadCommand::InlineString { kind, .. } => match kind {
                InlineStringKind::Rpath => LC_RPATH,
                InlineStringKind::SubFramework => LC_SUB_FRAMEWORK,
                InlineStringKind::SubUmbrella => LC_SUB_UMBRELLA,
                InlineStringKind::SubClient => LC_SUB_CLIENT,
                InlineStringKind::SubLibrary => LC_SUB_LIBRARY,
            },
            LoadCommand::Uuid(_) => LC_UUID,
            LoadCommand::LinkeditData { kind, .. } => match kind {
                LinkeditDataKind::CodeSignature => LC_CODE_SIGNATURE,
                LinkeditDataKind::SegmentSplitInfo => LC_SEGMENT_SPLIT_INFO,
                LinkeditDataKind::FunctionStarts => LC_FUNCTION_STARTS,
                LinkeditDataKind::DataInCode => LC_DATA_IN_CODE,
                LinkeditDataKind::DylibCodeSignDrs => LC_DYLIB_CODE_SIGN_DRS,
                LinkeditDataKind::LinkerOptimizationHint => LC_LINKER_OPTIMIZATION_HINT,
                LinkeditDataKind::DyldExportsTrie => LC_DYLD_EXPORTS_TRIE,
                LinkeditDataKind::DyldChainedFixups => LC_DYLD_CHAINED_FIXUPS,
            },
            LoadCommand::EncryptionInfo32 { .. } => LC_ENCRYPTION_INFO,
            LoadCommand::EncryptionInfo64 { .. } => LC_ENCRYPTION_INFO_64,
            LoadCommand::DyldInfo { kind, .. } => match kind {
                DyldInfoKind::DyldInfo => LC_DYLD_INFO,
                DyldInfoKind::DyldInfoOnly => LC_DYLD_INFO_ONLY,
            },
            LoadCommand::Main { .. } => LC_MAIN,
            LoadCommand::VersionMin { kind, .. } => match kind {
                VersionMinKind::MacOsx => LC_VERSION_MIN_MACOSX,
                VersionMinKind::IPhoneOs => LC_VERSION_MIN_IPHONEOS,
                VersionMinKind::TvOs => LC_VERSION_MIN_TVOS,
                VersionMinKind::WatchOs => LC_VERSION_MIN_WATCHOS,
            },
            LoadCommand::BuildVersion { .. } => LC_BUILD_VERSION,
            LoadCommand::SourceVersion(_) => LC_SOURCE_VERSION,
            LoadCommand::Thread { kind, .. } => match kind {
                ThreadKind::Thread => LC_THREAD,
                ThreadKind::UnixThread => LC_UNIXTHREAD,
            },
            LoadCommand::Raw(r) => r.cmd,
        }
    }

    /// The number of bytes this command occupies in the on-disk command
    /// region. Self-describing: determined entirely from the command's own
    /// fields (segments include their section headers), never from the
    /// containing `FileTOC` — see the design note normalizing away the
    /// source's two divergent `LoadSize` methods.
    pub fn load_size(&self) -> u32 {
        match self {
            LoadCommand::Segment(s) => {
                let header = if s.is_64 {
                    std::mem::size_of::<raw::SegmentCommand64<crate::endian::Endianness>>()
                } else {
                    std::mem::size_of::<raw::SegmentCommand32<crate::endian::Endianness>>()
                };
                let section = if s.is_64 {
                    std::mem::size_of::<raw::Section64<crate::endian::Endianness>>()
                } else {
                    std::mem::size_of::<raw::Section32<crate::endian::Endianness>>()
                };
                (header + s.sections.len() * section) as u32
            }
            LoadCommand::Symtab { .. } => {
                std::mem::size_of::<raw::SymtabCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::Dysymtab(_) => {
                std::mem::size_of::<raw::DysymtabCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::Dylib(d) => {
                let fixed =
                    std::mem::size_of::<raw::DylibCommand<crate::endian::Endianness>>();
                padded_len(fixed + d.name.len() + 1, 8) as u32
            }
            LoadCommand::Dylinker { name, .. } => {
                let fixed =
                    std::mem::size_of::<raw::DylinkerCommand<crate::endian::Endianness>>();
                padded_len(fixed + name.len() + 1, 8) as u32
            }
            LoadCommand::InlineString { text, .. } => {
                let fixed = std::mem::size_of::<raw::RpathCommand<crate::endian::Endianness>>();
                padded_len(fixed + text.len() + 1, 8) as u32
            }
            LoadCommand::Uuid(_) => {
                std::mem::size_of::<raw::UuidCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::LinkeditData { .. } => {
                std::mem::size_of::<raw::LinkeditDataCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::EncryptionInfo32 { .. } => std::mem::size_of::<
                raw::EncryptionInfoCommand32<crate::endian::Endianness>,
            >() as u32,
            LoadCommand::EncryptionInfo64 { .. } => std::mem::size_of::<
                raw::EncryptionInfoCommand64<crate::endian::Endianness>,
            >() as u32,
            LoadCommand::DyldInfo { .. } => {
                std::mem::size_of::<raw::DyldInfoCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::Main { .. } => {
                std::mem::size_of::<raw::EntryPointCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::VersionMin { .. } => {
                std::mem::size_of::<raw::VersionMinCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::BuildVersion { tools, .. } => {
                let fixed =
                    std::mem::size_of::<raw::BuildVersionCommand<crate::endian::Endianness>>();
                let tool =
                    std::mem::size_of::<raw::BuildToolVersion<crate::endian::Endianness>>();
                (fixed + tools.len() * tool) as u32
            }
            LoadCommand::SourceVersion(_) => {
                std::mem::size_of::<raw::SourceVersionCommand<crate::endian::Endianness>>() as u32
            }
            LoadCommand::Thread { states, .. } => {
                let header =
                    std::mem::size_of::<raw::ThreadCommandHeader<crate::endian::Endianness>>();
                let body: usize = states.iter().map(|s| 8 + s.data.len()).sum();
                (header + body) as u32
            }
            LoadCommand::Raw(r) => r.bytes.len() as u32,
        }
    }

    /// The original bytes, for unrecognized commands.
    /// Returns `None` for recognized commands, which re-serialize from
    /// their decoded fields instead of carrying the source bytes around.
    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            LoadCommand::Raw(r) => Some(&r.bytes),
            _ => None,
        }
    }

    /// Parse one load command starting at `data[0]`. `data` must be the
    /// remaining bytes of the command *region* (bounded by `sizeofcmds`),
    /// not the whole file, so the length check in step 1 of the decoding
    /// algorithm is meaningful.
    pub fn parse<E: Endian>(mut data: Bytes<'_>, endian: E, is_64: bool) -> Result<(Self, usize)> {
        let command_start = data.0;
        let header = data
            .read::<raw::LoadCommandHeader<E>>()
            .read_error(Error::TruncatedFile)?;
        let cmd = header.cmd.get(endian);
        let cmdsize = header.cmdsize.get(endian) as usize;
        let header_size = std::mem::size_of::<raw::LoadCommandHeader<E>>();
        if cmdsize < header_size {
            return Err(Error::BadLoadCommandLength);
        }
        // `whole` spans the *entire* command, header included: on-disk
        // string offsets (dylib/dylinker/rpath names) are relative to the
        // start of the command, not to the end of its fixed header.
        let whole = command_start.get(..cmdsize).ok_or(Error::TruncatedFile)?;
        let command = Self::parse_body(cmd, Bytes(whole), endian, is_64, cmdsize)?;
        Ok((command, cmdsize))
    }

    fn parse_body<E: Endian>(
        cmd: u32,
        body: Bytes<'_>,
        endian: E,
        is_64: bool,
        cmdsize: usize,
    ) -> Result<Self> {
        match cmd {
            LC_SEGMENT => {
                let mut b = body;
                let seg = b
                    .read::<raw::SegmentCommand32<E>>()
                    .read_error(Error::MalformedRecord("segment_command"))?;
                let nsects = seg.nsects.get(endian) as usize;
                let sects = b
                    .read_slice::<raw::Section32<E>>(nsects)
                    .read_error(Error::MalformedRecord("section"))?;
                let sections = sects
                    .iter()
                    .map(|s| Section::from_raw32(s, endian))
                    .collect();
                Ok(LoadCommand::Segment(SegmentData {
                    is_64: false,
                    segname: seg.segname,
                    vmaddr: seg.vmaddr.get(endian) as u64,
                    vmsize: seg.vmsize.get(endian) as u64,
                    fileoff: seg.fileoff.get(endian) as u64,
                    filesize: seg.filesize.get(endian) as u64,
                    maxprot: seg.maxprot.get(endian),
                    initprot: seg.initprot.get(endian),
                    flags: seg.flags.get(endian),
                    firstsect: 0,
                    sections,
                }))
            }
            LC_SEGMENT_64 => {
                let mut b = body;
                let seg = b
                    .read::<raw::SegmentCommand64<E>>()
                    .read_error(Error::MalformedRecord("segment_command_64"))?;
                let nsects = seg.nsects.get(endian) as usize;
                let sects = b
                    .read_slice::<raw::Section64<E>>(nsects)
                    .read_error(Error::MalformedRecord("section_64"))?;
                let sections = sects
                    .iter()
                    .map(|s| Section::from_raw64(s, endian))
                    .collect();
                Ok(LoadCommand::Segment(SegmentData {
                    is_64: true,
                    segname: seg.segname,
                    vmaddr: seg.vmaddr.get(endian),
                    vmsize: seg.vmsize.get(endian),
                    fileoff: seg.fileoff.get(endian),
                    filesize: seg.filesize.get(endian),
                    maxprot: seg.maxprot.get(endian),
                    initprot: seg.initprot.get(endian),
                    flags: seg.flags.get(endian),
                    firstsect: 0,
                    sections,
                }))
            }
            LC_SYMTAB => {
                let st = pod::from_bytes::<raw::SymtabCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("symtab_command"))?
                    .0;
                Ok(LoadCommand::Symtab {
                    symoff: st.symoff.get(endian),
                    nsyms: st.nsyms.get(endian),
                    stroff: st.stroff.get(endian),
                    strsize: st.strsize.get(endian),
                })
            }
            LC_DYSYMTAB => {
                let dt = pod::from_bytes::<raw::DysymtabCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("dysymtab_command"))?
                    .0;
                Ok(LoadCommand::Dysymtab(DysymtabFields::from_raw(dt, endian)))
            }
            LC_LOAD_DYLIB | LC_LOAD_WEAK_DYLIB | LC_REEXPORT_DYLIB | LC_LAZY_LOAD_DYLIB
            | LC_LOAD_UPWARD_DYLIB | LC_ID_DYLIB => {
                let d = pod::from_bytes::<raw::DylibCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("dylib_command"))?
                    .0;
                let kind = match cmd {
                    LC_LOAD_DYLIB => DylibKind::Load,
                    LC_LOAD_WEAK_DYLIB => DylibKind::LoadWeak,
                    LC_REEXPORT_DYLIB => DylibKind::Reexport,
                    LC_LAZY_LOAD_DYLIB => DylibKind::LazyLoad,
                    LC_LOAD_UPWARD_DYLIB => DylibKind::Upward,
                    _ => DylibKind::Id,
                };
                Ok(LoadCommand::Dylib(DylibData {
                    kind,
                    name: read_inline_string(body.0, d.name_offset, endian),
                    timestamp: d.timestamp.get(endian),
                    current_version: d.current_version.get(endian),
                    compatibility_version: d.compatibility_version.get(endian),
                }))
            }
            LC_LOAD_DYLINKER | LC_ID_DYLINKER | LC_DYLD_ENVIRONMENT => {
                let d = pod::from_bytes::<raw::DylinkerCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("dylinker_command"))?
                    .0;
                let kind = match cmd {
                    LC_LOAD_DYLINKER => DylinkerKind::Load,
                    LC_ID_DYLINKER => DylinkerKind::Id,
                    _ => DylinkerKind::DyldEnvironment,
                };
                Ok(LoadCommand::Dylinker {
                    kind,
                    name: read_inline_string(body.0, d.name_offset, endian),
                })
            }
            LC_RPATH | LC_SUB_FRAMEWORK | LC_SUB_UMBRELLA | LC_SUB_CLIENT | LC_SUB_LIBRARY => {
                let d = pod::from_bytes::<raw::RpathCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("rpath-style command"))?
                    .0;
                let kind = match cmd {
                    LC_RPATH => InlineStringKind::Rpath,
                    LC_SUB_FRAMEWORK => InlineStringKind::SubFramework,
                    LC_SUB_UMBRELLA => InlineStringKind::SubUmbrella,
                    LC_SUB_CLIENT => InlineStringKind::SubClient,
                    _ => InlineStringKind::SubLibrary,
                };
                Ok(LoadCommand::InlineString {
                    kind,
                    text: read_inline_string(body.0, d.path_offset, endian),
                })
            }
            LC_UUID => {
                let d = pod::from_bytes::<raw::UuidCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("uuid_command"))?
                    .0;
                Ok(LoadCommand::Uuid(d.uuid))
            }
            LC_CODE_SIGNATURE
            | LC_SEGMENT_SPLIT_INFO
            | LC_FUNCTION_STARTS
            | LC_DATA_IN_CODE
            | LC_DYLIB_CODE_SIGN_DRS
            | LC_LINKER_OPTIMIZATION_HINT
            | LC_DYLD_EXPORTS_TRIE
            | LC_DYLD_CHAINED_FIXUPS => {
                let d = pod::from_bytes::<raw::LinkeditDataCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("linkedit_data_command"))?
                    .0;
                let kind = match cmd {
                    LC_CODE_SIGNATURE => LinkeditDataKind::CodeSignature,
                    LC_SEGMENT_SPLIT_INFO => LinkeditDataKind::SegmentSplitInfo,
                    LC_FUNCTION_STARTS => LinkeditDataKind::FunctionStarts,
                    LC_DATA_IN_CODE => LinkeditDataKind::DataInCode,
                    LC_DYLIB_CODE_SIGN_DRS => LinkeditDataKind::DylibCodeSignDrs,
                    LC_LINKER_OPTIMIZATION_HINT => LinkeditDataKind::LinkerOptimizationHint,
                    LC_DYLD_EXPORTS_TRIE => LinkeditDataKind::DyldExportsTrie,
                    _ => LinkeditDataKind::DyldChainedFixups,
                };
                Ok(LoadCommand::LinkeditData {
                    kind,
                    dataoff: d.dataoff.get(endian),
                    datasize: d.datasize.get(endian),
                })
            }
            LC_ENCRYPTION_INFO => {
                let d = pod::from_bytes::<raw::EncryptionInfoCommand32<E>>(body.0)
                    .read_error(Error::MalformedRecord("encryption_info_command"))?
                    .0;
                Ok(LoadCommand::EncryptionInfo32 {
                    cryptoff: d.cryptoff.get(endian),
                    cryptsize: d.cryptsize.get(endian),
                    cryptid: d.cryptid.get(endian),
                })
            }
            LC_ENCRYPTION_INFO_64 => {
                let d = pod::from_bytes::<raw::EncryptionInfoCommand64<E>>(body.0)
                    .read_error(Error::MalformedRecord("encryption_info_command_64"))?
                    .0;
                Ok(LoadCommand::EncryptionInfo64 {
                    cryptoff: d.cryptoff.get(endian),
                    cryptsize: d.cryptsize.get(endian),
                    cryptid: d.cryptid.get(endian),
                    pad: d.pad.get(endian),
                })
            }
            LC_DYLD_INFO | LC_DYLD_INFO_ONLY => {
                let d = pod::from_bytes::<raw::DyldInfoCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("dyld_info_command"))?
                    .0;
                Ok(LoadCommand::DyldInfo {
                    kind: if cmd == LC_DYLD_INFO {
                        DyldInfoKind::DyldInfo
                    } else {
                        DyldInfoKind::DyldInfoOnly
                    },
                    rebase_off: d.rebase_off.get(endian),
                    rebase_size: d.rebase_size.get(endian),
                    bind_off: d.bind_off.get(endian),
                    bind_size: d.bind_size.get(endian),
                    weak_bind_off: d.weak_bind_off.get(endian),
                    weak_bind_size: d.weak_bind_size.get(endian),
                    lazy_bind_off: d.lazy_bind_off.get(endian),
                    lazy_bind_size: d.lazy_bind_size.get(endian),
                    export_off: d.export_off.get(endian),
                    export_size: d.export_size.get(endian),
                })
            }
            LC_MAIN => {
                let d = pod::from_bytes::<raw::EntryPointCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("entry_point_command"))?
                    .0;
                Ok(LoadCommand::Main {
                    entryoff: d.entryoff.get(endian),
                    stacksize: d.stacksize.get(endian),
                })
            }
            LC_VERSION_MIN_MACOSX
            | LC_VERSION_MIN_IPHONEOS
            | LC_VERSION_MIN_TVOS
            | LC_VERSION_MIN_WATCHOS => {
                let d = pod::from_bytes::<raw::VersionMinCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("version_min_command"))?
                    .0;
                let kind = match cmd {
                    LC_VERSION_MIN_MACOSX => VersionMinKind::MacOsx,
                    LC_VERSION_MIN_IPHONEOS => VersionMinKind::IPhoneOs,
                    LC_VERSION_MIN_TVOS => VersionMinKind::TvOs,
                    _ => VersionMinKind::WatchOs,
                };
                Ok(LoadCommand::VersionMin {
                    kind,
                    version: d.version.get(endian),
                    sdk: d.sdk.get(endian),
                })
            }
            LC_BUILD_VERSION => {
                let mut b = body;
                let d = b
                    .read::<raw::BuildVersionCommand<E>>()
                    .read_error(Error::MalformedRecord("build_version_command"))?;
                let ntools = d.ntools.get(endian) as usize;
                let tools = b
                    .read_slice::<raw::BuildToolVersion<E>>(ntools)
                    .read_error(Error::MalformedRecord("build_tool_version"))?;
                Ok(LoadCommand::BuildVersion {
                    platform: d.platform.get(endian),
                    minos: d.minos.get(endian),
                    sdk: d.sdk.get(endian),
                    tools: tools
                        .iter()
                        .map(|t| (t.tool.get(endian), t.version.get(endian)))
                        .collect(),
                })
            }
            LC_SOURCE_VERSION => {
                let d = pod::from_bytes::<raw::SourceVersionCommand<E>>(body.0)
                    .read_error(Error::MalformedRecord("source_version_command"))?
                    .0;
                Ok(LoadCommand::SourceVersion(d.version.get(endian)))
            }
            LC_THREAD | LC_UNIXTHREAD => {
                let mut b = body;
                b.read::<raw::ThreadCommandHeader<E>>()
                    .read_error(Error::MalformedRecord("thread_command"))?;
                let mut states = Vec::new();
                while b.len() >= 8 {
                    let flavor = b
                        .read::<U32<E>>()
                        .read_error(Error::MalformedRecord("thread flavor"))?
                        .get(endian);
                    let count = b
                        .read::<U32<E>>()
                        .read_error(Error::MalformedRecord("thread count"))?
                        .get(endian);
                    let nbytes = (count as usize).saturating_mul(4);
                    let data = b
                        .read_bytes(nbytes)
                        .read_error(Error::MalformedRecord("thread state"))?
                        .0
                        .to_vec();
                    states.push(ThreadState {
                        flavor,
                        count,
                        data,
                    });
                }
                Ok(LoadCommand::Thread {
                    kind: if cmd == LC_THREAD {
                        ThreadKind::Thread
                    } else {
                        ThreadKind::UnixThread
                    },
                    states,
                })
            }
            _ => {
                let _ = is_64;
                Ok(LoadCommand::Raw(RawCommand {
                    cmd,
                    bytes: body.0.to_vec(),
                }))
            }
        }
    }

    /// Serialize this command back to bytes with the given byte order.
    /// `write(parse(b)) == b` for every recognized command.
    pub fn write<E: Endian>(&self, out: &mut Vec<u8>, endian: E) {
        if let LoadCommand::Raw(r) = self {
            out.extend_from_slice(&r.bytes);
            return;
        }
        let start = out.len();
        let cmd = self.command();
        let cmdsize = self.load_size();
        out.extend_from_slice(pod::bytes_of(&U32::new(endian, cmd)));
        out.extend_from_slice(pod::bytes_of(&U32::new(endian, cmdsize)));
        match self {
            LoadCommand::Segment(s) => {
                out.extend_from_slice(&s.segname);
                if s.is_64 {
                    write_u64(out, endian, s.vmaddr);
                    write_u64(out, endian, s.vmsize);
                    write_u64(out, endian, s.fileoff);
                    write_u64(out, endian, s.filesize);
                } else {
                    write_u32(out, endian, s.vmaddr as u32);
                    write_u32(out, endian, s.vmsize as u32);
                    write_u32(out, endian, s.fileoff as u32);
                    write_u32(out, endian, s.filesize as u32);
                }
                write_u32(out, endian, s.maxprot);
                write_u32(out, endian, s.initprot);
                write_u32(out, endian, s.sections.len() as u32);
                write_u32(out, endian, s.flags);
                for sect in &s.sections {
                    sect.write(out, endian, s.is_64);
                }
            }
            LoadCommand::Symtab {
                symoff,
                nsyms,
                stroff,
                strsize,
            } => {
                write_u32(out, endian, *symoff);
                write_u32(out, endian, *nsyms);
                write_u32(out, endian, *stroff);
                write_u32(out, endian, *strsize);
            }
            LoadCommand::Dysymtab(d) => d.write(out, endian),
            LoadCommand::Dylib(d) => {
                let fixed =
                    std::mem::size_of::<raw::DylibCommand<crate::endian::Endianness>>() as u32;
                write_u32(out, endian, fixed);
                write_u32(out, endian, d.timestamp);
                write_u32(out, endian, d.current_version);
                write_u32(out, endian, d.compatibility_version);
                write_cstr(out, &d.name);
            }
            LoadCommand::Dylinker { name, .. } => {
                let fixed =
                    std::mem::size_of::<raw::DylinkerCommand<crate::endian::Endianness>>() as u32;
                write_u32(out, endian, fixed);
                write_cstr(out, name);
            }
            LoadCommand::InlineString { text, .. } => {
                let fixed =
                    std::mem::size_of::<raw::RpathCommand<crate::endian::Endianness>>() as u32;
                write_u32(out, endian, fixed);
                write_cstr(out, text);
            }
            LoadCommand::Uuid(bytes) => out.extend_from_slice(bytes),
            LoadCommand::LinkeditData {
                dataoff, datasize, ..
            } => {
                write_u32(out, endian, *dataoff);
                write_u32(out, endian, *datasize);
            }
            LoadCommand::EncryptionInfo32 {
                cryptoff,
                cryptsize,
                cryptid,
            } => {
                write_u32(out, endian, *cryptoff);
                write_u32(out, endian, *cryptsize);
                write_u32(out, endian, *cryptid);
            }
            LoadCommand::EncryptionInfo64 {
                cryptoff,
                cryptsize,
                cryptid,
                pad,
            } => {
                write_u32(out, endian, *cryptoff);
                write_u32(out, endian, *cryptsize);
                write_u32(out, endian, *cryptid);
                write_u32(out, endian, *pad);
            }
            LoadCommand::DyldInfo {
                rebase_off,
                rebase_size,
                bind_off,
                bind_size,
                weak_bind_off,
                weak_bind_size,
                lazy_bind_off,
                lazy_bind_size,
                export_off,
                export_size,
                ..
            } => {
                for v in [
                    rebase_off,
                    rebase_size,
                    bind_off,
                    bind_size,
                    weak_bind_off,
                    weak_bind_size,
                    lazy_bind_off,
                    lazy_bind_size,
                    export_off,
                    export_size,
                ] {
                    write_u32(out, endian, *v);
                }
            }
            LoadCommand::Main {
                entryoff,
                stacksize,
            } => {
                write_u64(out, endian, *entryoff);
                write_u64(out, endian, *stacksize);
            }
            LoadCommand::VersionMin { version, sdk, .. } => {
                write_u32(out, endian, *version);
                write_u32(out, endian, *sdk);
            }
            LoadCommand::BuildVersion {
                platform,
                minos,
                sdk,
                tools,
            } => {
                write_u32(out, endian, *platform);
                write_u32(out, endian, *minos);
                write_u32(out, endian, *sdk);
                write_u32(out, endian, tools.len() as u32);
                for (tool, version) in tools {
                    write_u32(out, endian, *tool);
                    write_u32(out, endian, *version);
                }
            }
            LoadCommand::SourceVersion(v) => write_u64(out, endian, *v),
            LoadCommand::Thread { states, .. } => {
                for s in states {
                    write_u32(out, endian, s.flavor);
                    write_u32(out, endian, s.count);
                    out.extend_from_slice(&s.data);
                }
            }
            LoadCommand::Raw(_) => unreachable!("handled above"),
        }
        // Pad out to the declared `cmdsize`: fixed-shape commands already
        // land here exactly, string-bearing ones (dylib/dylinker/rpath-style)
        // need the trailing NUL and alignment padding filled in.
        while out.len() - start < cmdsize as usize {
            out.push(0);
        }
    }
}

fn write_u32<E: Endian>(out: &mut Vec<u8>, endian: E, v: u32) {
    out.extend_from_slice(pod::bytes_of(&U32::new(endian, v)));
}

fn write_u64<E: Endian>(out: &mut Vec<u8>, endian: E, v: u64) {
    out.extend_from_slice(pod::bytes_of(&U64::new(endian, v)));
}

fn write_cstr(out: &mut Vec<u8>, text: &[u8]) {
    out.extend_from_slice(text);
    out.push(0);
}

/// `LC_DYSYMTAB` fields, kept separate from [`LoadCommand`]'s variant body
/// purely to keep that enum's match arms readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DysymtabFields {
    pub ilocalsym: u32,
    pub nlocalsym: u32,
    pub iextdefsym: u32,
    pub nextdefsym: u32,
    pub iundefsym: u32,
    pub nundefsym: u32,
    pub tocoff: u32,
    pub ntoc: u32,
    pub modtaboff: u32,
    pub nmodtab: u32,
    pub extrefsymoff: u32,
    pub nextrefsyms: u32,
    pub indirectsymoff: u32,
    pub nindirectsyms: u32,
    pub extreloff: u32,
    pub nextrel: u32,
    pub locreloff: u32,
    pub nlocrel: u32,
}

impl DysymtabFields {
    fn from_raw<E: Endian>(d: &raw::DysymtabCommand<E>, endian: E) -> Self {
        DysymtabFields {
            ilocalsym: d.ilocalsym.get(endian),
            nlocalsym: d.nlocalsym.get(endian),
            iextdefsym: d.iextdefsym.get(endian),
            nextdefsym: d.nextdefsym.get(endian),
            iundefsym: d.iundefsym.get(endian),
            nundefsym: d.nundefsym.get(endian),
            tocoff: d.tocoff.get(endian),
            ntoc: d.ntoc.get(endian),
            modtaboff: d.modtaboff.get(endian),
            nmodtab: d.nmodtab.get(endian),
            extrefsymoff: d.extrefsymoff.get(endian),
            nextrefsyms: d.nextrefsyms.get(endian),
            indirectsymoff: d.indirectsymoff.get(endian),
            nindirectsyms: d.nindirectsyms.get(endian),
            extreloff: d.extreloff.get(endian),
            nextrel: d.nextrel.get(endian),
            locreloff: d.locreloff.get(endian),
            nlocrel: d.nlocrel.get(endian),
        }
    }

    fn write<E: Endian>(&self, out: &mut Vec<u8>, endian: E) {
        for v in [
            self.ilocalsym,
            self.nlocalsym,
            self.iextdefsym,
            self.nextdefsym,
            self.iundefsym,
            self.nundefsym,
            self.tocoff,
            self.ntoc,
            self.modtaboff,
            self.nmodtab,
            self.extrefsymoff,
            self.nextrefsyms,
            self.indirectsymoff,
            self.nindirectsyms,
            self.extreloff,
            self.nextrel,
            self.locreloff,
            self.nlocrel,
        ] {
            write_u32(out, endian, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::LittleEndian;

    #[test]
    fn uuid_round_trips() {
        let cmd = LoadCommand::Uuid([7u8; 16]);
        let mut out = Vec::new();
        cmd.write(&mut out, LittleEndian);
        assert_eq!(out.len(), cmd.load_size() as usize);
        let (parsed, consumed) = LoadCommand::parse(Bytes(&out), LittleEndian, true).unwrap();
        assert_eq!(consumed, out.len());
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn dylib_round_trips() {
        let cmd = LoadCommand::Dylib(DylibData {
            kind: DylibKind::Load,
            name: b"/usr/lib/libSystem.B.dylib".to_vec(),
            timestamp: 2,
            current_version: 0x10000,
            compatibility_version: 0x10000,
        });
        let mut out = Vec::new();
        cmd.write(&mut out, LittleEndian);
        assert_eq!(out.len(), cmd.load_size() as usize);
        let (parsed, _) = LoadCommand::parse(Bytes(&out), LittleEndian, true).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn unknown_command_falls_back_to_raw() {
        let mut out = Vec::new();
        write_u32(&mut out, LittleEndian, 0xdead_beef);
        write_u32(&mut out, LittleEndian, 16);
        out.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let (parsed, consumed) = LoadCommand::parse(Bytes(&out), LittleEndian, true).unwrap();
        assert_eq!(consumed, 16);
        match parsed {
            LoadCommand::Raw(r) => {
                assert_eq!(r.cmd, 0xdead_beef);
                assert_eq!(r.bytes, out);
            }
            _ => panic!("expected Raw"),
        }
    }

    #[test]
    fn main_round_trips() {
        let cmd = LoadCommand::Main {
            entryoff: 0x3f60,
            stacksize: 0,
        };
        let mut out = Vec::new();
        cmd.write(&mut out, LittleEndian);
        let (parsed, consumed) = LoadCommand::parse(Bytes(&out), LittleEndian, true).unwrap();
        assert_eq!(consumed, out.len());
        assert_eq!(parsed, cmd);
    }
}
