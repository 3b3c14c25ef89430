//! Fixed on-disk record layouts.
//!
//! Every multi-byte field uses the generic-endian wrappers from [`crate::endian`]
//! so a single struct definition serves both big- and little-endian files;
//! the field is only ever decoded through `.get(endian)`.

use crate::endian::{BigEndian, Endian, I32, U32, U64};
use crate::pod::Pod;

/// `mach_header` / `mach_header_64` (the trailing `reserved` word only
/// exists in the 64-bit header; see [`MachHeader64`]).
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct MachHeader32<E: Endian> {
    pub magic: U32<E>,
    pub cputype: U32<E>,
    pub cpusubtype: U32<E>,
    pub filetype: U32<E>,
    pub ncmds: U32<E>,
    pub sizeofcmds: U32<E>,
    pub flags: U32<E>,
}
unsafe impl<E: Endian> Pod for MachHeader32<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct MachHeader64<E: Endian> {
    pub magic: U32<E>,
    pub cputype: U32<E>,
    pub cpusubtype: U32<E>,
    pub filetype: U32<E>,
    pub ncmds: U32<E>,
    pub sizeofcmds: U32<E>,
    pub flags: U32<E>,
    pub reserved: U32<E>,
}
unsafe impl<E: Endian> Pod for MachHeader64<E> {}

/// The generic `(cmd, cmdsize)` preamble shared by every load command.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct LoadCommandHeader<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
}
unsafe impl<E: Endian> Pod for LoadCommandHeader<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SegmentCommand32<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub segname: [u8; 16],
    pub vmaddr: U32<E>,
    pub vmsize: U32<E>,
    pub fileoff: U32<E>,
    pub filesize: U32<E>,
    pub maxprot: U32<E>,
    pub initprot: U32<E>,
    pub nsects: U32<E>,
    pub flags: U32<E>,
}
unsafe impl<E: Endian> Pod for SegmentCommand32<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SegmentCommand64<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub segname: [u8; 16],
    pub vmaddr: U64<E>,
    pub vmsize: U64<E>,
    pub fileoff: U64<E>,
    pub filesize: U64<E>,
    pub maxprot: U32<E>,
    pub initprot: U32<E>,
    pub nsects: U32<E>,
    pub flags: U32<E>,
}
unsafe impl<E: Endian> Pod for SegmentCommand64<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Section32<E: Endian> {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: U32<E>,
    pub size: U32<E>,
    pub offset: U32<E>,
    pub align: U32<E>,
    pub reloff: U32<E>,
    pub nreloc: U32<E>,
    pub flags: U32<E>,
    pub reserved1: U32<E>,
    pub reserved2: U32<E>,
}
unsafe impl<E: Endian> Pod for Section32<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct Section64<E: Endian> {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: U64<E>,
    pub size: U64<E>,
    pub offset: U32<E>,
    pub align: U32<E>,
    pub reloff: U32<E>,
    pub nreloc: U32<E>,
    pub flags: U32<E>,
    pub reserved1: U32<E>,
    pub reserved2: U32<E>,
    pub reserved3: U32<E>,
}
unsafe impl<E: Endian> Pod for Section64<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SymtabCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub symoff: U32<E>,
    pub nsyms: U32<E>,
    pub stroff: U32<E>,
    pub strsize: U32<E>,
}
unsafe impl<E: Endian> Pod for SymtabCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DysymtabCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub ilocalsym: U32<E>,
    pub nlocalsym: U32<E>,
    pub iextdefsym: U32<E>,
    pub nextdefsym: U32<E>,
    pub iundefsym: U32<E>,
    pub nundefsym: U32<E>,
    pub tocoff: U32<E>,
    pub ntoc: U32<E>,
    pub modtaboff: U32<E>,
    pub nmodtab: U32<E>,
    pub extrefsymoff: U32<E>,
    pub nextrefsyms: U32<E>,
    pub indirectsymoff: U32<E>,
    pub nindirectsyms: U32<E>,
    pub extreloff: U32<E>,
    pub nextrel: U32<E>,
    pub locreloff: U32<E>,
    pub nlocrel: U32<E>,
}
unsafe impl<E: Endian> Pod for DysymtabCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct NList32<E: Endian> {
    pub n_strx: U32<E>,
    pub n_type: u8,
    pub n_sect: u8,
    pub n_desc: crate::endian::U16<E>,
    pub n_value: U32<E>,
}
unsafe impl<E: Endian> Pod for NList32<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct NList64<E: Endian> {
    pub n_strx: U32<E>,
    pub n_type: u8,
    pub n_sect: u8,
    pub n_desc: crate::endian::U16<E>,
    pub n_value: U64<E>,
}
unsafe impl<E: Endian> Pod for NList64<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DylibCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub name_offset: U32<E>,
    pub timestamp: U32<E>,
    pub current_version: U32<E>,
    pub compatibility_version: U32<E>,
}
unsafe impl<E: Endian> Pod for DylibCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DylinkerCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub name_offset: U32<E>,
}
unsafe impl<E: Endian> Pod for DylinkerCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RpathCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub path_offset: U32<E>,
}
unsafe impl<E: Endian> Pod for RpathCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct UuidCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub uuid: [u8; 16],
}
unsafe impl<E: Endian> Pod for UuidCommand<E> {}

/// Shared shape of `LC_CODE_SIGNATURE`, `LC_SEGMENT_SPLIT_INFO`,
/// `LC_FUNCTION_STARTS`, `LC_DATA_IN_CODE`, `LC_DYLIB_CODE_SIGN_DRS`,
/// `LC_LINKER_OPTIMIZATION_HINT`, `LC_DYLD_EXPORTS_TRIE`,
/// `LC_DYLD_CHAINED_FIXUPS`: an (offset, size) pair into LINKEDIT.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct LinkeditDataCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub dataoff: U32<E>,
    pub datasize: U32<E>,
}
unsafe impl<E: Endian> Pod for LinkeditDataCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct EncryptionInfoCommand32<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub cryptoff: U32<E>,
    pub cryptsize: U32<E>,
    pub cryptid: U32<E>,
}
unsafe impl<E: Endian> Pod for EncryptionInfoCommand32<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct EncryptionInfoCommand64<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub cryptoff: U32<E>,
    pub cryptsize: U32<E>,
    pub cryptid: U32<E>,
    pub pad: U32<E>,
}
unsafe impl<E: Endian> Pod for EncryptionInfoCommand64<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct DyldInfoCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub rebase_off: U32<E>,
    pub rebase_size: U32<E>,
    pub bind_off: U32<E>,
    pub bind_size: U32<E>,
    pub weak_bind_off: U32<E>,
    pub weak_bind_size: U32<E>,
    pub lazy_bind_off: U32<E>,
    pub lazy_bind_size: U32<E>,
    pub export_off: U32<E>,
    pub export_size: U32<E>,
}
unsafe impl<E: Endian> Pod for DyldInfoCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct EntryPointCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub entryoff: U64<E>,
    pub stacksize: U64<E>,
}
unsafe impl<E: Endian> Pod for EntryPointCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct VersionMinCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub version: U32<E>,
    pub sdk: U32<E>,
}
unsafe impl<E: Endian> Pod for VersionMinCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct BuildToolVersion<E: Endian> {
    pub tool: U32<E>,
    pub version: U32<E>,
}
unsafe impl<E: Endian> Pod for BuildToolVersion<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct BuildVersionCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub platform: U32<E>,
    pub minos: U32<E>,
    pub sdk: U32<E>,
    pub ntools: U32<E>,
}
unsafe impl<E: Endian> Pod for BuildVersionCommand<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SourceVersionCommand<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
    pub version: U64<E>,
}
unsafe impl<E: Endian> Pod for SourceVersionCommand<E> {}

/// `LC_THREAD` / `LC_UNIXTHREAD`: a fixed preamble followed by an opaque,
/// architecture-specific register dump. Register-state interpretation is
/// left to the caller; the raw flavor/count/state bytes are retained
/// verbatim.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct ThreadCommandHeader<E: Endian> {
    pub cmd: U32<E>,
    pub cmdsize: U32<E>,
}
unsafe impl<E: Endian> Pod for ThreadCommandHeader<E> {}

/// Fat (multi-arch) container header: always big-endian.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct FatHeader {
    pub magic: U32<BigEndian>,
    pub nfat_arch: U32<BigEndian>,
}
unsafe impl Pod for FatHeader {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct FatArch {
    pub cputype: U32<BigEndian>,
    pub cpusubtype: U32<BigEndian>,
    pub offset: U32<BigEndian>,
    pub size: U32<BigEndian>,
    pub align: U32<BigEndian>,
}
unsafe impl Pod for FatArch {}

/// A single relocation entry. Bit-packed fields (`r_pcrel`, `r_length`,
/// `r_extern`, `r_type`) live in `r_info` and are split out by
/// [`crate::macho::relocation`] rather than here, matching how scattered
/// relocations (which reinterpret the whole word) need to see the raw bits
/// first.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RelocationInfo<E: Endian> {
    pub r_address: I32<E>,
    pub r_info: U32<E>,
}
unsafe impl<E: Endian> Pod for RelocationInfo<E> {}

// --- Code signature super-blob, always big-endian. ---

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct SuperBlob {
    pub magic: U32<BigEndian>,
    pub length: U32<BigEndian>,
    pub count: U32<BigEndian>,
}
unsafe impl Pod for SuperBlob {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct BlobIndex {
    pub ty: U32<BigEndian>,
    pub offset: U32<BigEndian>,
}
unsafe impl Pod for BlobIndex {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct GenericBlob {
    pub magic: U32<BigEndian>,
    pub length: U32<BigEndian>,
}
unsafe impl Pod for GenericBlob {}

/// The fixed prefix of a `CodeDirectory` blob. Versions below
/// `SUPPORTS_SCATTER` (`0x20100`) end after `hashType`/`spare1`/`pageSize`/
/// `spare2`; later versions append the scatter offset, team-id offset,
/// 64-bit code limit, exec-segment fields and pre-encrypt hash offset in
/// that order, gated by the version thresholds in `constants`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CodeDirectoryHeader {
    pub magic: U32<BigEndian>,
    pub length: U32<BigEndian>,
    pub version: U32<BigEndian>,
    pub flags: U32<BigEndian>,
    pub hash_offset: U32<BigEndian>,
    pub ident_offset: U32<BigEndian>,
    pub n_special_slots: U32<BigEndian>,
    pub n_code_slots: U32<BigEndian>,
    pub code_limit: U32<BigEndian>,
    pub hash_size: u8,
    pub hash_type: u8,
    pub platform: u8,
    pub page_size: u8,
    pub spare2: U32<BigEndian>,
}
unsafe impl Pod for CodeDirectoryHeader {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CodeDirectoryScatter {
    pub scatter_offset: U32<BigEndian>,
}
unsafe impl Pod for CodeDirectoryScatter {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CodeDirectoryTeamId {
    pub team_offset: U32<BigEndian>,
}
unsafe impl Pod for CodeDirectoryTeamId {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CodeDirectoryCodeLimit64 {
    pub spare3: U32<BigEndian>,
    pub code_limit_64: U64<BigEndian>,
}
unsafe impl Pod for CodeDirectoryCodeLimit64 {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CodeDirectoryExecSeg {
    pub exec_seg_base: U64<BigEndian>,
    pub exec_seg_limit: U64<BigEndian>,
    pub exec_seg_flags: U64<BigEndian>,
}
unsafe impl Pod for CodeDirectoryExecSeg {}

// --- Swift reflection metadata. All offsets below are 32-bit,
// self-relative (relative to the byte address of the field itself) unless
// documented otherwise. ---

/// One entry of `__swift5_proto` / `__swift5_types`: a self-relative int32
/// offset to the descriptor.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RelativeOffset32<E: Endian> {
    pub offset: I32<E>,
}
unsafe impl<E: Endian> Pod for RelativeOffset32<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct FieldDescriptorHeader<E: Endian> {
    pub mangled_type_name: I32<E>,
    pub superclass: I32<E>,
    pub kind: crate::endian::U16<E>,
    pub field_record_size: crate::endian::U16<E>,
    pub num_fields: U32<E>,
}
unsafe impl<E: Endian> Pod for FieldDescriptorHeader<E> {}

#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct FieldRecord<E: Endian> {
    pub flags: U32<E>,
    pub mangled_type_name: I32<E>,
    pub field_name: I32<E>,
}
unsafe impl<E: Endian> Pod for FieldRecord<E> {}
