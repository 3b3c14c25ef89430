//! Magic numbers and fixed enumerations for the Mach-O format.
//!
//! One `pub const NAME: u32 = ...` catalogue per concern (magics, cpu
//! types, load-command tags, section flags, symbol bits, code-signature
//! magics), scoped to Mach-O only.

#![allow(missing_docs)]

// Magic numbers. The byte order of the rest of the file is implied by which
// of these is read first, without any further byte-swapping of the magic
// itself.
pub const MH_MAGIC: u32 = 0xfeedface;
pub const MH_CIGAM: u32 = 0xcefaedfe;
pub const MH_MAGIC_64: u32 = 0xfeedfacf;
pub const MH_CIGAM_64: u32 = 0xcffaedfe;
pub const FAT_MAGIC: u32 = 0xcafebabe;
pub const FAT_CIGAM: u32 = 0xbebafeca;

// CPU types (`cputype`).
pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;
pub const CPU_TYPE_X86: u32 = 7;
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM: u32 = 12;
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
pub const CPU_TYPE_POWERPC: u32 = 18;
pub const CPU_TYPE_POWERPC64: u32 = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

// File types (`filetype`).
pub const MH_OBJECT: u32 = 0x1;
pub const MH_EXECUTE: u32 = 0x2;
pub const MH_FVMLIB: u32 = 0x3;
pub const MH_CORE: u32 = 0x4;
pub const MH_PRELOAD: u32 = 0x5;
pub const MH_DYLIB: u32 = 0x6;
pub const MH_DYLINKER: u32 = 0x7;
pub const MH_BUNDLE: u32 = 0x8;
pub const MH_DYLIB_STUB: u32 = 0x9;
pub const MH_DSYM: u32 = 0xa;
pub const MH_KEXT_BUNDLE: u32 = 0xb;
pub const MH_FILESET: u32 = 0xc;

// Header flags (`flags`).
pub const MH_NOUNDEFS: u32 = 0x1;
pub const MH_TWOLEVEL: u32 = 0x80;
pub const MH_PIE: u32 = 0x0020_0000;

// Load command tags (`cmd`). High bit marks "required for dyld" variants.
pub const LC_REQ_DYLD: u32 = 0x8000_0000;

pub const LC_SEGMENT: u32 = 0x1;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_SYMSEG: u32 = 0x3;
pub const LC_THREAD: u32 = 0x4;
pub const LC_UNIXTHREAD: u32 = 0x5;
pub const LC_LOADFVMLIB: u32 = 0x6;
pub const LC_IDFVMLIB: u32 = 0x7;
pub const LC_IDENT: u32 = 0x8;
pub const LC_FVMFILE: u32 = 0x9;
pub const LC_PREPAGE: u32 = 0xa;
pub const LC_DYSYMTAB: u32 = 0xb;
pub const LC_LOAD_DYLIB: u32 = 0xc;
pub const LC_ID_DYLIB: u32 = 0xd;
pub const LC_LOAD_DYLINKER: u32 = 0xe;
pub const LC_ID_DYLINKER: u32 = 0xf;
pub const LC_PREBOUND_DYLIB: u32 = 0x10;
pub const LC_ROUTINES: u32 = 0x11;
pub const LC_SUB_FRAMEWORK: u32 = 0x12;
pub const LC_SUB_UMBRELLA: u32 = 0x13;
pub const LC_SUB_CLIENT: u32 = 0x14;
pub const LC_SUB_LIBRARY: u32 = 0x15;
pub const LC_TWOLEVEL_HINTS: u32 = 0x16;
pub const LC_PREBIND_CKSUM: u32 = 0x17;
pub const LC_LOAD_WEAK_DYLIB: u32 = 0x18 | LC_REQ_DYLD;
pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_ROUTINES_64: u32 = 0x1a;
pub const LC_UUID: u32 = 0x1b;
pub const LC_RPATH: u32 = 0x1c | LC_REQ_DYLD;
pub const LC_CODE_SIGNATURE: u32 = 0x1d;
pub const LC_SEGMENT_SPLIT_INFO: u32 = 0x1e;
pub const LC_REEXPORT_DYLIB: u32 = 0x1f | LC_REQ_DYLD;
pub const LC_LAZY_LOAD_DYLIB: u32 = 0x20;
pub const LC_ENCRYPTION_INFO: u32 = 0x21;
pub const LC_DYLD_INFO: u32 = 0x22;
pub const LC_DYLD_INFO_ONLY: u32 = 0x22 | LC_REQ_DYLD;
pub const LC_LOAD_UPWARD_DYLIB: u32 = 0x23 | LC_REQ_DYLD;
pub const LC_VERSION_MIN_MACOSX: u32 = 0x24;
pub const LC_VERSION_MIN_IPHONEOS: u32 = 0x25;
pub const LC_FUNCTION_STARTS: u32 = 0x26;
pub const LC_DYLD_ENVIRONMENT: u32 = 0x27;
pub const LC_MAIN: u32 = 0x28 | LC_REQ_DYLD;
pub const LC_DATA_IN_CODE: u32 = 0x29;
pub const LC_SOURCE_VERSION: u32 = 0x2a;
pub const LC_DYLIB_CODE_SIGN_DRS: u32 = 0x2b;
pub const LC_ENCRYPTION_INFO_64: u32 = 0x2c;
pub const LC_LINKER_OPTION: u32 = 0x2d;
pub const LC_LINKER_OPTIMIZATION_HINT: u32 = 0x2e;
pub const LC_VERSION_MIN_TVOS: u32 = 0x2f;
pub const LC_VERSION_MIN_WATCHOS: u32 = 0x30;
pub const LC_NOTE: u32 = 0x31;
pub const LC_BUILD_VERSION: u32 = 0x32;
pub const LC_DYLD_EXPORTS_TRIE: u32 = 0x33 | LC_REQ_DYLD;
pub const LC_DYLD_CHAINED_FIXUPS: u32 = 0x34 | LC_REQ_DYLD;
pub const LC_FILESET_ENTRY: u32 = 0x35 | LC_REQ_DYLD;

// Section flags: low byte is the type, remaining bits are attributes.
pub const SECTION_TYPE: u32 = 0x0000_00ff;
pub const SECTION_ATTRIBUTES: u32 = 0xffff_ff00;
pub const S_REGULAR: u32 = 0x0;
pub const S_ZEROFILL: u32 = 0x1;
pub const S_CSTRING_LITERALS: u32 = 0x2;
pub const S_NON_LAZY_SYMBOL_POINTERS: u32 = 0x6;
pub const S_LAZY_SYMBOL_POINTERS: u32 = 0x7;
pub const S_SYMBOL_STUBS: u32 = 0x8;
pub const S_MOD_INIT_FUNC_POINTERS: u32 = 0x9;
pub const S_MOD_TERM_FUNC_POINTERS: u32 = 0xa;
pub const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;
pub const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x0000_0400;
pub const S_ATTR_DEBUG: u32 = 0x0200_0000;

// Segment/section protection bitfields.
pub const VM_PROT_NONE: u32 = 0x0;
pub const VM_PROT_READ: u32 = 0x1;
pub const VM_PROT_WRITE: u32 = 0x2;
pub const VM_PROT_EXECUTE: u32 = 0x4;

// Segment flags.
pub const SG_HIGHVM: u32 = 0x1;
pub const SG_NORELOC: u32 = 0x4;

// nlist `n_type` field bit layout.
pub const N_STAB: u8 = 0xe0;
pub const N_PEXT: u8 = 0x10;
pub const N_TYPE: u8 = 0x0e;
pub const N_EXT: u8 = 0x01;
pub const N_UNDF: u8 = 0x0;
pub const N_ABS: u8 = 0x2;
pub const N_SECT: u8 = 0xe;
pub const N_PBUD: u8 = 0xc;
pub const N_INDR: u8 = 0xa;

// `n_desc` library ordinal bitfield (`GET_LIBRARY_ORDINAL`).
pub const N_DESC_DYNLIB_ORDINAL_SHIFT: u32 = 8;
pub const SELF_LIBRARY_ORDINAL: u8 = 0x0;
pub const DYNAMIC_LOOKUP_ORDINAL: u8 = 0xfe;
pub const EXECUTABLE_ORDINAL: u8 = 0xff;

// Relocation `r_length` codes.
pub const RELOC_LEN_BYTE: u8 = 0;
pub const RELOC_LEN_WORD: u8 = 1;
pub const RELOC_LEN_LONG: u8 = 2;
pub const RELOC_LEN_QUAD: u8 = 3;

// Code signature, always big-endian on disk.
pub const CSMAGIC_REQUIREMENT: u32 = 0xfade_0c00;
pub const CSMAGIC_REQUIREMENTS: u32 = 0xfade_0c01;
pub const CSMAGIC_CODEDIRECTORY: u32 = 0xfade_0c02;
pub const CSMAGIC_EMBEDDED_SIGNATURE: u32 = 0xfade_0cc0;
pub const CSMAGIC_EMBEDDED_ENTITLEMENTS: u32 = 0xfade_7171;
pub const CSMAGIC_DETACHED_SIGNATURE: u32 = 0xfade_0cc1;
pub const CSMAGIC_BLOBWRAPPER: u32 = 0xfade_0b01;

pub const CSSLOT_CODEDIRECTORY: u32 = 0;
pub const CSSLOT_REQUIREMENTS: u32 = 2;
pub const CSSLOT_ENTITLEMENTS: u32 = 5;
pub const CSSLOT_ALTERNATE_CODEDIRECTORIES: u32 = 0x1000;
pub const CSSLOT_SIGNATURESLOT: u32 = 0x10000;

pub const CS_SUPPORTSSCATTER: u32 = 0x2_0100;
pub const CS_SUPPORTSTEAMID: u32 = 0x2_0200;
pub const CS_SUPPORTSCODELIMIT64: u32 = 0x2_0300;
pub const CS_SUPPORTSEXECSEG: u32 = 0x2_0400;
pub const CS_SUPPORTSPREENCRYPT: u32 = 0x2_0500;

/// Return a short normative label for a load-command tag, or `None` for
/// tags this crate does not specifically decode.
pub fn load_command_name(cmd: u32) -> Option<&'static str> {
    Some(match cmd {
        LC_SEGMENT => "SEGMENT",
        LC_SEGMENT_64 => "SEGMENT_64",
        LC_SYMTAB => "SYMTAB",
        LC_DYSYMTAB => "DYSYMTAB",
        LC_LOAD_DYLIB => "LOAD_DYLIB",
        LC_LOAD_WEAK_DYLIB => "LOAD_WEAK_DYLIB",
        LC_REEXPORT_DYLIB => "REEXPORT_DYLIB",
        LC_LAZY_LOAD_DYLIB => "LAZY_LOAD_DYLIB",
        LC_LOAD_UPWARD_DYLIB => "UPWARD_DYLIB",
        LC_ID_DYLIB => "ID_DYLIB",
        LC_LOAD_DYLINKER => "LOAD_DYLINKER",
        LC_ID_DYLINKER => "ID_DYLINKER",
        LC_DYLD_ENVIRONMENT => "DYLD_ENVIRONMENT",
        LC_RPATH => "RPATH",
        LC_SUB_FRAMEWORK => "SUB_FRAMEWORK",
        LC_SUB_UMBRELLA => "SUB_UMBRELLA",
        LC_SUB_CLIENT => "SUB_CLIENT",
        LC_SUB_LIBRARY => "SUB_LIBRARY",
        LC_UUID => "UUID",
        LC_CODE_SIGNATURE => "CODE_SIGNATURE",
        LC_SEGMENT_SPLIT_INFO => "SEGMENT_SPLIT_INFO",
        LC_FUNCTION_STARTS => "FUNCTION_STARTS",
        LC_DATA_IN_CODE => "DATA_IN_CODE",
        LC_DYLIB_CODE_SIGN_DRS => "DYLIB_CODE_SIGN_DRS",
        LC_LINKER_OPTIMIZATION_HINT => "LINKER_OPTIMIZATION_HINT",
        LC_DYLD_EXPORTS_TRIE => "DYLD_EXPORTS_TRIE",
        LC_DYLD_CHAINED_FIXUPS => "DYLD_CHAINED_FIXUPS",
        LC_ENCRYPTION_INFO => "ENCRYPTION_INFO",
        LC_ENCRYPTION_INFO_64 => "ENCRYPTION_INFO_64",
        LC_DYLD_INFO => "DYLD_INFO",
        LC_DYLD_INFO_ONLY => "DYLD_INFO_ONLY",
        LC_MAIN => "MAIN",
        LC_VERSION_MIN_MACOSX => "VERSION_MIN_MACOSX",
        LC_VERSION_MIN_IPHONEOS => "VERSION_MIN_IPHONEOS",
        LC_VERSION_MIN_TVOS => "VERSION_MIN_TVOS",
        LC_VERSION_MIN_WATCHOS => "VERSION_MIN_WATCHOS",
        LC_BUILD_VERSION => "BUILD_VERSION",
        LC_SOURCE_VERSION => "SOURCE_VERSION",
        LC_NOTE => "NOTE",
        LC_FILESET_ENTRY => "FILESET_ENTRY",
        LC_LINKER_OPTION => "LINKER_OPTION",
        LC_THREAD => "THREAD",
        LC_UNIXTHREAD => "UNIXTHREAD",
        _ => return None,
    })
}
