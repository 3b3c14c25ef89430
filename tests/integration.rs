//! End-to-end scenarios: a hand-built Mach-O file exercising load commands,
//! section lookup and symbol search, plus the Swift demangler's worked
//! examples.

use machotoc::demangle::{
    classify, demangle_symbol, demangle_type, format, normalize_identifier, MachOResolver,
    PlaceholderResolver, ReferenceKind, SymbolicReferenceResolver,
};
use machotoc::endian::{LittleEndian, U16, U32, U64};
use machotoc::macho::constants::*;
use machotoc::macho::load_command::{LoadCommand, SegmentData};
use machotoc::macho::section::Section;
use machotoc::pod::bytes_of;

fn sect(name: &[u8], segname: &[u8], addr: u64, size: u64, offset: u32) -> Section {
    let mut sectname = [0u8; 16];
    sectname[..name.len()].copy_from_slice(name);
    let mut segn = [0u8; 16];
    segn[..segname.len()].copy_from_slice(segname);
    Section {
        sectname,
        segname: segn,
        addr,
        size,
        offset,
        align: 0,
        reloff: 0,
        nreloc: 0,
        flags: 0,
        reserved1: 0,
        reserved2: 0,
        reserved3: 0,
    }
}

fn segment_name(name: &[u8]) -> [u8; 16] {
    let mut segname = [0u8; 16];
    segname[..name.len()].copy_from_slice(name);
    segname
}

/// Build a minimal, internally-consistent 64-bit Mach-O executable: one
/// `__TEXT,__text` section, a two-symbol symbol table and a UUID. Values
/// are threaded through in three passes: command shapes first (to learn
/// `sizeofcmds`), then the trailing LINKEDIT-style byte layout that the
/// command offsets point into.
fn build_fixture() -> (Vec<u8>, u64 /* text vmaddr */) {
    let text_vmaddr = 0x1000u64;
    let code = b"\xc3\xc3\xc3\xc3".to_vec(); // 4 bytes of filler code

    let strtab = b"\0_main\0_foo\0".to_vec();
    let main_strx = 1u32;
    let foo_strx = 6u32;

    // Pass 1: command shapes with placeholder offsets, just to learn sizes.
    let placeholder_segment = LoadCommand::Segment(SegmentData {
        is_64: true,
        segname: segment_name(b"__TEXT"),
        vmaddr: text_vmaddr,
        vmsize: code.len() as u64,
        fileoff: 0,
        filesize: code.len() as u64,
        maxprot: 7,
        initprot: 5,
        flags: 0,
        firstsect: 0,
        sections: vec![sect(b"__text", b"__TEXT", text_vmaddr, code.len() as u64, 0)],
    });
    let placeholder_symtab = LoadCommand::Symtab {
        symoff: 0,
        nsyms: 2,
        stroff: 0,
        strsize: strtab.len() as u32,
    };
    let uuid_cmd = LoadCommand::Uuid([0x42; 16]);

    let header_size = 32usize; // mach_header_64
    let sizeofcmds = placeholder_segment.load_size()
        + placeholder_symtab.load_size()
        + uuid_cmd.load_size();
    let command_region_end = header_size + sizeofcmds as usize;

    let section_offset = command_region_end as u32;
    let strtab_offset = section_offset as usize + code.len();
    let symtab_offset = strtab_offset + strtab.len();

    // Pass 2: real offsets plugged in; sizes are unchanged from pass 1
    // since only field values (not section/command counts) changed.
    let segment = LoadCommand::Segment(SegmentData {
        is_64: true,
        segname: segment_name(b"__TEXT"),
        vmaddr: text_vmaddr,
        vmsize: code.len() as u64,
        fileoff: section_offset as u64,
        filesize: code.len() as u64,
        maxprot: 7,
        initprot: 5,
        flags: 0,
        firstsect: 0,
        sections: vec![sect(
            b"__text",
            b"__TEXT",
            text_vmaddr,
            code.len() as u64,
            section_offset,
        )],
    });
    let symtab = LoadCommand::Symtab {
        symoff: symtab_offset as u32,
        nsyms: 2,
        stroff: strtab_offset as u32,
        strsize: strtab.len() as u32,
    };

    let commands = [segment, symtab, uuid_cmd];
    let mut data = Vec::new();
    for v in [
        MH_MAGIC_64,
        CPU_TYPE_X86_64,
        0, // cpusubtype
        MH_EXECUTE,
        commands.len() as u32,
        sizeofcmds,
        0, // flags
    ] {
        data.extend_from_slice(bytes_of(&U32::new(LittleEndian, v)));
    }
    data.extend_from_slice(bytes_of(&U32::new(LittleEndian, 0))); // reserved
    assert_eq!(data.len(), header_size);

    for cmd in &commands {
        cmd.write(&mut data, LittleEndian);
    }
    assert_eq!(data.len(), command_region_end);

    data.extend_from_slice(&code);
    data.extend_from_slice(&strtab);

    // Two nlist_64 entries: "_main" at the section's base, "_foo" 1 byte in.
    for (strx, value) in [(main_strx, text_vmaddr), (foo_strx, text_vmaddr + 1)] {
        data.extend_from_slice(bytes_of(&U32::new(LittleEndian, strx)));
        data.push(N_EXT | N_SECT);
        data.push(1); // n_sect
        data.extend_from_slice(bytes_of(&U16::new(LittleEndian, 0)));
        data.extend_from_slice(bytes_of(&U64::new(LittleEndian, value)));
    }

    (data, text_vmaddr)
}

/// S1: the file's load commands enumerate in on-disk order and each
/// command's re-serialization matches its own `load_size`.
#[test]
fn scenario_s1_load_commands() {
    let (data, _) = build_fixture();
    let toc = machotoc::open(&data).unwrap();
    assert_eq!(toc.toc().commands.len(), 3);
    assert!(toc.toc().segment_by_name("__TEXT").is_some());
    assert_eq!(toc.toc().uuid(), Some(uuid::Uuid::from_bytes([0x42; 16])));
}

/// S2: a section can be found by its (segment, section) name pair and its
/// file bytes read back.
#[test]
fn scenario_s2_section_by_name() {
    let (data, _) = build_fixture();
    let owner = machotoc::FileTOCOwned::parse(&data).unwrap();
    let file = owner.view(owner.data());
    let section = file.section("__TEXT", "__text").unwrap();
    assert_eq!(section.size, 4);
    let bytes = file.section_data("__TEXT", "__text").unwrap();
    assert_eq!(bytes, vec![0xc3, 0xc3, 0xc3, 0xc3]);
}

/// S3: every symbol in the file is found by `SymbolTable::search` on its
/// own name, and absent names return `None`.
#[test]
fn scenario_s3_symbol_search() {
    let (data, _) = build_fixture();
    let owner = machotoc::FileTOCOwned::parse(&data).unwrap();
    let file = owner.view(owner.data());
    let symbols = file.symbols().unwrap().unwrap();
    assert_eq!(symbols.len(), 2);
    for name in ["_main", "_foo"] {
        let sym = symbols.search(name).unwrap();
        assert_eq!(sym.name(), name);
        assert!(sym.is_external());
    }
    assert!(symbols.search("_nonexistent").is_none());
}

/// Address translation round-trips a VM address back to its file offset
/// through the one segment in the fixture.
#[test]
fn address_translation_round_trips() {
    let (data, text_vmaddr) = build_fixture();
    let owner = machotoc::FileTOCOwned::parse(&data).unwrap();
    let file = owner.view(owner.data());
    let bytes = file.data_at_vm(text_vmaddr + 1, 2).unwrap();
    assert_eq!(bytes, &[0xc3, 0xc3]);
}

/// S4: `demangle_type` on the five worked type-sugar examples.
#[test]
fn scenario_s4_type_sugar() {
    let cases = [
        ("Sb", "Swift.Bool"),
        ("SSSg", "Swift.String?"),
        ("Si_SSt", "(Swift.Int, Swift.String)"),
        ("SaySiG", "[Swift.Int]"),
        ("SDySSSiG", "[Swift.String : Swift.Int]"),
    ];
    for (mangled, expected) in cases {
        let (arena, root) = demangle_type(mangled).unwrap();
        assert_eq!(format(&arena, root), expected, "mangled = {mangled}");
    }
}

/// S5: a full symbol demangles to its complete Swift function signature.
#[test]
fn scenario_s5_full_function_signature() {
    let mangled = "$s13lockdownmoded18LockdownModeServerC8listener_\
25shouldAcceptNewConnectionSbSo13NSXPCListenerC_So15NSXPCConnectionCtF";
    let (arena, root) = demangle_symbol(mangled).unwrap();
    assert_eq!(
        format(&arena, root),
        "lockdownmoded.LockdownModeServer.listener(_: __C.NSXPCListener, \
shouldAcceptNewConnection: __C.NSXPCConnection) -> Swift.Bool"
    );
}

/// S6: a mangling carrying a symbolic reference into an `@callee_guaranteed`
/// function type still renders that convention keyword.
#[test]
fn scenario_s6_impl_function_type_convention() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"Sb");
    bytes.push(0x02);
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(b"_pSgIegyg_");
    let text = String::from_utf8(bytes).unwrap();
    let (arena, root) = demangle_type(&text).unwrap();
    assert!(format(&arena, root).contains("@callee_guaranteed"));
}

/// Without a resolver that can actually answer, every symbolic reference
/// resolves to a placeholder node and the rest of the mangling still
/// parses to completion instead of erroring out.
#[test]
fn property_unresolved_symbolic_reference_still_parses() {
    let mut bytes = Vec::new();
    bytes.push(0x01);
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(b"Sg");
    let text = String::from_utf8(bytes).unwrap();
    let (arena, root) = demangle_type(&text).unwrap();
    // Wrapped in `Sg` (optional sugar), so this must still be a fully
    // formed optional over the placeholder, not a parse error.
    assert_eq!(arena.get(root).kind, Some(machotoc::demangle::Kind::OptionalWrap));
    assert!(format(&arena, root).ends_with('?'));
}

/// Symbolic reference control bytes classify into the kinds the resolver
/// dispatches on.
#[test]
fn symbolic_reference_control_byte_table() {
    assert_eq!(classify(0x01), Some(ReferenceKind::DirectTypeDescriptor));
    assert_eq!(classify(0x02), Some(ReferenceKind::IndirectTypeDescriptor));
    assert_eq!(classify(0x09), Some(ReferenceKind::AccessorFunctionReference));
    assert_eq!(classify(0xFF), None);
}

/// A `MachOResolver` built over a file with no Swift reflection sections
/// resolves every symbolic reference as a miss rather than panicking or
/// erroring the whole demangle.
#[test]
fn macho_resolver_with_no_reflection_sections_misses_cleanly() {
    let (data, _) = build_fixture();
    let owner = machotoc::FileTOCOwned::parse(&data).unwrap();
    let file = owner.view(owner.data());
    let resolver = MachOResolver::new(&file, 0);

    let mut bytes = Vec::new();
    bytes.push(0x01);
    bytes.extend_from_slice(&0i32.to_le_bytes());
    bytes.extend_from_slice(b"Sg");
    let text = String::from_utf8(bytes).unwrap();
    let (arena, root) = machotoc::demangle::demangle_type_with(&text, &resolver).unwrap();
    assert!(format(&arena, root).ends_with('?'));

    // Also exercise the default placeholder resolver directly, for parity.
    let placeholder = PlaceholderResolver;
    let label = placeholder
        .resolve(ReferenceKind::DirectTypeDescriptor, 0x01, 0, 0)
        .unwrap();
    assert!(label.starts_with("<symbolic@"));
}

/// Legacy `_T`-prefixed and dotted-plain-identifier symbols fall back to
/// best-effort normalization instead of failing to demangle at all.
#[test]
fn legacy_symbols_normalize_instead_of_erroring() {
    assert_eq!(normalize_identifier("_TtC7MyMod__MyClass"), "MyMod.MyClass");
    let (arena, root) = demangle_symbol("_not_a_swift_mangling__at_all").unwrap();
    assert_eq!(format(&arena, root), "not_a_swift_mangling.at_all");
}
