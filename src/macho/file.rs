//! The file table of contents and the root `File` handle.
//!
//! `FileTOC::parse` reads the header, fixes endianness and bitness from
//! the magic, then walks exactly `sizeofcmds` bytes of the command region,
//! building the ordered command list and the flat section index with each
//! segment's `firstsect` filled in as it is visited. `File` wraps a
//! `FileTOC` over the original backing bytes and answers the higher-level
//! queries (segment/section lookup, symbols, code signature, VM-addressed
//! reads).

use crate::endian::{Endian, Endianness};
use crate::error::{Error, ReadError, Result};
use crate::macho::address::{AddressTranslator, MapEntry};
use crate::macho::code_signature::CodeSignature;
use crate::macho::compression;
use crate::macho::constants::*;
use crate::macho::load_command::{DysymtabFields, LoadCommand, SegmentData};
use crate::macho::raw;
use crate::macho::section::Section;
use crate::macho::segment::Segment;
use crate::macho::symbol::{Dysymtab, SymbolTable};
use crate::pod::{self, Bytes, ReadRef};

/// Header fields common to `mach_header`/`mach_header_64`, normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub is_64: bool,
}

/// Parsed header, ordered load-command list and flat section index.
///
/// Invariants maintained by [`FileTOC::parse`]: `sizeofcmds == Σ
/// load_size(cmd)`; the flat section count equals `Σ segment.nsect`; each
/// segment's `firstsect` equals the cumulative section count of the
/// segments visited before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTOC {
    pub header: Header,
    pub endian: Endianness,
    pub commands: Vec<LoadCommand>,
    pub sections: Vec<Section>,
}

fn read_magic(data: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(..4)
        .ok_or(Error::TruncatedFile)?
        .try_into()
        .map_err(|_| Error::TruncatedFile)?;
    Ok(u32::from_le_bytes(bytes))
}

impl FileTOC {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let magic = read_magic(data)?;
        let (endian, is_64) = match magic {
            MH_MAGIC => (Endianness::Little, false),
            MH_MAGIC_64 => (Endianness::Little, true),
            MH_CIGAM => (Endianness::Big, false),
            MH_CIGAM_64 => (Endianness::Big, true),
            _ => return Err(Error::NotMachO),
        };
        match endian {
            Endianness::Little => Self::parse_with_endian(data, crate::endian::LittleEndian, is_64),
            Endianness::Big => Self::parse_with_endian(data, crate::endian::BigEndian, is_64),
        }
    }

    fn parse_with_endian<E: Endian>(data: &[u8], endian: E, is_64: bool) -> Result<Self> {
        let (header, command_region_start) = if is_64 {
            let (h, _) = pod::from_bytes::<raw::MachHeader64<E>>(data)
                .read_error(Error::TruncatedFile)?;
            (
                Header {
                    magic: h.magic.get(endian),
                    cputype: h.cputype.get(endian),
                    cpusubtype: h.cpusubtype.get(endian),
                    filetype: h.filetype.get(endian),
                    ncmds: h.ncmds.get(endian),
                    sizeofcmds: h.sizeofcmds.get(endian),
                    flags: h.flags.get(endian),
                    is_64: true,
                },
                std::mem::size_of::<raw::MachHeader64<E>>(),
            )
        } else {
            let (h, _) = pod::from_bytes::<raw::MachHeader32<E>>(data)
                .read_error(Error::TruncatedFile)?;
            (
                Header {
                    magic: h.magic.get(endian),
                    cputype: h.cputype.get(endian),
                    cpusubtype: h.cpusubtype.get(endian),
                    filetype: h.filetype.get(endian),
                    ncmds: h.ncmds.get(endian),
                    sizeofcmds: h.sizeofcmds.get(endian),
                    flags: h.flags.get(endian),
                    is_64: false,
                },
                std::mem::size_of::<raw::MachHeader32<E>>(),
            )
        };

        let command_region = data
            .get(command_region_start..command_region_start + header.sizeofcmds as usize)
            .ok_or(Error::TruncatedFile)?;

        let mut commands = Vec::with_capacity(header.ncmds as usize);
        let mut sections = Vec::new();
        let mut cursor = Bytes(command_region);
        let mut consumed = 0usize;
        for _ in 0..header.ncmds {
            let (mut command, size) = LoadCommand::parse(cursor, endian, is_64)?;
            if let LoadCommand::Segment(ref mut seg) = command {
                seg.firstsect = sections.len();
                sections.extend_from_slice(&seg.sections);
            }
            commands.push(command);
            consumed += size;
            cursor.skip(size).read_error(Error::TruncatedFile)?;
        }
        if consumed != header.sizeofcmds as usize {
            return Err(Error::BadLoadCommandLength);
        }

        let endianness = if endian.is_big_endian() {
            Endianness::Big
        } else {
            Endianness::Little
        };
        Ok(FileTOC {
            header,
            endian: endianness,
            commands,
            sections,
        })
    }

    /// All `SegmentData`s, in load-command order.
    pub fn segments(&self) -> impl Iterator<Item = &SegmentData> {
        self.commands.iter().filter_map(|c| match c {
            LoadCommand::Segment(s) => Some(s),
            _ => None,
        })
    }

    pub fn segment_by_name(&self, name: &str) -> Option<&SegmentData> {
        self.segments().find(|s| s.name() == name)
    }

    /// A section by `(segment, section)` name pair, searched in the flat
    /// section list.
    pub fn section_by_seg_name(&self, segment: &str, section: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| s.segment_name() == segment && s.name() == section)
    }

    pub fn uuid(&self) -> Option<uuid::Uuid> {
        self.commands.iter().find_map(|c| match c {
            LoadCommand::Uuid(u) => Some(uuid::Uuid::from_bytes(*u)),
            _ => None,
        })
    }

    /// File offset of the entry point, if an `LC_MAIN` command is present.
    pub fn entrypoint(&self) -> Option<u64> {
        self.commands.iter().find_map(|c| match c {
            LoadCommand::Main { entryoff, .. } => Some(*entryoff),
            _ => None,
        })
    }

    pub fn imported_libraries(&self) -> impl Iterator<Item = &crate::macho::load_command::DylibData> {
        self.commands.iter().filter_map(|c| match c {
            LoadCommand::Dylib(d) if d.kind != crate::macho::load_command::DylibKind::Id => {
                Some(d)
            }
            _ => None,
        })
    }

    fn symtab_fields(&self) -> Option<(u32, u32, u32, u32)> {
        self.commands.iter().find_map(|c| match c {
            LoadCommand::Symtab {
                symoff,
                nsyms,
                stroff,
                strsize,
            } => Some((*symoff, *nsyms, *stroff, *strsize)),
            _ => None,
        })
    }

    fn dysymtab_fields(&self) -> Option<DysymtabFields> {
        self.commands.iter().find_map(|c| match c {
            LoadCommand::Dysymtab(d) => Some(*d),
            _ => None,
        })
    }

    fn address_translator(&self) -> AddressTranslator {
        AddressTranslator::new(
            self.segments()
                .map(|s| MapEntry {
                    vmaddr: s.vmaddr,
                    vmsize: s.vmsize,
                    fileoff: s.fileoff,
                    filesize: s.filesize,
                })
                .collect(),
        )
    }
}

/// Root handle: owns the backing random-access byte source plus its parsed
/// `FileTOC`.
#[derive(Debug, Clone, Copy)]
pub struct File<'data, R> {
    data: R,
    toc_owner: &'data FileTOCOwned,
}

/// `FileTOC` together with the raw bytes it was parsed from, kept alive for
/// the lifetime of a `File` so segment/section reads can borrow from it
/// directly instead of re-reading through `R` for every query.
#[derive(Debug, Clone)]
pub struct FileTOCOwned {
    pub toc: FileTOC,
    data: Vec<u8>,
}

impl FileTOCOwned {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let toc = FileTOC::parse(data)?;
        Ok(FileTOCOwned {
            toc,
            data: data.to_vec(),
        })
    }

    pub fn toc(&self) -> &FileTOC {
        &self.toc
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Build a `File` view borrowing this owner's bytes through `reader`.
    pub fn view<'data, R: ReadRef<'data>>(&'data self, reader: R) -> File<'data, R> {
        File {
            data: reader,
            toc_owner: self,
        }
    }
}

impl<'data, R: ReadRef<'data>> File<'data, R> {
    pub fn toc(&self) -> &FileTOC {
        &self.toc_owner.toc
    }

    pub fn header(&self) -> Header {
        self.toc().header
    }

    /// The entire backing byte source, read in one shot. Used by the
    /// reflection scanners and the Mach-O-backed symbolic-reference
    /// resolver, which both index by absolute file offset.
    pub fn raw_data(&self) -> &'data [u8] {
        let len = self.data.len().unwrap_or(0);
        self.data.read_bytes_at(0, len).unwrap_or(&[])
    }

    pub fn segment_by_name(&self, name: &str) -> Option<&SegmentData> {
        self.toc().segment_by_name(name)
    }

    pub fn section(&self, segment: &str, section: &str) -> Option<&Section> {
        self.toc().section_by_seg_name(segment, section)
    }

    pub fn uuid(&self) -> Option<uuid::Uuid> {
        self.toc().uuid()
    }

    pub fn entrypoint(&self) -> Option<u64> {
        self.toc().entrypoint()
    }

    pub fn imported_libraries(
        &self,
    ) -> impl Iterator<Item = &crate::macho::load_command::DylibData> {
        self.toc().imported_libraries()
    }

    /// Build a reader bounded to the named segment's `[fileoff, fileoff +
    /// filesize)` range.
    pub fn segment(&self, name: &str) -> Option<Segment<'data, R>> {
        self.toc()
            .segment_by_name(name)
            .map(|s| Segment::new(s, self.data))
    }

    /// Raw bytes of a section, decompressing `__z*`-prefixed sections
    /// transparently.
    pub fn section_data(&self, segment: &str, section: &str) -> Result<Vec<u8>> {
        let sect = self
            .section(segment, section)
            .ok_or(Error::MalformedRecord("section not found"))?;
        if sect.is_zerofill() {
            return Ok(vec![0u8; sect.size as usize]);
        }
        let raw = self
            .data
            .read_bytes_at(sect.offset as u64, sect.size)
            .read_error(Error::TruncatedFile)?;
        if compression::is_compressed_section_name(sect.name()) {
            compression::decompress_section(raw)
        } else {
            Ok(raw.to_vec())
        }
    }

    /// Translate a VM address to the bytes at that address, bounded to
    /// `len`.
    pub fn data_at_vm(&self, addr: u64, len: u64) -> Result<&'data [u8]> {
        let offset = self.address_translator().vm_to_offset(addr)?;
        self.data
            .read_bytes_at(offset, len)
            .read_error(Error::TruncatedFile)
    }

    pub fn address_translator(&self) -> AddressTranslator {
        self.toc().address_translator()
    }

    /// Parse the symbol table (`LC_SYMTAB`), if present.
    pub fn symbols(&self) -> Result<Option<SymbolTable>> {
        let Some((symoff, nsyms, stroff, strsize)) = self.toc().symtab_fields() else {
            return Ok(None);
        };
        let data = self
            .data
            .read_bytes_at(0, self.data.len().read_error(Error::TruncatedFile)?)
            .read_error(Error::TruncatedFile)?;
        match self.toc().endian {
            Endianness::Little => SymbolTable::parse(
                data,
                crate::endian::LittleEndian,
                self.header().is_64,
                symoff,
                nsyms,
                stroff,
                strsize,
            )
            .map(Some),
            Endianness::Big => SymbolTable::parse(
                data,
                crate::endian::BigEndian,
                self.header().is_64,
                symoff,
                nsyms,
                stroff,
                strsize,
            )
            .map(Some),
        }
    }

    /// Parse the dynamic symbol table (`LC_DYSYMTAB`), if present.
    pub fn dysymtab(&self) -> Result<Option<Dysymtab>> {
        let Some(fields) = self.toc().dysymtab_fields() else {
            return Ok(None);
        };
        let data = self
            .data
            .read_bytes_at(0, self.data.len().read_error(Error::TruncatedFile)?)
            .read_error(Error::TruncatedFile)?;
        match self.toc().endian {
            Endianness::Little => {
                Dysymtab::parse(data, crate::endian::LittleEndian, fields).map(Some)
            }
            Endianness::Big => Dysymtab::parse(data, crate::endian::BigEndian, fields).map(Some),
        }
    }

    /// Parse the code signature super-blob (`LC_CODE_SIGNATURE`'s
    /// LINKEDIT-relative data), if present.
    pub fn code_signature(&self) -> Result<Option<CodeSignature>> {
        let Some((dataoff, datasize)) = self.toc().commands.iter().find_map(|c| match c {
            LoadCommand::LinkeditData {
                kind: crate::macho::load_command::LinkeditDataKind::CodeSignature,
                dataoff,
                datasize,
            } => Some((*dataoff, *datasize)),
            _ => None,
        }) else {
            return Ok(None);
        };
        let blob = self
            .data
            .read_bytes_at(dataoff as u64, datasize as u64)
            .read_error(Error::TruncatedFile)?;
        CodeSignature::parse(blob).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::{LittleEndian, U32};
    use crate::pod::bytes_of;

    fn build_minimal_file() -> Vec<u8> {
        let mut data = Vec::new();
        // mach_header_64
        for v in [
            MH_MAGIC_64,
            0, // cputype
            0, // cpusubtype
            MH_EXECUTE,
            1, // ncmds
            0, // sizeofcmds, patched below
            0, // flags
        ] {
            data.extend_from_slice(bytes_of(&U32::new(LittleEndian, v)));
        }
        data.extend_from_slice(bytes_of(&U32::new(LittleEndian, 0))); // reserved

        // LC_UUID command
        let mut cmd = Vec::new();
        cmd.extend_from_slice(bytes_of(&U32::new(LittleEndian, LC_UUID)));
        cmd.extend_from_slice(bytes_of(&U32::new(LittleEndian, 24)));
        cmd.extend_from_slice(&[0xaa; 16]);
        let sizeofcmds = cmd.len() as u32;
        data[20..24].copy_from_slice(&sizeofcmds.to_le_bytes());
        data.extend_from_slice(&cmd);
        data
    }

    #[test]
    fn parses_header_and_uuid() {
        let data = build_minimal_file();
        let toc = FileTOC::parse(&data).unwrap();
        assert!(toc.header.is_64);
        assert_eq!(toc.header.filetype, MH_EXECUTE);
        assert_eq!(toc.uuid(), Some(uuid::Uuid::from_bytes([0xaa; 16])));
    }

    #[test]
    fn rejects_bad_magic() {
        let data = vec![0u8; 32];
        assert_eq!(FileTOC::parse(&data), Err(Error::NotMachO));
    }

    #[test]
    fn file_view_reads_segment() {
        let data = build_minimal_file();
        let owner = FileTOCOwned::parse(&data).unwrap();
        let file = owner.view(owner.data());
        assert_eq!(file.uuid(), Some(uuid::Uuid::from_bytes([0xaa; 16])));
        assert!(file.segment_by_name("__TEXT").is_none());
    }
}
