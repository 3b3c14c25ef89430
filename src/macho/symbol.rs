//! Symbol table and dynamic symbol table.
//!
//! An nlist slice plus a string table, extended with dysymtab index
//! ranges, the indirect-symbol table and library-ordinal extraction that a
//! format-agnostic reader typically leaves to its caller.

use std::cmp::Ordering;

use crate::endian::Endian;
use crate::error::{Error, ReadError, Result};
use crate::macho::constants::*;
use crate::macho::load_command::DysymtabFields;
use crate::macho::raw::{NList32, NList64};
use crate::pod::{self, Bytes};

/// Where a symbol's dylib import comes from, extracted from `n_desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryOrdinal {
    SelfImage,
    Ordinal(u8),
    DynamicLookup,
    Executable,
}

impl LibraryOrdinal {
    fn from_desc(n_desc: u16) -> Self {
        let ordinal = (n_desc >> N_DESC_DYNLIB_ORDINAL_SHIFT) as u8;
        match ordinal {
            SELF_LIBRARY_ORDINAL => LibraryOrdinal::SelfImage,
            DYNAMIC_LOOKUP_ORDINAL => LibraryOrdinal::DynamicLookup,
            EXECUTABLE_ORDINAL => LibraryOrdinal::Executable,
            n => LibraryOrdinal::Ordinal(n),
        }
    }
}

/// One decoded `nlist`/`nlist_64` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: Vec<u8>,
    pub n_type: u8,
    pub n_sect: u8,
    pub n_desc: u16,
    pub value: u64,
}

impl Symbol {
    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.name).unwrap_or("")
    }

    /// `true` if this symbol has no section (`n_sect == NO_SECT`).
    pub fn is_undefined(&self) -> bool {
        self.n_sect == 0 && (self.n_type & N_TYPE) == N_UNDF
    }

    pub fn is_external(&self) -> bool {
        self.n_type & N_EXT != 0
    }

    pub fn is_debug(&self) -> bool {
        self.n_type & N_STAB != 0
    }

    /// The dylib this symbol was imported from, decoded from `n_desc`.
    pub fn library_ordinal(&self) -> LibraryOrdinal {
        LibraryOrdinal::from_desc(self.n_desc)
    }

    /// Format this symbol the way a `nm`-style report would: the name,
    /// with the originating dylib ordinal appended in parens when known.
    pub fn display_with_ordinal<'a>(&'a self, libraries: &'a [Vec<u8>]) -> String {
        match self.library_ordinal() {
            LibraryOrdinal::Ordinal(n) if (n as usize) <= libraries.len() && n > 0 => {
                let lib = String::from_utf8_lossy(&libraries[n as usize - 1]);
                format!("{} ({})", self.name(), lib)
            }
            LibraryOrdinal::DynamicLookup => format!("{} (dynamically looked up)", self.name()),
            LibraryOrdinal::Executable => format!("{} (from executable)", self.name()),
            _ => self.name().to_string(),
        }
    }
}

/// Decoded `LC_SYMTAB` contents: the symbol list in on-disk order plus a
/// name-sorted index for binary search.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    /// Indices into `symbols`, sorted by `Symbol::name`.
    sorted: Vec<u32>,
}

impl SymbolTable {
    pub(crate) fn parse<E: Endian>(
        data: &[u8],
        endian: E,
        is_64: bool,
        symoff: u32,
        nsyms: u32,
        stroff: u32,
        strsize: u32,
    ) -> Result<Self> {
        let str_region = data
            .get(stroff as usize..)
            .and_then(|d| d.get(..strsize as usize))
            .ok_or(Error::TruncatedFile)?;
        let str_bytes = Bytes(str_region);

        let sym_region = data
            .get(symoff as usize..)
            .ok_or(Error::TruncatedFile)?;
        let mut symbols = Vec::with_capacity(nsyms as usize);
        if is_64 {
            let (list, _) = pod::slice_from_bytes::<NList64<E>>(sym_region, nsyms as usize)
                .read_error(Error::MalformedRecord("nlist_64"))?;
            for nl in list {
                symbols.push(Symbol {
                    name: str_bytes
                        .string_at(nl.n_strx.get(endian) as usize)
                        .unwrap_or(&[])
                        .to_vec(),
                    n_type: nl.n_type,
                    n_sect: nl.n_sect,
                    n_desc: nl.n_desc.get(endian),
                    value: nl.n_value.get(endian),
                });
            }
        } else {
            let (list, _) = pod::slice_from_bytes::<NList32<E>>(sym_region, nsyms as usize)
                .read_error(Error::MalformedRecord("nlist"))?;
            for nl in list {
                symbols.push(Symbol {
                    name: str_bytes
                        .string_at(nl.n_strx.get(endian) as usize)
                        .unwrap_or(&[])
                        .to_vec(),
                    n_type: nl.n_type,
                    n_sect: nl.n_sect,
                    n_desc: nl.n_desc.get(endian),
                    value: nl.n_value.get(endian) as u64,
                });
            }
        }

        let mut sorted: Vec<u32> = (0..symbols.len() as u32).collect();
        sorted.sort_by(|&a, &b| symbols[a as usize].name.cmp(&symbols[b as usize].name));
        Ok(SymbolTable { symbols, sorted })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Symbol> {
        self.symbols.get(index)
    }

    /// Binary search by name.
    pub fn search(&self, name: &str) -> Option<&Symbol> {
        let name = name.as_bytes();
        let idx = self
            .sorted
            .binary_search_by(|&i| self.symbols[i as usize].name.as_slice().cmp(name))
            .ok()?;
        self.symbols.get(self.sorted[idx] as usize)
    }
}

/// Decoded `LC_DYSYMTAB` contents: local/external/undefined index ranges
/// plus the indirect-symbol table.
#[derive(Debug, Clone, Default)]
pub struct Dysymtab {
    pub fields: DysymtabFieldsCopy,
    pub indirect_symbols: Vec<u32>,
}

/// `Copy`-friendly mirror of [`DysymtabFields`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DysymtabFieldsCopy {
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

impl From<DysymtabFields> for DysymtabFieldsCopy {
    fn from(d: DysymtabFields) -> Self {
        DysymtabFieldsCopy {
            ilocalsym: d.ilocalsym,
            nlocalsym: d.nlocalsym,
            iextdefsym: d.iextdefsym,
            nextdefsym: d.nextdefsym,
            iundefsym: d.iundefsym,
            nundefsym: d.nundefsym,
            tocoff: d.tocoff,
            ntoc: d.ntoc,
            modtaboff: d.modtaboff,
            nmodtab: d.nmodtab,
            extrefsymoff: d.extrefsymoff,
            nextrefsyms: d.nextrefsyms,
            indirectsymoff: d.indirectsymoff,
            nindirectsyms: d.nindirectsyms,
            extreloff: d.extreloff,
            nextrel: d.nextrel,
            locreloff: d.locreloff,
            nlocrel: d.nlocrel,
        }
    }
}

impl Dysymtab {
    pub(crate) fn parse<E: Endian>(data: &[u8], endian: E, fields: DysymtabFields) -> Result<Self> {
        let off = fields.indirectsymoff as usize;
        let count = fields.nindirectsyms as usize;
        let region = data.get(off..).ok_or(Error::TruncatedFile)?;
        let (words, _) = pod::slice_from_bytes::<crate::endian::U32<E>>(region, count)
            .read_error(Error::MalformedRecord("indirect_symbol_table"))?;
        Ok(Dysymtab {
            fields: fields.into(),
            indirect_symbols: words.iter().map(|w| w.get(endian)).collect(),
        })
    }

    /// `local`, `external` and `undefined` ranges into the owning
    /// [`SymbolTable`], per the dysymtab index/count fields.
    pub fn local_range(&self) -> std::ops::Range<usize> {
        self.fields.ilocalsym as usize..(self.fields.ilocalsym + self.fields.nlocalsym) as usize
    }

    pub fn external_range(&self) -> std::ops::Range<usize> {
        self.fields.iextdefsym as usize
            ..(self.fields.iextdefsym + self.fields.nextdefsym) as usize
    }

    pub fn undefined_range(&self) -> std::ops::Range<usize> {
        self.fields.iundefsym as usize..(self.fields.iundefsym + self.fields.nundefsym) as usize
    }
}

/// Order two symbol names the way `SymbolTable::search`'s index does;
/// exposed for callers that want to pre-sort a symbol subset the same way.
pub fn compare_names(a: &Symbol, b: &Symbol) -> Ordering {
    a.name.cmp(&b.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::{LittleEndian, U16, U32};

    fn build_file() -> Vec<u8> {
        // String table "\0_main\0_foo\0" followed by two 64-bit nlist entries.
        let strtab = b"\0_main\0_foo\0";
        let mut data = strtab.to_vec();
        for (strx, n_type, n_sect, value) in
            [(1u32, N_EXT | N_SECT, 1u8, 0x1000u64), (8, N_EXT | N_SECT, 1, 0x2000)]
        {
            data.extend_from_slice(pod::bytes_of(&U32::<LittleEndian>::new(
                LittleEndian,
                strx,
            )));
            data.push(n_type);
            data.push(n_sect);
            data.extend_from_slice(pod::bytes_of(&U16::<LittleEndian>::new(LittleEndian, 0)));
            data.extend_from_slice(pod::bytes_of(&crate::endian::U64::<LittleEndian>::new(
                LittleEndian,
                value,
            )));
        }
        data
    }

    #[test]
    fn parses_and_searches_symbols() {
        let strtab_len = b"\0_main\0_foo\0".len() as u32;
        let data = build_file();
        let table = SymbolTable::parse::<LittleEndian>(
            &data,
            LittleEndian,
            true,
            strtab_len,
            2,
            0,
            strtab_len,
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        let sym = table.search("_main").unwrap();
        assert_eq!(sym.name(), "_main");
        assert_eq!(sym.value, 0x1000);
        assert!(table.search("_missing").is_none());
    }

    #[test]
    fn library_ordinal_decoding() {
        let desc = 3u16 << N_DESC_DYNLIB_ORDINAL_SHIFT;
        assert_eq!(LibraryOrdinal::from_desc(desc), LibraryOrdinal::Ordinal(3));
        assert_eq!(
            LibraryOrdinal::from_desc(0),
            LibraryOrdinal::SelfImage
        );
    }
}
