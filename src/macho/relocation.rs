//! Relocation entries.
//!
//! A plain (non-scattered) entry packs `r_pcrel`/`r_length`/`r_extern`/
//! `r_type` into the low bits of `r_info`, with the high bit of the first
//! word (`r_address`) marking a *scattered* entry, whose bit layout differs:
//! the scattered form packs `r_scattered`/`r_type`/`r_length`/`r_pcrel` into
//! the high bits of what would otherwise be `r_address`, and stores the
//! full 32-bit referent value in `r_info` instead of a symbol/section index.

use crate::endian::Endian;
use crate::macho::constants::{RELOC_LEN_BYTE, RELOC_LEN_LONG, RELOC_LEN_QUAD, RELOC_LEN_WORD};
use crate::macho::raw::RelocationInfo;

/// The length code carried by `r_length`: one of byte, word, long, quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationLength {
    Byte,
    Word,
    Long,
    Quad,
}

impl RelocationLength {
    fn from_code(code: u8) -> Self {
        match code {
            RELOC_LEN_BYTE => RelocationLength::Byte,
            RELOC_LEN_WORD => RelocationLength::Word,
            RELOC_LEN_LONG => RelocationLength::Long,
            _ => RelocationLength::Quad,
        }
    }
}

/// One relocation entry, normalized from either the plain or scattered
/// on-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    pub address: u32,
    /// For a non-scattered, `r_extern` entry: a symbol table index.
    /// For a non-scattered, non-extern entry: a 1-based section number.
    /// For a scattered entry: the full referent value (not an index).
    pub symbol_or_value: u32,
    pub kind: u8,
    pub length: RelocationLength,
    pub pc_relative: bool,
    pub is_extern: bool,
    pub scattered: bool,
}

impl Relocation {
    pub(crate) fn parse<E: Endian>(raw: &RelocationInfo<E>, endian: E) -> Self {
        let r_address = raw.r_address.get(endian);
        let r_info = raw.r_info.get(endian);
        // Scattered relocations are marked by the top bit of the word that
        // would otherwise be `r_address` when read as an unsigned `u32`.
        if (r_address as u32) & 0x8000_0000 != 0 {
            let word = r_address as u32;
            let scattered_type = ((word >> 24) & 0xf) as u8;
            let scattered_length = ((word >> 28) & 0x3) as u8;
            let scattered_pcrel = (word >> 30) & 0x1 != 0;
            Relocation {
                address: word & 0x00ff_ffff,
                symbol_or_value: r_info,
                kind: scattered_type,
                length: RelocationLength::from_code(scattered_length),
                pc_relative: scattered_pcrel,
                is_extern: false,
                scattered: true,
            }
        } else {
            let r_symbolnum = r_info & 0x00ff_ffff;
            let r_pcrel = (r_info >> 24) & 0x1 != 0;
            let r_length = ((r_info >> 25) & 0x3) as u8;
            let r_extern = (r_info >> 27) & 0x1 != 0;
            let r_type = ((r_info >> 28) & 0xf) as u8;
            Relocation {
                address: r_address as u32,
                symbol_or_value: r_symbolnum,
                kind: r_type,
                length: RelocationLength::from_code(r_length),
                pc_relative: r_pcrel,
                is_extern: r_extern,
                scattered: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::{LittleEndian, I32, U32};

    fn raw(address: i32, info: u32) -> RelocationInfo<LittleEndian> {
        RelocationInfo {
            r_address: I32::new(LittleEndian, address),
            r_info: U32::new(LittleEndian, info),
        }
    }

    #[test]
    fn parses_plain_extern_relocation() {
        // symbolnum=5, pcrel=1, length=long(2), extern=1, type=0
        let info = 5 | (1 << 24) | (2 << 25) | (1 << 27) | (0 << 28);
        let r = Relocation::parse(&raw(0x1000, info), LittleEndian);
        assert!(!r.scattered);
        assert!(r.is_extern);
        assert!(r.pc_relative);
        assert_eq!(r.length, RelocationLength::Long);
        assert_eq!(r.symbol_or_value, 5);
        assert_eq!(r.address, 0x1000);
    }

    #[test]
    fn parses_scattered_relocation() {
        let word = 0x8000_0000u32 | (1 << 30) | (1 << 28) | (2 << 24) | 0x1234;
        let r = Relocation::parse(&raw(word as i32, 0xdead_beef), LittleEndian);
        assert!(r.scattered);
        assert_eq!(r.address, 0x1234);
        assert_eq!(r.symbol_or_value, 0xdead_beef);
        assert!(r.pc_relative);
    }
}
