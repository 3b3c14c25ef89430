//! Fat (multi-architecture) container support.
//!
//! A fat binary is just a big-endian header, a table of `(cpu, subcpu,
//! offset, size, align)` entries, and N embedded thin Mach-O files at those
//! offsets — "a trivial wrapper over N embedded files" per the design note
//! on how this differs from the rest of the format. `FatFile` only indexes
//! the arch table; each arch's bytes are handed to
//! [`crate::macho::file::FileTOC`] exactly like any other input.

use crate::error::{Error, ReadError, Result};
use crate::macho::constants::{FAT_CIGAM, FAT_MAGIC};
use crate::macho::raw::{FatArch, FatHeader};
use crate::pod;

/// One embedded architecture slice's table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatArchEntry {
    pub cputype: u32,
    pub cpusubtype: u32,
    pub offset: u32,
    pub size: u32,
    pub align: u32,
}

/// A parsed fat-container arch table, borrowing the whole file's bytes.
#[derive(Debug, Clone)]
pub struct FatFile<'data> {
    data: &'data [u8],
    arches: Vec<FatArchEntry>,
}

impl<'data> FatFile<'data> {
    /// `true` if `data` begins with a fat magic number (either byte order:
    /// `lipo` always writes big-endian, but a byte-swapped magic is
    /// recognized too so a misread endianness doesn't masquerade as "not a
    /// fat file").
    pub fn is_fat(data: &[u8]) -> bool {
        matches!(read_magic(data), Ok(FAT_MAGIC) | Ok(FAT_CIGAM))
    }

    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let magic = read_magic(data)?;
        if magic != FAT_MAGIC {
            return Err(Error::NotMachO);
        }
        let (header, _) =
            pod::from_bytes::<FatHeader>(data).read_error(Error::TruncatedFile)?;
        let nfat_arch = header.nfat_arch.get(crate::endian::BigEndian) as usize;
        let header_size = std::mem::size_of::<FatHeader>();
        let table = data.get(header_size..).ok_or(Error::TruncatedFile)?;
        let (entries, _) = pod::slice_from_bytes::<FatArch>(table, nfat_arch)
            .read_error(Error::MalformedRecord("fat_arch"))?;
        let arches = entries
            .iter()
            .map(|e| FatArchEntry {
                cputype: e.cputype.get(crate::endian::BigEndian),
                cpusubtype: e.cpusubtype.get(crate::endian::BigEndian),
                offset: e.offset.get(crate::endian::BigEndian),
                size: e.size.get(crate::endian::BigEndian),
                align: e.align.get(crate::endian::BigEndian),
            })
            .collect();
        Ok(FatFile { data, arches })
    }

    pub fn arches(&self) -> &[FatArchEntry] {
        &self.arches
    }

    /// The embedded thin Mach-O bytes for one arch-table entry.
    pub fn slice(&self, arch: &FatArchEntry) -> Result<&'data [u8]> {
        self.data
            .get(arch.offset as usize..)
            .and_then(|d| d.get(..arch.size as usize))
            .ok_or(Error::TruncatedFile)
    }

    /// Iterate every embedded arch's raw bytes, in table order.
    pub fn slices(&self) -> impl Iterator<Item = Result<&'data [u8]>> + '_ {
        self.arches.iter().map(move |a| self.slice(a))
    }
}

fn read_magic(data: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(..4)
        .ok_or(Error::TruncatedFile)?
        .try_into()
        .map_err(|_| Error::TruncatedFile)?;
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endian::{BigEndian, U32};
    use crate::pod::bytes_of;

    fn build_fat_with_one_arch(thin: &[u8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(bytes_of(&U32::new(BigEndian, FAT_MAGIC)));
        data.extend_from_slice(bytes_of(&U32::new(BigEndian, 1)));
        let header_and_table = std::mem::size_of::<FatHeader>() + std::mem::size_of::<FatArch>();
        let offset = (header_and_table + 7) & !7; // 8-byte align, as lipo does
        data.extend_from_slice(bytes_of(&U32::new(BigEndian, 0x0100000c))); // CPU_TYPE_ARM64
        data.extend_from_slice(bytes_of(&U32::new(BigEndian, 0)));
        data.extend_from_slice(bytes_of(&U32::new(BigEndian, offset as u32)));
        data.extend_from_slice(bytes_of(&U32::new(BigEndian, thin.len() as u32)));
        data.extend_from_slice(bytes_of(&U32::new(BigEndian, 3)));
        data.resize(offset, 0);
        data.extend_from_slice(thin);
        data
    }

    #[test]
    fn detects_and_parses_fat_magic() {
        let thin = vec![0xde, 0xad, 0xbe, 0xef];
        let data = build_fat_with_one_arch(&thin);
        assert!(FatFile::is_fat(&data));
        let fat = FatFile::parse(&data).unwrap();
        assert_eq!(fat.arches().len(), 1);
        assert_eq!(fat.slice(&fat.arches()[0]).unwrap(), thin.as_slice());
    }

    #[test]
    fn rejects_non_fat_input() {
        assert!(!FatFile::is_fat(&[0u8; 8]));
        assert_eq!(FatFile::parse(&[0u8; 8]), Err(Error::NotMachO));
    }
}
