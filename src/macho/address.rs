//! VM address to file-offset translation.

use crate::error::Error;

/// One segment's contribution to the VM↔file map.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MapEntry {
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
}

/// Translates between VM addresses and file offsets using a `FileTOC`'s
/// segment list.
///
/// Built once per [`crate::macho::file::File`] and shared by every section
/// and reflection-scanner query, so lookups do not re-walk the segment list
/// on every call.
#[derive(Debug, Clone, Default)]
pub struct AddressTranslator {
    entries: Vec<MapEntry>,
}

impl AddressTranslator {
    pub(crate) fn new(entries: Vec<MapEntry>) -> Self {
        AddressTranslator { entries }
    }

    fn entry_for_vm(&self, addr: u64) -> Option<&MapEntry> {
        self.entries
            .iter()
            .find(|e| e.vmsize != 0 && addr >= e.vmaddr && addr < e.vmaddr + e.vmsize)
    }

    fn entry_for_offset(&self, off: u64) -> Option<&MapEntry> {
        self.entries
            .iter()
            .find(|e| e.filesize != 0 && off >= e.fileoff && off < e.fileoff + e.filesize)
    }

    /// Translate a VM address to a file offset.
    pub fn vm_to_offset(&self, addr: u64) -> Result<u64, Error> {
        let entry = self
            .entry_for_vm(addr)
            .ok_or(Error::AddressOutOfMap(addr))?;
        Ok(addr - entry.vmaddr + entry.fileoff)
    }

    /// Translate a file offset to a VM address.
    pub fn offset_to_vm(&self, off: u64) -> Result<u64, Error> {
        let entry = self
            .entry_for_offset(off)
            .ok_or(Error::AddressOutOfMap(off))?;
        Ok(off - entry.fileoff + entry.vmaddr)
    }

    /// Rebase a VM address: translate to a file offset and back to a VM
    /// address, which is the identity unless the address falls in a
    /// segment whose VM and file layouts have diverged (e.g. due to
    /// `__LINKEDIT` padding); exposed as a distinct operation from a plain
    /// round-trip since resolvers care about that divergence specifically.
    pub fn rebase(&self, addr: u64) -> Result<u64, Error> {
        let off = self.vm_to_offset(addr)?;
        self.offset_to_vm(off)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator() -> AddressTranslator {
        AddressTranslator::new(vec![
            MapEntry {
                vmaddr: 0x1000,
                vmsize: 0x1000,
                fileoff: 0,
                filesize: 0x1000,
            },
            MapEntry {
                vmaddr: 0x2000,
                vmsize: 0x1000,
                fileoff: 0x1000,
                filesize: 0x1000,
            },
        ])
    }

    #[test]
    fn translates_within_segment() {
        let t = translator();
        assert_eq!(t.vm_to_offset(0x2010).unwrap(), 0x1010);
        assert_eq!(t.offset_to_vm(0x1010).unwrap(), 0x2010);
    }

    #[test]
    fn out_of_map_errors() {
        let t = translator();
        assert_eq!(t.vm_to_offset(0x5000), Err(Error::AddressOutOfMap(0x5000)));
    }

    #[test]
    fn rebase_round_trips() {
        let t = translator();
        assert_eq!(t.rebase(0x2010).unwrap(), 0x2010);
    }
}
