//! Segment view over a parsed [`crate::macho::load_command::SegmentData`].
//!
//! A `Segment` pairs the decoded header fields with a [`SlicedReader`]
//! bounded to `[fileoff, fileoff+filesize)`, so callers can read segment
//! contents without re-deriving the byte range on every call.

use crate::error::{Error, ReadError, Result};
use crate::macho::load_command::SegmentData;
use crate::pod::ReadRef;

/// A cheaply-clonable reader restricted to `[base, base+len)` of some
/// parent [`ReadRef`]. The read cursor is always an explicit offset
/// parameter, never hidden state, so a `SlicedReader` can be freely shared
/// across threads issuing independent reads.
#[derive(Debug, Clone, Copy)]
pub struct SlicedReader<R> {
    parent: R,
    base: u64,
    len: u64,
}

impl<'data, R: ReadRef<'data>> SlicedReader<R> {
    pub fn new(parent: R, base: u64, len: u64) -> Self {
        SlicedReader { parent, base, len }
    }

    /// The length of this slice, in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read `size` bytes at `offset`, relative to the start of this slice.
    /// Rejects reads that would extend past `[base, base+len)`.
    pub fn read_at(&self, offset: u64, size: u64) -> Result<&'data [u8]> {
        let end = offset.checked_add(size).ok_or(Error::TruncatedFile)?;
        if end > self.len {
            return Err(Error::TruncatedFile);
        }
        let abs = self.base.checked_add(offset).ok_or(Error::TruncatedFile)?;
        self.parent
            .read_bytes_at(abs, size)
            .read_error(Error::TruncatedFile)
    }

    /// Read the entire slice.
    pub fn data(&self) -> Result<&'data [u8]> {
        self.read_at(0, self.len)
    }
}

/// One segment, with header fields plus a reader over its file bytes.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'data, R> {
    data: SegmentData2,
    reader: SlicedReader<R>,
    _marker: std::marker::PhantomData<&'data ()>,
}

/// Owned, `Copy`-friendly subset of [`SegmentData`]'s fields (the full
/// struct owns a `Vec<Section>`, which is not `Copy`; callers reach
/// sections through [`crate::macho::file::File`] instead).
#[derive(Debug, Clone, Copy)]
struct SegmentData2 {
    segname: [u8; 16],
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
    filesize: u64,
    maxprot: u32,
    initprot: u32,
    flags: u32,
    nsect: usize,
    firstsect: usize,
}

impl<'data, R: ReadRef<'data>> Segment<'data, R> {
    pub(crate) fn new(data: &SegmentData, reader: R) -> Self {
        Segment {
            data: SegmentData2 {
                segname: data.segname,
                vmaddr: data.vmaddr,
                vmsize: data.vmsize,
                fileoff: data.fileoff,
                filesize: data.filesize,
                maxprot: data.maxprot,
                initprot: data.initprot,
                flags: data.flags,
                nsect: data.sections.len(),
                firstsect: data.firstsect,
            },
            reader: SlicedReader::new(reader, data.fileoff, data.filesize),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        let end = self.data.segname.iter().position(|&b| b == 0).unwrap_or(16);
        std::str::from_utf8(&self.data.segname[..end]).unwrap_or("")
    }

    pub fn vmaddr(&self) -> u64 {
        self.data.vmaddr
    }

    pub fn vmsize(&self) -> u64 {
        self.data.vmsize
    }

    pub fn fileoff(&self) -> u64 {
        self.data.fileoff
    }

    pub fn filesize(&self) -> u64 {
        self.data.filesize
    }

    pub fn maxprot(&self) -> u32 {
        self.data.maxprot
    }

    pub fn initprot(&self) -> u32 {
        self.data.initprot
    }

    pub fn flags(&self) -> u32 {
        self.data.flags
    }

    pub fn nsect(&self) -> usize {
        self.data.nsect
    }

    /// Absolute index of this segment's first section in the file's flat
    /// section list.
    pub fn firstsect(&self) -> usize {
        self.data.firstsect
    }

    /// Read this segment's entire file contents.
    pub fn data(&self) -> Result<&'data [u8]> {
        self.reader.data()
    }

    pub fn reader(&self) -> SlicedReader<R> {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> SegmentData {
        let mut segname = [0u8; 16];
        segname[..6].copy_from_slice(b"__TEXT");
        SegmentData {
            is_64: true,
            segname,
            vmaddr: 0x1000,
            vmsize: 0x2000,
            fileoff: 0,
            filesize: 0x2000,
            maxprot: 7,
            initprot: 5,
            flags: 0,
            firstsect: 0,
            sections: Vec::new(),
        }
    }

    #[test]
    fn reads_within_bounds() {
        let data: &[u8] = &[0u8; 0x2000];
        let seg = Segment::new(&fixture(), data);
        assert_eq!(seg.name(), "__TEXT");
        assert!(seg.data().unwrap().len() == 0x2000);
    }

    #[test]
    fn rejects_out_of_bounds_read() {
        let data: &[u8] = &[0u8; 0x2000];
        let seg = Segment::new(&fixture(), data);
        assert!(seg.reader().read_at(0x1ff0, 0x20).is_err());
    }
}
