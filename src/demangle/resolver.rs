//! The pluggable symbolic-reference resolver.
//!
//! A symbolic reference is a control byte plus an offset embedded in a
//! mangled name, pointing back into a binary's reflection metadata. This
//! crate's parser never reaches into a `File` on its own — it only ever
//! calls [`SymbolicReferenceResolver::resolve`], so the core grammar stays
//! decoupled from the reflection scanners, and callers without a `File`
//! handy (or without a resolver at all) still get a demangling, just with
//! placeholder text where a resolved name would otherwise appear.

use crate::error::Result;
use crate::macho::file::File;
use crate::macho::reflect;
use crate::pod::ReadRef;

/// What a symbolic reference's control byte says it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    DirectTypeDescriptor,
    IndirectTypeDescriptor,
    DirectProtocolConformanceDescriptor,
    IndirectProtocolConformanceDescriptor,
    AssociatedConformanceDescriptor,
    AccessorFunctionReference,
    UniqueExtendedExistentialTypeShape,
    NonUniqueExtendedExistentialTypeShape,
    ObjectiveCProtocol,
}

/// Classify a symbolic reference control byte.
pub fn classify(control: u8) -> Option<ReferenceKind> {
    Some(match control {
        0x01 => ReferenceKind::DirectTypeDescriptor,
        0x02 => ReferenceKind::IndirectTypeDescriptor,
        0x03 => ReferenceKind::DirectProtocolConformanceDescriptor,
        0x04 => ReferenceKind::IndirectProtocolConformanceDescriptor,
        0x05 => ReferenceKind::AssociatedConformanceDescriptor,
        0x06..=0x09 => ReferenceKind::AccessorFunctionReference,
        0x0A => ReferenceKind::UniqueExtendedExistentialTypeShape,
        0x0B => ReferenceKind::NonUniqueExtendedExistentialTypeShape,
        0x0C => ReferenceKind::ObjectiveCProtocol,
        0x1C..=0x1F => ReferenceKind::DirectTypeDescriptor,
        _ => return None,
    })
}

/// `true` for control bytes using the 4-byte little-endian relative-offset
/// encoding; `false` for the 8-byte absolute-pointer encoding.
pub fn is_relative(control: u8) -> bool {
    matches!(control, 0x01..=0x0C)
}

/// Resolves a symbolic reference to a human-readable label.
///
/// The parser never sees a `File` or reflection metadata directly — it
/// only calls this trait, so the core grammar (`demangle::parser`) has no
/// dependency on the reflection scanners. `ref_index` is the zero-based count of
/// symbolic references seen so far in the current demangling, for
/// resolvers that want to label output deterministically without hashing
/// offsets.
pub trait SymbolicReferenceResolver {
    fn resolve(&self, kind: ReferenceKind, control: u8, payload: i64, ref_index: usize) -> Result<String>;
}

/// The default resolver: every reference becomes a placeholder, so a
/// demangling with no resolver attached still fully parses.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderResolver;

impl SymbolicReferenceResolver for PlaceholderResolver {
    fn resolve(&self, _kind: ReferenceKind, _control: u8, payload: i64, _ref_index: usize) -> Result<String> {
        Ok(format!("<symbolic@{:#x}>", payload))
    }
}

/// Resolves symbolic references against a live `File`'s reflection
/// metadata: `payload` is treated as a file offset relative to
/// `base_offset` (typically the file offset of the mangled-name bytes
/// being demangled), translated to a VM address, then matched against the
/// nearest `__swift5_types`/`__swift5_protos` descriptor.
///
/// This is the explicit coupling point between the Mach-O reader and the
/// demangler named in the system overview: everywhere else, the two
/// subsystems are independent.
pub struct MachOResolver<'file, 'data, R> {
    file: &'file File<'data, R>,
    base_offset: u64,
}

impl<'file, 'data, R: ReadRef<'data>> MachOResolver<'file, 'data, R> {
    pub fn new(file: &'file File<'data, R>, base_offset: u64) -> Self {
        MachOResolver { file, base_offset }
    }
}

impl<'file, 'data, R: ReadRef<'data>> SymbolicReferenceResolver for MachOResolver<'file, 'data, R> {
    fn resolve(&self, kind: ReferenceKind, _control: u8, payload: i64, ref_index: usize) -> Result<String> {
        let target_offset = (self.base_offset as i64 + payload) as u64;

        // Look for a type descriptor whose address matches the target
        // file offset, across every __swift5_types section in the file.
        for section in &self.file.toc().sections {
            if reflect::reflection_section_kind(section.name())
                != Some(reflect::ReflectionSectionKind::Types)
            {
                continue;
            }
            let bytes = self.file.raw_data();
            let descriptors = match self.file.toc().endian {
                crate::endian::Endianness::Little => reflect::scan_types(
                    bytes,
                    section.offset as u64,
                    section.size,
                    crate::endian::LittleEndian,
                ),
                crate::endian::Endianness::Big => reflect::scan_types(
                    bytes,
                    section.offset as u64,
                    section.size,
                    crate::endian::BigEndian,
                ),
            };
            if let Some(d) = descriptors.iter().find(|d| d.address == target_offset) {
                return Ok(d.name.clone());
            }
        }
        log::debug!("symbolic reference #{ref_index} ({kind:?}) at {target_offset:#x} unresolved");
        Ok(format!("<symbolic@{:#x}>", target_offset))
    }
}
