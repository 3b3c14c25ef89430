//! Code-signature super-blob reader.
//!
//! The whole payload pointed to by `LC_CODE_SIGNATURE` is always
//! big-endian, regardless of the containing file's own byte order. This
//! reads the blob index, the `CodeDirectory`, the `Requirements` blob (via
//! a small interpreter for the Requirement Language), the `Entitlements`
//! property list and the `CMS_SIGNATURE` blob. Cryptographic validation is
//! out of scope; this only parses structure.

use crate::endian::BigEndian;
use crate::error::{Error, ReadError, Result};
use crate::macho::constants::*;
use crate::macho::raw;
use crate::pod::{self, Bytes};

/// One parsed `CodeDirectory` blob.
#[derive(Debug, Clone, Default)]
pub struct CodeDirectory {
    pub version: u32,
    pub flags: u32,
    pub hash_size: u8,
    pub hash_type: u8,
    pub page_size_log2: u8,
    pub n_special_slots: u32,
    pub n_code_slots: u32,
    pub code_limit: u32,
    pub identifier: String,
    pub team_id: Option<String>,
}

/// A parsed `Requirements` blob: one human-readable string per requirement,
/// produced by a small recursive-descent interpreter over the
/// CoreFoundation Requirement Language opcodes.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    pub requirements: Vec<String>,
}

/// One entry of a parsed code-signature super-blob.
#[derive(Debug, Clone)]
pub enum Blob {
    CodeDirectory(CodeDirectory),
    AlternateCodeDirectory(CodeDirectory),
    Requirements(Requirements),
    /// Verbatim UTF-8 property-list text.
    Entitlements(String),
    /// Verbatim DER-encoded PKCS#7 bytes.
    CmsSignature(Vec<u8>),
    /// A slot type this crate does not specifically decode.
    Unknown { slot_type: u32, bytes: Vec<u8> },
}

/// A fully parsed code-signature super-blob.
#[derive(Debug, Clone, Default)]
pub struct CodeSignature {
    pub blobs: Vec<Blob>,
}

impl CodeSignature {
    pub fn code_directory(&self) -> Option<&CodeDirectory> {
        self.blobs.iter().find_map(|b| match b {
            Blob::CodeDirectory(cd) => Some(cd),
            _ => None,
        })
    }

    pub fn entitlements(&self) -> Option<&str> {
        self.blobs.iter().find_map(|b| match b {
            Blob::Entitlements(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Parse the super-blob at the start of `data` (always big-endian).
    /// One bad entry is logged and skipped rather than aborting the whole
    /// scan.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let (header, _) = pod::from_bytes::<raw::SuperBlob>(data)
            .read_error(Error::MalformedRecord("SuperBlob"))?;
        if header.magic.get(BigEndian) != CSMAGIC_EMBEDDED_SIGNATURE {
            return Err(Error::MalformedRecord("unexpected code-signature magic"));
        }
        let count = header.count.get(BigEndian) as usize;
        let index_region = data
            .get(std::mem::size_of::<raw::SuperBlob>()..)
            .ok_or(Error::TruncatedFile)?;
        let (indices, _) = pod::slice_from_bytes::<raw::BlobIndex>(index_region, count)
            .read_error(Error::MalformedRecord("BlobIndex"))?;

        let mut blobs = Vec::with_capacity(count);
        for idx in indices {
            let slot_type = idx.ty.get(BigEndian);
            let offset = idx.offset.get(BigEndian) as usize;
            let blob_data = match data.get(offset..) {
                Some(d) => d,
                None => {
                    log::warn!("code signature: blob index offset {offset} out of range");
                    continue;
                }
            };
            match Self::parse_blob(slot_type, blob_data) {
                Ok(blob) => blobs.push(blob),
                Err(e) => {
                    log::warn!("code signature: skipping slot {slot_type:#x}: {e}");
                }
            }
        }
        Ok(CodeSignature { blobs })
    }

    fn parse_blob(slot_type: u32, data: &[u8]) -> Result<Blob> {
        let (generic, _) = pod::from_bytes::<raw::GenericBlob>(data)
            .read_error(Error::MalformedRecord("GenericBlob"))?;
        let magic = generic.magic.get(BigEndian);
        let length = generic.length.get(BigEndian) as usize;
        let blob = data.get(..length).ok_or(Error::TruncatedFile)?;

        match magic {
            CSMAGIC_CODEDIRECTORY => {
                let cd = parse_code_directory(blob)?;
                if slot_type == CSSLOT_ALTERNATE_CODEDIRECTORIES
                    || (CSSLOT_ALTERNATE_CODEDIRECTORIES..CSSLOT_ALTERNATE_CODEDIRECTORIES + 0x100)
                        .contains(&slot_type)
                {
                    Ok(Blob::AlternateCodeDirectory(cd))
                } else {
                    Ok(Blob::CodeDirectory(cd))
                }
            }
            CSMAGIC_REQUIREMENTS => Ok(Blob::Requirements(parse_requirements(blob)?)),
            CSMAGIC_EMBEDDED_ENTITLEMENTS => {
                let text = blob
                    .get(8..)
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                Ok(Blob::Entitlements(text))
            }
            CSMAGIC_BLOBWRAPPER => Ok(Blob::CmsSignature(blob.get(8..).unwrap_or(&[]).to_vec())),
            _ => Ok(Blob::Unknown {
                slot_type,
                bytes: blob.to_vec(),
            }),
        }
    }
}

fn parse_code_directory(data: &[u8]) -> Result<CodeDirectory> {
    let (header, _) = pod::from_bytes::<raw::CodeDirectoryHeader>(data)
        .read_error(Error::MalformedRecord("CodeDirectory"))?;
    let version = header.version.get(BigEndian);
    let ident_offset = header.ident_offset.get(BigEndian) as usize;
    let identifier = Bytes(data)
        .string_at(ident_offset)
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();

    let mut team_id = None;
    if version >= CS_SUPPORTSTEAMID {
        // The team-id offset field follows the scatter-offset field when
        // the version is new enough to carry one.
        if let Ok((team, _)) = pod::from_bytes::<raw::CodeDirectoryTeamId>(
            data.get(std::mem::size_of::<raw::CodeDirectoryHeader>()..)
                .unwrap_or(&[]),
        ) {
            let offset = team.team_offset.get(BigEndian) as usize;
            if offset != 0 {
                team_id = Bytes(data)
                    .string_at(offset)
                    .ok()
                    .map(|b| String::from_utf8_lossy(b).into_owned());
            }
        }
    }

    Ok(CodeDirectory {
        version,
        flags: header.flags.get(BigEndian),
        hash_size: header.hash_size,
        hash_type: header.hash_type,
        page_size_log2: header.page_size,
        n_special_slots: header.n_special_slots.get(BigEndian),
        n_code_slots: header.n_code_slots.get(BigEndian),
        code_limit: header.code_limit.get(BigEndian),
        identifier,
        team_id,
    })
}

// --- Requirement Language interpreter -----------------------------------
//
// A minimal recursive-descent walker over the opcode stream used by
// `csreq(1)`-style compiled requirements. Each opcode has a fixed operand
// shape (sub-expressions, then a length-prefixed data blob, or both); the
// interpreter renders a human-readable constraint string rather than
// evaluating anything cryptographically.

const OP_FALSE: u32 = 0;
const OP_TRUE: u32 = 1;
const OP_IDENT: u32 = 2;
const OP_AND: u32 = 6;
const OP_OR: u32 = 7;
const OP_CODE_DIRECTORY_HASH: u32 = 8;
const OP_NOT: u32 = 9;
const OP_INFO_KEY_FIELD: u32 = 10;
const OP_CERT_FIELD: u32 = 11;
const OP_CERT_GENERIC: u32 = 14;
const OP_ANCHOR_HASH: u32 = 15;
const OP_ENTITLEMENT_FIELD: u32 = 16;

struct OpcodeCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> OpcodeCursor<'a> {
    fn u32(&mut self) -> Result<u32> {
        let bytes = self
            .data
            .get(self.pos..self.pos + 4)
            .ok_or(Error::MalformedRecord("requirement: truncated opcode"))?;
        self.pos += 4;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    /// A length-prefixed byte string, padded to a 4-byte boundary on disk.
    fn data_blob(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        let bytes = self
            .data
            .get(self.pos..self.pos + len)
            .ok_or(Error::MalformedRecord("requirement: truncated data"))?;
        self.pos += (len + 3) & !3;
        Ok(bytes)
    }

    fn string(&mut self) -> Result<String> {
        Ok(String::from_utf8_lossy(self.data_blob()?).into_owned())
    }

    fn expr(&mut self) -> Result<String> {
        let op = self.u32()?;
        match op {
            OP_FALSE => Ok("never".to_string()),
            OP_TRUE => Ok("always".to_string()),
            OP_IDENT => Ok(format!("identifier \"{}\"", self.string()?)),
            OP_AND => {
                let lhs = self.expr()?;
                let rhs = self.expr()?;
                Ok(format!("({lhs} and {rhs})"))
            }
            OP_OR => {
                let lhs = self.expr()?;
                let rhs = self.expr()?;
                Ok(format!("({lhs} or {rhs})"))
            }
            OP_NOT => Ok(format!("! {}", self.expr()?)),
            OP_CODE_DIRECTORY_HASH => Ok(format!("cdhash {}", hex(self.data_blob()?))),
            OP_INFO_KEY_FIELD => {
                let key = self.string()?;
                let value = self.string()?;
                Ok(format!("info[{key}] = \"{value}\""))
            }
            OP_CERT_FIELD => {
                let slot = self.u32()?;
                let key = self.string()?;
                let _match_type = self.u32()?;
                Ok(format!("certificate[{slot}][{key}] exists"))
            }
            OP_CERT_GENERIC => {
                let slot = self.u32()?;
                let oid = self.data_blob()?;
                Ok(format!("certificate[{slot}].{}", hex(oid)))
            }
            OP_ANCHOR_HASH => {
                let slot = self.u32()?;
                Ok(format!("anchor[{slot}] = {}", hex(self.data_blob()?)))
            }
            OP_ENTITLEMENT_FIELD => {
                let key = self.string()?;
                let value = self.string()?;
                Ok(format!("entitlement[{key}] = \"{value}\""))
            }
            _ => Err(Error::MalformedRecord("requirement: unrecognized opcode")),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_requirements(data: &[u8]) -> Result<Requirements> {
    let (header, _) = pod::from_bytes::<raw::SuperBlob>(data)
        .read_error(Error::MalformedRecord("RequirementsBlob"))?;
    let count = header.count.get(BigEndian) as usize;
    let index_region = data
        .get(std::mem::size_of::<raw::SuperBlob>()..)
        .ok_or(Error::TruncatedFile)?;
    let (indices, _) = pod::slice_from_bytes::<raw::BlobIndex>(index_region, count)
        .read_error(Error::MalformedRecord("BlobIndex"))?;

    let mut requirements = Vec::with_capacity(count);
    for idx in indices {
        let offset = idx.offset.get(BigEndian) as usize;
        let blob = match data.get(offset..) {
            Some(b) => b,
            None => continue,
        };
        // Each requirement is itself a generic blob: magic+length, then a
        // 4-byte opcode-format "kind" (always 1, "expression form"), then
        // the expression tree.
        let body = match blob.get(12..) {
            Some(b) => b,
            None => continue,
        };
        let mut cursor = OpcodeCursor { data: body, pos: 0 };
        match cursor.expr() {
            Ok(text) => requirements.push(text),
            Err(e) => log::warn!("code signature: malformed requirement: {e}"),
        }
    }
    Ok(Requirements { requirements })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be32(v: u32) -> [u8; 4] {
        v.to_be_bytes()
    }

    #[test]
    fn parses_code_directory_identifier() {
        let ident = b"com.example.app\0";
        let mut cd = Vec::new();
        cd.extend_from_slice(&be32(CSMAGIC_CODEDIRECTORY));
        let ident_offset = std::mem::size_of::<raw::CodeDirectoryHeader>() as u32;
        let length = ident_offset + ident.len() as u32;
        cd.extend_from_slice(&be32(length));
        cd.extend_from_slice(&be32(0x20001)); // version, below SUPPORTS_SCATTER
        cd.extend_from_slice(&be32(0)); // flags
        cd.extend_from_slice(&be32(0)); // hash_offset
        cd.extend_from_slice(&be32(ident_offset)); // ident_offset
        cd.extend_from_slice(&be32(0)); // n_special_slots
        cd.extend_from_slice(&be32(1)); // n_code_slots
        cd.extend_from_slice(&be32(0x1000)); // code_limit
        cd.push(32); // hash_size
        cd.push(2); // hash_type
        cd.push(0); // platform
        cd.push(12); // page_size
        cd.extend_from_slice(&be32(0)); // spare2
        cd.extend_from_slice(ident);

        let mut super_blob = Vec::new();
        super_blob.extend_from_slice(&be32(CSMAGIC_EMBEDDED_SIGNATURE));
        let index_off = std::mem::size_of::<raw::SuperBlob>();
        let blob_off = index_off + std::mem::size_of::<raw::BlobIndex>();
        super_blob.extend_from_slice(&be32((blob_off + cd.len()) as u32));
        super_blob.extend_from_slice(&be32(1));
        super_blob.extend_from_slice(&be32(CSSLOT_CODEDIRECTORY));
        super_blob.extend_from_slice(&be32(blob_off as u32));
        super_blob.extend_from_slice(&cd);

        let sig = CodeSignature::parse(&super_blob).unwrap();
        let cd = sig.code_directory().unwrap();
        assert_eq!(cd.identifier, "com.example.app");
        assert_eq!(cd.n_code_slots, 1);
    }

    #[test]
    fn requirement_interpreter_renders_and_expression() {
        let mut body = Vec::new();
        body.extend_from_slice(&be32(OP_AND));
        body.extend_from_slice(&be32(OP_TRUE));
        body.extend_from_slice(&be32(OP_IDENT));
        let ident = b"com.example.app";
        body.extend_from_slice(&be32(ident.len() as u32));
        body.extend_from_slice(ident);
        // pad to 4
        while body.len() % 4 != 0 {
            body.push(0);
        }
        let mut cursor = OpcodeCursor {
            data: &body,
            pos: 0,
        };
        let text = cursor.expr().unwrap();
        assert_eq!(text, "(always and identifier \"com.example.app\")");
    }
}
