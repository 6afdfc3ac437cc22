//! Parses a Metal library (`.metallib`) container: the fixed 88-byte header
//! and the function list that follows it (spec.md §6).
//!
//! This module only extracts byte ranges and metadata tags; it never looks
//! inside the per-function bitcode blob itself — that's `lower`'s job, via
//! the external `llvm-ir` reader.

use crate::error::TranslationError;

const HEADER_LEN: usize = 88;
const MAGIC: &[u8; 4] = b"MTLB";

/// One function's raw entry as read out of the library's function list.
#[derive(Debug, Clone)]
pub struct RawFunctionEntry {
    pub name: String,
    pub kind: RawFunctionKind,
    pub bitcode_size: u64,
    /// Absolute byte offset of this function's AIR bitcode module within the
    /// library file (`header.bc_offset + OFFT`'s bitcode field).
    pub bitcode_offset: u64,
    pub public_metadata_offset: u64,
    pub private_metadata_offset: u64,
}

/// The `TYPE` tag's full value space (spec.md §6). Only the first three are
/// entry points the Runtime can create a `Function` from; the rest name
/// ray-tracing / visible-function table kinds this translator rejects
/// (spec.md §1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawFunctionKind {
    Vertex,
    Fragment,
    Kernel,
    Unqualified,
    Visible,
    Extern,
    Intersection,
}

impl RawFunctionKind {
    fn from_tag(value: u8) -> Option<Self> {
        Some(match value {
            0 => RawFunctionKind::Vertex,
            1 => RawFunctionKind::Fragment,
            2 => RawFunctionKind::Kernel,
            3 => RawFunctionKind::Unqualified,
            4 => RawFunctionKind::Visible,
            5 => RawFunctionKind::Extern,
            6 => RawFunctionKind::Intersection,
            _ => return None,
        })
    }

    pub fn is_entry_point(self) -> bool {
        matches!(
            self,
            RawFunctionKind::Vertex | RawFunctionKind::Fragment | RawFunctionKind::Kernel
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub platform_id: u16,
    pub file_major: u16,
    pub file_minor: u16,
    pub lib_type: u8,
    pub target_os: u8,
    pub os_major: u16,
    pub os_minor: u16,
    pub file_size: u64,
    pub func_list_offset: u64,
    pub func_list_size: u64,
    pub pub_meta_offset: u64,
    pub pub_meta_size: u64,
    pub priv_meta_offset: u64,
    pub priv_meta_size: u64,
    pub bc_offset: u64,
    pub bc_size: u64,
}

/// A thin little-endian cursor over a byte slice. Kept private: everything
/// outside this module deals in `Header`/`RawFunctionEntry`, never raw
/// offsets.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], TranslationError> {
        if len > self.remaining() {
            return Err(TranslationError::Truncated {
                expected: self.pos + len,
                found: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, TranslationError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, TranslationError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, TranslationError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, TranslationError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn seek(&mut self, pos: usize) -> Result<(), TranslationError> {
        if pos > self.data.len() {
            return Err(TranslationError::Truncated {
                expected: pos,
                found: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }
}

pub fn parse_header(bytes: &[u8]) -> Result<Header, TranslationError> {
    if bytes.len() < HEADER_LEN {
        return Err(TranslationError::Truncated {
            expected: HEADER_LEN,
            found: bytes.len(),
        });
    }
    if &bytes[0..4] != MAGIC {
        return Err(TranslationError::BadMagic);
    }

    let mut c = Cursor::new(bytes);
    c.seek(4)?;

    Ok(Header {
        platform_id: c.u16()?,
        file_major: c.u16()?,
        file_minor: c.u16()?,
        lib_type: c.u8()?,
        target_os: c.u8()?,
        os_major: c.u16()?,
        os_minor: c.u16()?,
        file_size: c.u64()?,
        func_list_offset: c.u64()?,
        func_list_size: c.u64()?,
        pub_meta_offset: c.u64()?,
        pub_meta_size: c.u64()?,
        priv_meta_offset: c.u64()?,
        priv_meta_size: c.u64()?,
        bc_offset: c.u64()?,
        bc_size: c.u64()?,
    })
}

/// Walks the function list at `header.func_list_offset`, yielding one
/// [`RawFunctionEntry`] per tag group.
///
/// Per spec.md §6: each entry is a u32 `tagGroupSize` (inclusive of itself)
/// followed by tag/size/value triples, terminated by the bare four-byte tag
/// `ENDT` (which, unlike the other tags, carries no length field).
pub fn parse_function_list(
    bytes: &[u8],
    header: &Header,
) -> Result<Vec<RawFunctionEntry>, TranslationError> {
    let mut c = Cursor::new(bytes);
    c.seek(header.func_list_offset as usize)?;

    let count = c.u32()?;
    let mut out = Vec::with_capacity(count as usize);

    for index in 0..count as usize {
        let tag_group_size = c.u32()? as usize;
        if tag_group_size < 4 {
            return Err(TranslationError::Truncated {
                expected: 4,
                found: tag_group_size,
            });
        }
        // The group size includes the u32 we just read.
        let group_bytes = c.take(tag_group_size - 4)?;
        let mut g = Cursor::new(group_bytes);

        let mut name: Option<String> = None;
        let mut kind: Option<RawFunctionKind> = None;
        let mut bitcode_size: Option<u64> = None;
        let mut pub_meta_off = 0u64;
        let mut priv_meta_off = 0u64;
        let mut bc_off = 0u64;

        loop {
            let tag = g.take(4)?;
            if tag == b"ENDT" {
                break;
            }
            let tag_size = g.u16()? as usize;
            let value = g.take(tag_size)?;
            let mut v = Cursor::new(value);

            match tag {
                b"NAME" => {
                    let nul = value.iter().position(|&b| b == 0).unwrap_or(value.len());
                    name = Some(String::from_utf8_lossy(&value[..nul]).into_owned());
                }
                b"MDSZ" => bitcode_size = Some(v.u64()?),
                b"TYPE" => {
                    let raw = v.u8()?;
                    kind = Some(RawFunctionKind::from_tag(raw).ok_or(
                        TranslationError::BadFunctionType { index, value: raw },
                    )?);
                }
                b"OFFT" => {
                    pub_meta_off = v.u64()?;
                    priv_meta_off = v.u64()?;
                    bc_off = v.u64()?;
                }
                _ => {
                    // Unrecognized tag: skip, as the Runtime does for
                    // forward-compatibility with newer library revisions.
                }
            }
        }

        let name = name.ok_or(TranslationError::MissingTag { index, tag: "NAME" })?;
        let kind = kind.ok_or(TranslationError::MissingTag { index, tag: "TYPE" })?;
        let bitcode_size = bitcode_size.ok_or(TranslationError::MissingTag {
            index,
            tag: "MDSZ",
        })?;

        out.push(RawFunctionEntry {
            name,
            kind,
            bitcode_size,
            bitcode_offset: header.bc_offset + bc_off,
            public_metadata_offset: header.pub_meta_offset + pub_meta_off,
            private_metadata_offset: header.priv_meta_offset + priv_meta_off,
        });
    }

    Ok(out)
}

/// Slices out one function's raw AIR bitcode module.
pub fn bitcode_slice<'a>(
    bytes: &'a [u8],
    entry: &RawFunctionEntry,
) -> Result<&'a [u8], TranslationError> {
    let start = entry.bitcode_offset as usize;
    let end = start + entry.bitcode_size as usize;
    bytes.get(start..end).ok_or(TranslationError::BitcodeOutOfRange {
        name: entry.name.clone(),
        offset: entry.bitcode_offset,
        size: entry.bitcode_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_tag(buf: &mut Vec<u8>, tag: &[u8; 4], value: &[u8]) {
        buf.extend_from_slice(tag);
        buf.extend_from_slice(&(value.len() as u16).to_le_bytes());
        buf.extend_from_slice(value);
    }

    fn build_minimal_library(func_name: &str, kind: u8, bitcode: &[u8]) -> Vec<u8> {
        let mut group = Vec::new();
        push_tag(&mut group, b"NAME", func_name.as_bytes());
        push_tag(&mut group, b"MDSZ", &(bitcode.len() as u64).to_le_bytes());
        push_tag(&mut group, b"TYPE", &[kind]);
        let mut offt = Vec::new();
        offt.extend_from_slice(&0u64.to_le_bytes());
        offt.extend_from_slice(&0u64.to_le_bytes());
        offt.extend_from_slice(&0u64.to_le_bytes());
        push_tag(&mut group, b"OFFT", &offt);
        group.extend_from_slice(b"ENDT");

        let mut func_list = Vec::new();
        func_list.extend_from_slice(&1u32.to_le_bytes()); // count
        func_list.extend_from_slice(&((group.len() + 4) as u32).to_le_bytes());
        func_list.extend_from_slice(&group);

        let func_list_offset = HEADER_LEN as u64;
        let bc_offset = func_list_offset + func_list.len() as u64;

        let mut header = Vec::new();
        header.extend_from_slice(MAGIC);
        header.extend_from_slice(&1u16.to_le_bytes()); // platformID
        header.extend_from_slice(&1u16.to_le_bytes()); // fileMajor
        header.extend_from_slice(&0u16.to_le_bytes()); // fileMinor
        header.push(0); // libType
        header.push(0); // targetOS
        header.extend_from_slice(&0u16.to_le_bytes()); // osMajor
        header.extend_from_slice(&0u16.to_le_bytes()); // osMinor
        let file_size = bc_offset + bitcode.len() as u64;
        header.extend_from_slice(&file_size.to_le_bytes());
        header.extend_from_slice(&func_list_offset.to_le_bytes());
        header.extend_from_slice(&(func_list.len() as u64).to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes()); // pubMetaOffset
        header.extend_from_slice(&0u64.to_le_bytes()); // pubMetaSize
        header.extend_from_slice(&0u64.to_le_bytes()); // privMetaOffset
        header.extend_from_slice(&0u64.to_le_bytes()); // privMetaSize
        header.extend_from_slice(&bc_offset.to_le_bytes());
        header.extend_from_slice(&(bitcode.len() as u64).to_le_bytes());
        assert_eq!(header.len(), HEADER_LEN);

        let mut out = header;
        out.extend_from_slice(&func_list);
        out.extend_from_slice(bitcode);
        out
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 88];
        assert!(matches!(
            parse_header(&bytes),
            Err(TranslationError::BadMagic)
        ));
    }

    #[test]
    fn rejects_truncated_header() {
        let bytes = vec![b'M', b'T', b'L', b'B'];
        assert!(matches!(
            parse_header(&bytes),
            Err(TranslationError::Truncated { .. })
        ));
    }

    #[test]
    fn round_trips_a_minimal_function_list() {
        let bitcode = [0xDEu8, 0xAD, 0xBE, 0xEF];
        let bytes = build_minimal_library("vertex_main", 0, &bitcode);

        let header = parse_header(&bytes).unwrap();
        let entries = parse_function_list(&bytes, &header).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "vertex_main");
        assert_eq!(entries[0].kind, RawFunctionKind::Vertex);
        assert_eq!(entries[0].bitcode_size, bitcode.len() as u64);

        let slice = bitcode_slice(&bytes, &entries[0]).unwrap();
        assert_eq!(slice, &bitcode);
    }
}
