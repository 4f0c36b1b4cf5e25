// SPDX-License-Identifier: MIT
//! MDOCX wire layout: the fixed file header and the per-section headers
//!
//! These types are pure bit-layout transforms. Semantic checks on the fixed
//! header (magic, version, reserved fields) belong to the reader; the only
//! semantic check here is [`validate_section_header`].

use std::io::{Read, Write};

use crate::compression::Compression;
use crate::error::{MdocxError, Result};

/// MDOCX magic bytes: "MDOCX\r\n" followed by 0x1A.
///
/// The CR LF pair catches line-ending conversion and 0x1A stops DOS `type`.
pub const MDOCX_MAGIC: &[u8; 8] = &[0x4D, 0x44, 0x4F, 0x43, 0x58, 0x0D, 0x0A, 0x1A];

/// MDOCX format version
pub const MDOCX_VERSION: u16 = 1;

/// Fixed header size in bytes
pub const FIXED_HEADER_SIZE: usize = 32;

/// Section header size in bytes
pub const SECTION_HEADER_SIZE: usize = 16;

/// Fixed header flags
pub mod header_flags {
    /// Metadata block is present and holds UTF-8 JSON
    pub const METADATA_JSON: u16 = 0x0001;
}

/// Section flags
pub mod section_flags {
    /// Low 4 bits carry the compression id
    pub const COMPRESSION_MASK: u16 = 0x000F;

    /// Payload starts with an 8-byte little-endian uncompressed length
    pub const HAS_UNCOMPRESSED_LEN: u16 = 0x0010;
}

/// MDOCX fixed header (32 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub magic: [u8; 8],
    pub version: u16,
    pub header_flags: u16,
    /// Declared fixed header size, must be 32
    pub fixed_header_size: u32,
    pub metadata_length: u32,
    pub reserved0: u32,
    pub reserved1: u64,
}

impl FixedHeader {
    /// Header for a v1 file with the given metadata block length
    pub fn new(metadata_length: u32) -> Self {
        let header_flags = if metadata_length > 0 {
            header_flags::METADATA_JSON
        } else {
            0
        };
        Self {
            magic: *MDOCX_MAGIC,
            version: MDOCX_VERSION,
            header_flags,
            fixed_header_size: FIXED_HEADER_SIZE as u32,
            metadata_length,
            reserved0: 0,
            reserved1: 0,
        }
    }

    /// Parse from exactly 32 bytes
    pub fn from_bytes(bytes: &[u8; FIXED_HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        Self {
            magic,
            version: u16::from_le_bytes([bytes[8], bytes[9]]),
            header_flags: u16::from_le_bytes([bytes[10], bytes[11]]),
            fixed_header_size: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            metadata_length: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            reserved0: u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
            reserved1: u64::from_le_bytes([
                bytes[24], bytes[25], bytes[26], bytes[27], bytes[28], bytes[29], bytes[30],
                bytes[31],
            ]),
        }
    }

    pub fn to_bytes(&self) -> [u8; FIXED_HEADER_SIZE] {
        let mut bytes = [0u8; FIXED_HEADER_SIZE];

        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..10].copy_from_slice(&self.version.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.header_flags.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.fixed_header_size.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.metadata_length.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.reserved0.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.reserved1.to_le_bytes());

        bytes
    }

    /// Read header from a reader. A short read is an I/O error.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; FIXED_HEADER_SIZE];
        reader.read_exact(&mut header)?;
        Ok(Self::from_bytes(&header))
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    #[inline]
    pub fn has_metadata_json(&self) -> bool {
        (self.header_flags & header_flags::METADATA_JSON) != 0
    }
}

/// Section types, in the only order they may appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum SectionType {
    Markdown = 1,
    Media = 2,
}

impl SectionType {
    pub fn name(&self) -> &'static str {
        match self {
            SectionType::Markdown => "markdown",
            SectionType::Media => "media",
        }
    }
}

/// Header preceding each section payload (16 bytes, little-endian)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHeader {
    pub section_type: u16,
    pub section_flags: u16,
    /// Stored (post-compression) payload length
    pub payload_len: u64,
    pub reserved: u32,
}

impl SectionHeader {
    pub fn new(section_type: SectionType, section_flags: u16, payload_len: u64) -> Self {
        Self {
            section_type: section_type as u16,
            section_flags,
            payload_len,
            reserved: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8; SECTION_HEADER_SIZE]) -> Self {
        Self {
            section_type: u16::from_le_bytes([bytes[0], bytes[1]]),
            section_flags: u16::from_le_bytes([bytes[2], bytes[3]]),
            payload_len: u64::from_le_bytes([
                bytes[4], bytes[5], bytes[6], bytes[7], bytes[8], bytes[9], bytes[10], bytes[11],
            ]),
            reserved: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; SECTION_HEADER_SIZE] {
        let mut bytes = [0u8; SECTION_HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.section_type.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.section_flags.to_le_bytes());
        bytes[4..12].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.reserved.to_le_bytes());
        bytes
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; SECTION_HEADER_SIZE];
        reader.read_exact(&mut header)?;
        Ok(Self::from_bytes(&header))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Raw compression id from the low 4 flag bits
    #[inline]
    pub fn compression_id(&self) -> u16 {
        self.section_flags & section_flags::COMPRESSION_MASK
    }

    /// Compression algorithm, if the id is a known one
    #[inline]
    pub fn compression(&self) -> Option<Compression> {
        Compression::try_from(self.compression_id()).ok()
    }

    /// Compression name for display; `"unknown"` for unrecognized ids
    pub fn compression_name(&self) -> &'static str {
        self.compression().map_or("unknown", |c| c.name())
    }

    #[inline]
    pub fn has_uncompressed_len(&self) -> bool {
        (self.section_flags & section_flags::HAS_UNCOMPRESSED_LEN) != 0
    }
}

/// Check a section header before any of its payload is touched.
///
/// The expected type comes from the section's position in the file.
pub fn validate_section_header(header: &SectionHeader, expected: SectionType) -> Result<Compression> {
    if header.reserved != 0 {
        return Err(MdocxError::InvalidSection("reserved must be 0".into()));
    }
    if header.section_type != expected as u16 {
        return Err(MdocxError::InvalidSection(format!(
            "expected section type {} got {}",
            expected as u16, header.section_type
        )));
    }
    let compression = header.compression().ok_or_else(|| {
        MdocxError::InvalidSection(format!("unknown compression {}", header.compression_id()))
    })?;
    match (compression, header.has_uncompressed_len()) {
        (Compression::None, true) => Err(MdocxError::InvalidSection(
            "COMP_NONE must not set HAS_UNCOMPRESSED_LEN".into(),
        )),
        (Compression::None, false) => Ok(compression),
        (_, false) => Err(MdocxError::InvalidSection(
            "compressed payload must set HAS_UNCOMPRESSED_LEN".into(),
        )),
        (_, true) => Ok(compression),
    }
}
