// SPDX-License-Identifier: MIT
//! MDOCX decoder
//!
//! Every length read from the stream is checked against its ceiling before
//! the matching buffer is filled. Buffers grow with the bytes actually
//! read, so a truncated file cannot force an allocation of its declared size.

use std::io::{self, Read};

use crate::compression::decompress_payload;
use crate::container::{Document, MarkdownBundle, MediaBundle};
use crate::error::{MdocxError, Result};
use crate::format::{validate_section_header, FixedHeader, SectionHeader, SectionType};
use crate::format::{FIXED_HEADER_SIZE, MDOCX_MAGIC, MDOCX_VERSION};
use crate::limits::Limits;
use crate::payload::{decode_markdown_bundle, decode_media_bundle};
use crate::validation::validate_document;

/// Options for [`decode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Zero fields resolve to defaults
    pub limits: Limits,
    /// Verify non-zero media digests after decoding
    pub verify_hashes: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            verify_hashes: true,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_verify_hashes(mut self, verify: bool) -> Self {
        self.verify_hashes = verify;
        self
    }
}

/// Read and validate a complete MDOCX document from `reader`.
///
/// Returns the first failure found; no partial document is ever returned.
pub fn decode<R: Read>(reader: &mut R, options: &DecodeOptions) -> Result<Document> {
    let limits = options.limits.with_defaults();

    let header = read_fixed_header(reader, &limits)?;
    let metadata = read_metadata(reader, &header)?;

    let markdown = read_markdown_section(reader, &limits)?;
    let media = read_media_section(reader, &limits)?;

    let doc = Document {
        metadata,
        markdown,
        media,
    };
    validate_document(&doc, &limits, options.verify_hashes)?;
    Ok(doc)
}

/// Decode from an in-memory buffer
pub fn decode_from_slice(data: &[u8], options: &DecodeOptions) -> Result<Document> {
    let mut cursor = data;
    decode(&mut cursor, options)
}

/// Read the fixed header and apply the file-level checks in order:
/// magic, header size, version, reserved fields, metadata ceiling.
pub fn read_fixed_header<R: Read>(reader: &mut R, limits: &Limits) -> Result<FixedHeader> {
    let header = FixedHeader::read_from(reader)?;
    tracing::trace!(
        version = header.version,
        header_flags = header.header_flags,
        metadata_length = header.metadata_length,
        "read fixed header"
    );

    if &header.magic != MDOCX_MAGIC {
        return Err(MdocxError::InvalidMagic);
    }
    if header.fixed_header_size != FIXED_HEADER_SIZE as u32 {
        return Err(MdocxError::InvalidHeader(format!(
            "fixed header size {}",
            header.fixed_header_size
        )));
    }
    if header.version != MDOCX_VERSION {
        return Err(MdocxError::UnsupportedVersion(header.version));
    }
    if header.reserved0 != 0 || header.reserved1 != 0 {
        return Err(MdocxError::InvalidHeader("reserved must be zero".into()));
    }
    if header.metadata_length > limits.max_metadata_len {
        return Err(MdocxError::LimitExceeded(format!(
            "metadata length {} exceeds limit {}",
            header.metadata_length, limits.max_metadata_len
        )));
    }
    Ok(header)
}

fn read_metadata<R: Read>(
    reader: &mut R,
    header: &FixedHeader,
) -> Result<Option<serde_json::Map<String, serde_json::Value>>> {
    if header.metadata_length == 0 {
        return Ok(None);
    }

    let bytes = read_exact_len(reader, u64::from(header.metadata_length))?;
    if !header.has_metadata_json() {
        return Err(MdocxError::InvalidHeader(
            "metadata present but METADATA_JSON flag not set".into(),
        ));
    }

    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(serde_json::Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(MdocxError::InvalidHeader(
            "metadata must be a JSON object".into(),
        )),
        Err(e) => Err(MdocxError::InvalidHeader(format!("metadata JSON: {e}"))),
    }
}

fn read_markdown_section<R: Read>(reader: &mut R, limits: &Limits) -> Result<MarkdownBundle> {
    let plain = read_section(
        reader,
        SectionType::Markdown,
        limits.max_markdown_section_len,
        limits.max_markdown_uncompressed,
    )?
    .unwrap_or_default();
    decode_markdown_bundle(&plain)
}

fn read_media_section<R: Read>(reader: &mut R, limits: &Limits) -> Result<MediaBundle> {
    match read_section(
        reader,
        SectionType::Media,
        limits.max_media_section_len,
        limits.max_media_uncompressed,
    )? {
        Some(plain) => decode_media_bundle(&plain),
        None => Ok(MediaBundle::default()),
    }
}

/// Read one section and return its plaintext, or `None` when the stored
/// payload is empty (no codec is invoked in that case).
fn read_section<R: Read>(
    reader: &mut R,
    section_type: SectionType,
    max_stored: u64,
    max_uncompressed: u64,
) -> Result<Option<Vec<u8>>> {
    let header = SectionHeader::read_from(reader)?;
    tracing::trace!(
        section = section_type.name(),
        section_type = header.section_type,
        compression = header.compression_name(),
        payload_len = header.payload_len,
        "read section header"
    );
    let compression = validate_section_header(&header, section_type)?;

    if header.payload_len > max_stored {
        return Err(MdocxError::LimitExceeded(format!(
            "{} section too large: {} > {}",
            section_type.name(),
            header.payload_len,
            max_stored
        )));
    }
    if header.payload_len == 0 {
        tracing::debug!(section = section_type.name(), "empty section");
        return Ok(None);
    }

    let stored = read_exact_len(reader, header.payload_len)?;
    let plain = decompress_payload(compression, header.section_flags, stored, max_uncompressed)?;
    tracing::debug!(
        section = section_type.name(),
        %compression,
        stored_len = header.payload_len,
        plain_len = plain.len(),
        "decoded section"
    );
    Ok(Some(plain))
}

/// Read exactly `len` bytes; a short stream is `UnexpectedEof`.
fn read_exact_len<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(MdocxError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes, got {}", buf.len()),
        )));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Compression;
    use crate::container::MarkdownFile;
    use crate::writer::{encode_to_vec, EncodeOptions};

    fn sample(compression: Compression) -> Vec<u8> {
        let doc = Document::new(vec![MarkdownFile::new("readme.md", "# Hello\n")]);
        encode_to_vec(&doc, &EncodeOptions::new().with_compression(compression)).unwrap()
    }

    #[test]
    fn test_options_defaults() {
        let options = DecodeOptions::default();
        assert!(options.verify_hashes);
        assert_eq!(options.limits, Limits::default());
        assert!(!DecodeOptions::new().with_verify_hashes(false).verify_hashes);
    }

    #[test]
    fn test_header_check_order() {
        let mut bytes = sample(Compression::None);
        // wrong magic wins over wrong version
        bytes[0] ^= 0xFF;
        bytes[8] = 9;
        assert!(matches!(
            decode_from_slice(&bytes, &DecodeOptions::default()),
            Err(MdocxError::InvalidMagic)
        ));

        // wrong header size wins over wrong version
        let mut bytes = sample(Compression::None);
        bytes[8] = 9;
        bytes[12] = 31;
        assert!(matches!(
            decode_from_slice(&bytes, &DecodeOptions::default()),
            Err(MdocxError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_metadata_without_flag() {
        let mut doc = Document::new(vec![MarkdownFile::new("a.md", "a")]);
        doc.metadata = Some(serde_json::Map::new());
        let mut bytes = encode_to_vec(&doc, &EncodeOptions::default()).unwrap();
        bytes[10] = 0;

        let err = decode_from_slice(&bytes, &DecodeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("METADATA_JSON"));
    }

    #[test]
    fn test_read_exact_len_reports_truncation() {
        let mut data: &[u8] = &[1, 2, 3];
        match read_exact_len(&mut data, 8) {
            Err(MdocxError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_every_compression() {
        for &compression in Compression::all() {
            let doc = decode_from_slice(&sample(compression), &DecodeOptions::default()).unwrap();
            assert_eq!(doc.markdown.files[0].text(), Some("# Hello\n"));
        }
    }

    #[test]
    fn test_stored_length_limit() {
        let bytes = sample(Compression::Zstd);
        let options = DecodeOptions::new().with_limits(Limits {
            max_markdown_section_len: 4,
            ..Limits::unset()
        });
        let err = decode_from_slice(&bytes, &options).unwrap_err();
        assert!(matches!(err, MdocxError::LimitExceeded(_)));
    }
}
