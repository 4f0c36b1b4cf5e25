// SPDX-License-Identifier: MIT
//! MDOCX encoder

use std::borrow::Cow;
use std::io::Write;

use crate::compression::{compress_payload, Compression};
use crate::container::{Document, MediaBundle};
use crate::error::{MdocxError, Result};
use crate::format::{FixedHeader, SectionHeader, SectionType};
use crate::limits::Limits;
use crate::payload::{encode_markdown_bundle, encode_media_bundle};
use crate::validation::validate_bundles;

/// Options for [`encode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Zero fields resolve to defaults
    pub limits: Limits,
    /// Verify non-zero media digests before writing
    pub verify_hashes: bool,
    /// Hash media items whose digest is unset. The caller's document is
    /// never modified; see [`Document::populate_sha256`].
    pub auto_populate_sha256: bool,
    pub markdown_compression: Compression,
    pub media_compression: Compression,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            verify_hashes: true,
            auto_populate_sha256: true,
            markdown_compression: Compression::Zstd,
            media_compression: Compression::Zstd,
        }
    }
}

impl EncodeOptions {
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

    pub fn with_auto_populate_sha256(mut self, populate: bool) -> Self {
        self.auto_populate_sha256 = populate;
        self
    }

    pub fn with_markdown_compression(mut self, compression: Compression) -> Self {
        self.markdown_compression = compression;
        self
    }

    pub fn with_media_compression(mut self, compression: Compression) -> Self {
        self.media_compression = compression;
        self
    }

    /// Same compression for both sections
    pub fn with_compression(self, compression: Compression) -> Self {
        self.with_markdown_compression(compression)
            .with_media_compression(compression)
    }
}

/// Validate `doc` and write it to `writer` as an MDOCX v1 container.
///
/// Nothing is written until validation passes. A failure after that point
/// (for example a writer error) leaves a truncated stream behind; the
/// output must then be discarded.
pub fn encode<W: Write>(writer: &mut W, doc: &Document, options: &EncodeOptions) -> Result<()> {
    let limits = options.limits.with_defaults();

    let media: Cow<'_, MediaBundle> = if options.auto_populate_sha256 && doc.media.needs_sha256()
    {
        let mut populated = doc.media.clone();
        populated.populate_sha256();
        Cow::Owned(populated)
    } else {
        Cow::Borrowed(&doc.media)
    };

    validate_bundles(&doc.markdown, &media, &limits, options.verify_hashes)?;

    let metadata = match &doc.metadata {
        Some(map) => serde_json::to_vec(map)?,
        None => Vec::new(),
    };
    if metadata.len() as u64 > u64::from(limits.max_metadata_len) {
        return Err(MdocxError::LimitExceeded(format!(
            "metadata too large: {} > {}",
            metadata.len(),
            limits.max_metadata_len
        )));
    }
    let metadata_length = u32::try_from(metadata.len())
        .map_err(|_| MdocxError::LimitExceeded("metadata too large".into()))?;

    let (markdown_flags, markdown_payload) = compress_payload(
        options.markdown_compression,
        encode_markdown_bundle(&doc.markdown),
    )?;
    let (media_flags, media_payload) =
        compress_payload(options.media_compression, encode_media_bundle(&media))?;

    // A present map serializes to at least "{}", so the flag follows the length
    FixedHeader::new(metadata_length).write_to(writer)?;
    writer.write_all(&metadata)?;

    write_section(
        writer,
        SectionType::Markdown,
        options.markdown_compression,
        markdown_flags,
        &markdown_payload,
    )?;
    write_section(
        writer,
        SectionType::Media,
        options.media_compression,
        media_flags,
        &media_payload,
    )?;

    tracing::debug!(
        metadata_len = metadata.len(),
        markdown_files = doc.markdown.files.len(),
        media_items = media.items.len(),
        "encoded document"
    );
    Ok(())
}

#[inline]
fn write_section<W: Write>(
    writer: &mut W,
    section_type: SectionType,
    compression: Compression,
    flags: u16,
    payload: &[u8],
) -> Result<()> {
    SectionHeader::new(section_type, flags, payload.len() as u64).write_to(writer)?;
    writer.write_all(payload)?;
    tracing::debug!(
        section = section_type.name(),
        %compression,
        stored_len = payload.len(),
        "wrote section"
    );
    Ok(())
}

/// Encode into a fresh buffer
pub fn encode_to_vec(doc: &Document, options: &EncodeOptions) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode(&mut out, doc, options)?;
    Ok(out)
}
