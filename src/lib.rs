// SPDX-License-Identifier: MIT
//! # MDOCX
//!
//! A single-file binary container bundling Markdown documents with the media
//! they reference, plus optional JSON metadata.
//!
//! ## Format Specification
//!
//! ```text
//! MDOCX v1 (all integers little-endian)
//! =====================================
//!
//! Fixed header (32 bytes):
//! - Magic: "MDOCX\r\n\x1A" (8 bytes)
//! - Version: 1 (2 bytes)
//! - Header flags: bit 0 = metadata is UTF-8 JSON (2 bytes)
//! - Fixed header size: 32 (4 bytes)
//! - Metadata length (4 bytes)
//! - Reserved: 0 (4 bytes), 0 (8 bytes)
//!
//! Metadata: JSON object (metadata length bytes, may be absent)
//!
//! Section header (16 bytes), twice, Markdown first then Media:
//! - Section type: 1 = Markdown, 2 = Media (2 bytes)
//! - Section flags: compression id in bits 0..4,
//!   0x0010 = payload starts with u64 uncompressed length (2 bytes)
//! - Payload length, as stored (8 bytes)
//! - Reserved: 0 (4 bytes)
//! followed by the payload
//! ```
//!
//! Compression ids: 0 none, 1 zip, 2 zstd, 3 lz4, 4 brotli. Every id except
//! none wraps the codec output as `[u64 uncompressed length][bytes]`, and the
//! declared length is bounded by [`Limits`] before anything is inflated.
//!
//! ## Usage
//!
//! ```rust
//! use mdocx::{decode_from_slice, encode_to_vec, DecodeOptions, Document, EncodeOptions};
//! use mdocx::{MarkdownFile, MediaItem};
//!
//! let doc = Document::new(vec![MarkdownFile::new("readme.md", "# Hello\n")])
//!     .with_media(vec![MediaItem::new("logo", "image/png", vec![0x89, 0x50])]);
//!
//! let bytes = encode_to_vec(&doc, &EncodeOptions::default()).unwrap();
//! let decoded = decode_from_slice(&bytes, &DecodeOptions::default()).unwrap();
//!
//! assert_eq!(decoded.markdown.files[0].text(), Some("# Hello\n"));
//! // digests are filled in on the way out, the input is left untouched
//! assert!(decoded.media.items[0].has_sha256());
//! assert!(!doc.media.items[0].has_sha256());
//! ```

pub mod compression;
pub mod container;
pub mod error;
pub mod format;
pub mod limits;
pub mod payload;
pub mod reader;
pub mod validation;
pub mod writer;

// Re-export main types
pub use compression::{Compression, PayloadCodec};
pub use container::{
    Attributes, Document, MarkdownBundle, MarkdownFile, MediaBundle, MediaItem, Sha256Digest,
    BUNDLE_VERSION,
};
pub use error::{ErrorKind, MdocxError, Result};
pub use format::{FixedHeader, SectionHeader, SectionType};
pub use format::{FIXED_HEADER_SIZE, MDOCX_MAGIC, MDOCX_VERSION, SECTION_HEADER_SIZE};
pub use limits::Limits;
pub use reader::{decode, decode_from_slice, DecodeOptions};
pub use validation::{validate_container_path, validate_document};
pub use writer::{encode, encode_to_vec, EncodeOptions};
