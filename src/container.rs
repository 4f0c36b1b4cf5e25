// SPDX-License-Identifier: MIT
//! In-memory MDOCX document model

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Bundle version accepted for both bundles
pub const BUNDLE_VERSION: u16 = 1;

/// SHA-256 digest; all zeroes means "not set"
pub type Sha256Digest = [u8; 32];

/// Per-file and per-item key/value attributes.
///
/// An empty map and an absent map are the same thing.
pub type Attributes = BTreeMap<String, String>;

/// A complete MDOCX document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Optional metadata; always a JSON object when present
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    pub markdown: MarkdownBundle,
    pub media: MediaBundle,
}

impl Document {
    /// Document with the given markdown files, no metadata and no media
    pub fn new(files: Vec<MarkdownFile>) -> Self {
        Self {
            metadata: None,
            markdown: MarkdownBundle::new(files),
            media: MediaBundle::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_media(mut self, items: Vec<MediaItem>) -> Self {
        self.media.items = items;
        self
    }

    /// Fill every unset media digest in place.
    ///
    /// `encode` does this on a private copy; call this to keep the digests.
    pub fn populate_sha256(&mut self) {
        self.media.populate_sha256();
    }
}

/// Markdown section contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownBundle {
    pub bundle_version: u16,
    /// Container path of the primary file
    pub root_path: Option<String>,
    /// Must not be empty; order is preserved on the wire
    pub files: Vec<MarkdownFile>,
}

impl MarkdownBundle {
    pub fn new(files: Vec<MarkdownFile>) -> Self {
        Self {
            bundle_version: BUNDLE_VERSION,
            root_path: None,
            files,
        }
    }
}

impl Default for MarkdownBundle {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// A single Markdown document
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkdownFile {
    pub path: String,
    /// Must be valid UTF-8; kept as bytes so invalid input can be reported
    pub content: Vec<u8>,
    /// Referenced media IDs. Not checked against the media bundle.
    pub media_refs: Vec<String>,
    pub attributes: Attributes,
}

impl MarkdownFile {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// Content as text, if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// Media section contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBundle {
    pub bundle_version: u16,
    pub items: Vec<MediaItem>,
}

impl MediaBundle {
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self {
            bundle_version: BUNDLE_VERSION,
            items,
        }
    }

    /// True if any item still has a zero digest
    pub fn needs_sha256(&self) -> bool {
        self.items.iter().any(|item| !item.has_sha256())
    }

    pub fn populate_sha256(&mut self) {
        for item in self.items.iter_mut().filter(|item| !item.has_sha256()) {
            item.sha256 = item.computed_sha256();
        }
    }
}

impl Default for MediaBundle {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// A binary media asset, addressable as `mdocx://media/<id>`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaItem {
    pub id: String,
    pub path: Option<String>,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub sha256: Sha256Digest,
    pub attributes: Attributes,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            mime_type: mime_type.into(),
            data,
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// SHA-256 of `data`
    pub fn computed_sha256(&self) -> Sha256Digest {
        Sha256::digest(&self.data).into()
    }

    /// Whether a non-zero digest is stored
    #[inline]
    pub fn has_sha256(&self) -> bool {
        self.sha256 != [0u8; 32]
    }

    /// Lowercase hex of the stored digest
    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }
}
