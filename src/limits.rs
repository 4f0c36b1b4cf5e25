// SPDX-License-Identifier: MIT
//! Size and count ceilings applied during encode and decode
//!
//! A zero field always means "use the default". To lift a ceiling, set a very
//! large value instead.

use serde::{Deserialize, Serialize};

/// Allocation-relevant ceilings. Passed by value into every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Metadata JSON block, in bytes
    pub max_metadata_len: u32,
    /// Stored (compressed) Markdown section payload
    pub max_markdown_section_len: u64,
    /// Stored (compressed) Media section payload
    pub max_media_section_len: u64,
    /// Decompressed Markdown bundle payload
    pub max_markdown_uncompressed: u64,
    /// Decompressed Media bundle payload
    pub max_media_uncompressed: u64,
    pub max_markdown_files: usize,
    pub max_media_items: usize,
    pub max_single_markdown_file_size: u64,
    pub max_single_media_size: u64,
}

impl Limits {
    /// The recommended ceilings
    pub const DEFAULT: Limits = Limits {
        max_metadata_len: 1 << 20,
        max_markdown_section_len: 1 << 30,
        max_media_section_len: 1 << 32,
        max_markdown_uncompressed: 256 << 20,
        max_media_uncompressed: 2 << 30,
        max_markdown_files: 10_000,
        max_media_items: 10_000,
        max_single_markdown_file_size: 256 << 20,
        max_single_media_size: 512 << 20,
    };

    /// All-zero limits, i.e. every field resolves to its default
    pub fn unset() -> Self {
        Self {
            max_metadata_len: 0,
            max_markdown_section_len: 0,
            max_media_section_len: 0,
            max_markdown_uncompressed: 0,
            max_media_uncompressed: 0,
            max_markdown_files: 0,
            max_media_items: 0,
            max_single_markdown_file_size: 0,
            max_single_media_size: 0,
        }
    }

    /// Copy with every zero field replaced by its default
    pub fn with_defaults(self) -> Self {
        let d = Self::DEFAULT;
        Self {
            max_metadata_len: or_default(self.max_metadata_len, d.max_metadata_len),
            max_markdown_section_len: or_default(
                self.max_markdown_section_len,
                d.max_markdown_section_len,
            ),
            max_media_section_len: or_default(self.max_media_section_len, d.max_media_section_len),
            max_markdown_uncompressed: or_default(
                self.max_markdown_uncompressed,
                d.max_markdown_uncompressed,
            ),
            max_media_uncompressed: or_default(
                self.max_media_uncompressed,
                d.max_media_uncompressed,
            ),
            max_markdown_files: or_default(self.max_markdown_files, d.max_markdown_files),
            max_media_items: or_default(self.max_media_items, d.max_media_items),
            max_single_markdown_file_size: or_default(
                self.max_single_markdown_file_size,
                d.max_single_markdown_file_size,
            ),
            max_single_media_size: or_default(self.max_single_media_size, d.max_single_media_size),
        }
    }

    /// Read `MDOCX_MAX_*` environment variables.
    ///
    /// Missing or unparsable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::DEFAULT;
        let get = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        Self {
            max_metadata_len: get("MDOCX_MAX_METADATA_LEN")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(d.max_metadata_len),
            max_markdown_section_len: get("MDOCX_MAX_MARKDOWN_SECTION_LEN")
                .unwrap_or(d.max_markdown_section_len),
            max_media_section_len: get("MDOCX_MAX_MEDIA_SECTION_LEN")
                .unwrap_or(d.max_media_section_len),
            max_markdown_uncompressed: get("MDOCX_MAX_MARKDOWN_UNCOMPRESSED")
                .unwrap_or(d.max_markdown_uncompressed),
            max_media_uncompressed: get("MDOCX_MAX_MEDIA_UNCOMPRESSED")
                .unwrap_or(d.max_media_uncompressed),
            max_markdown_files: get("MDOCX_MAX_MARKDOWN_FILES")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(d.max_markdown_files),
            max_media_items: get("MDOCX_MAX_MEDIA_ITEMS")
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(d.max_media_items),
            max_single_markdown_file_size: get("MDOCX_MAX_SINGLE_MARKDOWN_FILE_SIZE")
                .unwrap_or(d.max_single_markdown_file_size),
            max_single_media_size: get("MDOCX_MAX_SINGLE_MEDIA_SIZE")
                .unwrap_or(d.max_single_media_size),
        }
        .with_defaults()
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[inline]
fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_with_defaults_fills_zeroes() {
        assert_eq!(Limits::unset().with_defaults(), Limits::DEFAULT);
    }

    #[test]
    fn test_with_defaults_keeps_explicit_values() {
        let limits = Limits {
            max_media_uncompressed: 4 << 30,
            max_markdown_files: 3,
            ..Limits::unset()
        }
        .with_defaults();

        assert_eq!(limits.max_media_uncompressed, 4 << 30);
        assert_eq!(limits.max_markdown_files, 3);
        assert_eq!(limits.max_metadata_len, 1 << 20);
        assert_eq!(limits.max_single_media_size, 512 << 20);
    }

    #[test]
    fn test_default_values() {
        let d = Limits::default();
        assert_eq!(d.max_metadata_len, 1_048_576);
        assert_eq!(d.max_markdown_section_len, 1 << 30);
        assert_eq!(d.max_media_section_len, 4 << 30);
        assert_eq!(d.max_markdown_uncompressed, 256 * 1024 * 1024);
        assert_eq!(d.max_media_uncompressed, 2 << 30);
        assert_eq!(d.max_markdown_files, 10_000);
        assert_eq!(d.max_media_items, 10_000);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("MDOCX_MAX_METADATA_LEN", "512"),
            ("MDOCX_MAX_MEDIA_ITEMS", " 7 "),
            ("MDOCX_MAX_MARKDOWN_FILES", "lots"),
            ("MDOCX_MAX_SINGLE_MEDIA_SIZE", "0"),
        ]
        .into_iter()
        .collect();

        let limits = Limits::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(limits.max_metadata_len, 512);
        assert_eq!(limits.max_media_items, 7);
        assert_eq!(limits.max_markdown_files, 10_000);
        // zero still resolves to the default
        assert_eq!(limits.max_single_media_size, 512 << 20);
    }

    #[test]
    fn test_partial_json_overlay() {
        let limits: Limits = serde_json::from_str(r#"{"max_media_items": 2}"#).unwrap();
        assert_eq!(limits.max_media_items, 2);
        assert_eq!(limits.max_metadata_len, Limits::DEFAULT.max_metadata_len);
    }
}
