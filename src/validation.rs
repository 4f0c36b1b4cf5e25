// SPDX-License-Identifier: MIT
//! Structural and integrity checks for a decoded or to-be-encoded document
//!
//! Checks run in a fixed order and the first failure wins.

use std::collections::HashSet;

use subtle::ConstantTimeEq;

use crate::container::{Document, MarkdownBundle, MediaBundle, BUNDLE_VERSION};
use crate::error::{MdocxError, Result};
use crate::limits::Limits;

/// Validate a whole document against resolved `limits`.
///
/// Non-zero media digests are only recomputed when `verify_hashes` is set.
/// `MarkdownFile::media_refs` are deliberately not cross-checked against
/// media IDs.
pub fn validate_document(doc: &Document, limits: &Limits, verify_hashes: bool) -> Result<()> {
    validate_bundles(&doc.markdown, &doc.media, limits, verify_hashes)
}

pub(crate) fn validate_bundles(
    markdown: &MarkdownBundle,
    media: &MediaBundle,
    limits: &Limits,
    verify_hashes: bool,
) -> Result<()> {
    validate_markdown(markdown, limits)?;
    validate_media(media, limits, verify_hashes)
}

fn validate_markdown(markdown: &MarkdownBundle, limits: &Limits) -> Result<()> {
    if markdown.bundle_version != BUNDLE_VERSION {
        return Err(MdocxError::Validation(format!(
            "markdown bundle version must be {BUNDLE_VERSION}, got {}",
            markdown.bundle_version
        )));
    }
    if markdown.files.is_empty() {
        return Err(MdocxError::Validation(
            "markdown files must not be empty".into(),
        ));
    }
    if markdown.files.len() > limits.max_markdown_files {
        return Err(MdocxError::LimitExceeded(format!(
            "too many markdown files: {} > {}",
            markdown.files.len(),
            limits.max_markdown_files
        )));
    }

    if let Some(root) = &markdown.root_path {
        check_container_path(root)
            .map_err(|e| MdocxError::Validation(format!("markdown root path: {e}")))?;
    }

    let mut seen = HashSet::with_capacity(markdown.files.len());
    for (index, file) in markdown.files.iter().enumerate() {
        check_container_path(&file.path).map_err(|e| {
            MdocxError::Validation(format!("markdown file {index} path: {e}"))
        })?;
        if !seen.insert(file.path.as_str()) {
            return Err(MdocxError::Validation(format!(
                "duplicate markdown path {:?}",
                file.path
            )));
        }
        if std::str::from_utf8(&file.content).is_err() {
            return Err(MdocxError::Validation(format!(
                "markdown file {:?} content is not valid UTF-8",
                file.path
            )));
        }
        if file.content.len() as u64 > limits.max_single_markdown_file_size {
            return Err(MdocxError::LimitExceeded(format!(
                "markdown file {:?} too large: {} bytes",
                file.path,
                file.content.len()
            )));
        }
    }

    Ok(())
}

fn validate_media(media: &MediaBundle, limits: &Limits, verify_hashes: bool) -> Result<()> {
    if media.bundle_version != BUNDLE_VERSION {
        return Err(MdocxError::Validation(format!(
            "media bundle version must be {BUNDLE_VERSION}, got {}",
            media.bundle_version
        )));
    }
    if media.items.len() > limits.max_media_items {
        return Err(MdocxError::LimitExceeded(format!(
            "too many media items: {} > {}",
            media.items.len(),
            limits.max_media_items
        )));
    }

    let mut seen = HashSet::with_capacity(media.items.len());
    for (index, item) in media.items.iter().enumerate() {
        if item.id.trim().is_empty() {
            return Err(MdocxError::Validation(format!(
                "media item {index} has empty ID"
            )));
        }
        if !seen.insert(item.id.as_str()) {
            return Err(MdocxError::Validation(format!(
                "duplicate media ID {:?}",
                item.id
            )));
        }
        if let Some(path) = &item.path {
            check_container_path(path).map_err(|e| {
                MdocxError::Validation(format!("media item {:?} path: {e}", item.id))
            })?;
        }
        if item.data.len() as u64 > limits.max_single_media_size {
            return Err(MdocxError::LimitExceeded(format!(
                "media item {:?} too large: {} bytes",
                item.id,
                item.data.len()
            )));
        }
        if verify_hashes && item.has_sha256() {
            let computed = item.computed_sha256();
            if !bool::from(computed[..].ct_eq(&item.sha256[..])) {
                return Err(MdocxError::Validation(format!(
                    "media item {:?} SHA256 mismatch",
                    item.id
                )));
            }
        }
    }

    Ok(())
}

/// Validate a container path: relative, forward-slash, already normalized,
/// and not escaping the container root.
pub fn validate_container_path(path: &str) -> Result<()> {
    check_container_path(path).map_err(MdocxError::Validation)
}

fn check_container_path(path: &str) -> std::result::Result<(), String> {
    if path.trim().is_empty() {
        return Err("path is empty".into());
    }
    if path.starts_with('/') {
        return Err("path must not be absolute".into());
    }
    if path.contains('\\') {
        return Err("path must use forward slashes".into());
    }
    let clean = lexical_clean(path);
    if clean != path {
        return Err(format!("path must be normalized: {clean:?}"));
    }
    if clean == "." {
        return Err("path must not be current directory".into());
    }
    if clean == ".." || clean.starts_with("../") {
        return Err("path must not escape".into());
    }
    Ok(())
}

/// Lexically normalize a slash-separated path: drop empty and `.` segments,
/// fold `name/..`, keep leading `..` for relative paths. Empty becomes `.`.
pub fn lexical_clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
