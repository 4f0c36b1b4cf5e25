// SPDX-License-Identifier: MIT
//! Field-tagged binary encoding of the two section bundles
//!
//! ```text
//! field  := tag:u8  kind:u8  len:u64 LE  body[len]
//! kind   := 1 U16 (2 bytes LE) | 2 BYTES | 3 STRING (UTF-8)
//!         | 4 RECORD (nested fields) | 5 LIST (fields, every tag 0)
//! map    := LIST of RECORD { 1: key STRING, 2: value STRING }, key order
//! ```
//!
//! Record fields appear in strictly ascending tag order. Absent options and
//! empty sequences are omitted. Decoding is strict: unknown or repeated tags,
//! wrong kinds, truncation and trailing bytes are all `InvalidPayload`.
//!
//! | Record         | Tags |
//! |----------------|------|
//! | MarkdownBundle | 1 version U16 (req), 2 root_path, 3 files |
//! | MarkdownFile   | 1 path (req), 2 content BYTES, 3 media_refs, 4 attributes |
//! | MediaBundle    | 1 version U16 (req), 2 items |
//! | MediaItem      | 1 id (req), 2 path, 3 mime_type, 4 data, 5 sha256, 6 attributes |

use crate::container::{
    Attributes, MarkdownBundle, MarkdownFile, MediaBundle, MediaItem, Sha256Digest,
};
use crate::error::{MdocxError, Result};

/// Field kinds
pub mod kind {
    pub const U16: u8 = 1;
    pub const BYTES: u8 = 2;
    pub const STRING: u8 = 3;
    pub const RECORD: u8 = 4;
    pub const LIST: u8 = 5;
}

/// tag + kind + u64 length
pub const FIELD_HEADER_LEN: usize = 10;

/// Tag used by every list element
const ELEMENT_TAG: u8 = 0;

mod tags {
    pub const BUNDLE_VERSION: u8 = 1;

    pub const MD_ROOT_PATH: u8 = 2;
    pub const MD_FILES: u8 = 3;

    pub const FILE_PATH: u8 = 1;
    pub const FILE_CONTENT: u8 = 2;
    pub const FILE_MEDIA_REFS: u8 = 3;
    pub const FILE_ATTRIBUTES: u8 = 4;

    pub const MEDIA_ITEMS: u8 = 2;

    pub const ITEM_ID: u8 = 1;
    pub const ITEM_PATH: u8 = 2;
    pub const ITEM_MIME_TYPE: u8 = 3;
    pub const ITEM_DATA: u8 = 4;
    pub const ITEM_SHA256: u8 = 5;
    pub const ITEM_ATTRIBUTES: u8 = 6;

    pub const ATTR_KEY: u8 = 1;
    pub const ATTR_VALUE: u8 = 2;
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Serialize a Markdown bundle to section plaintext
pub fn encode_markdown_bundle(bundle: &MarkdownBundle) -> Vec<u8> {
    let content: usize = bundle.files.iter().map(|f| f.content.len()).sum();
    let mut enc = Encoder::with_capacity(content + 64 * bundle.files.len() + 32);

    enc.u16(tags::BUNDLE_VERSION, bundle.bundle_version);
    if let Some(root) = &bundle.root_path {
        enc.string(tags::MD_ROOT_PATH, root);
    }
    if !bundle.files.is_empty() {
        enc.nested(tags::MD_FILES, kind::LIST, |list| {
            for file in &bundle.files {
                list.nested(ELEMENT_TAG, kind::RECORD, |rec| encode_markdown_file(rec, file));
            }
        });
    }
    enc.into_inner()
}

fn encode_markdown_file(enc: &mut Encoder, file: &MarkdownFile) {
    enc.string(tags::FILE_PATH, &file.path);
    if !file.content.is_empty() {
        enc.bytes(tags::FILE_CONTENT, &file.content);
    }
    if !file.media_refs.is_empty() {
        enc.nested(tags::FILE_MEDIA_REFS, kind::LIST, |list| {
            for id in &file.media_refs {
                list.string(ELEMENT_TAG, id);
            }
        });
    }
    enc.attributes(tags::FILE_ATTRIBUTES, &file.attributes);
}

/// Serialize a Media bundle to section plaintext
pub fn encode_media_bundle(bundle: &MediaBundle) -> Vec<u8> {
    let data: usize = bundle.items.iter().map(|i| i.data.len()).sum();
    let mut enc = Encoder::with_capacity(data + 128 * bundle.items.len() + 32);

    enc.u16(tags::BUNDLE_VERSION, bundle.bundle_version);
    if !bundle.items.is_empty() {
        enc.nested(tags::MEDIA_ITEMS, kind::LIST, |list| {
            for item in &bundle.items {
                list.nested(ELEMENT_TAG, kind::RECORD, |rec| encode_media_item(rec, item));
            }
        });
    }
    enc.into_inner()
}

fn encode_media_item(enc: &mut Encoder, item: &MediaItem) {
    enc.string(tags::ITEM_ID, &item.id);
    if let Some(path) = &item.path {
        enc.string(tags::ITEM_PATH, path);
    }
    if !item.mime_type.is_empty() {
        enc.string(tags::ITEM_MIME_TYPE, &item.mime_type);
    }
    if !item.data.is_empty() {
        enc.bytes(tags::ITEM_DATA, &item.data);
    }
    if item.has_sha256() {
        enc.bytes(tags::ITEM_SHA256, &item.sha256);
    }
    enc.attributes(tags::ITEM_ATTRIBUTES, &item.attributes);
}

struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn field(&mut self, tag: u8, kind: u8, body: &[u8]) {
        self.buf.push(tag);
        self.buf.push(kind);
        self.buf.extend_from_slice(&(body.len() as u64).to_le_bytes());
        self.buf.extend_from_slice(body);
    }

    fn u16(&mut self, tag: u8, value: u16) {
        self.field(tag, kind::U16, &value.to_le_bytes());
    }

    fn bytes(&mut self, tag: u8, value: &[u8]) {
        self.field(tag, kind::BYTES, value);
    }

    fn string(&mut self, tag: u8, value: &str) {
        self.field(tag, kind::STRING, value.as_bytes());
    }

    /// Write a RECORD or LIST whose body is produced by `body`; the length is
    /// patched in afterwards so large payloads are copied only once.
    fn nested(&mut self, tag: u8, kind: u8, body: impl FnOnce(&mut Encoder)) {
        self.buf.push(tag);
        self.buf.push(kind);
        let len_at = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 8]);

        body(self);

        let len = (self.buf.len() - len_at - 8) as u64;
        self.buf[len_at..len_at + 8].copy_from_slice(&len.to_le_bytes());
    }

    fn attributes(&mut self, tag: u8, attributes: &Attributes) {
        if attributes.is_empty() {
            return;
        }
        self.nested(tag, kind::LIST, |list| {
            for (key, value) in attributes {
                list.nested(ELEMENT_TAG, kind::RECORD, |rec| {
                    rec.string(tags::ATTR_KEY, key);
                    rec.string(tags::ATTR_VALUE, value);
                });
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Parse section plaintext into a Markdown bundle
pub fn decode_markdown_bundle(data: &[u8]) -> Result<MarkdownBundle> {
    let mut fields = Record::new(data, "markdown bundle");
    let mut bundle_version = None;
    let mut root_path = None;
    let mut files = Vec::new();

    while let Some(field) = fields.next_field()? {
        match field.tag {
            tags::BUNDLE_VERSION => bundle_version = Some(field.u16()?),
            tags::MD_ROOT_PATH => root_path = Some(field.string()?),
            tags::MD_FILES => files = field.list(decode_markdown_file)?,
            _ => return Err(fields.unknown(&field)),
        }
    }

    Ok(MarkdownBundle {
        bundle_version: bundle_version.ok_or_else(|| missing("markdown bundle", "version"))?,
        root_path,
        files,
    })
}

fn decode_markdown_file(field: Field<'_>) -> Result<MarkdownFile> {
    let mut fields = field.record("markdown file")?;
    let mut path = None;
    let mut file = MarkdownFile::default();

    while let Some(field) = fields.next_field()? {
        match field.tag {
            tags::FILE_PATH => path = Some(field.string()?),
            tags::FILE_CONTENT => file.content = field.bytes()?.to_vec(),
            tags::FILE_MEDIA_REFS => file.media_refs = field.list(|f| f.string())?,
            tags::FILE_ATTRIBUTES => file.attributes = field.attributes()?,
            _ => return Err(fields.unknown(&field)),
        }
    }

    file.path = path.ok_or_else(|| missing("markdown file", "path"))?;
    Ok(file)
}

/// Parse section plaintext into a Media bundle
pub fn decode_media_bundle(data: &[u8]) -> Result<MediaBundle> {
    let mut fields = Record::new(data, "media bundle");
    let mut bundle_version = None;
    let mut items = Vec::new();

    while let Some(field) = fields.next_field()? {
        match field.tag {
            tags::BUNDLE_VERSION => bundle_version = Some(field.u16()?),
            tags::MEDIA_ITEMS => items = field.list(decode_media_item)?,
            _ => return Err(fields.unknown(&field)),
        }
    }

    Ok(MediaBundle {
        bundle_version: bundle_version.ok_or_else(|| missing("media bundle", "version"))?,
        items,
    })
}

fn decode_media_item(field: Field<'_>) -> Result<MediaItem> {
    let mut fields = field.record("media item")?;
    let mut id = None;
    let mut item = MediaItem::default();

    while let Some(field) = fields.next_field()? {
        match field.tag {
            tags::ITEM_ID => id = Some(field.string()?),
            tags::ITEM_PATH => item.path = Some(field.string()?),
            tags::ITEM_MIME_TYPE => item.mime_type = field.string()?,
            tags::ITEM_DATA => item.data = field.bytes()?.to_vec(),
            tags::ITEM_SHA256 => item.sha256 = field.digest()?,
            tags::ITEM_ATTRIBUTES => item.attributes = field.attributes()?,
            _ => return Err(fields.unknown(&field)),
        }
    }

    item.id = id.ok_or_else(|| missing("media item", "id"))?;
    Ok(item)
}

fn missing(record: &str, name: &str) -> MdocxError {
    MdocxError::InvalidPayload(format!("{record}: missing required field {name}"))
}

/// One decoded field header plus its borrowed body
#[derive(Debug, Clone, Copy)]
struct Field<'a> {
    tag: u8,
    kind: u8,
    body: &'a [u8],
}

impl<'a> Field<'a> {
    fn body_of(&self, kind: u8) -> Result<&'a [u8]> {
        if self.kind != kind {
            return Err(MdocxError::InvalidPayload(format!(
                "field {} has kind {}, expected {}",
                self.tag, self.kind, kind
            )));
        }
        Ok(self.body)
    }

    fn u16(&self) -> Result<u16> {
        let body = self.body_of(kind::U16)?;
        match *body {
            [lo, hi] => Ok(u16::from_le_bytes([lo, hi])),
            _ => Err(MdocxError::InvalidPayload(format!(
                "field {}: u16 body is {} bytes",
                self.tag,
                body.len()
            ))),
        }
    }

    fn bytes(&self) -> Result<&'a [u8]> {
        self.body_of(kind::BYTES)
    }

    fn string(&self) -> Result<String> {
        let body = self.body_of(kind::STRING)?;
        std::str::from_utf8(body)
            .map(str::to_owned)
            .map_err(|e| MdocxError::InvalidPayload(format!("field {}: {e}", self.tag)))
    }

    fn digest(&self) -> Result<Sha256Digest> {
        let body = self.bytes()?;
        Sha256Digest::try_from(body).map_err(|_| {
            MdocxError::InvalidPayload(format!("sha256 must be 32 bytes, got {}", body.len()))
        })
    }

    fn record(&self, what: &'static str) -> Result<Record<'a>> {
        Ok(Record::new(self.body_of(kind::RECORD)?, what))
    }

    /// Decode every element of a LIST. Capacity grows with decoded
    /// elements, never from a declared count.
    fn list<T>(&self, mut element: impl FnMut(Field<'a>) -> Result<T>) -> Result<Vec<T>> {
        let mut cursor = Cursor::new(self.body_of(kind::LIST)?);
        let mut out = Vec::new();
        while let Some(field) = cursor.next_field()? {
            if field.tag != ELEMENT_TAG {
                return Err(MdocxError::InvalidPayload(format!(
                    "list element has tag {}",
                    field.tag
                )));
            }
            out.push(element(field)?);
        }
        Ok(out)
    }

    fn attributes(&self) -> Result<Attributes> {
        let mut attributes = Attributes::new();
        for (key, value) in self.list(decode_attribute)? {
            if attributes.contains_key(&key) {
                return Err(MdocxError::InvalidPayload(format!(
                    "duplicate attribute key {key:?}"
                )));
            }
            attributes.insert(key, value);
        }
        Ok(attributes)
    }
}

fn decode_attribute(field: Field<'_>) -> Result<(String, String)> {
    let mut fields = field.record("attribute")?;
    let mut key = None;
    let mut value = None;

    while let Some(field) = fields.next_field()? {
        match field.tag {
            tags::ATTR_KEY => key = Some(field.string()?),
            tags::ATTR_VALUE => value = Some(field.string()?),
            _ => return Err(fields.unknown(&field)),
        }
    }

    Ok((
        key.ok_or_else(|| missing("attribute", "key"))?,
        value.ok_or_else(|| missing("attribute", "value"))?,
    ))
}

/// Raw field splitter over a body
struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(body: &'a [u8]) -> Self {
        Self { rest: body }
    }

    fn next_field(&mut self) -> Result<Option<Field<'a>>> {
        if self.rest.is_empty() {
            return Ok(None);
        }
        if self.rest.len() < FIELD_HEADER_LEN {
            return Err(MdocxError::InvalidPayload(format!(
                "truncated field header ({} bytes left)",
                self.rest.len()
            )));
        }

        let (header, rest) = self.rest.split_at(FIELD_HEADER_LEN);
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&header[2..]);
        let len = u64::from_le_bytes(len_bytes);

        let body_len = usize::try_from(len)
            .ok()
            .filter(|&n| n <= rest.len())
            .ok_or_else(|| {
                MdocxError::InvalidPayload(format!(
                    "field {} length {} exceeds remaining {} bytes",
                    header[0],
                    len,
                    rest.len()
                ))
            })?;

        let (body, rest) = rest.split_at(body_len);
        self.rest = rest;
        Ok(Some(Field {
            tag: header[0],
            kind: header[1],
            body,
        }))
    }
}

/// Field splitter enforcing strictly ascending tags
struct Record<'a> {
    cursor: Cursor<'a>,
    last_tag: Option<u8>,
    what: &'static str,
}

impl<'a> Record<'a> {
    fn new(body: &'a [u8], what: &'static str) -> Self {
        Self {
            cursor: Cursor::new(body),
            last_tag: None,
            what,
        }
    }

    fn next_field(&mut self) -> Result<Option<Field<'a>>> {
        let Some(field) = self.cursor.next_field()? else {
            return Ok(None);
        };
        if let Some(last) = self.last_tag {
            if field.tag <= last {
                return Err(MdocxError::InvalidPayload(format!(
                    "{}: tag {} after tag {} (repeated or out of order)",
                    self.what, field.tag, last
                )));
            }
        }
        self.last_tag = Some(field.tag);
        Ok(Some(field))
    }

    fn unknown(&self, field: &Field<'_>) -> MdocxError {
        MdocxError::InvalidPayload(format!("{}: unknown tag {}", self.what, field.tag))
    }
}
