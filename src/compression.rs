// SPDX-License-Identifier: MIT
//! Per-section compression envelope
//!
//! Every compressed payload is framed as
//! `[u64 LE uncompressed length][codec bytes]`. The declared length is checked
//! against the caller's ceiling before any decompression runs, and the codec
//! is handed that length as a hard output bound, so a hostile stream cannot
//! expand past it no matter how the underlying algorithm behaves.

use std::io::{Cursor, Read, Write};

use crate::error::{MdocxError, Result};
use crate::format::section_flags;

/// Name of the single entry inside a ZIP envelope
pub const ZIP_ENTRY_NAME: &str = "payload.gob";

/// Length of the uncompressed-size prefix
pub const UNCOMPRESSED_LEN_PREFIX: usize = 8;

/// Section compression ids as stored in the low 4 bits of the section flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum Compression {
    /// Raw payload, no length prefix
    None = 0,
    /// Single-entry ZIP archive (DEFLATE)
    Zip = 1,
    /// Zstandard, the balanced default
    #[default]
    Zstd = 2,
    /// LZ4 block format, fastest
    Lz4 = 3,
    /// Brotli, best ratio
    Brotli = 4,
}

impl Compression {
    /// All compression ids in wire order
    pub fn all() -> &'static [Compression] {
        &[
            Compression::None,
            Compression::Zip,
            Compression::Zstd,
            Compression::Lz4,
            Compression::Brotli,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Zip => "zip",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
            Compression::Brotli => "br",
        }
    }

    /// Built-in codec for this id; `None` for [`Compression::None`]
    pub fn codec(&self) -> Option<&'static dyn PayloadCodec> {
        match self {
            Compression::None => None,
            Compression::Zip => Some(&ZipCodec),
            Compression::Zstd => Some(&ZSTD_DEFAULT),
            Compression::Lz4 => Some(&Lz4Codec),
            Compression::Brotli => Some(&BROTLI_DEFAULT),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u16> for Compression {
    type Error = MdocxError;

    fn try_from(id: u16) -> Result<Self> {
        match id {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Zip),
            2 => Ok(Compression::Zstd),
            3 => Ok(Compression::Lz4),
            4 => Ok(Compression::Brotli),
            other => Err(MdocxError::InvalidSection(format!(
                "unknown compression {other}"
            ))),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "zip" => Ok(Compression::Zip),
            "zstd" => Ok(Compression::Zstd),
            "lz4" => Ok(Compression::Lz4),
            "br" | "brotli" => Ok(Compression::Brotli),
            other => Err(format!("unknown compression: {other}")),
        }
    }
}

/// A compression algorithm behind the envelope.
///
/// `decompress` must never produce more than `expected` bytes; the envelope
/// checks for an exact match afterwards.
pub trait PayloadCodec {
    fn compress(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    fn decompress(&self, data: &[u8], expected: u64) -> Result<Vec<u8>>;
}

/// Frame `plaintext` with the built-in codec for `compression`.
///
/// Returns the section flags and the stored payload.
pub fn compress_payload(compression: Compression, plaintext: Vec<u8>) -> Result<(u16, Vec<u8>)> {
    match compression.codec() {
        None => Ok((Compression::None as u16, plaintext)),
        Some(codec) => compress_payload_with(compression, codec, &plaintext),
    }
}

/// Frame `plaintext` with an explicit codec, recording `compression` in the flags
pub fn compress_payload_with(
    compression: Compression,
    codec: &dyn PayloadCodec,
    plaintext: &[u8],
) -> Result<(u16, Vec<u8>)> {
    if compression == Compression::None {
        return Ok((Compression::None as u16, plaintext.to_vec()));
    }

    let compressed = codec.compress(plaintext)?;
    let mut payload = Vec::with_capacity(UNCOMPRESSED_LEN_PREFIX + compressed.len());
    payload.extend_from_slice(&(plaintext.len() as u64).to_le_bytes());
    payload.extend_from_slice(&compressed);

    let flags = compression as u16 | section_flags::HAS_UNCOMPRESSED_LEN;
    Ok((flags, payload))
}

/// Open an envelope with the built-in codec for `compression`
pub fn decompress_payload(
    compression: Compression,
    flags: u16,
    payload: Vec<u8>,
    max_uncompressed: u64,
) -> Result<Vec<u8>> {
    match compression.codec() {
        None => decompress_none(flags, payload, max_uncompressed),
        Some(codec) => decompress_payload_with(codec, flags, &payload, max_uncompressed),
    }
}

fn decompress_none(flags: u16, payload: Vec<u8>, max_uncompressed: u64) -> Result<Vec<u8>> {
    if (flags & section_flags::HAS_UNCOMPRESSED_LEN) != 0 {
        return Err(MdocxError::InvalidPayload(
            "COMP_NONE with HAS_UNCOMPRESSED_LEN".into(),
        ));
    }
    if payload.len() as u64 > max_uncompressed {
        return Err(MdocxError::LimitExceeded(format!(
            "uncompressed length {} exceeds limit {}",
            payload.len(),
            max_uncompressed
        )));
    }
    Ok(payload)
}

/// Open a length-prefixed envelope with an explicit codec
pub fn decompress_payload_with(
    codec: &dyn PayloadCodec,
    flags: u16,
    payload: &[u8],
    max_uncompressed: u64,
) -> Result<Vec<u8>> {
    if (flags & section_flags::HAS_UNCOMPRESSED_LEN) == 0 {
        return Err(MdocxError::InvalidPayload(
            "missing HAS_UNCOMPRESSED_LEN".into(),
        ));
    }
    if payload.len() < UNCOMPRESSED_LEN_PREFIX {
        return Err(MdocxError::InvalidPayload(
            "payload too short for uncompressed length".into(),
        ));
    }

    let (prefix, compressed) = payload.split_at(UNCOMPRESSED_LEN_PREFIX);
    let mut len_bytes = [0u8; UNCOMPRESSED_LEN_PREFIX];
    len_bytes.copy_from_slice(prefix);
    let declared = u64::from_le_bytes(len_bytes);

    // Only the untrusted declared length is known at this point
    if declared > max_uncompressed {
        return Err(MdocxError::LimitExceeded(format!(
            "uncompressed length {declared} exceeds limit {max_uncompressed}"
        )));
    }
    if usize::try_from(declared).is_err() {
        return Err(MdocxError::LimitExceeded(format!(
            "uncompressed length {declared} does not fit in memory"
        )));
    }

    let out = codec.decompress(compressed, declared)?;
    if out.len() as u64 != declared {
        tracing::trace!(declared, actual = out.len(), "envelope length mismatch");
        return Err(MdocxError::InvalidPayload(format!(
            "decompressed length {} != expected {}",
            out.len(),
            declared
        )));
    }
    Ok(out)
}

/// Upfront reservation for streamed codecs; the rest grows with real output
const MAX_INITIAL_CAPACITY: u64 = 1 << 20;

/// Read at most `expected + 1` bytes so an overrun is detectable without
/// buffering the whole overrun.
fn read_bounded<R: Read>(reader: R, expected: u64, codec: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected.min(MAX_INITIAL_CAPACITY) as usize);
    reader
        .take(expected.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| MdocxError::InvalidPayload(format!("{codec}: {e}")))?;
    if out.len() as u64 > expected {
        return Err(MdocxError::InvalidPayload(format!(
            "{codec} expanded beyond expected size"
        )));
    }
    Ok(out)
}

/// Deflate inside a one-entry ZIP archive
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl PayloadCodec for ZipCodec {
    fn compress(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        use zip::write::SimpleFileOptions;

        let zip_err = |e: zip::result::ZipError| MdocxError::InvalidPayload(format!("zip: {e}"));

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .large_file(plaintext.len() as u64 >= u32::MAX as u64);

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::with_capacity(plaintext.len() / 2)));
        writer.start_file(ZIP_ENTRY_NAME, options).map_err(zip_err)?;
        writer
            .write_all(plaintext)
            .map_err(|e| MdocxError::InvalidPayload(format!("zip: {e}")))?;
        let cursor = writer.finish().map_err(zip_err)?;
        Ok(cursor.into_inner())
    }

    fn decompress(&self, data: &[u8], expected: u64) -> Result<Vec<u8>> {
        let zip_err = |e: zip::result::ZipError| MdocxError::InvalidPayload(format!("zip: {e}"));

        let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(zip_err)?;
        if archive.len() != 1 {
            return Err(MdocxError::InvalidPayload(
                "zip must contain exactly one entry".into(),
            ));
        }

        let entry = archive.by_index(0).map_err(zip_err)?;
        if entry.name() != ZIP_ENTRY_NAME {
            return Err(MdocxError::InvalidPayload(format!(
                "zip entry name must be {ZIP_ENTRY_NAME}"
            )));
        }
        if entry.is_dir() {
            return Err(MdocxError::InvalidPayload("zip entry must be a file".into()));
        }
        if entry.size() != expected {
            return Err(MdocxError::InvalidPayload(format!(
                "zip uncompressed size {} != expected {}",
                entry.size(),
                expected
            )));
        }

        read_bounded(entry, expected, "zip")
    }
}

/// Zstandard at a fixed level
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec {
    pub level: i32,
}

const ZSTD_DEFAULT: ZstdCodec = ZstdCodec { level: 3 };

impl Default for ZstdCodec {
    fn default() -> Self {
        ZSTD_DEFAULT
    }
}

impl PayloadCodec for ZstdCodec {
    fn compress(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(plaintext, self.level)
            .map_err(|e| MdocxError::InvalidPayload(format!("zstd: {e}")))
    }

    fn decompress(&self, data: &[u8], expected: u64) -> Result<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::with_buffer(data)
            .map_err(|e| MdocxError::InvalidPayload(format!("zstd: {e}")))?;
        read_bounded(decoder, expected, "zstd")
    }
}

const LZ4_MAX_RATIO: u64 = 256;

/// LZ4 block format; the envelope length doubles as the block size
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Codec;

impl PayloadCodec for Lz4Codec {
    fn compress(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::block::compress(plaintext))
    }

    fn decompress(&self, data: &[u8], expected: u64) -> Result<Vec<u8>> {
        // a block cannot expand past ~255x, so larger claims are rejected unallocated
        if expected > (data.len() as u64).saturating_mul(LZ4_MAX_RATIO) {
            return Err(MdocxError::InvalidPayload(format!(
                "lz4: {} bytes cannot expand to {expected}",
                data.len()
            )));
        }
        lz4_flex::block::decompress(data, expected as usize)
            .map_err(|e| MdocxError::InvalidPayload(format!("lz4: {e:?}")))
    }
}

/// Brotli with explicit quality and window
#[derive(Debug, Clone, Copy)]
pub struct BrotliCodec {
    pub quality: i32,
    pub lgwin: i32,
}

const BROTLI_DEFAULT: BrotliCodec = BrotliCodec {
    quality: 6,
    lgwin: 22,
};

impl Default for BrotliCodec {
    fn default() -> Self {
        BROTLI_DEFAULT
    }
}

impl PayloadCodec for BrotliCodec {
    fn compress(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let params = brotli::enc::BrotliEncoderParams {
            quality: self.quality,
            lgwin: self.lgwin,
            ..Default::default()
        };
        let mut out = Vec::with_capacity(plaintext.len() / 2);
        brotli::BrotliCompress(&mut &plaintext[..], &mut out, &params)
            .map_err(|e| MdocxError::InvalidPayload(format!("brotli: {e}")))?;
        Ok(out)
    }

    fn decompress(&self, data: &[u8], expected: u64) -> Result<Vec<u8>> {
        read_bounded(brotli::Decompressor::new(data, 4096), expected, "brotli")
    }
}
