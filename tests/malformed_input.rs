// SPDX-License-Identifier: MIT
//! Hostile and damaged inputs must fail with the right error kind

use mdocx::compression::{compress_payload, Compression};
use mdocx::format::section_flags::HAS_UNCOMPRESSED_LEN;
use mdocx::payload::{encode_markdown_bundle, encode_media_bundle};
use mdocx::{
    decode_from_slice, encode_to_vec, DecodeOptions, Document, EncodeOptions, ErrorKind,
    FixedHeader, Limits, MarkdownBundle, MarkdownFile, MdocxError, MediaBundle, MediaItem,
    SectionHeader, FIXED_HEADER_SIZE, SECTION_HEADER_SIZE,
};

struct Section {
    section_type: u16,
    flags: u16,
    payload: Vec<u8>,
}

impl Section {
    fn markdown(compression: Compression, bundle: &MarkdownBundle) -> Self {
        let (flags, payload) = compress_payload(compression, encode_markdown_bundle(bundle)).unwrap();
        Self {
            section_type: 1,
            flags,
            payload,
        }
    }

    fn media(compression: Compression, bundle: &MediaBundle) -> Self {
        let (flags, payload) = compress_payload(compression, encode_media_bundle(bundle)).unwrap();
        Self {
            section_type: 2,
            flags,
            payload,
        }
    }

    fn raw(section_type: u16, flags: u16, payload: Vec<u8>) -> Self {
        Self {
            section_type,
            flags,
            payload,
        }
    }
}

fn container(metadata: &[u8], sections: &[Section]) -> Vec<u8> {
    let mut out = FixedHeader::new(metadata.len() as u32).to_bytes().to_vec();
    out.extend_from_slice(metadata);
    for section in sections {
        let header = SectionHeader {
            section_type: section.section_type,
            section_flags: section.flags,
            payload_len: section.payload.len() as u64,
            reserved: 0,
        };
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&section.payload);
    }
    out
}

fn hello() -> MarkdownBundle {
    MarkdownBundle::new(vec![MarkdownFile::new("readme.md", "# Hello\n")])
}

fn valid_file() -> Vec<u8> {
    let doc = Document::new(hello().files)
        .with_media(vec![MediaItem::new("logo", "image/png", vec![7; 64])]);
    encode_to_vec(&doc, &EncodeOptions::default()).unwrap()
}

fn kind_of(bytes: &[u8]) -> ErrorKind {
    decode_from_slice(bytes, &DecodeOptions::default())
        .expect_err("decode should fail")
        .kind()
}

#[test]
fn test_any_magic_bit_flip_is_invalid_magic() {
    let original = valid_file();
    for byte in 0..8 {
        for bit in 0..8 {
            let mut bytes = original.clone();
            bytes[byte] ^= 1 << bit;
            assert_eq!(kind_of(&bytes), ErrorKind::InvalidMagic, "byte {byte} bit {bit}");
        }
    }
}

#[test]
fn test_unsupported_versions() {
    for version in [0u16, 2, 3, 0x0100, u16::MAX] {
        let mut bytes = valid_file();
        bytes[8..10].copy_from_slice(&version.to_le_bytes());
        match decode_from_slice(&bytes, &DecodeOptions::default()) {
            Err(MdocxError::UnsupportedVersion(v)) => assert_eq!(v, version),
            other => panic!("version {version}: {other:?}"),
        }
    }
}

#[test]
fn test_fixed_header_fields() {
    for offset in 20..32 {
        let mut bytes = valid_file();
        bytes[offset] = 1;
        assert_eq!(kind_of(&bytes), ErrorKind::InvalidHeader, "reserved byte {offset}");
    }

    let mut bytes = valid_file();
    bytes[12..16].copy_from_slice(&64u32.to_le_bytes());
    assert_eq!(kind_of(&bytes), ErrorKind::InvalidHeader);
}

#[test]
fn test_section_reserved_field() {
    let original = valid_file();
    let markdown_header = FIXED_HEADER_SIZE;
    let markdown_len = u64::from_le_bytes(original[36..44].try_into().unwrap()) as usize;
    let media_header = markdown_header + SECTION_HEADER_SIZE + markdown_len;

    for header in [markdown_header, media_header] {
        let mut bytes = original.clone();
        bytes[header + 12] = 1;
        assert_eq!(kind_of(&bytes), ErrorKind::InvalidSection, "header at {header}");
    }
}

#[test]
fn test_swapped_sections() {
    let bytes = container(
        &[],
        &[
            Section::media(Compression::None, &MediaBundle::default()),
            Section::markdown(Compression::None, &hello()),
        ],
    );
    assert_eq!(kind_of(&bytes), ErrorKind::InvalidSection);
}

#[test]
fn test_inconsistent_section_flags() {
    let payload = encode_markdown_bundle(&hello());
    let media = || Section::media(Compression::None, &MediaBundle::default());

    for flags in [
        0x0005 | HAS_UNCOMPRESSED_LEN, // unknown id
        0x000F,                        // unknown id
        HAS_UNCOMPRESSED_LEN,          // none with length
        Compression::Zstd as u16,      // zstd without length
        Compression::Brotli as u16,
    ] {
        let bytes = container(&[], &[Section::raw(1, flags, payload.clone()), media()]);
        assert_eq!(kind_of(&bytes), ErrorKind::InvalidSection, "flags {flags:#06x}");
    }
}

#[test]
fn test_bomb_guard_rejects_before_decompressing() {
    // junk after the prefix: reaching the codec would be InvalidPayload
    let mut payload = (1u64 << 40).to_le_bytes().to_vec();
    payload.extend_from_slice(&[0xAB; 32]);

    for compression in [Compression::Zip, Compression::Zstd, Compression::Lz4, Compression::Brotli] {
        let flags = compression as u16 | HAS_UNCOMPRESSED_LEN;
        let bytes = container(
            &[],
            &[
                Section::raw(1, flags, payload.clone()),
                Section::media(Compression::None, &MediaBundle::default()),
            ],
        );
        assert_eq!(kind_of(&bytes), ErrorKind::LimitExceeded, "{compression}");
    }
}

#[test]
fn test_uncompressed_ceiling_applies_to_real_streams() {
    let big = MarkdownBundle::new(vec![MarkdownFile::new("a.md", "a".repeat(10_000))]);
    let bytes = container(
        &[],
        &[
            Section::markdown(Compression::Zstd, &big),
            Section::media(Compression::None, &MediaBundle::default()),
        ],
    );
    let options = DecodeOptions::new().with_limits(Limits {
        max_markdown_uncompressed: 1_000,
        ..Limits::unset()
    });

    let err = decode_from_slice(&bytes, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    assert!(decode_from_slice(&bytes, &DecodeOptions::default()).is_ok());
}

#[test]
fn test_declared_length_mismatch() {
    let mut section = Section::markdown(Compression::Zstd, &hello());
    let declared = u64::from_le_bytes(section.payload[..8].try_into().unwrap());
    section.payload[..8].copy_from_slice(&(declared + 1).to_le_bytes());

    let bytes = container(
        &[],
        &[section, Section::media(Compression::None, &MediaBundle::default())],
    );
    assert_eq!(kind_of(&bytes), ErrorKind::InvalidPayload);
}

#[test]
fn test_hash_mismatch_detected_on_decode() {
    let mut item = MediaItem::new("logo", "image/png", vec![1, 2, 3]);
    item.sha256 = [0x5A; 32];
    let doc = Document::new(hello().files).with_media(vec![item]);

    let default_err = encode_to_vec(&doc, &EncodeOptions::default()).unwrap_err();
    assert_eq!(default_err.kind(), ErrorKind::Validation);

    let bytes = encode_to_vec(&doc, &EncodeOptions::new().with_verify_hashes(false)).unwrap();
    let err = decode_from_slice(&bytes, &DecodeOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("logo"));

    let relaxed = DecodeOptions::new().with_verify_hashes(false);
    let decoded = decode_from_slice(&bytes, &relaxed).unwrap();
    assert_eq!(decoded.media.items[0].sha256, [0x5A; 32]);
}

#[test]
fn test_every_truncation_is_an_io_error() {
    let mut metadata = serde_json::Map::new();
    metadata.insert("k".into(), "v".into());
    let doc = Document::new(hello().files)
        .with_metadata(metadata)
        .with_media(vec![MediaItem::new("logo", "image/png", vec![7; 16])]);
    let bytes = encode_to_vec(&doc, &EncodeOptions::default()).unwrap();

    for cut in 0..bytes.len() {
        assert_eq!(kind_of(&bytes[..cut]), ErrorKind::Io, "cut at {cut}");
    }
}

#[test]
fn test_metadata_must_be_object() {
    let sections = || {
        [
            Section::markdown(Compression::None, &hello()),
            Section::media(Compression::None, &MediaBundle::default()),
        ]
    };
    for metadata in ["null", "[1,2]", "\"text\"", "42", "{not json", "{\"a\":1} {"] {
        let bytes = container(metadata.as_bytes(), &sections());
        assert_eq!(kind_of(&bytes), ErrorKind::InvalidHeader, "{metadata}");
    }

    let bytes = container(br#"{"a":1}"#, &sections());
    assert!(decode_from_slice(&bytes, &DecodeOptions::default()).is_ok());
}

#[test]
fn test_metadata_length_ceiling() {
    let metadata = format!(r#"{{"pad":"{}"}}"#, "x".repeat(100));
    let bytes = container(
        metadata.as_bytes(),
        &[
            Section::markdown(Compression::None, &hello()),
            Section::media(Compression::None, &MediaBundle::default()),
        ],
    );
    let options = DecodeOptions::new().with_limits(Limits {
        max_metadata_len: 32,
        ..Limits::unset()
    });
    let err = decode_from_slice(&bytes, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
}

#[test]
fn test_empty_media_section_skips_codec() {
    // zstd with an empty payload would be rejected by the envelope
    let flags = Compression::Zstd as u16 | HAS_UNCOMPRESSED_LEN;
    let bytes = container(
        &[],
        &[
            Section::markdown(Compression::None, &hello()),
            Section::raw(2, flags, Vec::new()),
        ],
    );
    let doc = decode_from_slice(&bytes, &DecodeOptions::default()).unwrap();
    assert_eq!(doc.media, MediaBundle::default());
}

#[test]
fn test_empty_markdown_section_is_invalid_payload() {
    let bytes = container(
        &[],
        &[
            Section::raw(1, 0, Vec::new()),
            Section::media(Compression::None, &MediaBundle::default()),
        ],
    );
    assert_eq!(kind_of(&bytes), ErrorKind::InvalidPayload);
}

#[test]
fn test_garbage_payload() {
    let bytes = container(
        &[],
        &[
            Section::raw(1, 0, b"definitely not a bundle".to_vec()),
            Section::media(Compression::None, &MediaBundle::default()),
        ],
    );
    assert_eq!(kind_of(&bytes), ErrorKind::InvalidPayload);
}

#[test]
fn test_invalid_utf8_markdown_fails_validation() {
    let bundle = MarkdownBundle::new(vec![MarkdownFile::new("a.md", vec![b'#', 0xFF])]);
    let bytes = container(
        &[],
        &[
            Section::markdown(Compression::Lz4, &bundle),
            Section::media(Compression::None, &MediaBundle::default()),
        ],
    );
    assert_eq!(kind_of(&bytes), ErrorKind::Validation);
}

#[test]
fn test_stored_section_ceiling() {
    let bytes = valid_file();
    let options = DecodeOptions::new().with_limits(Limits {
        max_media_section_len: 8,
        ..Limits::unset()
    });
    let err = decode_from_slice(&bytes, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    assert!(err.to_string().contains("media"));
}
