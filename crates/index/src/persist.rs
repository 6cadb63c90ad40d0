//! On-disk index file format and content digests.
//!
//! # Layout
//!
//! ```text
//! "STRX" || format_version: u16 (LE) || codec: u8 || payload
//! ```
//!
//! `payload` is the bincode (standard config) encoding of a
//! [`LoadedIndex`], optionally zstd-compressed. Both encodings are
//! deterministic, so identical indices produce identical files and digests.
//!
//! # Digests
//!
//! ```text
//! SHA-256(file_bytes) → lowercase hex
//! ```

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zstd::{decode_all, encode_all};

use crate::{IndexError, LoadedIndex};

pub const INDEX_MAGIC: &[u8; 4] = b"STRX";
/// Bump whenever the encoded index layout changes.
pub const INDEX_FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = 7;

/// Compression codec applied to the encoded payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionCodec {
    None,
    #[default]
    Zstd,
}

impl CompressionCodec {
    fn tag(self) -> u8 {
        match self {
            CompressionCodec::None => 0,
            CompressionCodec::Zstd => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, IndexError> {
        match tag {
            0 => Ok(CompressionCodec::None),
            1 => Ok(CompressionCodec::Zstd),
            other => Err(IndexError::Corrupt(format!("unknown codec tag {other}"))),
        }
    }
}

/// Compression behavior for written index files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub codec: CompressionCodec,
    /// Zstd level (1-22).
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.codec == CompressionCodec::Zstd && !(1..=22).contains(&self.level) {
            return Err(IndexError::invalid(format!(
                "zstd level must be within [1, 22], got {}",
                self.level
            )));
        }
        Ok(())
    }

    fn compress(&self, data: Vec<u8>) -> Result<Vec<u8>, IndexError> {
        match self.codec {
            CompressionCodec::None => Ok(data),
            CompressionCodec::Zstd => Ok(encode_all(data.as_slice(), self.level)?),
        }
    }
}

/// SHA-256 of `bytes` as 64 lowercase hex characters.
pub fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Whether `digest` has the shape produced by [`digest_hex`].
pub fn is_digest(digest: &str) -> bool {
    digest.len() == 64
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

pub fn encode_index(index: &LoadedIndex, compression: &CompressionConfig) -> Result<Vec<u8>, IndexError> {
    let payload = compression.compress(encode_to_vec(index, standard())?)?;
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(INDEX_MAGIC);
    out.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
    out.push(compression.codec.tag());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode_index(bytes: &[u8]) -> Result<LoadedIndex, IndexError> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != INDEX_MAGIC {
        return Err(IndexError::Corrupt("missing index file magic".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != INDEX_FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!(
            "unsupported index format version {version}"
        )));
    }
    let payload = &bytes[HEADER_LEN..];
    let decoded;
    let raw = match CompressionCodec::from_tag(bytes[6])? {
        CompressionCodec::None => payload,
        CompressionCodec::Zstd => {
            decoded = decode_all(payload)
                .map_err(|e| IndexError::Corrupt(format!("zstd: {e}")))?;
            decoded.as_slice()
        }
    };
    let (index, read) = decode_from_slice(raw, standard())?;
    if read != raw.len() {
        return Err(IndexError::Corrupt(format!(
            "{} trailing bytes after index payload",
            raw.len() - read
        )));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GraphParams, IndexBuilder, BuilderConfig, InMemoryArtifactStore, Level, VectorRecord};
    use std::sync::Arc;

    fn small_index() -> LoadedIndex {
        let records: Vec<VectorRecord> = (0..20)
            .map(|i| {
                let angle = i as f32 * 0.3;
                VectorRecord::new(format!("s{i:02}"), Level::Sentence, vec![angle.cos(), angle.sin()])
            })
            .collect();
        let builder = IndexBuilder::new(
            BuilderConfig::new(2),
            Arc::new(InMemoryArtifactStore::new()),
        );
        builder
            .build_graph(Level::Sentence, &records, GraphParams::default().with_m(16).with_ef_construction(32))
            .unwrap()
            .index
    }

    #[test]
    fn digest_is_sha256_hex() {
        let digest = digest_hex(b"hello world");
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(is_digest(&digest));
        assert!(!is_digest("B94D"));
        assert!(!is_digest(&digest.to_uppercase()));
    }

    #[test]
    fn both_codecs_decode() {
        let index = small_index();
        for codec in [CompressionCodec::None, CompressionCodec::Zstd] {
            let bytes = encode_index(&index, &CompressionConfig::default().with_codec(codec)).unwrap();
            assert_eq!(&bytes[..4], INDEX_MAGIC);
            assert_eq!(decode_index(&bytes).unwrap(), index);
        }
    }

    #[test]
    fn header_damage_is_corrupt() {
        let index = small_index();
        let bytes = encode_index(&index, &CompressionConfig::default()).unwrap();

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(decode_index(&bad_magic), Err(IndexError::Corrupt(_))));

        let mut bad_version = bytes.clone();
        bad_version[4] = 9;
        assert!(matches!(decode_index(&bad_version), Err(IndexError::Corrupt(_))));

        let mut bad_codec = bytes.clone();
        bad_codec[6] = 7;
        assert!(matches!(decode_index(&bad_codec), Err(IndexError::Corrupt(_))));

        assert!(decode_index(&bytes[..3]).is_err());
    }

    #[test]
    fn zstd_level_is_checked() {
        assert!(CompressionConfig::default().with_level(0).validate().is_err());
        CompressionConfig::new(CompressionCodec::None, 0).validate().unwrap();
    }
}
