//! Fractal-1 container types and layout constants.
//!
//! ```text
//! "FRACT1" | version u32 | header_len u32 | header JSON
//!          | beatmap_len u32 | beatmap records (8 bytes each)
//!          | segment table (21 bytes per segment)
//!          | audio data (segments back to back, f32 LE PCM)
//! ```
//!
//! All integers are little-endian.

use serde::{Deserialize, Serialize};

use crate::audio::buffer::AudioBuffer;
use crate::beatmap::FractalBeatmap;

pub const MAGIC: &[u8; 6] = b"FRACT1";
pub const VERSION: u32 = 1;

/// index u32 + offset u64 + size u32 + timestamp f32 + compressed u8.
pub const SEGMENT_RECORD_SIZE: usize = 4 + 8 + 4 + 4 + 1;

/// Bytes before the header JSON: magic, version, header length.
pub const PREAMBLE_SIZE: usize = MAGIC.len() + 4 + 4;

/// Descriptive track data plus the facts copied from the audio at encode time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FractalMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub sample_rate: u32,
    #[serde(default)]
    pub channels: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_metadata: Option<NftMetadata>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftMetadata {
    pub owner: String,
    /// 0-100.
    pub royalty_percentage: u8,
    /// Oldest first.
    #[serde(default)]
    pub provenance: Vec<ProvenanceEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceEntry {
    pub owner: String,
    pub tx_hash: String,
    /// Unix seconds.
    pub timestamp: u64,
}

impl FractalMetadata {
    /// Copy of `self` with duration, sample rate and channel count taken from
    /// `buffer`.
    pub fn for_buffer(&self, buffer: &AudioBuffer) -> Self {
        Self {
            duration: buffer.duration(),
            sample_rate: buffer.sample_rate,
            channels: buffer.channel_count() as u32,
            ..self.clone()
        }
    }
}

/// One row of the segment table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FractalSegment {
    pub index: u32,
    /// Byte offset from the start of the audio-data region.
    pub offset: u64,
    /// Byte length.
    pub size: u32,
    /// Seconds from the start of the track.
    pub timestamp: f32,
    pub compressed: bool,
}

impl FractalSegment {
    /// End offset within the audio-data region, exclusive. `None` when the
    /// offset is so large the sum overflows.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size as u64)
    }
}

/// The JSON header. `segment_table_offset` and `audio_data_offset` are
/// absolute positions in the container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fractal1Header {
    pub magic: String,
    pub version: u32,
    pub metadata: FractalMetadata,
    pub beatmap_size: u64,
    pub segment_count: u32,
    pub segment_table_offset: u64,
    pub audio_data_offset: u64,
}

impl Fractal1Header {
    pub fn new(metadata: FractalMetadata, beatmap_size: usize, segment_count: usize) -> Self {
        Self {
            magic: String::from_utf8_lossy(MAGIC).into_owned(),
            version: VERSION,
            metadata,
            beatmap_size: beatmap_size as u64,
            segment_count: segment_count as u32,
            segment_table_offset: 0,
            audio_data_offset: 0,
        }
    }

    /// Set both offsets for a header whose JSON is `header_len` bytes long.
    pub fn place(&mut self, header_len: usize) {
        self.segment_table_offset = (PREAMBLE_SIZE + header_len + 4) as u64 + self.beatmap_size;
        self.audio_data_offset =
            self.segment_table_offset + self.segment_count as u64 * SEGMENT_RECORD_SIZE as u64;
    }
}

/// Everything recovered from a container.
#[derive(Clone, Debug)]
pub struct DecodedFractal {
    pub metadata: FractalMetadata,
    pub audio: AudioBuffer,
    pub beatmap: Vec<FractalBeatmap>,
    pub segments: Vec<FractalSegment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_size() {
        assert_eq!(SEGMENT_RECORD_SIZE, 21);
        assert_eq!(PREAMBLE_SIZE, 14);
    }

    #[test]
    fn segment_end_checks_overflow() {
        let mut seg = FractalSegment {
            index: 0,
            offset: 100,
            size: 20,
            timestamp: 0.0,
            compressed: true,
        };
        assert_eq!(seg.end(), Some(120));
        seg.offset = u64::MAX - 1;
        assert_eq!(seg.end(), None);
    }

    #[test]
    fn place_computes_offsets() {
        let mut header = Fractal1Header::new(FractalMetadata::default(), 80, 3);
        header.place(100);
        assert_eq!(header.segment_table_offset, 6 + 4 + 4 + 100 + 4 + 80);
        assert_eq!(header.audio_data_offset, header.segment_table_offset + 3 * 21);
    }

    #[test]
    fn json_uses_camel_case() {
        let metadata = FractalMetadata {
            title: Some("Abyss".into()),
            sample_rate: 44100,
            channels: 2,
            duration: 1.5,
            nft_metadata: Some(NftMetadata {
                owner: "alice".into(),
                royalty_percentage: 10,
                provenance: vec![ProvenanceEntry {
                    owner: "bob".into(),
                    tx_hash: "0xabc".into(),
                    timestamp: 1_700_000_000,
                }],
            }),
            ..FractalMetadata::default()
        };
        let header = Fractal1Header::new(metadata, 16, 2);
        let json = serde_json::to_value(&header).unwrap();

        assert_eq!(json["magic"], "FRACT1");
        assert_eq!(json["version"], 1);
        assert_eq!(json["beatmapSize"], 16);
        assert_eq!(json["segmentCount"], 2);
        assert_eq!(json["metadata"]["sampleRate"], 44100);
        assert_eq!(json["metadata"]["nftMetadata"]["royaltyPercentage"], 10);
        assert_eq!(json["metadata"]["nftMetadata"]["provenance"][0]["txHash"], "0xabc");
        assert!(json["metadata"].get("artist").is_none());
    }

    #[test]
    fn unknown_header_fields_are_ignored() {
        let json = r#"{
            "magic": "FRACT1", "version": 1,
            "metadata": {"duration": 2.0, "sampleRate": 8000, "channels": 1, "genre": "dub"},
            "beatmapSize": 0, "segmentCount": 0,
            "segmentTableOffset": 0, "audioDataOffset": 0,
            "encoder": "future"
        }"#;
        let header: Fractal1Header = serde_json::from_str(json).unwrap();
        assert_eq!(header.metadata.sample_rate, 8000);
        assert_eq!(header.metadata.title, None);
    }

    #[test]
    fn metadata_takes_buffer_facts() {
        let meta = FractalMetadata {
            artist: Some("Neon".into()),
            sample_rate: 1,
            channels: 9,
            duration: 99.0,
            ..FractalMetadata::default()
        };
        let buffer = AudioBuffer::new(vec![vec![0.0; 4000], vec![0.0; 4000]], 8000);
        let placed = meta.for_buffer(&buffer);
        assert_eq!(placed.artist.as_deref(), Some("Neon"));
        assert_eq!(placed.sample_rate, 8000);
        assert_eq!(placed.channels, 2);
        assert_eq!(placed.duration, 0.5);
    }
}
