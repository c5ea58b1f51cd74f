use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::{CodecError, Result};

/// Bytes per record in the compact form: f32 timestamp + bass, mid, high, beat.
pub const BEATMAP_RECORD_SIZE: usize = 8;

/// Summed band energy above which a window counts as a full beat.
pub const BEAT_THRESHOLD: f32 = 0.7;

/// Averaged magnitude per band for one analysis window, before 8-bit scaling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergies {
    pub bass: f32,
    pub mid: f32,
    pub high: f32,
}

impl BandEnergies {
    pub fn total(&self) -> f32 {
        self.bass + self.mid + self.high
    }
}

/// One 50 ms step of the visual-reactivity signal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FractalBeatmap {
    pub timestamp: f32,
    pub bass: u8,
    pub mid: u8,
    pub high: u8,
    pub beat: u8,
    pub color_r: u8,
    pub color_g: u8,
    pub color_b: u8,
}

impl FractalBeatmap {
    /// Scale a window's band energies into a record, with blended colors.
    pub fn from_energies(timestamp: f32, energies: &BandEnergies) -> Self {
        let bass = energy_to_byte(energies.bass);
        let mid = energy_to_byte(energies.mid);
        let high = energy_to_byte(energies.high);
        let (color_r, color_g, color_b) = blend_colors(bass, mid, high);

        Self {
            timestamp,
            bass,
            mid,
            high,
            beat: beat_strength(energies.total()),
            color_r,
            color_g,
            color_b,
        }
    }

    /// Record as read back from the compact form: colors are plain copies of
    /// the band values.
    pub fn from_compact(timestamp: f32, bass: u8, mid: u8, high: u8, beat: u8) -> Self {
        Self {
            timestamp,
            bass,
            mid,
            high,
            beat,
            color_r: bass,
            color_g: mid,
            color_b: high,
        }
    }

    /// The blended display colors for this record's band values, regardless
    /// of what is stored in `color_*`.
    pub fn blended_colors(&self) -> (u8, u8, u8) {
        blend_colors(self.bass, self.mid, self.high)
    }
}

/// `min(255, floor(energy * 255))`.
pub fn energy_to_byte(energy: f32) -> u8 {
    (energy * 255.0).floor().clamp(0.0, 255.0) as u8
}

/// Fixed-threshold beat heuristic on the unscaled summed band energy. Not an
/// onset detector: loud sustained passages read as a constant beat.
pub fn beat_strength(total_energy: f32) -> u8 {
    if total_energy > BEAT_THRESHOLD {
        255
    } else {
        energy_to_byte(total_energy)
    }
}

pub fn blend_colors(bass: u8, mid: u8, high: u8) -> (u8, u8, u8) {
    let mix = |base: u8, other: u8, weight: f64| -> u8 {
        (base as f64 + (other as f64 * weight).floor()).min(255.0) as u8
    };
    (
        mix(bass, mid, 0.3),
        mix(mid, high, 0.2),
        mix(high, bass, 0.1),
    )
}

/// Compact form: 8 bytes per record, colors dropped.
pub fn serialize_beatmap(beatmap: &[FractalBeatmap]) -> Vec<u8> {
    let mut out = Vec::with_capacity(beatmap.len() * BEATMAP_RECORD_SIZE);
    for b in beatmap {
        out.extend_from_slice(&b.timestamp.to_le_bytes());
        out.extend_from_slice(&[b.bass, b.mid, b.high, b.beat]);
    }
    out
}

/// Inverse of [`serialize_beatmap`]. The blended colors are not recoverable;
/// each record gets `color_r/g/b = bass/mid/high`.
pub fn deserialize_beatmap(data: &[u8]) -> Result<Vec<FractalBeatmap>> {
    if data.len() % BEATMAP_RECORD_SIZE != 0 {
        return Err(CodecError::MalformedBeatmap { len: data.len() });
    }

    let mut cursor = Cursor::new(data);
    let mut beatmap = Vec::with_capacity(data.len() / BEATMAP_RECORD_SIZE);
    for _ in 0..data.len() / BEATMAP_RECORD_SIZE {
        let record = read_record(&mut cursor)
            .map_err(|_| CodecError::MalformedBeatmap { len: data.len() })?;
        beatmap.push(record);
    }
    Ok(beatmap)
}

fn read_record(cursor: &mut Cursor<&[u8]>) -> std::io::Result<FractalBeatmap> {
    let timestamp = cursor.read_f32::<LittleEndian>()?;
    let bass = cursor.read_u8()?;
    let mid = cursor.read_u8()?;
    let high = cursor.read_u8()?;
    let beat = cursor.read_u8()?;
    Ok(FractalBeatmap::from_compact(timestamp, bass, mid, high, beat))
}

/// The record closest in time to `time`; the earliest one wins a tie.
pub fn frame_at(beatmap: &[FractalBeatmap], time: f32) -> Option<&FractalBeatmap> {
    let mut best: Option<(&FractalBeatmap, f32)> = None;
    for b in beatmap {
        let diff = (b.timestamp - time).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((b, diff)),
        }
    }
    best.map(|(b, _)| b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: f32, bass: u8, mid: u8, high: u8, beat: u8) -> FractalBeatmap {
        let (color_r, color_g, color_b) = blend_colors(bass, mid, high);
        FractalBeatmap {
            timestamp,
            bass,
            mid,
            high,
            beat,
            color_r,
            color_g,
            color_b,
        }
    }

    #[test]
    fn beat_threshold_is_strict() {
        let at = BandEnergies { bass: 0.7, mid: 0.0, high: 0.0 };
        assert_eq!(at.total(), BEAT_THRESHOLD);
        let frame = FractalBeatmap::from_energies(0.0, &at);
        assert_ne!(frame.beat, 255);
        assert_eq!(frame.beat, (0.7f32 * 255.0).floor() as u8);

        let above = BandEnergies { bass: 0.7001, mid: 0.0, high: 0.0 };
        assert_eq!(FractalBeatmap::from_energies(0.0, &above).beat, 255);
    }

    #[test]
    fn beat_scales_below_threshold() {
        assert_eq!(beat_strength(0.0), 0);
        assert_eq!(beat_strength(0.5), 127);
        assert_eq!(beat_strength(0.71), 255);
        assert_eq!(beat_strength(3.0), 255);
    }

    #[test]
    fn energy_saturates() {
        assert_eq!(energy_to_byte(0.0), 0);
        assert_eq!(energy_to_byte(0.5), 127);
        assert_eq!(energy_to_byte(1.0), 255);
        assert_eq!(energy_to_byte(7.5), 255);
    }

    #[test]
    fn colors_blend_and_saturate() {
        assert_eq!(blend_colors(105, 55, 16), (121, 58, 26));
        assert_eq!(blend_colors(250, 255, 255), (255, 255, 255));
        assert_eq!(blend_colors(0, 0, 0), (0, 0, 0));
    }

    #[test]
    fn compact_round_trip_resets_colors() {
        let beatmap = vec![
            record(0.0, 10, 200, 30, 178),
            record(0.05, 255, 0, 128, 255),
            record(0.1, 1, 2, 3, 4),
        ];
        let bytes = serialize_beatmap(&beatmap);
        assert_eq!(bytes.len(), beatmap.len() * BEATMAP_RECORD_SIZE);

        let back = deserialize_beatmap(&bytes).unwrap();
        assert_eq!(back.len(), beatmap.len());
        for (orig, got) in beatmap.iter().zip(&back) {
            assert_eq!(got.timestamp, orig.timestamp);
            assert_eq!(got.bass, orig.bass);
            assert_eq!(got.mid, orig.mid);
            assert_eq!(got.high, orig.high);
            assert_eq!(got.beat, orig.beat);
            assert_eq!((got.color_r, got.color_g, got.color_b), (orig.bass, orig.mid, orig.high));
        }
        // The blended values differ from the placeholders once mixing kicks in.
        assert_ne!(back[0].color_r, beatmap[0].color_r);
        assert_eq!(back[0].blended_colors(), (beatmap[0].color_r, beatmap[0].color_g, beatmap[0].color_b));
    }

    #[test]
    fn record_layout_is_little_endian() {
        let bytes = serialize_beatmap(&[record(1.5, 1, 2, 3, 4)]);
        assert_eq!(&bytes[..4], &1.5f32.to_le_bytes());
        assert_eq!(&bytes[4..], &[1, 2, 3, 4]);
    }

    #[test]
    fn rejects_partial_record() {
        let err = deserialize_beatmap(&[0u8; 12]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedBeatmap { len: 12 }));
        assert!(deserialize_beatmap(&[]).unwrap().is_empty());
    }

    #[test]
    fn frame_at_picks_nearest() {
        let beatmap = vec![record(0.0, 1, 0, 0, 0), record(0.05, 2, 0, 0, 0), record(0.1, 3, 0, 0, 0)];
        assert_eq!(frame_at(&beatmap, 0.06).unwrap().bass, 2);
        assert_eq!(frame_at(&beatmap, 5.0).unwrap().bass, 3);
        assert_eq!(frame_at(&beatmap, -1.0).unwrap().bass, 1);
        assert!(frame_at(&[], 0.0).is_none());
    }
}
