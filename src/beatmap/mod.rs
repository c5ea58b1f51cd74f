pub mod frame;
pub mod generator;
pub mod spectrum;

pub use frame::{
    deserialize_beatmap, frame_at, serialize_beatmap, BandEnergies, FractalBeatmap,
    BEATMAP_RECORD_SIZE,
};
pub use generator::BeatmapGenerator;
