//! Fractal-1: a container for PCM audio with an embedded visualization
//! beatmap and NFT provenance metadata, plus the LZ-Abyss lossy sample coder.

pub mod audio;
pub mod beatmap;
pub mod benchmark;
pub mod codec;
pub mod config;
pub mod error;
pub mod lz_abyss;
pub mod verify;

pub use audio::buffer::AudioBuffer;
pub use beatmap::{BeatmapGenerator, FractalBeatmap};
pub use codec::{decode, encode, DecodedFractal, Fractal1Codec, FractalMetadata};
pub use error::{CodecError, Result};
