pub mod container;
pub mod header;

pub use container::{parse_container, Fractal1Codec, ParsedContainer};
pub use header::{
    DecodedFractal, Fractal1Header, FractalMetadata, FractalSegment, NftMetadata, ProvenanceEntry,
};

use crate::audio::buffer::AudioBuffer;
use crate::error::Result;

/// Encode with the default analysis and segmentation settings.
pub fn encode(buffer: &AudioBuffer, metadata: &FractalMetadata) -> Result<Vec<u8>> {
    Fractal1Codec::default().encode(buffer, metadata)
}

pub fn decode(data: &[u8]) -> Result<DecodedFractal> {
    Fractal1Codec::default().decode(data)
}
