use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{Cursor, Write};

use super::header::{
    DecodedFractal, Fractal1Header, FractalMetadata, FractalSegment, MAGIC, SEGMENT_RECORD_SIZE,
    VERSION,
};
use crate::audio::buffer::AudioBuffer;
use crate::audio::segment::{FixedSegmenter, SegmentedAudio, Segmenter};
use crate::beatmap::{deserialize_beatmap, serialize_beatmap, BeatmapGenerator, FractalBeatmap};
use crate::config::{AnalysisConfig, Config};
use crate::error::{CodecError, Result};

/// Builds and reads Fractal-1 containers.
///
/// Holds no state between calls; one codec can serve any number of
/// independent encodes and decodes.
#[derive(Clone, Debug)]
pub struct Fractal1Codec<S = FixedSegmenter> {
    generator: BeatmapGenerator,
    segmenter: S,
    compress_segments: bool,
}

/// A container split into its parts, before audio reconstruction.
#[derive(Clone, Debug)]
pub struct ParsedContainer<'a> {
    pub header: Fractal1Header,
    pub beatmap: Vec<FractalBeatmap>,
    pub segments: Vec<FractalSegment>,
    /// Everything from `audio_data_offset` to the end of the container.
    pub audio_data: &'a [u8],
}

impl Fractal1Codec<FixedSegmenter> {
    pub fn new(config: &Config) -> Self {
        Self::with_segmenter(
            config.analysis.clone(),
            FixedSegmenter::new(config.encode.segment_frames),
            config.encode.compress_segments,
        )
    }
}

impl Default for Fractal1Codec<FixedSegmenter> {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl<S: Segmenter> Fractal1Codec<S> {
    pub fn with_segmenter(analysis: AnalysisConfig, segmenter: S, compress_segments: bool) -> Self {
        Self {
            generator: BeatmapGenerator::new(analysis),
            segmenter,
            compress_segments,
        }
    }

    pub fn generator(&self) -> &BeatmapGenerator {
        &self.generator
    }

    pub fn encode(&self, buffer: &AudioBuffer, metadata: &FractalMetadata) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        self.encode_to(&mut out, buffer, metadata)?;
        Ok(out.into_inner())
    }

    pub fn encode_to<W: Write>(
        &self,
        writer: &mut W,
        buffer: &AudioBuffer,
        metadata: &FractalMetadata,
    ) -> Result<()> {
        if let Some(nft) = &metadata.nft_metadata {
            if nft.royalty_percentage > 100 {
                return Err(CodecError::InvalidMetadata(format!(
                    "royalty percentage {} exceeds 100",
                    nft.royalty_percentage
                )));
            }
        }

        let beatmap = self.generator.generate(buffer);
        let beatmap_bytes = serialize_beatmap(&beatmap);

        let segmented = self
            .segmenter
            .segment_audio(buffer, self.compress_segments)?;
        check_segment_layout(&segmented)?;

        let mut header = Fractal1Header::new(
            metadata.for_buffer(buffer),
            beatmap_bytes.len(),
            segmented.table.len(),
        );
        let header_bytes = place_header(&mut header)?;

        log::info!(
            "Encoding Fractal-1: {} beatmap records, {} segments, header {} bytes, audio at {}",
            beatmap.len(),
            segmented.table.len(),
            header_bytes.len(),
            header.audio_data_offset
        );

        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(VERSION)?;
        writer.write_u32::<LittleEndian>(len_u32(header_bytes.len(), "header")?)?;
        writer.write_all(&header_bytes)?;
        writer.write_u32::<LittleEndian>(len_u32(beatmap_bytes.len(), "beatmap")?)?;
        writer.write_all(&beatmap_bytes)?;
        for segment in &segmented.table {
            write_segment_record(writer, segment)?;
        }
        for bytes in &segmented.segments {
            writer.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn decode(&self, data: &[u8]) -> Result<DecodedFractal> {
        let parsed = parse_container(data)?;

        let mut pcm = Vec::with_capacity(parsed.segments.len());
        for segment in &parsed.segments {
            let bytes = segment_bytes(parsed.audio_data, segment)?;
            let mut samples = vec![0.0f32; bytes.len() / 4];
            LittleEndian::read_f32_into(bytes, &mut samples);
            pcm.push(samples);
        }

        let metadata = parsed.header.metadata;
        let audio = self
            .segmenter
            .reconstruct_audio(&pcm, metadata.sample_rate, metadata.channels)?;

        log::info!(
            "Decoded Fractal-1: {} frames x {} channels, {} beatmap records",
            audio.frames(),
            audio.channel_count(),
            parsed.beatmap.len()
        );

        Ok(DecodedFractal {
            metadata,
            audio,
            beatmap: parsed.beatmap,
            segments: parsed.segments,
        })
    }
}

/// Split a container into header, beatmap, segment table and audio region,
/// checking every offset against the actual layout.
pub fn parse_container(data: &[u8]) -> Result<ParsedContainer<'_>> {
    let mut reader = ByteReader::new(data);

    let magic = &data[..data.len().min(MAGIC.len())];
    if magic != MAGIC {
        return Err(CodecError::InvalidFormat {
            found: String::from_utf8_lossy(magic).into_owned(),
        });
    }
    reader.take(MAGIC.len())?;

    let version = reader.u32()?;
    if version != VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let header_len = reader.u32()? as usize;
    let header: Fractal1Header = serde_json::from_slice(reader.take(header_len)?)?;
    if header.magic.as_bytes() != MAGIC {
        return Err(CodecError::InvalidFormat {
            found: header.magic,
        });
    }
    if header.version != version {
        return Err(CodecError::UnsupportedVersion(header.version));
    }

    let beatmap_len = reader.u32()? as usize;
    if beatmap_len as u64 != header.beatmap_size {
        return Err(CodecError::MalformedBeatmap { len: beatmap_len });
    }
    let beatmap = deserialize_beatmap(reader.take(beatmap_len)?)?;

    if reader.position() as u64 != header.segment_table_offset {
        return Err(CodecError::MalformedSegmentTable(format!(
            "table starts at byte {}, header says {}",
            reader.position(),
            header.segment_table_offset
        )));
    }
    let table_end = header.segment_table_offset
        + header.segment_count as u64 * SEGMENT_RECORD_SIZE as u64;
    if header.audio_data_offset != table_end {
        return Err(CodecError::MalformedSegmentTable(format!(
            "{} records end at byte {}, audio data declared at {}",
            header.segment_count, table_end, header.audio_data_offset
        )));
    }
    if table_end > data.len() as u64 {
        return Err(CodecError::Truncated {
            needed: table_end as usize,
            available: data.len(),
        });
    }

    let mut segments = Vec::with_capacity(header.segment_count as usize);
    for _ in 0..header.segment_count {
        segments.push(read_segment_record(reader.take(SEGMENT_RECORD_SIZE)?));
    }

    let audio_data = &data[header.audio_data_offset as usize..];
    for segment in &segments {
        let in_bounds = segment
            .end()
            .is_some_and(|end| end <= audio_data.len() as u64);
        if !in_bounds {
            return Err(CodecError::MalformedSegmentTable(format!(
                "segment {} at offset {} with size {} exceeds audio data of {} bytes",
                segment.index,
                segment.offset,
                segment.size,
                audio_data.len()
            )));
        }
        if segment.size % 4 != 0 {
            return Err(CodecError::MalformedSegmentTable(format!(
                "segment {} size {} is not a whole number of f32 samples",
                segment.index, segment.size
            )));
        }
    }

    Ok(ParsedContainer {
        header,
        beatmap,
        segments,
        audio_data,
    })
}

/// Serialize the header with offsets that account for its own length.
///
/// The offsets are stored inside the JSON, so their digit count feeds back
/// into the length. Lengths only grow between rounds, so this settles after a
/// few iterations.
fn place_header(header: &mut Fractal1Header) -> Result<Vec<u8>> {
    let mut len = 0;
    let mut rounds = 0;
    loop {
        header.place(len);
        let bytes = serde_json::to_vec(header)?;
        rounds += 1;
        if bytes.len() == len {
            log::debug!(
                "Header placed after {} rounds: {} bytes, table at {}, audio at {}",
                rounds,
                len,
                header.segment_table_offset,
                header.audio_data_offset
            );
            return Ok(bytes);
        }
        len = bytes.len();
    }
}

/// The table has to describe the segment bytes exactly: one row per chunk,
/// indexed in order, packed back to back.
fn check_segment_layout(segmented: &SegmentedAudio) -> Result<()> {
    if segmented.table.len() != segmented.segments.len() {
        return Err(CodecError::MalformedSegmentTable(format!(
            "{} table rows for {} segments",
            segmented.table.len(),
            segmented.segments.len()
        )));
    }

    let mut expected_offset = 0u64;
    for (i, (row, bytes)) in segmented.table.iter().zip(&segmented.segments).enumerate() {
        if row.index as usize != i || row.offset != expected_offset || row.size as usize != bytes.len()
        {
            return Err(CodecError::MalformedSegmentTable(format!(
                "row {} (index {}, offset {}, size {}) does not address segment of {} bytes at {}",
                i,
                row.index,
                row.offset,
                row.size,
                bytes.len(),
                expected_offset
            )));
        }
        expected_offset += bytes.len() as u64;
    }
    Ok(())
}

/// Bytes of one segment inside the audio-data region.
fn segment_bytes<'a>(audio_data: &'a [u8], segment: &FractalSegment) -> Result<&'a [u8]> {
    segment
        .end()
        .and_then(|end| {
            let start = usize::try_from(segment.offset).ok()?;
            let end = usize::try_from(end).ok()?;
            audio_data.get(start..end)
        })
        .ok_or_else(|| {
            CodecError::MalformedSegmentTable(format!(
                "segment {} lies outside the audio data",
                segment.index
            ))
        })
}

fn len_u32(len: usize, what: &'static str) -> Result<u32> {
    u32::try_from(len).map_err(|_| CodecError::TooLarge { what, len })
}

fn write_segment_record<W: Write>(writer: &mut W, segment: &FractalSegment) -> std::io::Result<()> {
    writer.write_u32::<LittleEndian>(segment.index)?;
    writer.write_u64::<LittleEndian>(segment.offset)?;
    writer.write_u32::<LittleEndian>(segment.size)?;
    writer.write_f32::<LittleEndian>(segment.timestamp)?;
    writer.write_u8(segment.compressed as u8)
}

fn read_segment_record(record: &[u8]) -> FractalSegment {
    FractalSegment {
        index: LittleEndian::read_u32(&record[0..4]),
        offset: LittleEndian::read_u64(&record[4..12]),
        size: LittleEndian::read_u32(&record[12..16]),
        timestamp: LittleEndian::read_f32(&record[16..20]),
        compressed: record[20] != 0,
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let bytes = &self.data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(CodecError::Truncated {
                needed: self.pos.saturating_add(len),
                available: self.data.len(),
            }),
        }
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }
}
