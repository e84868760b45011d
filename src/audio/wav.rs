// Canonical 44-byte PCM WAV header
//
// The same encoder writes the placeholder header when a track is opened
// (data size 0) and the final header at finalize time, so the two differ
// only in the RIFF size and data size fields.

use crate::error::{RecorderError, Result};

/// Size of the canonical PCM WAV header in bytes
pub const WAV_HEADER_SIZE: usize = 44;

/// Largest data size whose RIFF size (36 + data) still fits in a u32
pub const MAX_DATA_SIZE: u64 = u32::MAX as u64 - 36;

/// Sample widths the recorder can write
pub const SUPPORTED_BIT_DEPTHS: [u16; 4] = [8, 16, 24, 32];

const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_SIZE: u32 = 16;

/// Fields of a PCM WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    /// Size of the data chunk in bytes
    pub data_size: u32,
}

impl WavHeader {
    pub fn new(sample_rate: u32, channels: u16, bit_depth: u16, data_size: u32) -> Self {
        Self {
            sample_rate,
            channels,
            bit_depth,
            data_size,
        }
    }

    pub fn bytes_per_sample(&self) -> u32 {
        self.bit_depth as u32 / 8
    }

    fn wide_byte_rate(&self) -> u64 {
        self.sample_rate as u64 * self.wide_block_align()
    }

    fn wide_block_align(&self) -> u64 {
        self.channels as u64 * self.bytes_per_sample() as u64
    }

    /// Bytes per second. Saturates for formats `validate` rejects.
    pub fn byte_rate(&self) -> u32 {
        u32::try_from(self.wide_byte_rate()).unwrap_or(u32::MAX)
    }

    /// Bytes per frame. Saturates for formats `validate` rejects.
    pub fn block_align(&self) -> u16 {
        u16::try_from(self.wide_block_align()).unwrap_or(u16::MAX)
    }

    /// Check that every derived field fits the header layout
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(RecorderError::InvalidFormat("sample rate must be positive".to_string()));
        }
        if self.channels == 0 {
            return Err(RecorderError::InvalidFormat("channel count must be positive".to_string()));
        }
        if !SUPPORTED_BIT_DEPTHS.contains(&self.bit_depth) {
            return Err(RecorderError::InvalidFormat(format!(
                "unsupported bit depth {}",
                self.bit_depth
            )));
        }
        if self.wide_block_align() > u16::MAX as u64 {
            return Err(RecorderError::InvalidFormat(format!(
                "{} channels of {}-bit audio do not fit a WAV frame",
                self.channels, self.bit_depth
            )));
        }
        if self.wide_byte_rate() > u32::MAX as u64 {
            return Err(RecorderError::InvalidFormat(format!(
                "byte rate of {} Hz x {} channels x {} bits overflows the header",
                self.sample_rate, self.channels, self.bit_depth
            )));
        }
        if self.data_size as u64 > MAX_DATA_SIZE {
            return Err(RecorderError::InvalidFormat(format!(
                "data size {} exceeds the RIFF limit",
                self.data_size
            )));
        }
        Ok(())
    }

    /// RIFF chunk size: everything after the first 8 bytes
    pub fn riff_size(&self) -> u32 {
        36u32.wrapping_add(self.data_size)
    }

    pub fn encode(&self) -> [u8; WAV_HEADER_SIZE] {
        let mut buf = [0u8; WAV_HEADER_SIZE];

        // RIFF chunk
        buf[0..4].copy_from_slice(b"RIFF");
        buf[4..8].copy_from_slice(&self.riff_size().to_le_bytes());
        buf[8..12].copy_from_slice(b"WAVE");

        // fmt chunk
        buf[12..16].copy_from_slice(b"fmt ");
        buf[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
        buf[20..22].copy_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
        buf[22..24].copy_from_slice(&self.channels.to_le_bytes());
        buf[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        buf[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        buf[34..36].copy_from_slice(&self.bit_depth.to_le_bytes());

        // data chunk
        buf[36..40].copy_from_slice(b"data");
        buf[40..44].copy_from_slice(&self.data_size.to_le_bytes());

        buf
    }

    /// Parse a canonical PCM header. Extended or non-PCM layouts, and formats
    /// `validate` rejects, are errors.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < WAV_HEADER_SIZE {
            return Err(RecorderError::InvalidWavHeader(format!(
                "expected {} bytes, got {}",
                WAV_HEADER_SIZE,
                bytes.len()
            )));
        }

        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;
        expect_tag(bytes, 36, b"data")?;

        let fmt_size = read_u32(bytes, 16);
        if fmt_size != FMT_CHUNK_SIZE {
            return Err(RecorderError::InvalidWavHeader(format!(
                "unsupported fmt chunk size {}",
                fmt_size
            )));
        }

        let format_tag = read_u16(bytes, 20);
        if format_tag != PCM_FORMAT_TAG {
            return Err(RecorderError::InvalidWavHeader(format!(
                "unsupported format tag {}",
                format_tag
            )));
        }

        let header = Self {
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            bit_depth: read_u16(bytes, 34),
            data_size: read_u32(bytes, 40),
        };
        header.validate()?;
        Ok(header)
    }
}

/// Duration in whole milliseconds of `bytes` of PCM audio, rounded to nearest
pub fn duration_ms(bytes: u64, sample_rate: u32, channels: u16, bit_depth: u16) -> u64 {
    let bytes_per_second = sample_rate as u64 * channels as u64 * (bit_depth as u64 / 8);
    if bytes_per_second == 0 {
        return 0;
    }
    ((bytes as f64 / bytes_per_second as f64) * 1000.0).round() as u64
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<()> {
    if &bytes[offset..offset + 4] != tag {
        return Err(RecorderError::InvalidWavHeader(format!(
            "missing {:?} at offset {}",
            String::from_utf8_lossy(tag),
            offset
        )));
    }
    Ok(())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
