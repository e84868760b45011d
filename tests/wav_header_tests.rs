// Tests for the 44-byte PCM WAV header codec

use anyhow::Result;
use cross_recorder::audio::{duration_ms, WavHeader, WAV_HEADER_SIZE};
use cross_recorder::RecorderError;

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
}

#[test]
fn test_header_layout_for_stereo_48k() {
    let bytes = WavHeader::new(48000, 2, 16, 96000).encode();

    assert_eq!(bytes.len(), WAV_HEADER_SIZE);
    assert_eq!(&bytes[0..4], b"RIFF");
    assert_eq!(u32_at(&bytes, 4), 96036, "RIFF size is data size + 36");
    assert_eq!(&bytes[8..12], b"WAVE");
    assert_eq!(&bytes[12..16], b"fmt ");
    assert_eq!(u32_at(&bytes, 16), 16);
    assert_eq!(u16_at(&bytes, 20), 1, "PCM format tag");
    assert_eq!(u16_at(&bytes, 22), 2);
    assert_eq!(u32_at(&bytes, 24), 48000);
    assert_eq!(u32_at(&bytes, 28), 192000, "byte rate");
    assert_eq!(u16_at(&bytes, 32), 4, "block align");
    assert_eq!(u16_at(&bytes, 34), 16);
    assert_eq!(&bytes[36..40], b"data");
    assert_eq!(u32_at(&bytes, 40), 96000);
}

#[test]
fn test_placeholder_header_has_zero_data_size() {
    let bytes = WavHeader::new(44100, 1, 16, 0).encode();

    assert_eq!(u32_at(&bytes, 4), 36);
    assert_eq!(u32_at(&bytes, 40), 0);
    assert_eq!(u32_at(&bytes, 28), 88200);
    assert_eq!(u16_at(&bytes, 32), 2);
}

#[test]
fn test_decode_reads_back_fields() -> Result<()> {
    let header = WavHeader::new(16000, 1, 16, 32000);
    let decoded = WavHeader::decode(&header.encode())?;

    assert_eq!(decoded, header);
    assert_eq!(decoded.byte_rate(), 32000);
    assert_eq!(decoded.block_align(), 2);
    Ok(())
}

#[test]
fn test_decode_rejects_bad_magic() {
    let mut bytes = WavHeader::new(48000, 2, 16, 0).encode();
    bytes[0..4].copy_from_slice(b"RIFX");

    let err = WavHeader::decode(&bytes).unwrap_err();
    assert!(matches!(err, RecorderError::InvalidWavHeader(_)));
}

#[test]
fn test_decode_rejects_short_input() {
    let bytes = WavHeader::new(48000, 2, 16, 0).encode();

    let err = WavHeader::decode(&bytes[..20]).unwrap_err();
    assert!(matches!(err, RecorderError::InvalidWavHeader(_)));
}

#[test]
fn test_decode_rejects_non_pcm() {
    let mut bytes = WavHeader::new(48000, 2, 16, 0).encode();
    bytes[20..22].copy_from_slice(&3u16.to_le_bytes());

    assert!(WavHeader::decode(&bytes).is_err());
}

#[test]
fn test_duration_from_byte_count() {
    // One second of 16-bit mono at 44.1kHz is 88200 bytes
    assert_eq!(duration_ms(88200, 44100, 1, 16), 1000);
    assert_eq!(duration_ms(176400, 44100, 1, 16), 2000);
    assert_eq!(duration_ms(192000, 48000, 2, 16), 1000);
    assert_eq!(duration_ms(0, 48000, 2, 16), 0);
}

#[test]
fn test_duration_with_zero_format_is_zero() {
    assert_eq!(duration_ms(1000, 0, 2, 16), 0);
    assert_eq!(duration_ms(1000, 48000, 0, 16), 0);
}

#[test]
fn test_oversized_format_encodes_without_panicking() {
    let header = WavHeader::new(3_000_000_000, 2, 16, 0);

    let bytes = header.encode();
    assert_eq!(u32_at(&bytes, 28), u32::MAX, "byte rate saturates");
    assert!(matches!(header.validate(), Err(RecorderError::InvalidFormat(_))));
}

#[test]
fn test_validate_rejects_unwritable_formats() {
    assert!(WavHeader::new(48000, 2, 16, 0).validate().is_ok());
    assert!(WavHeader::new(0, 2, 16, 0).validate().is_err());
    assert!(WavHeader::new(48000, 0, 16, 0).validate().is_err());
    assert!(WavHeader::new(48000, 2, 12, 0).validate().is_err());
    assert!(WavHeader::new(48000, u16::MAX, 32, 0).validate().is_err());
    assert!(WavHeader::new(48000, 2, 16, u32::MAX).validate().is_err());
}

#[test]
fn test_decode_rejects_overflowing_byte_rate() {
    let mut bytes = WavHeader::new(48000, 2, 16, 0).encode();
    bytes[24..28].copy_from_slice(&3_000_000_000u32.to_le_bytes());

    let err = WavHeader::decode(&bytes).unwrap_err();
    assert!(matches!(err, RecorderError::InvalidFormat(_)));
}
