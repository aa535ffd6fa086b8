//! Heuristic linear-command decoder.
//!
//! The device server wraps every `LinearCmd` in a protobuf envelope whose
//! schema the simulator never consults.  Instead, [`CommandDecoder`] runs two
//! independent scans over the raw bytes:
//!
//! 1. **Position** – every 8-byte window, from the end of the buffer back to
//!    the start, is read as a little-endian `f64`; the first value inside
//!    `0.0..=1.0` wins.  The position field is serialised near the tail of the
//!    message, so scanning backwards finds it first.
//! 2. **Duration** – every occurrence of the sentinel byte (`0x10`, the tag of
//!    a varint field) is followed by a base-128 varint decode; the first value
//!    inside the accepted window is the duration in milliseconds.
//!
//! A position is mandatory.  A missing duration falls back to
//! [`DEFAULT_DURATION_MS`].
//!
//! This is an approximation by construction and must stay one: the simulator
//! mimics a client that does not understand the wrapped schema.
//!
//! # Example
//!
//! ```rust
//! use handysim_hal::decoder::decode;
//!
//! let mut payload = vec![0x10, 0xFA, 0x01];
//! payload.extend_from_slice(&0.75f64.to_le_bytes());
//!
//! let cmd = decode(&payload).expect("position is recoverable");
//! assert_eq!(cmd.position, 0.75);
//! assert_eq!(cmd.duration_ms, 250);
//! ```

use handysim_types::Command;
use thiserror::Error;
use tracing::trace;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Tag byte that precedes the duration varint (field 2, wire type 0).
pub const DURATION_SENTINEL: u8 = 0x10;

/// Smallest varint accepted as a duration.
pub const MIN_DURATION_MS: u32 = 10;

/// Largest varint accepted as a duration.
pub const MAX_DURATION_MS: u32 = 10_000;

/// Duration used when no sentinel-marked varint falls inside the window.
pub const DEFAULT_DURATION_MS: u32 = 500;

/// Number of bytes shown in diagnostic previews of unrecognised payloads.
pub const HEX_PREVIEW_LEN: usize = 40;

const POSITION_WINDOW: usize = 8;
const MAX_VARINT_SHIFT: u32 = 63;

// ─────────────────────────────────────────────────────────────────────────────
// Varint
// ─────────────────────────────────────────────────────────────────────────────

/// Failure while decoding a single varint candidate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    #[error("varint too long (shift would exceed {MAX_VARINT_SHIFT})")]
    TooLong,
    #[error("varint value does not fit in 64 bits")]
    Overflow,
}

/// Decode a little-endian base-128 varint from the start of `data`.
///
/// Returns the value and the number of bytes consumed.  A varint cut short by
/// the end of the buffer yields the bits read so far.
///
/// # Errors
///
/// Returns [`VarintError::TooLong`] once more continuation bytes are seen than
/// fit in 64 bits, and [`VarintError::Overflow`] when the final group carries
/// bits above bit 63.
pub fn decode_varint(data: &[u8]) -> Result<(u64, usize), VarintError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;
    let mut consumed = 0;

    for &byte in data {
        let group = u64::from(byte & 0x7F);
        let truncated = (group << shift) >> shift != group;
        value |= group << shift;
        consumed += 1;

        if byte & 0x80 == 0 {
            if truncated {
                return Err(VarintError::Overflow);
            }
            break;
        }

        shift += 7;
        if shift > MAX_VARINT_SHIFT {
            return Err(VarintError::TooLong);
        }
    }

    Ok((value, consumed))
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoder
// ─────────────────────────────────────────────────────────────────────────────

/// Tunable constants of the duration heuristic.
///
/// The defaults are empirical; there is no authoritative schema to derive
/// better ones from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    pub sentinel: u8,
    pub min_duration_ms: u32,
    pub max_duration_ms: u32,
    pub default_duration_ms: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sentinel: DURATION_SENTINEL,
            min_duration_ms: MIN_DURATION_MS,
            max_duration_ms: MAX_DURATION_MS,
            default_duration_ms: DEFAULT_DURATION_MS,
        }
    }
}

/// Stateless best-effort decoder for binary movement payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandDecoder {
    config: DecoderConfig,
}

impl CommandDecoder {
    /// Create a decoder using the given heuristic constants.
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Return the heuristic constants in use.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Recover a [`Command`] from `data`.
    ///
    /// Returns `None` when no 8-byte window decodes to a position in
    /// `0.0..=1.0`.  A duration on its own is never enough.
    pub fn decode(&self, data: &[u8]) -> Option<Command> {
        let position = recover_position(data)?;
        let duration_ms = self
            .recover_duration(data)
            .unwrap_or(self.config.default_duration_ms);

        Some(Command {
            position,
            duration_ms,
        })
    }

    /// Scan forward for the first sentinel-marked varint inside the accepted
    /// duration window.
    ///
    /// The sentinel must be followed by at least two bytes to be considered.
    pub fn recover_duration(&self, data: &[u8]) -> Option<u32> {
        let window = u64::from(self.config.min_duration_ms)..=u64::from(self.config.max_duration_ms);
        let last_candidate = data.len().saturating_sub(2);

        (0..last_candidate)
            .filter(|&i| data[i] == self.config.sentinel)
            .find_map(|i| match decode_varint(&data[i + 1..]) {
                Ok((value, _)) if window.contains(&value) => u32::try_from(value).ok(),
                Ok(_) => None,
                Err(e) => {
                    trace!(offset = i, error = %e, "rejecting duration candidate");
                    None
                }
            })
    }
}

/// Decode `data` with the default heuristic constants.
pub fn decode(data: &[u8]) -> Option<Command> {
    CommandDecoder::default().decode(data)
}

/// Scan 8-byte windows from the tail towards the head and return the first
/// little-endian `f64` inside `0.0..=1.0`.
pub fn recover_position(data: &[u8]) -> Option<f64> {
    if data.len() < POSITION_WINDOW {
        return None;
    }

    (0..=data.len() - POSITION_WINDOW).rev().find_map(|i| {
        let window: [u8; POSITION_WINDOW] = data[i..i + POSITION_WINDOW].try_into().ok()?;
        let value = f64::from_le_bytes(window);
        (0.0..=1.0).contains(&value).then_some(value)
    })
}

/// Lower-case hex rendering of at most the first [`HEX_PREVIEW_LEN`] bytes.
pub fn hex_preview(data: &[u8]) -> String {
    data.iter()
        .take(HEX_PREVIEW_LEN)
        .map(|b| format!("{b:02x}"))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn with_position(prefix: &[u8], position: f64) -> Vec<u8> {
        let mut data = prefix.to_vec();
        data.extend_from_slice(&position.to_le_bytes());
        data
    }

    #[test]
    fn short_buffers_never_decode() {
        for len in 0..8 {
            let data = vec![0u8; len];
            assert!(decode(&data).is_none(), "len {len} must not decode");
        }
    }

    #[test]
    fn trailing_position_without_sentinel_uses_default_duration() {
        let data = with_position(&[0xFF; 8], 0.25);
        let cmd = decode(&data).unwrap();
        assert_eq!(cmd.position, 0.25);
        assert_eq!(cmd.duration_ms, DEFAULT_DURATION_MS);
    }

    #[test]
    fn sentinel_varint_and_trailing_position() {
        let data = with_position(&[0x10, 0xFA, 0x01], 0.75);
        assert_eq!(
            decode(&data),
            Some(Command {
                position: 0.75,
                duration_ms: 250
            })
        );
    }

    #[test]
    fn envelope_shaped_payload() {
        // outer field 1 (len-delimited), inner varint field 2, inner double field 3
        let data = with_position(&[0x0A, 0x0F, 0x08, 0x00, 0x10, 0xE8, 0x07, 0x19], 0.3);
        let cmd = decode(&data).unwrap();
        assert_eq!(cmd.position, 0.3);
        assert_eq!(cmd.duration_ms, 1000);
    }

    #[test]
    fn position_prefers_tail_of_buffer() {
        let mut data = 0.25f64.to_le_bytes().to_vec();
        data.extend_from_slice(&0.75f64.to_le_bytes());
        assert_eq!(recover_position(&data), Some(0.75));
    }

    #[test]
    fn no_window_in_range_yields_none() {
        // all-ones windows decode to NaN
        assert!(decode(&[0xFF; 24]).is_none());
    }

    #[test]
    fn duration_alone_is_not_a_command() {
        assert!(decode(&[0x10, 0xFA, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).is_none());
    }

    #[test]
    fn out_of_window_candidates_are_skipped() {
        // 5 ms is below the window, 200 ms is accepted
        let data = with_position(&[0x10, 0x05, 0x10, 0xC8, 0x01], 0.5);
        assert_eq!(decode(&data).unwrap().duration_ms, 200);
    }

    #[test]
    fn overlong_varint_falls_back_to_default_duration() {
        let mut prefix = vec![0x10];
        prefix.extend_from_slice(&[0xFF; 10]);
        prefix.push(0x00);
        let data = with_position(&prefix, 0.5);
        let cmd = decode(&data).unwrap();
        assert_eq!(cmd.position, 0.5);
        assert_eq!(cmd.duration_ms, DEFAULT_DURATION_MS);
    }

    #[test]
    fn sentinel_in_last_two_bytes_is_ignored() {
        let decoder = CommandDecoder::default();
        assert_eq!(decoder.recover_duration(&[0x00, 0x10, 0x64]), None);
        assert_eq!(decoder.recover_duration(&[0x10, 0x64, 0x00]), Some(100));
    }

    #[test]
    fn custom_config_changes_window() {
        let decoder = CommandDecoder::new(DecoderConfig {
            sentinel: 0x18,
            min_duration_ms: 1,
            max_duration_ms: 20,
            default_duration_ms: 42,
        });
        let data = with_position(&[0x18, 0x05, 0x00], 0.5);
        assert_eq!(decoder.decode(&data).unwrap().duration_ms, 5);

        let data = with_position(&[0x10, 0xFA, 0x01], 0.5);
        assert_eq!(decoder.decode(&data).unwrap().duration_ms, 42);
    }

    #[test]
    fn varint_decoding() {
        assert_eq!(decode_varint(&[0x01]), Ok((1, 1)));
        assert_eq!(decode_varint(&[0xFA, 0x01]), Ok((250, 2)));
        assert_eq!(decode_varint(&[0xE8, 0x07, 0xFF]), Ok((1000, 2)));
        // truncated: continuation bit set on the final byte
        assert_eq!(decode_varint(&[0x80]), Ok((0, 1)));
        assert_eq!(decode_varint(&[]), Ok((0, 0)));
        assert_eq!(decode_varint(&[0xFF; 10]), Err(VarintError::TooLong));
    }

    #[test]
    fn varint_bits_past_64_are_not_truncated() {
        // ten bytes, last group 0x02 lands on bit 64
        let mut bytes = vec![0xE4];
        bytes.extend_from_slice(&[0x80; 8]);
        bytes.push(0x02);
        assert_eq!(decode_varint(&bytes), Err(VarintError::Overflow));

        // bit 63 alone still fits
        let mut top_bit = vec![0x80; 9];
        top_bit.push(0x01);
        assert_eq!(decode_varint(&top_bit), Ok((1u64 << 63, 10)));
    }

    #[test]
    fn overflowing_duration_candidate_is_rejected() {
        let decoder = CommandDecoder::default();
        let mut data = vec![0x10, 0xE4];
        data.extend_from_slice(&[0x80; 8]);
        data.extend_from_slice(&[0x02, 0x00]);
        assert_eq!(decoder.recover_duration(&data), None);

        let cmd = decoder.decode(&with_position(&data, 0.5)).unwrap();
        assert_eq!(cmd.duration_ms, DEFAULT_DURATION_MS);
    }

    #[test]
    fn hex_preview_is_truncated() {
        assert_eq!(hex_preview(&[0x0A, 0xFF, 0x00]), "0aff00");
        let long = vec![0xAB; 100];
        assert_eq!(hex_preview(&long).len(), HEX_PREVIEW_LEN * 2);
    }
}
