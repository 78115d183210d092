//! Sample frame layout
//!
//! A frame is written as an explicit sequence: 4-byte timestamp, 4-byte
//! sample number (both little-endian), then the raw conversion result
//! exactly as clocked off the bus. The payload is borrowed, never copied.

use crate::devices::ads129x::constants::{BYTES_PER_CHANNEL, MAX_CHANNELS};

/// Timestamp plus sample number.
pub const HEADER_LEN: usize = 8;
/// Largest conversion result: status word plus eight channels.
pub const MAX_PAYLOAD_LEN: usize = BYTES_PER_CHANNEL * (MAX_CHANNELS + 1);
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    /// Microseconds since boot, truncated to 32 bits.
    pub timestamp: u32,
    pub sample_number: u32,
}

impl FrameHeader {
    pub fn new(micros: u64, sample_number: u32) -> Self {
        Self {
            timestamp: micros as u32,
            sample_number,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&self.timestamp.to_le_bytes());
        out[4..].copy_from_slice(&self.sample_number.to_le_bytes());
        out
    }
}

/// One acquisition cycle, ready to be encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFrame<'a> {
    pub header: FrameHeader,
    pub payload: &'a [u8],
}

impl<'a> SampleFrame<'a> {
    pub fn new(header: FrameHeader, payload: &'a [u8]) -> Self {
        Self { header, payload }
    }

    pub fn len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Serialize into `out`, returning the number of bytes written, or
    /// `None` if `out` is too small.
    pub fn write_to(&self, out: &mut [u8]) -> Option<usize> {
        let len = self.len();
        let out = out.get_mut(..len)?;
        out[..HEADER_LEN].copy_from_slice(&self.header.to_bytes());
        out[HEADER_LEN..].copy_from_slice(self.payload);
        Some(len)
    }
}
