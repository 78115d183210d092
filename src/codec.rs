//! Wire encodings for responses and sample frames
//!
//! * PlainText: `"<code> <text>\n"` responses; frames as base64 or
//!   uppercase hex, one per line.
//! * LineDocument: one compact JSON object per line. Responses are built as
//!   documents; frames use a fixed prefix/suffix around the base64 text.
//! * BinaryMap: frames as a fixed MessagePack map `{"C": 200, "D": bin8}`,
//!   written as header+metadata then the payload straight from the bus
//!   buffer. Responses fall back to LineDocument.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use embedded_io::{Write, WriteFmtError};
use serde::Serialize;

use crate::frame::{SampleFrame, HEADER_LEN, MAX_FRAME_LEN};

/// Longest base64 text for one frame.
pub const MAX_BASE64_LEN: usize = 4 * MAX_FRAME_LEN.div_ceil(3);
/// Longest hex text for one frame.
pub const MAX_HEX_LEN: usize = 2 * MAX_FRAME_LEN;
/// Room for one serialized response document.
pub const MAX_DOCUMENT_LEN: usize = 384;

const DOCUMENT_SAMPLE_PREFIX: &[u8] = br#"{"C":200,"D":""#;
const DOCUMENT_SAMPLE_SUFFIX: &[u8] = b"\"}\n";

/// fixmap(2), "C", uint8 200, "D", bin8
const MAP_SAMPLE_HEADER: [u8; 8] = [0x82, 0xA1, b'C', 0xCC, 0xC8, 0xA1, b'D', 0xC4];

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Output protocol, shared by the dispatcher and the sample worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMode {
    #[default]
    PlainText,
    LineDocument,
    BinaryMap,
}

/// Text encoding of frames in [`ProtocolMode::PlainText`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataEncoding {
    #[default]
    Base64,
    Hex,
}

/// Response status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum Status {
    Ok = 200,
    BadRequest = 400,
    ExpectedHex = 402,
    MissingRegister = 403,
    MissingValue = 404,
    UnrecognizedCommand = 406,
    Streaming = 409,
    Error = 500,
    NotImplemented = 501,
    NoActiveChannels = 502,
}

impl Status {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn text(self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::BadRequest => "Bad request",
            Self::ExpectedHex => "Error: expected hexadecimal digits.",
            Self::MissingRegister => "Error: register argument missing.",
            Self::MissingValue => "Error: value argument missing.",
            Self::UnrecognizedCommand => "Unrecognized command",
            Self::Streaming => "Device streaming",
            Self::Error => "Error",
            Self::NotImplemented => "Not Implemented",
            Self::NoActiveChannels => "No Active Channels",
        }
    }
}

/// An error type for encoding operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The output port failed.
    Write(E),
    /// The unit did not fit its encoding buffer.
    Encode,
}

impl<E> From<WriteFmtError<E>> for Error<E> {
    fn from(e: WriteFmtError<E>) -> Self {
        match e {
            WriteFmtError::Other(e) => Error::Write(e),
            _ => Error::Encode,
        }
    }
}

/// Board description carried in a `status` response.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BoardStatus<'a> {
    pub driver_version: &'a str,
    pub board_name: &'a str,
    pub maker_name: &'a str,
    pub hardware_type: &'a str,
    pub max_channels: u8,
    pub active_channels: u8,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(untagged)]
pub enum Data<'a> {
    Number(u64),
    Board(BoardStatus<'a>),
}

/// A response document.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Response<'a> {
    #[serde(rename = "STATUS_CODE")]
    pub status_code: u16,
    #[serde(rename = "STATUS_TEXT")]
    pub status_text: &'a str,
    #[serde(rename = "DATA", skip_serializing_if = "Option::is_none")]
    pub data: Option<Data<'a>>,
}

impl<'a> Response<'a> {
    pub fn new(status: Status, text: &'a str) -> Self {
        Self {
            status_code: status.code(),
            status_text: text,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Data<'a>) -> Self {
        self.data = Some(data);
        self
    }
}

/// Standard base64 of `input` into `out`, returning the text length.
pub fn encode_base64(input: &[u8], out: &mut [u8]) -> Option<usize> {
    STANDARD.encode_slice(input, out).ok()
}

/// Uppercase hex of `input` into `out`, returning the text length.
pub fn encode_hex(input: &[u8], out: &mut [u8]) -> Option<usize> {
    let len = input.len() * 2;
    let out = out.get_mut(..len)?;
    for (byte, pair) in input.iter().zip(out.chunks_exact_mut(2)) {
        pair[0] = HEX_DIGITS[(byte >> 4) as usize];
        pair[1] = HEX_DIGITS[(byte & 0x0F) as usize];
    }
    Some(len)
}

/// Write a status response in the given protocol.
pub fn write_response<W: Write>(
    w: &mut W,
    mode: ProtocolMode,
    status: Status,
    text: &str,
) -> Result<(), Error<W::Error>> {
    match mode {
        ProtocolMode::PlainText => {
            writeln!(w, "{} {}", status.code(), text)?;
            Ok(())
        }
        ProtocolMode::LineDocument | ProtocolMode::BinaryMap => {
            write_document(w, &Response::new(status, text))
        }
    }
}

/// Serialize a response document as one line.
pub fn write_document<W: Write>(w: &mut W, response: &Response<'_>) -> Result<(), Error<W::Error>> {
    let mut buf = [0u8; MAX_DOCUMENT_LEN];
    let len = serde_json_core::to_slice(response, &mut buf).map_err(|_| Error::Encode)?;
    w.write_all(&buf[..len]).map_err(Error::Write)?;
    w.write_all(b"\n").map_err(Error::Write)
}

/// Write one sample frame in the given protocol.
pub fn write_sample<W: Write>(
    w: &mut W,
    mode: ProtocolMode,
    encoding: DataEncoding,
    frame: &SampleFrame<'_>,
) -> Result<(), Error<W::Error>> {
    match mode {
        ProtocolMode::PlainText => {
            let mut raw = [0u8; MAX_FRAME_LEN];
            let n = frame.write_to(&mut raw).ok_or(Error::Encode)?;
            let mut text = [0u8; MAX_HEX_LEN];
            let len = match encoding {
                DataEncoding::Base64 => encode_base64(&raw[..n], &mut text),
                DataEncoding::Hex => encode_hex(&raw[..n], &mut text),
            }
            .ok_or(Error::Encode)?;
            w.write_all(&text[..len]).map_err(Error::Write)?;
            w.write_all(b"\n").map_err(Error::Write)
        }
        ProtocolMode::LineDocument => {
            let mut raw = [0u8; MAX_FRAME_LEN];
            let n = frame.write_to(&mut raw).ok_or(Error::Encode)?;
            let mut text = [0u8; MAX_BASE64_LEN];
            let len = encode_base64(&raw[..n], &mut text).ok_or(Error::Encode)?;
            w.write_all(DOCUMENT_SAMPLE_PREFIX).map_err(Error::Write)?;
            w.write_all(&text[..len]).map_err(Error::Write)?;
            w.write_all(DOCUMENT_SAMPLE_SUFFIX).map_err(Error::Write)
        }
        ProtocolMode::BinaryMap => {
            let size = u8::try_from(frame.len()).map_err(|_| Error::Encode)?;
            let mut head = [0u8; MAP_SAMPLE_HEADER.len() + 1 + HEADER_LEN];
            head[..8].copy_from_slice(&MAP_SAMPLE_HEADER);
            head[8] = size;
            head[9..].copy_from_slice(&frame.header.to_bytes());
            w.write_all(&head).map_err(Error::Write)?;
            w.write_all(frame.payload).map_err(Error::Write)
        }
    }
}
