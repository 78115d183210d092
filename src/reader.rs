//! Command reader
//!
//! Splits the host byte stream into command units on the configured
//! terminator and hands each one to the front end matching the protocol
//! selected at that moment.

use heapless::Vec;

use crate::command;
use crate::commands::{document_commands, text_commands, Commands};
use crate::codec::ProtocolMode;
use crate::driver::{Driver, Platform};

/// Longest accepted command unit, terminator excluded.
pub const MAX_LINE_LEN: usize = 256;

/// Accumulates bytes up to a terminator.
pub struct LineBuffer<const N: usize> {
    buf: Vec<u8, N>,
    terminator: u8,
    complete: bool,
    overflow: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub fn new(terminator: u8) -> Self {
        Self {
            buf: Vec::new(),
            terminator,
            complete: false,
            overflow: false,
        }
    }

    /// Feed one byte. Returns the finished line, without its terminator or a
    /// trailing carriage return, when `byte` ends one. Lines longer than the
    /// buffer are dropped whole.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        if self.complete {
            self.buf.clear();
            self.complete = false;
        }
        if byte == self.terminator {
            if self.overflow {
                warn!("command longer than {=usize} bytes dropped", N);
                self.overflow = false;
                self.buf.clear();
                return None;
            }
            self.complete = true;
            return Some(self.buf.strip_suffix(b"\r").unwrap_or(&self.buf[..]));
        }
        if self.buf.push(byte).is_err() {
            self.overflow = true;
        }
        None
    }
}

pub struct CommandReader<'a, P: Platform> {
    text: Commands<'a, P>,
    document: Commands<'a, P>,
    line: LineBuffer<MAX_LINE_LEN>,
}

impl<'a, P: Platform> CommandReader<'a, P> {
    pub fn new(terminator: u8) -> Result<Self, command::Error> {
        Ok(Self {
            text: text_commands()?,
            document: document_commands()?,
            line: LineBuffer::new(terminator),
        })
    }

    /// Dispatch every command completed by `bytes`.
    pub fn feed(&mut self, driver: &mut Driver<'a, P>, bytes: &[u8]) {
        for &byte in bytes {
            let Some(line) = self.line.push(byte) else {
                continue;
            };
            match driver.protocol() {
                ProtocolMode::PlainText => match core::str::from_utf8(line) {
                    Ok(line) => self.text.dispatch_text(driver, line),
                    Err(_) => self.text.dispatch_unrecognized(driver, ""),
                },
                ProtocolMode::LineDocument | ProtocolMode::BinaryMap => {
                    if !line.is_empty() {
                        self.document.dispatch_document(driver, line)
                    }
                }
            }
        }
    }
}
