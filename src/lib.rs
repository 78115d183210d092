//! Bridge between a host serial port and a TI ADS129x biopotential ADC.
//!
//! The library holds everything that does not touch a particular board:
//! the SPI framing, the converter driver, the data-ready handoff, the sample
//! worker, the wire encodings and the command tables. The firmware binary
//! wires it to an RP2350.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod acquisition;
pub mod bus;
pub mod codec;
pub mod command;
pub mod commands;
pub mod config;
pub mod devices;
pub mod driver;
pub mod frame;
pub mod handoff;
pub mod reader;
pub mod worker;

#[cfg(test)]
mod sim;
