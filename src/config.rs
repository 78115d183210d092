use crate::codec::{DataEncoding, ProtocolMode};

/// Driver settings fixed at build time.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Byte ending one command line.
    pub terminator: u8,
    /// How often the command reader polls the host port.
    pub poll_period_ms: u64,
    pub protocol: ProtocolMode,
    pub encoding: DataEncoding,
    pub driver_version: &'static str,
    pub board_name: &'static str,
    pub maker_name: &'static str,
    pub hardware_type: &'static str,
}

impl Config {
    pub const DEFAULT: Self = Self {
        terminator: b'\n',
        poll_period_ms: 10,
        protocol: ProtocolMode::PlainText,
        encoding: DataEncoding::Base64,
        driver_version: env!("CARGO_PKG_VERSION"),
        board_name: "Pico 2 ADS129x bridge",
        maker_name: "hackeeg-pico",
        hardware_type: "TI ADS129x",
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
