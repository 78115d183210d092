use crate::bus::{self, Transport};

/// An error type for ADS129x operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Underlying bus error.
    Bus(bus::Error<E>),
    /// The ID register did not match any supported part.
    UnknownDevice { id: u8 },
    /// Register access was refused because the device is streaming.
    Streaming,
}

impl<E> From<bus::Error<E>> for Error<E> {
    fn from(e: bus::Error<E>) -> Self {
        Error::Bus(e)
    }
}

#[allow(dead_code)]
pub mod constants {
    // System commands
    pub const WAKEUP: u8 = 0x02;
    pub const STANDBY: u8 = 0x04;
    pub const RESET: u8 = 0x06;
    pub const START: u8 = 0x08;
    pub const STOP: u8 = 0x0A;

    // Data read commands
    pub const RDATAC: u8 = 0x10;
    pub const SDATAC: u8 = 0x11;
    pub const RDATA: u8 = 0x12;

    // Registers
    pub const ID: u8 = 0x00;
    pub const CONFIG1: u8 = 0x01;
    pub const CONFIG2: u8 = 0x02;
    pub const CONFIG3: u8 = 0x03;
    pub const LOFF: u8 = 0x04;
    /// CHnSET for channel n (1-based) lives at `CHNSET + n`.
    pub const CHNSET: u8 = 0x04;
    pub const CH1SET: u8 = 0x05;
    pub const CH8SET: u8 = 0x0C;
    pub const GPIO: u8 = 0x14;
    pub const MISC1: u8 = 0x15;
    pub const CONFIG4: u8 = 0x17;

    // ID register: low five bits select the part
    pub const ID_MASK: u8 = 0x1F;
    pub const ID_ADS1294: u8 = 0x10;
    pub const ID_ADS1296: u8 = 0x11;
    pub const ID_ADS1298: u8 = 0x12;
    pub const ID_ADS1299_4: u8 = 0x1C;
    pub const ID_ADS1299_6: u8 = 0x1D;
    pub const ID_ADS1299: u8 = 0x1E;

    // CHnSET input multiplexer (low three bits)
    pub const MUX_MASK: u8 = 0x07;
    pub const MUX_NORMAL: u8 = 0x00;
    pub const MUX_SHORTED: u8 = 0x01;
    pub const MUX_TEST_SIGNAL: u8 = 0x05;

    // CONFIG2: reserved bits plus internal square-wave test source
    pub const CONFIG2_RESERVED: u8 = 0xC0;
    pub const CONFIG2_INT_CAL: u8 = 0x10;
    pub const CONFIG2_CAL_AMP: u8 = 0x04;
    pub const CONFIG2_CAL_FREQ_FAST: u8 = 0x01;

    // CONFIG3: internal reference buffer on, reserved bits
    pub const CONFIG3_PD_REFBUF: u8 = 0x80;
    pub const CONFIG3_RESERVED: u8 = 0x60;

    // GPIO register: GPIOC1 is the direction bit, GPIOD1 the level of pin 1
    pub const GPIOC1: u8 = 0x01;
    pub const GPIOD1: u8 = 0x10;

    /// Bytes per channel (and per status word) in a conversion result.
    pub const BYTES_PER_CHANNEL: usize = 3;
    pub const MAX_CHANNELS: usize = 8;
}

/// Supported parts, keyed on the ID register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Model {
    Ads1294,
    Ads1296,
    Ads1298,
    Ads1299_4,
    Ads1299_6,
    Ads1299,
}

impl Model {
    /// Decode the ID register.
    pub fn from_id(id: u8) -> Option<Self> {
        use constants::*;
        match id & ID_MASK {
            ID_ADS1294 => Some(Self::Ads1294),
            ID_ADS1296 => Some(Self::Ads1296),
            ID_ADS1298 => Some(Self::Ads1298),
            ID_ADS1299_4 => Some(Self::Ads1299_4),
            ID_ADS1299_6 => Some(Self::Ads1299_6),
            ID_ADS1299 => Some(Self::Ads1299),
            _ => None,
        }
    }

    pub fn channels(self) -> u8 {
        match self {
            Self::Ads1294 | Self::Ads1299_4 => 4,
            Self::Ads1296 | Self::Ads1299_6 => 6,
            Self::Ads1298 | Self::Ads1299 => 8,
        }
    }

    /// Length of one conversion result: status word plus every channel.
    pub fn payload_len(self) -> usize {
        constants::BYTES_PER_CHANNEL * (self.channels() as usize + 1)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Ads1294 => "ADS1294",
            Self::Ads1296 => "ADS1296",
            Self::Ads1298 => "ADS1298",
            Self::Ads1299_4 => "ADS1299-4",
            Self::Ads1299_6 => "ADS1299-6",
            Self::Ads1299 => "ADS1299",
        }
    }
}

/// ADS129x encapsulates the bus and the identified part.
pub struct Ads129x<T> {
    bus: T,
    model: Option<Model>,
}

impl<T: Transport> Ads129x<T> {
    pub fn new(bus: T) -> Self {
        Self { bus, model: None }
    }

    /// The part found by the last [`identify`](Self::identify), if any.
    pub fn model(&self) -> Option<Model> {
        self.model
    }

    /// Channel count of the identified part, zero before identification.
    pub fn max_channels(&self) -> u8 {
        self.model.map_or(0, Model::channels)
    }

    /// Read the ID register and remember the part geometry.
    pub fn identify(&mut self) -> Result<Model, Error<T::Error>> {
        let id = self.bus.read_register(constants::ID)?;
        match Model::from_id(id) {
            Some(model) => {
                info!("found {=str} (id {=u8:#x})", model.name(), id);
                self.model = Some(model);
                Ok(model)
            }
            None => {
                error!("unknown device id {=u8:#x}", id);
                self.model = None;
                Err(Error::UnknownDevice { id })
            }
        }
    }

    /// Bring the part into a known state: stop streaming, identify it,
    /// drive its GPIOs as inputs and short every channel input.
    pub fn setup(&mut self) -> Result<Model, Error<T::Error>> {
        use constants::*;
        self.command(SDATAC)?;
        let model = self.identify()?;
        self.write_register(GPIO, 0)?;
        self.write_register(CONFIG3, CONFIG3_PD_REFBUF | CONFIG3_RESERVED)?;
        for channel in 1..=model.channels() {
            self.write_register(CHNSET + channel, MUX_SHORTED)?;
        }
        Ok(model)
    }

    /// Send a single-byte system or data command.
    pub fn command(&mut self, cmd: u8) -> Result<(), Error<T::Error>> {
        trace!("command {=u8:#x}", cmd);
        self.bus.send_command(cmd)?;
        Ok(())
    }

    pub fn read_register(&mut self, reg: u8) -> Result<u8, Error<T::Error>> {
        let value = self.bus.read_register(reg)?;
        debug!("rreg {=u8:#x} -> {=u8:#x}", reg, value);
        Ok(value)
    }

    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<T::Error>> {
        debug!("wreg {=u8:#x} <- {=u8:#x}", reg, value);
        self.bus.write_register(reg, value)?;
        Ok(())
    }

    /// Whether channel `n` (1-based) has an input other than shorted.
    pub fn channel_active(&mut self, channel: u8) -> Result<bool, Error<T::Error>> {
        use constants::*;
        let settings = self.read_register(CHNSET + channel)?;
        Ok(settings & MUX_MASK != MUX_SHORTED)
    }

    /// Read one conversion result into `buf`, which must be sized to the
    /// part's payload length.
    pub fn read_data(&mut self, buf: &mut [u8]) -> Result<(), Error<T::Error>> {
        self.bus.read_data(buf)?;
        Ok(())
    }

    /// Drive GPIO1 of the converter, which carries the board LED.
    pub fn set_board_led(&mut self, on: bool) -> Result<(), Error<T::Error>> {
        use constants::*;
        let state = self.read_register(GPIO)?;
        let state = if on {
            (state & !GPIOC1) | GPIOD1
        } else {
            state & !(GPIOC1 | GPIOD1)
        };
        self.write_register(GPIO, state)
    }

    /// Route the internal square-wave test source to every channel.
    pub fn configure_test_signal(&mut self) -> Result<(), Error<T::Error>> {
        use constants::*;
        self.write_register(CONFIG2, CONFIG2_RESERVED | CONFIG2_INT_CAL | CONFIG2_CAL_FREQ_FAST)?;
        for channel in 1..=self.max_channels() {
            self.write_register(CHNSET + channel, MUX_TEST_SIGNAL)?;
        }
        Ok(())
    }
}
