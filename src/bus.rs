//! Bus transport
//!
//! Blocking, fixed-size transactions on the SPI link to the converter. The
//! chip-select line is driven by hand so that settle delays can be inserted
//! around it; the converter needs a few microseconds between the bytes of a
//! register access when SCLK runs above 4 MHz.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

/// Register read opcode, or'ed with the register address.
pub const RREG: u8 = 0x20;
/// Register write opcode, or'ed with the register address.
pub const WREG: u8 = 0x40;
/// Register addresses fit in the low five bits of the opcode.
pub const REG_ADDR_MASK: u8 = 0x1F;

/// Delay between bytes of a register access and before releasing select.
const INTER_BYTE_US: u32 = 2;
const RELEASE_US: u32 = 1;

/// An error type for bus transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Underlying SPI error.
    Spi(E),
    /// The chip-select line could not be driven.
    ChipSelect,
}

/// A synchronous link to the converter.
///
/// Implementors provide the raw primitives; the framed operations
/// (commands, register access, data reads) are built on top of them so the
/// select/settle protocol lives in one place.
pub trait Transport {
    /// Error of the underlying bus.
    type Error;

    /// Clock one byte out, discarding whatever comes back.
    fn transmit(&mut self, byte: u8) -> Result<(), Error<Self::Error>>;

    /// Clock a buffer out.
    fn transmit_all(&mut self, bytes: &[u8]) -> Result<(), Error<Self::Error>>;

    /// Clock one zero byte out and return the byte sampled on MISO.
    fn receive(&mut self) -> Result<u8, Error<Self::Error>>;

    /// Fill `buf` with bytes sampled while clocking out zeros.
    fn receive_into(&mut self, buf: &mut [u8]) -> Result<(), Error<Self::Error>>;

    /// Assert chip-select.
    fn select(&mut self) -> Result<(), Error<Self::Error>>;

    /// Wait for outstanding bytes and release chip-select.
    fn deselect(&mut self) -> Result<(), Error<Self::Error>>;

    /// Busy-wait for `us` microseconds.
    fn settle(&mut self, us: u32);

    /// Send a single-byte opcode with select asserted around it.
    fn send_command(&mut self, cmd: u8) -> Result<(), Error<Self::Error>> {
        self.select()?;
        self.settle(RELEASE_US);
        let res = self.transmit(cmd);
        self.settle(RELEASE_US);
        self.deselect()?;
        res
    }

    /// Three-phase register write: opcode, count (one register), value.
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error<Self::Error>> {
        self.select()?;
        let res = (|| -> Result<(), Error<Self::Error>> {
            self.transmit(WREG | (reg & REG_ADDR_MASK))?;
            self.settle(INTER_BYTE_US);
            self.transmit(0)?;
            self.settle(INTER_BYTE_US);
            self.transmit(value)?;
            self.settle(RELEASE_US);
            Ok(())
        })();
        self.deselect()?;
        res
    }

    /// Three-phase register read: opcode, count (one register), sampled value.
    fn read_register(&mut self, reg: u8) -> Result<u8, Error<Self::Error>> {
        self.select()?;
        let res = (|| -> Result<u8, Error<Self::Error>> {
            self.transmit(RREG | (reg & REG_ADDR_MASK))?;
            self.settle(INTER_BYTE_US);
            self.transmit(0)?;
            self.settle(INTER_BYTE_US);
            let value = self.receive()?;
            self.settle(RELEASE_US);
            Ok(value)
        })();
        self.deselect()?;
        res
    }

    /// Read one conversion result (status word plus channels) into `buf`.
    fn read_data(&mut self, buf: &mut [u8]) -> Result<(), Error<Self::Error>> {
        self.select()?;
        let res = self.receive_into(buf);
        self.deselect()?;
        res
    }
}

/// [`Transport`] over an `embedded-hal` SPI bus with a manually driven
/// chip-select pin.
pub struct SpiTransport<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
}

impl<SPI, CS, D> SpiTransport<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    /// Take ownership of the bus and leave the converter deselected.
    pub fn new(spi: SPI, mut cs: CS, delay: D) -> Self {
        let _ = cs.set_high();
        Self { spi, cs, delay }
    }
}

impl<SPI, CS, D> Transport for SpiTransport<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    type Error = SPI::Error;

    fn transmit(&mut self, byte: u8) -> Result<(), Error<Self::Error>> {
        self.spi.write(&[byte]).map_err(Error::Spi)
    }

    fn transmit_all(&mut self, bytes: &[u8]) -> Result<(), Error<Self::Error>> {
        self.spi.write(bytes).map_err(Error::Spi)
    }

    fn receive(&mut self) -> Result<u8, Error<Self::Error>> {
        let mut buf = [0u8; 1];
        self.spi.transfer_in_place(&mut buf).map_err(Error::Spi)?;
        Ok(buf[0])
    }

    fn receive_into(&mut self, buf: &mut [u8]) -> Result<(), Error<Self::Error>> {
        // MOSI must stay low, anything else is decoded as an opcode
        buf.fill(0);
        self.spi.transfer_in_place(buf).map_err(Error::Spi)
    }

    fn select(&mut self) -> Result<(), Error<Self::Error>> {
        self.cs.set_low().map_err(|_| Error::ChipSelect)
    }

    fn deselect(&mut self) -> Result<(), Error<Self::Error>> {
        self.spi.flush().map_err(Error::Spi)?;
        self.cs.set_high().map_err(|_| Error::ChipSelect)
    }

    fn settle(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}
