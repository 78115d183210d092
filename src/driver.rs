//! Driver context
//!
//! One owned object holding the converter, the host output port, the
//! detected channel geometry and the selected wire encoding. Command
//! handlers and the sample worker both operate on it through a shared async
//! mutex, so bus transactions from the two never interleave.

use embedded_hal::digital::OutputPin;
use embedded_io::Write;

use crate::acquisition::{ChannelSet, Mode, Session};
use crate::bus::Transport;
use crate::codec::{self, DataEncoding, ProtocolMode, Response, Status};
use crate::command::Respond;
use crate::config::Config;
use crate::devices::ads129x::{constants, Ads129x, Error, Model};
use crate::frame::{FrameHeader, SampleFrame, MAX_PAYLOAD_LEN};
use crate::handoff::Handoff;

/// Monotonic time since boot.
pub trait Clock {
    fn micros(&self) -> u64;
}

/// The concrete peripherals a [`Driver`] runs on.
pub trait Platform {
    type Transport: Transport;
    type Output: Write;
    type Led: OutputPin;
    type Clock: Clock;
}

/// Errors from the converter on platform `P`.
pub type DeviceError<P> = Error<<<P as Platform>::Transport as Transport>::Error>;

pub struct Driver<'a, P: Platform> {
    device: Ads129x<P::Transport>,
    out: P::Output,
    led: P::Led,
    clock: P::Clock,
    handoff: &'a Handoff,
    channels: ChannelSet,
    protocol: ProtocolMode,
    encoding: DataEncoding,
    config: Config,
    payload: [u8; MAX_PAYLOAD_LEN],
}

impl<'a, P: Platform> Driver<'a, P> {
    pub fn new(
        transport: P::Transport,
        out: P::Output,
        led: P::Led,
        clock: P::Clock,
        handoff: &'a Handoff,
        config: Config,
    ) -> Self {
        Self {
            device: Ads129x::new(transport),
            out,
            led,
            clock,
            handoff,
            channels: ChannelSet::empty(),
            protocol: config.protocol,
            encoding: config.encoding,
            config,
            payload: [0; MAX_PAYLOAD_LEN],
        }
    }

    /// Put the converter into its default state and learn its geometry.
    /// Failure here means the part is unknown and acquisition cannot run.
    pub fn setup(&mut self) -> Result<Model, DeviceError<P>> {
        self.handoff.disarm();
        let model = self.device.setup()?;
        self.channels.reset(model.channels());
        Ok(model)
    }

    pub fn handoff(&self) -> &'a Handoff {
        self.handoff
    }

    pub fn session(&self) -> &'a Session {
        self.handoff.session()
    }

    pub fn mode(&self) -> Mode {
        self.session().mode()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn model(&self) -> Option<Model> {
        self.device.model()
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn protocol(&self) -> ProtocolMode {
        self.protocol
    }

    pub fn set_protocol(&mut self, protocol: ProtocolMode) {
        info!("protocol {}", protocol);
        self.protocol = protocol;
    }

    pub fn encoding(&self) -> DataEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: DataEncoding) {
        self.encoding = encoding;
    }

    pub fn micros(&self) -> u64 {
        self.clock.micros()
    }

    pub fn set_led(&mut self, on: bool) {
        let res = if on { self.led.set_high() } else { self.led.set_low() };
        if res.is_err() {
            warn!("status LED not driven");
        }
    }

    /// Fail with [`Error::Streaming`] while the converter streams.
    pub fn ensure_idle(&self) -> Result<(), DeviceError<P>> {
        match self.mode() {
            Mode::Continuous => Err(Error::Streaming),
            _ => Ok(()),
        }
    }

    /// Register access, refused while streaming.
    pub fn device(&mut self) -> Result<&mut Ads129x<P::Transport>, DeviceError<P>> {
        self.ensure_idle()?;
        Ok(&mut self.device)
    }

    /// Send a single-byte command. Allowed in every mode.
    pub fn command(&mut self, cmd: u8) -> Result<(), DeviceError<P>> {
        self.device.command(cmd)
    }

    /// Re-read every channel's input multiplexer and rebuild the active set.
    /// Outside of Idle the registers are left alone and the last result is
    /// returned.
    pub fn detect_active_channels(&mut self) -> Result<u8, DeviceError<P>> {
        if self.mode() != Mode::Idle {
            debug!("channel detection skipped while armed");
            return Ok(self.channels.active_count());
        }
        let max = self.device.max_channels();
        self.channels.reset(max);
        for channel in 1..=max {
            let active = self.device.channel_active(channel)?;
            self.channels.set(channel, active);
        }
        let count = self.channels.active_count();
        debug!("{=u8} of {=u8} channels active", count, max);
        Ok(count)
    }

    /// Enter continuous read mode if at least one channel is active.
    pub fn start_continuous(&mut self) -> Result<Status, DeviceError<P>> {
        if self.detect_active_channels()? == 0 {
            return Ok(Status::NoActiveChannels);
        }
        self.device.command(constants::RDATAC)?;
        self.handoff.arm(Mode::Continuous);
        info!("continuous read started");
        Ok(Status::Ok)
    }

    /// Leave continuous read mode. The session goes idle even if the bus
    /// command fails.
    pub fn stop_continuous(&mut self) -> Result<(), DeviceError<P>> {
        self.handoff.disarm();
        info!(
            "continuous read stopped at sample {=u32}, {=u32} collisions",
            self.session().sample_number(),
            self.session().collisions()
        );
        self.device.command(constants::SDATAC)
    }

    /// Arm retrieval of exactly one sample on the next data-ready edge.
    /// Refused while continuous read is on; the converter has to be taken
    /// out of it first.
    pub fn single_shot(&mut self) -> Result<Status, DeviceError<P>> {
        self.ensure_idle()?;
        if self.detect_active_channels()? == 0 {
            return Ok(Status::NoActiveChannels);
        }
        self.handoff.arm(Mode::SingleShot);
        Ok(Status::Ok)
    }

    /// Full device reset followed by the boot-time setup.
    pub fn reset(&mut self) -> Result<Model, DeviceError<P>> {
        self.handoff.disarm();
        self.device.command(constants::RESET)?;
        self.setup()
    }

    /// Clock one conversion result into the payload buffer, returning its
    /// length.
    pub(crate) fn read_payload(&mut self) -> Result<usize, DeviceError<P>> {
        let len = self.device.model().map_or(0, Model::payload_len);
        self.device.read_data(&mut self.payload[..len])?;
        Ok(len)
    }

    /// Encode the payload read last in the current protocol.
    pub(crate) fn emit_sample(
        &mut self,
        header: FrameHeader,
        len: usize,
    ) -> Result<(), codec::Error<<P::Output as embedded_io::ErrorType>::Error>> {
        let frame = SampleFrame::new(header, &self.payload[..len]);
        codec::write_sample(&mut self.out, self.protocol, self.encoding, &frame)
    }

    /// Raw access to the host port for multi-line text responses.
    pub fn out(&mut self) -> &mut P::Output {
        &mut self.out
    }

    /// Send a status response with its standard text.
    pub fn reply(&mut self, status: Status) {
        self.respond(status, status.text());
    }

    /// Send a response document, whatever the protocol.
    pub fn reply_document(&mut self, response: &Response<'_>) {
        if codec::write_document(&mut self.out, response).is_err() {
            warn!("response not written");
        }
    }

    /// Report a failed bus operation to the host.
    pub fn reply_error(&mut self, err: DeviceError<P>) {
        match err {
            Error::Streaming => self.reply(Status::Streaming),
            _ => {
                error!("device operation failed");
                self.reply(Status::Error);
            }
        }
    }
}

impl<P: Platform> Respond for Driver<'_, P> {
    fn respond(&mut self, status: Status, text: &str) {
        if codec::write_response(&mut self.out, self.protocol, status, text).is_err() {
            warn!("response not written");
        }
    }
}
