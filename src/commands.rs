//! Host commands
//!
//! Both front ends share one set of handlers. The text table binds `rreg`
//! and `wreg` to variants that parse hex tokens; the document table binds
//! them to variants taking the numeric `PARAMETERS` directly.

use core::fmt;

use embedded_io::Write as _;

use crate::codec::{BoardStatus, Data, DataEncoding, ProtocolMode, Response, Status};
use crate::command::{self, Args, CommandTable, DefaultHandler, Handler, Respond};
use crate::devices::ads129x::constants::{START, STANDBY, STOP, WAKEUP};
use crate::driver::{Driver, Platform};

pub const MAX_COMMANDS: usize = 32;

pub type Commands<'a, P> = CommandTable<Driver<'a, P>, MAX_COMMANDS>;

const BASE64_ON: &str = "Base64 mode on - rdata command will respond with base64 encoded data.";
const HEX_ON: &str = "Hex mode on - rdata command will respond with hex encoded data";
const HELP_UNAVAILABLE: &str = "Help not available in JSON Lines or MessagePack modes.";

/// Commands for the whitespace-tokenized text front end.
pub fn text_commands<'a, P: Platform>() -> Result<Commands<'a, P>, command::Error> {
    build(
        unrecognized_text::<P>,
        Handler::Text(read_register_text::<P>),
        Handler::Text(write_register_text::<P>),
    )
}

/// Commands for the structured-document front end.
pub fn document_commands<'a, P: Platform>() -> Result<Commands<'a, P>, command::Error> {
    build(
        unrecognized_document::<P>,
        Handler::Fixed(read_register_direct::<P>),
        Handler::Fixed(write_register_direct::<P>),
    )
}

fn build<'a, P: Platform>(
    default: DefaultHandler<Driver<'a, P>>,
    rreg: Handler<Driver<'a, P>>,
    wreg: Handler<Driver<'a, P>>,
) -> Result<Commands<'a, P>, command::Error> {
    let entries: [(&'static str, Handler<Driver<'a, P>>); 26] = [
        ("nop", Handler::Fixed(nop::<P>)),
        ("micros", Handler::Fixed(micros::<P>)),
        ("version", Handler::Fixed(version::<P>)),
        ("status", Handler::Fixed(status::<P>)),
        ("serialnumber", Handler::Fixed(serial_number::<P>)),
        ("text", Handler::Fixed(text::<P>)),
        ("jsonlines", Handler::Fixed(jsonlines::<P>)),
        ("messagepack", Handler::Fixed(messagepack::<P>)),
        ("ledon", Handler::Fixed(led_on::<P>)),
        ("ledoff", Handler::Fixed(led_off::<P>)),
        ("boardledon", Handler::Fixed(board_led_on::<P>)),
        ("boardledoff", Handler::Fixed(board_led_off::<P>)),
        ("wakeup", Handler::Fixed(wakeup::<P>)),
        ("standby", Handler::Fixed(standby::<P>)),
        ("reset", Handler::Fixed(reset::<P>)),
        ("start", Handler::Fixed(start::<P>)),
        ("stop", Handler::Fixed(stop::<P>)),
        ("rdatac", Handler::Fixed(rdatac::<P>)),
        ("sdatac", Handler::Fixed(sdatac::<P>)),
        ("rdata", Handler::Fixed(rdata::<P>)),
        ("rreg", rreg),
        ("wreg", wreg),
        ("base64", Handler::Fixed(base64_mode::<P>)),
        ("hex", Handler::Fixed(hex_mode::<P>)),
        ("test", Handler::Fixed(test_signal::<P>)),
        ("help", Handler::Text(help::<P>)),
    ];
    let mut table = CommandTable::new(default);
    for (name, handler) in entries {
        table.register(name, handler)?;
    }
    Ok(table)
}

/// Free-form text straight to the host port.
fn print<P: Platform>(d: &mut Driver<'_, P>, args: fmt::Arguments<'_>) {
    if d.out().write_fmt(args).is_err() {
        warn!("response not written");
    }
}

/// Hex byte with an optional `0x` prefix.
fn parse_hex(token: &str) -> Option<u8> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u8::from_str_radix(digits, 16).ok()
}

fn unrecognized_text<P: Platform>(d: &mut Driver<'_, P>, name: &str) {
    debug!("unrecognized command {=str}", name);
    print(d, format_args!("406 Error: Unrecognized command.\n"));
}

fn unrecognized_document<P: Platform>(d: &mut Driver<'_, P>, name: &str) {
    debug!("unrecognized command {=str}", name);
    d.reply_document(&Response::new(
        Status::UnrecognizedCommand,
        Status::UnrecognizedCommand.text(),
    ));
}

fn nop<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    d.reply(Status::Ok);
}

fn micros<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    let now = d.micros();
    match d.protocol() {
        ProtocolMode::PlainText => print(d, format_args!("200 Ok\n{}\n", now)),
        _ => d.reply_document(&Response::new(Status::Ok, Status::Ok.text()).with_data(Data::Number(now))),
    }
}

fn version<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    let version = d.config().driver_version;
    d.respond(Status::Ok, version);
}

fn status<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    let active = match d.detect_active_channels() {
        Ok(active) => active,
        Err(e) => return d.reply_error(e),
    };
    let config = *d.config();
    let board = BoardStatus {
        driver_version: config.driver_version,
        board_name: config.board_name,
        maker_name: config.maker_name,
        hardware_type: config.hardware_type,
        max_channels: d.channels().max_channels(),
        active_channels: active,
    };
    match d.protocol() {
        ProtocolMode::PlainText => print(
            d,
            format_args!(
                "200 Ok\nDriver version: {}\nBoard name: {}\nBoard maker: {}\nHardware type: {}\nMax channels: {}\nNumber of active channels: {}\n\n",
                board.driver_version,
                board.board_name,
                board.maker_name,
                board.hardware_type,
                board.max_channels,
                board.active_channels,
            ),
        ),
        _ => d.reply_document(&Response::new(Status::Ok, Status::Ok.text()).with_data(Data::Board(board))),
    }
}

fn serial_number<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    d.reply(Status::NotImplemented);
}

fn switch_protocol<P: Platform>(d: &mut Driver<'_, P>, protocol: ProtocolMode) {
    d.set_protocol(protocol);
    d.reply(Status::Ok);
}

fn text<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    switch_protocol(d, ProtocolMode::PlainText);
}

fn jsonlines<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    switch_protocol(d, ProtocolMode::LineDocument);
}

fn messagepack<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    switch_protocol(d, ProtocolMode::BinaryMap);
}

fn led_on<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    d.set_led(true);
    d.reply(Status::Ok);
}

fn led_off<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    d.set_led(false);
    d.reply(Status::Ok);
}

fn board_led<P: Platform>(d: &mut Driver<'_, P>, on: bool) {
    match d.device().and_then(|dev| dev.set_board_led(on)) {
        Ok(()) => d.reply(Status::Ok),
        Err(e) => d.reply_error(e),
    }
}

fn board_led_on<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    board_led(d, true);
}

fn board_led_off<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    board_led(d, false);
}

fn send<P: Platform>(d: &mut Driver<'_, P>, cmd: u8) {
    match d.command(cmd) {
        Ok(()) => d.reply(Status::Ok),
        Err(e) => d.reply_error(e),
    }
}

fn wakeup<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    send(d, WAKEUP);
}

fn standby<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    send(d, STANDBY);
}

fn reset<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    match d.reset() {
        Ok(_) => d.reply(Status::Ok),
        Err(e) => d.reply_error(e),
    }
}

fn start<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    d.session().reset_counter();
    send(d, START);
}

fn stop<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    send(d, STOP);
}

fn rdatac<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    match d.start_continuous() {
        Ok(status) => d.reply(status),
        Err(e) => d.reply_error(e),
    }
}

fn sdatac<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    match d.stop_continuous() {
        Ok(()) => d.reply(Status::Ok),
        Err(e) => d.reply_error(e),
    }
}

fn rdata<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    match d.single_shot() {
        Ok(status) => d.reply(status),
        Err(e) => d.reply_error(e),
    }
}

fn read_register_text<P: Platform>(d: &mut Driver<'_, P>, args: &mut Args<'_>) {
    match args.next().map(parse_hex) {
        None => d.reply(Status::MissingRegister),
        Some(None) => d.reply(Status::ExpectedHex),
        Some(Some(reg)) => match d.device().and_then(|dev| dev.read_register(reg)) {
            Ok(value) => print(d, format_args!("200 Ok (Read Register {:#x})\n{:#x}\n", reg, value)),
            Err(e) => d.reply_error(e),
        },
    }
    print(d, format_args!("\n"));
}

fn write_register_text<P: Platform>(d: &mut Driver<'_, P>, args: &mut Args<'_>) {
    match (args.next(), args.next()) {
        (None, _) => d.reply(Status::MissingRegister),
        (Some(_), None) => d.reply(Status::MissingValue),
        (Some(reg), Some(value)) => match (parse_hex(reg), parse_hex(value)) {
            (Some(reg), Some(value)) => match d.device().and_then(|dev| dev.write_register(reg, value)) {
                Ok(()) => print(d, format_args!("200 Ok (Write Register {:#x} {:#x})\n", reg, value)),
                Err(e) => d.reply_error(e),
            },
            _ => d.reply(Status::ExpectedHex),
        },
    }
    print(d, format_args!("\n"));
}

fn read_register_direct<P: Platform>(d: &mut Driver<'_, P>, reg: u8, _: u8) {
    match d.device().and_then(|dev| dev.read_register(reg)) {
        Ok(value) => d.reply_document(
            &Response::new(Status::Ok, Status::Ok.text()).with_data(Data::Number(value.into())),
        ),
        Err(e) => d.reply_error(e),
    }
}

fn write_register_direct<P: Platform>(d: &mut Driver<'_, P>, reg: u8, value: u8) {
    match d.device().and_then(|dev| dev.write_register(reg, value)) {
        Ok(()) => d.reply(Status::Ok),
        Err(e) => d.reply_error(e),
    }
}

fn base64_mode<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    d.set_encoding(DataEncoding::Base64);
    d.respond(Status::Ok, BASE64_ON);
}

fn hex_mode<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    d.set_encoding(DataEncoding::Hex);
    d.respond(Status::Ok, HEX_ON);
}

/// Internal square-wave on every channel, then stream.
fn test_signal<P: Platform>(d: &mut Driver<'_, P>, _: u8, _: u8) {
    if let Err(e) = d.device().and_then(|dev| dev.configure_test_signal()) {
        return d.reply_error(e);
    }
    rdatac(d, 0, 0);
}

fn help<P: Platform>(d: &mut Driver<'_, P>, args: &mut Args<'_>) {
    if d.protocol() != ProtocolMode::PlainText {
        return d.respond(Status::Ok, HELP_UNAVAILABLE);
    }
    print(d, format_args!("200 Ok\nAvailable commands: \n"));
    for name in args.commands() {
        print(d, format_args!("{}\n", name));
    }
    print(d, format_args!("\n"));
}
