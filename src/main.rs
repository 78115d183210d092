#![no_std]
#![no_main]

use cortex_m_rt::entry;
use defmt::{error, info, trace, warn};
use embassy_executor::{Executor, InterruptExecutor};
use embassy_rp::bind_interrupts;
use embassy_rp::block::ImageDef;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::{SPI0, UART0};
use embassy_rp::spi::{self, Spi};
use embassy_rp::uart::{self, BufferedInterruptHandler, BufferedUart, BufferedUartRx, BufferedUartTx};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Delay, Duration, Instant, Timer};
use embedded_io_async::{Read, ReadReady};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use hackeeg_pico::bus::SpiTransport;
use hackeeg_pico::config::Config;
use hackeeg_pico::driver::{Clock, Driver, Platform};
use hackeeg_pico::handoff::{Edge, Handoff};
use hackeeg_pico::reader::CommandReader;
use hackeeg_pico::worker;

/// Tell the Boot ROM about our application
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// SPI mode 1 (CPOL = 0, CPHA = 1)
const SPI_FREQ_HZ: u32 = 4_000_000;
const UART_BAUD: u32 = 921_600;
const UART_TX_BUF: usize = 2048;
const UART_RX_BUF: usize = 256;

/// Microseconds since boot from the embassy time driver.
struct Uptime;

impl Clock for Uptime {
    fn micros(&self) -> u64 {
        Instant::now().as_micros()
    }
}

/// Pico 2 wiring.
struct Board;

impl Platform for Board {
    type Transport = SpiTransport<Spi<'static, SPI0, spi::Blocking>, Output<'static>, Delay>;
    type Output = BufferedUartTx<'static, UART0>;
    type Led = Output<'static>;
    type Clock = Uptime;
}

type SharedDriver = Mutex<CriticalSectionRawMutex, Driver<'static, Board>>;

static HANDOFF: Handoff = Handoff::new();
static DRIVER: StaticCell<SharedDriver> = StaticCell::new();

static EXECUTOR_EDGE: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR_SAMPLE: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR_COMMAND: StaticCell<Executor> = StaticCell::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_EDGE.on_interrupt()
}

#[interrupt]
unsafe fn SWI_IRQ_0() {
    EXECUTOR_SAMPLE.on_interrupt()
}

/// Turns each falling edge of DRDY into a counter bump and, when the worker
/// is free, one wake.
#[embassy_executor::task]
async fn drdy_task(mut drdy: Input<'static>, handoff: &'static Handoff) -> ! {
    loop {
        drdy.wait_for_falling_edge().await;
        if handoff.on_data_ready() == Edge::Collision {
            trace!("collision");
        }
    }
}

#[embassy_executor::task]
async fn sample_task(handoff: &'static Handoff, driver: &'static SharedDriver) -> ! {
    worker::run(handoff, driver).await
}

/// Polls the host port on a fixed period and dispatches complete commands.
#[embassy_executor::task]
async fn command_task(
    mut rx: BufferedUartRx<'static, UART0>,
    mut reader: CommandReader<'static, Board>,
    driver: &'static SharedDriver,
    poll_period_ms: u64,
) -> ! {
    let mut buf = [0u8; 64];
    loop {
        Timer::after_millis(poll_period_ms).await;
        while rx.read_ready().unwrap_or(false) {
            let n = match rx.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    warn!("host port read failed: {}", e);
                    break;
                }
            };
            let mut driver = driver.lock().await;
            reader.feed(&mut driver, &buf[..n]);
        }
    }
}

/// Nothing sensible can run without knowing the converter; blink forever.
fn halt(driver: &mut Driver<'static, Board>) -> ! {
    let mut on = false;
    loop {
        on = !on;
        driver.set_led(on);
        embassy_time::block_for(Duration::from_millis(100));
    }
}

#[entry]
fn main() -> ! {
    let p = embassy_rp::init(Default::default());
    let config = Config::DEFAULT;
    info!("{=str} {=str} starting", config.board_name, config.driver_version);

    // Converter control lines
    let _clksel = Output::new(p.PIN_26, Level::High); // internal oscillator
    let _pwdn = Output::new(p.PIN_27, Level::High);
    let _start = Output::new(p.PIN_22, Level::Low); // conversions by command
    let mut reset = Output::new(p.PIN_21, Level::High);
    embassy_time::block_for(Duration::from_millis(150));
    reset.set_low();
    embassy_time::block_for(Duration::from_micros(10));
    reset.set_high();
    embassy_time::block_for(Duration::from_micros(20));

    let mut spi_config = spi::Config::default();
    spi_config.frequency = SPI_FREQ_HZ;
    spi_config.phase = spi::Phase::CaptureOnSecondTransition;
    spi_config.polarity = spi::Polarity::IdleLow;
    let spi = Spi::new_blocking(p.SPI0, p.PIN_18, p.PIN_19, p.PIN_16, spi_config);
    let cs = Output::new(p.PIN_17, Level::High);
    let drdy = Input::new(p.PIN_20, Pull::Up);
    let led = Output::new(p.PIN_25, Level::Low);

    static TX_BUF: StaticCell<[u8; UART_TX_BUF]> = StaticCell::new();
    static RX_BUF: StaticCell<[u8; UART_RX_BUF]> = StaticCell::new();
    let mut uart_config = uart::Config::default();
    uart_config.baudrate = UART_BAUD;
    let uart = BufferedUart::new(
        p.UART0,
        Irqs,
        p.PIN_0,
        p.PIN_1,
        TX_BUF.init([0; UART_TX_BUF]),
        RX_BUF.init([0; UART_RX_BUF]),
        uart_config,
    );
    let (tx, rx) = uart.split();

    let mut driver = Driver::<Board>::new(
        SpiTransport::new(spi, cs, Delay),
        tx,
        led,
        Uptime,
        &HANDOFF,
        config,
    );
    match driver.setup() {
        Ok(model) => info!("{=str}, {=u8} channels", model.name(), model.channels()),
        Err(e) => {
            error!("converter setup failed: {}", e);
            halt(&mut driver);
        }
    }
    let driver: &'static SharedDriver = DRIVER.init(Mutex::new(driver));

    let reader = CommandReader::<Board>::new(config.terminator).unwrap();

    interrupt::SWI_IRQ_1.set_priority(Priority::P1);
    let spawner = EXECUTOR_EDGE.start(interrupt::SWI_IRQ_1);
    spawner.spawn(drdy_task(drdy, &HANDOFF)).unwrap();

    interrupt::SWI_IRQ_0.set_priority(Priority::P2);
    let spawner = EXECUTOR_SAMPLE.start(interrupt::SWI_IRQ_0);
    spawner.spawn(sample_task(&HANDOFF, driver)).unwrap();

    let executor = EXECUTOR_COMMAND.init(Executor::new());
    executor.run(|spawner| {
        spawner
            .spawn(command_task(rx, reader, driver, config.poll_period_ms))
            .unwrap();
    })
}
