//! Sample worker
//!
//! Woken by the data-ready handoff, it retrieves one conversion result,
//! stamps it and writes it out in whatever protocol is selected at that
//! moment, then releases the busy flag so the next edge can wake it again.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

use crate::acquisition::Mode;
use crate::devices::ads129x::constants::RDATA;
use crate::driver::{Driver, Platform};
use crate::frame::FrameHeader;
use crate::handoff::Handoff;

/// Run one activation against an already locked driver.
///
/// The header carries the counter as it stood right after the bus read;
/// edges arriving while the frame is being written do not change it. A wake
/// consumed after the session was disarmed delivers nothing.
///
/// An activation only runs while an edge holds the busy claim. A wake taken
/// before a re-arm released that claim is stale and touches nothing.
pub fn service_sample<P: Platform>(driver: &mut Driver<'_, P>) {
    let handoff = driver.handoff();
    if !handoff.session().is_busy() {
        debug!("stale wake dropped");
        return;
    }
    let mode = handoff.session().mode();
    if mode.is_armed() {
        acquire(driver, mode);
    }
    if mode == Mode::SingleShot {
        handoff.disarm();
    }
    handoff.complete();
}

fn acquire<P: Platform>(driver: &mut Driver<'_, P>, mode: Mode) {
    if mode == Mode::SingleShot && driver.command(RDATA).is_err() {
        error!("RDATA not sent");
        return;
    }
    let len = match driver.read_payload() {
        Ok(len) => len,
        Err(_) => {
            error!("sample read failed");
            return;
        }
    };
    let header = FrameHeader::new(driver.micros(), driver.session().sample_number());
    if driver.emit_sample(header, len).is_err() {
        warn!("sample {=u32} not written", header.sample_number);
    }
}

/// Wait for one wake and service it.
pub async fn step<M: RawMutex, P: Platform>(handoff: &Handoff, driver: &Mutex<M, Driver<'_, P>>) {
    handoff.wait().await;
    let mut driver = driver.lock().await;
    service_sample(&mut *driver);
}

pub async fn run<M: RawMutex, P: Platform>(handoff: &Handoff, driver: &Mutex<M, Driver<'_, P>>) -> ! {
    loop {
        step(handoff, driver).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{document_commands, text_commands};
    use crate::devices::ads129x::constants::*;
    use crate::handoff::Edge;
    use crate::sim::{self, SimPlatform};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    fn decode_line(line: &str) -> Vec<u8> {
        let mut buf = [0u8; 64];
        let len = STANDARD.decode_slice(line, &mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn collisions_advance_counter_without_frames() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1294_ID, &handoff);
        bench.sim.set_register(CHNSET + 1, MUX_NORMAL);
        driver.start_continuous().unwrap();

        assert_eq!(handoff.on_data_ready(), Edge::Woke);
        for _ in 0..4 {
            assert_eq!(handoff.on_data_ready(), Edge::Collision);
        }
        assert!(handoff.try_take());
        service_sample(&mut driver);

        let text = bench.out.take_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let bytes = decode_line(lines[0]);
        assert_eq!(bytes[4..8], 5u32.to_le_bytes());
        assert_eq!(bytes[8..], bench.sim.frame()[..]);
        assert!(!handoff.session().is_busy());
        assert_eq!(handoff.session().collisions(), 4);
    }

    #[test]
    fn frames_carry_time_and_sequence() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1299_ID, &handoff);
        bench.sim.set_register(CHNSET + 2, MUX_NORMAL);
        driver.start_continuous().unwrap();
        bench.clock.set(0x1_0000_0010);

        for expected in 1..=3u32 {
            handoff.on_data_ready();
            service_sample(&mut driver);
            let bytes = decode_line(bench.out.take_string().trim_end());
            assert_eq!(bytes[..4], 0x10u32.to_le_bytes());
            assert_eq!(bytes[4..8], expected.to_le_bytes());
            assert_eq!(bytes.len(), 8 + 27);
        }
    }

    #[test]
    fn protocol_switch_applies_to_the_next_frame() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1299_4_ID, &handoff);
        bench.sim.set_register(CHNSET + 1, MUX_NORMAL);
        let text = text_commands::<SimPlatform>().unwrap();
        let documents = document_commands::<SimPlatform>().unwrap();
        text.dispatch_text(&mut driver, "rdatac");
        bench.out.take();

        handoff.on_data_ready();
        service_sample(&mut driver);
        let first = bench.out.take_string();

        // switches land between the edge and the worker running
        handoff.on_data_ready();
        text.dispatch_text(&mut driver, "hex");
        bench.out.take();
        service_sample(&mut driver);
        let second = bench.out.take_string();

        handoff.on_data_ready();
        text.dispatch_text(&mut driver, "messagepack");
        assert_eq!(bench.out.take_string(), "{\"STATUS_CODE\":200,\"STATUS_TEXT\":\"Ok\"}\n");
        service_sample(&mut driver);
        let third = bench.out.take();

        handoff.on_data_ready();
        documents.dispatch_document(&mut driver, br#"{"COMMAND":"jsonlines"}"#);
        bench.out.take();
        service_sample(&mut driver);
        let fourth = bench.out.take_string();

        assert_eq!(driver.mode(), Mode::Continuous);
        assert_eq!(decode_line(first.trim_end()).len(), 23);
        assert_eq!(second.trim_end().len(), 46);
        assert!(second.trim_end().bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(third[..8], [0x82, 0xA1, b'C', 0xCC, 0xC8, 0xA1, b'D', 0xC4]);
        assert_eq!(third[8], 23);
        assert_eq!(third.len(), 9 + 23);
        let body = fourth
            .strip_prefix("{\"C\":200,\"D\":\"")
            .and_then(|rest| rest.strip_suffix("\"}\n"))
            .unwrap();
        let bytes = decode_line(body);
        assert_eq!(bytes[4..8], 4u32.to_le_bytes());
    }

    #[test]
    fn wake_taken_before_rearm_does_not_repeat_a_frame() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1298_ID, &handoff);
        bench.sim.set_register(CHNSET + 3, MUX_NORMAL);
        driver.start_continuous().unwrap();

        // the worker takes this wake, then waits on the lock while the
        // command side restarts streaming
        assert_eq!(handoff.on_data_ready(), Edge::Woke);
        assert!(handoff.try_take());
        driver.stop_continuous().unwrap();
        driver.start_continuous().unwrap();
        bench.out.take();

        assert_eq!(handoff.on_data_ready(), Edge::Woke);
        service_sample(&mut driver);
        assert!(!handoff.session().is_busy());
        assert!(!handoff.try_take());
        service_sample(&mut driver);

        let text = bench.out.take_string();
        assert_eq!(text.lines().count(), 1);
        let bytes = decode_line(text.trim_end());
        assert_eq!(bytes[4..8], 1u32.to_le_bytes());
    }

    #[test]
    fn stale_wake_before_any_new_edge_is_dropped() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1294_ID, &handoff);
        bench.sim.set_register(CHNSET + 1, MUX_NORMAL);
        driver.start_continuous().unwrap();

        handoff.on_data_ready();
        driver.stop_continuous().unwrap();
        driver.start_continuous().unwrap();
        bench.out.take();
        bench.sim.clear_log();

        service_sample(&mut driver);
        assert!(bench.out.take().is_empty());
        assert!(bench.sim.wire().is_empty());
        assert!(!handoff.session().is_busy());
        assert_eq!(handoff.on_data_ready(), Edge::Woke);
    }

    #[test]
    fn single_shot_sends_rdata_and_returns_to_idle() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1296_ID, &handoff);
        bench.sim.set_register(CHNSET + 6, MUX_NORMAL);
        driver.single_shot().unwrap();

        assert_eq!(handoff.on_data_ready(), Edge::Woke);
        service_sample(&mut driver);
        assert_eq!(bench.sim.commands(), [RDATA]);
        assert_eq!(driver.mode(), Mode::Idle);
        assert_eq!(bench.out.take_string().lines().count(), 1);
        assert_eq!(handoff.on_data_ready(), Edge::Ignored);
    }

    #[test]
    fn wake_after_disarm_delivers_nothing() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1298_ID, &handoff);
        bench.sim.set_register(CHNSET + 1, MUX_NORMAL);
        driver.start_continuous().unwrap();
        handoff.on_data_ready();
        driver.stop_continuous().unwrap();
        bench.out.take();

        service_sample(&mut driver);
        assert!(bench.out.take().is_empty());
        assert!(!handoff.session().is_busy());
    }

    #[test]
    fn step_waits_for_the_wake_and_locks_the_driver() {
        let handoff = Handoff::new();
        let (mut driver, bench) = sim::driver(sim::ADS1294_ID, &handoff);
        bench.sim.set_register(CHNSET + 4, MUX_NORMAL);
        driver.start_continuous().unwrap();
        let driver: Mutex<NoopRawMutex, _> = Mutex::new(driver);

        handoff.on_data_ready();
        embassy_futures::block_on(step(&handoff, &driver));
        assert_eq!(bench.out.take_string().lines().count(), 1);
        assert!(!handoff.session().is_busy());
        assert_eq!(bench.sim.stray_bytes(), 0);
    }
}
