//! Acquisition session state
//!
//! Everything in [`Session`] is touched from the data-ready edge as well as
//! from task context, so it is kept in atomics. The [`ChannelSet`] is only
//! ever rebuilt from task context while the device is idle.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::devices::ads129x::constants::MAX_CHANNELS;

/// Conversion mode of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Mode {
    /// Not streaming, edges are ignored.
    Idle = 0,
    /// Waiting for exactly one edge to retrieve one sample.
    SingleShot = 1,
    /// Free-running, one sample per edge.
    Continuous = 2,
}

impl Mode {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::SingleShot,
            2 => Self::Continuous,
            _ => Self::Idle,
        }
    }

    /// Whether data-ready edges should produce samples.
    pub fn is_armed(self) -> bool {
        self != Self::Idle
    }
}

pub struct Session {
    mode: AtomicU8,
    sample_number: AtomicU32,
    busy: AtomicBool,
    collisions: AtomicU32,
}

impl Session {
    pub const fn new() -> Self {
        Self {
            mode: AtomicU8::new(Mode::Idle as u8),
            sample_number: AtomicU32::new(0),
            busy: AtomicBool::new(false),
            collisions: AtomicU32::new(0),
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub(crate) fn set_mode(&self, mode: Mode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    /// Sample counter; advances on every armed edge, delivered or not.
    pub fn sample_number(&self) -> u32 {
        self.sample_number.load(Ordering::Acquire)
    }

    /// Advance the counter, wrapping at `u32::MAX`.
    pub(crate) fn advance(&self) -> u32 {
        self.sample_number.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    pub(crate) fn reset_counter(&self) {
        self.sample_number.store(0, Ordering::Release);
    }

    /// True while a sample is being transferred out.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Claim the worker; returns `false` if it was already claimed.
    pub(crate) fn try_claim(&self) -> bool {
        !self.busy.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    /// Edges dropped because the worker was still busy.
    pub fn collisions(&self) -> u32 {
        self.collisions.load(Ordering::Relaxed)
    }

    pub(crate) fn record_collision(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset_collisions(&self) {
        self.collisions.store(0, Ordering::Relaxed);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Which channel slots carry a real input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSet {
    max: u8,
    active: [bool; MAX_CHANNELS],
}

impl ChannelSet {
    pub const fn empty() -> Self {
        Self {
            max: 0,
            active: [false; MAX_CHANNELS],
        }
    }

    /// Start over for a part with `max` channels, none active.
    pub fn reset(&mut self, max: u8) {
        self.max = max.min(MAX_CHANNELS as u8);
        self.active = [false; MAX_CHANNELS];
    }

    pub fn max_channels(&self) -> u8 {
        self.max
    }

    /// Mark channel `n` (1-based).
    pub fn set(&mut self, channel: u8, active: bool) {
        if (1..=self.max).contains(&channel) {
            self.active[channel as usize - 1] = active;
        }
    }

    pub fn is_active(&self, channel: u8) -> bool {
        (1..=self.max).contains(&channel) && self.active[channel as usize - 1]
    }

    pub fn active_count(&self) -> u8 {
        self.active[..self.max as usize]
            .iter()
            .filter(|a| **a)
            .count() as u8
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        Self::empty()
    }
}
