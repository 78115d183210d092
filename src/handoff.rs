//! Data-ready handoff
//!
//! The edge handler is kept to a counter bump and, when the worker is free,
//! a single wake. The wake is a [`Signal`], not a queue: a burst of edges
//! while a wake is still pending collapses into that one wake, and edges
//! arriving while the worker is busy are dropped as collisions. The counter
//! still advances for those, so sequence numbers follow wall time rather
//! than delivered samples.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::acquisition::{Mode, Session};

/// What a data-ready edge did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Nothing armed, the edge was ignored.
    Ignored,
    /// The worker was free and has been woken.
    Woke,
    /// The worker was still busy; the sample for this edge is lost.
    Collision,
}

pub struct Handoff {
    session: Session,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl Handoff {
    pub const fn new() -> Self {
        Self {
            session: Session::new(),
            wake: Signal::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Called for every falling edge of DRDY. Safe to call from interrupt
    /// context: no locks beyond the signal's critical section, no bus I/O.
    pub fn on_data_ready(&self) -> Edge {
        if !self.session.mode().is_armed() {
            return Edge::Ignored;
        }
        self.session.advance();
        if self.session.try_claim() {
            self.wake.signal(());
            Edge::Woke
        } else {
            self.session.record_collision();
            Edge::Collision
        }
    }

    /// Wait for the next wake.
    pub async fn wait(&self) {
        self.wake.wait().await
    }

    #[cfg(test)]
    pub(crate) fn try_take(&self) -> bool {
        self.wake.try_take().is_some()
    }

    /// The worker is done with its sample; the next edge may wake it again.
    ///
    /// A wake still pending here belongs to a claim that has just been
    /// serviced, so it is dropped before the busy flag is released.
    pub fn complete(&self) {
        self.wake.reset();
        self.session.release();
    }

    /// Enter `mode` with a fresh counter and an idle worker.
    pub(crate) fn arm(&self, mode: Mode) {
        self.wake.reset();
        self.session.release();
        self.session.reset_counter();
        self.session.reset_collisions();
        self.session.set_mode(mode);
    }

    /// Stop turning edges into samples. An activation already in flight is
    /// left to finish.
    pub(crate) fn disarm(&self) {
        self.session.set_mode(Mode::Idle);
    }
}

impl Default for Handoff {
    fn default() -> Self {
        Self::new()
    }
}
