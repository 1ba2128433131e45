//! Turn-taking on the control byte of the Input section.
//!
//! The control byte is the only synchronization signal between host and
//! emulation side. Each side only writes its own half of the region during its
//! turn and hands the turn over with a single byte store. Loads use acquire and
//! stores use release ordering so the frame (or input) written before the
//! hand-over is visible once the peer observes the new value.

use crate::schema::{CONTROL_EXIT, CONTROL_EXIT_ALT, CONTROL_INPUT_READY, CONTROL_SCREEN_READY};
use core::sync::atomic::{AtomicU8, Ordering};

/// Decoded value of the control byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Turn {
    /// `0`: host wrote input, emulation side may run a frame.
    InputReady,
    /// `1`: a frame is published, host may read it and write input.
    ScreenReady,
    /// `2` or `0xFF`: the host asked the loop to stop.
    Exit,
    /// Any other value. Treated as "not ready yet" and polled again.
    Desync(u8),
}

impl Turn {
    pub const fn from_byte(value: u8) -> Self {
        match value {
            CONTROL_INPUT_READY => Turn::InputReady,
            CONTROL_SCREEN_READY => Turn::ScreenReady,
            CONTROL_EXIT | CONTROL_EXIT_ALT => Turn::Exit,
            other => Turn::Desync(other),
        }
    }

    pub const fn to_byte(self) -> u8 {
        match self {
            Turn::InputReady => CONTROL_INPUT_READY,
            Turn::ScreenReady => CONTROL_SCREEN_READY,
            Turn::Exit => CONTROL_EXIT,
            Turn::Desync(value) => value,
        }
    }
}

/// Handle to the control byte of a bound region.
#[derive(Clone, Copy)]
pub struct Handshake<'r> {
    control: &'r AtomicU8,
}

impl<'r> Handshake<'r> {
    pub(crate) fn new(control: &'r AtomicU8) -> Self {
        Self { control }
    }

    /// Raw control byte as currently stored.
    #[inline]
    pub fn raw(&self) -> u8 {
        self.control.load(Ordering::Acquire)
    }

    /// Current turn.
    #[inline]
    pub fn observe(&self) -> Turn {
        Turn::from_byte(self.raw())
    }

    /// Emulation side: frame published, hand the turn to the host.
    #[inline]
    pub fn publish_screen_ready(&self) {
        self.control.store(Turn::ScreenReady.to_byte(), Ordering::Release);
    }

    /// Host side: input written, hand the turn to the emulation side.
    #[inline]
    pub fn publish_input_ready(&self) {
        self.control.store(Turn::InputReady.to_byte(), Ordering::Release);
    }

    /// Host side: ask the emulation loop to stop.
    #[inline]
    pub fn request_exit(&self) {
        self.control.store(Turn::Exit.to_byte(), Ordering::Release);
    }

    /// Stores an arbitrary byte. Meant for hosts and tests that need to
    /// reproduce foreign control values.
    #[inline]
    pub fn store_raw(&self, value: u8) {
        self.control.store(value, Ordering::Release);
    }
}

impl core::fmt::Debug for Handshake<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Handshake")
            .field("turn", &self.observe())
            .finish()
    }
}
