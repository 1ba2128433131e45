//! Run-loop configuration.

use core::num::NonZeroU32;
use shmem_transport::PollPolicy;

/// Frames between two checkpoint callbacks by default.
pub const DEFAULT_CHECKPOINT_INTERVAL: u32 = 100;

/// Which side writes the frame counter in the Input section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameCounterOwner {
    /// The emulation side stores the number of published frames before every
    /// hand-over; host writes leave the counter alone.
    #[default]
    Emulator,
    /// The host writes the counter with its input and the emulation side only
    /// reads it.
    Host,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopConfig {
    /// Delay between polls while it is not the emulation side's turn.
    pub poll: PollPolicy,
    /// Invoke the checkpoint callback after every this many frames.
    pub checkpoint_interval: Option<NonZeroU32>,
    pub frame_counter: FrameCounterOwner,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            checkpoint_interval: NonZeroU32::new(DEFAULT_CHECKPOINT_INTERVAL),
            frame_counter: FrameCounterOwner::default(),
        }
    }
}
