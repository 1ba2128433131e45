//! Host side of the frame handshake.
//!
//! A host waits for screen-ready, reads what it needs from the Video (and
//! Sound/State) sections, writes the next input record and flips the control
//! byte back to input-ready. Exit is requested by storing the exit value
//! instead.

use log::debug;
use shmem_transport::{InputRecord, PollPolicy, SharedRegion, Turn, WaitResult};
use std::time::Instant;

/// Drives the host half of the protocol over a bound region.
#[derive(Clone, Copy, Debug)]
pub struct HostDriver<'r> {
    region: &'r SharedRegion<'r>,
    poll: PollPolicy,
    writes_frame_count: bool,
}

impl<'r> HostDriver<'r> {
    pub fn new(region: &'r SharedRegion<'r>) -> Self {
        Self {
            region,
            poll: PollPolicy::default(),
            writes_frame_count: false,
        }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Makes [`submit`](HostDriver::submit) write the record's frame counter too.
    pub fn writing_frame_count(mut self, writes: bool) -> Self {
        self.writes_frame_count = writes;
        self
    }

    pub fn region(&self) -> &'r SharedRegion<'r> {
        self.region
    }

    /// Returns true when a published frame is waiting for the host.
    pub fn screen_ready(&self) -> bool {
        self.region.handshake().observe() == Turn::ScreenReady
    }

    /// Polls until the emulation side publishes a frame or `deadline` passes.
    pub fn wait_for_screen(&self, deadline: Option<Instant>) -> WaitResult<()> {
        self.poll
            .until(deadline, || self.screen_ready().then_some(()))
    }

    /// Frame counter as currently stored in the Input section.
    pub fn frame_count(&self) -> u32 {
        self.region.input().frame_count()
    }

    /// Copies the Video section into `out`, returning the byte count.
    pub fn read_video(&self, out: &mut [u8]) -> usize {
        self.region.video().read_into(out)
    }

    /// Writes the next input and hands the turn to the emulation side.
    pub fn submit(&self, record: &InputRecord) {
        self.region
            .input()
            .write_fields(record, self.writes_frame_count);
        self.region.handshake().publish_input_ready();
    }

    /// Asks the emulation loop to stop.
    pub fn request_exit(&self) {
        debug!("host requesting exit");
        self.region.handshake().request_exit();
    }
}
