//! Emulation side of the frame handshake.
//!
//! Each accepted turn runs the same sequence: snapshot the input, feed it to
//! the engine, emulate one frame, publish video (plus sound and state when the
//! layout carries them), then flip the control byte to screen-ready. Nothing in
//! the Input section is touched again until the host flips it back.

use crate::config::{FrameCounterOwner, LoopConfig};
use crate::engine::Engine;
use crate::error::{FrameLoopError, FrameLoopResult};
use crate::snapshot::InputSnapshot;
use crate::video::transfer_frame;
use log::{debug, trace, warn};
use shmem_transport::{SharedRegion, Turn};

/// Callback invoked with the frame number and region every N frames.
pub type CheckpointFn<'r> = Box<dyn FnMut(u64, &SharedRegion<'_>) + 'r>;

/// Result of a single poll of the control byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// A frame was emulated and published; carries the frame number.
    Frame(u64),
    /// Not our turn; carries what was observed.
    Waiting(Turn),
    /// The host asked the loop to stop.
    Exit,
}

/// Totals reported when [`FrameLoop::run`] returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    /// Polls that found an unrecognised control value.
    pub desync_polls: u64,
    /// Control value that ended the run, `2` or `0xFF`.
    pub exit_value: Option<u8>,
}

/// Drives an [`Engine`] from the control byte of a shared region.
pub struct FrameLoop<'r> {
    region: &'r SharedRegion<'r>,
    config: LoopConfig,
    checkpoint: Option<CheckpointFn<'r>>,
    frames: u64,
    desync_polls: u64,
    last_desync: Option<u8>,
    exit_value: Option<u8>,
}

impl<'r> FrameLoop<'r> {
    pub fn new(region: &'r SharedRegion<'r>, config: LoopConfig) -> Self {
        Self {
            region,
            config,
            checkpoint: None,
            frames: 0,
            desync_polls: 0,
            last_desync: None,
            exit_value: None,
        }
    }

    /// Installs the periodic callback. It runs on the loop's thread right
    /// before the turn is handed back and must not block.
    pub fn with_checkpoint(mut self, checkpoint: impl FnMut(u64, &SharedRegion<'_>) + 'r) -> Self {
        self.checkpoint = Some(Box::new(checkpoint));
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Frames published so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            frames: self.frames,
            desync_polls: self.desync_polls,
            exit_value: self.exit_value,
        }
    }

    /// Polls until the host requests exit, running one frame per input turn.
    ///
    /// There is no timeout: the loop ends on an exit value or not at all.
    pub fn run<E: Engine + ?Sized>(&mut self, engine: &mut E) -> FrameLoopResult<RunSummary> {
        loop {
            match self.step(engine)? {
                StepOutcome::Frame(_) => {}
                StepOutcome::Waiting(_) => self.config.poll.pause(),
                StepOutcome::Exit => return Ok(self.summary()),
            }
        }
    }

    /// Checks the control byte once and acts on it without sleeping.
    pub fn step<E: Engine + ?Sized>(&mut self, engine: &mut E) -> FrameLoopResult<StepOutcome> {
        let raw = self.region.handshake().raw();
        match Turn::from_byte(raw) {
            Turn::InputReady => {
                self.last_desync = None;
                self.run_frame(engine).map(StepOutcome::Frame)
            }
            Turn::Exit => {
                debug!("exit ({raw:#04x}) requested after {} frames", self.frames);
                self.exit_value = Some(raw);
                Ok(StepOutcome::Exit)
            }
            Turn::ScreenReady => {
                self.last_desync = None;
                Ok(StepOutcome::Waiting(Turn::ScreenReady))
            }
            Turn::Desync(value) => {
                self.desync_polls += 1;
                if self.last_desync != Some(value) {
                    warn!("unexpected control byte {value:#04x}; waiting for input-ready");
                    self.last_desync = Some(value);
                } else {
                    trace!("control byte still {value:#04x}");
                }
                Ok(StepOutcome::Waiting(Turn::Desync(value)))
            }
        }
    }

    fn run_frame<E: Engine + ?Sized>(&mut self, engine: &mut E) -> FrameLoopResult<u64> {
        let region = self.region;
        let frame = self.frames + 1;

        let input = InputSnapshot::capture(&region.input());
        engine.apply_input(&input);
        engine.run_frame();

        if engine.display_screen() {
            let source = engine.frame();
            let report = transfer_frame(&source, &region.video())
                .map_err(|source| FrameLoopError::Layout { frame, source })?;
            trace!(
                "frame {frame}: visible {}-{} x {}-{}, {} bytes",
                source.visible.left,
                source.visible.right,
                source.visible.top,
                source.visible.bottom,
                report.bytes
            );
        }

        if let Some(sound) = region.sound() {
            // SAFETY: it is the emulation side's turn, so the host does not touch the
            // Sound section, and no other view of it is live here.
            let written = unsafe { sound.with_mut(|out| engine.fill_sound(out)) };
            trace!("frame {frame}: {written} sound bytes");
        }
        if let Some(state) = region.state() {
            // SAFETY: as for the Sound section.
            let written = unsafe { state.with_mut(|out| engine.save_state(out)) };
            trace!("frame {frame}: {written} state bytes");
        }

        self.frames = frame;
        if self.config.frame_counter == FrameCounterOwner::Emulator {
            region.input().set_frame_count(frame as u32);
        }

        if let (Some(interval), Some(checkpoint)) =
            (self.config.checkpoint_interval, self.checkpoint.as_mut())
        {
            if frame % u64::from(interval.get()) == 0 {
                checkpoint(frame, region);
            }
        }

        region.handshake().publish_screen_ready();
        Ok(frame)
    }
}
