//! Frame-synchronous loop that lets a host drive an emulation engine through a
//! shared region.
//!
//! The emulation side runs [`FrameLoop`]; the host side uses [`HostDriver`].
//! Per frame: [`InputSnapshot`] captures the input, the [`Engine`] advances one
//! frame, [`transfer_frame`] publishes the visible crop, and the control byte
//! flips back to the host. [`debug_dump`] renders video buffers as text.

mod config;
pub mod debug_dump;
mod engine;
mod error;
mod host;
mod run_loop;
mod snapshot;
mod video;

pub use config::{FrameCounterOwner, LoopConfig, DEFAULT_CHECKPOINT_INTERVAL};
pub use debug_dump::{render as render_dump, DumpWindow};
pub use engine::{Engine, FrameSource, VisibleArea};
pub use error::{FrameLoopError, FrameLoopResult};
pub use host::HostDriver;
pub use run_loop::{CheckpointFn, FrameLoop, RunSummary, StepOutcome};
pub use snapshot::{
    Command, InputSnapshot, JoystickState, KeyState, MouseMode, MouseState, JOY_CENTRE,
};
pub use video::{transfer_frame, TransferReport};
