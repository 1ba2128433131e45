#![deny(unsafe_op_in_unsafe_fn)]
//! Shared-memory primitives for driving an emulation loop frame by frame.
//!
//! This crate exposes the pieces both sides of the link agree on:
//! * [`RegionLayout`] – compile-time offsets of the Input, Video, Sound and State sections.
//! * [`SharedRegion`] – self-owned or borrowed backing memory with typed section views.
//! * [`InputRecord`] – the byte-exact input record the host writes every frame.
//! * [`Handshake`] / [`Turn`] – turn-taking on the control byte.
//! * [`PollPolicy`] – fixed-interval polling used instead of a blocking wait.

mod error;
mod handshake;
pub mod layout;
mod region;
pub mod schema;
pub mod wait;

pub use error::{LayoutError, RegionError, RegionResult};
pub use handshake::{Handshake, Turn};
pub use layout::{
    DisplayGeometry, RegionLayout, SectionSpan, Sections, INPUT_SIZE, LAYOUT, SOUND_SIZE,
    STATE_SIZE, TOTAL_SIZE,
};
pub use region::{InputView, Ownership, SectionView, SharedRegion};
pub use schema::*;
pub use wait::{PollPolicy, WaitResult, DEFAULT_POLL_INTERVAL};
