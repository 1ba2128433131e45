//! Wire format of the Input section.
//!
//! [`InputRecord`] is the byte-exact structure the host writes at the start of
//! the shared region. Field order and widths are frozen: any change must be
//! made on the host side at the same time, since nothing is negotiated at
//! runtime. Multi-byte fields use the machine's native byte order.

use bytemuck::{Pod, Zeroable};
use core::mem::{offset_of, size_of};

/// Handshake value: host has written input, emulation side's turn.
pub const CONTROL_INPUT_READY: u8 = 0;
/// Handshake value: emulation side has published a frame, host's turn.
pub const CONTROL_SCREEN_READY: u8 = 1;
/// Handshake value: host requests the emulation loop to stop.
pub const CONTROL_EXIT: u8 = 2;
/// Alternate exit value accepted for older hosts.
pub const CONTROL_EXIT_ALT: u8 = 0xFF;

/// `mouse_mode` value for relative (delta) mouse input.
pub const MOUSE_MODE_DELTA: u8 = 0;
/// `mouse_mode` value for absolute mouse positioning.
pub const MOUSE_MODE_ABSOLUTE: u8 = 1;

/// Number of joystick ports carried by the record.
pub const JOYSTICK_PORTS: usize = 4;
/// Length of the generic argument bank.
pub const ARG_BANK_LEN: usize = 16;
/// Length of the NUL-padded argument string.
pub const ARG_STRING_LEN: usize = 80;

/// Input record shared between host and emulation side.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct InputRecord {
    /// Frame counter; see `FrameCounterOwner` in the run loop for who writes it.
    pub frame_count: u32,
    /// Handshake byte. Accessed atomically through [`Handshake`](crate::Handshake).
    pub control: u8,
    pub keychar: u8,
    pub keycode: u8,
    pub special: u8,
    pub shift: u8,
    pub control_key: u8,
    pub start: u8,
    pub select: u8,
    pub option: u8,
    /// Direction nibble and trigger byte per port: `joy0, trig0, .. joy3, trig3`.
    pub joysticks: [u8; JOYSTICK_PORTS * 2],
    pub mouse_x: u8,
    pub mouse_y: u8,
    pub mouse_buttons: u8,
    pub mouse_mode: u8,
    pub reserved: [u8; 7],
    /// Generic argument bytes for host-to-emulator requests.
    pub args: [u8; ARG_BANK_LEN],
    /// Command text, NUL padded.
    pub arg_string: [u8; ARG_STRING_LEN],
}

/// Size of [`InputRecord`] on the wire.
pub const INPUT_RECORD_SIZE: usize = size_of::<InputRecord>();
/// Byte offset of the handshake byte inside the Input section.
pub const CONTROL_OFFSET: usize = offset_of!(InputRecord, control);
/// Byte offset of the frame counter inside the Input section.
pub const FRAME_COUNT_OFFSET: usize = offset_of!(InputRecord, frame_count);

const _: () = assert!(INPUT_RECORD_SIZE == 128);
const _: () = assert!(CONTROL_OFFSET == 4);
const _: () = assert!(offset_of!(InputRecord, joysticks) == 13);
const _: () = assert!(offset_of!(InputRecord, mouse_x) == 21);
const _: () = assert!(offset_of!(InputRecord, args) == 32);
const _: () = assert!(offset_of!(InputRecord, arg_string) == 48);

impl Default for InputRecord {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl InputRecord {
    /// Joystick direction byte for `port` (0..4).
    pub fn joystick(&self, port: usize) -> u8 {
        self.joysticks[port * 2]
    }

    /// Trigger byte for `port` (0..4).
    pub fn trigger(&self, port: usize) -> u8 {
        self.joysticks[port * 2 + 1]
    }

    pub fn set_joystick(&mut self, port: usize, direction: u8, trigger: bool) {
        self.joysticks[port * 2] = direction;
        self.joysticks[port * 2 + 1] = trigger as u8;
    }

    /// Stores `text` in the argument string, truncating to leave a trailing NUL.
    pub fn set_arg_string(&mut self, text: &str) {
        self.arg_string = [0; ARG_STRING_LEN];
        let bytes = text.as_bytes();
        let len = bytes.len().min(ARG_STRING_LEN - 1);
        self.arg_string[..len].copy_from_slice(&bytes[..len]);
    }

    /// Argument string up to the first NUL, if it is valid UTF-8.
    pub fn arg_str(&self) -> Option<&str> {
        let end = self
            .arg_string
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(ARG_STRING_LEN);
        core::str::from_utf8(&self.arg_string[..end]).ok()
    }

    /// Raw bytes exactly as they appear in shared memory.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
