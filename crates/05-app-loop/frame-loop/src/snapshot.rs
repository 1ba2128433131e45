//! Per-frame copy of the host input record.
//!
//! The snapshot is taken once, when the emulation side accepts the host's
//! turn, and every engine-facing input query during that frame is answered from
//! it. Later writes to the live Input section are never observed mid-frame.

use shmem_transport::{
    InputRecord, InputView, ARG_BANK_LEN, JOYSTICK_PORTS, MOUSE_MODE_ABSOLUTE,
};

/// Joystick direction value with no direction pressed. Bits are active low.
pub const JOY_CENTRE: u8 = 0x0F;

/// Value copy of the Input section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    record: InputRecord,
}

/// Keyboard and console keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyState {
    pub keychar: u8,
    pub keycode: u8,
    pub special: u8,
    pub shift: bool,
    pub control: bool,
    pub start: bool,
    pub select: bool,
    pub option: bool,
}

/// One joystick port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoystickState {
    /// Active-low direction nibble.
    pub direction: u8,
    pub trigger: bool,
}

impl JoystickState {
    pub fn up(&self) -> bool {
        self.direction & 0x01 == 0
    }

    pub fn down(&self) -> bool {
        self.direction & 0x02 == 0
    }

    pub fn left(&self) -> bool {
        self.direction & 0x04 == 0
    }

    pub fn right(&self) -> bool {
        self.direction & 0x08 == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseMode {
    /// `mouse_x`/`mouse_y` are signed deltas since the last frame.
    Delta,
    /// `mouse_x`/`mouse_y` are absolute positions.
    Absolute,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseState {
    pub x: u8,
    pub y: u8,
    pub buttons: u8,
    pub mode: MouseMode,
}

impl MouseState {
    /// Signed motion for delta mode.
    pub fn delta(&self) -> (i8, i8) {
        (self.x as i8, self.y as i8)
    }
}

/// Host-to-emulator request carried in the argument bank and string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    pub args: &'a [u8; ARG_BANK_LEN],
    pub text: &'a str,
}

impl InputSnapshot {
    /// Copies the live Input section.
    pub fn capture(view: &InputView<'_>) -> Self {
        Self {
            record: view.read(),
        }
    }

    pub fn from_record(record: InputRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &InputRecord {
        &self.record
    }

    pub fn frame_count(&self) -> u32 {
        self.record.frame_count
    }

    pub fn keyboard(&self) -> KeyState {
        let r = &self.record;
        KeyState {
            keychar: r.keychar,
            keycode: r.keycode,
            special: r.special,
            shift: r.shift != 0,
            control: r.control_key != 0,
            start: r.start != 0,
            select: r.select != 0,
            option: r.option != 0,
        }
    }

    /// # Panics
    /// When `port` is not below [`JOYSTICK_PORTS`].
    pub fn joystick(&self, port: usize) -> JoystickState {
        assert!(port < JOYSTICK_PORTS, "joystick port {port} out of range");
        JoystickState {
            direction: self.record.joystick(port),
            trigger: self.record.trigger(port) != 0,
        }
    }

    pub fn joysticks(&self) -> [JoystickState; JOYSTICK_PORTS] {
        core::array::from_fn(|port| self.joystick(port))
    }

    pub fn mouse(&self) -> MouseState {
        let r = &self.record;
        MouseState {
            x: r.mouse_x,
            y: r.mouse_y,
            buttons: r.mouse_buttons,
            mode: if r.mouse_mode == MOUSE_MODE_ABSOLUTE {
                MouseMode::Absolute
            } else {
                MouseMode::Delta
            },
        }
    }

    /// Pending command, or `None` when the bank and string are both empty.
    ///
    /// Non UTF-8 text is reported as an empty string so the argument bank is
    /// still delivered.
    pub fn command(&self) -> Option<Command<'_>> {
        let text = self.record.arg_str().unwrap_or("");
        if text.is_empty() && self.record.args.iter().all(|&b| b == 0) {
            return None;
        }
        Some(Command {
            args: &self.record.args,
            text,
        })
    }
}
