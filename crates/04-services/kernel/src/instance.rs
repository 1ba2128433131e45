use frame_loop::JoystickState;

/// Columns of the text screen.
pub const TEXT_COLUMNS: usize = 40;
/// Rows of the text screen.
pub const TEXT_ROWS: usize = 24;
/// Side of one character cell in pixels.
pub const CELL_SIZE: usize = 8;

/// Leading bytes of a serialized instance.
pub const STATE_MAGIC: [u8; 4] = *b"PKS1";
/// Bytes written by [`Instance::encode_state`].
pub const STATE_LEN: usize = 4 + 4 + 2 + 2 + 2 + TEXT_COLUMNS * TEXT_ROWS;

/// Emulated machine state: a text screen, a cursor and a movable sprite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    pub frame_id: u32,
    pub text: [u8; TEXT_COLUMNS * TEXT_ROWS],
    pub cursor: usize,
    pub sprite_x: u16,
    pub sprite_y: u16,
    pub last_key: u8,
}

impl Instance {
    pub fn new() -> Self {
        Self {
            frame_id: 0,
            text: [0; TEXT_COLUMNS * TEXT_ROWS],
            cursor: 0,
            sprite_x: 0,
            sprite_y: 0,
            last_key: 0,
        }
    }

    /// Handles a held key. Only a change of key types a character.
    pub fn key(&mut self, key: u8) {
        if key != 0 && key != self.last_key {
            self.type_char(key);
        }
        self.last_key = key;
    }

    fn type_char(&mut self, ch: u8) {
        match ch {
            b'\n' | 0x9B => {
                let row = self.cursor / TEXT_COLUMNS;
                self.cursor = ((row + 1) % TEXT_ROWS) * TEXT_COLUMNS;
            }
            _ => {
                self.text[self.cursor] = ch;
                self.cursor = (self.cursor + 1) % self.text.len();
            }
        }
    }

    pub fn clear(&mut self) {
        self.text.fill(0);
        self.cursor = 0;
    }

    /// Moves the sprite one pixel per pressed direction, clamped to `max`.
    pub fn steer(&mut self, stick: JoystickState, max_x: u16, max_y: u16) {
        if stick.left() {
            self.sprite_x = self.sprite_x.saturating_sub(1);
        }
        if stick.right() {
            self.sprite_x = (self.sprite_x + 1).min(max_x);
        }
        if stick.up() {
            self.sprite_y = self.sprite_y.saturating_sub(1);
        }
        if stick.down() {
            self.sprite_y = (self.sprite_y + 1).min(max_y);
        }
    }

    /// Serializes the instance into `out` in native byte order. Returns the
    /// bytes written, or zero when `out` is too small.
    pub fn encode_state(&self, out: &mut [u8]) -> usize {
        if out.len() < STATE_LEN {
            return 0;
        }
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(&STATE_MAGIC);
        put(&self.frame_id.to_ne_bytes());
        put(&(self.cursor as u16).to_ne_bytes());
        put(&self.sprite_x.to_ne_bytes());
        put(&self.sprite_y.to_ne_bytes());
        put(&self.text);
        at
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}
