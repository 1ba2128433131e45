//! Stand-in emulation kernel for exercising the shared-memory frame loop.
//!
//! [`PatternKernel`] implements [`frame_loop::Engine`] with a tiny machine: a
//! 40x24 text screen fed by the keyboard, a sprite steered by joystick 0, a
//! square-wave tone while a key is held, and a serializable state. Frames are
//! rendered into a 384x240 framebuffer with the text area in the middle, so
//! the centered 336-pixel crop carries everything a host needs to see.

mod instance;

pub use instance::{Instance, CELL_SIZE, STATE_LEN, STATE_MAGIC, TEXT_COLUMNS, TEXT_ROWS};

use frame_loop::{Engine, FrameSource, InputSnapshot, VisibleArea};
use log::debug;
use shmem_transport::DisplayGeometry;

/// Left edge of the text area in framebuffer pixels.
pub const TEXT_LEFT: usize = 32;
/// Top edge of the text area in framebuffer pixels.
pub const TEXT_TOP: usize = 24;
/// Audio samples produced per frame (44.1 kHz at 60 frames per second).
pub const SAMPLES_PER_FRAME: usize = 735;

const SPRITE_SIZE: usize = 4;
const SILENCE: u8 = 0x80;

/// Visible area used by the `narrow` command.
pub const NARROW_VISIBLE: VisibleArea = VisibleArea::new(32, 352, 8, 232);

/// Pixel values and display bounds of the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    pub geometry: DisplayGeometry,
    pub visible: VisibleArea,
    /// Text-area background pixel.
    pub background: u8,
    /// Character pixel.
    pub ink: u8,
    pub sprite: u8,
}

impl Default for KernelConfig {
    fn default() -> Self {
        let geometry = DisplayGeometry::ATARI;
        let left = DisplayGeometry::centered_offset(geometry.framebuffer_width, geometry.usable_width);
        Self {
            geometry,
            visible: VisibleArea::new(
                left,
                left + geometry.usable_width,
                0,
                geometry.usable_height,
            ),
            background: 0x94,
            ink: 0x9A,
            sprite: 0x46,
        }
    }
}

/// Engine that renders a text screen and a sprite.
pub struct PatternKernel {
    config: KernelConfig,
    instance: Instance,
    pixels: Vec<u8>,
    visible: VisibleArea,
    tone_phase: usize,
    sprite_lit: bool,
}

impl PatternKernel {
    pub fn new(config: KernelConfig) -> Self {
        let pixels = vec![0; config.geometry.framebuffer_width * config.geometry.framebuffer_height];
        Self {
            config,
            instance: Instance::new(),
            pixels,
            visible: config.visible,
            tone_phase: 0,
            sprite_lit: false,
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn visible(&self) -> VisibleArea {
        self.visible
    }

    fn run_command(&mut self, text: &str) {
        match text {
            "clear" => self.instance.clear(),
            "narrow" => self.visible = NARROW_VISIBLE,
            "normal" => self.visible = self.config.visible,
            "" => {}
            other => debug!("ignoring command {other:?}"),
        }
    }

    fn render(&mut self) {
        let stride = self.config.geometry.framebuffer_width;
        self.pixels.fill(0);

        let text_width = TEXT_COLUMNS * CELL_SIZE;
        for y in TEXT_TOP..TEXT_TOP + TEXT_ROWS * CELL_SIZE {
            let row = y * stride + TEXT_LEFT;
            self.pixels[row..row + text_width].fill(self.config.background);
        }

        for (cell, &ch) in self.instance.text.iter().enumerate() {
            if ch == 0 || ch == b' ' {
                continue;
            }
            let x0 = TEXT_LEFT + (cell % TEXT_COLUMNS) * CELL_SIZE;
            let y0 = TEXT_TOP + (cell / TEXT_COLUMNS) * CELL_SIZE;
            for y in y0 + 1..y0 + CELL_SIZE - 1 {
                let row = y * stride;
                self.pixels[row + x0 + 1..row + x0 + CELL_SIZE - 1].fill(self.config.ink);
            }
        }

        let colour = if self.sprite_lit {
            self.config.ink
        } else {
            self.config.sprite
        };
        let x0 = self.instance.sprite_x as usize;
        let y0 = self.instance.sprite_y as usize;
        for y in y0..y0 + SPRITE_SIZE {
            let row = y * stride;
            self.pixels[row + x0..row + x0 + SPRITE_SIZE].fill(colour);
        }
    }
}

impl Default for PatternKernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl Engine for PatternKernel {
    fn apply_input(&mut self, input: &InputSnapshot) {
        self.instance.key(input.keyboard().keychar);

        let stick = input.joystick(0);
        let max_x = (self.config.geometry.framebuffer_width - SPRITE_SIZE) as u16;
        let max_y = (self.config.geometry.framebuffer_height - SPRITE_SIZE) as u16;
        self.instance.steer(stick, max_x, max_y);
        self.sprite_lit = stick.trigger;

        if let Some(command) = input.command() {
            self.run_command(command.text);
        }
    }

    fn run_frame(&mut self) {
        self.instance.frame_id = self.instance.frame_id.wrapping_add(1);
        self.render();
    }

    fn frame(&self) -> FrameSource<'_> {
        FrameSource {
            pixels: &self.pixels,
            width: self.config.geometry.framebuffer_width,
            visible: self.visible,
        }
    }

    /// Unsigned 8-bit mono square wave whose pitch follows the held key.
    fn fill_sound(&mut self, out: &mut [u8]) -> usize {
        let samples = out.len().min(SAMPLES_PER_FRAME);
        let key = self.instance.last_key;
        if key == 0 {
            out[..samples].fill(SILENCE);
            self.tone_phase = 0;
            return samples;
        }
        let half_period = 16 + key as usize;
        for sample in &mut out[..samples] {
            *sample = if (self.tone_phase / half_period) % 2 == 0 {
                0xC0
            } else {
                0x40
            };
            self.tone_phase = (self.tone_phase + 1) % (half_period * 2);
        }
        samples
    }

    fn save_state(&mut self, out: &mut [u8]) -> usize {
        self.instance.encode_state(out)
    }
}
