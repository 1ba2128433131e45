//! Contract between the frame loop and the emulation engine it drives.

use crate::snapshot::InputSnapshot;

/// Visible-area bounds in framebuffer pixels. `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisibleArea {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl VisibleArea {
    pub const fn new(left: usize, right: usize, top: usize, bottom: usize) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub const fn width(&self) -> usize {
        self.right.saturating_sub(self.left)
    }

    pub const fn height(&self) -> usize {
        self.bottom.saturating_sub(self.top)
    }
}

/// Framebuffer produced by the engine for the frame just emulated.
#[derive(Clone, Copy, Debug)]
pub struct FrameSource<'a> {
    /// One byte per pixel, rows of `width` bytes.
    pub pixels: &'a [u8],
    /// Full framebuffer width, which is also the row stride.
    pub width: usize,
    pub visible: VisibleArea,
}

/// Emulation engine driven one frame per accepted turn.
///
/// The loop calls [`apply_input`](Engine::apply_input), then
/// [`run_frame`](Engine::run_frame), then reads [`frame`](Engine::frame) and the
/// optional audio and state hooks, all before handing the turn back to the host.
pub trait Engine {
    /// Pushes this frame's decoded input into engine-native state.
    fn apply_input(&mut self, input: &InputSnapshot);

    /// Advances emulation by exactly one frame.
    fn run_frame(&mut self);

    /// Whether the last frame produced a screen worth publishing.
    fn display_screen(&self) -> bool {
        true
    }

    /// Framebuffer and visible bounds of the last frame.
    fn frame(&self) -> FrameSource<'_>;

    /// Writes this frame's audio into the Sound section, returning bytes written.
    fn fill_sound(&mut self, _out: &mut [u8]) -> usize {
        0
    }

    /// Serializes engine state into the State-save section, returning bytes written.
    fn save_state(&mut self, _out: &mut [u8]) -> usize {
        0
    }
}

impl<E: Engine + ?Sized> Engine for &mut E {
    fn apply_input(&mut self, input: &InputSnapshot) {
        (**self).apply_input(input)
    }

    fn run_frame(&mut self) {
        (**self).run_frame()
    }

    fn display_screen(&self) -> bool {
        (**self).display_screen()
    }

    fn frame(&self) -> FrameSource<'_> {
        (**self).frame()
    }

    fn fill_sound(&mut self, out: &mut [u8]) -> usize {
        (**self).fill_sound(out)
    }

    fn save_state(&mut self, out: &mut [u8]) -> usize {
        (**self).save_state(out)
    }
}
