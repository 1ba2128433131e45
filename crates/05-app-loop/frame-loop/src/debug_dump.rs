//! ASCII preview of a video buffer for eyeballing frames.
//!
//! The default window covers the top-left of the text area of a 336-wide
//! frame, where blank pixels are `0x00`, the text background is `0x94` and
//! characters are `0x9A`.

use std::fmt::{self, Write};
use std::ops::Range;

/// Sub-rectangle of a buffer to render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpWindow {
    /// Byte offset of the first rendered row.
    pub offset: usize,
    /// Bytes between the starts of two rows.
    pub stride: usize,
    pub rows: usize,
    /// Columns rendered from each row, relative to the row start.
    pub columns: Range<usize>,
}

impl Default for DumpWindow {
    fn default() -> Self {
        Self {
            offset: 336 * 24,
            stride: 336,
            rows: 16,
            columns: 8..140,
        }
    }
}

/// Glyph for one pixel value.
pub fn glyph(pixel: u8) -> char {
    match pixel {
        0x00 => ' ',
        0x94 => '.',
        0x9A => 'X',
        _ => '?',
    }
}

/// Writes the window as one line per row. Rows stop early where `buffer` ends.
pub fn write_dump<W: Write>(out: &mut W, buffer: &[u8], window: &DumpWindow) -> fmt::Result {
    for row in 0..window.rows {
        let start = window.offset + row * window.stride;
        for column in window.columns.clone() {
            match buffer.get(start + column) {
                Some(&pixel) => out.write_char(glyph(pixel))?,
                None => break,
            }
        }
        out.write_char('\n')?;
    }
    Ok(())
}

/// Renders the window into a new string.
pub fn render(buffer: &[u8], window: &DumpWindow) -> String {
    let mut out = String::with_capacity(window.rows * (window.columns.len() + 1));
    // Writing into a String cannot fail.
    let _ = write_dump(&mut out, buffer, window);
    out
}
