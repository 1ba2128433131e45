//! Copies the visible crop of the engine framebuffer into the Video section.

use crate::engine::FrameSource;
use shmem_transport::{DisplayGeometry, LayoutError, SectionView};

/// What a single transfer wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferReport {
    pub width: usize,
    pub height: usize,
    /// Columns skipped on the left of each framebuffer row.
    pub x_offset: usize,
    pub bytes: usize,
}

/// Copies a horizontally centered `visible width × visible height` crop.
///
/// Rows start at the visible top edge, not at framebuffer row 0. Hosts that
/// assume copying always begins at row 0 see the same bytes only while
/// `visible.top` is zero. The source advances by the full
/// framebuffer width per row and the destination by the visible width, so the
/// Video section receives a tightly packed frame. Nothing is written when the
/// geometry does not fit; that is a configuration error, not a frame to skip.
pub fn transfer_frame(
    frame: &FrameSource<'_>,
    video: &SectionView<'_>,
) -> Result<TransferReport, LayoutError> {
    let width = frame.visible.width();
    let height = frame.visible.height();

    if width > frame.width {
        return Err(LayoutError::VisibleWidthExceedsFramebuffer {
            visible: width,
            framebuffer: frame.width,
        });
    }

    let bytes = width
        .checked_mul(height)
        .filter(|&bytes| bytes <= video.len())
        .ok_or(LayoutError::VisibleAreaTooLarge {
            width,
            height,
            capacity: video.len(),
        })?;

    let x_offset = DisplayGeometry::centered_offset(frame.width, width);
    if height > 0 {
        let required = (frame.visible.top + height - 1) * frame.width + x_offset + width;
        if required > frame.pixels.len() {
            return Err(LayoutError::FramebufferTooShort {
                required,
                actual: frame.pixels.len(),
            });
        }
    }

    let mut src = frame.visible.top * frame.width + x_offset;
    let mut dest = 0;
    for _ in 0..height {
        video.write_at(dest, &frame.pixels[src..src + width])?;
        src += frame.width;
        dest += width;
    }

    Ok(TransferReport {
        width,
        height,
        x_offset,
        bytes,
    })
}
