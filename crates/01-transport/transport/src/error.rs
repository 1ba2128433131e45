//! Error handling helpers for the shared-memory transport.
//!
//! Everything that can go wrong is detected while binding the region or
//! validating a frame geometry. Once a region is bound no operation on it
//! fails; protocol-level waits are not errors.

use std::fmt;

/// Convenience result alias for fallible region operations.
pub type RegionResult<T, E = RegionError> = Result<T, E>;

/// Layout violations detected when binding memory or publishing a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutError {
    /// The supplied buffer is shorter than the region layout requires.
    TooSmall { required: usize, actual: usize },
    /// A raw hand-off pointer was null.
    NullPointer,
    /// The visible area does not fit in the Video section.
    VisibleAreaTooLarge {
        width: usize,
        height: usize,
        capacity: usize,
    },
    /// The visible area is wider than the framebuffer it is cropped from.
    VisibleWidthExceedsFramebuffer { visible: usize, framebuffer: usize },
    /// The framebuffer slice ends before the last visible row.
    FramebufferTooShort { required: usize, actual: usize },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::TooSmall { required, actual } => {
                write!(
                    f,
                    "shared buffer of {actual} bytes is smaller than the {required} byte region"
                )
            }
            LayoutError::NullPointer => write!(f, "shared buffer pointer is null"),
            LayoutError::VisibleAreaTooLarge {
                width,
                height,
                capacity,
            } => {
                write!(
                    f,
                    "visible area {width}x{height} does not fit the {capacity} byte video section"
                )
            }
            LayoutError::VisibleWidthExceedsFramebuffer {
                visible,
                framebuffer,
            } => {
                write!(
                    f,
                    "visible width {visible} exceeds framebuffer width {framebuffer}"
                )
            }
            LayoutError::FramebufferTooShort { required, actual } => {
                write!(
                    f,
                    "framebuffer holds {actual} bytes but the visible area reaches byte {required}"
                )
            }
        }
    }
}

impl std::error::Error for LayoutError {}

/// Errors surfaced while acquiring or binding a [`SharedRegion`](crate::SharedRegion).
#[derive(Debug)]
pub enum RegionError {
    /// Allocation of a self-owned region failed.
    AllocationFailed { size: usize },
    /// The external buffer does not satisfy the layout.
    Layout(LayoutError),
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::AllocationFailed { size } => {
                write!(f, "failed to allocate shared region of {size} bytes")
            }
            RegionError::Layout(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for RegionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegionError::AllocationFailed { .. } => None,
            RegionError::Layout(err) => Some(err),
        }
    }
}

impl From<LayoutError> for RegionError {
    fn from(err: LayoutError) -> Self {
        RegionError::Layout(err)
    }
}
