use shmem_transport::LayoutError;
use thiserror::Error;

pub type FrameLoopResult<T> = Result<T, FrameLoopError>;

#[derive(Debug, Error)]
pub enum FrameLoopError {
    /// The engine's visible area does not fit the region layout.
    #[error("frame {frame} cannot be published: {source}")]
    Layout {
        frame: u64,
        #[source]
        source: LayoutError,
    },
}

impl FrameLoopError {
    pub fn layout(&self) -> &LayoutError {
        match self {
            FrameLoopError::Layout { source, .. } => source,
        }
    }
}
