/// Crate-wide error taxonomy
use thiserror::Error;

use crate::animation::MAX_FRAMES;

#[derive(Debug, Error)]
pub enum Error {
    /// Grid coordinates outside the 8x8 pad matrix. Indicates a caller bug,
    /// not a user-recoverable condition.
    #[error("pad coordinates ({row}, {col}) outside the 8x8 grid")]
    OutOfRange { row: usize, col: usize },

    /// The animation is at its frame ceiling.
    #[error("animation is full ({MAX_FRAMES} frames)")]
    FrameLimit,

    /// A frame index that does not exist in the store. Caller bug.
    #[error("no frame at index {index} (frame count {count})")]
    BadIndex { index: usize, count: usize },

    /// Play was requested on an animation with no frames.
    #[error("animation has no frames to play")]
    EmptySequence,

    /// Persisted layout/animation text failed to decode.
    #[error("malformed {what} data: {detail}")]
    Format { what: &'static str, detail: String },

    /// A device send failed during playback or editing.
    #[error("device output failed: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, Error>;
