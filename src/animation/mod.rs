/// Animation model - an ordered sequence of pad grid frames plus playback
/// properties (name, target frame rate, loop flag)
use crate::error::{Error, Result};
use crate::grid::PadGrid;

pub mod playback;

/// Hardware ceiling on frames per animation.
pub const MAX_FRAMES: usize = 999;

/// Slowest usable rate (2 s per frame).
pub const MIN_FRAME_RATE: f32 = 0.5;
/// Fastest rate the pad keeps up with (~7 ms per frame).
pub const MAX_FRAME_RATE: f32 = 1000.0 / 7.0;
pub const DEFAULT_FRAME_RATE: f32 = 5.0;

/// An ordered sequence of frames. Frame order is playback order; indices are
/// dense and 0-based. Frames handed out by `frame_at` are read-only; edits
/// go back in through `replace`.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    name: String,
    frame_rate: f32,
    looped: bool,
    frames: Vec<PadGrid>,
}

impl Animation {
    /// A new, empty animation with default properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame_rate: DEFAULT_FRAME_RATE,
            looped: true,
            frames: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Target playback rate in frames per second, clamped to what the
    /// hardware can keep up with.
    pub fn set_frame_rate(&mut self, fps: f32) {
        self.frame_rate = fps.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
    }

    pub fn looped(&self) -> bool {
        self.looped
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.looped = looped;
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Read-only view of the frame at `index`. To edit, clone the grid and
    /// commit the result with `replace`.
    pub fn frame_at(&self, index: usize) -> Result<&PadGrid> {
        self.frames.get(index).ok_or(Error::BadIndex {
            index,
            count: self.frames.len(),
        })
    }

    /// Inserts an all-Off frame at `at` (end of sequence when `None`) and
    /// returns its index.
    pub fn add_blank(&mut self, at: Option<usize>) -> Result<usize> {
        self.insert(PadGrid::new(), at)
    }

    /// Inserts a copy of `grid` at `at` (end when `None`) and returns its
    /// index. Used to snapshot the live editing grid as a new frame.
    pub fn add_snapshot(&mut self, grid: &PadGrid, at: Option<usize>) -> Result<usize> {
        self.insert(grid.clone(), at)
    }

    /// Inserts a copy of the frame at `index` immediately after it and
    /// returns the copy's index.
    pub fn duplicate(&mut self, index: usize) -> Result<usize> {
        let copy = self.frame_at(index)?.clone();
        self.insert(copy, Some(index + 1))
    }

    /// Removes the frame at `index`. An attached engine must be resynced
    /// afterwards so its playback index stays in range.
    pub fn delete(&mut self, index: usize) -> Result<()> {
        if index >= self.frames.len() {
            return Err(Error::BadIndex {
                index,
                count: self.frames.len(),
            });
        }
        self.frames.remove(index);
        Ok(())
    }

    /// Overwrites the frame at `index` with `grid`. This is how edits made
    /// on a copy from `frame_at` are committed.
    pub fn replace(&mut self, index: usize, grid: PadGrid) -> Result<()> {
        if index >= self.frames.len() {
            return Err(Error::BadIndex {
                index,
                count: self.frames.len(),
            });
        }
        self.frames[index] = grid;
        Ok(())
    }

    fn insert(&mut self, grid: PadGrid, at: Option<usize>) -> Result<usize> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(Error::FrameLimit);
        }
        let index = at.unwrap_or(self.frames.len());
        if index > self.frames.len() {
            return Err(Error::BadIndex {
                index,
                count: self.frames.len(),
            });
        }
        self.frames.insert(index, grid);
        Ok(index)
    }

    /// Rebuilds an animation from decoded parts. Enforces the frame ceiling
    /// and rate bounds so persisted data cannot smuggle invalid state in.
    pub(crate) fn from_parts(
        name: String,
        frame_rate: f32,
        looped: bool,
        frames: Vec<PadGrid>,
    ) -> Result<Self> {
        if frames.len() > MAX_FRAMES {
            return Err(Error::Format {
                what: "animation",
                detail: format!(
                    "{} frames exceeds the {MAX_FRAMES} frame limit",
                    frames.len()
                ),
            });
        }
        let mut animation = Self {
            name,
            frame_rate: DEFAULT_FRAME_RATE,
            looped,
            frames,
        };
        animation.set_frame_rate(frame_rate);
        Ok(animation)
    }
}

impl Default for Animation {
    fn default() -> Self {
        Self::new("New Animation")
    }
}
