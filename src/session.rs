/// Session - the one place application state lives
/// Owns the shared animation, the playback engine, the device handle, and
/// the playback driver. The UI issues commands through here and holds no
/// authoritative state of its own.
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::animation::playback::{PlaybackDriver, PlaybackEngine, PlaybackEvent, PlaybackState};
use crate::animation::Animation;
use crate::error::Result;
use crate::grid::{PadColor, PadGrid};
use crate::midi::{show_grid, DeviceOutput};

pub struct Session<D: DeviceOutput + Send + 'static> {
    animation: Arc<Mutex<Animation>>,
    engine: Arc<Mutex<PlaybackEngine>>,
    device: Arc<Mutex<D>>,
    driver: PlaybackDriver,
}

impl<D: DeviceOutput + Send + 'static> Session<D> {
    /// A fresh session: empty animation, Stopped engine.
    pub fn new(device: D) -> Self {
        Self {
            animation: Arc::new(Mutex::new(Animation::default())),
            engine: Arc::new(Mutex::new(PlaybackEngine::new())),
            device: Arc::new(Mutex::new(device)),
            driver: PlaybackDriver::new(),
        }
    }

    /// Shared handle to the animation, for edits and inspection. Structural
    /// edits made through this handle while playing should be followed by
    /// the wrapper operations below (or a manual engine resync).
    pub fn animation(&self) -> Arc<Mutex<Animation>> {
        Arc::clone(&self.animation)
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.engine.lock().unwrap().state()
    }

    pub fn playback_index(&self) -> usize {
        self.engine.lock().unwrap().current_index()
    }

    /// Starts or resumes playback on the driver's clock.
    pub fn play(&mut self) -> Result<()> {
        {
            let mut engine = self.engine.lock().unwrap();
            let animation = self.animation.lock().unwrap();
            engine.play(&animation)?;
        }
        self.driver.start(
            Arc::clone(&self.animation),
            Arc::clone(&self.engine),
            Arc::clone(&self.device),
        );
        Ok(())
    }

    pub fn pause(&mut self) {
        self.engine.lock().unwrap().pause();
        self.driver.stop();
    }

    pub fn stop(&mut self) {
        self.engine.lock().unwrap().stop();
        self.driver.stop();
    }

    /// Playback events since the last poll (frames shown, completion,
    /// failures). The embedding UI drains this from its own loop.
    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        self.driver.poll_events()
    }

    /// Sets one pad in the frame at `frame_index` and echoes it to the
    /// device so the hardware tracks the edit live.
    pub fn paint_pad(
        &mut self,
        frame_index: usize,
        row: usize,
        col: usize,
        color: PadColor,
    ) -> Result<()> {
        {
            let mut animation = self.animation.lock().unwrap();
            let mut frame = animation.frame_at(frame_index)?.clone();
            frame.set(row, col, color)?;
            animation.replace(frame_index, frame)?;
        }
        self.device.lock().unwrap().send_pad_color(row, col, color)
    }

    pub fn add_blank_frame(&mut self, at: Option<usize>) -> Result<usize> {
        self.animation.lock().unwrap().add_blank(at)
    }

    pub fn add_snapshot_frame(&mut self, grid: &PadGrid, at: Option<usize>) -> Result<usize> {
        self.animation.lock().unwrap().add_snapshot(grid, at)
    }

    pub fn duplicate_frame(&mut self, index: usize) -> Result<usize> {
        self.animation.lock().unwrap().duplicate(index)
    }

    /// Deletes a frame and realigns the engine before its next tick fires.
    pub fn delete_frame(&mut self, index: usize) -> Result<()> {
        let count = {
            let mut animation = self.animation.lock().unwrap();
            animation.delete(index)?;
            animation.frame_count()
        };
        self.engine.lock().unwrap().resync(count);
        if count == 0 {
            self.driver.stop();
        }
        Ok(())
    }

    /// Stops playback and paints a static layout grid onto the device.
    pub fn apply_layout(&mut self, grid: &PadGrid) -> Result<()> {
        self.stop();
        show_grid(&mut *self.device.lock().unwrap(), grid)
    }

    /// Stops playback and replaces the animation with a fresh empty one.
    pub fn new_animation(&mut self, name: impl Into<String>) {
        self.stop();
        *self.animation.lock().unwrap() = Animation::new(name);
        debug!("started new animation");
    }

    /// Stops playback and swaps in a loaded animation.
    pub fn load_animation(&mut self, animation: Animation) {
        self.stop();
        debug!(name = animation.name(), frames = animation.frame_count(), "loaded animation");
        *self.animation.lock().unwrap() = animation;
    }

    /// Teardown: stop the driver and engine, then blank the device before
    /// the output handle is released.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Err(e) = self.device.lock().unwrap().send_all_off() {
            warn!("failed to blank device on shutdown: {e}");
        }
        debug!("session shut down");
    }
}
