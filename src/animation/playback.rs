/// Playback engine - frame emission state machine plus the timed driver
/// that schedules ticks against the wall clock
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::animation::Animation;
use crate::error::{Error, Result};
use crate::midi::{show_grid, DeviceOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Emitted the frame at this index; playback continues.
    Frame(usize),
    /// Emitted the final frame at this index; a non-looping animation ran
    /// out and the engine is now Stopped. The device keeps showing the
    /// frame - no blank-out is sent.
    Finished(usize),
    /// Not Playing; nothing was emitted.
    Idle,
}

/// Steps an animation one frame per tick, emitting each frame to a device
/// as all-off followed by the frame's lit pads. The engine holds no timer
/// of its own: ticks are driven externally (by `PlaybackDriver` in
/// production, directly in tests).
#[derive(Debug)]
pub struct PlaybackEngine {
    state: PlaybackState,
    current_index: usize,
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_index: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Starts from frame 0 when Stopped, resumes in place when Paused.
    /// Refuses an empty animation and stays Stopped.
    pub fn play(&mut self, animation: &Animation) -> Result<()> {
        if animation.is_empty() {
            return Err(Error::EmptySequence);
        }
        if self.state == PlaybackState::Stopped {
            self.current_index = 0;
        }
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Freezes the playback position. Device state is left untouched.
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Stops from any state and resets the position to frame 0.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.current_index = 0;
    }

    /// Realigns the playback index after structural edits to the animation.
    /// An emptied animation stops playback; otherwise the index clamps into
    /// the new valid range.
    pub fn resync(&mut self, frame_count: usize) {
        if frame_count == 0 {
            self.stop();
        } else if self.current_index >= frame_count {
            self.current_index = frame_count - 1;
        }
    }

    /// Emits the current frame and advances. The frame is re-read from the
    /// animation on every tick, so edits made since the last tick are
    /// picked up without coordination. A device failure stops the engine
    /// and surfaces the error; there is no retry.
    pub fn tick(
        &mut self,
        animation: &Animation,
        device: &mut dyn DeviceOutput,
    ) -> Result<Tick> {
        if self.state != PlaybackState::Playing {
            return Ok(Tick::Idle);
        }
        self.resync(animation.frame_count());
        if self.state != PlaybackState::Playing {
            return Ok(Tick::Idle);
        }

        let index = self.current_index;
        let frame = animation.frame_at(index)?;
        trace!(frame = index, "emitting frame");
        if let Err(e) = show_grid(device, frame) {
            self.stop();
            return Err(e);
        }

        self.current_index += 1;
        if self.current_index >= animation.frame_count() {
            if animation.looped() {
                self.current_index = 0;
            } else {
                self.state = PlaybackState::Stopped;
                self.current_index = 0;
                return Ok(Tick::Finished(index));
            }
        }
        Ok(Tick::Frame(index))
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// A frame was emitted to the device.
    FrameShown(usize),
    /// A non-looping animation played its last frame.
    Finished,
    /// A tick failed; playback stopped.
    Failed(String),
}

/// Runs the tick schedule on a worker thread. The period is re-read from
/// the animation every pass, so rate changes apply while playing without a
/// restart. Cancellation (`stop`) lands at the next tick boundary; an
/// in-flight frame emission is never cut short.
pub struct PlaybackDriver {
    sender: Sender<PlaybackEvent>,
    receiver: Receiver<PlaybackEvent>,
    is_running: Arc<Mutex<bool>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl PlaybackDriver {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver,
            is_running: Arc::new(Mutex::new(false)),
            worker: None,
        }
    }

    pub fn start<D: DeviceOutput + Send + 'static>(
        &mut self,
        animation: Arc<Mutex<Animation>>,
        engine: Arc<Mutex<PlaybackEngine>>,
        device: Arc<Mutex<D>>,
    ) {
        if *self.is_running.lock().unwrap() {
            return;
        }
        // reap a worker that exited on its own (finished or failed) so its
        // last writes to the flag are ordered before this run begins
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        *self.is_running.lock().unwrap() = true;

        let is_running = Arc::clone(&self.is_running);
        let sender = self.sender.clone();

        let worker = thread::spawn(move || {
            let mut last_tick = Instant::now();

            loop {
                if !*is_running.lock().unwrap() {
                    break;
                }

                let period = {
                    let animation = animation.lock().unwrap();
                    Duration::from_secs_f32(1.0 / animation.frame_rate())
                };

                if last_tick.elapsed() >= period {
                    last_tick = Instant::now();

                    // lock order: engine, then animation, then device
                    let outcome = {
                        let mut engine = engine.lock().unwrap();
                        let animation = animation.lock().unwrap();
                        let mut device = device.lock().unwrap();
                        engine.tick(&animation, &mut *device)
                    };

                    match outcome {
                        Ok(Tick::Frame(index)) => {
                            let _ = sender.send(PlaybackEvent::FrameShown(index));
                        }
                        Ok(Tick::Finished(index)) => {
                            let _ = sender.send(PlaybackEvent::FrameShown(index));
                            let _ = sender.send(PlaybackEvent::Finished);
                            break;
                        }
                        Ok(Tick::Idle) => {
                            // engine was paused or stopped externally
                            break;
                        }
                        Err(e) => {
                            let _ = sender.send(PlaybackEvent::Failed(e.to_string()));
                            break;
                        }
                    }
                }

                thread::sleep(Duration::from_millis(1));
            }

            *is_running.lock().unwrap() = false;
        });
        self.worker = Some(worker);
    }

    /// Cancels the schedule and waits for the worker to exit, so exactly
    /// one worker can ever tick the engine; an immediate restart cannot
    /// race a stale worker still polling the flag.
    pub fn stop(&mut self) {
        *self.is_running.lock().unwrap() = false;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.lock().unwrap()
    }

    pub fn poll_events(&self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Default for PlaybackDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{PadColor, PadGrid};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        AllOff,
        Pad(usize, usize, PadColor),
    }

    /// Records every send so tests can assert on emission order.
    #[derive(Default)]
    struct RecordingDevice {
        sent: Vec<Sent>,
        fail: bool,
    }

    impl DeviceOutput for RecordingDevice {
        fn send_pad_color(&mut self, row: usize, col: usize, color: PadColor) -> Result<()> {
            if self.fail {
                return Err(Error::Device("test device unplugged".into()));
            }
            self.sent.push(Sent::Pad(row, col, color));
            Ok(())
        }

        fn send_all_off(&mut self) -> Result<()> {
            if self.fail {
                return Err(Error::Device("test device unplugged".into()));
            }
            self.sent.push(Sent::AllOff);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn three_frame_animation() -> Animation {
        let mut animation = Animation::new("loop test");
        animation.set_frame_rate(10.0);
        for color in [PadColor::Red, PadColor::Green, PadColor::White] {
            animation
                .add_snapshot(&PadGrid::filled(color), None)
                .unwrap();
        }
        animation
    }

    #[test]
    fn test_play_empty_fails_and_stays_stopped() {
        let animation = Animation::new("empty");
        let mut engine = PlaybackEngine::new();
        assert!(matches!(engine.play(&animation), Err(Error::EmptySequence)));
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_loop_wraps_after_three_ticks() {
        let animation = three_frame_animation();
        let mut engine = PlaybackEngine::new();
        let mut device = RecordingDevice::default();

        engine.play(&animation).unwrap();
        for expected in 0..3 {
            assert_eq!(
                engine.tick(&animation, &mut device).unwrap(),
                Tick::Frame(expected)
            );
        }
        assert_eq!(engine.current_index(), 0);
        assert!(engine.is_playing());

        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert_eq!(engine.current_index(), 0);
    }

    #[test]
    fn test_all_off_precedes_every_paint() {
        let animation = three_frame_animation();
        let mut engine = PlaybackEngine::new();
        let mut device = RecordingDevice::default();

        engine.play(&animation).unwrap();
        engine.tick(&animation, &mut device).unwrap();

        // 1 clear + 64 red pads, clear strictly first
        assert_eq!(device.sent.len(), 65);
        assert_eq!(device.sent[0], Sent::AllOff);
        assert!(device.sent[1..]
            .iter()
            .all(|s| matches!(s, Sent::Pad(_, _, PadColor::Red))));
    }

    #[test]
    fn test_non_loop_run_finishes_without_blanking() {
        let mut animation = Animation::new("one shot");
        animation.set_looped(false);
        animation
            .add_snapshot(&PadGrid::filled(PadColor::Red), None)
            .unwrap();
        animation.add_blank(None).unwrap();

        let mut engine = PlaybackEngine::new();
        let mut device = RecordingDevice::default();
        engine.play(&animation).unwrap();

        assert_eq!(engine.tick(&animation, &mut device).unwrap(), Tick::Frame(0));
        assert_eq!(
            engine.tick(&animation, &mut device).unwrap(),
            Tick::Finished(1)
        );
        assert_eq!(engine.state(), PlaybackState::Stopped);

        // frame 1 is all-Off: its emission is the single clear, and no
        // further events follow the final frame
        assert_eq!(device.sent.last(), Some(&Sent::AllOff));
        let clears = device.sent.iter().filter(|s| **s == Sent::AllOff).count();
        assert_eq!(clears, 2);
        assert_eq!(
            engine.tick(&animation, &mut device).unwrap(),
            Tick::Idle
        );
        assert_eq!(device.sent.len(), 66);
    }

    #[test]
    fn test_pause_freezes_position_and_device() {
        let animation = three_frame_animation();
        let mut engine = PlaybackEngine::new();
        let mut device = RecordingDevice::default();

        engine.play(&animation).unwrap();
        engine.tick(&animation, &mut device).unwrap();
        let sends_before = device.sent.len();

        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(engine.tick(&animation, &mut device).unwrap(), Tick::Idle);
        assert_eq!(device.sent.len(), sends_before);

        // resume continues from where pause left off
        engine.play(&animation).unwrap();
        assert_eq!(engine.tick(&animation, &mut device).unwrap(), Tick::Frame(1));
    }

    #[test]
    fn test_emptied_animation_stops_engine() {
        let mut animation = Animation::new("shrinking");
        animation.add_blank(None).unwrap();

        let mut engine = PlaybackEngine::new();
        engine.play(&animation).unwrap();

        animation.delete(0).unwrap();
        assert_eq!(animation.frame_count(), 0);

        engine.resync(animation.frame_count());
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_deleted_tail_clamps_index() {
        let mut animation = three_frame_animation();
        let mut engine = PlaybackEngine::new();
        let mut device = RecordingDevice::default();

        engine.play(&animation).unwrap();
        engine.tick(&animation, &mut device).unwrap();
        engine.tick(&animation, &mut device).unwrap();
        assert_eq!(engine.current_index(), 2);

        animation.delete(2).unwrap();
        animation.delete(1).unwrap();
        engine.resync(animation.frame_count());
        assert_eq!(engine.current_index(), 0);
        assert!(engine.is_playing());

        assert_eq!(engine.tick(&animation, &mut device).unwrap(), Tick::Frame(0));
    }

    #[test]
    fn test_device_failure_stops_playback() {
        let animation = three_frame_animation();
        let mut engine = PlaybackEngine::new();
        let mut device = RecordingDevice {
            fail: true,
            ..Default::default()
        };

        engine.play(&animation).unwrap();
        assert!(matches!(
            engine.tick(&animation, &mut device),
            Err(Error::Device(_))
        ));
        assert_eq!(engine.state(), PlaybackState::Stopped);
    }

    #[test]
    fn test_driver_emits_frames_on_the_clock() {
        let mut animation = three_frame_animation();
        animation.set_frame_rate(100.0);
        let animation = Arc::new(Mutex::new(animation));
        let engine = Arc::new(Mutex::new(PlaybackEngine::new()));
        let device = Arc::new(Mutex::new(RecordingDevice::default()));

        engine
            .lock()
            .unwrap()
            .play(&animation.lock().unwrap())
            .unwrap();

        let mut driver = PlaybackDriver::new();
        driver.start(
            Arc::clone(&animation),
            Arc::clone(&engine),
            Arc::clone(&device),
        );
        thread::sleep(Duration::from_millis(300));
        engine.lock().unwrap().stop();
        driver.stop();

        let events = driver.poll_events();
        assert!(!events.is_empty());
        assert!(events
            .iter()
            .all(|e| matches!(e, PlaybackEvent::FrameShown(_))));
        assert!(!driver.is_running());
    }

    #[test]
    fn test_restart_keeps_a_single_worker() {
        let mut animation = three_frame_animation();
        animation.set_frame_rate(20.0);
        let animation = Arc::new(Mutex::new(animation));
        let engine = Arc::new(Mutex::new(PlaybackEngine::new()));
        let device = Arc::new(Mutex::new(RecordingDevice::default()));

        engine
            .lock()
            .unwrap()
            .play(&animation.lock().unwrap())
            .unwrap();
        let mut driver = PlaybackDriver::new();
        driver.start(
            Arc::clone(&animation),
            Arc::clone(&engine),
            Arc::clone(&device),
        );
        thread::sleep(Duration::from_millis(120));

        // pause and immediately resume, as a transport toggle does; the old
        // worker must be gone before the new one starts ticking
        engine.lock().unwrap().pause();
        driver.stop();
        engine
            .lock()
            .unwrap()
            .play(&animation.lock().unwrap())
            .unwrap();
        driver.start(
            Arc::clone(&animation),
            Arc::clone(&engine),
            Arc::clone(&device),
        );

        driver.poll_events();
        thread::sleep(Duration::from_millis(1000));
        engine.lock().unwrap().stop();
        driver.stop();

        let frames = driver
            .poll_events()
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::FrameShown(_)))
            .count();
        // ~20 frames in 1 s at 20 fps; two workers would show ~40
        assert!(frames >= 10, "saw only {frames} frames");
        assert!(frames <= 30, "saw {frames} frames, more than one worker ticking");
    }
}
