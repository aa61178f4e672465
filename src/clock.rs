use std::time::Instant;

/// A monotonic time source, in seconds.
///
/// The clock never reads wall time; pause/resume arithmetic breaks the
/// moment a non-monotonic source is injected.
pub trait TimeSource {
    fn now(&self) -> f64;
}

/// [`TimeSource`] backed by [`Instant`], anchored at construction.
pub struct MonotonicTime {
    origin: Instant,
}

impl MonotonicTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Snapshot of the clock, passed by value to every frame callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockState {
    /// Seconds accumulated while running. Paused intervals do not count.
    pub time: f64,
    pub delta: f64,
    pub frame: u64,
    pub running: bool,
    /// Exponentially smoothed frames per second.
    pub fps: f64,
}

impl ClockState {
    fn zeroed() -> Self {
        Self {
            time: 0.0,
            delta: 0.0,
            frame: 0,
            running: false,
            fps: 0.0,
        }
    }
}

type FrameCallback = Box<dyn FnMut(ClockState)>;

/// Frame scheduling primitive for the render loop.
///
/// The host frame scheduler drives [`Clock::animate`] once per frame; the
/// clock decides whether a tick actually runs. [`Clock::tick`] steps a
/// single frame manually for deterministic rendering.
pub struct Clock {
    source: Box<dyn TimeSource>,
    state: ClockState,
    /// Wall-clock origin such that `now - origin` equals elapsed time.
    origin: f64,
    last_wall: Option<f64>,
    max_fps: u32,
    callback: Option<FrameCallback>,
}

impl Clock {
    pub fn new() -> Self {
        Self::with_source(Box::new(MonotonicTime::new()))
    }

    pub fn with_source(source: Box<dyn TimeSource>) -> Self {
        Self {
            source,
            state: ClockState::zeroed(),
            origin: 0.0,
            last_wall: None,
            max_fps: 0,
            callback: None,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn time(&self) -> f64 {
        self.state.time
    }

    pub fn delta(&self) -> f64 {
        self.state.delta
    }

    pub fn frame(&self) -> u64 {
        self.state.frame
    }

    pub fn fps(&self) -> f64 {
        self.state.fps
    }

    pub fn running(&self) -> bool {
        self.state.running
    }

    /// Starts the clock. Idempotent while running.
    ///
    /// On a fresh clock the elapsed-time origin is now; after a stop it is
    /// shifted back by the accumulated time, so elapsed time resumes
    /// smoothly across pauses.
    pub fn start<F>(&mut self, callback: F)
    where
        F: FnMut(ClockState) + 'static,
    {
        if self.state.running {
            return;
        }

        self.origin = self.source.now() - self.state.time;
        self.last_wall = None;
        self.state.running = true;
        self.callback = Some(Box::new(callback));
    }

    /// Stops the clock, cancelling the pending tick. Time, delta and frame
    /// are preserved.
    pub fn stop(&mut self) {
        self.state.running = false;
    }

    /// Stops and zeroes every counter.
    pub fn reset(&mut self) {
        self.stop();
        self.state = ClockState::zeroed();
        self.origin = 0.0;
        self.last_wall = None;
        self.callback = None;
    }

    /// Writes elapsed time directly, for scrubbing.
    pub fn set_time(&mut self, time: f64) {
        self.state.time = time;
        if self.state.running {
            self.origin = self.source.now() - time;
        }
    }

    /// Caps the tick rate. Ticks arriving closer than `1/max_fps` apart
    /// are skipped; zero lifts the cap.
    pub fn set_max_fps(&mut self, max_fps: u32) {
        self.max_fps = max_fps;
    }

    pub fn max_fps(&self) -> u32 {
        self.max_fps
    }

    /// One scheduler-driven tick. Returns `true` if a frame ran, `false`
    /// when stopped or gated by the FPS cap.
    pub fn animate(&mut self) -> bool {
        if !self.state.running {
            return false;
        }

        let now = self.source.now();
        if self.max_fps > 0 {
            if let Some(last) = self.last_wall {
                if now - last < 1.0 / self.max_fps as f64 {
                    return false;
                }
            }
        }

        let elapsed = now - self.origin;
        let delta = elapsed - self.state.time;
        self.state.time = elapsed;
        self.last_wall = Some(now);
        self.advance(delta);
        true
    }

    /// One manual tick of `delta` seconds, independent of wall time. Used
    /// for deterministic single-frame rendering.
    pub fn tick(&mut self, delta: f64) {
        self.state.time += delta;
        if self.state.running {
            // keep the next animate() consistent with the manual step
            self.origin -= delta;
        }
        self.advance(delta);
    }

    fn advance(&mut self, delta: f64) {
        self.state.frame += 1;
        self.state.delta = delta;
        if delta > 0.0 {
            self.state.fps = 0.95 * self.state.fps + 0.05 * (1.0 / delta);
        }

        let snapshot = self.state;
        if let Some(callback) = self.callback.as_mut() {
            callback(snapshot);
        }
    }
}
