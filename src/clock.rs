//! Per-side elapsed time.
//!
//! A running [`Clock`] owns a background task that reports the elapsed time every tick period. The
//! task captures everything it needs when it is spawned, so the accumulated duration is only ever
//! written by the clock itself. Time comes from [`tokio::time::Instant`], which means tests can
//! pause the runtime and advance it by hand.

use std::{fmt, time::Duration};

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    display::{DisplayEvent, DisplayHandle},
    logic::Side,
};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(500);

pub struct Clock {
    side: Side,
    tick_period: Duration,
    display: DisplayHandle,
    accumulated: Duration,
    running: Option<Running>,
}

struct Running {
    since: Instant,
    stop: CancellationToken,
}

impl Clock {
    pub fn new(side: Side, tick_period: Duration, display: DisplayHandle) -> Self {
        Self {
            side,
            tick_period,
            display,
            accumulated: Duration::ZERO,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated + self.running.as_ref().map_or(Duration::ZERO, |r| r.since.elapsed())
    }

    /// Starts accumulating time and spawns the tick task. Does nothing if already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let since = Instant::now();
        let stop = CancellationToken::new();
        debug!(side = %self.side, elapsed = ?self.accumulated, "clock started");
        self.display.emit(DisplayEvent::ClockHighlight {
            side: self.side,
            active: true,
        });

        tokio::spawn(tick_loop(
            self.side,
            self.accumulated,
            since,
            self.tick_period,
            stop.clone(),
            self.display.clone(),
        ));
        self.running = Some(Running { since, stop });
    }

    /// Stops accumulating time and renders the final reading. Does nothing if already stopped.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.stop.cancel();
        self.accumulated += running.since.elapsed();
        debug!(side = %self.side, elapsed = ?self.accumulated, "clock stopped");
        self.display.emit(DisplayEvent::ClockTick {
            side: self.side,
            elapsed: format_elapsed(self.accumulated),
        });
        self.display.emit(DisplayEvent::ClockHighlight {
            side: self.side,
            active: false,
        });
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.stop.cancel();
        }
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("side", &self.side)
            .field("elapsed", &self.elapsed())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn tick_loop(
    side: Side,
    base: Duration,
    since: Instant,
    period: Duration,
    stop: CancellationToken,
    display: DisplayHandle,
) {
    let mut ticker = interval_at(since + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                display.emit(DisplayEvent::ClockTick {
                    side,
                    elapsed: format_elapsed(base + since.elapsed()),
                });
            }
        }
    }
}

/// Formats a duration as `h:mm:ss`, dropping sub-second precision.
pub fn format_elapsed(d: Duration) -> String {
    let s = d.as_secs();
    let hours = s / 3600;
    let minutes = (s / 60) % 60;
    let seconds = s % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}
