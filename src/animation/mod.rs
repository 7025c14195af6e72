//! Animation runtime.
//!
//! Two models that can be mixed:
//!
//! - **Server-driven**: [`BackendAnimator`] asks the daemon for ANIM_TICK
//!   events and routes them to a [`TickListener`].
//! - **Client-driven**: a loop paced by [`FramePacer`], usually on a live
//!   thread started with [`Session::spawn_live`](crate::Session::spawn_live).
//!
//! Neither blocks the socket: waiting between frames goes through
//! [`ipc_sleep`], which keeps dispatching inbound events.

mod backend;
mod live;

use std::time::{Duration, Instant};

pub use backend::{BackendAnimator, TickListener};
pub use live::{LiveFrame, LiveHandle, LiveOptions, LIVE_JOIN_TIMEOUT};

use crate::error::Result;
use crate::session::{Drain, Session};
use crate::transport::Channel;

/// Longest single wait inside [`ipc_sleep`], and the longest a drain that
/// lost the connection lock sleeps before trying again.
pub const POLL_SLICE: Duration = Duration::from_millis(10);

/// Sleep for `duration` while dispatching events from the daemon.
///
/// Each slice tries the connection lock without blocking. If another
/// thread is mid-request the slice is slept out and the next one tries
/// again, so an event waits at most one slice plus that request. With no
/// connection this is a plain sleep.
pub fn ipc_sleep<C: Channel>(session: &Session<C>, duration: Duration) -> Result<()> {
    let deadline = Instant::now() + duration;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        let slice = remaining.min(POLL_SLICE);
        match session.drain_slice(slice)? {
            Drain::Busy => std::thread::sleep(slice),
            Drain::Idle | Drain::Dispatched => {}
            Drain::Closed => {
                std::thread::sleep(remaining);
                return Ok(());
            }
        }
    }
}

/// Holds a loop to a target frame rate.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    last: Instant,
}

impl FramePacer {
    /// `fps` below 1 is treated as 1.
    pub fn new(fps: f64) -> Self {
        Self {
            interval: interval_for(fps),
            last: Instant::now(),
        }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn fps(&self) -> f64 {
        1.0 / self.interval.as_secs_f64()
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.interval = interval_for(fps);
    }

    /// Restart timing from now.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Wait out the rest of the frame, draining events meanwhile.
    ///
    /// Returns the real time since the previous call. Under load this
    /// exceeds the interval; it is never clamped.
    pub fn pace<C: Channel>(&mut self, session: &Session<C>) -> Result<Duration> {
        let elapsed = self.last.elapsed();
        if elapsed < self.interval {
            ipc_sleep(session, self.interval - elapsed)?;
        }
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        Ok(dt)
    }
}

fn interval_for(fps: f64) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1.0))
}
