//! Client-driven animation on background threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::FramePacer;
use crate::error::Result;
use crate::session::Session;
use crate::transport::Channel;

/// How long [`LiveHandle::stop`] waits for the thread to finish.
pub const LIVE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Parameters of a live loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveOptions {
    pub fps: f64,
    /// Stop once this much animation time has elapsed.
    pub duration: Option<Duration>,
    /// Stop once this figure's window is closed.
    pub watch_figure: Option<u64>,
}

impl LiveOptions {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            duration: None,
            watch_figure: None,
        }
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn watch_figure(mut self, figure_id: u64) -> Self {
        self.watch_figure = Some(figure_id);
        self
    }
}

/// Timing for one callback invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveFrame {
    /// Seconds since the loop started.
    pub t: f64,
    /// Seconds the previous frame actually took.
    pub dt: f64,
    /// 0-based.
    pub frame: u64,
}

/// Handle to a running live thread.
///
/// Dropping the handle asks the thread to stop but does not wait for it.
#[derive(Debug)]
pub struct LiveHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl LiveHandle {
    /// Ask the loop to exit after the current frame.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop and join, waiting at most [`LIVE_JOIN_TIMEOUT`].
    ///
    /// Returns false if the thread was still running at the deadline; it
    /// is then left to finish on its own.
    pub fn stop(self) -> bool {
        self.stop_timeout(LIVE_JOIN_TIMEOUT)
    }

    /// [`stop`](Self::stop) with an explicit timeout.
    pub fn stop_timeout(mut self, timeout: Duration) -> bool {
        self.request_stop();
        let Some(thread) = self.thread.take() else {
            return true;
        };
        let deadline = Instant::now() + timeout;
        while !thread.is_finished() {
            if Instant::now() >= deadline {
                warn!("live thread did not stop in time, detaching it");
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        join(thread);
        true
    }

    /// Block until the loop ends by itself (duration reached, watched
    /// window closed, or connection lost).
    pub fn wait(mut self) {
        if let Some(thread) = self.thread.take() {
            join(thread);
        }
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.request_stop();
    }
}

fn join(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        error!("live thread panicked");
    }
}

/// Keeps the session's live-thread count while the loop runs, including
/// when the callback panics.
struct LiveCount<C: Channel>(Arc<Session<C>>);

impl<C: Channel> LiveCount<C> {
    fn enter(session: &Arc<Session<C>>) -> Self {
        session.live_threads().fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(session))
    }
}

impl<C: Channel> Drop for LiveCount<C> {
    fn drop(&mut self) {
        self.0.live_threads().fetch_sub(1, Ordering::AcqRel);
    }
}

impl<C: Channel> Session<C> {
    /// Run `callback` once per frame at `fps` on a new thread.
    ///
    /// While it runs, the thread owns socket reads: its pacer drains
    /// events and [`wait_for_close`](Self::wait_for_close) only watches
    /// visibility flags. A callback error is logged and the loop goes on,
    /// except for connection errors, which end it.
    pub fn spawn_live<F>(self: &Arc<Self>, fps: f64, callback: F) -> Result<LiveHandle>
    where
        F: FnMut(&Session<C>, LiveFrame) -> Result<()> + Send + 'static,
    {
        self.spawn_live_with(LiveOptions::new(fps), callback)
    }

    /// [`spawn_live`](Self::spawn_live) with duration and window limits.
    pub fn spawn_live_with<F>(self: &Arc<Self>, options: LiveOptions, callback: F) -> Result<LiveHandle>
    where
        F: FnMut(&Session<C>, LiveFrame) -> Result<()> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        // Counted before the thread exists so a waiter never sees zero.
        let count = LiveCount::enter(self);
        let thread = thread::Builder::new()
            .name("spectra-live".into())
            .spawn(move || run_live(count, options, flag, callback))?;
        Ok(LiveHandle {
            stop,
            thread: Some(thread),
        })
    }
}

fn run_live<C, F>(count: LiveCount<C>, options: LiveOptions, stop: Arc<AtomicBool>, mut callback: F)
where
    C: Channel,
    F: FnMut(&Session<C>, LiveFrame) -> Result<()>,
{
    let session = &*count.0;
    let mut pacer = FramePacer::new(options.fps);
    let mut frame = LiveFrame {
        t: 0.0,
        dt: pacer.interval().as_secs_f64(),
        frame: 0,
    };
    let limit = options.duration.map(|d| d.as_secs_f64());
    debug!(fps = options.fps, "live thread started");

    while !stop.load(Ordering::Acquire) {
        if let Some(figure_id) = options.watch_figure {
            if !session.is_figure_visible(figure_id) {
                debug!(figure_id, "watched window closed");
                break;
            }
        }
        if limit.is_some_and(|limit| frame.t >= limit) {
            break;
        }

        if let Err(e) = callback(session, frame) {
            if e.is_connection_error() {
                error!(error = %e, "live callback lost the connection");
                break;
            }
            warn!(frame = frame.frame, error = %e, "live callback failed");
        }

        match pacer.pace(session) {
            Ok(dt) => {
                frame.dt = dt.as_secs_f64();
                frame.t += frame.dt;
                frame.frame += 1;
            }
            Err(e) => {
                error!(error = %e, "live thread stopped draining events");
                break;
            }
        }
    }
    debug!(frames = frame.frame, "live thread finished");
}
