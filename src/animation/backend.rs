//! Server-driven animation.

use std::sync::mpsc;

use tracing::debug;

use crate::codec::messages::{encode_anim_start, encode_figure_id, AnimTick};
use crate::error::Result;
use crate::protocol::msg_type;
use crate::session::Session;
use crate::transport::Channel;

/// Receives ANIM_TICK events for one figure.
///
/// Called on whichever thread is reading the socket, with the connection
/// lock held. Implementations must return quickly and must not issue
/// session requests (those fail with a protocol error). Adding or removing
/// tick listeners is fine, including the one being called. Hand the tick to
/// another thread (an `mpsc::Sender` does exactly that) when real work is
/// needed.
pub trait TickListener: Send {
    fn on_tick(&mut self, tick: &AnimTick);
}

impl<F> TickListener for F
where
    F: FnMut(&AnimTick) + Send,
{
    fn on_tick(&mut self, tick: &AnimTick) {
        self(tick)
    }
}

impl TickListener for mpsc::Sender<AnimTick> {
    fn on_tick(&mut self, tick: &AnimTick) {
        // Receiver gone: the tick is dropped like an unregistered one.
        let _ = self.send(*tick);
    }
}

/// Daemon-clocked animation of one figure.
///
/// Ticks are only read off the socket by requests and drains, so wait
/// with [`ipc_sleep`](super::ipc_sleep) rather than a blocking `recv`:
///
/// ```ignore
/// let mut anim = BackendAnimator::new(fig, 60.0);
/// let ticks = anim.start_channel(&session)?;
/// while session.is_figure_visible(fig) {
///     ipc_sleep(&session, Duration::from_millis(10))?;
///     if let Some(tick) = ticks.try_iter().last() {
///         session.set_data(fig, 0, &frame_at(tick.t))?;
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendAnimator {
    figure_id: u64,
    fps: f32,
    duration: f32,
    running: bool,
}

impl BackendAnimator {
    pub fn new(figure_id: u64, fps: f32) -> Self {
        Self {
            figure_id,
            fps,
            duration: 0.0,
            running: false,
        }
    }

    /// Stop after `seconds`. 0 (the default) runs until stopped.
    pub fn duration(mut self, seconds: f32) -> Self {
        self.duration = seconds;
        self
    }

    #[inline]
    pub fn figure_id(&self) -> u64 {
        self.figure_id
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Register `listener` and ask the daemon to start ticking.
    ///
    /// Does nothing if already running. The listener is registered before
    /// the request so the first tick cannot be missed, and removed again
    /// if the request fails.
    pub fn start<C, L>(&mut self, session: &Session<C>, listener: L) -> Result<()>
    where
        C: Channel,
        L: TickListener + 'static,
    {
        if self.running {
            return Ok(());
        }
        session.set_tick_listener(self.figure_id, listener);
        let payload = encode_anim_start(self.figure_id, self.fps, self.duration);
        if let Err(e) = session.request(msg_type::REQ_ANIM_START, &payload) {
            session.remove_tick_listener(self.figure_id);
            return Err(e);
        }
        self.running = true;
        debug!(figure_id = self.figure_id, fps = self.fps, "backend animation started");
        Ok(())
    }

    /// [`start`](Self::start) with ticks delivered over a channel.
    ///
    /// If already running, the returned receiver reports disconnection.
    pub fn start_channel<C: Channel>(
        &mut self,
        session: &Session<C>,
    ) -> Result<mpsc::Receiver<AnimTick>> {
        let (tx, rx) = mpsc::channel();
        self.start(session, tx)?;
        Ok(rx)
    }

    /// Unregister the listener and ask the daemon to stop. Does nothing if
    /// not running.
    pub fn stop<C: Channel>(&mut self, session: &Session<C>) -> Result<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        session.remove_tick_listener(self.figure_id);
        session.request(msg_type::REQ_ANIM_STOP, &encode_figure_id(self.figure_id))?;
        debug!(figure_id = self.figure_id, "backend animation stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::messages::{decode_figure_id, encode_resp_ok, RespErr};
    use crate::codec::PayloadDecoder;
    use crate::protocol::tags;
    use crate::session::tests::{connected, push};
    use crate::transport::ScriptedChannel;

    fn ok(ch: &ScriptedChannel, request_id: u64) {
        push(ch, msg_type::RESP_OK, request_id, &encode_resp_ok(request_id));
    }

    fn tick(figure_id: u64, frame_num: u32) -> AnimTick {
        AnimTick {
            figure_id,
            frame_num,
            t: frame_num as f32 / 30.0,
            dt: 1.0 / 30.0,
        }
    }

    #[test]
    fn test_ticks_arrive_while_sleeping() {
        let (session, ch) = connected();
        let mut anim = BackendAnimator::new(6, 60.0);

        ok(&ch, 1);
        let ticks = anim.start_channel(&session).unwrap();
        assert!(ticks.try_recv().is_err());
        let sent_before = ch.sent_frames().len();

        // No request in flight: only the sleep reads the socket.
        push(&ch, msg_type::ANIM_TICK, 0, &tick(6, 1).encode());
        push(&ch, msg_type::ANIM_TICK, 0, &tick(6, 2).encode());
        crate::animation::ipc_sleep(&session, std::time::Duration::from_millis(20)).unwrap();

        let latest = ticks.try_iter().last().unwrap();
        assert_eq!(latest.frame_num, 2);
        assert_eq!(ch.sent_frames().len(), sent_before);
    }

    #[test]
    fn test_start_routes_ticks_until_stop() {
        let (session, ch) = connected();
        let mut anim = BackendAnimator::new(3, 30.0).duration(2.0);

        ok(&ch, 1);
        let ticks = anim.start_channel(&session).unwrap();
        assert!(anim.is_running());

        // Ticks for this figure and another one, ahead of a response.
        push(&ch, msg_type::ANIM_TICK, 0, &tick(3, 1).encode());
        push(&ch, msg_type::ANIM_TICK, 0, &tick(8, 1).encode());
        push(&ch, msg_type::ANIM_TICK, 0, &tick(3, 2).encode());
        ok(&ch, 2);
        session.request(msg_type::REQ_LIST_FIGURES, &[]).unwrap();

        let got: Vec<u32> = ticks.try_iter().map(|t| t.frame_num).collect();
        assert_eq!(got, vec![1, 2]);

        ok(&ch, 3);
        anim.stop(&session).unwrap();
        assert!(!anim.is_running());

        push(&ch, msg_type::ANIM_TICK, 0, &tick(3, 3).encode());
        ok(&ch, 4);
        session.request(msg_type::REQ_LIST_FIGURES, &[]).unwrap();
        assert!(ticks.try_recv().is_err());

        let sent = ch.sent_frames();
        let start = sent
            .iter()
            .find(|f| f.msg_type() == msg_type::REQ_ANIM_START)
            .unwrap();
        let mut dec = PayloadDecoder::new(start.payload());
        let (mut fps, mut duration) = (0.0, 0.0);
        while dec.next() {
            match dec.tag() {
                tags::F1 => fps = dec.as_f32(),
                tags::F2 => duration = dec.as_f32(),
                _ => {}
            }
        }
        assert_eq!((fps, duration), (30.0, 2.0));

        let stop = sent
            .iter()
            .find(|f| f.msg_type() == msg_type::REQ_ANIM_STOP)
            .unwrap();
        assert_eq!(decode_figure_id(stop.payload()), 3);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let (session, ch) = connected();
        let mut anim = BackendAnimator::new(1, 60.0);

        anim.stop(&session).unwrap();
        ok(&ch, 1);
        anim.start(&session, |_: &AnimTick| {}).unwrap();
        anim.start(&session, |_: &AnimTick| {}).unwrap();
        ok(&ch, 2);
        anim.stop(&session).unwrap();
        anim.stop(&session).unwrap();

        let kinds: Vec<u16> = ch.sent_frames().iter().map(|f| f.msg_type()).collect();
        assert_eq!(
            kinds,
            vec![msg_type::HELLO, msg_type::REQ_ANIM_START, msg_type::REQ_ANIM_STOP]
        );
    }

    #[test]
    fn test_failed_start_unregisters() {
        let (session, ch) = connected();
        let err = RespErr {
            request_id: 1,
            code: 4,
            message: "unknown figure".into(),
        };
        push(&ch, msg_type::RESP_ERR, 1, &err.encode());

        let mut anim = BackendAnimator::new(9, 30.0);
        assert!(anim.start(&session, |_: &AnimTick| {}).is_err());
        assert!(!anim.is_running());
        assert!(!session.remove_tick_listener(9));
    }
}
