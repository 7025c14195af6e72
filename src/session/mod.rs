//! Session: one connection to the rendering daemon.
//!
//! A [`Session`] owns the transport, performs the HELLO/WELCOME handshake,
//! correlates requests with their responses, and dispatches the events the
//! daemon sends in between (window closed, animation ticks, blob release).
//!
//! # Locking
//!
//! One mutex guards the connection. [`Session::request`] holds it from send
//! until the matching response arrives, so two threads never interleave
//! reads on the socket. Passive drains (the frame pacer, see
//! [`crate::animation::ipc_sleep`]) only *try* the lock and skip a poll
//! slice when another thread is mid-request.
//!
//! Events that arrive while a request waits are dispatched on the waiting
//! thread with the connection lock held. Tick listeners therefore must not
//! issue requests; doing so returns a protocol error instead of
//! deadlocking. They may add or remove listeners, including themselves.
//!
//! A chunked transfer holds the lock across all of its chunks, so another
//! thread's write to the same series lands before or after it, never in
//! between.
//!
//! # Example
//!
//! ```ignore
//! use spectra_client::codec::messages::CreateFigure;
//! use spectra_client::Session;
//!
//! let session = Session::builder().connect()?;
//! let fig = session.create_figure(&CreateFigure::new("Demo", 800, 600))?;
//! session.show(fig)?;
//! session.wait_for_close()?;
//! ```

mod builder;
mod figures;
mod ops;

use std::cell::Cell;
use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, trace, warn};

pub use builder::SessionBuilder;
pub use figures::FigureInfo;

pub(crate) use figures::FigureRegistry;

use crate::animation::TickListener;
use crate::blob::BlobStore;
use crate::codec::messages::{decode_request_id, Event, Hello, RespErr, Welcome};
use crate::config::SessionConfig;
use crate::error::{Result, SpectraError};
use crate::launcher;
use crate::protocol::{msg_type, Frame};
use crate::transport::{connect_unix, Channel, Transport};

/// Readiness wait used while blocking for windows to close.
const WAIT_POLL: Duration = Duration::from_millis(100);

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

fn in_dispatch() -> bool {
    DISPATCHING.with(Cell::get)
}

/// Marks the current thread as dispatching an event until dropped.
struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Self {
        DISPATCHING.with(|d| d.set(true));
        Self
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|d| d.set(false));
    }
}

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            _ => SessionState::Disconnected,
        }
    }
}

/// Outcome of one passive drain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drain {
    /// Another thread holds the connection.
    Busy,
    /// Nothing arrived within the slice.
    Idle,
    Dispatched,
    /// No open transport, or the daemon closed the stream.
    Closed,
}

type Connector<C> = Box<dyn Fn() -> Result<C> + Send + Sync>;

/// Locked separately from the registry so a listener can edit the registry.
type SharedListener = Arc<Mutex<Box<dyn TickListener>>>;

fn dispatch_refusal() -> SpectraError {
    SpectraError::Protocol("Requests cannot be issued from event dispatch".into())
}

pub(crate) struct Connection<C: Channel> {
    transport: Option<Transport<C>>,
    session_id: u64,
    window_id: u64,
    heartbeat_ms: u32,
}

impl<C: Channel> Connection<C> {
    fn is_open(&self) -> bool {
        self.transport.as_ref().is_some_and(Transport::is_open)
    }

    fn open_transport(&mut self) -> Result<&mut Transport<C>> {
        match self.transport.as_mut() {
            Some(transport) if transport.is_open() => Ok(transport),
            _ => Err(SpectraError::Connection("Not connected to backend".into())),
        }
    }
}

/// A connection to the rendering daemon plus the client-side state tied
/// to it: figures, animation listeners and shared-memory blobs.
///
/// `Session` is `Sync`; share it behind an `Arc` to drive live animation
/// threads (see [`Session::spawn_live`]).
pub struct Session<C: Channel = UnixStream> {
    config: SessionConfig,
    connector: Connector<C>,
    conn: Mutex<Connection<C>>,
    state: AtomicU8,
    next_request_id: AtomicU64,
    figures: Mutex<FigureRegistry>,
    listeners: Mutex<HashMap<u64, SharedListener>>,
    blobs: BlobStore,
    live_threads: AtomicUsize,
    closed: AtomicBool,
}

impl Session<UnixStream> {
    /// Start configuring a session. Environment overrides are applied.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Resolve the socket path, launch the daemon if needed, and connect.
    pub fn connect(config: SessionConfig) -> Result<Self> {
        let path = launcher::resolve_socket_path(config.socket_path.as_deref());
        if config.auto_launch {
            launcher::ensure_backend(&path, &config.launch)?;
        }
        info!(path = %path.display(), "connecting to backend");
        let io_timeout = config.io_timeout;
        Self::with_connector(config, move || connect_unix(&path, io_timeout))
    }
}

impl<C: Channel> Session<C> {
    /// Connect through `connector`, retrying transient failures.
    ///
    /// The connector is kept for [`reconnect`](Self::reconnect).
    pub fn with_connector<F>(config: SessionConfig, connector: F) -> Result<Self>
    where
        F: Fn() -> Result<C> + Send + Sync + 'static,
    {
        let retries = config.connect_retries;
        let session = Self::new_disconnected(config, Box::new(connector));
        session.connect_with_retry(retries)?;
        Ok(session)
    }

    /// Handshake over an already connected channel. No retries, and a
    /// later reconnect has no channel to use.
    pub fn from_channel(config: SessionConfig, channel: C) -> Result<Self> {
        let slot = Mutex::new(Some(channel));
        let connector = move || {
            slot.lock()
                .take()
                .ok_or_else(|| SpectraError::Connection("No channel available to reconnect".into()))
        };
        let session = Self::new_disconnected(config, Box::new(connector));
        session.connect_with_retry(0)?;
        Ok(session)
    }

    fn new_disconnected(config: SessionConfig, connector: Connector<C>) -> Self {
        let blobs = BlobStore::with_ttl(config.blob_ttl);
        Self {
            config,
            connector,
            conn: Mutex::new(Connection {
                transport: None,
                session_id: 0,
                window_id: 0,
                heartbeat_ms: 0,
            }),
            state: AtomicU8::new(SessionState::Disconnected as u8),
            next_request_id: AtomicU64::new(0),
            figures: Mutex::new(FigureRegistry::default()),
            listeners: Mutex::new(HashMap::new()),
            blobs,
            live_threads: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    // ------------------------------------------------------------------
    // Connection
    // ------------------------------------------------------------------

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn sync_state(&self, conn: &Connection<C>) {
        if !conn.is_open() {
            self.set_state(SessionState::Disconnected);
        }
    }

    fn connect_with_retry(&self, retries: u32) -> Result<()> {
        let mut attempt = 0;
        loop {
            let result = {
                let mut conn = self.conn.lock();
                self.handshake(&mut conn)
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < retries => {
                    attempt += 1;
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "connect failed, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Open a fresh transport and greet the daemon. Replaces any old one.
    fn handshake(&self, conn: &mut Connection<C>) -> Result<()> {
        if let Some(mut old) = conn.transport.take() {
            old.close();
        }
        self.set_state(SessionState::Connecting);

        let (transport, welcome) = match self.open_and_greet() {
            Ok(pair) => pair,
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        conn.transport = Some(transport);
        conn.session_id = welcome.session_id;
        conn.window_id = welcome.window_id;
        conn.heartbeat_ms = welcome.heartbeat_ms;
        self.closed.store(false, Ordering::Release);
        self.set_state(SessionState::Connected);
        info!(
            session_id = welcome.session_id,
            window_id = welcome.window_id,
            heartbeat_ms = welcome.heartbeat_ms,
            mode = %welcome.mode,
            "session established"
        );
        Ok(())
    }

    fn open_and_greet(&self) -> Result<(Transport<C>, Welcome)> {
        let channel = (self.connector)()?;
        let mut transport =
            Transport::from_channel(channel).with_max_payload(self.config.max_payload);

        let hello = Hello::new(
            self.config.client_type.as_str(),
            self.config.client_build.as_str(),
        );
        transport.send(msg_type::HELLO, &hello.encode(), 0, 0, 0)?;

        let frame = transport.recv()?.ok_or_else(|| {
            SpectraError::Connection("Backend closed connection during handshake".into())
        })?;
        if frame.msg_type() != msg_type::WELCOME {
            return Err(SpectraError::Protocol(format!(
                "Expected WELCOME (0x{:04X}), got 0x{:04X}",
                msg_type::WELCOME,
                frame.msg_type()
            )));
        }
        Ok((transport, Welcome::decode(frame.payload())))
    }

    // ------------------------------------------------------------------
    // Request / response
    // ------------------------------------------------------------------

    /// Send one request and block until its response.
    ///
    /// Unrelated messages that arrive first are dispatched as events. An
    /// error response for this request (or one with request id 0) becomes
    /// [`SpectraError::Backend`].
    pub fn request(&self, kind: u16, payload: &[u8]) -> Result<Frame> {
        if in_dispatch() {
            return Err(dispatch_refusal());
        }
        let mut conn = self.conn.lock();
        let result = self.exchange(&mut conn, kind, payload);
        self.sync_state(&conn);
        result
    }

    /// Send requests of one kind back to back without releasing the
    /// connection in between. Stops at the first failure.
    pub(crate) fn request_sequence<I>(&self, kind: u16, payloads: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        if in_dispatch() {
            return Err(dispatch_refusal());
        }
        let mut conn = self.conn.lock();
        let result = payloads
            .into_iter()
            .try_for_each(|payload| self.exchange(&mut conn, kind, payload.as_ref()).map(drop));
        self.sync_state(&conn);
        result
    }

    fn exchange(&self, conn: &mut Connection<C>, kind: u16, payload: &[u8]) -> Result<Frame> {
        let session_id = conn.session_id;
        let transport = conn.open_transport()?;
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1;

        transport.send(kind, payload, request_id, session_id, 0)?;
        debug!(
            kind = msg_type::name(kind),
            request_id,
            len = payload.len(),
            "request sent"
        );

        loop {
            let frame = transport
                .recv()?
                .ok_or_else(|| SpectraError::Connection("Backend closed connection".into()))?;

            if frame.msg_type() == msg_type::RESP_ERR {
                let err = RespErr::decode(frame.payload());
                if err.request_id == request_id
                    || err.request_id == 0
                    || frame.request_id() == request_id
                {
                    debug!(request_id, code = err.code, message = %err.message, "backend error");
                    return Err(SpectraError::Backend {
                        code: err.code,
                        message: err.message,
                    });
                }
            }

            if frame.request_id() == request_id {
                trace!(kind = msg_type::name(frame.msg_type()), request_id, "response");
                return Ok(frame);
            }

            if frame.msg_type() == msg_type::RESP_OK
                && decode_request_id(frame.payload()) == request_id
            {
                return Ok(frame);
            }

            self.dispatch(&frame);
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn dispatch(&self, frame: &Frame) {
        let _guard = DispatchGuard::enter();
        match Event::from_frame(frame) {
            Event::WindowClosed(evt) => {
                if self.figures.lock().mark_closed(evt.figure_id) {
                    info!(figure_id = evt.figure_id, reason = %evt.reason, "window closed");
                } else {
                    debug!(figure_id = evt.figure_id, "window closed for unknown figure");
                }
            }
            Event::FigureDestroyed { figure_id } => {
                self.figures.lock().remove(figure_id);
                self.listeners.lock().remove(&figure_id);
                debug!(figure_id, "figure destroyed by backend");
            }
            Event::Tick(tick) => {
                let listener = self.listeners.lock().get(&tick.figure_id).cloned();
                match listener {
                    Some(listener) => listener.lock().on_tick(&tick),
                    None => {
                        trace!(figure_id = tick.figure_id, "tick for unregistered figure dropped")
                    }
                }
            }
            Event::BlobRelease(name) => {
                if name.is_empty() {
                    warn!("blob release without a name");
                } else {
                    self.blobs.release_blob(&name);
                }
            }
            Event::Other(kind) => {
                debug!(
                    kind = msg_type::name(kind),
                    request_id = frame.request_id(),
                    "ignoring unsolicited message"
                );
            }
        }
    }

    /// Wait up to `slice` for one inbound message and dispatch it, unless
    /// another thread holds the connection.
    pub(crate) fn drain_slice(&self, slice: Duration) -> Result<Drain> {
        let Some(mut conn) = self.conn.try_lock() else {
            return Ok(Drain::Busy);
        };
        let outcome = self.drain_locked(&mut conn, slice);
        self.sync_state(&conn);
        // Hand the lock straight to a waiting requester.
        MutexGuard::unlock_fair(conn);
        outcome
    }

    fn drain_blocking(&self, timeout: Duration) -> Result<Drain> {
        let mut conn = self.conn.lock();
        let outcome = self.drain_locked(&mut conn, timeout);
        self.sync_state(&conn);
        outcome
    }

    fn drain_locked(&self, conn: &mut Connection<C>, timeout: Duration) -> Result<Drain> {
        let Ok(transport) = conn.open_transport() else {
            return Ok(Drain::Closed);
        };
        if !transport.wait_readable(timeout)? {
            return Ok(Drain::Idle);
        }
        match transport.recv()? {
            Some(frame) => {
                self.dispatch(&frame);
                Ok(Drain::Dispatched)
            }
            None => Ok(Drain::Closed),
        }
    }

    /// Block until no figure has an open window.
    ///
    /// Figures that were never shown are shown first. While live threads
    /// run they own the socket, so this only watches visibility flags.
    /// Returns early if the daemon goes away.
    pub fn wait_for_close(&self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }

        let pending = self.figures.lock().never_shown();
        for figure_id in pending {
            self.show(figure_id)?;
        }

        loop {
            if !self.figures.lock().any_visible() {
                return Ok(());
            }
            self.blobs.cleanup_expired();

            if self.live_thread_count() > 0 {
                std::thread::sleep(WAIT_POLL);
                continue;
            }
            if self.drain_blocking(WAIT_POLL)? == Drain::Closed {
                info!("backend connection ended while waiting for windows");
                return Ok(());
            }
        }
    }

    /// Route animation ticks for `figure_id` to `listener`, replacing any
    /// previous one.
    pub fn set_tick_listener<L>(&self, figure_id: u64, listener: L)
    where
        L: TickListener + 'static,
    {
        let listener: Box<dyn TickListener> = Box::new(listener);
        self.listeners
            .lock()
            .insert(figure_id, Arc::new(Mutex::new(listener)));
    }

    /// Returns false if no listener was registered.
    pub fn remove_tick_listener(&self, figure_id: u64) -> bool {
        self.listeners.lock().remove(&figure_id).is_some()
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Disconnect from the daemon. Idempotent; also called on drop.
    ///
    /// Unregisters animation listeners, releases every blob, sends a
    /// fire-and-forget REQ_DISCONNECT and closes the transport.
    pub fn close(&self) {
        if in_dispatch() {
            warn!("close() ignored during event dispatch");
            return;
        }
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.listeners.lock().clear();
        self.blobs.cleanup_all();

        let mut conn = self.conn.lock();
        let session_id = conn.session_id;
        if let Some(mut transport) = conn.transport.take() {
            if transport.is_open() {
                if let Err(e) = transport.send(msg_type::REQ_DISCONNECT, &[], 0, session_id, 0) {
                    debug!(error = %e, "disconnect notice not sent");
                }
            }
            transport.close();
        }
        self.set_state(SessionState::Disconnected);
        info!(session_id, "session closed");
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Session id assigned in WELCOME.
    pub fn session_id(&self) -> u64 {
        self.conn.lock().session_id
    }

    /// Window id assigned in WELCOME.
    pub fn window_id(&self) -> u64 {
        self.conn.lock().window_id
    }

    /// Heartbeat interval the daemon asked for.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(u64::from(self.conn.lock().heartbeat_ms))
    }

    /// Figures this session created or restored, in creation order.
    pub fn figures(&self) -> Vec<FigureInfo> {
        self.figures.lock().snapshot()
    }

    pub fn figure(&self, figure_id: u64) -> Option<FigureInfo> {
        self.figures.lock().get(figure_id).cloned()
    }

    pub fn is_figure_visible(&self, figure_id: u64) -> bool {
        self.figures.lock().is_visible(figure_id)
    }

    #[inline]
    pub fn blob_store(&self) -> &BlobStore {
        &self.blobs
    }

    /// Live threads currently running against this session.
    pub fn live_thread_count(&self) -> usize {
        self.live_threads.load(Ordering::Acquire)
    }

    pub(crate) fn live_threads(&self) -> &AtomicUsize {
        &self.live_threads
    }

    pub(crate) fn figures_mut(&self) -> MutexGuard<'_, FigureRegistry> {
        self.figures.lock()
    }

    #[cfg(test)]
    pub(crate) fn conn_for_test(&self) -> MutexGuard<'_, Connection<C>> {
        self.conn.lock()
    }
}

impl<C: Channel> Drop for Session<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Channel> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("live_threads", &self.live_thread_count())
            .field("blobs", &self.blobs.active_count())
            .finish_non_exhaustive()
    }
}
