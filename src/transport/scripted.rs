//! In-memory channel for unit tests.
//!
//! Reads drain a queue of scripted inbound bytes and report end-of-stream
//! once it is empty. Writes are captured for inspection. Clones share state,
//! so a test can keep a handle after moving one into a transport.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use super::Channel;
use crate::protocol::{build_frame, Frame, Header, HEADER_SIZE};

#[derive(Default)]
struct Script {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    read_limit: Option<usize>,
    write_limit: Option<usize>,
    eof: bool,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedChannel {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cap each read at `n` bytes.
    pub(crate) fn with_read_limit(self, n: usize) -> Self {
        self.inner.lock().read_limit = Some(n);
        self
    }

    /// Cap each write at `n` bytes.
    pub(crate) fn with_write_limit(self, n: usize) -> Self {
        self.inner.lock().write_limit = Some(n);
        self
    }

    /// Report readiness once the inbound queue is empty, as a socket does
    /// after the peer hangs up.
    pub(crate) fn close_inbound(&self) {
        self.inner.lock().eof = true;
    }

    pub(crate) fn push_bytes(&self, bytes: &[u8]) {
        self.inner.lock().inbound.extend(bytes.iter().copied());
    }

    pub(crate) fn push_frame(&self, header: Header, payload: &[u8]) {
        self.push_bytes(&build_frame(&header, payload));
    }

    /// Every complete frame written so far.
    pub(crate) fn sent_frames(&self) -> Vec<Frame> {
        let out = self.inner.lock().outbound.clone();
        let mut frames = Vec::new();
        let mut at = 0;
        while let Some(header) = out.get(at..).and_then(Header::decode) {
            let start = at + HEADER_SIZE;
            let end = start + header.payload_len as usize;
            if end > out.len() {
                break;
            }
            frames.push(Frame::new(header, Bytes::copy_from_slice(&out[start..end])));
            at = end;
        }
        frames
    }
}

impl Read for ScriptedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut script = self.inner.lock();
        let n = buf
            .len()
            .min(script.inbound.len())
            .min(script.read_limit.unwrap_or(usize::MAX));
        for (slot, byte) in buf.iter_mut().zip(script.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut script = self.inner.lock();
        let n = buf.len().min(script.write_limit.unwrap_or(usize::MAX));
        script.outbound.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for ScriptedChannel {
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let ready = || {
            let script = self.inner.lock();
            !script.inbound.is_empty() || script.eof
        };
        if ready() {
            return Ok(true);
        }
        std::thread::sleep(timeout);
        Ok(ready())
    }
}
