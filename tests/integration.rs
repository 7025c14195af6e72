//! Integration tests for spectra-client.
//!
//! A fake daemon runs on the other end of a socket pair and answers
//! requests the way the real one does.

use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use spectra_client::animation::BackendAnimator;
use spectra_client::chunk::ChunkAssembler;
use spectra_client::codec::messages::{
    decode_figure_id, encode_blob_release, encode_resp_ok, AddSeries, AnimTick, AxesCreated,
    CreateAxes, CreateFigure, DataMessage, FigureCreated, FigureList, RespErr, SeriesAdded,
    UpdateProperty, Welcome, WindowClosed,
};
use spectra_client::protocol::{msg_type, Frame};
use spectra_client::transport::Transport;
use spectra_client::{Session, SessionBuilder, SessionConfig, SpectraError};

const SESSION_ID: u64 = 77;

/// What the fake daemon saw before the client went away.
#[derive(Debug, Default)]
struct DaemonLog {
    kinds: Vec<u16>,
    writes: Vec<(u64, u32, Vec<f32>)>,
    shm_names: Vec<String>,
    disconnected: bool,
}

struct FakeDaemon {
    transport: Transport<UnixStream>,
    assembler: ChunkAssembler,
    next_figure: u64,
    log: DaemonLog,
    /// Ticks sent after an ANIM_START, ahead of its reply.
    ticks_per_start: u32,
}

impl FakeDaemon {
    fn reply(&mut self, kind: u16, request_id: u64, payload: &[u8]) {
        self.transport
            .send(kind, payload, request_id, SESSION_ID, 0)
            .unwrap();
    }

    fn ok(&mut self, request_id: u64) {
        self.reply(msg_type::RESP_OK, request_id, &encode_resp_ok(request_id));
    }

    fn handle(&mut self, frame: Frame) -> bool {
        let rid = frame.request_id();
        self.log.kinds.push(frame.msg_type());
        match frame.msg_type() {
            msg_type::HELLO => {
                let welcome = Welcome {
                    session_id: SESSION_ID,
                    window_id: 3,
                    process_id: 1,
                    heartbeat_ms: 2000,
                    mode: "multiproc".into(),
                };
                self.reply(msg_type::WELCOME, 0, &welcome.encode());
            }
            msg_type::REQ_CREATE_FIGURE => {
                self.next_figure += 1;
                let created = FigureCreated {
                    request_id: rid,
                    figure_id: self.next_figure,
                };
                self.reply(msg_type::RESP_FIGURE_CREATED, rid, &created.encode());
            }
            msg_type::REQ_CREATE_AXES => {
                let created = AxesCreated {
                    request_id: rid,
                    axes_index: 0,
                };
                self.reply(msg_type::RESP_AXES_CREATED, rid, &created.encode());
            }
            msg_type::REQ_ADD_SERIES => {
                let added = SeriesAdded {
                    request_id: rid,
                    series_index: 0,
                };
                self.reply(msg_type::RESP_SERIES_ADDED, rid, &added.encode());
            }
            msg_type::REQ_LIST_FIGURES => {
                let list = FigureList {
                    request_id: rid,
                    figure_ids: (1..=self.next_figure).collect(),
                };
                self.reply(msg_type::RESP_FIGURE_LIST, rid, &list.encode());
            }
            msg_type::REQ_SET_DATA => {
                let msg = DataMessage::decode(frame.payload());
                if let Some(name) = msg.shm_name.clone() {
                    self.log.shm_names.push(name.clone());
                    self.ok(rid);
                    self.reply(msg_type::BLOB_RELEASE, 0, &encode_blob_release(&name));
                    return true;
                }
                match self.assembler.accept(msg) {
                    Ok(Some(done)) => {
                        self.log
                            .writes
                            .push((done.figure_id, done.series_index, done.values));
                        self.ok(rid);
                    }
                    Ok(None) => self.ok(rid),
                    Err(e) => {
                        let err = RespErr {
                            request_id: rid,
                            code: 2,
                            message: e.to_string(),
                        };
                        self.reply(msg_type::RESP_ERR, rid, &err.encode());
                    }
                }
            }
            msg_type::REQ_SHOW => {
                let figure_id = decode_figure_id(frame.payload());
                self.ok(rid);
                let closed = WindowClosed {
                    figure_id,
                    window_id: 3,
                    reason: "user".into(),
                };
                self.reply(msg_type::EVT_WINDOW_CLOSED, 0, &closed.encode());
            }
            msg_type::REQ_ANIM_START => {
                let figure_id = decode_figure_id(frame.payload());
                for frame_num in 1..=self.ticks_per_start {
                    let tick = AnimTick {
                        figure_id,
                        frame_num,
                        t: frame_num as f32 / 60.0,
                        dt: 1.0 / 60.0,
                    };
                    self.reply(msg_type::ANIM_TICK, 0, &tick.encode());
                }
                self.ok(rid);
            }
            msg_type::REQ_DESTROY_FIGURE => {
                let err = RespErr {
                    request_id: rid,
                    code: 4,
                    message: "figure is locked".into(),
                };
                self.reply(msg_type::RESP_ERR, rid, &err.encode());
            }
            msg_type::REQ_DISCONNECT => {
                self.log.disconnected = true;
                return false;
            }
            _ => self.ok(rid),
        }
        true
    }

    fn run(mut self) -> DaemonLog {
        while let Ok(Some(frame)) = self.transport.recv() {
            if !self.handle(frame) {
                break;
            }
        }
        self.log
    }
}

fn spawn_daemon(ticks_per_start: u32) -> (UnixStream, JoinHandle<DaemonLog>) {
    let (client, server) = UnixStream::pair().unwrap();
    let daemon = FakeDaemon {
        transport: Transport::from_channel(server),
        assembler: ChunkAssembler::new(),
        next_figure: 0,
        log: DaemonLog::default(),
        ticks_per_start,
    };
    (client, thread::spawn(move || daemon.run()))
}

fn config() -> SessionConfig {
    SessionBuilder::from_config(SessionConfig::default())
        .auto_launch(false)
        .io_timeout(Some(Duration::from_secs(5)))
        .into_config()
}

fn line_figure(session: &Session) -> (u64, u32) {
    let fig = session
        .create_figure(&CreateFigure::new("integration", 640, 480))
        .unwrap();
    let axes = session
        .create_axes(&CreateAxes {
            figure_id: fig,
            rows: 1,
            cols: 1,
            index: 1,
            is_3d: false,
        })
        .unwrap();
    let series = session
        .add_series(&AddSeries {
            figure_id: fig,
            axes_index: axes,
            series_type: "line".into(),
            label: "y".into(),
        })
        .unwrap();
    (fig, series)
}

/// Handshake, figure setup, an inline write and a clean disconnect.
#[test]
fn test_session_lifecycle() {
    let (stream, daemon) = spawn_daemon(0);
    let session = Session::from_channel(config(), stream).unwrap();
    assert!(session.is_connected());
    assert_eq!(session.session_id(), SESSION_ID);
    assert_eq!(session.window_id(), 3);
    assert_eq!(session.heartbeat(), Duration::from_millis(2000));

    let (fig, series) = line_figure(&session);
    assert_eq!(fig, 1);
    session.set_xy(fig, series, &[0.0, 1.0], &[2.0, 3.0]).unwrap();
    session
        .update_property(&UpdateProperty::new(fig, "title").text("renamed"))
        .unwrap();
    assert_eq!(session.list_figures().unwrap(), vec![1]);

    session.close();
    assert!(!session.is_connected());

    let log = daemon.join().unwrap();
    assert!(log.disconnected);
    assert_eq!(log.writes, vec![(1, 0, vec![0.0, 2.0, 1.0, 3.0])]);
    assert_eq!(
        log.kinds,
        vec![
            msg_type::HELLO,
            msg_type::REQ_CREATE_FIGURE,
            msg_type::REQ_CREATE_AXES,
            msg_type::REQ_ADD_SERIES,
            msg_type::REQ_SET_DATA,
            msg_type::REQ_UPDATE_PROPERTY,
            msg_type::REQ_LIST_FIGURES,
            msg_type::REQ_DISCONNECT,
        ]
    );
}

/// A write above the chunk size arrives as one reassembled transfer.
#[test]
fn test_chunked_write_reassembles() {
    let (stream, daemon) = spawn_daemon(0);
    let config = SessionBuilder::from_config(config())
        .chunk_size(64)
        .shared_memory(false)
        .into_config();
    let session = Session::from_channel(config, stream).unwrap();
    let (fig, series) = line_figure(&session);

    let values: Vec<f32> = (0..100).map(|i| i as f32 * 0.5).collect();
    session.set_data(fig, series, &values).unwrap();
    session.close();

    let log = daemon.join().unwrap();
    // 400 bytes in 64-byte chunks.
    let set_data = log
        .kinds
        .iter()
        .filter(|&&k| k == msg_type::REQ_SET_DATA)
        .count();
    assert_eq!(set_data, 7);
    assert_eq!(log.writes, vec![(fig, series, values)]);
}

/// Large writes go through shared memory and the daemon's BLOB_RELEASE
/// frees the segment.
#[test]
fn test_shared_memory_release() {
    let (stream, daemon) = spawn_daemon(0);
    let config = SessionBuilder::from_config(config())
        .shm_threshold(256)
        .into_config();
    let session = Session::from_channel(config, stream).unwrap();
    let (fig, series) = line_figure(&session);

    let values = vec![1.5f32; 1024];
    session.set_data(fig, series, &values).unwrap();
    // The release follows the OK; the next request reads it.
    session.list_figures().unwrap();
    assert_eq!(session.blob_store().active_count(), 0);
    session.close();

    let log = daemon.join().unwrap();
    if log.shm_names.is_empty() {
        // No shared memory in this environment: the inline fallback ran.
        assert_eq!(log.writes, vec![(fig, series, values)]);
    } else {
        assert_eq!(log.shm_names.len(), 1);
        assert!(log.writes.is_empty());
    }
}

/// The window-closed event that follows SHOW ends wait_for_close.
#[test]
fn test_wait_for_close_after_window_closed() {
    let (stream, daemon) = spawn_daemon(0);
    let session = Session::from_channel(config(), stream).unwrap();
    let (fig, _) = line_figure(&session);

    // Never shown, so wait_for_close shows it first.
    session.wait_for_close().unwrap();
    assert!(!session.is_figure_visible(fig));
    let info = session.figure(fig).unwrap();
    assert!(info.shown_once);

    session.close();
    let log = daemon.join().unwrap();
    assert!(log.kinds.contains(&msg_type::REQ_SHOW));
}

/// Backend errors surface with their code and leave the session usable.
#[test]
fn test_backend_error() {
    let (stream, daemon) = spawn_daemon(0);
    let session = Session::from_channel(config(), stream).unwrap();
    let (fig, _) = line_figure(&session);

    let err = session.destroy_figure(fig).unwrap_err();
    assert!(matches!(err, SpectraError::Backend { code: 4, .. }));
    assert_eq!(err.backend_code(), Some(4));
    assert!(session.figure(fig).is_some());
    assert_eq!(session.list_figures().unwrap(), vec![fig]);

    session.close();
    daemon.join().unwrap();
}

/// Ticks sent ahead of the ANIM_START reply reach the listener.
#[test]
fn test_backend_animation_ticks() {
    let (stream, daemon) = spawn_daemon(4);
    let session = Session::from_channel(config(), stream).unwrap();
    let (fig, _) = line_figure(&session);

    let mut anim = BackendAnimator::new(fig, 60.0);
    let ticks = anim.start_channel(&session).unwrap();
    let frames: Vec<u32> = ticks.try_iter().map(|t| t.frame_num).collect();
    assert_eq!(frames, vec![1, 2, 3, 4]);

    anim.stop(&session).unwrap();
    session.close();
    let log = daemon.join().unwrap();
    assert!(log.kinds.contains(&msg_type::REQ_ANIM_STOP));
}

/// A live thread streams appends while the main thread waits.
#[test]
fn test_live_thread_appends() {
    let (stream, daemon) = spawn_daemon(0);
    let session = Arc::new(Session::from_channel(config(), stream).unwrap());
    let (fig, series) = line_figure(&session);

    let handle = session
        .spawn_live(120.0, move |session, frame| {
            session.append_data(fig, series, &[frame.t as f32])
        })
        .unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(handle.stop());
    assert_eq!(session.live_thread_count(), 0);

    session.close();
    let log = daemon.join().unwrap();
    let appends = log
        .kinds
        .iter()
        .filter(|&&k| k == msg_type::REQ_APPEND_DATA)
        .count();
    assert!(appends > 0);
}

/// Losing the daemon turns requests into connection errors.
#[test]
fn test_daemon_gone() {
    let (client, server) = UnixStream::pair().unwrap();
    let daemon = thread::spawn(move || {
        let mut transport = Transport::from_channel(server);
        let hello = transport.recv().unwrap().unwrap();
        assert_eq!(hello.msg_type(), msg_type::HELLO);
        let welcome = Welcome {
            session_id: SESSION_ID,
            ..Welcome::default()
        };
        transport
            .send(msg_type::WELCOME, &welcome.encode(), 0, SESSION_ID, 0)
            .unwrap();
        // Dropping the transport closes the socket.
    });

    let session = Session::from_channel(config(), client).unwrap();
    daemon.join().unwrap();

    let err = session
        .create_figure(&CreateFigure::default())
        .unwrap_err();
    assert!(err.is_connection_error());
    assert!(!session.is_connected());
}
