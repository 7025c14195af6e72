//! Locating and starting the rendering daemon.
//!
//! The daemon listens on a Unix socket. [`ensure_backend`] checks it and,
//! when nothing healthy answers, spawns the `spectra-backend` binary in its
//! own process group and waits for the socket to come up.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::os::unix::net::UnixStream;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{LaunchConfig, BACKEND_BINARY, BACKEND_PATH_ENV, DEBUG_LOG_ENV, SOCKET_ENV};
use crate::error::{Result, SpectraError};
use crate::transport::poll_readable;

/// File name of the socket inside its directory.
pub const SOCKET_NAME: &str = "spectra.sock";

/// How long the liveness check waits for a just-accepted connection to be dropped.
const LIVENESS_PEEK_WAIT: Duration = Duration::from_millis(50);

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|v| !v.is_empty())
}

/// Socket path from, in order: `explicit`, `SPECTRA_SOCKET`,
/// `$XDG_RUNTIME_DIR/spectra/spectra.sock`, `/tmp/spectra-$USER/spectra.sock`.
pub fn resolve_socket_path(explicit: Option<&Path>) -> PathBuf {
    resolve_socket_path_from(explicit, |key| std::env::var_os(key))
}

/// [`resolve_socket_path`] reading the environment through `lookup`.
pub fn resolve_socket_path_from<F>(explicit: Option<&Path>, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }
    if let Some(path) = non_empty(lookup(SOCKET_ENV)) {
        return PathBuf::from(path);
    }
    if let Some(dir) = non_empty(lookup("XDG_RUNTIME_DIR")) {
        return PathBuf::from(dir).join("spectra").join(SOCKET_NAME);
    }
    let user = non_empty(lookup("USER"))
        .or_else(|| non_empty(lookup("LOGNAME")))
        .map(|u| u.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    PathBuf::from(format!("/tmp/spectra-{user}")).join(SOCKET_NAME)
}

/// True if a daemon accepts connections on `path` and does not hang up
/// straight away.
///
/// A healthy daemon sends nothing before HELLO, so a socket that turns
/// readable within a moment of connecting is at end-of-stream: a daemon
/// that is shutting down.
pub fn check_liveness(path: &Path) -> bool {
    let stream = match UnixStream::connect(path) {
        Ok(stream) => stream,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "backend not reachable");
            return false;
        }
    };
    match poll_readable(stream.as_raw_fd(), LIVENESS_PEEK_WAIT) {
        Ok(false) => true,
        Ok(true) => peer_still_open(&stream),
        Err(_) => false,
    }
}

fn peer_still_open(stream: &UnixStream) -> bool {
    let mut byte = 0u8;
    let n = unsafe {
        libc::recv(
            stream.as_raw_fd(),
            (&mut byte as *mut u8).cast(),
            1,
            libc::MSG_PEEK | libc::MSG_DONTWAIT,
        )
    };
    match n {
        0 => {
            debug!("backend accepted then closed, treating as down");
            false
        }
        n if n > 0 => true,
        _ => io::Error::last_os_error().kind() == io::ErrorKind::WouldBlock,
    }
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Daemon binary from the environment and `PATH`. See
/// [`find_backend_binary_from`].
pub fn find_backend_binary(config: &LaunchConfig) -> Option<PathBuf> {
    find_backend_binary_from(config, |key| std::env::var_os(key))
}

/// First executable of: the configured path, `SPECTRA_BACKEND_PATH`,
/// `spectra-backend` next to the running executable, `spectra-backend`
/// on `PATH`.
pub fn find_backend_binary_from<F>(config: &LaunchConfig, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<OsString>,
{
    if let Some(path) = config.backend_path.as_deref() {
        if is_executable(path) {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured backend is not an executable file");
    }

    if let Some(path) = non_empty(lookup(BACKEND_PATH_ENV)).map(PathBuf::from) {
        if is_executable(&path) {
            return Some(path);
        }
    }

    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(BACKEND_BINARY)))
        .filter(|path| is_executable(path));
    if sibling.is_some() {
        return sibling;
    }

    let search = lookup("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(BACKEND_BINARY))
        .find(|path| is_executable(path))
}

/// Make sure a daemon is listening on `socket_path`, starting one if not.
pub fn ensure_backend(socket_path: &Path, config: &LaunchConfig) -> Result<()> {
    if check_liveness(socket_path) {
        return Ok(());
    }

    let binary = find_backend_binary(config).ok_or_else(|| {
        SpectraError::Launch(format!(
            "{BACKEND_BINARY} binary not found. Set {BACKEND_PATH_ENV} or add it to PATH."
        ))
    })?;
    let debug_log = config
        .debug_log
        .clone()
        .or_else(|| non_empty(std::env::var_os(DEBUG_LOG_ENV)).map(PathBuf::from));

    launch(&binary, socket_path, debug_log.as_deref())?;
    wait_until_live(socket_path, config)
}

// The daemon is meant to outlive this process, so it is never waited on.
#[allow(clippy::zombie_processes)]
fn launch(binary: &Path, socket_path: &Path, debug_log: Option<&Path>) -> Result<()> {
    if let Some(dir) = socket_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(dir)
            .map_err(|e| {
                SpectraError::Launch(format!("cannot create {}: {e}", dir.display()))
            })?;
    }

    match fs::remove_file(socket_path) {
        Ok(()) => debug!(path = %socket_path.display(), "removed stale socket"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %socket_path.display(), error = %e, "cannot remove stale socket"),
    }

    let stderr = match debug_log {
        Some(path) => File::create(path).map(Stdio::from).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "cannot open backend debug log");
            Stdio::null()
        }),
        None => Stdio::null(),
    };

    let child = Command::new(binary)
        .arg("--socket")
        .arg(socket_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(stderr)
        .process_group(0)
        .spawn()
        .map_err(|e| SpectraError::Launch(format!("cannot start {}: {e}", binary.display())))?;

    info!(
        binary = %binary.display(),
        socket = %socket_path.display(),
        pid = child.id(),
        "launched backend"
    );
    Ok(())
}

fn wait_until_live(socket_path: &Path, config: &LaunchConfig) -> Result<()> {
    let deadline = Instant::now() + config.timeout;
    while Instant::now() < deadline {
        if check_liveness(socket_path) {
            return Ok(());
        }
        std::thread::sleep(config.poll_interval);
    }
    Err(SpectraError::Launch(format!(
        "{BACKEND_BINARY} did not start within {:.1}s. Socket: {}",
        config.timeout.as_secs_f64(),
        socket_path.display()
    )))
}
