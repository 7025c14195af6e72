//! POSIX named shared-memory segments.
//!
//! The segment stays linked after creation so the daemon can open it by
//! name; [`unlink_segment`] removes the name once the daemon is done.
//! Mappings already open elsewhere remain valid after unlink.

use std::ffi::CString;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid name"))
}

/// Create segment `name` sized to `data` and copy `data` into it.
///
/// Fails with `AlreadyExists` if the name is taken. On any failure after
/// the segment was created, the name is unlinked again.
pub fn create_segment(name: &str, data: &[u8]) -> io::Result<()> {
    let c_name = c_name(name)?;

    let fd = unsafe {
        libc::shm_open(
            c_name.as_ptr(),
            libc::O_RDWR | libc::O_CREAT | libc::O_EXCL,
            0o600,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    let filled = fill(&fd, data);
    if filled.is_err() {
        unsafe {
            libc::shm_unlink(c_name.as_ptr());
        }
    }
    filled
}

fn fill(fd: &OwnedFd, data: &[u8]) -> io::Result<()> {
    let result = unsafe { libc::ftruncate(fd.as_raw_fd(), data.len() as libc::off_t) };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    if data.is_empty() {
        return Ok(());
    }

    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            data.len(),
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd.as_raw_fd(),
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
        libc::munmap(ptr, data.len());
    }
    Ok(())
}

/// Remove segment `name`. A missing segment is not an error.
pub fn unlink_segment(name: &str) -> io::Result<()> {
    let c_name = c_name(name)?;
    let result = unsafe { libc::shm_unlink(c_name.as_ptr()) };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::NotFound {
            return Err(err);
        }
    }
    Ok(())
}

/// Read a segment back. Used by tests standing in for the daemon.
#[cfg(test)]
pub(crate) fn read_segment(name: &str, len: usize) -> io::Result<Vec<u8>> {
    let c_name = c_name(name)?;
    let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ,
            libc::MAP_SHARED,
            fd.as_raw_fd(),
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    let mut out = vec![0u8; len];
    unsafe {
        std::ptr::copy_nonoverlapping(ptr as *const u8, out.as_mut_ptr(), len);
        libc::munmap(ptr, len);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("/spectra-test-{}-{}", std::process::id(), tag)
    }

    #[test]
    fn test_create_read_unlink() {
        let name = unique("rw");
        if create_segment(&name, b"segment data").is_err() {
            // No shared memory in this environment.
            return;
        }
        assert_eq!(read_segment(&name, 12).unwrap(), b"segment data");

        assert!(create_segment(&name, b"again").is_err());

        unlink_segment(&name).unwrap();
        assert!(read_segment(&name, 12).is_err());
        unlink_segment(&name).unwrap();
    }

    #[test]
    fn test_invalid_name() {
        assert!(create_segment("/bad\0name", b"x").is_err());
    }
}
