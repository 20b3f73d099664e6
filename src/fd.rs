//! Small fd utilities shared by both backends.
//!
//! Grounded on the teacher's `util/fd.rs`; `eprintln!` debug traces are
//! replaced with `tracing` events since this crate actually wires up
//! structured logging rather than leaving it declared-but-unused.

use std::io;
use std::os::fd::RawFd;

/// Close `fd`, logging (but not propagating) any failure. After this call
/// the fd must be considered dead on every code path, successful or not.
pub fn close_fd_quiet(fd: RawFd) {
    if fd < 0 {
        return;
    }
    let ret = unsafe { libc::close(fd) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EBADF) => {
                tracing::warn!(fd, "close() -> EBADF (double close or invalid fd)");
            }
            Some(libc::EINTR) => {
                tracing::debug!(fd, "close() interrupted by signal (EINTR); not retrying");
            }
            _ => {
                tracing::warn!(fd, error = %err, "close() failed");
            }
        }
    }
}

/// Half-close both directions of `fd` (`SHUT_RDWR`), forcing any pending
/// receive or send on it to complete with end-of-stream or error. Used by
/// the pipeline driver to unblock a sibling pipeline parked in a kernel
/// call (spec.md §5 "Cancellation").
pub fn shutdown_both(fd: RawFd) {
    if fd < 0 {
        return;
    }
    if unsafe { libc::shutdown(fd, libc::SHUT_RDWR) } != 0 {
        let err = io::Error::last_os_error();
        // ENOTCONN is expected if the peer already tore the connection down.
        if err.raw_os_error() != Some(libc::ENOTCONN) {
            tracing::debug!(fd, error = %err, "shutdown() failed");
        }
    }
}

/// Clear `O_NONBLOCK` on `fd`. Both backends expect blocking semantics:
/// the blocking backend obviously needs it, and the ring backend submits
/// blocking-style read/write opcodes that rely on the kernel, not on
/// `EAGAIN`, to signal "not ready yet".
pub fn clear_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags == -1 {
        return Err(io::Error::last_os_error());
    }
    if flags & libc::O_NONBLOCK != 0 {
        let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
        if ret == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}
