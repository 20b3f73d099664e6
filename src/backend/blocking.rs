//! Blocking backend (spec.md §4.2).
//!
//! One allocated receive buffer and one allocated send buffer, grounded on
//! `examples/original_source/src/zstd-proxy-posix.c`'s
//! `zstd_proxy_posix_run` / `zstd_proxy_posix_process`, with the teacher's
//! `StreamPump` buffer bookkeeping style applied to short sends: per
//! spec.md §9's resolved Open Question, short sends are retried here
//! (the original's failure to retry is treated as a bug, not reproduced).

use std::io;
use std::os::fd::RawFd;

use crate::error::{ProxyError, Result};
use crate::options::Options;
use crate::transform::{InCursor, OutCursor, Transform};

/// Run the blocking backend for one pipeline until the source closes, an
/// error occurs, or `options.is_stopped()` becomes true.
pub fn run(
    source_fd: RawFd,
    sink_fd: RawFd,
    prefix: Option<&[u8]>,
    transform: &mut dyn Transform,
    options: &Options,
) -> Result<()> {
    let buffer_size = options.buffer_size;
    let mut recv_buf = vec![0u8; buffer_size];
    let mut send_buf = vec![0u8; buffer_size];

    if let Some(prefix) = prefix {
        if !prefix.is_empty() {
            tracing::debug!(len = prefix.len(), "absorbing prefix before first receive");
            drain_window(prefix, transform, &mut send_buf, sink_fd)?;
        }
    }

    loop {
        let received = recv_blocking(source_fd, &mut recv_buf)?;
        if received == 0 {
            tracing::debug!("source reached end-of-stream");
            break;
        }
        drain_window(&recv_buf[..received], transform, &mut send_buf, sink_fd)?;

        if options.is_stopped() {
            tracing::debug!("cancellation flag observed at loop boundary");
            break;
        }
    }

    Ok(())
}

/// Feed `window` through the transform until fully consumed, flushing
/// every produced chunk to the sink (spec.md §4.2 step 4).
fn drain_window(
    window: &[u8],
    transform: &mut dyn Transform,
    send_buf: &mut [u8],
    sink_fd: RawFd,
) -> Result<()> {
    let mut in_cur = InCursor::new(window);
    while !in_cur.is_exhausted() {
        let before = in_cur.pos();
        let mut out_cur = OutCursor::new(send_buf);
        transform.apply(&mut in_cur, &mut out_cur)?;
        let produced = out_cur.pos();

        if produced > 0 {
            send_all(sink_fd, &send_buf[..produced])?;
        }

        if in_cur.pos() == before && produced == 0 {
            return Err(ProxyError::codec(
                "transform made no forward progress with free output space",
            ));
        }
    }
    Ok(())
}

fn recv_blocking(fd: RawFd, buf: &mut [u8]) -> Result<usize> {
    loop {
        let n = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ProxyError::Io(err));
        }
        return Ok(n as usize);
    }
}

/// Send exactly `buf.len()` bytes, retrying short writes internally so this
/// either fully flushes or errors (spec.md §4.2 step 4, §9 Open Question).
fn send_all(fd: RawFd, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let n = unsafe { libc::send(fd, buf.as_ptr() as *const libc::c_void, buf.len(), 0) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ProxyError::Io(err));
        }
        buf = &buf[n as usize..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::IdentityTransform;
    use std::io::{Read, Write};
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::thread;

    #[test]
    fn single_small_write_is_forwarded_verbatim() {
        let (source, mut source_peer) = UnixStream::pair().unwrap();
        let (sink, mut sink_peer) = UnixStream::pair().unwrap();
        let opts = Options::default();

        let writer = thread::spawn(move || {
            source_peer.write_all(b"hello world").unwrap();
            drop(source_peer);
        });

        let mut identity = IdentityTransform;
        run(
            source.as_raw_fd(),
            sink.as_raw_fd(),
            None,
            &mut identity,
            &opts,
        )
        .unwrap();

        writer.join().unwrap();
        let mut out = Vec::new();
        sink_peer.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn empty_stream_forwards_nothing() {
        let (source, source_peer) = UnixStream::pair().unwrap();
        let (sink, mut sink_peer) = UnixStream::pair().unwrap();
        let opts = Options::default();
        drop(source_peer);

        let mut identity = IdentityTransform;
        run(
            source.as_raw_fd(),
            sink.as_raw_fd(),
            None,
            &mut identity,
            &opts,
        )
        .unwrap();

        let mut out = Vec::new();
        sink_peer.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn prefix_bytes_are_absorbed_before_any_receive() {
        let (source, mut source_peer) = UnixStream::pair().unwrap();
        let (sink, mut sink_peer) = UnixStream::pair().unwrap();
        let opts = Options::default();

        let writer = thread::spawn(move || {
            source_peer.write_all(b" world").unwrap();
            drop(source_peer);
        });

        let mut identity = IdentityTransform;
        run(
            source.as_raw_fd(),
            sink.as_raw_fd(),
            Some(b"hello"),
            &mut identity,
            &opts,
        )
        .unwrap();

        writer.join().unwrap();
        let mut out = Vec::new();
        sink_peer.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn large_stream_round_trips_through_compress_and_decompress() {
        use crate::transform::{CompressTransform, DecompressTransform};

        let (src_a, mut src_a_peer) = UnixStream::pair().unwrap();
        let (mid_a, mid_b) = UnixStream::pair().unwrap();
        let (sink_b, mut sink_b_peer) = UnixStream::pair().unwrap();

        let payload: Vec<u8> = (0..2_000_000u32).map(|i| (i % 7) as u8).collect();
        let payload_clone = payload.clone();

        let writer = thread::spawn(move || {
            src_a_peer.write_all(&payload_clone).unwrap();
            drop(src_a_peer);
        });

        let opts = Options::default();
        let mut compressor = CompressTransform::new(3).unwrap();
        let compress_handle = {
            let fd_in = src_a.as_raw_fd();
            let fd_out = mid_a.as_raw_fd();
            let opts = Options::default();
            thread::spawn(move || run(fd_in, fd_out, None, &mut compressor, &opts))
        };

        let mut decompressor = DecompressTransform::new().unwrap();
        run(
            mid_b.as_raw_fd(),
            sink_b.as_raw_fd(),
            None,
            &mut decompressor,
            &opts,
        )
        .unwrap();

        compress_handle.join().unwrap().unwrap();
        writer.join().unwrap();

        let mut out = Vec::new();
        sink_b_peer.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }
}
