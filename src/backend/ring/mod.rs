//! Completion-ring backend (spec.md §4.3).

pub mod probe;
pub mod queue;
pub mod slot;

use std::os::fd::RawFd;

use crate::error::Result;
use crate::options::Options;
use crate::transform::Transform;

use queue::RingQueue;

/// Run the ring backend for one pipeline until the source closes, an error
/// occurs, or `options.is_stopped()` becomes true.
pub fn run(
    source_fd: RawFd,
    sink_fd: RawFd,
    prefix: Option<&[u8]>,
    transform: &mut dyn Transform,
    options: &Options,
) -> Result<()> {
    let mut queue = RingQueue::create(source_fd, sink_fd, transform, options, &options.ring)?;

    if let Some(prefix) = prefix {
        if !prefix.is_empty() {
            queue.process_prefix(prefix)?;
        }
    }

    queue.run_event_loop()
}

#[cfg(test)]
#[cfg(target_os = "linux")]
mod tests {
    use super::*;
    use crate::options::OptionsBuilder;
    use crate::transform::{CompressTransform, DecompressTransform, IdentityTransform};
    use std::io::{Read, Write};
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;
    use std::thread;

    #[test]
    fn single_small_write_is_forwarded_verbatim() {
        let (source, mut source_peer) = UnixStream::pair().unwrap();
        let (sink, mut sink_peer) = UnixStream::pair().unwrap();
        let options = OptionsBuilder::new().ring_enabled(true).ring_depth(2).build();

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
            &options,
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
        let options = OptionsBuilder::new().ring_enabled(true).ring_depth(2).build();
        drop(source_peer);

        let mut identity = IdentityTransform;
        run(
            source.as_raw_fd(),
            sink.as_raw_fd(),
            None,
            &mut identity,
            &options,
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
        let options = OptionsBuilder::new().ring_enabled(true).ring_depth(2).build();

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
            &options,
        )
        .unwrap();

        writer.join().unwrap();
        let mut out = Vec::new();
        sink_peer.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello world");
    }

    #[test]
    fn large_stream_round_trips_through_compress_and_decompress() {
        let (src_a, mut src_a_peer) = UnixStream::pair().unwrap();
        let (mid_a, mid_b) = UnixStream::pair().unwrap();
        let (sink_b, mut sink_b_peer) = UnixStream::pair().unwrap();

        let payload: Vec<u8> = (0..2_000_000u32).map(|i| (i % 7) as u8).collect();
        let payload_clone = payload.clone();

        let writer = thread::spawn(move || {
            src_a_peer.write_all(&payload_clone).unwrap();
            drop(src_a_peer);
        });

        let mut compressor = CompressTransform::new(3).unwrap();
        let compress_handle = {
            let fd_in = src_a.as_raw_fd();
            let fd_out = mid_a.as_raw_fd();
            let options = OptionsBuilder::new().ring_enabled(true).ring_depth(4).build();
            thread::spawn(move || run(fd_in, fd_out, None, &mut compressor, &options))
        };

        let options = OptionsBuilder::new().ring_enabled(true).ring_depth(4).build();
        let mut decompressor = DecompressTransform::new().unwrap();
        run(
            mid_b.as_raw_fd(),
            sink_b.as_raw_fd(),
            None,
            &mut decompressor,
            &options,
        )
        .unwrap();

        compress_handle.join().unwrap().unwrap();
        writer.join().unwrap();

        let mut out = Vec::new();
        sink_b_peer.read_to_end(&mut out).unwrap();
        assert_eq!(out, payload);
    }
}
