//! Pipeline driver (spec.md §4.4).
//!
//! Owns one direction's sockets and transform, selects a backend, and
//! enforces teardown. Grounded on the teacher's `core/connection_pair.rs`
//! ownership shape (one struct per direction holding both fds) and on
//! `zstd_proxy_run` in `examples/original_source/src/zstd-proxy.c`, which
//! clears non-blocking flags and dispatches to the posix or uring backend
//! the same way.

use crate::backend;
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::fd::{clear_nonblocking, shutdown_both};
use crate::options::Options;
use crate::transform::Transform;

/// Run one half-duplex pipeline to completion.
///
/// On return — success or failure — both descriptors are half-closed and
/// the shared cancellation flag is set, so the sibling pipeline parked in a
/// kernel call unblocks promptly (spec.md §5 "Cancellation").
pub fn run(
    source: Descriptor<'_>,
    sink: Descriptor<'_>,
    transform: &mut dyn Transform,
    options: &Options,
) -> Result<()> {
    let result = run_inner(&source, &sink, transform, options);

    options.request_stop();
    shutdown_both(source.fd);
    shutdown_both(sink.fd);

    result
}

fn run_inner(
    source: &Descriptor<'_>,
    sink: &Descriptor<'_>,
    transform: &mut dyn Transform,
    options: &Options,
) -> Result<()> {
    clear_nonblocking(source.fd)?;
    clear_nonblocking(sink.fd)?;

    backend::run(source.fd, sink.fd, source.prefix, transform, options)
}
