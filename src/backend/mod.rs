//! Backend selection (spec.md §4.4 "selects the ring or blocking backend
//! based on options").

pub mod blocking;
pub mod ring;

use std::os::fd::RawFd;

use crate::error::Result;
use crate::options::Options;
use crate::transform::Transform;

/// Run whichever backend `options.ring.enabled` selects for one pipeline.
pub fn run(
    source_fd: RawFd,
    sink_fd: RawFd,
    prefix: Option<&[u8]>,
    transform: &mut dyn Transform,
    options: &Options,
) -> Result<()> {
    if options.ring.enabled {
        ring::run(source_fd, sink_fd, prefix, transform, options)
    } else {
        blocking::run(source_fd, sink_fd, prefix, transform, options)
    }
}
