//! Engine entry point (spec.md §4.5).
//!
//! Grounded on `zstd_proxy_run` in
//! `examples/original_source/src/zstd-proxy.c`: clear non-blocking flags,
//! run the capability probe once if the ring backend was requested, spawn
//! the two pipeline threads, join them, and surface the first error in
//! outbound/inbound/setup precedence (spec.md §7 "Propagation"). The
//! teacher spawns one `std::thread` per worker with no async runtime
//! (`src/main.rs`); this keeps that shape, using `std::thread::scope` so
//! the borrowed prefix slices the invocation contract promises never to
//! retain past `run` returning can be passed to both pipeline threads
//! without an `Arc` or a `'static` bound.

use std::thread;

use crate::backend::ring;
use crate::descriptor::Descriptor;
use crate::error::Result;
use crate::fd::close_fd_quiet;
use crate::fd::clear_nonblocking;
use crate::options::Options;
use crate::pipeline;
use crate::transform::{CompressTransform, DecompressTransform, IdentityTransform, Transform};

/// One connection's invocation: two already-connected descriptors (each
/// optionally carrying a prefix already read during sniffing) plus the
/// options for this connection (spec.md §6 "Engine invocation contract").
pub struct Proxy<'a> {
    pub listen: Descriptor<'a>,
    pub connect: Descriptor<'a>,
    pub options: Options,
}

/// Fill in option defaults that depend on other options rather than a
/// plain constant (spec.md §4.5 operation 1, "init(proxy) ... fills in
/// defaults"). `ring.zero_copy` implies `ring.fixed_buffers`; a caller that
/// asks for zero-copy without separately asking for fixed buffers gets
/// fixed buffers anyway, since zero-copy cannot work without them.
pub fn init(options: &mut Options) {
    if options.ring.zero_copy {
        options.ring.fixed_buffers = true;
    }
}

/// Run one connection's two pipelines to completion and return the first
/// fatal error, if any (spec.md §4.5 operation 2, "run(proxy)").
pub fn run(mut proxy: Proxy<'_>) -> Result<()> {
    init(&mut proxy.options);

    clear_nonblocking(proxy.listen.fd)?;
    clear_nonblocking(proxy.connect.fd)?;

    if proxy.options.ring.enabled {
        ring::probe::apply(&mut proxy.options.ring);
    }

    let options = &proxy.options;
    let listen_fd = proxy.listen.fd;
    let connect_fd = proxy.connect.fd;
    let listen_prefix = proxy.listen.prefix;
    let connect_prefix = proxy.connect.prefix;

    let mut outbound_transform: Box<dyn Transform> = if options.zstd.enabled {
        Box::new(CompressTransform::new(options.zstd.level)?)
    } else {
        Box::new(IdentityTransform)
    };
    let mut inbound_transform: Box<dyn Transform> = if options.zstd.enabled {
        Box::new(DecompressTransform::new()?)
    } else {
        Box::new(IdentityTransform)
    };

    let (outbound_result, inbound_result) = thread::scope(|scope| {
        let inbound_handle = scope.spawn(|| {
            pipeline::run(
                Descriptor {
                    fd: connect_fd,
                    prefix: connect_prefix,
                },
                Descriptor {
                    fd: listen_fd,
                    prefix: listen_prefix,
                },
                inbound_transform.as_mut(),
                options,
            )
        });

        let outbound_result = pipeline::run(
            Descriptor {
                fd: listen_fd,
                prefix: listen_prefix,
            },
            Descriptor {
                fd: connect_fd,
                prefix: connect_prefix,
            },
            outbound_transform.as_mut(),
            options,
        );

        let inbound_result = inbound_handle
            .join()
            .expect("inbound pipeline thread panicked");

        (outbound_result, inbound_result)
    });

    close_fd_quiet(listen_fd);
    close_fd_quiet(connect_fd);

    outbound_result?;
    inbound_result?;
    Ok(())
}

/// Run `proxy` on a background thread and deliver its result through
/// `on_done` (spec.md §6: "invoked from a host runtime on a background
/// thread and signals completion through a callback"). The engine itself
/// stays a plain blocking call ([`run`]); this is the thinnest possible
/// adapter from that call to a callback, with nothing binding-specific in
/// it — a host-language binding is explicitly out of scope (spec.md §1).
pub fn run_in_background(
    proxy: Proxy<'static>,
    on_done: impl FnOnce(Result<()>) + Send + 'static,
) {
    thread::spawn(move || {
        let result = run(proxy);
        on_done(result);
    });
}
