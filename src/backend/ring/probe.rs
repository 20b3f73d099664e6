//! One-time, process-wide capability probe (spec.md §4.3 "Capability probe").
//!
//! Grounded on `zstd_proxy_uring_options` in
//! `examples/original_source/src/zstd-proxy-uring.c`, which uses
//! `io_uring_get_probe`/`io_uring_opcode_supported` guarded by a static
//! `configured` flag. Modeled here as an explicit idempotent initializer
//! (spec.md §9: "not as hidden static state") backed by a `OnceLock`, so the
//! downgrade decision is computed once and reused, but remains a value the
//! caller asks for rather than a global side effect woven through the code.

use std::sync::OnceLock;

use io_uring::{opcode, IoUring};

use crate::options::RingOptions;

#[derive(Debug, Clone, Copy)]
struct Capabilities {
    enabled: bool,
    fixed_buffers: bool,
    zero_copy: bool,
}

static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();

fn detect() -> Capabilities {
    let probe_ring = match IoUring::new(2) {
        Ok(ring) => ring,
        Err(err) => {
            tracing::warn!(error = %err, "failed to create probe ring, disabling io_uring support");
            return Capabilities {
                enabled: false,
                fixed_buffers: false,
                zero_copy: false,
            };
        }
    };

    let mut probe = io_uring::Probe::new();
    if let Err(err) = probe_ring.submitter().register_probe(&mut probe) {
        tracing::warn!(error = %err, "failed to get io_uring probe, support disabled");
        return Capabilities {
            enabled: false,
            fixed_buffers: false,
            zero_copy: false,
        };
    }

    let enabled =
        probe.is_supported(opcode::Read::CODE) && probe.is_supported(opcode::Write::CODE);

    let fixed_buffers = enabled
        && probe.is_supported(opcode::ReadFixed::CODE)
        && probe.is_supported(opcode::WriteFixed::CODE);

    let zero_copy = fixed_buffers && probe.is_supported(opcode::SendZc::CODE);

    if !enabled {
        tracing::debug!("disabling io_uring after failed probe");
    }

    Capabilities {
        enabled,
        fixed_buffers,
        zero_copy,
    }
}

/// Apply the one-time capability probe's downgrades to `options` in place.
/// Downgrade is one-way: this never turns a disabled feature back on.
pub fn apply(options: &mut RingOptions) {
    let caps = *CAPABILITIES.get_or_init(detect);

    if !caps.enabled {
        options.enabled = false;
        return;
    }

    if !caps.fixed_buffers {
        options.fixed_buffers = false;
    }
    if !caps.zero_copy {
        options.zero_copy = false;
    }
}
