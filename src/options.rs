//! Connection options (spec.md §3 "Options").
//!
//! Immutable for the duration of a connection except for `stop`, which is
//! set from outside to request cooperative cancellation. Mirrors the shape
//! of the teacher's `WorkerConfig` (one plain `Default`-able struct plus a
//! small `get`-style constructor), generalized to the zstd/ring knobs this
//! engine needs instead of http-proxy knobs.

use std::sync::atomic::{AtomicBool, Ordering};

/// Default size of each receive/send buffer, in bytes (4 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024 * 1024;
/// Default number of in-flight receive (and send) slots for the ring backend.
pub const DEFAULT_RING_DEPTH: usize = 4;
/// Default zstd compression level for the outbound pipeline.
pub const DEFAULT_ZSTD_LEVEL: i32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct ZstdOptions {
    /// When false, the transform is the identity (byte-for-byte copy).
    pub enabled: bool,
    /// Compression level for the outbound pipeline. Ignored when decompressing.
    pub level: i32,
}

impl Default for ZstdOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            level: DEFAULT_ZSTD_LEVEL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RingOptions {
    /// Request the completion-ring backend instead of the blocking one.
    pub enabled: bool,
    /// Number of in-flight receive buffers (and, symmetrically, send buffers).
    pub depth: usize,
    /// Request zero-copy sends. Requires `fixed_buffers`; downgraded by the
    /// capability probe if unsupported.
    pub zero_copy: bool,
    /// Pre-register buffers with the kernel. Downgraded by the capability
    /// probe if unsupported.
    pub fixed_buffers: bool,
}

impl Default for RingOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            depth: DEFAULT_RING_DEPTH,
            zero_copy: false,
            fixed_buffers: false,
        }
    }
}

/// Options shared read-only by both pipelines of a connection, except for
/// `stop` which either pipeline may set to request graceful termination.
#[derive(Debug)]
pub struct Options {
    pub buffer_size: usize,
    pub zstd: ZstdOptions,
    pub ring: RingOptions,
    stop: AtomicBool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            zstd: ZstdOptions::default(),
            ring: RingOptions::default(),
            stop: AtomicBool::new(false),
        }
    }
}

impl Options {
    /// Cooperative cancellation flag, observed by both pipelines between
    /// operations (spec.md §5 "Cancellation").
    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Request graceful termination of both pipelines in this connection.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

/// Builder covering the overrides used by tests and the demo binary; the
/// teacher never reaches for a derive-macro builder, so this stays a plain
/// method chain over a struct literal, matching `WorkerConfig::get(..)`.
#[derive(Debug, Default)]
pub struct OptionsBuilder {
    buffer_size: Option<usize>,
    zstd: ZstdOptions,
    ring: RingOptions,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            buffer_size: None,
            zstd: ZstdOptions::default(),
            ring: RingOptions::default(),
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn zstd_enabled(mut self, enabled: bool) -> Self {
        self.zstd.enabled = enabled;
        self
    }

    pub fn zstd_level(mut self, level: i32) -> Self {
        self.zstd.level = level;
        self
    }

    pub fn ring_enabled(mut self, enabled: bool) -> Self {
        self.ring.enabled = enabled;
        self
    }

    pub fn ring_depth(mut self, depth: usize) -> Self {
        self.ring.depth = depth;
        self
    }

    pub fn ring_zero_copy(mut self, zero_copy: bool) -> Self {
        self.ring.zero_copy = zero_copy;
        self
    }

    pub fn ring_fixed_buffers(mut self, fixed_buffers: bool) -> Self {
        self.ring.fixed_buffers = fixed_buffers;
        self
    }

    pub fn build(self) -> Options {
        Options {
            buffer_size: self.buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE),
            zstd: self.zstd,
            ring: self.ring,
            stop: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let opts = Options::default();
        assert_eq!(opts.buffer_size, 4 * 1024 * 1024);
        assert!(opts.zstd.enabled);
        assert_eq!(opts.zstd.level, 1);
        assert_eq!(opts.ring.depth, 4);
        assert!(!opts.ring.enabled);
        assert!(!opts.is_stopped());
    }

    #[test]
    fn stop_flag_is_observed_after_request() {
        let opts = Options::default();
        assert!(!opts.is_stopped());
        opts.request_stop();
        assert!(opts.is_stopped());
    }

    #[test]
    fn builder_overrides_defaults() {
        let opts = OptionsBuilder::new()
            .buffer_size(1024)
            .zstd_enabled(false)
            .ring_enabled(true)
            .ring_depth(8)
            .build();
        assert_eq!(opts.buffer_size, 1024);
        assert!(!opts.zstd.enabled);
        assert!(opts.ring.enabled);
        assert_eq!(opts.ring.depth, 8);
    }
}
