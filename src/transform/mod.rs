//! Transform adapter (spec.md §4.1).
//!
//! Wraps a streaming (de)compressor as a pure function over an input
//! cursor and an output cursor, generalized from the teacher's
//! `Operation`/`OpCode` enum dispatch (`core/stream_pump.rs`) into a single
//! narrow trait with three implementations, as suggested by spec.md §9
//! ("function-pointer dispatch ... best expressed as a narrow capability").
//!
//! `InCursor`/`OutCursor` mirror `ZSTD_inBuffer`/`ZSTD_outBuffer` from
//! `examples/original_source/src/zstd-proxy.h` closely enough that the
//! zstd-backed transforms are a thin pass-through, while staying codec
//! agnostic so the identity transform can implement the same trait.

mod identity;
mod zstd_transform;

pub use identity::IdentityTransform;
pub use zstd_transform::{CompressTransform, DecompressTransform};

use crate::error::Result;

/// A source byte range with a position that only ever advances.
pub struct InCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> InCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.data.len());
        self.pos += n;
    }
}

/// A destination byte range with a capacity and a position that only ever
/// advances.
pub struct OutCursor<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl<'a> OutCursor<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn written(&self) -> &[u8] {
        &self.data[..self.pos]
    }

    fn free_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.pos..]
    }

    fn advance(&mut self, n: usize) {
        debug_assert!(self.pos + n <= self.data.len());
        self.pos += n;
    }
}

/// One direction's streaming codec (or the identity pass-through).
///
/// A call to `apply` must advance `input`'s and `output`'s positions by the
/// number of bytes consumed and produced respectively (either may be
/// advanced by zero), must make forward progress whenever the output has
/// free space and the transform is not waiting for more input, and must
/// flush everything it can emit given the input consumed and output space
/// available — callers never need a separate flush call.
pub trait Transform: Send {
    fn apply(&mut self, input: &mut InCursor<'_>, output: &mut OutCursor<'_>) -> Result<()>;
}
