//! zstd-backed transforms.
//!
//! Grounded directly on `examples/original_source/src/zstd-proxy.c`'s
//! `zstd_proxy_compress_stream` / `zstd_proxy_decompress_stream`: each
//! `apply()` call is a single call into the codec — `ZSTD_compressStream2`
//! with `ZSTD_e_flush`, or `ZSTD_decompressStream` — not an internal
//! drain loop. The driving loop that repeats `apply()` with a fresh output
//! cursor until the input window is consumed lives in the backends
//! (spec.md §4.2 step 4, §4.3 "Transform consumption"), exactly as in the
//! original.

use zstd::zstd_safe::{self, CCtx, DCtx, CParameter, EndDirective, InBuffer, OutBuffer};

use crate::error::{ProxyError, Result};

use super::{InCursor, OutCursor, Transform};

fn codec_err(code: usize) -> ProxyError {
    ProxyError::codec(zstd_safe::get_error_name(code))
}

/// Outbound-pipeline transform: compresses plaintext into a zstd frame
/// stream, flushing after every call so the sink sees bounded latency.
pub struct CompressTransform {
    ctx: CCtx<'static>,
}

impl CompressTransform {
    pub fn new(level: i32) -> Result<Self> {
        let mut ctx = CCtx::create();
        ctx.set_parameter(CParameter::CompressionLevel(level))
            .map_err(codec_err)?;
        Ok(Self { ctx })
    }
}

impl Transform for CompressTransform {
    fn apply(&mut self, input: &mut InCursor<'_>, output: &mut OutCursor<'_>) -> Result<()> {
        let mut in_buf = InBuffer::around(input.remaining());
        let mut out_buf = OutBuffer::around(output.free_mut());

        self.ctx
            .compress_stream2(&mut out_buf, &mut in_buf, EndDirective::Flush)
            .map_err(codec_err)?;

        let consumed = in_buf.pos();
        let produced = out_buf.pos();
        input.advance(consumed);
        output.advance(produced);
        Ok(())
    }
}

/// Inbound-pipeline transform: decompresses a zstd frame stream back into
/// plaintext. No level parameter — decompression needs none (spec.md §9
/// Open Question, resolved: this is correct and intentional).
pub struct DecompressTransform {
    ctx: DCtx<'static>,
}

impl DecompressTransform {
    pub fn new() -> Result<Self> {
        Ok(Self { ctx: DCtx::create() })
    }
}

impl Transform for DecompressTransform {
    fn apply(&mut self, input: &mut InCursor<'_>, output: &mut OutCursor<'_>) -> Result<()> {
        let mut in_buf = InBuffer::around(input.remaining());
        let mut out_buf = OutBuffer::around(output.free_mut());

        self.ctx
            .decompress_stream(&mut out_buf, &mut in_buf)
            .map_err(codec_err)?;

        let consumed = in_buf.pos();
        let produced = out_buf.pos();
        input.advance(consumed);
        output.advance(produced);
        Ok(())
    }
}
