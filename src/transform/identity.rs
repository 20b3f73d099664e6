use crate::error::Result;

use super::{InCursor, OutCursor, Transform};

/// Byte-for-byte copy, used when `zstd.enabled` is false. Spec.md §4.1 and
/// §8 invariant 2 require this to be observably a naive copy: the bytes
/// delivered to the sink equal the bytes read from the source, in order.
pub struct IdentityTransform;

impl Transform for IdentityTransform {
    fn apply(&mut self, input: &mut InCursor<'_>, output: &mut OutCursor<'_>) -> Result<()> {
        let n = input.remaining().len().min(output.free_mut().len());
        if n > 0 {
            output.free_mut()[..n].copy_from_slice(&input.remaining()[..n]);
            output.advance(n);
            input.advance(n);
        }
        Ok(())
    }
}
