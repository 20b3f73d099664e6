//! Completion-queue `user_data` tagging for the ring backend.
//!
//! Generalized from the teacher's `core/user_data.rs`, which packs a
//! connection-pair id plus an `Operation`/`Direction` pair into the 64-bit
//! `user_data` field io_uring hands back on every CQE. A single pipeline has
//! no pair id and no direction (that's baked into which queue owns the
//! completion), so the only thing that needs recovering from a completion
//! is which slot it belongs to and what role that slot plays.

use crate::backend::ring::slot::SlotRole;

const ROLE_BITS: u64 = 1;
const ROLE_MASK: u64 = (1 << ROLE_BITS) - 1;
const INDEX_SHIFT: u64 = ROLE_BITS;

#[inline]
pub fn pack_user_data(role: SlotRole, index: usize) -> u64 {
    let role_bit = match role {
        SlotRole::Receive => 0u64,
        SlotRole::Send => 1u64,
    };
    ((index as u64) << INDEX_SHIFT) | (role_bit & ROLE_MASK)
}

#[inline]
pub fn unpack_user_data(tag: u64) -> (SlotRole, usize) {
    let role_bit = tag & ROLE_MASK;
    let index = (tag >> INDEX_SHIFT) as usize;
    let role = if role_bit == 0 {
        SlotRole::Receive
    } else {
        SlotRole::Send
    };
    (role, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_combination_in_range() {
        for index in [0usize, 1, 2, 7, 63, 4095] {
            for role in [SlotRole::Receive, SlotRole::Send] {
                let tag = pack_user_data(role, index);
                assert_eq!(unpack_user_data(tag), (role, index));
            }
        }
    }
}
