//! Buffer slot bookkeeping (spec.md §3 "Buffer slot").
//!
//! Grounded on `zstd_proxy_uring_buffer` in
//! `examples/original_source/src/zstd-proxy-uring.c`, but holding only an
//! index into the ring's contiguous backing store rather than a raw
//! pointer, per spec.md §9's "model this as an arena" note: the ring owns
//! the slot array and the backing bytes, slots carry only a small index
//! back.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    Receive,
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Available,
    PendingKernel,
    ReadyForEngine,
}

/// One fixed-size region of the ring's backing store plus the metadata
/// needed to track its lifecycle and its place in stream order.
#[derive(Debug)]
pub struct BufferSlot {
    pub role: SlotRole,
    /// Stable identity within the ring; doubles as the fixed-buffer
    /// registration index and as the offset (in `buffer_size` units) into
    /// the ring's backing store.
    pub index: usize,
    /// Length of the payload currently held (bytes just received, for a
    /// receive slot; bytes yet to be flushed, for a send slot).
    pub data_len: usize,
    /// Bytes of the payload already consumed (receive slots) or already
    /// sent (send slots).
    pub offset: usize,
    /// Monotonically increasing sequence number assigned on each (re)use;
    /// used to recover FIFO order among same-role slots.
    pub id: u64,
    pub state: SlotState,
    pub last_result: i32,
}

impl BufferSlot {
    pub fn new(role: SlotRole, index: usize) -> Self {
        Self {
            role,
            index,
            data_len: 0,
            offset: 0,
            id: 0,
            state: SlotState::Available,
            last_result: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == SlotState::Available
    }

    pub fn is_ready(&self) -> bool {
        self.state == SlotState::ReadyForEngine
    }

    pub fn is_pending(&self) -> bool {
        self.state == SlotState::PendingKernel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_starts_available_and_empty() {
        let slot = BufferSlot::new(SlotRole::Receive, 3);
        assert_eq!(slot.role, SlotRole::Receive);
        assert_eq!(slot.index, 3);
        assert_eq!(slot.data_len, 0);
        assert_eq!(slot.offset, 0);
        assert_eq!(slot.id, 0);
        assert!(slot.is_available());
        assert!(!slot.is_ready());
        assert!(!slot.is_pending());
    }

    #[test]
    fn state_predicates_are_mutually_exclusive() {
        let mut slot = BufferSlot::new(SlotRole::Send, 0);
        for state in [
            SlotState::Available,
            SlotState::PendingKernel,
            SlotState::ReadyForEngine,
        ] {
            slot.state = state;
            let flags = [slot.is_available(), slot.is_pending(), slot.is_ready()];
            assert_eq!(flags.iter().filter(|&&f| f).count(), 1);
        }
    }
}
