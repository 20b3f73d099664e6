//! The completion-ring scheduler (spec.md §4.3) — the hard subsystem.
//!
//! Grounded directly on `zstd_proxy_uring_queue` / `zstd_proxy_uring_run` in
//! `examples/original_source/src/zstd-proxy-uring.c`, restructured onto the
//! `io-uring` crate the way the teacher's `balancer/uring_ops.rs` drives SQE
//! submission. The buffer pointer chasing of the original C becomes index
//! arithmetic into one contiguous `Vec<u8>` owned by this queue, per
//! spec.md §9's arena note.

use std::io;
use std::ops::Range;
use std::os::fd::RawFd;

use io_uring::{cqueue, opcode, types, IoUring};

use crate::error::{ProxyError, Result};
use crate::options::{Options, RingOptions};
use crate::transform::{InCursor, OutCursor, Transform};
use crate::user_data::{pack_user_data, unpack_user_data};

use super::slot::{BufferSlot, SlotRole, SlotState};

pub struct RingQueue<'a> {
    ring: IoUring,
    slots: Vec<BufferSlot>,
    backing: Vec<u8>,
    buffer_size: usize,
    next_id: u64,
    running: usize,
    source_fd: RawFd,
    sink_fd: RawFd,
    transform: &'a mut dyn Transform,
    options: &'a Options,
    fixed_buffers: bool,
    zero_copy: bool,
}

impl<'a> RingQueue<'a> {
    pub fn create(
        source_fd: RawFd,
        sink_fd: RawFd,
        transform: &'a mut dyn Transform,
        options: &'a Options,
        ring_options: &RingOptions,
    ) -> Result<Self> {
        let depth = ring_options.depth;
        let total = depth * 2;
        let buffer_size = options.buffer_size;

        let backing = vec![0u8; total * buffer_size];
        let mut slots = Vec::with_capacity(total);
        for i in 0..depth {
            slots.push(BufferSlot::new(SlotRole::Receive, i));
        }
        for i in depth..total {
            slots.push(BufferSlot::new(SlotRole::Send, i));
        }

        let ring = IoUring::new(total as u32).map_err(ProxyError::Io)?;

        if ring_options.fixed_buffers {
            let iovecs: Vec<libc::iovec> = (0..total)
                .map(|i| libc::iovec {
                    iov_base: unsafe { backing.as_ptr().add(i * buffer_size) as *mut libc::c_void },
                    iov_len: buffer_size,
                })
                .collect();
            unsafe {
                ring.submitter()
                    .register_buffers(&iovecs)
                    .map_err(ProxyError::Io)?;
            }
        }

        Ok(Self {
            ring,
            slots,
            backing,
            buffer_size,
            next_id: 0,
            running: 0,
            source_fd,
            sink_fd,
            transform,
            options,
            fixed_buffers: ring_options.fixed_buffers,
            zero_copy: ring_options.zero_copy,
        })
    }

    fn region(&self, index: usize) -> Range<usize> {
        let start = index * self.buffer_size;
        start..start + self.buffer_size
    }

    fn find_available(&self, role: SlotRole) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.role == role && s.is_available())
            .map(|s| s.index)
    }

    fn find_lowest_id_not_available(&self, role: SlotRole) -> Option<usize> {
        self.slots
            .iter()
            .filter(|s| s.role == role && !s.is_available())
            .min_by_key(|s| s.id)
            .map(|s| s.index)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Feed the driver's prefix buffer through the transform before the
    /// first real receive (spec.md §4.4 "Prefix handling"). Bounded by the
    /// receive slot pool: a prefix larger than `depth * buffer_size` is a
    /// setup error rather than something silently truncated.
    pub fn process_prefix(&mut self, prefix: &[u8]) -> Result<()> {
        let mut offset = 0;
        let mut seeded = Vec::new();

        while offset < prefix.len() {
            let Some(index) = self.find_available(SlotRole::Receive) else {
                return Err(ProxyError::setup(
                    "prefix buffer too large for the receive slot pool",
                ));
            };
            let chunk_len = (prefix.len() - offset).min(self.buffer_size);
            let region = self.region(index);
            self.backing[region.start..region.start + chunk_len]
                .copy_from_slice(&prefix[offset..offset + chunk_len]);

            let id = self.next_id();
            let slot = &mut self.slots[index];
            slot.id = id;
            slot.data_len = chunk_len;
            slot.offset = 0;
            slot.state = SlotState::ReadyForEngine;
            self.running += 1;

            seeded.push(index);
            offset += chunk_len;
        }

        for index in seeded {
            self.process_receive_slot(index)?;
        }
        Ok(())
    }

    /// Submit a receive if none is already pending and a slot is free
    /// (spec.md §4.3 "Receive admission").
    fn submit_recv(&mut self) -> Result<()> {
        let already_pending = self
            .slots
            .iter()
            .any(|s| s.role == SlotRole::Receive && s.is_pending());
        if already_pending {
            return Ok(());
        }
        let Some(index) = self.find_available(SlotRole::Receive) else {
            return Ok(());
        };

        let region = self.region(index);
        let ptr = unsafe { self.backing.as_mut_ptr().add(region.start) };
        let len = self.buffer_size as u32;

        let sqe = if self.fixed_buffers {
            opcode::ReadFixed::new(types::Fd(self.source_fd), ptr, len, index as u16).build()
        } else {
            opcode::Read::new(types::Fd(self.source_fd), ptr, len).build()
        }
        .user_data(pack_user_data(SlotRole::Receive, index));

        let id = self.next_id();
        let slot = &mut self.slots[index];
        slot.id = id;
        slot.offset = 0;
        slot.state = SlotState::PendingKernel;

        unsafe {
            self.ring
                .submission()
                .push(&sqe)
                .map_err(|_| ProxyError::setup("submission queue full (recv)"))?;
        }
        self.ring.submit().map_err(ProxyError::Io)?;
        self.running += 1;
        Ok(())
    }

    /// Submit the oldest ready send if none is already in flight
    /// (spec.md §4.3 "Send admission").
    fn submit_send(&mut self) -> Result<()> {
        let Some(index) = self.find_lowest_id_not_available(SlotRole::Send) else {
            return Ok(());
        };
        if self.slots[index].is_pending() {
            return Ok(());
        }

        // `data_len` is already "bytes yet to flush" (spec.md §3) — `complete_send`
        // decrements it on every partial completion, so it must be used as-is here,
        // not subtracted from again by `offset`.
        let (offset, remaining) = {
            let slot = &self.slots[index];
            (slot.offset, slot.data_len)
        };
        let region = self.region(index);
        let ptr = unsafe { self.backing.as_mut_ptr().add(region.start + offset) };
        let len = remaining as u32;

        let sqe = if self.zero_copy {
            let op = opcode::SendZc::new(types::Fd(self.sink_fd), ptr, len);
            if self.fixed_buffers {
                op.buf_index(Some(index as u16)).build()
            } else {
                op.build()
            }
        } else if self.fixed_buffers {
            opcode::WriteFixed::new(types::Fd(self.sink_fd), ptr, len, index as u16).build()
        } else {
            opcode::Write::new(types::Fd(self.sink_fd), ptr, len).build()
        }
        .user_data(pack_user_data(SlotRole::Send, index));

        self.slots[index].state = SlotState::PendingKernel;

        unsafe {
            self.ring
                .submission()
                .push(&sqe)
                .map_err(|_| ProxyError::setup("submission queue full (send)"))?;
        }
        self.ring.submit().map_err(ProxyError::Io)?;
        Ok(())
    }

    /// Drain one receive slot's payload through the transform
    /// (spec.md §4.3 "Transform consumption" and "Back-pressure").
    fn process_receive_slot(&mut self, index: usize) -> Result<()> {
        loop {
            let (offset, data_len) = {
                let slot = &self.slots[index];
                (slot.offset, slot.data_len)
            };
            if offset >= data_len {
                break;
            }

            let Some(send_index) = self.find_available(SlotRole::Send) else {
                // No free send slot: leave this receive slot ready-for-engine
                // at its current offset, to be retried after a send frees one.
                return Ok(());
            };

            let recv_region = self.region(index);
            let send_region = self.region(send_index);
            debug_assert!(recv_region.end <= send_region.start);

            let (consumed, produced) = {
                let (recv_part, send_part) = self.backing.split_at_mut(send_region.start);
                let in_slice = &recv_part[recv_region.clone()][offset..data_len];
                let out_slice = &mut send_part[..send_region.len()];
                let mut in_cur = InCursor::new(in_slice);
                let mut out_cur = OutCursor::new(out_slice);
                self.transform.apply(&mut in_cur, &mut out_cur)?;
                (in_cur.pos(), out_cur.pos())
            };

            self.slots[index].offset += consumed;

            if produced > 0 {
                let id = self.next_id();
                let send_slot = &mut self.slots[send_index];
                send_slot.data_len = produced;
                send_slot.offset = 0;
                send_slot.id = id;
                send_slot.state = SlotState::ReadyForEngine;
                self.running += 1;
                self.submit_send()?;
            } else if consumed == 0 {
                return Err(ProxyError::codec(
                    "ring transform made no forward progress with free output space",
                ));
            }
        }

        self.running -= 1;
        self.slots[index].state = SlotState::Available;
        Ok(())
    }

    fn complete_receive(&mut self, index: usize, result: i32) -> Result<()> {
        if result < 0 {
            return Err(ProxyError::Io(io::Error::from_raw_os_error(-result)));
        }
        let slot = &mut self.slots[index];
        slot.data_len = result as usize;
        slot.offset = 0;
        slot.state = SlotState::ReadyForEngine;
        Ok(())
    }

    fn complete_send(&mut self, index: usize, result: i32) -> Result<()> {
        if result < 0 {
            return Err(ProxyError::Io(io::Error::from_raw_os_error(-result)));
        }
        let n = result as usize;
        let slot = &mut self.slots[index];
        if n < slot.data_len {
            slot.data_len -= n;
            slot.offset += n;
            slot.state = SlotState::ReadyForEngine;
        } else {
            self.running -= 1;
            slot.data_len = 0;
            slot.offset = 0;
            slot.state = SlotState::Available;
        }
        Ok(())
    }

    /// Run the event loop to completion (spec.md §4.3 "Event loop").
    pub fn run_event_loop(&mut self) -> Result<()> {
        self.submit_recv()?;
        let mut source_open = true;

        while !self.options.is_stopped() && self.running > 0 {
            self.ring.submit_and_wait(1).map_err(ProxyError::Io)?;

            let cqe = match self.ring.completion().next() {
                Some(cqe) => cqe,
                None => continue,
            };

            if cqueue::more(cqe.flags()) {
                continue;
            }

            let (role, index) = unpack_user_data(cqe.user_data());
            let result = cqe.result();
            self.slots[index].last_result = result;

            match role {
                SlotRole::Receive => self.complete_receive(index, result)?,
                SlotRole::Send => self.complete_send(index, result)?,
            }

            self.submit_send()?;
            if source_open {
                self.submit_recv()?;
            }

            let ready = self
                .find_lowest_id_not_available(SlotRole::Receive)
                .filter(|&i| !self.slots[i].is_pending());
            let Some(ready_index) = ready else {
                continue;
            };

            if self.slots[ready_index].data_len == 0 {
                source_open = false;
            }

            self.process_receive_slot(ready_index)?;

            if source_open {
                self.submit_recv()?;
            }
        }

        tracing::debug!(running = self.running, "ring event loop exiting");
        Ok(())
    }
}

#[cfg(test)]
#[cfg(target_os = "linux")]
mod tests {
    use super::*;
    use crate::options::OptionsBuilder;
    use crate::transform::IdentityTransform;
    use std::io::Read;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    /// Regression test for the `submit_send` double-subtraction bug: after
    /// a short completion, `complete_send` has already folded the sent
    /// bytes out of `data_len` (spec.md §3: `data_len` is "the bytes yet
    /// to be flushed"), so resubmission must ask for `data_len` bytes, not
    /// `data_len - offset`. Seeds a send slot directly and injects a short
    /// completion the way spec.md §8's "short send on sink" scenario
    /// describes, then drives a real resubmission through io_uring and
    /// checks the kernel actually transferred the full remaining length.
    #[test]
    fn short_send_completion_resubmits_the_true_remaining_length() {
        let (source, _source_peer) = UnixStream::pair().unwrap();
        let (sink, mut sink_peer) = UnixStream::pair().unwrap();
        let options = OptionsBuilder::new().buffer_size(1000).ring_depth(1).build();
        let mut identity = IdentityTransform;
        let mut queue = RingQueue::create(
            source.as_raw_fd(),
            sink.as_raw_fd(),
            &mut identity,
            &options,
            &options.ring,
        )
        .unwrap();

        // depth=1 -> index 0 is the sole receive slot, index 1 the sole
        // send slot. Seed it as if the transform had just produced a
        // 1000-byte chunk.
        let send_index = 1;
        let expected: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        {
            let region = queue.region(send_index);
            queue.backing[region].copy_from_slice(&expected);
            let slot = &mut queue.slots[send_index];
            slot.id = 1;
            slot.data_len = 1000;
            slot.offset = 0;
            slot.state = SlotState::ReadyForEngine;
            queue.running += 1;
        }

        // Simulate the kernel reporting a short write of 400 of 1000 bytes.
        queue.complete_send(send_index, 400).unwrap();
        assert_eq!(queue.slots[send_index].data_len, 600);
        assert_eq!(queue.slots[send_index].offset, 400);
        assert_eq!(queue.slots[send_index].state, SlotState::ReadyForEngine);

        // Resubmitting must request exactly the 600 bytes still
        // outstanding. The double-subtraction bug requested 200 instead.
        queue.submit_send().unwrap();
        queue.ring.submit_and_wait(1).unwrap();
        let cqe = queue.ring.completion().next().unwrap();
        let (role, index) = unpack_user_data(cqe.user_data());
        assert_eq!(role, SlotRole::Send);
        assert_eq!(index, send_index);
        assert_eq!(
            cqe.result(),
            600,
            "resubmitted length must be the true remaining 600 bytes, not 200"
        );

        queue.complete_send(send_index, cqe.result()).unwrap();
        assert_eq!(queue.slots[send_index].state, SlotState::Available);
        assert_eq!(queue.running, 0);

        let mut out = vec![0u8; 1000];
        sink_peer.read_exact(&mut out).unwrap();
        assert_eq!(out, expected);
    }
}
