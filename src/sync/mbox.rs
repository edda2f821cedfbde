//! Mailbox implementation
//!
//! A mailbox is a bounded ring of opaque messages over a caller-owned
//! buffer. A notify with a task waiting bypasses the ring and hands the
//! message straight to that task.

use core::ptr;

use crate::core::cs_cell::KernelCell;
use crate::core::event::Pend;
use crate::core::kernel::{Kernel, ObjKind};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::task::OsTcb;
use crate::types::{ObjId, OsMsg, OsObjType, OsTick};

/// Where a buffered message is queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MboxPlacement {
    /// Behind every buffered message
    Normal,
    /// Ahead of every buffered message
    Front,
}

/// Mailbox state kept in the object arena
pub(crate) struct MboxCb {
    buf: &'static mut [OsMsg],
    read: usize,
    write: usize,
    count: usize,
}

impl MboxCb {
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn pop(&mut self) -> Option<OsMsg> {
        if self.count == 0 {
            return None;
        }
        let msg = self.buf[self.read];
        self.read = (self.read + 1) % self.capacity();
        self.count -= 1;
        Some(msg)
    }

    fn push(&mut self, msg: OsMsg, placement: MboxPlacement) -> OsResult<()> {
        if self.count >= self.capacity() {
            return Err(OsError::ResourceFull);
        }

        match placement {
            MboxPlacement::Normal => {
                self.buf[self.write] = msg;
                self.write = (self.write + 1) % self.capacity();
            }
            MboxPlacement::Front => {
                self.read = if self.read == 0 {
                    self.capacity() - 1
                } else {
                    self.read - 1
                };
                self.buf[self.read] = msg;
            }
        }
        self.count += 1;
        Ok(())
    }

    fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
        self.count = 0;
    }
}

/// Mailbox handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mailbox(ObjId);

/// Snapshot of a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MboxInfo {
    pub count: usize,
    pub capacity: usize,
    pub waiters: usize,
}

fn take_msg(tcb: &OsTcb) -> OsMsg {
    tcb.msg()
}

impl Mailbox {
    /// Create a mailbox buffering up to `buf.len()` messages
    pub fn create<P: Port>(k: &mut Kernel<P>, buf: &'static mut [OsMsg]) -> OsResult<Self> {
        let cb = MboxCb {
            buf,
            read: 0,
            write: 0,
            count: 0,
        };
        let id = k.obj_create(OsObjType::Mbox, ObjKind::Mbox(cb))?;
        Ok(Mailbox(id))
    }

    fn cb<P: Port>(self, k: &mut Kernel<P>) -> OsResult<&mut MboxCb> {
        match &mut k.obj_mut(self.0)?.kind {
            ObjKind::Mbox(cb) => Ok(cb),
            _ => Err(OsError::ObjType),
        }
    }

    /// Receive a message
    ///
    /// # Arguments
    /// * `timeout` - Maximum ticks to wait (0 = forever)
    pub fn pend<P: Port>(self, k: &mut Kernel<P>, timeout: OsTick) -> OsResult<Pend<OsMsg>> {
        if let Some(msg) = self.cb(k)?.pop() {
            return Ok(Pend::Ready(msg));
        }

        let task = k.pend_task()?;
        Ok(k.event_block(self.0, task, ptr::null_mut(), timeout, take_msg))
    }

    /// Blocking receive from task context
    ///
    /// A failed wait delivers no message.
    pub fn wait<P: Port>(self, cell: &KernelCell<P>, timeout: OsTick) -> OsResult<OsMsg> {
        cell.block_on(|k| self.pend(k, timeout))
    }

    /// Receive a message without blocking
    ///
    /// # Returns
    /// * `Err(OsError::ResourceUnavailable)` - mailbox is empty
    pub fn try_get<P: Port>(self, k: &mut Kernel<P>) -> OsResult<OsMsg> {
        self.cb(k)?.pop().ok_or(OsError::ResourceUnavailable)
    }

    /// Send a message
    ///
    /// A waiting task receives it directly, whatever the placement.
    ///
    /// # Returns
    /// * `Err(OsError::ResourceFull)` - nobody waits and the buffer is full
    pub fn notify<P: Port>(
        self,
        k: &mut Kernel<P>,
        msg: OsMsg,
        placement: MboxPlacement,
    ) -> OsResult<()> {
        self.cb(k)?;

        if let Some(task) = k.event_wake_first(self.0, msg, Ok(())) {
            if k.outranks_current(task) {
                k.sched();
            }
            return Ok(());
        }

        self.cb(k)?.push(msg, placement)
    }

    /// Drop every buffered message
    ///
    /// # Returns
    /// * `Err(OsError::StateInvalid)` - tasks are waiting on the mailbox
    pub fn flush<P: Port>(self, k: &mut Kernel<P>) -> OsResult<()> {
        self.cb(k)?;
        if k.event_wait_count(self.0) > 0 {
            return Err(OsError::StateInvalid);
        }
        self.cb(k)?.clear();
        Ok(())
    }

    /// Destroy the mailbox, waking every waiter with `Deleted`
    ///
    /// # Returns
    /// Number of tasks woken
    pub fn destroy<P: Port>(self, k: &mut Kernel<P>) -> OsResult<usize> {
        self.cb(k)?.clear();
        let woken = k.event_remove_all(self.0, Err(OsError::Deleted));
        if woken > 0 {
            k.sched();
        }
        Ok(woken)
    }

    pub fn info<P: Port>(self, k: &mut Kernel<P>) -> OsResult<MboxInfo> {
        let cb = self.cb(k)?;
        let (count, capacity) = (cb.count, cb.capacity());
        Ok(MboxInfo {
            count,
            capacity,
            waiters: k.event_wait_count(self.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::StubPort;
    use crate::types::OsStkElement;

    fn stack() -> &'static mut [OsStkElement] {
        Box::leak(vec![0; 128].into_boxed_slice())
    }

    fn slots(n: usize) -> &'static mut [OsMsg] {
        Box::leak(vec![ptr::null_mut(); n].into_boxed_slice())
    }

    fn body(_: *mut ()) -> ! {
        loop {}
    }

    fn msg(v: usize) -> OsMsg {
        v as OsMsg
    }

    fn started() -> Kernel<StubPort> {
        let mut k = Kernel::new(StubPort::new(), stack()).unwrap();
        k.task_create("t", body, ptr::null_mut(), 5, stack()).unwrap();
        k.start().unwrap();
        k
    }

    #[test]
    fn fifo_order_and_full() {
        let mut k = started();
        let mb = Mailbox::create(&mut k, slots(3)).unwrap();

        for v in 1..=3 {
            mb.notify(&mut k, msg(v), MboxPlacement::Normal).unwrap();
        }
        assert_eq!(
            mb.notify(&mut k, msg(4), MboxPlacement::Normal),
            Err(OsError::ResourceFull)
        );

        for v in 1..=3 {
            assert_eq!(mb.try_get(&mut k), Ok(msg(v)));
        }
        assert_eq!(mb.try_get(&mut k), Err(OsError::ResourceUnavailable));
    }

    #[test]
    fn front_placement_jumps_queue() {
        let mut k = started();
        let mb = Mailbox::create(&mut k, slots(4)).unwrap();

        mb.notify(&mut k, msg(1), MboxPlacement::Normal).unwrap();
        mb.notify(&mut k, msg(2), MboxPlacement::Normal).unwrap();
        mb.notify(&mut k, msg(9), MboxPlacement::Front).unwrap();

        assert_eq!(mb.try_get(&mut k), Ok(msg(9)));
        assert_eq!(mb.try_get(&mut k), Ok(msg(1)));
        assert_eq!(mb.try_get(&mut k), Ok(msg(2)));
    }

    #[test]
    fn waiter_bypasses_buffer() {
        let mut k = started();
        let mb = Mailbox::create(&mut k, slots(2)).unwrap();

        let Pend::Blocked(waiter) = mb.pend(&mut k, 0).unwrap() else {
            panic!("expected to block");
        };
        mb.notify(&mut k, msg(7), MboxPlacement::Front).unwrap();

        assert_eq!(k.resume(waiter), Ok(msg(7)));
        assert_eq!(mb.info(&mut k).unwrap().count, 0);
    }

    #[test]
    fn zero_capacity_only_hands_over() {
        let mut k = started();
        let mb = Mailbox::create(&mut k, slots(0)).unwrap();
        assert_eq!(
            mb.notify(&mut k, msg(1), MboxPlacement::Front),
            Err(OsError::ResourceFull)
        );
    }

    #[test]
    fn flush_refused_with_waiters() {
        let mut k = started();
        let mb = Mailbox::create(&mut k, slots(2)).unwrap();
        assert!(mb.pend(&mut k, 0).unwrap().is_blocked());
        assert_eq!(mb.flush(&mut k), Err(OsError::StateInvalid));
        assert_eq!(mb.destroy(&mut k), Ok(1));
        mb.flush(&mut k).unwrap();
    }
}
