//! Fixed-size memory block pool
//!
//! The caller hands over a buffer that is carved into equal blocks. Free
//! blocks are chained through their own first word, so the pool needs no
//! storage beyond the buffer itself.

use core::mem;
use core::ptr;

use crate::core::cs_cell::KernelCell;
use crate::core::event::Pend;
use crate::core::kernel::{Kernel, ObjKind};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::task::OsTcb;
use crate::types::{ObjId, OsObjType, OsTick};

/// Pool state kept in the object arena
pub(crate) struct MemBlockCb {
    base: *mut u8,
    block_size: usize,
    max: usize,
    free: usize,
    head: *mut u8,
    tail: *mut u8,
}

impl MemBlockCb {
    fn contains(&self, block: *mut u8) -> bool {
        let base = self.base as usize;
        let addr = block as usize;
        addr >= base
            && addr < base + self.max * self.block_size
            && (addr - base) % self.block_size == 0
    }

    fn pop(&mut self) -> Option<*mut u8> {
        if self.head.is_null() {
            return None;
        }

        let block = self.head;
        // SAFETY: every free block lies inside the pool buffer and is at
        // least one pointer long; its first word holds the next link.
        self.head = unsafe { (block as *const *mut u8).read_unaligned() };
        if self.head.is_null() {
            self.tail = ptr::null_mut();
        }
        self.free -= 1;
        Some(block)
    }

    /// `block` must satisfy [`MemBlockCb::contains`]
    fn push(&mut self, block: *mut u8) {
        // SAFETY: `block` and `tail` are pool blocks, see `pop`.
        unsafe {
            (block as *mut *mut u8).write_unaligned(ptr::null_mut());
            if self.tail.is_null() {
                self.head = block;
            } else {
                (self.tail as *mut *mut u8).write_unaligned(block);
            }
        }
        self.tail = block;
        self.free += 1;
    }
}

/// Memory pool handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemBlock(ObjId);

/// Snapshot of a memory pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemBlockInfo {
    pub free: usize,
    pub max: usize,
    pub block_size: usize,
    pub waiters: usize,
}

fn take_block(tcb: &OsTcb) -> *mut u8 {
    tcb.msg() as *mut u8
}

impl MemBlock {
    /// Create a pool over `buf`
    ///
    /// # Arguments
    /// * `buf` - Backing storage, split into `buf.len() / block_size` blocks
    /// * `block_size` - Size of each block in bytes
    ///
    /// # Returns
    /// * `Err(OsError::BlockSizeInvalid)` - block cannot hold a free-list link;
    ///   the buffer is left untouched
    pub fn create<P: Port>(
        k: &mut Kernel<P>,
        buf: &'static mut [u8],
        block_size: usize,
    ) -> OsResult<Self> {
        if block_size < mem::size_of::<*mut u8>() {
            crate::warn!("pool refused: block size {} too small", block_size);
            return Err(OsError::BlockSizeInvalid);
        }

        let mut cb = MemBlockCb {
            base: buf.as_mut_ptr(),
            block_size,
            max: buf.len() / block_size,
            free: 0,
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
        };
        for i in 0..cb.max {
            // SAFETY: i * block_size + block_size <= buf.len()
            let block = unsafe { cb.base.add(i * block_size) };
            cb.push(block);
        }

        let id = k.obj_create(OsObjType::Mem, ObjKind::MemBlock(cb))?;
        Ok(MemBlock(id))
    }

    fn cb<P: Port>(self, k: &mut Kernel<P>) -> OsResult<&mut MemBlockCb> {
        match &mut k.obj_mut(self.0)?.kind {
            ObjKind::MemBlock(cb) => Ok(cb),
            _ => Err(OsError::ObjType),
        }
    }

    /// Get a block
    ///
    /// # Arguments
    /// * `timeout` - Maximum ticks to wait (0 = forever)
    pub fn pend<P: Port>(self, k: &mut Kernel<P>, timeout: OsTick) -> OsResult<Pend<*mut u8>> {
        if let Some(block) = self.cb(k)?.pop() {
            return Ok(Pend::Ready(block));
        }

        let task = k.pend_task()?;
        Ok(k.event_block(self.0, task, ptr::null_mut(), timeout, take_block))
    }

    /// Blocking get from task context
    pub fn wait<P: Port>(self, cell: &KernelCell<P>, timeout: OsTick) -> OsResult<*mut u8> {
        cell.block_on(|k| self.pend(k, timeout))
    }

    /// Get a block without blocking
    ///
    /// # Returns
    /// * `Err(OsError::ResourceUnavailable)` - pool is exhausted
    pub fn try_get<P: Port>(self, k: &mut Kernel<P>) -> OsResult<*mut u8> {
        self.cb(k)?.pop().ok_or(OsError::ResourceUnavailable)
    }

    /// Return a block
    ///
    /// A waiting task receives it directly.
    ///
    /// # Returns
    /// * `Err(OsError::MemInvalidAddr)` - block is not from this pool
    /// * `Err(OsError::ResourceFull)` - every block is already free
    pub fn notify<P: Port>(self, k: &mut Kernel<P>, block: *mut u8) -> OsResult<()> {
        if !self.cb(k)?.contains(block) {
            return Err(OsError::MemInvalidAddr);
        }

        if let Some(task) = k.event_wake_first(self.0, block as *mut (), Ok(())) {
            if k.outranks_current(task) {
                k.sched();
            }
            return Ok(());
        }

        let cb = self.cb(k)?;
        if cb.free >= cb.max {
            return Err(OsError::ResourceFull);
        }
        cb.push(block);
        Ok(())
    }

    /// Destroy the pool, waking every waiter with `Deleted`
    ///
    /// # Returns
    /// Number of tasks woken
    pub fn destroy<P: Port>(self, k: &mut Kernel<P>) -> OsResult<usize> {
        self.cb(k)?;
        let woken = k.event_remove_all(self.0, Err(OsError::Deleted));
        if woken > 0 {
            k.sched();
        }
        Ok(woken)
    }

    pub fn info<P: Port>(self, k: &mut Kernel<P>) -> OsResult<MemBlockInfo> {
        let cb = self.cb(k)?;
        let (free, max, block_size) = (cb.free, cb.max, cb.block_size);
        Ok(MemBlockInfo {
            free,
            max,
            block_size,
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

    fn buffer(n: usize) -> &'static mut [u8] {
        Box::leak(vec![0u8; n].into_boxed_slice())
    }

    fn body(_: *mut ()) -> ! {
        loop {}
    }

    fn started() -> Kernel<StubPort> {
        let mut k = Kernel::new(StubPort::new(), stack()).unwrap();
        k.task_create("t", body, ptr::null_mut(), 5, stack()).unwrap();
        k.start().unwrap();
        k
    }

    #[test]
    fn small_block_size_is_refused() {
        let mut k = started();
        let buf = buffer(64);
        let base = buf.as_ptr();
        assert_eq!(
            MemBlock::create(&mut k, buf, 2).map(|_| ()),
            Err(OsError::BlockSizeInvalid)
        );
        // SAFETY: the leaked buffer is still alive
        assert!(unsafe { core::slice::from_raw_parts(base, 64) }.iter().all(|&b| b == 0));
    }

    #[test]
    fn blocks_come_back_in_fifo_order() {
        let mut k = started();
        let pool = MemBlock::create(&mut k, buffer(100), 32).unwrap();
        assert_eq!(pool.info(&mut k).unwrap().max, 3);

        let a = pool.try_get(&mut k).unwrap();
        let b = pool.try_get(&mut k).unwrap();
        let c = pool.try_get(&mut k).unwrap();
        assert_eq!(b as usize - a as usize, 32);
        assert_eq!(pool.try_get(&mut k), Err(OsError::ResourceUnavailable));

        pool.notify(&mut k, b).unwrap();
        pool.notify(&mut k, c).unwrap();
        assert_eq!(pool.try_get(&mut k), Ok(b));
        assert_eq!(pool.try_get(&mut k), Ok(c));
    }

    #[test]
    fn foreign_and_surplus_blocks() {
        let mut k = started();
        let pool = MemBlock::create(&mut k, buffer(64), 16).unwrap();
        let a = pool.try_get(&mut k).unwrap();

        let inside = unsafe { a.add(3) };
        assert_eq!(pool.notify(&mut k, inside), Err(OsError::MemInvalidAddr));

        pool.notify(&mut k, a).unwrap();
        assert_eq!(pool.notify(&mut k, a), Err(OsError::ResourceFull));
    }

    #[test]
    fn waiter_receives_returned_block() {
        let mut k = started();
        let pool = MemBlock::create(&mut k, buffer(16), 16).unwrap();
        let a = pool.try_get(&mut k).unwrap();

        let Pend::Blocked(waiter) = pool.pend(&mut k, 0).unwrap() else {
            panic!("expected to block");
        };
        pool.notify(&mut k, a).unwrap();
        assert_eq!(k.resume(waiter), Ok(a));
        assert_eq!(pool.info(&mut k).unwrap().free, 0);
    }
}
