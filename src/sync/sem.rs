//! Semaphore implementation
//!
//! Counting semaphores for task synchronization and resource counting.
//! A semaphore may be bounded by a maximum count; notifications beyond
//! it saturate.

use core::ptr;

use crate::core::cs_cell::KernelCell;
use crate::core::event::Pend;
use crate::core::kernel::{Kernel, ObjKind};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::types::{ObjId, OsObjType, OsSemCtr, OsTick};

/// Semaphore state kept in the object arena
#[derive(Debug)]
pub(crate) struct SemCb {
    count: OsSemCtr,
    /// 0 = unbounded
    max: OsSemCtr,
}

/// Counting semaphore handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Semaphore(ObjId);

/// Snapshot of a semaphore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemInfo {
    pub count: OsSemCtr,
    pub max: OsSemCtr,
    pub waiters: usize,
}

impl Semaphore {
    /// Create a semaphore
    ///
    /// # Arguments
    /// * `count` - Initial count value, clamped to `max`
    /// * `max` - Upper bound of the count, 0 for unbounded
    pub fn create<P: Port>(k: &mut Kernel<P>, count: OsSemCtr, max: OsSemCtr) -> OsResult<Self> {
        let count = if max != 0 { count.min(max) } else { count };
        let id = k.obj_create(OsObjType::Sem, ObjKind::Sem(SemCb { count, max }))?;
        Ok(Semaphore(id))
    }

    fn cb<P: Port>(self, k: &mut Kernel<P>) -> OsResult<&mut SemCb> {
        match &mut k.obj_mut(self.0)?.kind {
            ObjKind::Sem(cb) => Ok(cb),
            _ => Err(OsError::ObjType),
        }
    }

    /// Wait on (pend) the semaphore
    ///
    /// # Arguments
    /// * `timeout` - Maximum ticks to wait (0 = forever)
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(()))` - count was positive and has been taken
    /// * `Ok(Pend::Blocked(_))` - the calling task now waits
    pub fn pend<P: Port>(self, k: &mut Kernel<P>, timeout: OsTick) -> OsResult<Pend<()>> {
        let cb = self.cb(k)?;
        if cb.count > 0 {
            cb.count -= 1;
            return Ok(Pend::Ready(()));
        }

        let task = k.pend_task()?;
        Ok(k.event_block(self.0, task, ptr::null_mut(), timeout, |_| ()))
    }

    /// Blocking wait from task context
    ///
    /// # Returns
    /// * `Err(OsError::Timeout)` - Timeout expired
    /// * `Err(OsError::Deleted)` - semaphore destroyed while waiting
    pub fn wait<P: Port>(self, cell: &KernelCell<P>, timeout: OsTick) -> OsResult<()> {
        cell.block_on(|k| self.pend(k, timeout))
    }

    /// Take the semaphore without blocking
    ///
    /// # Returns
    /// * `Err(OsError::ResourceUnavailable)` - count is 0
    pub fn try_wait<P: Port>(self, k: &mut Kernel<P>) -> OsResult<()> {
        let cb = self.cb(k)?;
        if cb.count == 0 {
            return Err(OsError::ResourceUnavailable);
        }
        cb.count -= 1;
        Ok(())
    }

    /// Signal (post) the semaphore
    ///
    /// Hands the signal to the longest waiting task if there is one,
    /// otherwise counts it.
    pub fn notify<P: Port>(self, k: &mut Kernel<P>) -> OsResult<()> {
        self.cb(k)?;

        if let Some(task) = k.event_wake_first(self.0, ptr::null_mut(), Ok(())) {
            if k.outranks_current(task) {
                k.sched();
            }
            return Ok(());
        }

        let cb = self.cb(k)?;
        let next = cb.count.saturating_add(1);
        cb.count = if cb.max != 0 { next.min(cb.max) } else { next };
        Ok(())
    }

    /// Destroy the semaphore
    ///
    /// Every waiter is woken with `Deleted` and the count drops to 0. The
    /// handle stays valid.
    ///
    /// # Returns
    /// Number of tasks woken
    pub fn destroy<P: Port>(self, k: &mut Kernel<P>) -> OsResult<usize> {
        self.cb(k)?.count = 0;
        let woken = k.event_remove_all(self.0, Err(OsError::Deleted));
        if woken > 0 {
            k.sched();
        }
        Ok(woken)
    }

    /// Set semaphore count
    ///
    /// # Returns
    /// * `Err(OsError::StateInvalid)` - tasks are waiting on the semaphore
    pub fn set<P: Port>(self, k: &mut Kernel<P>, count: OsSemCtr) -> OsResult<()> {
        if k.event_wait_count(self.0) > 0 {
            self.cb(k)?;
            return Err(OsError::StateInvalid);
        }

        let cb = self.cb(k)?;
        cb.count = if cb.max != 0 { count.min(cb.max) } else { count };
        Ok(())
    }

    /// Get current semaphore count
    pub fn count<P: Port>(self, k: &mut Kernel<P>) -> OsResult<OsSemCtr> {
        Ok(self.cb(k)?.count)
    }

    pub fn info<P: Port>(self, k: &mut Kernel<P>) -> OsResult<SemInfo> {
        let cb = self.cb(k)?;
        let (count, max) = (cb.count, cb.max);
        Ok(SemInfo {
            count,
            max,
            waiters: k.event_wait_count(self.0),
        })
    }
}
