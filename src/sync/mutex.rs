//! Mutex implementation with priority inheritance
//!
//! Mutexes provide mutual exclusion with automatic priority boosting
//! to prevent priority inversion. The owner may lock recursively; the
//! mutex is released when every lock has been matched by a notify.

use core::ptr;

use crate::core::critical::is_isr_context;
use crate::core::cs_cell::KernelCell;
use crate::core::event::Pend;
use crate::core::kernel::{Kernel, ObjKind};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::types::{ObjId, OsNestingCtr, OsObjType, OsPrio, OsTick, TaskId};

/// Mutex state kept in the object arena
#[derive(Debug)]
pub(crate) struct MutexCb {
    owner: Option<TaskId>,
    /// Owner's priority when it took the mutex
    owner_prio: OsPrio,
    /// Nesting counter
    locked: OsNestingCtr,
}

/// Mutex handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutex(ObjId);

/// Snapshot of a mutex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutexInfo {
    pub waiters: usize,
    pub owner: Option<TaskId>,
    /// Priority the owner will return to on release
    pub owner_prio: Option<OsPrio>,
    /// Owner's effective priority, raised while a better task waits
    pub inherited_prio: Option<OsPrio>,
    pub locked: OsNestingCtr,
}

/// Outcome of an attempt to take the mutex without waiting
enum Acquire {
    Taken,
    Contended(TaskId),
}

impl Mutex {
    /// Create an unlocked mutex
    pub fn create<P: Port>(k: &mut Kernel<P>) -> OsResult<Self> {
        let cb = MutexCb {
            owner: None,
            owner_prio: 0,
            locked: 0,
        };
        let id = k.obj_create(OsObjType::Mutex, ObjKind::Mutex(cb))?;
        Ok(Mutex(id))
    }

    fn cb<P: Port>(self, k: &mut Kernel<P>) -> OsResult<&mut MutexCb> {
        match &mut k.obj_mut(self.0)?.kind {
            ObjKind::Mutex(cb) => Ok(cb),
            _ => Err(OsError::ObjType),
        }
    }

    fn acquire<P: Port>(self, k: &mut Kernel<P>, cur: TaskId) -> OsResult<Acquire> {
        let prio = k.tasks[cur.0].prio;
        let cb = self.cb(k)?;

        match cb.owner {
            None => {
                cb.owner = Some(cur);
                cb.owner_prio = prio;
                cb.locked = 1;
                Ok(Acquire::Taken)
            }
            Some(owner) if owner == cur => {
                cb.locked = cb.locked.checked_add(1).ok_or(OsError::MutexOvf)?;
                Ok(Acquire::Taken)
            }
            Some(owner) => Ok(Acquire::Contended(owner)),
        }
    }

    /// Acquire the mutex
    ///
    /// If the mutex is owned by a lower-priority task, the owner's priority
    /// is boosted to the caller's before the caller blocks.
    ///
    /// # Arguments
    /// * `timeout` - Maximum ticks to wait (0 = forever)
    ///
    /// # Returns
    /// * `Err(OsError::MutexOvf)` - recursive lock count would overflow
    pub fn pend<P: Port>(self, k: &mut Kernel<P>, timeout: OsTick) -> OsResult<Pend<()>> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }
        let cur = k.current().ok_or(OsError::OsNotRunning)?;

        let owner = match self.acquire(k, cur)? {
            Acquire::Taken => return Ok(Pend::Ready(())),
            Acquire::Contended(owner) => owner,
        };

        let task = k.pend_task()?;

        // Priority inheritance
        let prio = k.tasks[task.0].prio;
        if prio < k.tasks[owner.0].prio {
            crate::trace!("mutex owner boosted to prio {}", prio);
            k.reprioritize(owner, prio);
        }

        Ok(k.event_block(self.0, task, ptr::null_mut(), timeout, |_| ()))
    }

    /// Blocking acquire from task context
    pub fn wait<P: Port>(self, cell: &KernelCell<P>, timeout: OsTick) -> OsResult<()> {
        cell.block_on(|k| self.pend(k, timeout))
    }

    /// Acquire the mutex only if that needs no wait
    ///
    /// # Returns
    /// * `Err(OsError::ResourceUnavailable)` - another task owns it
    pub fn try_lock<P: Port>(self, k: &mut Kernel<P>) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }
        let cur = k.current().ok_or(OsError::OsNotRunning)?;

        match self.acquire(k, cur)? {
            Acquire::Taken => Ok(()),
            Acquire::Contended(_) => Err(OsError::ResourceUnavailable),
        }
    }

    /// Release the mutex
    ///
    /// On the final release the owner drops back to the priority it had
    /// when it took the mutex and ownership passes to the longest waiting
    /// task.
    ///
    /// # Returns
    /// * `Ok(n)` - lock count left; 0 once the mutex is released
    /// * `Err(OsError::NotOwner)` - caller does not hold the mutex
    pub fn notify<P: Port>(self, k: &mut Kernel<P>) -> OsResult<OsNestingCtr> {
        let cur = k.current();
        let cb = self.cb(k)?;

        let owner = match cb.owner {
            Some(owner) if Some(owner) == cur => owner,
            _ => return Err(OsError::NotOwner),
        };

        cb.locked -= 1;
        if cb.locked > 0 {
            return Ok(cb.locked);
        }
        let orig_prio = cb.owner_prio;

        let mut resched = false;
        if k.tasks[owner.0].prio != orig_prio {
            crate::trace!("mutex owner restored to prio {}", orig_prio);
            k.reprioritize(owner, orig_prio);
            resched = true;
        }

        match k.event_wake_first(self.0, ptr::null_mut(), Ok(())) {
            Some(task) => {
                let prio = k.tasks[task.0].prio;
                let cb = self.cb(k)?;
                cb.owner = Some(task);
                cb.owner_prio = prio;
                cb.locked = 1;
                resched |= k.outranks_current(task);
            }
            None => self.cb(k)?.owner = None,
        }

        if resched {
            k.sched();
        }
        Ok(0)
    }

    /// Destroy the mutex
    ///
    /// Restores the owner's priority, unlocks and wakes every waiter with
    /// `Deleted`.
    ///
    /// # Returns
    /// Number of tasks woken
    pub fn destroy<P: Port>(self, k: &mut Kernel<P>) -> OsResult<usize> {
        let cb = self.cb(k)?;
        let owner = cb.owner.take();
        let orig_prio = cb.owner_prio;
        cb.locked = 0;

        let mut resched = false;
        if let Some(owner) = owner {
            if k.tasks[owner.0].prio != orig_prio {
                k.reprioritize(owner, orig_prio);
                resched = true;
            }
        }

        let woken = k.event_remove_all(self.0, Err(OsError::Deleted));
        if resched || woken > 0 {
            k.sched();
        }
        Ok(woken)
    }

    /// Check if mutex is owned
    pub fn is_owned<P: Port>(self, k: &mut Kernel<P>) -> OsResult<bool> {
        Ok(self.cb(k)?.owner.is_some())
    }

    pub fn info<P: Port>(self, k: &mut Kernel<P>) -> OsResult<MutexInfo> {
        let cb = self.cb(k)?;
        let (owner, owner_prio, locked) = (cb.owner, cb.owner_prio, cb.locked);

        Ok(MutexInfo {
            waiters: k.event_wait_count(self.0),
            owner,
            owner_prio: owner.map(|_| owner_prio),
            inherited_prio: owner.map(|o| k.tasks[o.0].prio),
            locked,
        })
    }
}

impl<P: Port> Kernel<P> {
    /// Pass every mutex held by a deleted `task` to its next waiter
    ///
    /// The slot may be reused right away, so no mutex may keep naming it.
    ///
    /// # Returns
    /// True if a waiter was woken
    pub(crate) fn mutex_release_all(&mut self, task: TaskId) -> bool {
        let mut woken = false;

        for idx in 0..self.objs.len() {
            let held = matches!(
                &self.objs[idx].kind,
                ObjKind::Mutex(cb) if cb.owner == Some(task)
            );
            if !held {
                continue;
            }

            let next = self.event_wake_first(ObjId(idx), ptr::null_mut(), Ok(()));
            let next_prio = next.map(|t| self.tasks[t.0].prio);
            if let ObjKind::Mutex(cb) = &mut self.objs[idx].kind {
                cb.owner = next;
                cb.owner_prio = next_prio.unwrap_or(0);
                cb.locked = if next.is_some() { 1 } else { 0 };
            }
            woken |= next.is_some();
        }
        woken
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

    fn body(_: *mut ()) -> ! {
        loop {}
    }

    fn kernel() -> Kernel<StubPort> {
        Kernel::new(StubPort::new(), stack()).unwrap()
    }

    #[test]
    fn recursive_lock_counts() {
        let mut k = kernel();
        let t = k.task_create("t", body, ptr::null_mut(), 5, stack()).unwrap();
        k.start().unwrap();
        let m = Mutex::create(&mut k).unwrap();

        assert!(m.pend(&mut k, 0).unwrap().ready().is_some());
        m.try_lock(&mut k).unwrap();
        assert_eq!(m.info(&mut k).unwrap().locked, 2);
        assert_eq!(m.info(&mut k).unwrap().owner, Some(t));

        assert_eq!(m.notify(&mut k), Ok(1));
        assert_eq!(m.notify(&mut k), Ok(0));
        assert_eq!(m.is_owned(&mut k), Ok(false));
        assert_eq!(m.notify(&mut k), Err(OsError::NotOwner));
    }

    #[test]
    fn non_owner_release_leaves_state() {
        let mut k = kernel();
        let low = k.task_create("low", body, ptr::null_mut(), 9, stack()).unwrap();
        k.start().unwrap();
        let m = Mutex::create(&mut k).unwrap();
        m.try_lock(&mut k).unwrap();

        let high = k.task_create("high", body, ptr::null_mut(), 2, stack()).unwrap();
        assert_eq!(k.current(), Some(high));
        assert_eq!(m.notify(&mut k), Err(OsError::NotOwner));
        assert_eq!(m.try_lock(&mut k), Err(OsError::ResourceUnavailable));

        let info = m.info(&mut k).unwrap();
        assert_eq!(info.owner, Some(low));
        assert_eq!(info.locked, 1);
    }

    #[test]
    fn nesting_overflow() {
        let mut k = kernel();
        k.task_create("t", body, ptr::null_mut(), 5, stack()).unwrap();
        k.start().unwrap();
        let m = Mutex::create(&mut k).unwrap();

        for _ in 0..OsNestingCtr::MAX {
            m.try_lock(&mut k).unwrap();
        }
        assert_eq!(m.try_lock(&mut k), Err(OsError::MutexOvf));
    }

    #[test]
    fn destroy_restores_owner_priority() {
        let mut k = kernel();
        let low = k.task_create("low", body, ptr::null_mut(), 9, stack()).unwrap();
        k.start().unwrap();
        let m = Mutex::create(&mut k).unwrap();
        m.try_lock(&mut k).unwrap();

        let high = k.task_create("high", body, ptr::null_mut(), 2, stack()).unwrap();
        let Pend::Blocked(waiter) = m.pend(&mut k, 0).unwrap() else {
            panic!("expected to block");
        };
        assert_eq!(k.tcb(low).unwrap().prio(), 2);
        assert_eq!(k.current(), Some(low));

        assert_eq!(m.destroy(&mut k), Ok(1));
        assert_eq!(k.tcb(low).unwrap().prio(), 9);
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.resume(waiter), Err(OsError::Deleted));
    }

    #[test]
    fn deleted_owner_hands_mutex_to_waiter() {
        let mut k = kernel();
        let low = k.task_create("low", body, ptr::null_mut(), 9, stack()).unwrap();
        k.start().unwrap();
        let m = Mutex::create(&mut k).unwrap();
        let idle_m = Mutex::create(&mut k).unwrap();
        m.try_lock(&mut k).unwrap();
        idle_m.try_lock(&mut k).unwrap();

        let high = k.task_create("high", body, ptr::null_mut(), 2, stack()).unwrap();
        let Pend::Blocked(waiter) = m.pend(&mut k, 0).unwrap() else {
            panic!("expected to block");
        };
        assert_eq!(k.current(), Some(low));

        k.task_delete_self().unwrap();
        assert_eq!(k.current(), Some(high));
        assert_eq!(k.resume(waiter), Ok(()));
        assert_eq!(m.info(&mut k).unwrap().owner, Some(high));
        assert_eq!(idle_m.is_owned(&mut k), Ok(false));

        // A task reusing the slot owns nothing
        let again = k.task_create("again", body, ptr::null_mut(), 1, stack()).unwrap();
        assert_eq!(again, low);
        assert_eq!(k.current(), Some(again));
        assert_eq!(idle_m.notify(&mut k), Err(OsError::NotOwner));
        assert_eq!(m.notify(&mut k), Err(OsError::NotOwner));
    }
}
