//! Event flag groups
//!
//! A flag group is one 32-bit word of flags. Tasks wait for any or all of
//! a set of bits to become set (or clear), optionally consuming them on
//! success. Every notify rechecks all waiters in queue order.

use bitflags::bitflags;

use crate::core::cs_cell::KernelCell;
use crate::core::event::Pend;
use crate::core::kernel::{Kernel, ObjKind};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::task::OsTcb;
use crate::types::{ObjId, OsFlags, OsObjType, OsTick};

bitflags! {
    /// Flag wait mode
    pub struct FlagWait: u8 {
        /// Match set bits; clear bits when absent
        const SET = 0x01;
        /// Every requested bit must match; any one when absent
        const ALL = 0x02;
        /// Undo the matched bits on success
        const CONSUME = 0x80;

        const SET_ALL = Self::SET.bits | Self::ALL.bits;
        const SET_ANY = Self::SET.bits;
        const CLR_ALL = Self::ALL.bits;
        const CLR_ANY = 0;
    }
}

/// Check `req` against `flags` under `mode`
///
/// # Returns
/// The matched bits on success; `flags` is updated when consuming.
fn check(flags: &mut OsFlags, mode: FlagWait, req: OsFlags) -> Option<OsFlags> {
    let set = mode.contains(FlagWait::SET);
    let matched = if set { *flags & req } else { !*flags & req };

    let hit = if mode.contains(FlagWait::ALL) {
        matched == req
    } else {
        matched != 0
    };
    if !hit {
        return None;
    }

    if mode.contains(FlagWait::CONSUME) {
        if set {
            *flags &= !matched;
        } else {
            *flags |= matched;
        }
    }
    Some(matched)
}

/// Flag group state kept in the object arena
#[derive(Debug)]
pub(crate) struct FlagGroupCb {
    flags: OsFlags,
}

/// Flag group handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagGroup(ObjId);

/// Snapshot of a flag group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagGroupInfo {
    pub flags: OsFlags,
    pub waiters: usize,
}

fn take_flags(tcb: &OsTcb) -> OsFlags {
    tcb.flags_rdy()
}

impl FlagGroup {
    pub fn create<P: Port>(k: &mut Kernel<P>, flags: OsFlags) -> OsResult<Self> {
        let id = k.obj_create(OsObjType::Flag, ObjKind::Flag(FlagGroupCb { flags }))?;
        Ok(FlagGroup(id))
    }

    fn cb<P: Port>(self, k: &mut Kernel<P>) -> OsResult<&mut FlagGroupCb> {
        match &mut k.obj_mut(self.0)?.kind {
            ObjKind::Flag(cb) => Ok(cb),
            _ => Err(OsError::ObjType),
        }
    }

    /// Wait for flags
    ///
    /// # Arguments
    /// * `mode` - match set or clear bits, any or all, consume or peek
    /// * `req` - requested bits
    /// * `timeout` - Maximum ticks to wait (0 = forever)
    ///
    /// # Returns
    /// The matched bits, immediately or once a notify satisfies the wait
    pub fn pend<P: Port>(
        self,
        k: &mut Kernel<P>,
        mode: FlagWait,
        req: OsFlags,
        timeout: OsTick,
    ) -> OsResult<Pend<OsFlags>> {
        if let Some(matched) = check(&mut self.cb(k)?.flags, mode, req) {
            return Ok(Pend::Ready(matched));
        }

        let task = k.pend_task()?;
        let tcb = &mut k.tasks[task.0];
        tcb.flags_pend = req;
        tcb.flags_opt = mode.bits();
        tcb.flags_rdy = 0;

        Ok(k.event_block(self.0, task, core::ptr::null_mut(), timeout, take_flags))
    }

    /// Blocking wait from task context
    pub fn wait<P: Port>(
        self,
        cell: &KernelCell<P>,
        mode: FlagWait,
        req: OsFlags,
        timeout: OsTick,
    ) -> OsResult<OsFlags> {
        cell.block_on(|k| self.pend(k, mode, req, timeout))
    }

    /// Check for flags without blocking
    ///
    /// # Returns
    /// * `Err(OsError::ResourceUnavailable)` - condition not met
    pub fn try_get<P: Port>(self, k: &mut Kernel<P>, mode: FlagWait, req: OsFlags) -> OsResult<OsFlags> {
        check(&mut self.cb(k)?.flags, mode, req).ok_or(OsError::ResourceUnavailable)
    }

    /// Set (`set = true`) or clear `bits`, then wake every satisfied waiter
    ///
    /// # Returns
    /// The flag word after all waiters consumed their bits
    pub fn notify<P: Port>(self, k: &mut Kernel<P>, set: bool, bits: OsFlags) -> OsResult<OsFlags> {
        let cb = self.cb(k)?;
        if set {
            cb.flags |= bits;
        } else {
            cb.flags &= !bits;
        }

        let mut woken = false;
        let mut cur = k.event_first(self.0);
        while let Some(task) = cur {
            cur = k.event_next(self.0, task);

            let tcb = &k.tasks[task.0];
            let mode = FlagWait::from_bits_truncate(tcb.flags_opt);
            let req = tcb.flags_pend;

            if let Some(matched) = check(&mut self.cb(k)?.flags, mode, req) {
                k.tasks[task.0].flags_rdy = matched;
                k.event_wake_task(self.0, task, core::ptr::null_mut(), Ok(()));
                woken = true;
            }
        }

        if woken {
            k.sched();
        }
        Ok(self.cb(k)?.flags)
    }

    /// Destroy the flag group, waking every waiter with `Deleted`
    ///
    /// # Returns
    /// Number of tasks woken
    pub fn destroy<P: Port>(self, k: &mut Kernel<P>) -> OsResult<usize> {
        self.cb(k)?.flags = 0;
        let woken = k.event_remove_all(self.0, Err(OsError::Deleted));
        if woken > 0 {
            k.sched();
        }
        Ok(woken)
    }

    /// Current flag word
    pub fn flags<P: Port>(self, k: &mut Kernel<P>) -> OsResult<OsFlags> {
        Ok(self.cb(k)?.flags)
    }

    pub fn info<P: Port>(self, k: &mut Kernel<P>) -> OsResult<FlagGroupInfo> {
        let flags = self.cb(k)?.flags;
        Ok(FlagGroupInfo {
            flags,
            waiters: k.event_wait_count(self.0),
        })
    }
}
