//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a task.

use core::ptr;

use crate::core::list::Link;
use crate::core::time::Delayed;
use crate::error::OsResult;
use crate::types::{
    ObjId, OsCleanFn, OsFlags, OsMsg, OsNestingCtr, OsPrio, OsStkElement, OsTaskFn,
    OsTaskState, OsTick,
};

/// Task Control Block
#[derive(Clone, Copy)]
pub struct OsTcb {
    // ============ Stack ============
    /// Saved stack pointer, written by the port on every switch away
    pub(crate) stk_ptr: *mut OsStkElement,
    pub(crate) stk_base: *mut OsStkElement,
    /// Stack size in words
    pub(crate) stk_size: usize,

    pub(crate) name: &'static str,
    pub(crate) entry: Option<OsTaskFn>,
    pub(crate) arg: *mut (),

    // ============ List links ============
    pub(crate) rdy_link: Link,
    pub(crate) dly_link: Link,
    pub(crate) evt_link: Link,

    // ============ Priority ============
    /// Effective priority, raised while inheriting from a mutex waiter
    pub(crate) prio: OsPrio,
    /// Priority given at creation
    pub(crate) base_prio: OsPrio,

    // ============ State ============
    pub(crate) state: OsTaskState,
    /// Remaining ticks of the current time slice
    pub(crate) slice: OsTick,
    pub(crate) suspend_ctr: OsNestingCtr,
    /// Delta to the previous node while on the delay queue
    pub(crate) dly_ticks: OsTick,

    // ============ Event wait ============
    /// Object this task is waiting on
    pub(crate) pend_obj: Option<ObjId>,
    /// Message slot, written by whoever wakes the task
    pub(crate) msg: OsMsg,
    /// Outcome of the last wait
    pub(crate) pend_result: OsResult<()>,
    /// Flags being waited for
    pub(crate) flags_pend: OsFlags,
    /// Flag wait mode bits
    pub(crate) flags_opt: u8,
    /// Flags that made the task ready
    pub(crate) flags_rdy: OsFlags,

    // ============ Deletion ============
    pub(crate) del_req: bool,
    pub(crate) clean: Option<(OsCleanFn, *mut ())>,
}

impl OsTcb {
    /// Create an empty, unused TCB
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: ptr::null_mut(),
            stk_base: ptr::null_mut(),
            stk_size: 0,

            name: "",
            entry: None,
            arg: ptr::null_mut(),

            rdy_link: Link::new(),
            dly_link: Link::new(),
            evt_link: Link::new(),

            prio: 0,
            base_prio: 0,

            state: OsTaskState::DESTROYED,
            slice: 0,
            suspend_ctr: 0,
            dly_ticks: 0,

            pend_obj: None,
            msg: ptr::null_mut(),
            pend_result: Ok(()),
            flags_pend: 0,
            flags_opt: 0,
            flags_rdy: 0,

            del_req: false,
            clean: None,
        }
    }

    #[inline]
    pub(crate) fn rdy_link(&mut self) -> &mut Link {
        &mut self.rdy_link
    }

    #[inline]
    pub(crate) fn evt_link(&mut self) -> &mut Link {
        &mut self.evt_link
    }

    /// Slot holds a live task
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.state.contains(OsTaskState::DESTROYED)
    }

    /// Check if task is ready to run
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.state.contains(OsTaskState::SUSPENDED)
    }

    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.state.contains(OsTaskState::DELAYED)
    }

    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.state.is_waiting()
    }

    #[inline]
    pub fn prio(&self) -> OsPrio {
        self.prio
    }

    /// Message delivered by the last wake-up
    #[inline]
    pub fn msg(&self) -> OsMsg {
        self.msg
    }

    /// Flags delivered by the last flag-group wake-up
    #[inline]
    pub fn flags_rdy(&self) -> OsFlags {
        self.flags_rdy
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

impl Delayed for OsTcb {
    #[inline]
    fn dly_link(&mut self) -> &mut Link {
        &mut self.dly_link
    }

    #[inline]
    fn dly_ticks(&mut self) -> &mut OsTick {
        &mut self.dly_ticks
    }
}
