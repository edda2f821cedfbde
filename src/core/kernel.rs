//! Kernel context and initialization
//!
//! A single [`Kernel`] owns every piece of mutable scheduler state: the
//! task arena, the kernel-object arena, the ready table and bitmap, the
//! delay queue and the timer module. All operations take it by `&mut`;
//! task and interrupt code share it through [`KernelCell`].
//!
//! [`KernelCell`]: crate::core::cs_cell::KernelCell

use core::ptr;
use core::sync::atomic::AtomicU32;

use crate::config::{CFG_OBJ_MAX, CFG_PRIO_IDLE, CFG_PRIO_MAX, CFG_TASK_MAX};
use crate::core::event::{OsEvent, Waiter};
use crate::core::list::List;
use crate::core::time::DelayQueue;
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::prio::PrioTable;
use crate::task::OsTcb;
use crate::types::{ObjId, OsNestingCtr, OsObjType, OsStkElement, OsTick, TaskId};

#[cfg(feature = "flag")]
use crate::sync::flag_group::FlagGroupCb;
#[cfg(feature = "mbox")]
use crate::sync::mbox::MboxCb;
#[cfg(feature = "mem")]
use crate::sync::mem_block::MemBlockCb;
#[cfg(feature = "mutex")]
use crate::sync::mutex::MutexCb;
#[cfg(feature = "sem")]
use crate::sync::sem::SemCb;
#[cfg(feature = "tmr")]
use crate::timer::TimerTable;

/// Tick count of the most recently ticked kernel, for log timestamps
pub(crate) static TICK_STAMP: AtomicU32 = AtomicU32::new(0);

// ============ Kernel objects ============

/// Primitive-specific state of an object slot
pub(crate) enum ObjKind {
    Free,
    #[cfg(feature = "sem")]
    Sem(SemCb),
    #[cfg(feature = "mutex")]
    Mutex(MutexCb),
    #[cfg(feature = "mbox")]
    Mbox(MboxCb),
    #[cfg(feature = "mem")]
    MemBlock(MemBlockCb),
    #[cfg(feature = "flag")]
    Flag(FlagGroupCb),
}

/// Object slot: the shared wait list plus primitive state
pub(crate) struct ObjCb {
    pub(crate) event: OsEvent,
    pub(crate) kind: ObjKind,
}

impl ObjCb {
    fn free() -> Self {
        ObjCb {
            event: OsEvent::new(OsObjType::None),
            kind: ObjKind::Free,
        }
    }
}

// ============ Kernel ============

/// The kernel context
pub struct Kernel<P: Port> {
    pub(crate) port: P,

    pub(crate) tasks: [OsTcb; CFG_TASK_MAX],
    pub(crate) objs: [ObjCb; CFG_OBJ_MAX],
    #[cfg(feature = "tmr")]
    pub(crate) tmr: TimerTable,

    pub(crate) rdy_list: [List; CFG_PRIO_MAX],
    pub(crate) prio_tbl: PrioTable,
    pub(crate) dly_list: DelayQueue,

    pub(crate) sched_lock_nesting: OsNestingCtr,
    pub(crate) tick_ctr: OsTick,
    pub(crate) cur: Option<TaskId>,
    pub(crate) next: Option<TaskId>,
    pub(crate) idle: TaskId,
    pub(crate) running: bool,
    pub(crate) ctx_sw_ctr: u32,
}

// SAFETY: the raw pointers held by TCBs and object slots point into
// caller-provided `'static` buffers. Access is serialized by `&mut Kernel`,
// which `KernelCell` only hands out inside a critical section.
unsafe impl<P: Port + Send> Send for Kernel<P> {}

/// Internal IDLE task function
fn os_idle_task(_: *mut ()) -> ! {
    loop {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }
}

impl<P: Port> Kernel<P> {
    /// Initialize a kernel
    ///
    /// Creates the idle task at [`CFG_PRIO_IDLE`] on `idle_stack`.
    ///
    /// # Returns
    /// * `Ok(kernel)` - ready for task creation
    /// * `Err(OsError::StkSizeInvalid)` - idle stack too small
    pub fn new(port: P, idle_stack: &'static mut [OsStkElement]) -> OsResult<Self> {
        let mut kernel = Kernel {
            port,
            tasks: [OsTcb::new(); CFG_TASK_MAX],
            objs: core::array::from_fn(|_| ObjCb::free()),
            #[cfg(feature = "tmr")]
            tmr: TimerTable::new(),
            rdy_list: [List::new(); CFG_PRIO_MAX],
            prio_tbl: PrioTable::new(),
            dly_list: DelayQueue::new(),
            sched_lock_nesting: 0,
            tick_ctr: 0,
            cur: None,
            next: None,
            idle: TaskId(0),
            running: false,
            ctx_sw_ctr: 0,
        };

        kernel.idle = kernel.task_create(
            "Idle",
            os_idle_task,
            ptr::null_mut(),
            CFG_PRIO_IDLE,
            idle_stack,
        )?;

        Ok(kernel)
    }

    /// Start multitasking
    ///
    /// Hands the highest priority ready task to the port. The kernel must
    /// stay at its current address from here on, which is why targets call
    /// this through [`KernelCell::start`](crate::core::cs_cell::KernelCell::start).
    ///
    /// # Returns
    /// * `Err(OsError::OsRunning)` - OS is already running
    pub fn start(&mut self) -> OsResult<()> {
        if self.running {
            return Err(OsError::OsRunning);
        }

        let first = self.highest_ready();
        self.cur = Some(first);
        self.next = Some(first);
        self.running = true;

        crate::info!("kernel started, first task prio {}", self.tasks[first.0].prio);

        let slot = ptr::addr_of_mut!(self.tasks[first.0].stk_ptr);
        self.port.start(slot);
        Ok(())
    }

    /// Check if the OS is running
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Task currently holding the CPU
    #[inline]
    pub fn current(&self) -> Option<TaskId> {
        self.cur
    }

    /// Task last chosen by the scheduler
    #[inline]
    pub fn next_task(&self) -> Option<TaskId> {
        self.next
    }

    /// Handle of the idle task
    #[inline]
    pub fn idle_task(&self) -> TaskId {
        self.idle
    }

    /// Get current tick count
    #[inline]
    pub fn tick_count(&self) -> OsTick {
        self.tick_ctr
    }

    /// Number of context switches requested since start
    #[inline]
    pub fn switch_count(&self) -> u32 {
        self.ctx_sw_ctr
    }

    /// Get scheduler lock nesting level
    #[inline]
    pub fn sched_lock_nesting(&self) -> OsNestingCtr {
        self.sched_lock_nesting
    }

    #[inline]
    pub fn port(&self) -> &P {
        &self.port
    }

    #[inline]
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Lock the scheduler
    ///
    /// Nests up to 255 levels and saturates there. Interrupts stay enabled.
    pub fn sched_lock(&mut self) {
        self.sched_lock_nesting = self.sched_lock_nesting.saturating_add(1);
    }

    /// Unlock the scheduler
    ///
    /// Reschedules when the nesting count drops to zero.
    ///
    /// # Returns
    /// * `Ok(remaining)` - nesting level after the unlock
    /// * `Err(OsError::SchedNotLocked)` - scheduler was not locked
    pub fn sched_unlock(&mut self) -> OsResult<OsNestingCtr> {
        if self.sched_lock_nesting == 0 {
            return Err(OsError::SchedNotLocked);
        }

        self.sched_lock_nesting -= 1;
        if self.sched_lock_nesting == 0 {
            self.sched();
        }
        Ok(self.sched_lock_nesting)
    }

    /// Read the outcome of a wait once the waiting task has been resumed
    ///
    /// # Returns
    /// * `Ok(value)` - the wait was satisfied
    /// * `Err(OsError::Timeout | OsError::Deleted)` - delivered failure
    /// * `Err(OsError::StateInvalid)` - the task is still waiting
    pub fn resume<T>(&mut self, waiter: Waiter<T>) -> OsResult<T> {
        let tcb = self.tcb(waiter.task())?;
        if tcb.is_waiting() || tcb.is_delayed() {
            return Err(OsError::StateInvalid);
        }
        tcb.pend_result?;
        Ok(waiter.take(tcb))
    }

    // ============ Arena access ============

    /// TCB of a live task
    pub fn tcb(&self, task: TaskId) -> OsResult<&OsTcb> {
        match self.tasks.get(task.0) {
            Some(tcb) if tcb.is_alive() => Ok(tcb),
            _ => Err(OsError::TaskNotExist),
        }
    }

    pub(crate) fn tcb_mut(&mut self, task: TaskId) -> OsResult<&mut OsTcb> {
        match self.tasks.get_mut(task.0) {
            Some(tcb) if tcb.is_alive() => Ok(tcb),
            _ => Err(OsError::TaskNotExist),
        }
    }

    /// Claim a free object slot
    pub(crate) fn obj_create(&mut self, obj_type: OsObjType, kind: ObjKind) -> OsResult<ObjId> {
        let idx = self
            .objs
            .iter()
            .position(|o| o.event.obj_type == OsObjType::None)
            .ok_or(OsError::ObjPoolEmpty)?;

        self.objs[idx] = ObjCb {
            event: OsEvent::new(obj_type),
            kind,
        };
        Ok(ObjId(idx))
    }

    pub(crate) fn obj_mut(&mut self, id: ObjId) -> OsResult<&mut ObjCb> {
        self.objs.get_mut(id.0).ok_or(OsError::ObjType)
    }
}
