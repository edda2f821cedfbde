//! Event / wait abstraction
//!
//! Every blocking primitive is a policy layer over [`OsEvent`]: a typed
//! FIFO wait list of tasks. Waking a task delivers a message and a result
//! into its TCB; the task reads them back through [`Kernel::resume`] once
//! it runs again.
//!
//! These operations never reschedule on their own. The primitive that
//! calls them decides whether the change warrants a switch.

use crate::core::critical::is_isr_context;
use crate::core::kernel::Kernel;
use crate::core::list::{List, Nodes};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::task::OsTcb;
use crate::types::{ObjId, OsMsg, OsObjType, OsTaskState, OsTick, TaskId};

/// Wait list shared by all kernel objects
#[derive(Debug, Clone, Copy)]
pub(crate) struct OsEvent {
    pub(crate) obj_type: OsObjType,
    pub(crate) wait_list: List,
}

impl OsEvent {
    pub(crate) const fn new(obj_type: OsObjType) -> Self {
        OsEvent {
            obj_type,
            wait_list: List::new(),
        }
    }
}

// ============ Pend / resume split ============

/// Outcome of a pend request
#[derive(Debug)]
#[must_use]
pub enum Pend<T> {
    /// Satisfied without blocking
    Ready(T),
    /// The calling task now waits; its result is read after the switch
    Blocked(Waiter<T>),
}

impl<T> Pend<T> {
    /// Value of an immediately satisfied request
    pub fn ready(self) -> Option<T> {
        match self {
            Pend::Ready(v) => Some(v),
            Pend::Blocked(_) => None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Pend::Blocked(_))
    }
}

/// Ticket for a task that blocked on a kernel object
pub struct Waiter<T> {
    task: TaskId,
    take: fn(&OsTcb) -> T,
}

impl<T> Waiter<T> {
    pub(crate) fn new(task: TaskId, take: fn(&OsTcb) -> T) -> Self {
        Waiter { task, take }
    }

    /// Task that is waiting
    #[inline]
    pub fn task(&self) -> TaskId {
        self.task
    }

    pub(crate) fn take(&self, tcb: &OsTcb) -> T {
        (self.take)(tcb)
    }
}

impl<T> Clone for Waiter<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Waiter<T> {}

impl<T> core::fmt::Debug for Waiter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Waiter").field("task", &self.task).finish()
    }
}

// ============ Kernel event operations ============

impl<P: Port> Kernel<P> {
    /// Task that may block right now
    ///
    /// # Returns
    /// * `Err(OsError::PendIsr)` - called from an interrupt
    /// * `Err(OsError::SchedLocked)` - scheduler is locked
    /// * `Err(OsError::OsNotRunning)` - no task is running
    pub(crate) fn pend_task(&self) -> OsResult<TaskId> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }
        if self.sched_lock_nesting > 0 {
            return Err(OsError::SchedLocked);
        }
        self.cur.ok_or(OsError::OsNotRunning)
    }

    /// Block `task` on `obj`
    ///
    /// # Arguments
    /// * `msg` - initial message slot value
    /// * `timeout` - ticks before the wait fails with `Timeout`, 0 = forever
    pub(crate) fn event_wait(&mut self, obj: ObjId, task: TaskId, msg: OsMsg, timeout: OsTick) {
        let wait_flag = self.objs[obj.0].event.obj_type.wait_flag();

        self.unready(task);

        let tcb = &mut self.tasks[task.0];
        tcb.state |= wait_flag;
        tcb.pend_obj = Some(obj);
        tcb.msg = msg;
        tcb.pend_result = Ok(());

        let mut nodes = Nodes::new(&mut self.tasks[..], OsTcb::evt_link);
        self.objs[obj.0].event.wait_list.push_back(&mut nodes, task.0);

        if timeout != 0 {
            self.dly_list.insert(&mut self.tasks[..], task.0, timeout);
            self.tasks[task.0].state |= OsTaskState::DELAYED;
        }
    }

    /// Wake the longest waiting task on `obj`
    ///
    /// # Returns
    /// The woken task, or `None` if nobody waits
    pub(crate) fn event_wake_first(
        &mut self,
        obj: ObjId,
        msg: OsMsg,
        result: OsResult<()>,
    ) -> Option<TaskId> {
        let task = TaskId(self.objs[obj.0].event.wait_list.front()?);
        self.event_wake_task(obj, task, msg, result);
        Some(task)
    }

    /// Wake a specific waiter of `obj`
    pub(crate) fn event_wake_task(
        &mut self,
        obj: ObjId,
        task: TaskId,
        msg: OsMsg,
        result: OsResult<()>,
    ) {
        self.event_remove_task(obj, task, result);

        let tcb = &mut self.tasks[task.0];
        tcb.msg = msg;
        tcb.state.remove(OsTaskState::WAIT_MASK);

        if tcb.state.contains(OsTaskState::DELAYED) {
            tcb.state.remove(OsTaskState::DELAYED);
            self.dly_list.remove(&mut self.tasks[..], task.0);
        }

        self.ready(task);
    }

    /// Detach `task` from the wait list of `obj` and record `result`
    ///
    /// Neither the ready table nor the delay queue is touched.
    pub(crate) fn event_remove_task(&mut self, obj: ObjId, task: TaskId, result: OsResult<()>) {
        let mut nodes = Nodes::new(&mut self.tasks[..], OsTcb::evt_link);
        self.objs[obj.0].event.wait_list.remove(&mut nodes, task.0);

        let tcb = &mut self.tasks[task.0];
        tcb.pend_obj = None;
        tcb.pend_result = result;
    }

    /// Wake every waiter of `obj` with `result`, in FIFO order
    ///
    /// # Returns
    /// Number of tasks woken
    pub(crate) fn event_remove_all(&mut self, obj: ObjId, result: OsResult<()>) -> usize {
        let mut woken = 0;
        while self
            .event_wake_first(obj, core::ptr::null_mut(), result)
            .is_some()
        {
            woken += 1;
        }
        woken
    }

    /// Number of tasks waiting on `obj`
    #[inline]
    pub(crate) fn event_wait_count(&self, obj: ObjId) -> usize {
        self.objs[obj.0].event.wait_list.len()
    }

    /// Front of the wait list of `obj`
    #[inline]
    pub(crate) fn event_first(&self, obj: ObjId) -> Option<TaskId> {
        self.objs[obj.0].event.wait_list.front().map(TaskId)
    }

    /// Waiter queued behind `task` on `obj`
    pub(crate) fn event_next(&mut self, obj: ObjId, task: TaskId) -> Option<TaskId> {
        let mut nodes = Nodes::new(&mut self.tasks[..], OsTcb::evt_link);
        self.objs[obj.0]
            .event
            .wait_list
            .next(&mut nodes, task.0)
            .map(TaskId)
    }

    /// Block the running task on `obj` and reschedule
    ///
    /// Shared tail of every primitive's blocking path.
    pub(crate) fn event_block<T>(
        &mut self,
        obj: ObjId,
        task: TaskId,
        msg: OsMsg,
        timeout: OsTick,
        take: fn(&OsTcb) -> T,
    ) -> Pend<T> {
        self.event_wait(obj, task, msg, timeout);
        self.sched();
        Pend::Blocked(Waiter::new(task, take))
    }
}
