//! Task management module
//!
//! Provides task creation, deletion, and control functions.

mod tcb;

pub use tcb::OsTcb;

use crate::config::{CFG_PRIO_MAX, CFG_STK_SIZE_MIN, CFG_TIME_QUANTA_DEFAULT};
use crate::core::kernel::Kernel;
use crate::core::list::Nodes;
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::types::{OsCleanFn, OsNestingCtr, OsPrio, OsStkElement, OsTaskFn, OsTaskState, OsTick, TaskId};

/// Snapshot of a task's scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: &'static str,
    pub prio: OsPrio,
    pub base_prio: OsPrio,
    pub state: OsTaskState,
    pub slice: OsTick,
    pub suspend_count: OsNestingCtr,
    /// Ticks until the task leaves the delay queue, 0 if not queued
    pub delay_ticks: OsTick,
}

impl<P: Port> Kernel<P> {
    /// Create a new task
    ///
    /// The task starts ready. Creating a task while the kernel runs is a
    /// scheduling point.
    ///
    /// # Arguments
    /// * `name` - Task name for debugging
    /// * `entry` - Task entry point function
    /// * `arg` - Argument to pass to task function
    /// * `prio` - Task priority (0 = highest)
    /// * `stack` - Caller-owned stack region
    ///
    /// # Returns
    /// * `Ok(task)` - handle of the new task
    /// * `Err(OsError::PrioInvalid)` - `prio` out of range
    /// * `Err(OsError::StkSizeInvalid)` - stack shorter than `CFG_STK_SIZE_MIN`
    /// * `Err(OsError::TaskNoMoreTcb)` - task arena is full
    ///
    /// # Example
    /// ```ignore
    /// static mut TASK_STK: [OsStkElement; 256] = [0; 256];
    ///
    /// fn my_task(_: *mut ()) -> ! {
    ///     loop { /* ... */ }
    /// }
    ///
    /// let stack = unsafe { &mut *core::ptr::addr_of_mut!(TASK_STK) };
    /// kernel.task_create("MyTask", my_task, core::ptr::null_mut(), 5, stack)?;
    /// ```
    pub fn task_create(
        &mut self,
        name: &'static str,
        entry: OsTaskFn,
        arg: *mut (),
        prio: OsPrio,
        stack: &'static mut [OsStkElement],
    ) -> OsResult<TaskId> {
        if prio as usize >= CFG_PRIO_MAX {
            return Err(OsError::PrioInvalid);
        }

        if stack.len() < CFG_STK_SIZE_MIN {
            return Err(OsError::StkSizeInvalid);
        }

        let idx = self
            .tasks
            .iter()
            .position(|t| !t.is_alive())
            .ok_or(OsError::TaskNoMoreTcb)?;

        let stk_base = stack.as_mut_ptr();
        let stk_size = stack.len();
        let stk_ptr = self.port.init_stack(entry, arg, stack);

        let tcb = &mut self.tasks[idx];
        *tcb = OsTcb::new();
        tcb.name = name;
        tcb.entry = Some(entry);
        tcb.arg = arg;
        tcb.stk_ptr = stk_ptr;
        tcb.stk_base = stk_base;
        tcb.stk_size = stk_size;
        tcb.prio = prio;
        tcb.base_prio = prio;
        tcb.slice = CFG_TIME_QUANTA_DEFAULT;
        tcb.state = OsTaskState::empty();

        let task = TaskId(idx);
        self.ready(task);

        crate::debug!("task {} created at prio {}", name, prio);

        self.sched();
        Ok(task)
    }

    /// Suspend a task
    ///
    /// Suspension nests: a suspended task needs one wake-up per suspend.
    ///
    /// # Returns
    /// * `Err(OsError::TaskSuspendIdle)` - idle task cannot be suspended
    /// * `Err(OsError::StateInvalid)` - task is delayed or waiting
    pub fn task_suspend(&mut self, task: TaskId) -> OsResult<()> {
        if task == self.idle {
            return Err(OsError::TaskSuspendIdle);
        }

        let tcb = self.tcb_mut(task)?;

        if tcb.is_suspended() {
            tcb.suspend_ctr = tcb.suspend_ctr.saturating_add(1);
            return Ok(());
        }

        if !tcb.is_ready() {
            return Err(OsError::StateInvalid);
        }

        tcb.suspend_ctr = 1;
        tcb.state |= OsTaskState::SUSPENDED;
        self.unready(task);

        if self.cur == Some(task) {
            self.sched();
        }
        Ok(())
    }

    /// Undo one suspension
    ///
    /// # Returns
    /// * `Err(OsError::TaskNotSuspended)` - task is not suspended
    pub fn task_wake_up(&mut self, task: TaskId) -> OsResult<()> {
        let tcb = self.tcb_mut(task)?;

        if !tcb.is_suspended() {
            return Err(OsError::TaskNotSuspended);
        }

        tcb.suspend_ctr -= 1;
        if tcb.suspend_ctr == 0 {
            tcb.state.remove(OsTaskState::SUSPENDED);
            self.ready(task);
            self.sched();
        }
        Ok(())
    }

    /// Register the callback run when `task` is deleted
    pub fn task_set_cleanup(&mut self, task: TaskId, clean: OsCleanFn, arg: *mut ()) -> OsResult<()> {
        self.tcb_mut(task)?.clean = Some((clean, arg));
        Ok(())
    }

    /// Delete a task regardless of what it is doing
    ///
    /// The task leaves the delay queue, its wait list or the ready table,
    /// its cleanup callback runs and the slot becomes free.
    ///
    /// Mutexes the task holds pass to their next waiter.
    ///
    /// # Returns
    /// * `Err(OsError::TaskDelIdle)` - idle task cannot be deleted
    /// * `Err(OsError::SchedLocked)` - the running task cannot go while the
    ///   scheduler is locked, it would keep running in a freed slot
    pub fn task_force_delete(&mut self, task: TaskId) -> OsResult<()> {
        if task == self.idle {
            return Err(OsError::TaskDelIdle);
        }
        if self.cur == Some(task) && self.sched_lock_nesting > 0 {
            return Err(OsError::SchedLocked);
        }

        let tcb = self.tcb(task)?;
        let delayed = tcb.is_delayed();
        let pend_obj = tcb.pend_obj;
        let ready = tcb.is_ready();

        if delayed {
            self.dly_list.remove(&mut self.tasks[..], task.0);
        }

        if let Some(obj) = pend_obj {
            let mut nodes = Nodes::new(&mut self.tasks[..], OsTcb::evt_link);
            self.objs[obj.0].event.wait_list.remove(&mut nodes, task.0);
        } else if ready {
            self.unready(task);
        }

        let tcb = &mut self.tasks[task.0];
        if let Some((clean, arg)) = tcb.clean.take() {
            clean(arg);
        }

        crate::debug!("task {} deleted", tcb.name);
        *tcb = OsTcb::new();

        #[cfg(feature = "mutex")]
        let handed_over = self.mutex_release_all(task);
        #[cfg(not(feature = "mutex"))]
        let handed_over = false;

        if self.cur == Some(task) || handed_over {
            self.sched();
        }
        Ok(())
    }

    /// Delete the running task
    pub fn task_delete_self(&mut self) -> OsResult<()> {
        let task = self.cur.ok_or(OsError::OsNotRunning)?;
        self.task_force_delete(task)
    }

    /// Ask `task` to delete itself at a point of its choosing
    pub fn task_request_delete(&mut self, task: TaskId) -> OsResult<()> {
        if task == self.idle {
            return Err(OsError::TaskDelIdle);
        }
        self.tcb_mut(task)?.del_req = true;
        Ok(())
    }

    /// Check whether the running task has been asked to delete itself
    pub fn task_is_delete_requested(&self) -> OsResult<bool> {
        let task = self.cur.ok_or(OsError::OsNotRunning)?;
        Ok(self.tcb(task)?.del_req)
    }

    /// Get task information
    pub fn task_info(&mut self, task: TaskId) -> OsResult<TaskInfo> {
        let tcb = self.tcb(task)?;
        let mut info = TaskInfo {
            name: tcb.name,
            prio: tcb.prio,
            base_prio: tcb.base_prio,
            state: tcb.state,
            slice: tcb.slice,
            suspend_count: tcb.suspend_ctr,
            delay_ticks: 0,
        };

        if tcb.is_delayed() {
            info.delay_ticks = self.delay_remaining(task).unwrap_or(0);
        }
        Ok(info)
    }
}
