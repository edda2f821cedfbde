//! Scheduler module
//!
//! Priority-based preemptive scheduler with round-robin for same priority.
//! The ready table is one FIFO list per priority plus the [`PrioTable`]
//! bitmap that tells which lists are non-empty.
//!
//! [`PrioTable`]: crate::prio::PrioTable

use core::ptr;

use crate::config::{CFG_SCHED_ROUND_ROBIN_EN, CFG_TIME_QUANTA_DEFAULT};
use crate::core::kernel::Kernel;
use crate::core::list::Nodes;
use crate::port::Port;
use crate::task::OsTcb;
use crate::types::{OsPrio, TaskId};

impl<P: Port> Kernel<P> {
    /// Make a task ready
    ///
    /// Appends it to the ready list of its current priority.
    pub(crate) fn ready(&mut self, task: TaskId) {
        let prio = self.tasks[task.0].prio;
        let mut nodes = Nodes::new(&mut self.tasks[..], OsTcb::rdy_link);
        self.rdy_list[prio as usize].push_back(&mut nodes, task.0);
        self.prio_tbl.insert(prio);
    }

    /// Remove a task from ready list
    pub(crate) fn unready(&mut self, task: TaskId) {
        let prio = self.tasks[task.0].prio;
        let mut nodes = Nodes::new(&mut self.tasks[..], OsTcb::rdy_link);
        let list = &mut self.rdy_list[prio as usize];
        list.remove(&mut nodes, task.0);

        if list.is_empty() {
            self.prio_tbl.remove(prio);
        }
    }

    /// Head of the highest non-empty ready list, or the idle task
    pub(crate) fn highest_ready(&self) -> TaskId {
        let prio = self.prio_tbl.get_highest();
        self.rdy_list[prio as usize]
            .front()
            .map(TaskId)
            .unwrap_or(self.idle)
    }

    /// Main scheduling point
    ///
    /// Called after any operation that may change which task should run.
    /// Does nothing before [`Kernel::start`] or while the scheduler is
    /// locked; otherwise switches to the highest ready task if it is not
    /// the one already running.
    pub(crate) fn sched(&mut self) {
        if !self.running || self.sched_lock_nesting > 0 {
            return;
        }

        let next = self.highest_ready();
        if self.cur != Some(next) {
            self.switch_to(next);
        }
    }

    fn switch_to(&mut self, next: TaskId) {
        self.next = Some(next);

        let from = match self.cur {
            Some(cur) => ptr::addr_of_mut!(self.tasks[cur.0].stk_ptr),
            None => ptr::null_mut(),
        };
        let to = ptr::addr_of_mut!(self.tasks[next.0].stk_ptr);
        self.port.request_switch(from, to);

        self.ctx_sw_ctr = self.ctx_sw_ctr.wrapping_add(1);
        self.cur = Some(next);
    }

    /// Move a task to a new priority
    ///
    /// A ready task is taken off its old list and appended to the new
    /// one; a blocked task only has its priority field changed.
    pub(crate) fn reprioritize(&mut self, task: TaskId, prio: OsPrio) {
        if self.tasks[task.0].prio == prio {
            return;
        }

        if self.tasks[task.0].is_ready() {
            self.unready(task);
            self.tasks[task.0].prio = prio;
            self.ready(task);
        } else {
            self.tasks[task.0].prio = prio;
        }
    }

    /// `task` would preempt the running task
    pub(crate) fn outranks_current(&self, task: TaskId) -> bool {
        match self.cur {
            Some(cur) => self.tasks[task.0].prio < self.tasks[cur.0].prio,
            None => true,
        }
    }

    /// Round-robin time slicing, run once per tick
    ///
    /// When the running task's slice is used up it is reloaded and, if the
    /// task is still ready, moved behind its peers. This also happens with
    /// the scheduler locked; only the switch waits for the unlock.
    pub(crate) fn sched_round_robin(&mut self) {
        if !CFG_SCHED_ROUND_ROBIN_EN || !self.running {
            return;
        }

        let Some(cur) = self.cur else {
            return;
        };

        let tcb = &mut self.tasks[cur.0];
        tcb.slice = tcb.slice.saturating_sub(1);
        if tcb.slice > 0 {
            return;
        }
        tcb.slice = CFG_TIME_QUANTA_DEFAULT;

        if tcb.is_ready() {
            let prio = tcb.prio as usize;
            let mut nodes = Nodes::new(&mut self.tasks[..], OsTcb::rdy_link);
            let list = &mut self.rdy_list[prio];
            if list.len() > 1 {
                list.remove(&mut nodes, cur.0);
                list.push_back(&mut nodes, cur.0);
            }
        }
    }
}
