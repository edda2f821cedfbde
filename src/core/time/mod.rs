//! Time management module
//!
//! Provides tick handling, time delays, and timeout management. Delayed
//! tasks and bounded waits share one delta-encoded [`DelayQueue`].

mod delay;

pub use delay::{DelayQueue, Delayed};

use core::sync::atomic::Ordering;

use crate::config::CFG_TICK_RATE_HZ;
use crate::core::kernel::{Kernel, TICK_STAMP};
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::types::{OsTaskState, OsTick, TaskId};

impl<P: Port> Kernel<P> {
    /// Tick handler
    ///
    /// Called once per tick period from the tick interrupt. Wakes every
    /// task whose delay ran out (a bounded wait ends with `Timeout`), runs
    /// time slicing, services hard timers and then reschedules once.
    pub fn tick(&mut self) {
        self.dly_list.tick(&mut self.tasks[..]);

        while let Some(idx) = self.dly_list.pop_expired(&mut self.tasks[..]) {
            let task = TaskId(idx);
            self.tasks[idx].state.remove(OsTaskState::DELAYED);

            if let Some(obj) = self.tasks[idx].pend_obj {
                self.event_remove_task(obj, task, Err(OsError::Timeout));
                self.tasks[idx].state.remove(OsTaskState::WAIT_MASK);
            }

            if self.tasks[idx].is_ready() {
                self.ready(task);
            }
        }

        self.sched_round_robin();

        self.tick_ctr = self.tick_ctr.wrapping_add(1);
        TICK_STAMP.store(self.tick_ctr, Ordering::Relaxed);

        #[cfg(feature = "tmr")]
        self.timer_tick();

        self.sched();
    }

    /// Time delay in ticks
    ///
    /// Delays the calling task for the specified number of system ticks.
    /// The task is removed from the ready list and placed on the delay
    /// queue. When the delay expires, the tick handler moves the task back
    /// to ready.
    ///
    /// # Arguments
    /// * `ticks` - Number of ticks to delay (0 = no delay)
    ///
    /// # Returns
    /// * `Ok(())` - Task is delayed (or `ticks` was 0)
    /// * `Err(OsError::PendIsr)` - Cannot delay from ISR
    /// * `Err(OsError::SchedLocked)` - Scheduler is locked
    pub fn task_delay(&mut self, ticks: OsTick) -> OsResult<()> {
        let task = self.pend_task()?;

        if ticks == 0 {
            return Ok(());
        }

        self.unready(task);
        self.dly_list.insert(&mut self.tasks[..], task.0, ticks);
        self.tasks[task.0].state |= OsTaskState::DELAYED;

        self.sched();
        Ok(())
    }

    /// Time delay in hours, minutes, seconds, milliseconds
    ///
    /// # Arguments
    /// * `hours` - Hours (0-999)
    /// * `minutes` - Minutes (0-59)
    /// * `seconds` - Seconds (0-59)
    /// * `milliseconds` - Milliseconds (0-999)
    pub fn task_delay_hmsm(
        &mut self,
        hours: u16,
        minutes: u8,
        seconds: u8,
        milliseconds: u16,
    ) -> OsResult<()> {
        if minutes > 59 || seconds > 59 || milliseconds > 999 {
            return Err(OsError::StateInvalid);
        }

        let total_ms = (hours as u64) * 3_600_000
            + (minutes as u64) * 60_000
            + (seconds as u64) * 1000
            + (milliseconds as u64);

        let ticks = total_ms * CFG_TICK_RATE_HZ as u64 / 1000;
        self.task_delay(ticks.min(OsTick::MAX as u64) as OsTick)
    }

    /// Resume a delayed task before its delay expires
    ///
    /// # Returns
    /// * `Err(OsError::StateInvalid)` - task is not in a plain delay
    pub fn task_delay_resume(&mut self, task: TaskId) -> OsResult<()> {
        let tcb = self.tcb(task)?;
        if !tcb.is_delayed() || tcb.is_waiting() {
            return Err(OsError::StateInvalid);
        }

        self.dly_list.remove(&mut self.tasks[..], task.0);
        self.tasks[task.0].state.remove(OsTaskState::DELAYED);

        if self.tasks[task.0].is_ready() {
            self.ready(task);
            self.sched();
        }
        Ok(())
    }

    /// Ticks left before `task` leaves the delay queue
    pub fn delay_remaining(&mut self, task: TaskId) -> Option<OsTick> {
        self.dly_list.remaining(&mut self.tasks[..], task.0)
    }
}
