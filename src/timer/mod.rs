//! Timer module
//!
//! Hard timers run their callback from the tick interrupt. Soft timers
//! are serviced by a dedicated timer task that the tick wakes through a
//! counting semaphore; a second semaphore guards the soft list against
//! concurrent start/stop calls from other tasks.
//!
//! A timer whose period is 0 is one-shot. Otherwise it reloads from its
//! period after every expiry.

use core::ptr;

use crate::core::cs_cell::KernelCell;
use crate::core::kernel::Kernel;
use crate::core::list::{Link, List, Nodes};
use crate::config::CFG_TMR_MAX;
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::sem::Semaphore;
use crate::types::{OsPrio, OsStkElement, OsTaskFn, OsTick, OsTmrCallback, TaskId, TimerId};

/// Where a timer is serviced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerKind {
    /// In the tick interrupt; the callback must be short and never block
    Hard,
    /// In the timer task
    Soft,
}

/// Timer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerState {
    Created,
    Started,
    /// Callback in progress
    Running,
    Stopped,
    Destroyed,
}

/// Timer control block
#[derive(Clone, Copy)]
pub struct OsTmr {
    link: Link,
    start_delay: OsTick,
    period: OsTick,
    remaining: OsTick,
    callback: Option<OsTmrCallback>,
    arg: *mut (),
    kind: TimerKind,
    state: TimerState,
    used: bool,
    /// Id of the last soft pass that counted this timer down
    pass: u32,
}

impl OsTmr {
    const fn new() -> Self {
        OsTmr {
            link: Link::new(),
            start_delay: 0,
            period: 0,
            remaining: 0,
            callback: None,
            arg: ptr::null_mut(),
            kind: TimerKind::Soft,
            state: TimerState::Destroyed,
            used: false,
            pass: 0,
        }
    }

    fn link(&mut self) -> &mut Link {
        &mut self.link
    }

    fn reload(&mut self) {
        self.remaining = if self.start_delay != 0 {
            self.start_delay
        } else {
            self.period
        };
    }

    /// Count one tick; true when the timer is due
    fn countdown(&mut self) -> bool {
        if self.remaining == 0 {
            return true;
        }
        self.remaining -= 1;
        self.remaining == 0
    }
}

/// Snapshot of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerInfo {
    pub start_delay: OsTick,
    pub period: OsTick,
    pub remaining: OsTick,
    pub kind: TimerKind,
    pub state: TimerState,
}

/// Timer arena and service lists
pub(crate) struct TimerTable {
    tmrs: [OsTmr; CFG_TMR_MAX],
    hard: List,
    soft: List,
    tick_sem: Option<Semaphore>,
    protect_sem: Option<Semaphore>,
    task: Option<TaskId>,
    pass: u32,
}

impl TimerTable {
    pub(crate) const fn new() -> Self {
        TimerTable {
            tmrs: [OsTmr::new(); CFG_TMR_MAX],
            hard: List::new(),
            soft: List::new(),
            tick_sem: None,
            protect_sem: None,
            task: None,
            pass: 0,
        }
    }

    fn list(&mut self, kind: TimerKind) -> (&mut List, Nodes<'_, OsTmr>) {
        let list = match kind {
            TimerKind::Hard => &mut self.hard,
            TimerKind::Soft => &mut self.soft,
        };
        (list, Nodes::new(&mut self.tmrs[..], OsTmr::link))
    }

    fn link(&mut self, idx: usize) {
        let kind = self.tmrs[idx].kind;
        let (list, mut nodes) = self.list(kind);
        list.push_back(&mut nodes, idx);
    }

    fn unlink(&mut self, idx: usize) {
        let kind = self.tmrs[idx].kind;
        let (list, mut nodes) = self.list(kind);
        list.remove(&mut nodes, idx);
    }

    /// Bookkeeping after a callback returned
    fn finish(&mut self, idx: usize) {
        let tmr = &mut self.tmrs[idx];
        if tmr.state != TimerState::Running {
            return;
        }

        tmr.state = TimerState::Started;
        if tmr.period > 0 {
            tmr.remaining = tmr.period;
        } else {
            tmr.state = TimerState::Stopped;
            self.unlink(idx);
        }
    }
}

/// One pass over the soft list
///
/// Each timer linked when the pass visits it is counted down once, even if
/// callbacks start or stop timers while the pass is in progress.
#[derive(Debug)]
pub struct SoftPass {
    id: u32,
}

/// A due soft timer whose callback the caller must run
#[derive(Debug, Clone, Copy)]
pub struct Expired {
    pub timer: TimerId,
    pub callback: OsTmrCallback,
    pub arg: *mut (),
}

impl Expired {
    #[inline]
    pub fn fire(&self) {
        (self.callback)(self.arg)
    }
}

impl<P: Port> Kernel<P> {
    fn timer_slot(&mut self, id: TimerId) -> OsResult<&mut OsTmr> {
        match self.tmr.tmrs.get_mut(id.0) {
            Some(tmr) if tmr.used => Ok(tmr),
            _ => Err(OsError::TmrInvalidState),
        }
    }

    /// Create the soft timer task and its semaphores
    ///
    /// # Arguments
    /// * `prio` - Timer task priority
    /// * `stack` - Timer task stack
    /// * `entry` / `arg` - Timer task body, normally installed by
    ///   [`KernelCell::timer_module_init`]
    ///
    /// # Returns
    /// * `Err(OsError::StateInvalid)` - module already initialized
    pub fn timer_module_init(
        &mut self,
        prio: OsPrio,
        stack: &'static mut [OsStkElement],
        entry: OsTaskFn,
        arg: *mut (),
    ) -> OsResult<TaskId> {
        if self.tmr.task.is_some() {
            return Err(OsError::StateInvalid);
        }

        let protect = Semaphore::create(self, 1, 1)?;
        let tick = Semaphore::create(self, 0, 0)?;
        self.tmr.protect_sem = Some(protect);
        self.tmr.tick_sem = Some(tick);

        let task = self.task_create("tmr", entry, arg, prio, stack)?;
        self.tmr.task = Some(task);
        Ok(task)
    }

    /// Semaphores of the soft timer service: (tick, protect)
    pub fn timer_sems(&self) -> OsResult<(Semaphore, Semaphore)> {
        match (self.tmr.tick_sem, self.tmr.protect_sem) {
            (Some(tick), Some(protect)) => Ok((tick, protect)),
            _ => Err(OsError::OsNotInit),
        }
    }

    /// Create a timer
    ///
    /// # Arguments
    /// * `start_delay` - Ticks before the first expiry, 0 to use `period`
    /// * `period` - Reload value, 0 for a one-shot timer
    /// * `callback` / `arg` - Expiry callback and its argument
    /// * `kind` - Hard or soft
    ///
    /// # Returns
    /// * `Err(OsError::ObjPoolEmpty)` - every timer slot is in use
    pub fn timer_create(
        &mut self,
        start_delay: OsTick,
        period: OsTick,
        callback: OsTmrCallback,
        arg: *mut (),
        kind: TimerKind,
    ) -> OsResult<TimerId> {
        let idx = self
            .tmr
            .tmrs
            .iter()
            .position(|t| !t.used || t.state == TimerState::Destroyed)
            .ok_or(OsError::ObjPoolEmpty)?;

        let tmr = &mut self.tmr.tmrs[idx];
        *tmr = OsTmr::new();
        tmr.start_delay = start_delay;
        tmr.period = period;
        tmr.callback = Some(callback);
        tmr.arg = arg;
        tmr.kind = kind;
        tmr.state = TimerState::Created;
        tmr.used = true;
        tmr.reload();

        Ok(TimerId(idx))
    }

    /// The timer task is running, so a soft pass may hold the soft list
    fn in_timer_task(&self) -> bool {
        self.tmr.task.is_some() && self.tmr.task == self.cur
    }

    /// Run `f` on the soft list with the protect semaphore taken
    ///
    /// The timer task already holds it while a soft callback runs.
    fn with_soft_list<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> OsResult<R> {
        let (_, protect) = self.timer_sems()?;
        if self.in_timer_task() {
            return Ok(f(self));
        }
        protect.try_wait(self)?;
        let r = f(self);
        protect.notify(self)?;
        Ok(r)
    }

    fn timer_do_start(&mut self, idx: usize) {
        let tmr = &mut self.tmr.tmrs[idx];
        if matches!(tmr.state, TimerState::Created | TimerState::Stopped) {
            tmr.reload();
            tmr.state = TimerState::Started;
            // Not counted by a pass already running
            tmr.pass = self.tmr.pass;
            self.tmr.link(idx);
        }
    }

    fn timer_do_stop(&mut self, idx: usize) {
        let tmr = &mut self.tmr.tmrs[idx];
        if matches!(tmr.state, TimerState::Started | TimerState::Running) {
            tmr.state = TimerState::Stopped;
            self.tmr.unlink(idx);
        }
    }

    /// Start a timer
    ///
    /// Only a Created or Stopped timer is started; otherwise nothing
    /// happens.
    ///
    /// # Returns
    /// * `Err(OsError::ResourceUnavailable)` - soft list is busy, retry or
    ///   use [`KernelCell::timer_start`]
    pub fn timer_start(&mut self, id: TimerId) -> OsResult<()> {
        match self.timer_slot(id)?.kind {
            TimerKind::Hard => {
                self.timer_do_start(id.0);
                Ok(())
            }
            TimerKind::Soft => self.with_soft_list(|k| k.timer_do_start(id.0)),
        }
    }

    /// Stop a timer
    ///
    /// Only a Started or Running timer is stopped; otherwise nothing
    /// happens.
    pub fn timer_stop(&mut self, id: TimerId) -> OsResult<()> {
        match self.timer_slot(id)?.kind {
            TimerKind::Hard => {
                self.timer_do_stop(id.0);
                Ok(())
            }
            TimerKind::Soft => self.with_soft_list(|k| k.timer_do_stop(id.0)),
        }
    }

    /// Stop a timer and retire it; its slot may be reused
    pub fn timer_destroy(&mut self, id: TimerId) -> OsResult<()> {
        self.timer_stop(id)?;
        self.timer_slot(id)?.state = TimerState::Destroyed;
        Ok(())
    }

    pub fn timer_info(&mut self, id: TimerId) -> OsResult<TimerInfo> {
        let tmr = self.timer_slot(id)?;
        Ok(TimerInfo {
            start_delay: tmr.start_delay,
            period: tmr.period,
            remaining: tmr.remaining,
            kind: tmr.kind,
            state: tmr.state,
        })
    }

    /// Hard timer service, run from [`Kernel::tick`]
    pub(crate) fn timer_tick(&mut self) {
        let mut cur = self.tmr.hard.front();
        while let Some(idx) = cur {
            let (list, mut nodes) = self.tmr.list(TimerKind::Hard);
            cur = list.next(&mut nodes, idx);

            let tmr = &mut self.tmr.tmrs[idx];
            if !tmr.countdown() {
                continue;
            }

            tmr.state = TimerState::Running;
            crate::trace!("hard timer {} expired", idx);
            if let Some(callback) = tmr.callback {
                callback(tmr.arg);
            }
            self.tmr.finish(idx);
        }

        if let Some(tick) = self.tmr.tick_sem {
            let _ = tick.notify(self);
        }
    }

    // ============ Soft timer pass ============

    /// Begin a pass over the soft list
    pub fn soft_pass_begin(&mut self) -> SoftPass {
        self.tmr.pass = self.tmr.pass.wrapping_add(1);
        SoftPass { id: self.tmr.pass }
    }

    /// First soft timer not yet visited by `pass`
    fn soft_pass_unvisited(&mut self, pass: &SoftPass) -> Option<usize> {
        let (list, mut nodes) = self.tmr.list(TimerKind::Soft);
        let mut cur = list.front();
        while let Some(idx) = cur {
            if nodes.slot(idx).pass != pass.id {
                return Some(idx);
            }
            cur = list.next(&mut nodes, idx);
        }
        None
    }

    /// Count down soft timers until one is due
    ///
    /// The returned timer is Running. Fire its callback, then hand it back
    /// through [`Kernel::soft_pass_done`].
    pub fn soft_pass_next(&mut self, pass: &SoftPass) -> Option<Expired> {
        while let Some(idx) = self.soft_pass_unvisited(pass) {
            let tmr = &mut self.tmr.tmrs[idx];
            tmr.pass = pass.id;
            if !tmr.countdown() {
                continue;
            }

            let Some(callback) = tmr.callback else {
                continue;
            };
            tmr.state = TimerState::Running;
            crate::trace!("soft timer {} expired", idx);
            return Some(Expired {
                timer: TimerId(idx),
                callback,
                arg: tmr.arg,
            });
        }
        None
    }

    /// Reload or retire a soft timer after its callback returned
    ///
    /// A timer stopped or destroyed by its own callback is left as is; the
    /// callback reaches it through [`KernelCell::timer_stop`] or
    /// [`KernelCell::timer_destroy`], which skip the protect semaphore the
    /// pass already holds.
    pub fn soft_pass_done(&mut self, timer: TimerId) {
        self.tmr.finish(timer.0);
    }

    /// Run one whole soft pass in place, callbacks included
    pub fn service_soft_timers(&mut self) {
        let pass = self.soft_pass_begin();
        while let Some(expired) = self.soft_pass_next(&pass) {
            expired.fire();
            self.soft_pass_done(expired.timer);
        }
    }
}

/// Body of the soft timer task
///
/// `arg` is the `&'static KernelCell<P>` handed over by
/// [`KernelCell::timer_module_init`].
fn timer_task<P: Port>(arg: *mut ()) -> ! {
    // SAFETY: the cell is 'static and outlives the task.
    let cell = unsafe { &*(arg as *const KernelCell<P>) };
    loop {
        if cell.soft_timer_pass().is_err() {
            let _ = cell.delay(1);
        }
    }
}

impl<P: Port> KernelCell<P> {
    /// Create the timer task, running on this cell
    pub fn timer_module_init(
        &'static self,
        prio: OsPrio,
        stack: &'static mut [OsStkElement],
    ) -> OsResult<TaskId> {
        let arg = self as *const Self as *mut ();
        self.with(|k| k.timer_module_init(prio, stack, timer_task::<P>, arg))
    }

    /// One iteration of the timer task
    ///
    /// Waits for a tick, takes the soft list and runs every due callback
    /// outside the kernel borrow.
    pub fn soft_timer_pass(&self) -> OsResult<()> {
        let (tick, protect) = self.with(|k| k.timer_sems())?;

        tick.wait(self, 0)?;
        protect.wait(self, 0)?;

        let pass = self.with(|k| Ok(k.soft_pass_begin()))?;
        while let Some(expired) = self.with(|k| Ok(k.soft_pass_next(&pass)))? {
            expired.fire();
            self.with(|k| {
                k.soft_pass_done(expired.timer);
                Ok(())
            })?;
        }

        self.with(|k| protect.notify(k))
    }

    /// Run `f` on a timer, waiting for the soft list if needed
    fn timer_op(&self, id: TimerId, f: fn(&mut Kernel<P>, usize)) -> OsResult<()> {
        let kind = self.with(|k| Ok(k.timer_slot(id)?.kind))?;
        match kind {
            TimerKind::Hard => self.with(|k| {
                f(k, id.0);
                Ok(())
            }),
            TimerKind::Soft => {
                let (_, protect) = self.with(|k| k.timer_sems())?;
                // A soft callback runs with the pass holding the list
                let held = self.with(|k| Ok(k.in_timer_task()))?;
                if !held {
                    protect.wait(self, 0)?;
                }
                self.with(|k| {
                    f(k, id.0);
                    if held {
                        Ok(())
                    } else {
                        protect.notify(k)
                    }
                })
            }
        }
    }

    /// Start a timer, waiting for the soft list if it is busy
    pub fn timer_start(&self, id: TimerId) -> OsResult<()> {
        self.timer_op(id, |k, idx| k.timer_do_start(idx))
    }

    /// Stop a timer, waiting for the soft list if it is busy
    pub fn timer_stop(&self, id: TimerId) -> OsResult<()> {
        self.timer_op(id, |k, idx| k.timer_do_stop(idx))
    }

    /// Stop and retire a timer, waiting for the soft list if it is busy
    pub fn timer_destroy(&self, id: TimerId) -> OsResult<()> {
        self.timer_op(id, |k, idx| {
            k.timer_do_stop(idx);
            k.tmr.tmrs[idx].state = TimerState::Destroyed;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::StubPort;
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn stack() -> &'static mut [OsStkElement] {
        Box::leak(vec![0; 128].into_boxed_slice())
    }

    fn body(_: *mut ()) -> ! {
        loop {}
    }

    fn counter() -> &'static AtomicUsize {
        Box::leak(Box::new(AtomicUsize::new(0)))
    }

    fn bump(arg: *mut ()) {
        // SAFETY: tests pass a leaked AtomicUsize
        let c = unsafe { &*(arg as *const AtomicUsize) };
        c.fetch_add(1, Ordering::SeqCst);
    }

    fn arg(c: &'static AtomicUsize) -> *mut () {
        c as *const AtomicUsize as *mut ()
    }

    fn kernel() -> Kernel<StubPort> {
        let mut k = Kernel::new(StubPort::new(), stack()).unwrap();
        k.timer_module_init(1, stack(), body, ptr::null_mut()).unwrap();
        k
    }

    #[test]
    fn countdown_starts_from_delay_or_period() {
        let mut k = kernel();
        let c = counter();
        let a = k.timer_create(3, 10, bump, arg(c), TimerKind::Hard).unwrap();
        let b = k.timer_create(0, 10, bump, arg(c), TimerKind::Hard).unwrap();
        assert_eq!(k.timer_info(a).unwrap().remaining, 3);
        assert_eq!(k.timer_info(b).unwrap().remaining, 10);
        assert_eq!(k.timer_info(a).unwrap().state, TimerState::Created);
    }

    #[test]
    fn periodic_hard_timer_reloads() {
        let mut k = kernel();
        let c = counter();
        let t = k.timer_create(2, 3, bump, arg(c), TimerKind::Hard).unwrap();
        k.timer_start(t).unwrap();

        for _ in 0..2 {
            k.tick();
        }
        assert_eq!(c.load(Ordering::SeqCst), 1);
        assert_eq!(k.timer_info(t).unwrap().state, TimerState::Started);

        for _ in 0..6 {
            k.tick();
        }
        assert_eq!(c.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn one_shot_stops_after_expiry() {
        let mut k = kernel();
        let c = counter();
        let t = k.timer_create(2, 0, bump, arg(c), TimerKind::Hard).unwrap();
        k.timer_start(t).unwrap();

        for _ in 0..5 {
            k.tick();
        }
        assert_eq!(c.load(Ordering::SeqCst), 1);
        assert_eq!(k.timer_info(t).unwrap().state, TimerState::Stopped);

        k.timer_start(t).unwrap();
        assert_eq!(k.timer_info(t).unwrap().remaining, 2);
    }

    #[test]
    fn soft_timers_wait_for_the_pass() {
        let mut k = kernel();
        let c = counter();
        let t = k.timer_create(1, 1, bump, arg(c), TimerKind::Soft).unwrap();
        k.timer_start(t).unwrap();

        k.tick();
        assert_eq!(c.load(Ordering::SeqCst), 0);
        let (tick, _) = k.timer_sems().unwrap();
        assert_eq!(tick.count(&mut k), Ok(1));

        k.service_soft_timers();
        assert_eq!(c.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn soft_list_busy_during_pass() {
        let mut k = kernel();
        let c = counter();
        let t = k.timer_create(1, 0, bump, arg(c), TimerKind::Soft).unwrap();
        k.timer_start(t).unwrap();

        let (_, protect) = k.timer_sems().unwrap();
        protect.try_wait(&mut k).unwrap();
        assert_eq!(k.timer_stop(t), Err(OsError::ResourceUnavailable));
        protect.notify(&mut k).unwrap();

        k.timer_stop(t).unwrap();
        assert_eq!(k.timer_info(t).unwrap().state, TimerState::Stopped);
    }

    #[test]
    fn start_and_stop_only_from_valid_states() {
        let mut k = kernel();
        let c = counter();
        let t = k.timer_create(5, 0, bump, arg(c), TimerKind::Hard).unwrap();

        k.timer_stop(t).unwrap();
        assert_eq!(k.timer_info(t).unwrap().state, TimerState::Created);

        k.timer_start(t).unwrap();
        k.tick();
        k.timer_start(t).unwrap();
        assert_eq!(k.timer_info(t).unwrap().remaining, 4);

        k.timer_destroy(t).unwrap();
        assert_eq!(k.timer_info(t).unwrap().state, TimerState::Destroyed);
        k.timer_start(t).unwrap();
        assert_eq!(k.timer_info(t).unwrap().state, TimerState::Destroyed);

        let again = k.timer_create(1, 0, bump, arg(c), TimerKind::Soft).unwrap();
        assert_eq!(again, t);
    }

    #[test]
    fn soft_timers_need_the_module() {
        let mut k = Kernel::new(StubPort::new(), stack()).unwrap();
        let c = counter();
        let t = k.timer_create(1, 0, bump, arg(c), TimerKind::Soft).unwrap();
        assert_eq!(k.timer_start(t), Err(OsError::OsNotInit));
        assert_eq!(k.timer_module_init(1, stack(), body, ptr::null_mut()).map(|_| ()), Ok(()));
        assert_eq!(
            k.timer_module_init(1, stack(), body, ptr::null_mut()).map(|_| ()),
            Err(OsError::StateInvalid)
        );
    }

    struct SelfStop {
        cell: &'static KernelCell<StubPort>,
        timer: core::cell::Cell<Option<TimerId>>,
        fired: AtomicUsize,
    }

    fn stop_self(arg: *mut ()) {
        // SAFETY: the test passes a leaked SelfStop
        let ctx = unsafe { &*(arg as *const SelfStop) };
        ctx.fired.fetch_add(1, Ordering::SeqCst);
        if let Some(timer) = ctx.timer.get() {
            ctx.cell.timer_stop(timer).unwrap();
        }
    }

    #[test]
    fn soft_callback_stops_its_own_timer() {
        let cell: &'static KernelCell<StubPort> = Box::leak(Box::new(KernelCell::new()));
        cell.init(Kernel::new(StubPort::new(), stack()).unwrap()).unwrap();
        let task = cell.timer_module_init(1, stack()).unwrap();
        cell.start().unwrap();
        assert_eq!(cell.with(|k| Ok(k.current())), Ok(Some(task)));

        let ctx: &'static SelfStop = Box::leak(Box::new(SelfStop {
            cell,
            timer: core::cell::Cell::new(None),
            fired: AtomicUsize::new(0),
        }));
        let arg = ctx as *const SelfStop as *mut ();
        let t = cell
            .with(|k| k.timer_create(1, 1, stop_self, arg, TimerKind::Soft))
            .unwrap();
        ctx.timer.set(Some(t));
        cell.timer_start(t).unwrap();

        cell.tick().unwrap();
        cell.soft_timer_pass().unwrap();
        assert_eq!(ctx.fired.load(Ordering::SeqCst), 1);
        let state = cell.with(|k| k.timer_info(t)).unwrap().state;
        assert_eq!(state, TimerState::Stopped);

        cell.tick().unwrap();
        cell.soft_timer_pass().unwrap();
        assert_eq!(ctx.fired.load(Ordering::SeqCst), 1);

        let (_, protect) = cell.with(|k| k.timer_sems()).unwrap();
        assert_eq!(cell.with(|k| protect.count(k)), Ok(1));
    }

    #[test]
    fn timer_started_mid_pass_waits_for_the_next() {
        let mut k = kernel();
        let c = counter();
        let a = k.timer_create(1, 1, bump, arg(c), TimerKind::Soft).unwrap();
        let b = k.timer_create(1, 1, bump, arg(c), TimerKind::Soft).unwrap();
        k.timer_start(a).unwrap();

        let pass = k.soft_pass_begin();
        let expired = k.soft_pass_next(&pass).unwrap();
        assert_eq!(expired.timer, a);
        k.timer_start(b).unwrap();
        k.soft_pass_done(a);
        assert!(k.soft_pass_next(&pass).is_none());
        assert_eq!(k.timer_info(b).unwrap().remaining, 1);

        k.service_soft_timers();
        assert_eq!(c.load(Ordering::SeqCst), 3);
        assert_eq!(k.timer_info(b).unwrap().state, TimerState::Started);
    }
}
