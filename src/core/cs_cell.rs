//! Critical section protected kernel owner
//!
//! [`KernelCell`] is where a [`Kernel`] lives once the application has
//! built it. It can sit in a `static`, and every access goes through a
//! critical section, so task code and interrupt handlers see a consistent
//! kernel. Context switches requested while the kernel is borrowed are
//! taken as soon as the critical section ends.
//!
//! ```ignore
//! static KERNEL: KernelCell<CortexM4Port> = KernelCell::new();
//!
//! #[exception]
//! fn SysTick() {
//!     let _ = KERNEL.tick();
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::core::event::Pend;
use crate::core::kernel::Kernel;
use crate::error::{OsError, OsResult};
use crate::port::Port;
use crate::types::OsTick;

/// Single top-level owner of a kernel
pub struct KernelCell<P: Port> {
    inner: Mutex<RefCell<Option<Kernel<P>>>>,
}

impl<P: Port> KernelCell<P> {
    /// Create an empty cell
    pub const fn new() -> Self {
        KernelCell {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Move a kernel into the cell
    ///
    /// # Returns
    /// * `Err(OsError::StateInvalid)` - the cell already holds a kernel
    pub fn init(&self, kernel: Kernel<P>) -> OsResult<()> {
        critical_section::with(|cs| {
            let mut slot = self
                .inner
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| OsError::KernelBusy)?;

            if slot.is_some() {
                return Err(OsError::StateInvalid);
            }
            *slot = Some(kernel);
            Ok(())
        })
    }

    /// Run `f` on the kernel with interrupts disabled
    ///
    /// # Returns
    /// * `Err(OsError::OsNotInit)` - no kernel in the cell yet
    /// * `Err(OsError::KernelBusy)` - called from inside another `with`
    pub fn with<R, F>(&self, f: F) -> OsResult<R>
    where
        F: FnOnce(&mut Kernel<P>) -> OsResult<R>,
    {
        critical_section::with(|cs| {
            let mut slot = self
                .inner
                .borrow(cs)
                .try_borrow_mut()
                .map_err(|_| OsError::KernelBusy)?;

            let kernel = slot.as_mut().ok_or(OsError::OsNotInit)?;
            f(kernel)
        })
    }

    /// Run a pend and, if it blocked, collect the result after the switch
    ///
    /// The blocking task is switched out when the first critical section
    /// ends and continues into the second one once it has been woken.
    pub fn block_on<T, F>(&self, pend: F) -> OsResult<T>
    where
        F: FnOnce(&mut Kernel<P>) -> OsResult<Pend<T>>,
    {
        match self.with(pend)? {
            Pend::Ready(value) => Ok(value),
            Pend::Blocked(waiter) => self.with(move |k| k.resume(waiter)),
        }
    }

    /// Start multitasking; does not return on hardware ports
    pub fn start(&self) -> OsResult<()> {
        self.with(|k| k.start())
    }

    /// Tick entry point for the tick interrupt
    pub fn tick(&self) -> OsResult<()> {
        self.with(|k| {
            k.tick();
            Ok(())
        })
    }

    /// Delay the calling task
    pub fn delay(&self, ticks: OsTick) -> OsResult<()> {
        self.with(|k| k.task_delay(ticks))
    }
}

impl<P: Port> Default for KernelCell<P> {
    fn default() -> Self {
        Self::new()
    }
}
