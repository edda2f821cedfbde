//! Port layer - CPU-specific implementations
//!
//! The kernel only ever asks the port to prime a fresh task stack, to
//! launch the first task and to switch from one saved stack-pointer slot to
//! another. The switch is fire-and-forget: the calling task resumes later
//! as if the request had simply returned.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

#[cfg(target_arch = "arm")]
pub use cortex_m4::CortexM4Port;

pub mod stub;

pub use stub::StubPort;

use crate::types::{OsStkElement, OsTaskFn};

/// Architecture hooks used by the scheduler
///
/// Stack-pointer slots live inside the kernel's task arena, so the kernel
/// must not move once [`Port::start`] has been called.
pub trait Port {
    /// Prime `stack` so that the first switch into it enters `entry(arg)`.
    ///
    /// Returns the initial saved stack pointer.
    fn init_stack(
        &mut self,
        entry: OsTaskFn,
        arg: *mut (),
        stack: &'static mut [OsStkElement],
    ) -> *mut OsStkElement;

    /// Launch the first task, whose saved stack pointer lives at `first`.
    fn start(&mut self, first: *mut *mut OsStkElement);

    /// Save the running context through `from` (null when nothing runs
    /// yet) and restore the one recorded at `to`.
    fn request_switch(&mut self, from: *mut *mut OsStkElement, to: *mut *mut OsStkElement);
}
