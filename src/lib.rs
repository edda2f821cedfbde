//! Tiny preemptive RTOS kernel in Rust
//!
//! A real-time operating system kernel providing:
//! - Priority-based preemptive scheduling with round-robin time slicing
//! - Synchronization primitives (semaphores, priority-inheritance mutexes,
//!   mailboxes, memory-block pools, event flag groups)
//! - Time management with a delta-encoded delay queue
//! - Hard and soft timers
//! - Context switching for ARM Cortex-M
//!
//! All kernel state lives in one [`Kernel`], normally kept in a static
//! [`KernelCell`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;
mod lang_items;

pub mod core;
pub mod sync;
pub mod port;

#[cfg(feature = "tmr")]
pub mod timer;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::cs_cell::KernelCell;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::event::{Pend, Waiter};
pub use crate::core::kernel;
pub use crate::core::kernel::Kernel;
pub use crate::core::prio;
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::task;
pub use crate::core::task::TaskInfo;
pub use crate::core::sched;
pub use crate::core::time;

pub use crate::port::Port;

#[cfg(feature = "sem")]
pub use sync::sem;
#[cfg(feature = "mutex")]
pub use sync::mutex;
#[cfg(feature = "mbox")]
pub use sync::mbox;
#[cfg(feature = "mem")]
pub use sync::mem_block;
#[cfg(feature = "flag")]
pub use sync::flag_group;
