//! Synchronization primitives
//!
//! Each primitive is a `Copy` handle into the kernel's object arena and a
//! policy layer over the shared event wait list.

#[cfg(feature = "sem")]
pub mod sem;

#[cfg(feature = "mutex")]
pub mod mutex;

#[cfg(feature = "mbox")]
pub mod mbox;

#[cfg(feature = "mem")]
pub mod mem_block;

#[cfg(feature = "flag")]
pub mod flag_group;
