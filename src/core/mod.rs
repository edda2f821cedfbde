//! Core RTOS modules
//!
//! Contains kernel, scheduler, task management, time management and the
//! event layer the synchronization primitives are built on.

pub mod config;
pub mod critical;
pub mod error;
pub mod list;
pub mod prio;
pub mod types;
pub mod kernel;
pub mod task;
pub mod sched;
pub mod time;
pub mod event;
pub mod cs_cell;
