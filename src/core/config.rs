//! Compile-time configuration for the kernel
//!
//! These constants control the behavior and resource limits of the RTOS.

/// Number of priority levels (width of the ready bitmap)
pub const CFG_PRIO_MAX: usize = 32;

/// Maximum number of tasks, idle and timer task included
pub const CFG_TASK_MAX: usize = 32;

/// Maximum number of kernel objects (semaphores, mutexes, mailboxes, pools, flag groups)
pub const CFG_OBJ_MAX: usize = 32;

/// Maximum number of timers
pub const CFG_TMR_MAX: usize = 16;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Time slice, in ticks, given to a task before it is rotated behind its peers
pub const CFG_TIME_QUANTA_DEFAULT: u32 = 5;

/// Minimum task stack size in words
pub const CFG_STK_SIZE_MIN: usize = 64;

/// Enable round-robin scheduling for same-priority tasks
pub const CFG_SCHED_ROUND_ROBIN_EN: bool = true;

/// Idle task priority
pub const CFG_PRIO_IDLE: u8 = (CFG_PRIO_MAX - 1) as u8;

/// Default priority of the soft timer task
pub const CFG_TMR_TASK_PRIO: u8 = 1;
