//! Error types for the kernel
//!
//! Uses Rust's Result pattern instead of C-style error codes. Success is
//! `Ok(..)`; every failure a caller can observe is an [`OsError`].

use core::fmt;

/// RTOS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ Wait outcomes ============
    /// Bounded wait expired unsatisfied
    Timeout = 1001,
    /// Non-blocking attempt found nothing available
    ResourceUnavailable = 1002,
    /// Bounded buffer or pool has no room for a new item
    ResourceFull = 1003,
    /// Object was destroyed while the task waited on it
    Deleted = 1004,
    /// Caller does not hold the mutex it tried to release
    NotOwner = 1005,

    // ============ ISR errors ============
    /// Cannot wait from ISR
    PendIsr = 10001,

    // ============ Memory errors ============
    /// Block size smaller than a free-list node
    BlockSizeInvalid = 22201,
    /// Block does not belong to the pool it is returned to
    MemInvalidAddr = 22203,

    // ============ Mutex errors ============
    /// Mutex nesting overflow
    MutexOvf = 22404,

    // ============ Object errors ============
    /// Handle does not refer to an object of the expected type
    ObjType = 24004,
    /// No free object slot left
    ObjPoolEmpty = 24005,

    // ============ OS state errors ============
    /// OS is not running
    OsNotRunning = 24201,
    /// OS is already running
    OsRunning = 24202,
    /// OS not initialized
    OsNotInit = 24203,
    /// Kernel is already borrowed by the caller
    KernelBusy = 24205,

    // ============ Priority errors ============
    /// Invalid priority
    PrioInvalid = 25203,

    // ============ Scheduler errors ============
    /// Scheduler is locked
    SchedLocked = 28003,
    /// Scheduler is not locked
    SchedNotLocked = 28004,

    // ============ State errors ============
    /// Invalid state
    StateInvalid = 28205,
    /// Invalid stack size
    StkSizeInvalid = 28208,

    // ============ Task errors ============
    /// Cannot delete idle task
    TaskDelIdle = 29004,
    /// No more TCBs available
    TaskNoMoreTcb = 29008,
    /// Task does not exist
    TaskNotExist = 29010,
    /// Task is not suspended
    TaskNotSuspended = 29011,
    /// Cannot suspend idle task
    TaskSuspendIdle = 29019,

    // ============ Timer errors ============
    /// Timer is in the wrong state for the request
    TmrInvalidState = 29505,
}

/// Result type alias for RTOS operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Numeric error code
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OsError::Timeout => "wait timed out",
            OsError::ResourceUnavailable => "resource unavailable",
            OsError::ResourceFull => "resource full",
            OsError::Deleted => "object deleted while waiting",
            OsError::NotOwner => "caller does not own the mutex",
            OsError::PendIsr => "cannot wait from interrupt context",
            OsError::BlockSizeInvalid => "block size smaller than a free-list node",
            OsError::MemInvalidAddr => "block outside the pool",
            OsError::MutexOvf => "mutex nesting overflow",
            OsError::ObjType => "handle refers to a different object type",
            OsError::ObjPoolEmpty => "no free object slot",
            OsError::OsNotRunning => "kernel not running",
            OsError::OsRunning => "kernel already running",
            OsError::OsNotInit => "kernel not initialized",
            OsError::KernelBusy => "kernel already borrowed",
            OsError::PrioInvalid => "invalid priority",
            OsError::SchedLocked => "scheduler locked",
            OsError::SchedNotLocked => "scheduler not locked",
            OsError::StateInvalid => "invalid task state",
            OsError::StkSizeInvalid => "stack too small",
            OsError::TaskDelIdle => "idle task cannot be deleted",
            OsError::TaskNoMoreTcb => "no free task slot",
            OsError::TaskNotExist => "task does not exist",
            OsError::TaskNotSuspended => "task not suspended",
            OsError::TaskSuspendIdle => "idle task cannot be suspended",
            OsError::TmrInvalidState => "invalid timer state",
        };
        write!(f, "{} ({})", msg, self.code())
    }
}
