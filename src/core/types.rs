//! Core type definitions for the kernel
//!
//! These types provide strong typing for RTOS primitives.

use bitflags::bitflags;

/// Task priority (0 = highest priority)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Semaphore counter type
pub type OsSemCtr = u32;

/// Nesting counter
pub type OsNestingCtr = u8;

/// Stack element type
pub type OsStkElement = u32;

/// Event flags type
pub type OsFlags = u32;

/// Opaque message carried by mailboxes and wake-ups
pub type OsMsg = *mut ();

/// Task entry point function type
pub type OsTaskFn = fn(*mut ()) -> !;

/// Cleanup callback run when a task is deleted
pub type OsCleanFn = fn(*mut ());

/// Timer expiry callback
pub type OsTmrCallback = fn(*mut ());

// ============ Handles ============

/// Handle of a task slot in the kernel's task arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) usize);

impl TaskId {
    /// Arena index of this task
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Handle of a kernel object slot (semaphore, mutex, mailbox, pool or flag group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub(crate) usize);

impl ObjId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Handle of a timer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) usize);

impl TimerId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

// ============ Task state ============

bitflags! {
    /// Task state flags
    ///
    /// An empty set means the task is ready. Delay and wait flags combine
    /// for a bounded wait, which sits on the delay queue and on a wait list.
    pub struct OsTaskState: u32 {
        /// Task slot holds no live task
        const DESTROYED = 1 << 0;
        /// Task is in the delay queue
        const DELAYED = 1 << 1;
        /// Task is suspended
        const SUSPENDED = 1 << 2;

        const WAIT_SEM = 1 << 16;
        const WAIT_MUTEX = 1 << 17;
        const WAIT_MBOX = 1 << 18;
        const WAIT_MEM = 1 << 19;
        const WAIT_FLAG = 1 << 20;

        /// Any event wait
        const WAIT_MASK = Self::WAIT_SEM.bits
            | Self::WAIT_MUTEX.bits
            | Self::WAIT_MBOX.bits
            | Self::WAIT_MEM.bits
            | Self::WAIT_FLAG.bits;
    }
}

impl OsTaskState {
    /// Task sits in the ready table
    #[inline]
    pub fn is_ready(self) -> bool {
        self.is_empty()
    }

    #[inline]
    pub fn is_waiting(self) -> bool {
        self.intersects(Self::WAIT_MASK)
    }
}

/// Kernel object type marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OsObjType {
    None = 0,
    Flag = 0x464C4147,    // 'FLAG'
    Mem = 0x4D454D20,     // 'MEM '
    Mutex = 0x4D555458,   // 'MUTX'
    Mbox = 0x4D424F58,    // 'MBOX'
    Sem = 0x53454D41,     // 'SEMA'
}

impl OsObjType {
    /// Task state flag set while a task waits on an object of this type
    pub fn wait_flag(self) -> OsTaskState {
        match self {
            OsObjType::None => OsTaskState::empty(),
            OsObjType::Flag => OsTaskState::WAIT_FLAG,
            OsObjType::Mem => OsTaskState::WAIT_MEM,
            OsObjType::Mutex => OsTaskState::WAIT_MUTEX,
            OsObjType::Mbox => OsTaskState::WAIT_MBOX,
            OsObjType::Sem => OsTaskState::WAIT_SEM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_is_empty_state() {
        let mut state = OsTaskState::empty();
        assert!(state.is_ready());

        state |= OsTaskState::DELAYED | OsTaskState::WAIT_SEM;
        assert!(!state.is_ready());
        assert!(state.is_waiting());

        state.remove(OsTaskState::WAIT_MASK);
        assert!(!state.is_waiting());
        assert_eq!(state, OsTaskState::DELAYED);
    }

    #[test]
    fn wait_flag_per_object_type() {
        assert_eq!(OsObjType::Sem.wait_flag(), OsTaskState::WAIT_SEM);
        assert_eq!(OsObjType::Flag.wait_flag(), OsTaskState::WAIT_FLAG);
        assert!(OsObjType::None.wait_flag().is_empty());
        assert!(OsTaskState::WAIT_MASK.contains(OsObjType::Mem.wait_flag()));
    }
}
