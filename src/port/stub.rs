//! Host port for testing
//!
//! Never touches a register. It records how often the kernel started and
//! switched so tests can observe scheduling decisions.

use core::ptr;

use super::Port;
use crate::types::{OsStkElement, OsTaskFn};

/// Port that only counts requests
#[derive(Debug)]
pub struct StubPort {
    started: bool,
    switches: u32,
    last_to: *mut *mut OsStkElement,
}

// SAFETY: the recorded slot pointer is only compared, never dereferenced.
unsafe impl Send for StubPort {}

impl StubPort {
    pub const fn new() -> Self {
        StubPort {
            started: false,
            switches: 0,
            last_to: ptr::null_mut(),
        }
    }

    pub fn started(&self) -> bool {
        self.started
    }

    /// Number of switch requests since start
    pub fn switches(&self) -> u32 {
        self.switches
    }

    /// Slot handed to the most recent start or switch
    pub fn last_target(&self) -> *mut *mut OsStkElement {
        self.last_to
    }
}

impl Default for StubPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for StubPort {
    fn init_stack(
        &mut self,
        _entry: OsTaskFn,
        _arg: *mut (),
        stack: &'static mut [OsStkElement],
    ) -> *mut OsStkElement {
        // Top of stack; nothing runs on it
        stack.as_mut_ptr_range().end
    }

    fn start(&mut self, first: *mut *mut OsStkElement) {
        self.started = true;
        self.last_to = first;
    }

    fn request_switch(&mut self, _from: *mut *mut OsStkElement, to: *mut *mut OsStkElement) {
        self.switches += 1;
        self.last_to = to;
    }
}
