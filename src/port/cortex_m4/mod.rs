//! Cortex-M4 port implementation
//!
//! Provides context switching via PendSV exception handler.

#![allow(named_asm_labels)]

use core::arch::naked_asm;
use core::ptr;

use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;

use super::Port;
use crate::core::critical::{critical_section, CriticalSection};
use crate::types::{OsStkElement, OsTaskFn};

/// Slot the interrupted context is saved through; null before the first task
#[no_mangle]
static mut OS_SW_FROM: *mut *mut OsStkElement = ptr::null_mut();

/// Slot the next context is restored from
static mut OS_SW_TO: *mut *mut OsStkElement = ptr::null_mut();

/// A PendSV is requested but has not run yet
static mut OS_SW_PENDING: bool = false;

/// PendSV based port for ARMv7E-M
pub struct CortexM4Port {
    _private: (),
}

impl CortexM4Port {
    pub const fn new() -> Self {
        CortexM4Port { _private: () }
    }

    /// Initialize SysTick timer for system tick generation
    ///
    /// # Arguments
    /// * `cnts` - Reload value
    ///
    /// # Example
    /// For 16MHz clock with 1000Hz tick rate: cnts = 16_000_000 / 1000 = 16_000
    pub fn systick_init(&mut self, cnts: u32) {
        let mut p = unsafe { cortex_m::Peripherals::steal() };

        p.SYST.set_reload(cnts - 1);
        p.SYST.clear_current();
        p.SYST.set_clock_source(SystClkSource::Core);
        p.SYST.enable_interrupt();
        p.SYST.enable_counter();
    }
}

impl Default for CortexM4Port {
    fn default() -> Self {
        Self::new()
    }
}

/// Context structure stored on stack
#[repr(C, align(4))]
struct SwFrame {
    r4: u32,
    r5: u32,
    r6: u32,
    r7: u32,
    r8: u32,
    r9: u32,
    r10: u32,
    r11: u32,
    exc_return: u32,  // LR value for exception return
    r0: u32,
    r1: u32,
    r2: u32,
    r3: u32,
    r12: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}
const FRAME_WORDS: usize = 17;

impl Port for CortexM4Port {
    fn init_stack(
        &mut self,
        entry: OsTaskFn,
        arg: *mut (),
        stack: &'static mut [OsStkElement],
    ) -> *mut OsStkElement {
        let stk_top = stack.as_mut_ptr_range().end;
        let stk_aligned = ((stk_top as usize) & !7) as *mut u32;

        // SAFETY: the kernel refuses stacks shorter than CFG_STK_SIZE_MIN,
        // which leaves room for the frame below the aligned top.
        unsafe {
            let frame_ptr = stk_aligned.sub(FRAME_WORDS) as *mut SwFrame;

            frame_ptr.write(SwFrame {
                r4: 0x04040404,
                r5: 0x05050505,
                r6: 0x06060606,
                r7: 0x07070707,
                r8: 0x08080808,
                r9: 0x09090909,
                r10: 0x10101010,
                r11: 0x11111111,
                exc_return: 0xFFFF_FFFD,
                r0: arg as u32,
                r1: 0,
                r2: 0,
                r3: 0,
                r12: 0,
                lr: os_task_return as *const () as u32,
                pc: (entry as usize as u32) | 1,
                xpsr: 0x0100_0000,
            });

            // One word below the frame to match PendSV's "add r0, r0, #4"
            (frame_ptr as *mut u32).sub(1) as *mut OsStkElement
        }
    }

    fn start(&mut self, first: *mut *mut OsStkElement) {
        unsafe {
            let mut scb = cortex_m::Peripherals::steal().SCB;

            // Set PendSV and SysTick priority to lowest
            scb.set_priority(SystemHandler::PendSV, 0xF0);
            scb.set_priority(SystemHandler::SysTick, 0xF0);
        }

        critical_section(|_cs| unsafe {
            OS_SW_FROM = ptr::null_mut();
            OS_SW_TO = first;
            OS_SW_PENDING = true;
        });

        SCB::set_pendsv();
    }

    fn request_switch(&mut self, from: *mut *mut OsStkElement, to: *mut *mut OsStkElement) {
        {
            let _cs = CriticalSection::enter();
            // A switch still in flight keeps saving into the slot of the
            // task that is physically running.
            unsafe {
                if !OS_SW_PENDING {
                    OS_SW_FROM = from;
                    OS_SW_PENDING = true;
                }
                OS_SW_TO = to;
            }
        }

        SCB::set_pendsv();
    }
}

/// Helper function called from PendSV to swap stack-pointer slots
/// Returns new task's stack pointer
#[inline(never)]
#[no_mangle]
unsafe extern "C" fn pendsv_switch_context(cur_sp: *mut u32) -> *mut u32 {
    unsafe {
        let from = OS_SW_FROM;
        if !from.is_null() {
            *from = cur_sp;
        }

        let to = OS_SW_TO;
        OS_SW_FROM = to;
        OS_SW_PENDING = false;

        if to.is_null() {
            ptr::null_mut()
        } else {
            *to
        }
    }
}

/// PendSV exception handler - performs full context switch
///
/// 1. Save R4-R11, LR to current task's PSP (skip if first task)
/// 2. Call switch_context to swap stack-pointer slots
/// 3. Restore R4-R11, LR from new task's stack
/// 4. Exception return
#[no_mangle]
#[unsafe(naked)]
pub unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "dsb",
        "isb",

        "mrs r0, psp",

        "ldr r1, ={sw_from}",
        "ldr r1, [r1]",
        "cbz r1, 1f",

        "stmdb r0!, {{r4-r11, lr}}",

        "sub r0, r0, #4",

        "1:",
        "bl pendsv_switch_context",

        "cbz r0, 2f",
        "add r0, r0, #4",
        "ldmia r0!, {{r4-r11, lr}}",

        "msr psp, r0",

        "2:",
        "cpsie i",
        "dsb",
        "isb",

        "bx lr",

        sw_from = sym OS_SW_FROM,
    );
}

/// Task return handler
#[no_mangle]
fn os_task_return() -> ! {
    loop {
        cortex_m::asm::wfi();
    }
}
