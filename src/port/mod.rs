//! Port layer: the seam between the kernel state machine and a real
//! target.
//!
//! The kernel core never touches hardware. A port supplies three things:
//! a periodic tick source that calls [`crate::kernel::Kernel::tick`]
//! inside the ISR bracket, context save/restore for task bodies, and a
//! critical section (via the `critical-section` crate) guarding kernel
//! state against interrupt handlers.
//!
//! This module provides the target-independent piece: an optional
//! process-wide kernel instance behind `critical_section::Mutex`, so
//! interrupt handlers written as plain functions can reach the kernel
//! without threading `&mut Kernel` through hardware vector tables.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::kernel::Kernel;
use crate::types::YieldRequest;

static KERNEL: Mutex<RefCell<Option<Kernel>>> = Mutex::new(RefCell::new(None));

/// Install `kernel` as the process-wide instance. Returns the previous
/// instance if one was installed.
pub fn install(kernel: Kernel) -> Option<Kernel> {
    critical_section::with(|cs| KERNEL.borrow_ref_mut(cs).replace(kernel))
}

/// Remove and return the installed kernel.
pub fn uninstall() -> Option<Kernel> {
    critical_section::with(|cs| KERNEL.borrow_ref_mut(cs).take())
}

/// Run `f` against the installed kernel inside a critical section.
/// `None` when no kernel is installed.
///
/// `f` must not re-enter this module: the critical section does not
/// nest around the same cell.
pub fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> R) -> Option<R> {
    critical_section::with(|cs| {
        let mut slot = KERNEL.borrow_ref_mut(cs);
        slot.as_mut().map(f)
    })
}

/// Run one interrupt handler body under the full ISR bracket: enter,
/// run `f` folding its outcomes into the [`YieldRequest`], exit with at
/// most one context switch. Returns false when no kernel is installed.
pub fn interrupt(f: impl FnOnce(&mut Kernel, &mut YieldRequest)) -> bool {
    with_kernel(|kernel| {
        kernel.isr_enter();
        let mut request = YieldRequest::new();
        f(kernel, &mut request);
        kernel.isr_exit(request);
    })
    .is_some()
}
