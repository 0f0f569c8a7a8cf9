//! Trap entry stubs
//!
//! Every vector this core owns funnels through one of two common paths:
//! `common_trap_entry` for the syscall gate and the timer, which return to
//! the interrupted context, and `common_fault_entry` for the five
//! KRM-feeding exceptions, which never return. Both build an
//! [`aos_lib::trap::TrapFrame`] on the stack and hand a pointer to it
//! across the crate boundary to a symbol the kernel crate defines — this
//! crate never links against `aos-kernel` directly, so `sym` resolution
//! happens only at the final binary's link step.

use core::arch::naked_asm;

use aos_lib::trap::TrapFrame;

unsafe extern "C" {
    /// Handle the syscall gate (vector 0x80) or the preemption timer
    /// (vector 32). Defined in the kernel crate; may mutate `frame.eax`
    /// to set a syscall's return value.
    fn aos_trap_dispatch(frame: *mut TrapFrame);

    /// Hand a fatal exception to Kernel Recovery Mode. Defined in the
    /// kernel crate. Never returns.
    fn aos_krm_enter(frame: *const TrapFrame) -> !;
}

#[unsafe(naked)]
unsafe extern "C" fn common_trap_entry() {
    naked_asm!(
        "push esp",
        "call {0}",
        "add esp, 4",
        "popa",
        "add esp, 8",
        "iretd",
        sym aos_trap_dispatch,
    )
}

#[unsafe(naked)]
unsafe extern "C" fn common_fault_entry() -> ! {
    naked_asm!(
        "push esp",
        "call {0}",
        sym aos_krm_enter,
    )
}

macro_rules! fault_stub {
    ($name:ident, $vector:literal, no_error_code) => {
        #[unsafe(naked)]
        pub(crate) unsafe extern "C" fn $name() {
            naked_asm!(
                "push 0",
                concat!("push ", $vector),
                "pusha",
                "jmp {0}",
                sym common_fault_entry,
            )
        }
    };
    ($name:ident, $vector:literal, has_error_code) => {
        #[unsafe(naked)]
        pub(crate) unsafe extern "C" fn $name() {
            naked_asm!(
                concat!("push ", $vector),
                "pusha",
                "jmp {0}",
                sym common_fault_entry,
            )
        }
    };
}

fault_stub!(isr_divide_by_zero, 0, no_error_code);
fault_stub!(isr_invalid_opcode, 6, no_error_code);
fault_stub!(isr_double_fault, 8, has_error_code);
fault_stub!(isr_general_protection, 13, has_error_code);
fault_stub!(isr_page_fault, 14, has_error_code);

#[unsafe(naked)]
pub(crate) unsafe extern "C" fn isr_timer() {
    naked_asm!(
        "push 0",
        "push 32",
        "pusha",
        "jmp {0}",
        sym common_trap_entry,
    )
}

#[unsafe(naked)]
pub(crate) unsafe extern "C" fn isr_syscall() {
    naked_asm!(
        "push 0",
        "push 0x80",
        "pusha",
        "jmp {0}",
        sym common_trap_entry,
    )
}
