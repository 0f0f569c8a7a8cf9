//! Interrupt Descriptor Table
//!
//! Owns exactly the vectors the trap-demux and Kernel Recovery Mode need:
//! the `int 0x80` syscall gate, the preemption timer, and the five
//! exceptions that hand off to Kernel Recovery Mode. Every other vector is
//! left null — routing them is the boot collaborator's problem.

use core::arch::asm;
use spin::Mutex;

use crate::gdt::KERNEL_CS;
use crate::trap;

/// 32-bit IDT entry (8 bytes): split handler offset either side of a
/// selector/type-attribute pair.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

/// Present, 32-bit interrupt gate, ring-0 only.
const GATE_KERNEL: u8 = 0x8E;
/// Present, 32-bit interrupt gate, callable from ring 3.
const GATE_USER: u8 = 0xEE;

impl IdtEntry {
    const fn null() -> Self {
        IdtEntry {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, type_attr: u8) -> Self {
        IdtEntry {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CS,
            zero: 0,
            type_attr,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

struct Idt {
    entries: [IdtEntry; 256],
}

impl Idt {
    const fn new() -> Self {
        Idt {
            entries: [IdtEntry::null(); 256],
        }
    }

    fn set_handler(&mut self, vector: u8, handler: u32, type_attr: u8) {
        self.entries[vector as usize] = IdtEntry::new(handler, type_attr);
    }

    fn pointer(&self) -> IdtPointer {
        IdtPointer {
            limit: (core::mem::size_of::<Self>() - 1) as u16,
            base: self.entries.as_ptr() as u32,
        }
    }
}

static IDT: Mutex<Idt> = Mutex::new(Idt::new());

/// Vector this core routes to its KRM fault path. Exposed so
/// `aos-kernel::krm` can translate a `TrapFrame::vector` into a name
/// without duplicating the table.
pub const VECTOR_DIVIDE_BY_ZERO: u32 = 0;
pub const VECTOR_INVALID_OPCODE: u32 = 6;
pub const VECTOR_DOUBLE_FAULT: u32 = 8;
pub const VECTOR_GENERAL_PROTECTION: u32 = 13;
pub const VECTOR_PAGE_FAULT: u32 = 14;
pub const VECTOR_TIMER: u32 = 32;
pub const VECTOR_SYSCALL: u32 = 0x80;

/// Build the IDT and load it. Assumes the GDT is already live.
pub fn init() {
    let mut idt = IDT.lock();

    idt.set_handler(
        VECTOR_DIVIDE_BY_ZERO as u8,
        trap::isr_divide_by_zero as u32,
        GATE_KERNEL,
    );
    idt.set_handler(
        VECTOR_INVALID_OPCODE as u8,
        trap::isr_invalid_opcode as u32,
        GATE_KERNEL,
    );
    idt.set_handler(
        VECTOR_DOUBLE_FAULT as u8,
        trap::isr_double_fault as u32,
        GATE_KERNEL,
    );
    idt.set_handler(
        VECTOR_GENERAL_PROTECTION as u8,
        trap::isr_general_protection as u32,
        GATE_KERNEL,
    );
    idt.set_handler(
        VECTOR_PAGE_FAULT as u8,
        trap::isr_page_fault as u32,
        GATE_KERNEL,
    );
    idt.set_handler(VECTOR_TIMER as u8, trap::isr_timer as u32, GATE_KERNEL);
    // DPL 3: user-mode code issues `int 0x80` directly.
    idt.set_handler(VECTOR_SYSCALL as u8, trap::isr_syscall as u32, GATE_USER);

    let pointer = idt.pointer();

    unsafe {
        asm!(
            "lidt [{}]",
            in(reg) &pointer,
            options(readonly, nostack)
        );
    }
}
