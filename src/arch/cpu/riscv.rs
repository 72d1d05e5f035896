//! CPU registers operations and data definitions of the RISC-V platform.
//!
//! The real CSR accesses only assemble on a RISC-V target; under `cfg(test)`
//! this crate's tests build for the host, so a plain in-memory stand-in
//! backs the same interface there, mirroring how [`crate::mem::kmem::pages`]
//! substitutes a host-backed stand-in for the physical page allocator.

/// Supervisor Interrupt Enable bit within `sstatus`.
const SSTATUS_SIE: usize = 1 << 1;

/// Test whether the SIE bit is clear in a previously saved `sstatus` value.
pub fn check_irq_disabled_flags(flags: usize) -> bool {
    (flags & SSTATUS_SIE) == 0
}

#[cfg(target_arch = "riscv64")]
mod hw {
    use core::arch::asm;

    use super::SSTATUS_SIE;

    pub fn sstatus_read() -> usize {
        unsafe {
            let rval;
            asm!("csrr {}, sstatus", out(reg) rval);
            rval
        }
    }

    pub fn sstatus_write(val: usize) {
        unsafe {
            asm!("csrw sstatus, {}", in(reg) val);
        }
    }

    /// Enable interrupts on the current hart.
    pub fn sstatus_sti() {
        unsafe {
            asm!("csrs sstatus, {}", in(reg) SSTATUS_SIE);
        }
    }

    /// Disable interrupts on the current hart.
    pub fn sstatus_cli() {
        unsafe {
            asm!("csrc sstatus, {}", in(reg) SSTATUS_SIE);
        }
    }

    /// Atomically disable interrupts and return the prior `sstatus` value, so
    /// it can later be handed to [`sstatus_write`] to restore the old IRQ
    /// state.
    pub fn sstatus_cli_save() -> usize {
        unsafe {
            let rval;
            asm!("csrrc {}, sstatus, {}", out(reg) rval, in(reg) SSTATUS_SIE);
            rval
        }
    }
}

/// Host stand-in for the `sstatus` register used when this crate is built
/// for `cargo test` rather than a RISC-V target: a single process-wide word,
/// updated with the same read-modify-write semantics as the real CSR.
#[cfg(not(target_arch = "riscv64"))]
mod hw {
    use core::sync::atomic::{AtomicUsize, Ordering};

    use super::SSTATUS_SIE;

    static FAKE_SSTATUS: AtomicUsize = AtomicUsize::new(SSTATUS_SIE);

    pub fn sstatus_read() -> usize {
        FAKE_SSTATUS.load(Ordering::SeqCst)
    }

    pub fn sstatus_write(val: usize) {
        FAKE_SSTATUS.store(val, Ordering::SeqCst);
    }

    pub fn sstatus_sti() {
        FAKE_SSTATUS.fetch_or(SSTATUS_SIE, Ordering::SeqCst);
    }

    pub fn sstatus_cli() {
        FAKE_SSTATUS.fetch_and(!SSTATUS_SIE, Ordering::SeqCst);
    }

    pub fn sstatus_cli_save() -> usize {
        FAKE_SSTATUS.fetch_and(!SSTATUS_SIE, Ordering::SeqCst)
    }
}

pub use hw::{sstatus_cli, sstatus_cli_save, sstatus_read, sstatus_sti, sstatus_write};
