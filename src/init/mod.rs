//! Kernel initialization operation and data.

mod early_init;

use core::ptr::null;

use crate::driver::of;
use crate::logk;
use crate::mem;

pub const COMMAND_LINE_SIZE: usize = 256;
/// Untouched command line saved by arch-special code.
pub static mut BOOT_COMMAND_LINE: [u8; COMMAND_LINE_SIZE] = [0u8; COMMAND_LINE_SIZE];

static mut DEVICE_TREE_BLOB: *const u8 = null();

/// Setup on boot time (Machine mode).
///
/// Parses the DeviceTree blob passed by the firmware and remembers its
/// address for [`kernel_setup`]; the kernel runs with an identity mapping
/// at this stage, so the blob does not need to be relocated.
pub fn boot_setup(boot_dtb: *const u8) -> usize {
    unsafe {
        DEVICE_TREE_BLOB = boot_dtb;
    }
    0
}

/// Setup on the boot CPU (hart id == 0) when the kernel start.
///
/// 1. Scan the `/chosen` node for the kernel command line.
/// 2. Init the physical memory management subsystem (page allocator and the
///    slab/`kmalloc` layer on top of it).
/// 3. Install the UART-backed logger.
pub fn kernel_setup() {
    let fdt = unsafe { of::fdt::parse_from_ptr::<'static>(DEVICE_TREE_BLOB) };
    let chosen = fdt.chosen();
    early_init::dt_scan_chosen(&chosen);

    let memory = fdt.memory();
    let reg_count = memory.regions().count();
    assert!(reg_count > 0, "No memory region");

    logk::init();
    mem::init();

    mem::page::print_page_allocations();
}
