//! Provides the necessary structs used by the **Rust `alloc` crate**.
//!
//! The global allocator allows us to use the data structures in the core library, such
//! as a linked list or B-tree, backed by the [`kmem`](super::kmem) slab layer.

use core::alloc::{GlobalAlloc, Layout};
use core::mem::size_of;
use core::ptr::null_mut;

use super::kmem::kmalloc::KMALLOC_MAX_ORDER;
use super::kmem::{kfree, kmalloc};

/// `kmalloc` buckets only guarantee the alignment of their smallest power-of-two
/// size; for a request wider than that, over-allocate and hand back a pointer
/// shifted up to the requested alignment, with the real `kmalloc` pointer
/// stashed in the word just before it for [`OsGlobalAlloc::dealloc`] to recover.
const NATURAL_ALIGN: usize = size_of::<usize>();

/// `kmalloc` panics on an oversized request (a programming error at that call
/// site); `GlobalAlloc` instead must return null, so callers here are guarded
/// against the largest bucket up front. Leaves room for `kmalloc`'s own hidden
/// cache-pointer header, which it adds on top of whatever is requested here.
const MAX_REQUEST: usize = (1usize << KMALLOC_MAX_ORDER) - size_of::<usize>();

// The global allocator is a static constant to a global allocator
// structure. We don't need any members because we're using this
// structure just to implement alloc and dealloc.
struct OsGlobalAlloc;

unsafe impl GlobalAlloc for OsGlobalAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() <= NATURAL_ALIGN {
            if layout.size() > MAX_REQUEST {
                return null_mut();
            }
            return kmalloc(layout.size());
        }

        let header = size_of::<usize>();
        let needed = layout.size() + layout.align() - 1 + header;
        if needed > MAX_REQUEST {
            return null_mut();
        }
        let raw = kmalloc(needed);
        if raw.is_null() {
            return null_mut();
        }

        let base = raw as usize + header;
        let aligned = (base + layout.align() - 1) & !(layout.align() - 1);
        ((aligned as *mut usize).sub(1)).write(raw as usize);
        aligned as *mut u8
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.align() <= NATURAL_ALIGN {
            kfree(ptr);
            return;
        }

        let raw = (ptr as *const usize).sub(1).read() as *mut u8;
        kfree(raw);
    }
}

#[cfg(not(test))]
#[global_allocator]
static GA: OsGlobalAlloc = OsGlobalAlloc {};

// If for some reason alloc() in the global allocator gets null_mut(), then we come here.
// This is a divergent function, so we call panic to let the tester know what's going on.
// #[alloc_error_handler]
// pub fn alloc_error(l: Layout) -> ! {
//     panic!(
//         "Allocator failed to allocate {} bytes with {}-byte alignment.",
//         l.size(),
//         l.align()
//     );
// }
// See unstable feature 'default_alloc_error_handler'.
