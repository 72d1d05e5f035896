//! Generic size-bucketed allocator (`kmalloc`/`kfree`) built on top of the
//! cache layer in [`super`]. Every allocation is prefixed with a hidden
//! pointer to the bucket cache that owns it, so `kfree` can route the
//! pointer back to the right [`super::free`] call without the caller telling
//! it the size.

use core::mem::size_of;
use core::ptr::null_mut;

use log::info;

use super::{alloc, create, free, init_cache, registry_push, CacheHandle, KmemCache, BOOTSTRAP};

/// `2^KMALLOC_MIN_ORDER` is the smallest bucket size, in bytes.
pub const KMALLOC_MIN_ORDER: usize = 6;
/// `2^KMALLOC_MAX_ORDER` is the largest bucket size, in bytes.
pub const KMALLOC_MAX_ORDER: usize = 18;
const NBUCKETS: usize = KMALLOC_MAX_ORDER - KMALLOC_MIN_ORDER + 1;

const BUCKET_NAMES: [&str; NBUCKETS] = [
    "size-64", "size-128", "size-256", "size-512", "size-1024", "size-2048", "size-4096",
    "size-8192", "size-16384", "size-32768", "size-65536", "size-131072", "size-262144",
];

static mut BUCKETS: [CacheHandle; NBUCKETS] = [null_mut(); NBUCKETS];
static mut INITIALIZED: bool = false;

/// Installs the bootstrap cache and every `kmalloc` bucket cache. Must be
/// called exactly once, before any `create`/`kmalloc` call, and not from an
/// interrupt handler.
pub fn slab_init() {
    unsafe {
        debug_assert!(!INITIALIZED, "kmem: slab_init called twice");

        let ok = init_cache(&mut BOOTSTRAP, "kmem_cache", size_of::<KmemCache>());
        assert!(ok, "kmem: impossible to size the bootstrap cache");
        registry_push(core::ptr::addr_of_mut!(BOOTSTRAP));

        for i in 0..NBUCKETS {
            let size = 1usize << (KMALLOC_MIN_ORDER + i);
            let cache = create(BUCKET_NAMES[i], size);
            assert!(!cache.is_null(), "kmem: failed to create bucket '{}'", BUCKET_NAMES[i]);
            BUCKETS[i] = cache;
        }

        INITIALIZED = true;
    }

    info!(
        "kmem: slab_init done, buckets {}..{} bytes",
        1usize << KMALLOC_MIN_ORDER,
        1usize << KMALLOC_MAX_ORDER
    );
}

fn bucket_for(size: usize) -> Option<usize> {
    for i in 0..NBUCKETS {
        if (1usize << (KMALLOC_MIN_ORDER + i)) >= size {
            return Some(i);
        }
    }
    None
}

/// Allocates at least `size` bytes. Returns null on out-of-memory; panics if
/// `size` exceeds the largest bucket (an oversized `kmalloc` is a
/// configuration/programming error, not a recoverable condition).
pub fn kmalloc(size: usize) -> *mut u8 {
    let header = size_of::<CacheHandle>();
    let needed = size + header;
    let Some(i) = bucket_for(needed) else {
        panic!("kmalloc: size {} exceeds the largest bucket", size);
    };

    let cache = unsafe { BUCKETS[i] };
    let region = alloc(cache);
    if region.is_null() {
        return null_mut();
    }

    #[cfg(feature = "poison")]
    unsafe {
        core::ptr::write_bytes(region, super::POISON_ALLOC, needed);
    }

    unsafe {
        (region as *mut CacheHandle).write(cache);
        region.add(header)
    }
}

/// Frees a pointer previously returned by [`kmalloc`].
pub fn kfree(user_ptr: *mut u8) {
    let header = size_of::<CacheHandle>();
    unsafe {
        let region = user_ptr.sub(header);
        let cache = (region as *const CacheHandle).read();

        #[cfg(feature = "poison")]
        {
            let visible_len = (*cache).objsize - super::REDZONE_WORDS * size_of::<usize>();
            core::ptr::write_bytes(region, super::POISON_FREE, visible_len);
        }

        free(cache, region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::kmem::TEST_LOCK;

    // The backing page store is a monotonic bump allocator shared by the
    // whole test binary (see `pages::test_backing`); it is never reset once
    // `BOOTSTRAP`/`BUCKETS` are live, since rewinding it would hand out
    // addresses already owned by an earlier test's cache.
    fn ensure_init() {
        if unsafe { !INITIALIZED } {
            slab_init();
        }
    }

    #[test]
    fn routes_to_smallest_fitting_bucket_e4() {
        let _g = TEST_LOCK.lock_guard();
        ensure_init();
        let p = kmalloc(100);
        assert!(!p.is_null());
        let header = unsafe { (p.sub(size_of::<CacheHandle>()) as *const CacheHandle).read() };
        assert_eq!(unsafe { (*header).name() }, "size-128");
        kfree(p);
    }

    #[test]
    fn bootstrap_inuse_covers_every_bucket_e6() {
        let _g = TEST_LOCK.lock_guard();
        ensure_init();
        let inuse = unsafe { BOOTSTRAP.inuse() };
        assert!(inuse >= 1 + NBUCKETS);
    }
}
