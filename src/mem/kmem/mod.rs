//! Slab-based object allocator.
//!
//! A cache (a.k.a. slab allocator) serves fixed-size objects out of page runs
//! ("slabs"). Each slab is carved into `N` object slots, every slot followed by
//! a [`Bufctl`] trailer; unallocated slots are threaded onto the slab's free
//! list through that trailer. The descriptor allocator itself (the allocator
//! that hands out [`KmemCache`] descriptors for newly created caches) is a
//! bootstrap cache of its own, so the whole system is self-hosting after
//! [`kmalloc::slab_init`] runs once.
//!
//! This module only implements the cache/slab layer; the size-bucketed
//! `kmalloc`/`kfree` front-end lives in [`kmalloc`].

pub(crate) mod kmalloc;
pub(crate) mod pages;

pub use kmalloc::{kfree, kmalloc, slab_init};

/// Alias for [`slab_init`], matching the naming every other subsystem under
/// [`crate::mem`] uses for its one-time bring-up entry point.
pub fn init() {
    slab_init();
}

use core::mem::size_of;
use core::ptr::null_mut;

use log::{debug, error, trace, warn};
use static_assertions as sa;

use crate::base::irq;
use crate::base::sync::spin_lock::SpinLockPure;

/// Highest page-run order (`PAGE_SIZE * 2^order`) a cache's slabs may use.
pub const SLAB_MAX_ORDER: usize = 5;
/// Number of distinct page-run sizes the page allocator is assumed to support;
/// bounds the search in [`calc_slab_size`].
pub const PAGE_NSIZES: usize = SLAB_MAX_ORDER + 1;

// A bufctl must be able to hold at least one pointer-sized link.
sa::const_assert!(size_of::<BufctlLink>() >= size_of::<usize>());

#[cfg(feature = "poison")]
const POISON_ALLOC: u8 = 0xAA;
#[cfg(feature = "poison")]
const POISON_FREE: u8 = 0xDD;

#[cfg(feature = "redzone")]
const REDZONE_WORDS: usize = 2;
#[cfg(feature = "redzone")]
const SLAB_REDZONE: usize = usize::from_ne_bytes([0xA5u8; size_of::<usize>()]);
#[cfg(feature = "redzone")]
const FRONT_PAD: usize = size_of::<usize>();
#[cfg(not(feature = "redzone"))]
const REDZONE_WORDS: usize = 0;
#[cfg(not(feature = "redzone"))]
const FRONT_PAD: usize = 0;

/// Per-slot trailer. While the object is free, `link.next_free` threads the
/// slab's free list; while it is allocated, `link.slab` points back at the
/// owning [`Slab`] so [`free`] can find it from the pointer alone.
#[repr(C)]
struct Bufctl {
    link: BufctlLink,
    #[cfg(feature = "free_check")]
    free: bool,
}

#[repr(C)]
union BufctlLink {
    next_free: *mut Bufctl,
    slab: *mut Slab,
}

/// One page run, carved into `N` object-slot-plus-[`Bufctl`] pairs with this
/// header placed immediately after the last pair.
#[repr(C)]
struct Slab {
    next: *mut Slab,
    inuse: usize,
    free: *mut Bufctl,
    addr: usize,
}

/// A named collection of slabs serving one object size.
#[repr(C)]
pub struct KmemCache {
    name: &'static str,
    /// Object size including any red-zone padding (`S'` in the sizing design).
    objsize: usize,
    slabs: *mut Slab,
    order: usize,
    slab_nobjs: usize,
    next: *mut KmemCache,
    lock: SpinLockPure,
}

unsafe impl Sync for KmemCache {}

impl KmemCache {
    const fn uninit() -> Self {
        Self {
            name: "<unnamed>",
            objsize: 0,
            slabs: null_mut(),
            order: 0,
            slab_nobjs: 0,
            next: null_mut(),
            lock: SpinLockPure::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total count of allocated objects across every slab on this cache.
    pub fn inuse(&self) -> usize {
        let flags = irq::local_irq_save();
        self.lock.lock();
        let mut total = 0usize;
        let mut slab = self.slabs;
        unsafe {
            while !slab.is_null() {
                total += (*slab).inuse;
                slab = (*slab).next;
            }
        }
        self.lock.unlock();
        irq::local_irq_restore(flags);
        total
    }
}

/// Handle to a live cache. Null is the "no cache" / allocation-failed value,
/// matching every other fallible pointer-returning entry point in this kernel.
pub type CacheHandle = *mut KmemCache;

/// Bootstrap cache: object size is `sizeof(KmemCache)`, used to allocate every
/// other cache's descriptor. Initialized once by [`kmalloc::slab_init`].
static mut BOOTSTRAP: KmemCache = KmemCache::uninit();

/// Head of the singly linked list of every live cache, threaded through
/// [`KmemCache::next`]. Read-mostly; exposed for debugger-script walkers.
static mut CACHE_REGISTRY: *mut KmemCache = null_mut();
static REGISTRY_LOCK: SpinLockPure = SpinLockPure::new();

fn registry_push(cache: *mut KmemCache) {
    let flags = irq::local_irq_save();
    REGISTRY_LOCK.lock();
    unsafe {
        (*cache).next = CACHE_REGISTRY;
        CACHE_REGISTRY = cache;
    }
    REGISTRY_LOCK.unlock();
    irq::local_irq_restore(flags);
}

/// Returns the head of the cache registry, for debugger-script walkers.
pub fn registry_head() -> *mut KmemCache {
    unsafe { CACHE_REGISTRY }
}

// ---------------------------------------------------------------------------
// Sizing (waste minimization), see the design notes on slab growth tradeoffs.
// ---------------------------------------------------------------------------

const fn slab_size(n: usize, objsize: usize) -> usize {
    n * (objsize + size_of::<Bufctl>()) + size_of::<Slab>()
}

const fn nobjs(order: usize, objsize: usize) -> usize {
    let page_bytes = pages::PAGE_SIZE << order;
    if page_bytes <= size_of::<Slab>() {
        0
    } else {
        (page_bytes - size_of::<Slab>()) / (objsize + size_of::<Bufctl>())
    }
}

const fn waste(order: usize, objsize: usize) -> usize {
    let n = nobjs(order, objsize);
    (pages::PAGE_SIZE << order) - slab_size(n, objsize)
}

/// Picks the page-run order minimizing waste for objects of `objsize` bytes,
/// per the order search in the slab sizing design. Returns `(order, nobjs)`,
/// or `None` if no order within [`PAGE_NSIZES`] can even fit one object plus
/// the slab header.
fn calc_slab_size(objsize: usize) -> Option<(usize, usize)> {
    let mut minorder = None;
    for order in 0..PAGE_NSIZES {
        if (pages::PAGE_SIZE << order) >= slab_size(1, objsize) {
            minorder = Some(order);
            break;
        }
    }
    let minorder = minorder?;

    let mut best = minorder;
    let mut best_waste = waste(minorder, objsize);
    for order in (minorder + 1)..SLAB_MAX_ORDER.min(PAGE_NSIZES) {
        let w = waste(order, objsize);
        if w < best_waste {
            best = order;
            best_waste = w;
        }
    }

    let n = nobjs(best, objsize);
    if n == 0 {
        None
    } else {
        Some((best, n))
    }
}

// ---------------------------------------------------------------------------
// Cache lifecycle
// ---------------------------------------------------------------------------

/// Initializes `cache` in place as a cache for objects of `size` bytes. Shared
/// by both the bootstrap cache and every cache produced by [`create`].
fn init_cache(cache: &mut KmemCache, name: &'static str, size: usize) -> bool {
    #[cfg(feature = "redzone")]
    let objsize = size + REDZONE_WORDS * size_of::<usize>();
    #[cfg(not(feature = "redzone"))]
    let objsize = size;

    let Some((order, n)) = calc_slab_size(objsize) else {
        error!("kmem: {} objects of size {} have no valid slab order", name, size);
        return false;
    };

    cache.name = name;
    cache.objsize = objsize;
    cache.slabs = null_mut();
    cache.order = order;
    cache.slab_nobjs = n;
    cache.next = null_mut();
    cache.lock = SpinLockPure::new();

    debug!(
        "kmem: cache '{}' objsize={} order={} slab_nobjs={}",
        name, objsize, order, n
    );
    true
}

/// Creates a new cache for objects of `size` bytes. Returns null on
/// out-of-memory (bootstrap cache exhausted) or if `size` cannot be satisfied
/// by any supported slab order.
pub fn create(name: &'static str, size: usize) -> CacheHandle {
    let raw = alloc(unsafe { core::ptr::addr_of_mut!(BOOTSTRAP) });
    if raw.is_null() {
        return null_mut();
    }
    let cache = raw as *mut KmemCache;
    let ok = unsafe { init_cache(&mut *cache, name, size) };
    if !ok {
        free(unsafe { core::ptr::addr_of_mut!(BOOTSTRAP) }, raw);
        return null_mut();
    }
    registry_push(cache);
    cache
}

/// Destroys a cache, returning its descriptor to the bootstrap allocator.
///
/// The cache must have no outstanding slabs (see the design notes on the
/// destroy/outstanding-slabs decision); violating this is a caller bug, not a
/// condition this function tries to silently paper over, so it is a debug
/// assertion rather than a best-effort walk-and-free.
pub fn destroy(cache: CacheHandle) {
    unsafe {
        debug_assert!(
            (*cache).slabs.is_null(),
            "kmem: destroy '{}' with outstanding slabs",
            (*cache).name
        );
        debug!("kmem: destroy cache '{}'", (*cache).name);
    }
    free(unsafe { core::ptr::addr_of_mut!(BOOTSTRAP) }, cache as *mut u8);
}

// ---------------------------------------------------------------------------
// Slab growth
// ---------------------------------------------------------------------------

/// Acquires a fresh page run for `cache`, threads its free list, and pushes it
/// onto the cache's slab list. Returns `false` if the page allocator is
/// exhausted; this is a recoverable, expected condition, never a panic.
///
/// Ordering matters here: the free list must be fully threaded before the
/// slab header is written and the slab is linked where `alloc` can see it.
fn grow(cache: &mut KmemCache) -> bool {
    let Some(addr) = pages::page_alloc_n(cache.order) else {
        warn!(
            "kmem: cache '{}' out of memory growing at order {}",
            cache.name, cache.order
        );
        return false;
    };

    let stride = cache.objsize + size_of::<Bufctl>();
    let n = cache.slab_nobjs;

    unsafe {
        for i in 0..n {
            let slot = addr + i * stride;
            let bufctl = (slot + cache.objsize) as *mut Bufctl;
            let next_free = if i + 1 < n {
                (addr + (i + 1) * stride + cache.objsize) as *mut Bufctl
            } else {
                null_mut()
            };
            (*bufctl).link.next_free = next_free;
            #[cfg(feature = "free_check")]
            {
                (*bufctl).free = true;
            }

            #[cfg(feature = "redzone")]
            {
                let words = slot as *mut usize;
                let last = (slot + cache.objsize - size_of::<usize>()) as *mut usize;
                *words = SLAB_REDZONE;
                *last = SLAB_REDZONE;
            }
        }

        let slab = (addr + n * stride) as *mut Slab;
        (*slab).addr = addr;
        (*slab).free = addr as *mut Bufctl;
        (*slab).inuse = 0;
        (*slab).next = cache.slabs;
        cache.slabs = slab;
    }

    trace!("kmem: cache '{}' grew by one slab at {:#x}", cache.name, addr);
    true
}

// ---------------------------------------------------------------------------
// Alloc / free fast paths
// ---------------------------------------------------------------------------

#[inline(never)]
fn hook_slab_obj_alloc(_cache: CacheHandle, _obj: *mut u8) {}

#[inline(never)]
fn hook_slab_obj_free(_cache: CacheHandle, _obj: *mut u8) {}

/// Returns one object from `cache`, growing the cache if every existing slab
/// is full. Null means the page allocator is exhausted.
pub fn alloc(cache: CacheHandle) -> *mut u8 {
    let flags = irq::local_irq_save();
    let c = unsafe { &mut *cache };
    c.lock.lock();

    let mut slab = c.slabs;
    unsafe {
        while !slab.is_null() && (*slab).inuse >= c.slab_nobjs {
            slab = (*slab).next;
        }

        if slab.is_null() {
            if !grow(c) {
                c.lock.unlock();
                irq::local_irq_restore(flags);
                return null_mut();
            }
            slab = c.slabs;
        }

        let bufctl = (*slab).free;
        (*slab).free = (*bufctl).link.next_free;
        (*bufctl).link.slab = slab;
        #[cfg(feature = "free_check")]
        {
            (*bufctl).free = false;
        }
        (*slab).inuse += 1;

        let slot_origin = bufctl as usize - c.objsize;

        #[cfg(feature = "redzone")]
        {
            let first = *(slot_origin as *const usize);
            let last = *((slot_origin + c.objsize - size_of::<usize>()) as *const usize);
            if first != SLAB_REDZONE || last != SLAB_REDZONE {
                error!(
                    "kmem: red-zone corruption in cache '{}' at {:#x}",
                    c.name, slot_origin
                );
                panic!("slab red-zone corruption in cache '{}'", c.name);
            }
        }

        let visible = slot_origin + FRONT_PAD;

        c.lock.unlock();
        irq::local_irq_restore(flags);

        let ret = visible as *mut u8;
        hook_slab_obj_alloc(cache, ret);
        ret
    }
}

/// Returns `ptr` (previously produced by `alloc(cache)`) to `cache`. `cache`
/// is authoritative; passing the wrong cache for `ptr` corrupts that cache's
/// free-list topology.
pub fn free(cache: CacheHandle, ptr: *mut u8) {
    let flags = irq::local_irq_save();
    let c = unsafe { &mut *cache };
    c.lock.lock();

    unsafe {
        let slot_origin = (ptr as usize) - FRONT_PAD;

        #[cfg(feature = "redzone")]
        {
            let first = *(slot_origin as *const usize);
            let last = *((slot_origin + c.objsize - size_of::<usize>()) as *const usize);
            if first != SLAB_REDZONE || last != SLAB_REDZONE {
                error!(
                    "kmem: red-zone corruption freeing {:#x} in cache '{}'",
                    slot_origin, c.name
                );
                panic!("slab red-zone corruption in cache '{}'", c.name);
            }
        }

        let bufctl = (slot_origin + c.objsize) as *mut Bufctl;

        #[cfg(feature = "free_check")]
        {
            if (*bufctl).free {
                error!("kmem: double free of {:#x} in cache '{}'", slot_origin, c.name);
                panic!("slab double free in cache '{}'", c.name);
            }
            (*bufctl).free = true;
        }

        let slab = (*bufctl).link.slab;
        (*bufctl).link.next_free = (*slab).free;
        (*slab).free = bufctl;
        (*slab).inuse -= 1;
    }

    c.lock.unlock();
    irq::local_irq_restore(flags);
    hook_slab_obj_free(cache, ptr);
}

/// Reclaim is deliberately unimplemented: safely unlinking an empty slab
/// requires a protocol ensuring no other processor is mid-allocation on it,
/// which this allocator does not yet have. Calling it is a caller bug.
pub fn reclaim(_target: usize) -> usize {
    error!("kmem: slab_allocators_reclaim invoked but is not implemented");
    panic!("slab_allocators_reclaim NYI for SMP");
}

/// Serializes tests that touch the shared bootstrap cache / registry /
/// bucket statics, since `cargo test` runs test functions on multiple
/// threads by default and those statics are process-wide.
#[cfg(test)]
pub(crate) static TEST_LOCK: SpinLockPure = SpinLockPure::new();

#[cfg(test)]
mod tests {
    use super::*;

    // `create` allocates cache descriptors out of `BOOTSTRAP`, so it must be
    // initialized before any test calls `create`. Idempotent: every test in
    // this binary shares the one `BOOTSTRAP` static.
    fn ensure_bootstrap() {
        unsafe {
            if BOOTSTRAP.objsize == 0 {
                let ok = init_cache(&mut BOOTSTRAP, "kmem_cache", size_of::<KmemCache>());
                assert!(ok, "bootstrap cache failed to size");
            }
        }
    }

    #[test]
    fn sizing_matches_e1() {
        let _g = TEST_LOCK.lock_guard();
        // With a 16-byte bufctl and a 32-byte Slab header on a 4096-byte page,
        // 32-byte objects give minorder = 0, N = 84, waste = 32 (spec E1).
        assert_eq!(size_of::<Slab>(), 32);
        let objsize = 32usize;
        let (order, n) = calc_slab_size(objsize).unwrap();
        let b = size_of::<Bufctl>();
        let expect_n = (pages::PAGE_SIZE - size_of::<Slab>()) / (objsize + b);
        assert_eq!(order, 0);
        assert_eq!(n, expect_n);
        for o in 1..=4 {
            assert!(waste(order, objsize) <= waste(o, objsize));
        }
    }

    #[test]
    fn alloc_free_round_trip() {
        let _g = TEST_LOCK.lock_guard();
        ensure_bootstrap();
        let cache = create("test-roundtrip", 32);
        assert!(!cache.is_null());
        let before = unsafe { (*cache).inuse() };
        let p = alloc(cache);
        assert!(!p.is_null());
        free(cache, p);
        assert_eq!(unsafe { (*cache).inuse() }, before);
    }

    #[test]
    fn lifo_free_list_e3() {
        let _g = TEST_LOCK.lock_guard();
        ensure_bootstrap();
        let cache = create("test-lifo", 32);
        let p = alloc(cache);
        free(cache, p);
        let q = alloc(cache);
        assert_eq!(p, q);
    }

    #[test]
    fn no_aliasing_within_slab() {
        let _g = TEST_LOCK.lock_guard();
        ensure_bootstrap();
        let cache = create("test-alias", 32);
        let p1 = alloc(cache) as usize;
        let p2 = alloc(cache) as usize;
        let stride = unsafe { (*cache).objsize } + size_of::<Bufctl>();
        assert!(p1.abs_diff(p2) >= stride);
    }

    #[test]
    fn growth_monotonic_nobjs() {
        let _g = TEST_LOCK.lock_guard();
        ensure_bootstrap();
        let cache = create("test-growth", 48);
        let n = unsafe { (*cache).slab_nobjs };
        for _ in 0..(n + 1) {
            alloc(cache);
        }
        assert_eq!(unsafe { (*cache).slab_nobjs }, n);
    }

    #[test]
    fn growth_triggers_new_slab_e2() {
        let _g = TEST_LOCK.lock_guard();
        ensure_bootstrap();
        let cache = create("test-growth-e2", 32);
        let n = unsafe { (*cache).slab_nobjs };
        for _ in 0..n {
            assert!(!alloc(cache).is_null());
        }
        let first_slab = unsafe { (*cache).slabs };
        assert_eq!(unsafe { (*first_slab).inuse }, n);
        assert!(unsafe { (*first_slab).next }.is_null());

        // The (n+1)th alloc must grow a second slab rather than fail.
        let p = alloc(cache);
        assert!(!p.is_null());
        let head = unsafe { (*cache).slabs };
        assert_ne!(head, first_slab);
        assert_eq!(unsafe { (*head).inuse }, 1);
        assert_eq!(unsafe { (*first_slab).inuse }, n);
    }

    #[cfg(feature = "free_check")]
    #[test]
    #[should_panic(expected = "double free")]
    fn double_free_is_fatal() {
        let _g = TEST_LOCK.lock_guard();
        ensure_bootstrap();
        let cache = create("test-double-free", 32);
        let p = alloc(cache);
        free(cache, p);
        free(cache, p);
    }

    #[cfg(feature = "redzone")]
    #[test]
    #[should_panic(expected = "red-zone corruption")]
    fn redzone_corruption_is_fatal_e5() {
        let _g = TEST_LOCK.lock_guard();
        ensure_bootstrap();
        let cache = create("test-redzone", 32);
        let p = alloc(cache);
        unsafe {
            // Clobber the front sentinel word, immediately before the
            // caller-visible pointer, then try to free: must be fatal.
            *(p.sub(size_of::<usize>()) as *mut usize) = 0;
        }
        free(cache, p);
    }
}
