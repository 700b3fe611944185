//! Zeroing weak references.
//!
//! Handles are registered under their target's payload address. When the
//! target is freed (refcount or collector) every handle's pointer is set to
//! null under the registry mutex before the memory is released.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};

use smallvec::SmallVec;

use crate::FastHashMap;
use crate::heap::{self, FLAG_WEAK_TARGET};

pub struct WeakRef {
    target: AtomicPtr<c_void>,
}

type Registry = FastHashMap<usize, SmallVec<[usize; 2]>>;

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| Mutex::new(Registry::default()));

fn registry() -> MutexGuard<'static, Registry> {
    REGISTRY.lock().unwrap_or_else(PoisonError::into_inner)
}

/// New handle on `target`. Does not retain it.
///
/// # Safety
/// `target` must be null or a live payload.
pub unsafe fn weak_new(target: *mut c_void) -> *mut WeakRef {
    let handle = Box::into_raw(Box::new(WeakRef {
        target: AtomicPtr::new(target),
    }));
    if !target.is_null() {
        let mut reg = registry();
        unsafe { heap::set_flags(target, FLAG_WEAK_TARGET) };
        reg.entry(target as usize).or_default().push(handle as usize);
    }
    handle
}

/// # Safety
/// `handle` must be null or come from `weak_new` and not be freed.
pub unsafe fn weak_get(handle: *mut WeakRef) -> *mut c_void {
    if handle.is_null() {
        return ptr::null_mut();
    }
    unsafe { (*handle).target.load(Ordering::Acquire) }
}

/// # Safety
/// As for `weak_get`.
pub unsafe fn weak_alive(handle: *mut WeakRef) -> bool {
    !unsafe { weak_get(handle) }.is_null()
}

/// Unregisters and frees the handle. The target is unaffected.
///
/// # Safety
/// `handle` must be null or come from `weak_new`; it is invalid afterwards.
pub unsafe fn weak_free(handle: *mut WeakRef) {
    if handle.is_null() {
        return;
    }
    {
        let mut reg = registry();
        let target = unsafe { (*handle).target.load(Ordering::Acquire) };
        if !target.is_null() {
            if let Some(chain) = reg.get_mut(&(target as usize)) {
                chain.retain(|h| *h != handle as usize);
                if chain.is_empty() {
                    reg.remove(&(target as usize));
                    unsafe { heap::clear_flags(target, FLAG_WEAK_TARGET) };
                }
            }
        }
    }
    drop(unsafe { Box::from_raw(handle) });
}

/// Nulls every handle on `target`. Called by the heap before freeing.
pub(crate) unsafe fn clear_for(target: *mut c_void) {
    let mut reg = registry();
    if let Some(chain) = reg.remove(&(target as usize)) {
        for h in chain {
            unsafe { (*(h as *mut WeakRef)).target.store(ptr::null_mut(), Ordering::Release) };
        }
    }
}

/// Number of payloads with at least one registered handle.
pub fn registered_targets() -> usize {
    registry().len()
}

/// Nulls every registered handle and empties the registry.
#[doc(hidden)]
pub fn reset() {
    let mut reg = registry();
    for (_, chain) in reg.drain() {
        for h in chain {
            unsafe { (*(h as *mut WeakRef)).target.store(ptr::null_mut(), Ordering::Release) };
        }
    }
}
