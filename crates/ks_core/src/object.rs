//! Class instances: a zeroed byte payload with a class id and an optional
//! finalizer.

use std::ffi::c_void;

use crate::heap::{self, ElemKind, Finalizer, HeapKind};
use crate::trap::{messages, trap};

pub fn new_object(class_id: u64, size: usize) -> *mut c_void {
    let p = heap::allocate(HeapKind::Object, ElemKind::None, 1, size, size);
    unsafe { heap::header_mut(p).class_id = class_id };
    crate::gc::global().notify_alloc();
    p
}

unsafe fn object_header<'a>(payload: *mut c_void) -> &'a mut heap::HeapHeader {
    let h = unsafe { heap::header_mut(payload) };
    if h.kind != HeapKind::Object {
        trap(messages::NOT_AN_OBJECT);
    }
    h
}

/// # Safety
/// `payload` must be a live object.
pub unsafe fn set_finalizer(payload: *mut c_void, finalizer: Option<Finalizer>) {
    unsafe { object_header(payload).finalizer = finalizer };
}

/// # Safety
/// `payload` must be a live object.
pub unsafe fn finalizer(payload: *mut c_void) -> Option<Finalizer> {
    unsafe { object_header(payload).finalizer }
}

/// # Safety
/// `payload` must be a live object.
pub unsafe fn class_id(payload: *mut c_void) -> u64 {
    unsafe { object_header(payload).class_id }
}

/// Typed view of an object's fields.
///
/// # Safety
/// `payload` must be a live object at least `size_of::<T>()` bytes long.
#[inline]
pub unsafe fn fields<'a, T>(payload: *mut c_void) -> &'a mut T {
    debug_assert!(unsafe { heap::len(payload) } >= std::mem::size_of::<T>());
    unsafe { &mut *payload.cast::<T>() }
}

/// # Safety
/// `payload` must be a live object.
pub unsafe fn is_disposed(payload: *mut c_void) -> bool {
    let bits = unsafe { heap::flags(payload) };
    bits & heap::FLAG_DISPOSED != 0
}
