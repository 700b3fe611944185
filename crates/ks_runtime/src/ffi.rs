//! C-ABI surface over the heap, strings, objects, the cycle collector and
//! weak references.

use std::ffi::c_void;
use std::slice;

use ks_core::heap::{self, ElemKind, Finalizer, HeapKind};
use ks_core::trap::trap;
use ks_core::weak::{self, WeakRef};
use ks_core::{gc, object, string};

use crate::errors::messages;

fn heap_kind(raw: i32) -> HeapKind {
    match raw {
        1 => HeapKind::String,
        2 => HeapKind::Array,
        3 => HeapKind::Object,
        _ => trap(messages::BAD_HEAP_KIND),
    }
}

fn elem_kind(raw: i32) -> ElemKind {
    match raw {
        0 => ElemKind::None,
        1 => ElemKind::I32,
        2 => ElemKind::I64,
        3 => ElemKind::F64,
        4 => ElemKind::U8,
        5 => ElemKind::Str,
        6 => ElemKind::Box,
        _ => trap(messages::BAD_HEAP_KIND),
    }
}

fn non_negative(n: i64) -> usize {
    usize::try_from(n).unwrap_or_else(|_| trap(messages::NEGATIVE_LENGTH))
}

// ==================== Heap ====================

#[unsafe(no_mangle)]
pub extern "C" fn rt_heap_alloc(kind: i32, elem: i32, elem_size: i64, len: i64, cap: i64) -> *mut c_void {
    heap::allocate(
        heap_kind(kind),
        elem_kind(elem),
        non_negative(elem_size),
        non_negative(len),
        non_negative(cap),
    )
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_retain(p: *mut c_void) {
    unsafe { heap::retain(p) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_release(p: *mut c_void) -> i64 {
    unsafe { heap::release(p) as i64 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_release_deferred(p: *mut c_void) -> i64 {
    unsafe { heap::release_deferred(p) as i64 }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_heap_flush_deferred() -> i64 {
    heap::flush_deferred() as i64
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_free_zero_ref(p: *mut c_void) {
    unsafe { heap::free_zero_ref(p) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_mark_disposed(p: *mut c_void) -> bool {
    unsafe { heap::mark_disposed(p) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_refcount(p: *mut c_void) -> i64 {
    if p.is_null() {
        return 0;
    }
    unsafe { heap::refcount(p) as i64 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_len(p: *mut c_void) -> i64 {
    if p.is_null() {
        return 0;
    }
    unsafe { heap::len(p) as i64 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_cap(p: *mut c_void) -> i64 {
    if p.is_null() {
        return 0;
    }
    unsafe { heap::cap(p) as i64 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_heap_set_len(p: *mut c_void, len: i64) {
    unsafe { heap::set_len(p, non_negative(len)) }
}

// ==================== Strings ====================

/// Copies `len` bytes from `bytes`; a null pointer with zero length yields
/// the empty string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_str_new(bytes: *const u8, len: i64) -> *mut c_void {
    let len = non_negative(len);
    if bytes.is_null() || len == 0 {
        return string::empty_string();
    }
    string::string_from_bytes(unsafe { slice::from_raw_parts(bytes, len) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_str_len(s: *mut c_void) -> i64 {
    if s.is_null() {
        return 0;
    }
    unsafe { string::string_len(s) as i64 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_str_eq(a: *mut c_void, b: *mut c_void) -> bool {
    unsafe { string::string_eq(a, b) }
}

// ==================== Objects ====================

#[unsafe(no_mangle)]
pub extern "C" fn rt_obj_new(class_id: i64, size: i64) -> *mut c_void {
    object::new_object(class_id as u64, non_negative(size))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_class_id(obj: *mut c_void) -> i64 {
    if obj.is_null() {
        return 0;
    }
    unsafe { object::class_id(obj) as i64 }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_obj_set_finalizer(obj: *mut c_void, finalizer: Option<Finalizer>) {
    unsafe { object::set_finalizer(obj, finalizer) }
}

// ==================== Collector ====================

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_gc_track(obj: *mut c_void, traverse: Option<gc::TraverseFn>) {
    if obj.is_null() {
        return;
    }
    match traverse {
        Some(traverse) => unsafe { gc::track(obj, traverse) },
        None => log::warn!("rt_gc_track: no traverse function, object left untracked"),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_untrack(obj: *mut c_void) -> bool {
    !obj.is_null() && gc::untrack(obj)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_is_tracked(obj: *mut c_void) -> bool {
    !obj.is_null() && gc::global().is_tracked(obj)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_collect() -> i64 {
    gc::collect() as i64
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_tracked_count() -> i64 {
    gc::global().tracked_count() as i64
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_total_collected() -> i64 {
    gc::global().total_collected() as i64
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_pass_count() -> i64 {
    gc::global().pass_count() as i64
}

/// Zero disables automatic collection.
#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_set_threshold(n: i64) {
    gc::global().set_threshold(usize::try_from(n).unwrap_or(0))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_get_threshold() -> i64 {
    gc::global().threshold() as i64
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_gc_run_finalizers() -> i64 {
    gc::global().run_all_finalizers() as i64
}

// ==================== Weak references ====================

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_weakref_new(target: *mut c_void) -> *mut WeakRef {
    unsafe { weak::weak_new(target) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_weakref_get(handle: *mut WeakRef) -> *mut c_void {
    unsafe { weak::weak_get(handle) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_weakref_alive(handle: *mut WeakRef) -> bool {
    unsafe { weak::weak_alive(handle) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_weakref_free(handle: *mut WeakRef) {
    unsafe { weak::weak_free(handle) }
}
