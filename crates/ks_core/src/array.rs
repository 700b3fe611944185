//! Typed arrays over heap payloads.
//!
//! Scalar arrays store values inline. Ref arrays (`ElemKind::Str`,
//! `ElemKind::Box`) own one reference per non-null slot; the heap releases
//! them when the array dies.

use std::ffi::c_void;
use std::ptr;

use crate::config::ARRAY_MIN_GROW;
use crate::heap::{self, ElemKind, FLAG_TRACKED, FLAG_WEAK_TARGET, HeapKind};
use crate::string;
use crate::trap::{messages, trap};

/// Scalar element types with a fixed `ElemKind`.
pub trait Elem: Copy {
    const KIND: ElemKind;
}

impl Elem for i32 {
    const KIND: ElemKind = ElemKind::I32;
}

impl Elem for i64 {
    const KIND: ElemKind = ElemKind::I64;
}

impl Elem for f64 {
    const KIND: ElemKind = ElemKind::F64;
}

impl Elem for u8 {
    const KIND: ElemKind = ElemKind::U8;
}

pub fn array_new(elem: ElemKind, len: usize) -> *mut c_void {
    array_with_capacity(elem, len, len)
}

pub fn array_with_capacity(elem: ElemKind, len: usize, cap: usize) -> *mut c_void {
    heap::allocate(HeapKind::Array, elem, elem.size(), len, cap)
}

/// A string-ref array holding a fresh string per item.
pub fn string_array<'a, I>(items: I) -> *mut c_void
where
    I: IntoIterator<Item = &'a [u8]>,
    I::IntoIter: ExactSizeIterator,
{
    let items = items.into_iter();
    let arr = array_new(ElemKind::Str, items.len());
    let slots = arr.cast::<*mut c_void>();
    for (i, item) in items.enumerate() {
        unsafe { *slots.add(i) = string::string_from_bytes(item) };
    }
    arr
}

unsafe fn checked(payload: *mut c_void, kind: Option<ElemKind>, index: usize) {
    let h = unsafe { heap::header(payload) };
    if h.kind != HeapKind::Array {
        trap(messages::NOT_AN_ARRAY);
    }
    if let Some(kind) = kind {
        if h.elem_kind != kind {
            trap(messages::ELEM_KIND_MISMATCH);
        }
    }
    if index >= h.len {
        trap(messages::INDEX_OUT_OF_BOUNDS);
    }
}

/// # Safety
/// `payload` must be a live array.
pub unsafe fn array_len(payload: *mut c_void) -> usize {
    unsafe { heap::len(payload) }
}

/// # Safety
/// `payload` must be a live array of `T`.
pub unsafe fn array_get<T: Elem>(payload: *mut c_void, index: usize) -> T {
    unsafe {
        checked(payload, Some(T::KIND), index);
        *payload.cast::<T>().add(index)
    }
}

/// # Safety
/// `payload` must be a live array of `T`.
pub unsafe fn array_set<T: Elem>(payload: *mut c_void, index: usize, value: T) {
    unsafe {
        checked(payload, Some(T::KIND), index);
        *payload.cast::<T>().add(index) = value;
    }
}

/// Borrowed element of a ref array (no retain).
///
/// # Safety
/// `payload` must be a live ref array.
pub unsafe fn array_get_ref(payload: *mut c_void, index: usize) -> *mut c_void {
    unsafe {
        checked(payload, None, index);
        if !heap::elem_kind(payload).holds_refs() {
            trap(messages::ELEM_KIND_MISMATCH);
        }
        *payload.cast::<*mut c_void>().add(index)
    }
}

/// Stores `value` (retained) and releases the previous occupant.
///
/// # Safety
/// `payload` must be a live ref array; `value` null or live.
pub unsafe fn array_set_ref(payload: *mut c_void, index: usize, value: *mut c_void) {
    unsafe {
        let old = array_get_ref(payload, index);
        heap::retain(value);
        *payload.cast::<*mut c_void>().add(index) = value;
        heap::release(old);
    }
}

/// Sets the logical length, growing the allocation when needed. Returns the
/// (possibly moved) payload. Dropped ref elements are released; new slots
/// are zero.
///
/// # Safety
/// `payload` must be a live array referenced only by the caller.
pub unsafe fn array_resize(payload: *mut c_void, new_len: usize) -> *mut c_void {
    let (len, cap, elem, shared) = unsafe {
        let h = heap::header(payload);
        if h.kind != HeapKind::Array {
            trap(messages::NOT_AN_ARRAY);
        }
        let pinned = heap::flags(payload) & (FLAG_TRACKED | FLAG_WEAK_TARGET) != 0;
        (h.len, h.cap, h.elem_kind, heap::refcount(payload) != 1 || pinned)
    };
    if shared {
        trap(messages::RESIZE_SHARED);
    }
    let size = elem.size();
    if new_len < len {
        if elem.holds_refs() {
            for i in new_len..len {
                unsafe {
                    let slot = payload.cast::<*mut c_void>().add(i);
                    heap::release(*slot);
                    *slot = ptr::null_mut();
                }
            }
        } else {
            unsafe {
                ptr::write_bytes(payload.cast::<u8>().add(new_len * size), 0, (len - new_len) * size);
            }
        }
        unsafe { heap::set_len(payload, new_len) };
        return payload;
    }
    let payload = if new_len > cap {
        let grown = new_len.max(cap.saturating_mul(2)).max(ARRAY_MIN_GROW);
        unsafe { heap::reallocate(payload, grown) }
    } else {
        payload
    };
    unsafe { heap::set_len(payload, new_len) };
    payload
}
