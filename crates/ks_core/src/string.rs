//! Immutable byte strings. The payload is NUL-terminated (`cap = len + 1`)
//! so it can be handed to C as-is.

use std::ffi::c_void;
use std::ptr;
use std::slice;

use crate::heap::{self, ElemKind, HeapKind};
use crate::trap::{messages, trap};

pub fn string_from_bytes(bytes: &[u8]) -> *mut c_void {
    let p = heap::allocate(HeapKind::String, ElemKind::U8, 1, bytes.len(), bytes.len() + 1);
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), p.cast::<u8>(), bytes.len()) };
    p
}

#[inline]
pub fn string_from_str(s: &str) -> *mut c_void {
    string_from_bytes(s.as_bytes())
}

pub fn empty_string() -> *mut c_void {
    string_from_bytes(&[])
}

/// Borrowed view of a string payload. Null reads as the empty string.
///
/// # Safety
/// `payload` must be null or a live string payload that outlives `'a`.
pub unsafe fn string_bytes<'a>(payload: *mut c_void) -> &'a [u8] {
    if payload.is_null() {
        return &[];
    }
    let h = unsafe { heap::header(payload) };
    if h.kind != HeapKind::String {
        trap(messages::NOT_A_STRING);
    }
    unsafe { slice::from_raw_parts(payload.cast::<u8>(), h.len) }
}

/// # Safety
/// `payload` must be null or a live string payload.
pub unsafe fn string_len(payload: *mut c_void) -> usize {
    unsafe { string_bytes(payload) }.len()
}

/// # Safety
/// Both payloads must be null or live strings.
pub unsafe fn string_eq(a: *mut c_void, b: *mut c_void) -> bool {
    unsafe { string_bytes(a) == string_bytes(b) }
}
