//! Value objects with C-ABI constructors and methods.
//!
//! Every value is an ordinary heap object with a fixed class id (listed in
//! `runtime.def`). Accessors trap on a null or foreign object. Functions
//! returning a string or object hand the caller a new reference.

use std::ffi::c_void;
use std::mem::size_of;

use ks_core::boxed::{BoxCell, BoxTag};
use ks_core::gc::{self, VisitFn};
use ks_core::trap::trap;
use ks_core::{heap, object};

pub mod bitset;
pub mod boxed;
pub mod mat4;
pub mod option;
pub mod quat;
pub mod result;
pub mod vec3;

/// Object holding `value` by copy.
pub(crate) fn new_value<T: Copy>(class_id: u64, value: T) -> *mut c_void {
    let obj = object::new_object(class_id, size_of::<T>());
    unsafe { *object::fields::<T>(obj) = value };
    obj
}

/// # Safety
/// `obj` must be null or a live object.
pub(crate) unsafe fn value_of<T: Copy>(obj: *mut c_void, class_id: u64, msg: &str) -> T {
    if obj.is_null() || unsafe { object::class_id(obj) } != class_id {
        trap(msg);
    }
    unsafe { *object::fields::<T>(obj) }
}

// ==================== Tagged cells (Option, Result) ====================

/// A variant flag plus one boxed payload.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct Tagged {
    pub(crate) flag: u64,
    pub(crate) cell: BoxCell,
}

unsafe extern "C" fn tagged_traverse(obj: *mut c_void, visit: VisitFn, ctx: *mut c_void) {
    let cell = unsafe { object::fields::<Tagged>(obj) }.cell;
    if cell.tag == BoxTag::Obj as u64 && !cell.as_ptr().is_null() {
        unsafe { visit(cell.as_ptr(), ctx) };
    }
}

unsafe extern "C" fn tagged_finalize(obj: *mut c_void) {
    unsafe { object::fields::<Tagged>(obj).cell.clear() };
}

/// Wraps an already retained cell. Objects holding another object join the
/// collector's tracked set, since options and results can form cycles.
pub(crate) fn new_tagged(class_id: u64, flag: u64, cell: BoxCell) -> *mut c_void {
    let obj = new_value(class_id, Tagged { flag, cell });
    unsafe {
        if cell.tag().is_ref() {
            object::set_finalizer(obj, Some(tagged_finalize));
        }
        if cell.tag() == BoxTag::Obj && !cell.as_ptr().is_null() {
            gc::track(obj, tagged_traverse);
        }
    }
    obj
}

/// Cell for a payload of the given tag, retaining refs.
///
/// # Safety
/// For ref tags `bits` must be null or a live payload address.
pub(crate) unsafe fn cell(tag: BoxTag, bits: u64) -> BoxCell {
    unsafe { BoxCell::new(tag, bits) }
}

pub(crate) fn empty_cell() -> BoxCell {
    BoxCell {
        tag: BoxTag::I64 as u64,
        bits: 0,
    }
}

/// Retains `ptr` and hands it back as a new reference.
pub(crate) fn share(ptr: *mut c_void) -> *mut c_void {
    unsafe { heap::retain(ptr) };
    ptr
}
