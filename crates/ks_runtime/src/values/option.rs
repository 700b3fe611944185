//! `Option`: none, or some boxed payload.

use std::ffi::c_void;

use ks_core::boxed::{BoxCell, BoxTag};
use ks_core::string;
use ks_core::trap::trap;

use super::boxed::wrapped;
use super::{Tagged, cell, empty_cell, new_tagged, share, value_of};
use crate::errors::messages;

pub const OPTION_CLASS_ID: u64 = 0x4B53_0000_0000_0003;

const NONE: u64 = 0;
const SOME: u64 = 1;

pub fn option_none() -> *mut c_void {
    new_tagged(OPTION_CLASS_ID, NONE, empty_cell())
}

/// # Safety
/// For ref tags `bits` must be null or a live payload address; it is retained.
pub unsafe fn option_some(tag: BoxTag, bits: u64) -> *mut c_void {
    new_tagged(OPTION_CLASS_ID, SOME, unsafe { cell(tag, bits) })
}

/// The payload of a some, `None` for none.
///
/// # Safety
/// `obj` must be null or a live object.
pub unsafe fn option_value(obj: *mut c_void) -> Option<BoxCell> {
    let t: Tagged = unsafe { value_of(obj, OPTION_CLASS_ID, messages::NOT_AN_OPTION) };
    (t.flag == SOME).then_some(t.cell)
}

/// The payload of a some. Traps on none.
///
/// # Safety
/// As for `option_value`.
pub unsafe fn option_unwrap(obj: *mut c_void) -> BoxCell {
    match unsafe { option_value(obj) } {
        Some(c) => c,
        None => trap(messages::UNWRAP_NONE),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_option_none() -> *mut c_void {
    option_none()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_option_some_i64(v: i64) -> *mut c_void {
    unsafe { option_some(BoxTag::I64, v as u64) }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_option_some_f64(v: f64) -> *mut c_void {
    unsafe { option_some(BoxTag::F64, v.to_bits()) }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_option_some_i1(v: bool) -> *mut c_void {
    unsafe { option_some(BoxTag::I1, u64::from(v)) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_some_str(s: *mut c_void) -> *mut c_void {
    unsafe { option_some(BoxTag::Str, s as usize as u64) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_some_obj(o: *mut c_void) -> *mut c_void {
    unsafe { option_some(BoxTag::Obj, o as usize as u64) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_is_some(obj: *mut c_void) -> bool {
    unsafe { option_value(obj) }.is_some()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_is_none(obj: *mut c_void) -> bool {
    unsafe { option_value(obj) }.is_none()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_i64(obj: *mut c_void) -> i64 {
    unsafe { option_unwrap(obj) }.as_i64()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_f64(obj: *mut c_void) -> f64 {
    unsafe { option_unwrap(obj) }.as_f64()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_i1(obj: *mut c_void) -> bool {
    unsafe { option_unwrap(obj) }.as_i1()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_str(obj: *mut c_void) -> *mut c_void {
    share(unsafe { option_unwrap(obj) }.as_str_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_obj(obj: *mut c_void) -> *mut c_void {
    share(unsafe { option_unwrap(obj) }.as_obj_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_or_i64(obj: *mut c_void, default: i64) -> i64 {
    unsafe { option_value(obj) }.map_or(default, |c| c.as_i64())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_or_f64(obj: *mut c_void, default: f64) -> f64 {
    unsafe { option_value(obj) }.map_or(default, |c| c.as_f64())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_unwrap_or_str(obj: *mut c_void, default: *mut c_void) -> *mut c_void {
    share(unsafe { option_value(obj) }.map_or(default, |c| c.as_str_ptr()))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_option_to_str(obj: *mut c_void) -> *mut c_void {
    let text = match unsafe { option_value(obj) } {
        Some(c) => wrapped(b"Some(", &c),
        None => b"None".to_vec(),
    };
    string::string_from_bytes(&text)
}
