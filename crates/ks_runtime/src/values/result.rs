//! `Result`: ok or err, each with a boxed payload.

use std::ffi::c_void;

use ks_core::boxed::{BoxCell, BoxTag};
use ks_core::string;
use ks_core::trap::trap;

use super::boxed::wrapped;
use super::{Tagged, cell, new_tagged, share, value_of};
use crate::errors::messages;

pub const RESULT_CLASS_ID: u64 = 0x4B53_0000_0000_0004;

const ERR: u64 = 0;
const OK: u64 = 1;

/// # Safety
/// For ref tags `bits` must be null or a live payload address; it is retained.
pub unsafe fn result_ok(tag: BoxTag, bits: u64) -> *mut c_void {
    new_tagged(RESULT_CLASS_ID, OK, unsafe { cell(tag, bits) })
}

/// # Safety
/// As for `result_ok`.
pub unsafe fn result_err(tag: BoxTag, bits: u64) -> *mut c_void {
    new_tagged(RESULT_CLASS_ID, ERR, unsafe { cell(tag, bits) })
}

/// # Safety
/// `obj` must be null or a live object.
pub unsafe fn result_value(obj: *mut c_void) -> Result<BoxCell, BoxCell> {
    let t: Tagged = unsafe { value_of(obj, RESULT_CLASS_ID, messages::NOT_A_RESULT) };
    if t.flag == OK { Ok(t.cell) } else { Err(t.cell) }
}

/// # Safety
/// As for `result_value`.
pub unsafe fn result_unwrap(obj: *mut c_void) -> BoxCell {
    match unsafe { result_value(obj) } {
        Ok(c) => c,
        Err(_) => trap(messages::UNWRAP_ERR),
    }
}

/// # Safety
/// As for `result_value`.
pub unsafe fn result_unwrap_err(obj: *mut c_void) -> BoxCell {
    match unsafe { result_value(obj) } {
        Ok(_) => trap(messages::UNWRAP_ERR_OF_OK),
        Err(c) => c,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_result_ok_i64(v: i64) -> *mut c_void {
    unsafe { result_ok(BoxTag::I64, v as u64) }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_result_ok_f64(v: f64) -> *mut c_void {
    unsafe { result_ok(BoxTag::F64, v.to_bits()) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_ok_str(s: *mut c_void) -> *mut c_void {
    unsafe { result_ok(BoxTag::Str, s as usize as u64) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_ok_obj(o: *mut c_void) -> *mut c_void {
    unsafe { result_ok(BoxTag::Obj, o as usize as u64) }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_result_err_i64(code: i64) -> *mut c_void {
    unsafe { result_err(BoxTag::I64, code as u64) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_err_str(msg: *mut c_void) -> *mut c_void {
    unsafe { result_err(BoxTag::Str, msg as usize as u64) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_is_ok(obj: *mut c_void) -> bool {
    unsafe { result_value(obj) }.is_ok()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_is_err(obj: *mut c_void) -> bool {
    unsafe { result_value(obj) }.is_err()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_unwrap_i64(obj: *mut c_void) -> i64 {
    unsafe { result_unwrap(obj) }.as_i64()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_unwrap_f64(obj: *mut c_void) -> f64 {
    unsafe { result_unwrap(obj) }.as_f64()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_unwrap_str(obj: *mut c_void) -> *mut c_void {
    share(unsafe { result_unwrap(obj) }.as_str_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_unwrap_obj(obj: *mut c_void) -> *mut c_void {
    share(unsafe { result_unwrap(obj) }.as_obj_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_unwrap_or_i64(obj: *mut c_void, default: i64) -> i64 {
    unsafe { result_value(obj) }.map_or(default, |c| c.as_i64())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_unwrap_err_i64(obj: *mut c_void) -> i64 {
    unsafe { result_unwrap_err(obj) }.as_i64()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_unwrap_err_str(obj: *mut c_void) -> *mut c_void {
    share(unsafe { result_unwrap_err(obj) }.as_str_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_result_to_str(obj: *mut c_void) -> *mut c_void {
    let text = match unsafe { result_value(obj) } {
        Ok(c) => wrapped(b"Ok(", &c),
        Err(c) => wrapped(b"Err(", &c),
    };
    string::string_from_bytes(&text)
}
