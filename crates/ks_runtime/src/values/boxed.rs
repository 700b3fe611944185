//! C-ABI boxing and text rendering of boxed values.

use std::ffi::c_void;

use ks_core::boxed::{self, BoxCell, BoxTag};
use ks_core::{object, string};

use super::share;

/// Text form of a boxed value. Strings render as their contents, nested
/// boxes recursively, other objects as `<object>`.
pub fn cell_text(cell: &BoxCell) -> Vec<u8> {
    match cell.tag() {
        BoxTag::I64 => itoa::Buffer::new().format(cell.as_i64()).as_bytes().to_vec(),
        BoxTag::F64 => ryu::Buffer::new().format(cell.as_f64()).as_bytes().to_vec(),
        BoxTag::I1 => if cell.as_i1() { b"true".to_vec() } else { b"false".to_vec() },
        BoxTag::Str => unsafe { string::string_bytes(cell.as_str_ptr()) }.to_vec(),
        BoxTag::Obj => {
            let o = cell.as_obj_ptr();
            if o.is_null() {
                b"null".to_vec()
            } else if unsafe { object::class_id(o) } == boxed::BOX_CLASS_ID {
                cell_text(unsafe { boxed::cell(o) })
            } else {
                b"<object>".to_vec()
            }
        }
    }
}

/// `label` + text of `cell` + `)`.
pub(crate) fn wrapped(label: &[u8], cell: &BoxCell) -> Vec<u8> {
    let mut out = label.to_vec();
    out.extend_from_slice(&cell_text(cell));
    out.push(b')');
    out
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_box_i64(v: i64) -> *mut c_void {
    boxed::box_i64(v)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_box_f64(v: f64) -> *mut c_void {
    boxed::box_f64(v)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_box_i1(v: bool) -> *mut c_void {
    boxed::box_i1(v)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_box_str(s: *mut c_void) -> *mut c_void {
    unsafe { boxed::box_str(s) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_box_obj(o: *mut c_void) -> *mut c_void {
    unsafe { boxed::box_obj(o) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_box_tag(b: *mut c_void) -> i64 {
    unsafe { boxed::cell(b) }.tag() as i64
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_unbox_i64(b: *mut c_void) -> i64 {
    unsafe { boxed::cell(b) }.as_i64()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_unbox_f64(b: *mut c_void) -> f64 {
    unsafe { boxed::cell(b) }.as_f64()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_unbox_i1(b: *mut c_void) -> bool {
    unsafe { boxed::cell(b) }.as_i1()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_unbox_str(b: *mut c_void) -> *mut c_void {
    share(unsafe { boxed::cell(b) }.as_str_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_unbox_obj(b: *mut c_void) -> *mut c_void {
    share(unsafe { boxed::cell(b) }.as_obj_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_box_to_str(b: *mut c_void) -> *mut c_void {
    string::string_from_bytes(&cell_text(unsafe { boxed::cell(b) }))
}
