//! Boxed primitives.
//!
//! A box is an object of class `BOX_CLASS_ID` whose payload is a
//! `BoxCell`. The tag values are part of the runtime ABI and never change:
//! `0 = i64, 1 = f64, 2 = i1, 3 = str, 4 = obj`. Boxes of the two ref tags
//! own one reference to their content and drop it in their finalizer, which
//! is how boxed-ref arrays distinguish primitive from ref boxes.

use std::ffi::c_void;
use std::mem::size_of;

use crate::heap;
use crate::object;
use crate::trap::{messages, trap};

pub const BOX_CLASS_ID: u64 = 0x4B53_0000_0000_0001;

#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxTag {
    I64 = 0,
    F64 = 1,
    I1 = 2,
    Str = 3,
    Obj = 4,
}

impl BoxTag {
    pub fn from_raw(raw: u64) -> Option<BoxTag> {
        Some(match raw {
            0 => BoxTag::I64,
            1 => BoxTag::F64,
            2 => BoxTag::I1,
            3 => BoxTag::Str,
            4 => BoxTag::Obj,
            _ => return None,
        })
    }

    #[inline]
    pub fn is_ref(self) -> bool {
        matches!(self, BoxTag::Str | BoxTag::Obj)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoxCell {
    pub tag: u64,
    pub bits: u64,
}

impl BoxCell {
    pub fn tag(&self) -> BoxTag {
        match BoxTag::from_raw(self.tag) {
            Some(tag) => tag,
            None => trap(messages::BOX_TAG_MISMATCH),
        }
    }

    /// Cell for `value`, retaining it when the tag is a ref tag.
    ///
    /// # Safety
    /// For ref tags `bits` must be null or a live payload.
    pub unsafe fn new(tag: BoxTag, bits: u64) -> Self {
        if tag.is_ref() {
            unsafe { heap::retain(bits as usize as *mut c_void) };
        }
        BoxCell {
            tag: tag as u64,
            bits,
        }
    }

    /// Drops the reference held by a ref cell.
    ///
    /// # Safety
    /// Must be called at most once per retained cell.
    pub unsafe fn clear(&mut self) {
        if self.tag().is_ref() {
            unsafe { heap::release(self.as_ptr()) };
        }
        self.tag = BoxTag::I64 as u64;
        self.bits = 0;
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut c_void {
        self.bits as usize as *mut c_void
    }

    fn expect(&self, tag: BoxTag) -> u64 {
        if self.tag() != tag {
            trap(messages::BOX_TAG_MISMATCH);
        }
        self.bits
    }

    pub fn as_i64(&self) -> i64 {
        self.expect(BoxTag::I64) as i64
    }

    pub fn as_f64(&self) -> f64 {
        f64::from_bits(self.expect(BoxTag::F64))
    }

    pub fn as_i1(&self) -> bool {
        self.expect(BoxTag::I1) != 0
    }

    pub fn as_str_ptr(&self) -> *mut c_void {
        self.expect(BoxTag::Str) as usize as *mut c_void
    }

    pub fn as_obj_ptr(&self) -> *mut c_void {
        self.expect(BoxTag::Obj) as usize as *mut c_void
    }
}

unsafe extern "C" fn box_finalize(payload: *mut c_void) {
    unsafe { object::fields::<BoxCell>(payload).clear() };
}

fn new_box(cell: BoxCell) -> *mut c_void {
    let p = object::new_object(BOX_CLASS_ID, size_of::<BoxCell>());
    unsafe {
        *object::fields::<BoxCell>(p) = cell;
        if cell.tag().is_ref() {
            object::set_finalizer(p, Some(box_finalize));
        }
    }
    p
}

pub fn box_i64(v: i64) -> *mut c_void {
    new_box(BoxCell {
        tag: BoxTag::I64 as u64,
        bits: v as u64,
    })
}

pub fn box_f64(v: f64) -> *mut c_void {
    new_box(BoxCell {
        tag: BoxTag::F64 as u64,
        bits: v.to_bits(),
    })
}

pub fn box_i1(v: bool) -> *mut c_void {
    new_box(BoxCell {
        tag: BoxTag::I1 as u64,
        bits: u64::from(v),
    })
}

/// # Safety
/// `s` must be null or a live string; the box retains it.
pub unsafe fn box_str(s: *mut c_void) -> *mut c_void {
    new_box(unsafe { BoxCell::new(BoxTag::Str, s as usize as u64) })
}

/// # Safety
/// `o` must be null or a live object; the box retains it.
pub unsafe fn box_obj(o: *mut c_void) -> *mut c_void {
    new_box(unsafe { BoxCell::new(BoxTag::Obj, o as usize as u64) })
}

/// # Safety
/// `b` must be a live box.
pub unsafe fn cell<'a>(b: *mut c_void) -> &'a BoxCell {
    if unsafe { object::class_id(b) } != BOX_CLASS_ID {
        trap(messages::BOX_TAG_MISMATCH);
    }
    unsafe { object::fields::<BoxCell>(b) }
}
