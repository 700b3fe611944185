//! Fixed-length bitsets.
//!
//! Payload: the bit length followed by `ceil(len / 64)` words. Bits past
//! the length are always zero.

use std::ffi::c_void;
use std::mem::size_of;
use std::slice;

use ks_core::trap::trap;
use ks_core::{object, string};

use crate::errors::messages;

pub const BITSET_CLASS_ID: u64 = 0x4B53_0000_0000_0005;

pub fn bitset_new(nbits: usize) -> *mut c_void {
    let words = nbits.div_ceil(64);
    let obj = object::new_object(BITSET_CLASS_ID, size_of::<u64>() * (words + 1));
    unsafe { *obj.cast::<u64>() = nbits as u64 };
    obj
}

/// Bit length and words of a bitset.
///
/// # Safety
/// `obj` must be null or a live object; the slice must not outlive it.
pub unsafe fn bitset_words<'a>(obj: *mut c_void) -> (usize, &'a mut [u64]) {
    if obj.is_null() || unsafe { object::class_id(obj) } != BITSET_CLASS_ID {
        trap(messages::NOT_A_BITSET);
    }
    let base = obj.cast::<u64>();
    unsafe {
        let nbits = *base as usize;
        (nbits, slice::from_raw_parts_mut(base.add(1), nbits.div_ceil(64)))
    }
}

fn bit_index(nbits: usize, bit: i64) -> (usize, u64) {
    match usize::try_from(bit) {
        Ok(b) if b < nbits => (b / 64, 1 << (b % 64)),
        _ => trap(messages::BIT_OUT_OF_RANGE),
    }
}

/// Zeroes the unused high bits of the last word.
fn mask_tail(nbits: usize, words: &mut [u64]) {
    let rem = nbits % 64;
    if rem != 0 {
        if let Some(last) = words.last_mut() {
            *last &= (1u64 << rem) - 1;
        }
    }
}

unsafe fn combine(a: *mut c_void, b: *mut c_void, op: fn(u64, u64) -> u64) -> *mut c_void {
    // `a` and `b` may be the same object.
    let (na, wa) = unsafe { bitset_words(a) };
    let wa = wa.to_vec();
    let (nb, wb) = unsafe { bitset_words(b) };
    if na != nb {
        trap(messages::BITSET_LEN_MISMATCH);
    }
    let out = bitset_new(na);
    let (_, wo) = unsafe { bitset_words(out) };
    for ((o, x), y) in wo.iter_mut().zip(wa.iter()).zip(wb.iter()) {
        *o = op(*x, *y);
    }
    out
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_bitset_new(nbits: i64) -> *mut c_void {
    match usize::try_from(nbits) {
        Ok(n) => bitset_new(n),
        Err(_) => trap(messages::NEGATIVE_LENGTH),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_len(obj: *mut c_void) -> i64 {
    unsafe { bitset_words(obj) }.0 as i64
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_get(obj: *mut c_void, bit: i64) -> bool {
    let (n, words) = unsafe { bitset_words(obj) };
    let (w, mask) = bit_index(n, bit);
    words[w] & mask != 0
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_set(obj: *mut c_void, bit: i64) {
    let (n, words) = unsafe { bitset_words(obj) };
    let (w, mask) = bit_index(n, bit);
    words[w] |= mask;
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_clear(obj: *mut c_void, bit: i64) {
    let (n, words) = unsafe { bitset_words(obj) };
    let (w, mask) = bit_index(n, bit);
    words[w] &= !mask;
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_toggle(obj: *mut c_void, bit: i64) {
    let (n, words) = unsafe { bitset_words(obj) };
    let (w, mask) = bit_index(n, bit);
    words[w] ^= mask;
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_count(obj: *mut c_void) -> i64 {
    let (_, words) = unsafe { bitset_words(obj) };
    words.iter().map(|w| i64::from(w.count_ones())).sum()
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_any(obj: *mut c_void) -> bool {
    unsafe { bitset_words(obj) }.1.iter().any(|&w| w != 0)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_none(obj: *mut c_void) -> bool {
    !unsafe { rt_bitset_any(obj) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_and(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    unsafe { combine(a, b, |x, y| x & y) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_or(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    unsafe { combine(a, b, |x, y| x | y) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_xor(a: *mut c_void, b: *mut c_void) -> *mut c_void {
    unsafe { combine(a, b, |x, y| x ^ y) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_not(a: *mut c_void) -> *mut c_void {
    let (n, src) = unsafe { bitset_words(a) };
    let out = bitset_new(n);
    let (_, dst) = unsafe { bitset_words(out) };
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d = !*s;
    }
    mask_tail(n, dst);
    out
}

/// Bits as `0`/`1` characters, bit 0 first.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_bitset_to_str(obj: *mut c_void) -> *mut c_void {
    let (n, words) = unsafe { bitset_words(obj) };
    let text: Vec<u8> = (0..n)
        .map(|b| if words[b / 64] & (1 << (b % 64)) != 0 { b'1' } else { b'0' })
        .collect();
    string::string_from_bytes(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_index_splits_into_word_and_mask() {
        assert_eq!(bit_index(130, 0), (0, 1));
        assert_eq!(bit_index(130, 65), (1, 2));
        assert_eq!(bit_index(130, 129), (2, 2));
    }

    #[test]
    #[should_panic(expected = "trap: Bitset: bit index out of range")]
    fn bit_past_the_length_traps() {
        bit_index(10, 10);
    }

    #[test]
    #[should_panic(expected = "trap: Bitset: bit index out of range")]
    fn negative_bit_traps() {
        bit_index(10, -1);
    }

    #[test]
    fn tail_bits_are_cleared() {
        let mut words = [u64::MAX, u64::MAX];
        mask_tail(70, &mut words);
        assert_eq!(words, [u64::MAX, 0b11_1111]);
        let mut full = [u64::MAX];
        mask_tail(64, &mut full);
        assert_eq!(full, [u64::MAX]);
    }

    #[test]
    #[should_panic(expected = "trap: Bitset: operands differ in length")]
    fn combining_different_lengths_traps() {
        unsafe { combine(bitset_new(3), bitset_new(4), |x, y| x & y) };
    }
}
