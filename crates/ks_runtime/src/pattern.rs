//! Regex C-ABI: one-shot `rt_regex_*` calls keyed by pattern text through
//! the cache, and `rt_pattern_*` calls on heap objects that hold a compiled
//! pattern.
//!
//! Strings cross the boundary as heap string payloads; a null text reads
//! as empty. Match lists come back as string arrays and unmatched capture
//! groups as empty strings.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::Arc;

use ks_core::trap::trap;
use ks_core::{array, object, string};

use crate::errors::messages;
use crate::regex::{self, CompiledPattern, Match};

pub const PATTERN_CLASS_ID: u64 = 0x4B53_0000_0000_0002;

#[repr(C)]
struct PatternFields {
    compiled: *const CompiledPattern,
}

unsafe extern "C" fn pattern_finalize(obj: *mut c_void) {
    let fields = unsafe { object::fields::<PatternFields>(obj) };
    let compiled = std::mem::replace(&mut fields.compiled, ptr::null());
    if !compiled.is_null() {
        drop(unsafe { Arc::from_raw(compiled) });
    }
}

/// Pattern object over the cached compilation of `source`. Traps on a
/// syntax error.
pub fn pattern_new(source: &[u8]) -> *mut c_void {
    let compiled = regex::cached(source);
    let obj = object::new_object(PATTERN_CLASS_ID, size_of::<PatternFields>());
    unsafe {
        object::fields::<PatternFields>(obj).compiled = Arc::into_raw(compiled);
        object::set_finalizer(obj, Some(pattern_finalize));
    }
    obj
}

/// # Safety
/// `obj` must be a live object.
pub unsafe fn pattern_ref<'a>(obj: *mut c_void) -> &'a CompiledPattern {
    if obj.is_null() || unsafe { object::class_id(obj) } != PATTERN_CLASS_ID {
        trap(messages::NOT_A_PATTERN);
    }
    let compiled = unsafe { object::fields::<PatternFields>(obj) }.compiled;
    if compiled.is_null() {
        trap(messages::NOT_A_PATTERN);
    }
    unsafe { &*compiled }
}

// ==================== Marshalling ====================

unsafe fn text<'a>(s: *mut c_void) -> &'a [u8] {
    let bytes = unsafe { string::string_bytes(s) };
    if bytes.len() > i32::MAX as usize {
        trap(messages::TEXT_TOO_LONG);
    }
    bytes
}

unsafe fn cached(pattern: *mut c_void) -> Arc<CompiledPattern> {
    if pattern.is_null() {
        trap(messages::NULL_PATTERN);
    }
    regex::cached(unsafe { string::string_bytes(pattern) })
}

/// Negative starts clamp to 0; starts past the end never match.
fn start_index(start: i64, len: usize) -> Option<usize> {
    let start = usize::try_from(start.max(0)).ok()?;
    (start <= len).then_some(start)
}

fn matched(text: &[u8], m: Option<Match>) -> *mut c_void {
    string::string_from_bytes(m.map_or(&[][..], |m| m.as_bytes(text)))
}

fn found_pos(m: Option<Match>) -> i64 {
    m.map_or(-1, |m| m.start as i64)
}

fn all_matches(p: &CompiledPattern, text: &[u8]) -> *mut c_void {
    let found = p.find_all(text);
    array::string_array(found.iter().map(|m| m.as_bytes(text)))
}

fn capture_list(p: &CompiledPattern, text: &[u8]) -> *mut c_void {
    match p.captures(text, 0) {
        Some(caps) => {
            let groups: Vec<&[u8]> = caps
                .iter()
                .map(|g| g.map_or(&[][..], |m| m.as_bytes(text)))
                .collect();
            array::string_array(groups)
        }
        None => array::string_array(std::iter::empty()),
    }
}

fn fields_list(fields: Vec<&[u8]>) -> *mut c_void {
    array::string_array(fields)
}

fn limit(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

// ==================== rt_regex_* ====================

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_is_match(text_s: *mut c_void, pattern: *mut c_void) -> bool {
    unsafe { cached(pattern).is_match(text(text_s)) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_find(text_s: *mut c_void, pattern: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    matched(t, unsafe { cached(pattern) }.find(t, 0))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_find_from(text_s: *mut c_void, pattern: *mut c_void, start: i64) -> *mut c_void {
    let t = unsafe { text(text_s) };
    let p = unsafe { cached(pattern) };
    matched(t, start_index(start, t.len()).and_then(|s| p.find(t, s)))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_find_pos(text_s: *mut c_void, pattern: *mut c_void) -> i64 {
    let t = unsafe { text(text_s) };
    found_pos(unsafe { cached(pattern) }.find(t, 0))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_find_all(text_s: *mut c_void, pattern: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    let p = unsafe { cached(pattern) };
    all_matches(&p, t)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_captures(text_s: *mut c_void, pattern: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    let p = unsafe { cached(pattern) };
    capture_list(&p, t)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_replace(
    text_s: *mut c_void,
    pattern: *mut c_void,
    replacement: *mut c_void,
) -> *mut c_void {
    let (t, r) = unsafe { (text(text_s), string::string_bytes(replacement)) };
    string::string_from_bytes(&unsafe { cached(pattern) }.replace(t, r))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_replace_first(
    text_s: *mut c_void,
    pattern: *mut c_void,
    replacement: *mut c_void,
) -> *mut c_void {
    let (t, r) = unsafe { (text(text_s), string::string_bytes(replacement)) };
    string::string_from_bytes(&unsafe { cached(pattern) }.replace_first(t, r))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_split(text_s: *mut c_void, pattern: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    fields_list(unsafe { cached(pattern) }.split(t))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_split_n(text_s: *mut c_void, pattern: *mut c_void, n: i64) -> *mut c_void {
    let t = unsafe { text(text_s) };
    fields_list(unsafe { cached(pattern) }.split_n(t, limit(n)))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_regex_escape(text_s: *mut c_void) -> *mut c_void {
    string::string_from_bytes(&regex::escape(unsafe { text(text_s) }))
}

// ==================== rt_pattern_* ====================

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_new(source: *mut c_void) -> *mut c_void {
    if source.is_null() {
        trap(messages::NULL_PATTERN);
    }
    pattern_new(unsafe { string::string_bytes(source) })
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_source(obj: *mut c_void) -> *mut c_void {
    string::string_from_bytes(unsafe { pattern_ref(obj) }.as_bytes())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_group_count(obj: *mut c_void) -> i64 {
    unsafe { pattern_ref(obj) }.group_count() as i64
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_is_match(obj: *mut c_void, text_s: *mut c_void) -> bool {
    unsafe { pattern_ref(obj).is_match(text(text_s)) }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_find(obj: *mut c_void, text_s: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    matched(t, unsafe { pattern_ref(obj) }.find(t, 0))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_find_from(obj: *mut c_void, text_s: *mut c_void, start: i64) -> *mut c_void {
    let t = unsafe { text(text_s) };
    let p = unsafe { pattern_ref(obj) };
    matched(t, start_index(start, t.len()).and_then(|s| p.find(t, s)))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_find_pos(obj: *mut c_void, text_s: *mut c_void) -> i64 {
    let t = unsafe { text(text_s) };
    found_pos(unsafe { pattern_ref(obj) }.find(t, 0))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_find_all(obj: *mut c_void, text_s: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    all_matches(unsafe { pattern_ref(obj) }, t)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_captures(obj: *mut c_void, text_s: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    capture_list(unsafe { pattern_ref(obj) }, t)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_replace(
    obj: *mut c_void,
    text_s: *mut c_void,
    replacement: *mut c_void,
) -> *mut c_void {
    let (t, r) = unsafe { (text(text_s), string::string_bytes(replacement)) };
    string::string_from_bytes(&unsafe { pattern_ref(obj) }.replace(t, r))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_replace_first(
    obj: *mut c_void,
    text_s: *mut c_void,
    replacement: *mut c_void,
) -> *mut c_void {
    let (t, r) = unsafe { (text(text_s), string::string_bytes(replacement)) };
    string::string_from_bytes(&unsafe { pattern_ref(obj) }.replace_first(t, r))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_split(obj: *mut c_void, text_s: *mut c_void) -> *mut c_void {
    let t = unsafe { text(text_s) };
    fields_list(unsafe { pattern_ref(obj) }.split(t))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn rt_pattern_split_n(obj: *mut c_void, text_s: *mut c_void, n: i64) -> *mut c_void {
    let t = unsafe { text(text_s) };
    fields_list(unsafe { pattern_ref(obj) }.split_n(t, limit(n)))
}
