//! Header-prefixed heap allocations with atomic reference counts.
//!
//! Layout of every allocation:
//!
//! ```text
//! +------------------+----------------------------------+
//! | HeapHeader (64B) | payload: elem_size * cap bytes   |
//! +------------------+----------------------------------+
//!                    ^ payload pointer handed to callers
//! ```
//!
//! - `allocate` returns payloads with refcount 1 and zeroed contents
//! - `retain` / `release` are single atomic RMWs; the thread that drops the
//!   count to zero runs cleanup
//! - `release_deferred` queues zero-count payloads for `flush_deferred`

use std::cell::Cell;
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering, fence};

use smallvec::SmallVec;

use crate::config::HEAP_MAGIC;
use crate::trap::{messages, trap};

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeapKind {
    String = 1,
    Array = 2,
    Object = 3,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElemKind {
    None = 0,
    I32 = 1,
    I64 = 2,
    F64 = 3,
    U8 = 4,
    /// Elements are string payload pointers, released on cleanup.
    Str = 5,
    /// Elements are box payload pointers (see `boxed`), released on cleanup.
    Box = 6,
}

impl ElemKind {
    pub fn size(self) -> usize {
        match self {
            ElemKind::None | ElemKind::U8 => 1,
            ElemKind::I32 => 4,
            ElemKind::I64 | ElemKind::F64 => 8,
            ElemKind::Str | ElemKind::Box => size_of::<*mut c_void>(),
        }
    }

    #[inline]
    pub fn holds_refs(self) -> bool {
        matches!(self, ElemKind::Str | ElemKind::Box)
    }
}

/// Cleanup hook for objects, invoked with the payload once its refcount hits zero.
pub type Finalizer = unsafe extern "C" fn(payload: *mut c_void);

pub const FLAG_DISPOSED: u32 = 1 << 0;
pub const FLAG_POOL: u32 = 1 << 1;
/// Condemned by the cycle collector; `release` on it is a no-op.
pub const FLAG_COLLECTING: u32 = 1 << 2;
/// Present in the collector's tracked set.
pub const FLAG_TRACKED: u32 = 1 << 3;
/// Target of at least one weak handle.
pub const FLAG_WEAK_TARGET: u32 = 1 << 4;

#[repr(C, align(16))]
pub struct HeapHeader {
    pub magic: u32,
    pub kind: HeapKind,
    pub elem_kind: ElemKind,
    _reserved: u16,
    pub flags: AtomicU32,
    pub refcnt: AtomicUsize,
    pub len: usize,
    pub cap: usize,
    pub alloc_size: usize,
    pub class_id: u64,
    pub finalizer: Option<Finalizer>,
}

pub const HEADER_SIZE: usize = size_of::<HeapHeader>();

const _: () = assert!(HEADER_SIZE % 16 == 0);

// ==================== Header access ====================

/// Header address for a payload, without validation.
#[inline]
pub fn header_of(payload: *mut c_void) -> *mut HeapHeader {
    payload.cast::<u8>().wrapping_sub(HEADER_SIZE).cast()
}

#[inline]
fn payload_of(h: *mut HeapHeader) -> *mut c_void {
    h.cast::<u8>().wrapping_add(HEADER_SIZE).cast()
}

/// Validated header of a live payload.
///
/// # Safety
/// `payload` must come from `allocate`.
#[inline]
pub unsafe fn header<'a>(payload: *mut c_void) -> &'a HeapHeader {
    let h = header_of(payload);
    unsafe {
        if (*h).magic != HEAP_MAGIC {
            trap(messages::BAD_MAGIC);
        }
        &*h
    }
}

/// # Safety
/// `payload` must come from `allocate` and must not be shared with a
/// concurrent writer.
#[inline]
pub(crate) unsafe fn header_mut<'a>(payload: *mut c_void) -> &'a mut HeapHeader {
    let h = header_of(payload);
    unsafe {
        if (*h).magic != HEAP_MAGIC {
            trap(messages::BAD_MAGIC);
        }
        &mut *h
    }
}

// ==================== Allocation ====================

pub fn allocate(
    kind: HeapKind,
    elem_kind: ElemKind,
    elem_size: usize,
    len: usize,
    cap: usize,
) -> *mut c_void {
    if len > cap {
        trap(messages::LEN_EXCEEDS_CAP);
    }
    if elem_kind != ElemKind::None && elem_size != elem_kind.size() {
        trap(messages::ELEM_SIZE_MISMATCH);
    }
    let Some(total) = elem_size
        .checked_mul(cap)
        .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
    else {
        trap(messages::SIZE_OVERFLOW);
    };
    let h = unsafe { libc::calloc(1, total) }.cast::<HeapHeader>();
    if h.is_null() {
        trap(messages::OUT_OF_MEMORY);
    }
    unsafe {
        h.write(HeapHeader {
            magic: HEAP_MAGIC,
            kind,
            elem_kind,
            _reserved: 0,
            flags: AtomicU32::new(0),
            refcnt: AtomicUsize::new(1),
            len,
            cap,
            alloc_size: total,
            class_id: 0,
            finalizer: None,
        });
    }
    payload_of(h)
}

/// Grows the block behind `payload` so it can hold `new_cap` elements.
/// Returns the (possibly moved) payload; bytes past the old capacity are zeroed.
///
/// # Safety
/// The caller must hold the only reference.
pub(crate) unsafe fn reallocate(payload: *mut c_void, new_cap: usize) -> *mut c_void {
    let (old_size, elem_size) = unsafe {
        let h = header(payload);
        (h.alloc_size, h.elem_kind.size())
    };
    let Some(total) = elem_size
        .checked_mul(new_cap)
        .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
    else {
        trap(messages::SIZE_OVERFLOW);
    };
    let h = unsafe { libc::realloc(header_of(payload).cast(), total) }.cast::<HeapHeader>();
    if h.is_null() {
        trap(messages::OUT_OF_MEMORY);
    }
    unsafe {
        if total > old_size {
            ptr::write_bytes(h.cast::<u8>().add(old_size), 0, total - old_size);
        }
        (*h).cap = new_cap;
        (*h).alloc_size = total;
    }
    payload_of(h)
}

// ==================== Refcounting ====================

/// # Safety
/// `payload` must be null or a live payload.
pub unsafe fn retain(payload: *mut c_void) {
    if payload.is_null() {
        return;
    }
    let h = unsafe { header(payload) };
    let prev = h.refcnt.fetch_add(1, Ordering::AcqRel);
    if prev == 0 {
        trap(messages::RETAIN_DEAD);
    }
}

/// Decrements the refcount and runs cleanup on the transition to zero.
/// Returns the new refcount. Payloads condemned by a running collection are
/// left alone.
///
/// # Safety
/// `payload` must be null or a live payload owned (once) by the caller.
pub unsafe fn release(payload: *mut c_void) -> usize {
    if payload.is_null() {
        return 0;
    }
    match unsafe { decrement(payload) } {
        Decrement::Reached(0) => {
            unsafe { reclaim(payload) };
            0
        }
        Decrement::Reached(n) | Decrement::Skipped(n) => n,
    }
}

/// Decrements without reclaiming. A payload reaching zero is queued for
/// `flush_deferred`.
///
/// # Safety
/// As for `release`.
pub unsafe fn release_deferred(payload: *mut c_void) -> usize {
    if payload.is_null() {
        return 0;
    }
    match unsafe { decrement(payload) } {
        Decrement::Reached(0) => {
            DEFERRED
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(payload as usize);
            0
        }
        Decrement::Reached(n) | Decrement::Skipped(n) => n,
    }
}

/// Reclaims every queued payload whose refcount is still zero. Returns the
/// number freed.
pub fn flush_deferred() -> usize {
    let mut freed = 0;
    loop {
        let batch = std::mem::take(&mut *DEFERRED.lock().unwrap_or_else(PoisonError::into_inner));
        if batch.is_empty() {
            return freed;
        }
        for addr in batch {
            let p = addr as *mut c_void;
            unsafe {
                if header(p).refcnt.load(Ordering::Acquire) == 0 {
                    reclaim(p);
                    freed += 1;
                }
            }
        }
    }
}

/// Reclaims a payload whose refcount already reached zero.
///
/// # Safety
/// `payload` must be live with a zero refcount and not queued for
/// `flush_deferred`.
pub unsafe fn free_zero_ref(payload: *mut c_void) {
    if payload.is_null() {
        return;
    }
    let rc = unsafe { header(payload) }.refcnt.load(Ordering::Acquire);
    debug_assert_eq!(rc, 0, "{}", messages::NOT_ZERO_REF);
    if rc != 0 {
        trap(messages::NOT_ZERO_REF);
    }
    unsafe { reclaim(payload) };
}

/// Sets the disposed flag. Returns `true` if it was already set.
///
/// # Safety
/// `payload` must be a live object payload.
pub unsafe fn mark_disposed(payload: *mut c_void) -> bool {
    let h = unsafe { header(payload) };
    if h.kind != HeapKind::Object {
        trap(messages::NOT_AN_OBJECT);
    }
    h.flags.fetch_or(FLAG_DISPOSED, Ordering::AcqRel) & FLAG_DISPOSED != 0
}

enum Decrement {
    Reached(usize),
    Skipped(usize),
}

unsafe fn decrement(payload: *mut c_void) -> Decrement {
    let h = unsafe { header(payload) };
    if h.flags.load(Ordering::Acquire) & FLAG_COLLECTING != 0 {
        return Decrement::Skipped(h.refcnt.load(Ordering::Acquire));
    }
    let mut cur = h.refcnt.load(Ordering::Relaxed);
    loop {
        if cur == 0 {
            trap(messages::REFCOUNT_UNDERFLOW);
        }
        match h
            .refcnt
            .compare_exchange_weak(cur, cur - 1, Ordering::Release, Ordering::Relaxed)
        {
            Ok(_) => break,
            Err(actual) => cur = actual,
        }
    }
    if cur == 1 {
        fence(Ordering::Acquire);
    }
    Decrement::Reached(cur - 1)
}

// ==================== Cleanup ====================

static DEFERRED: Mutex<Vec<usize>> = Mutex::new(Vec::new());

thread_local! {
    static FINALIZER_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// True while the current thread is running a finalizer.
pub fn in_finalizer() -> bool {
    FINALIZER_DEPTH.with(|d| d.get() > 0)
}

pub(crate) fn run_finalizer(f: Finalizer, payload: *mut c_void) {
    FINALIZER_DEPTH.with(|d| d.set(d.get() + 1));
    unsafe { f(payload) };
    FINALIZER_DEPTH.with(|d| d.set(d.get() - 1));
}

/// Full zero-refcount cleanup: tracked-set entry, finalizer, weak handles,
/// ref elements, then the block itself. Children reaching zero are handled
/// iteratively.
pub(crate) unsafe fn reclaim(payload: *mut c_void) {
    let mut pending: SmallVec<[*mut c_void; 8]> = SmallVec::new();
    pending.push(payload);
    while let Some(p) = pending.pop() {
        unsafe {
            if !claim(p) {
                continue;
            }
            if let Some(f) = take_finalizer(p) {
                run_finalizer(f, p);
            }
            if flags(p) & FLAG_WEAK_TARGET != 0 {
                crate::weak::clear_for(p);
            }
            release_elements(p, &mut pending);
            free_block(p);
        }
    }
}

/// Removes an object's finalizer so it runs at most once.
pub(crate) unsafe fn take_finalizer(p: *mut c_void) -> Option<Finalizer> {
    let h = unsafe { header_mut(p) };
    if h.kind == HeapKind::Object {
        h.finalizer.take()
    } else {
        None
    }
}

/// Makes the caller the only party allowed to free `p`. A tracked payload
/// leaves the set before its finalizer runs, so a concurrent pass cannot
/// condemn it. Returns `false` when a pass already condemned it; that pass
/// frees it.
unsafe fn claim(p: *mut c_void) -> bool {
    let bits = unsafe { flags(p) };
    if bits & (FLAG_TRACKED | FLAG_COLLECTING) == 0 {
        return true;
    }
    unsafe { crate::gc::global().claim(p) }
}

pub(crate) unsafe fn release_elements(p: *mut c_void, pending: &mut SmallVec<[*mut c_void; 8]>) {
    let h = unsafe { header(p) };
    if !h.elem_kind.holds_refs() {
        return;
    }
    let elems = p.cast::<*mut c_void>();
    for i in 0..h.len {
        let child = unsafe { *elems.add(i) };
        if child.is_null() {
            continue;
        }
        if let Decrement::Reached(0) = unsafe { decrement(child) } {
            pending.push(child);
        }
    }
}

pub(crate) unsafe fn free_block(p: *mut c_void) {
    let h = header_of(p);
    unsafe {
        (*h).magic = 0;
        libc::free(h.cast());
    }
}

// ==================== Accessors ====================

/// # Safety
/// `payload` must be a live payload.
pub unsafe fn refcount(payload: *mut c_void) -> usize {
    unsafe { header(payload) }.refcnt.load(Ordering::Acquire)
}

/// # Safety
/// `payload` must be a live payload.
pub unsafe fn len(payload: *mut c_void) -> usize {
    unsafe { header(payload) }.len
}

/// # Safety
/// `payload` must be a live payload.
pub unsafe fn cap(payload: *mut c_void) -> usize {
    unsafe { header(payload) }.cap
}

/// # Safety
/// `payload` must be a live payload not shared with other threads.
pub unsafe fn set_len(payload: *mut c_void, new_len: usize) {
    let h = unsafe { header_mut(payload) };
    if new_len > h.cap {
        trap(messages::LEN_EXCEEDS_CAP);
    }
    h.len = new_len;
}

/// # Safety
/// `payload` must be a live payload.
pub unsafe fn kind(payload: *mut c_void) -> HeapKind {
    unsafe { header(payload) }.kind
}

/// # Safety
/// `payload` must be a live payload.
pub unsafe fn elem_kind(payload: *mut c_void) -> ElemKind {
    unsafe { header(payload) }.elem_kind
}

/// # Safety
/// `payload` must be a live payload.
pub unsafe fn flags(payload: *mut c_void) -> u32 {
    unsafe { header(payload) }.flags.load(Ordering::Acquire)
}

pub(crate) unsafe fn set_flags(payload: *mut c_void, bits: u32) {
    unsafe { header(payload) }.flags.fetch_or(bits, Ordering::AcqRel);
}

pub(crate) unsafe fn clear_flags(payload: *mut c_void, bits: u32) {
    unsafe { header(payload) }.flags.fetch_and(!bits, Ordering::AcqRel);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_sixteen_byte_multiple() {
        assert_eq!(HEADER_SIZE, 64);
        let p = allocate(HeapKind::Array, ElemKind::I64, 8, 2, 4);
        assert_eq!(p as usize % 16, 0);
        assert_eq!(header_of(p) as usize + HEADER_SIZE, p as usize);
        unsafe {
            assert_eq!(header(p).alloc_size, HEADER_SIZE + 32);
            assert_eq!(release(p), 0);
        }
    }

    #[test]
    fn elem_sizes() {
        assert_eq!(ElemKind::I32.size(), 4);
        assert_eq!(ElemKind::F64.size(), 8);
        assert_eq!(ElemKind::Str.size(), size_of::<usize>());
        assert!(ElemKind::Box.holds_refs());
        assert!(!ElemKind::U8.holds_refs());
    }
}
