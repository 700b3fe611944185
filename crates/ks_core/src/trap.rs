//! The abort channel.
//!
//! Invariant violations, allocation failure and heap corruption all end
//! here. Inside `extern "C"` entry points the panic cannot unwind, so the
//! process aborts.

pub mod messages {
    pub const BAD_MAGIC: &str = "heap header magic mismatch (corruption or double free)";
    pub const OUT_OF_MEMORY: &str = "out of memory";
    pub const SIZE_OVERFLOW: &str = "allocation size overflow";
    pub const LEN_EXCEEDS_CAP: &str = "length exceeds capacity";
    pub const ELEM_SIZE_MISMATCH: &str = "element size does not match element kind";
    pub const REFCOUNT_UNDERFLOW: &str = "refcount underflow";
    pub const RETAIN_DEAD: &str = "retain of a payload with zero refcount";
    pub const NOT_ZERO_REF: &str = "free of a payload with live references";
    pub const NOT_AN_OBJECT: &str = "payload is not an object";
    pub const NOT_A_STRING: &str = "payload is not a string";
    pub const NOT_AN_ARRAY: &str = "payload is not an array";
    pub const ELEM_KIND_MISMATCH: &str = "array element kind mismatch";
    pub const INDEX_OUT_OF_BOUNDS: &str = "array index out of bounds";
    pub const RESIZE_SHARED: &str = "resize of a shared, tracked or weakly referenced array";
    pub const BOX_TAG_MISMATCH: &str = "unbox of a box holding another type";
    pub const COLLECT_IN_FINALIZER: &str = "collection requested from a finalizer";
}

#[cold]
#[track_caller]
pub fn trap(msg: &str) -> ! {
    log::error!("trap: {msg}");
    panic!("trap: {msg}")
}
