//! Compile-time runtime constants.

/// Marker stored at the start of every heap header.
pub const HEAP_MAGIC: u32 = 0x5250_4956;

/// Initial tracked-set capacity. Must be a power of two.
pub const GC_INITIAL_CAPACITY: usize = 64;

/// The tracked set grows once (live + tombstones) / capacity exceeds this ratio.
pub const GC_MAX_LOAD_NUM: usize = 5;
pub const GC_MAX_LOAD_DEN: usize = 8;

/// Object allocations between automatic collections; 0 disables.
pub const GC_DEFAULT_THRESHOLD: usize = 0;

/// Smallest capacity an array grows to.
pub const ARRAY_MIN_GROW: usize = 4;
