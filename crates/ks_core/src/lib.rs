//! Reference-counted runtime heap.
//!
//! This crate contains the memory model shared by every runtime value:
//! - `heap` - header-prefixed allocations with atomic refcounts
//! - `string`, `array`, `object`, `boxed` - typed views over heap payloads
//! - `gc` - trial-deletion cycle collector over tracked objects
//! - `weak` - zeroing weak references
//! - `trap` - the single abort channel

pub mod array;
pub mod boxed;
pub mod config;
pub mod gc;
pub mod heap;
pub mod object;
pub mod string;
pub mod trap;
pub mod weak;

pub use heap::{ElemKind, Finalizer, HeapHeader, HeapKind};
pub use trap::trap;

pub type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
pub type FastHashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
