//! Runtime services exported to compiled programs.
//!
//! - `regex` - backtracking regex engine and the process-wide pattern cache
//! - `pattern` - heap objects wrapping compiled patterns
//! - `registry` - the class and function catalog parsed from `runtime.def`
//! - `values` - Option, Result, Bitset, Vec3, Quat and Mat4 value objects
//! - `ffi` - C-ABI entry points over the heap, the collector and weak references

#![allow(clippy::missing_safety_doc)]

pub mod errors;
pub mod ffi;
pub mod pattern;
pub mod regex;
pub mod registry;
pub mod values;

pub use regex::{Captures, CompiledPattern, Match, PatternError, PatternErrorKind};
pub use registry::{ClassEntry, FuncEntry, Registry, RegistryError, Signature};

pub type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
