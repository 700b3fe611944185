//! Typed SSA intermediate language.
//!
//! - `Module`, `Function`, `BasicBlock`, `Instr` - the IL data model
//! - `Opcode` - instruction set with terminator classification
//! - `IrBuilder` - cursor-based construction of well-formed functions
//! - `verify_module` - structural verification of a finished module

pub mod builder;
pub mod loc;
pub mod module;
pub mod opcode;
pub mod types;
pub mod value;
pub mod verify;

pub use builder::{BlockRef, FuncId, IrBuilder};
pub use loc::SourceLoc;
pub use module::{BasicBlock, BlockState, Extern, Function, Global, Instr, Module, Param};
pub use opcode::Opcode;
pub use types::Type;
pub use value::Value;
pub use verify::{VerifyError, verify_module};

pub type FastHashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;
pub type FastHashSet<T> = hashbrown::HashSet<T, ahash::RandomState>;
