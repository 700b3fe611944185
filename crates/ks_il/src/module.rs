//! IL data model.

use smallvec::SmallVec;

use crate::{Opcode, SourceLoc, Type, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct Extern {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Type>,
}

/// Module-level data. An empty initializer means zero-initialised; string
/// globals carry their literal bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub init: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    /// SSA id, assigned by the builder.
    pub id: u32,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            id: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Instr {
    pub result: Option<u32>,
    pub op: Opcode,
    pub ty: Type,
    pub operands: SmallVec<[Value; 3]>,
    pub callee: Option<String>,
    /// Successor labels. For `switch.i32` the first label is the default.
    pub labels: SmallVec<[String; 2]>,
    /// One argument vector per entry in `labels`.
    pub br_args: SmallVec<[Vec<Value>; 2]>,
    pub loc: SourceLoc,
}

impl Instr {
    pub fn new(op: Opcode, ty: Type) -> Self {
        Self {
            result: None,
            op,
            ty,
            operands: SmallVec::new(),
            callee: None,
            labels: SmallVec::new(),
            br_args: SmallVec::new(),
            loc: SourceLoc::UNKNOWN,
        }
    }

    /// Case constants of a `switch.i32`, in label order after the default.
    pub fn switch_cases(&self) -> impl Iterator<Item = (i64, &str)> + '_ {
        self.operands
            .iter()
            .skip(1)
            .zip(self.labels.iter().skip(1))
            .filter_map(|(v, l)| match v {
                Value::ConstInt(c) => Some((*c, l.as_str())),
                _ => None,
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    Fresh,
    Open,
    Terminated,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub params: Vec<Param>,
    pub instructions: Vec<Instr>,
    pub terminated: bool,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            params: Vec::new(),
            instructions: Vec::new(),
            terminated: false,
        }
    }

    pub fn state(&self) -> BlockState {
        if self.terminated {
            BlockState::Terminated
        } else if self.instructions.is_empty() {
            BlockState::Fresh
        } else {
            BlockState::Open
        }
    }

    pub fn terminator(&self) -> Option<&Instr> {
        self.instructions.last().filter(|i| i.op.is_terminator())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret_type: Type,
    pub params: Vec<Param>,
    pub blocks: Vec<BasicBlock>,
    /// Debug names indexed by SSA id; its length is the id counter.
    pub value_names: Vec<String>,
}

impl Function {
    /// Number of SSA ids reserved so far.
    #[inline]
    pub fn id_count(&self) -> u32 {
        self.value_names.len() as u32
    }

    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    pub fn block_index(&self, label: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.label == label)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Module {
    pub externs: Vec<Extern>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_extern(&self, name: &str) -> Option<&Extern> {
        self.externs.iter().find(|e| e.name == name)
    }

    pub fn find_global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Return type and parameter types of a declared or defined callee.
    pub fn callee_signature(&self, name: &str) -> Option<(Type, Vec<Type>)> {
        if let Some(e) = self.find_extern(name) {
            return Some((e.ret_type, e.params.clone()));
        }
        self.find_function(name)
            .map(|f| (f.ret_type, f.params.iter().map(|p| p.ty).collect()))
    }
}
