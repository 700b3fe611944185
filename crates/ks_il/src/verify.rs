//! Structural verification of finished modules.

use thiserror::Error;

use crate::module::{BasicBlock, Function, Instr};
use crate::{FastHashSet, Module, Opcode, Type, Value};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("duplicate {kind} @{name}")]
    DuplicateSymbol { kind: &'static str, name: String },
    #[error("@{func}: function has no blocks")]
    NoBlocks { func: String },
    #[error("@{func}: duplicate block label '{label}'")]
    DuplicateLabel { func: String, label: String },
    #[error("@{func}: void parameter '{name}'")]
    VoidParam { func: String, name: String },
    #[error("@{func}: block '{block}' does not end in a terminator")]
    Unterminated { func: String, block: String },
    #[error("@{func}: block '{block}' has {op} before its end")]
    EarlyTerminator { func: String, block: String, op: Opcode },
    #[error("@{func}: block '{block}' branches to unknown block '{target}'")]
    UnknownTarget {
        func: String,
        block: String,
        target: String,
    },
    #[error("@{func}: block '{block}' passes {got} arguments to '{target}', which expects {expected}")]
    BranchArity {
        func: String,
        block: String,
        target: String,
        got: usize,
        expected: usize,
    },
    #[error("@{func}: call to unknown callee @{callee}")]
    UnknownCallee { func: String, callee: String },
    #[error("@{func}: call to @{callee} typed {got}, callee returns {expected}")]
    CallType {
        func: String,
        callee: String,
        got: Type,
        expected: Type,
    },
    #[error("@{func}: call to @{callee} passes {got} arguments, callee takes {expected}")]
    CallArity {
        func: String,
        callee: String,
        got: usize,
        expected: usize,
    },
    #[error("@{func}: temp %t{id} is out of range (counter {count})")]
    DanglingTemp { func: String, id: u32, count: u32 },
    #[error("@{func}: temp %t{id} is defined more than once")]
    Redefined { func: String, id: u32 },
    #[error("@{func}: {detail}")]
    BadReturn { func: String, detail: &'static str },
}

pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    let mut seen = FastHashSet::default();
    for e in &module.externs {
        if !seen.insert(e.name.as_str()) {
            return Err(VerifyError::DuplicateSymbol {
                kind: "extern",
                name: e.name.clone(),
            });
        }
    }
    for f in &module.functions {
        if !seen.insert(f.name.as_str()) {
            return Err(VerifyError::DuplicateSymbol {
                kind: "function",
                name: f.name.clone(),
            });
        }
    }
    let mut globals = FastHashSet::default();
    for g in &module.globals {
        if !globals.insert(g.name.as_str()) {
            return Err(VerifyError::DuplicateSymbol {
                kind: "global",
                name: g.name.clone(),
            });
        }
    }
    for f in &module.functions {
        verify_function(module, f)?;
    }
    Ok(())
}

fn verify_function(module: &Module, f: &Function) -> Result<(), VerifyError> {
    let func = || f.name.clone();
    if f.blocks.is_empty() {
        return Err(VerifyError::NoBlocks { func: func() });
    }

    let count = f.id_count();
    let mut defined = FastHashSet::default();
    let mut define = |id: u32| -> Result<(), VerifyError> {
        if id >= count {
            return Err(VerifyError::DanglingTemp {
                func: f.name.clone(),
                id,
                count,
            });
        }
        if !defined.insert(id) {
            return Err(VerifyError::Redefined {
                func: f.name.clone(),
                id,
            });
        }
        Ok(())
    };

    for p in &f.params {
        if p.ty.is_void() {
            return Err(VerifyError::VoidParam {
                func: func(),
                name: p.name.clone(),
            });
        }
        define(p.id)?;
    }

    let mut labels = FastHashSet::default();
    for b in &f.blocks {
        if !labels.insert(b.label.as_str()) {
            return Err(VerifyError::DuplicateLabel {
                func: func(),
                label: b.label.clone(),
            });
        }
        for p in &b.params {
            if p.ty.is_void() {
                return Err(VerifyError::VoidParam {
                    func: func(),
                    name: p.name.clone(),
                });
            }
            define(p.id)?;
        }
    }

    for b in &f.blocks {
        let Some((last, body)) = b.instructions.split_last() else {
            return Err(VerifyError::Unterminated {
                func: func(),
                block: b.label.clone(),
            });
        };
        if !last.op.is_terminator() {
            return Err(VerifyError::Unterminated {
                func: func(),
                block: b.label.clone(),
            });
        }
        if let Some(early) = body.iter().find(|i| i.op.is_terminator()) {
            return Err(VerifyError::EarlyTerminator {
                func: func(),
                block: b.label.clone(),
                op: early.op,
            });
        }
        for instr in &b.instructions {
            check_operands(f, instr)?;
            if let Some(id) = instr.result {
                define(id)?;
            }
            match instr.op {
                Opcode::Call => check_call(module, f, instr)?,
                Opcode::Ret => check_ret(f, instr)?,
                _ => {}
            }
            check_edges(f, b, instr)?;
        }
    }
    Ok(())
}

fn check_operands(f: &Function, instr: &Instr) -> Result<(), VerifyError> {
    let count = f.id_count();
    let temps = instr
        .operands
        .iter()
        .chain(instr.br_args.iter().flatten())
        .filter_map(Value::as_temp);
    for id in temps {
        if id >= count {
            return Err(VerifyError::DanglingTemp {
                func: f.name.clone(),
                id,
                count,
            });
        }
    }
    Ok(())
}

fn check_call(module: &Module, f: &Function, instr: &Instr) -> Result<(), VerifyError> {
    let callee = instr.callee.clone().unwrap_or_default();
    let Some((ret, params)) = module.callee_signature(&callee) else {
        return Err(VerifyError::UnknownCallee {
            func: f.name.clone(),
            callee,
        });
    };
    if instr.ty != ret {
        return Err(VerifyError::CallType {
            func: f.name.clone(),
            callee,
            got: instr.ty,
            expected: ret,
        });
    }
    if instr.operands.len() != params.len() {
        return Err(VerifyError::CallArity {
            func: f.name.clone(),
            callee,
            got: instr.operands.len(),
            expected: params.len(),
        });
    }
    Ok(())
}

fn check_ret(f: &Function, instr: &Instr) -> Result<(), VerifyError> {
    let detail = match (f.ret_type.is_void(), instr.operands.is_empty()) {
        (true, false) => "ret with a value in a void function",
        (false, true) => "ret without a value in a non-void function",
        _ => return Ok(()),
    };
    Err(VerifyError::BadReturn {
        func: f.name.clone(),
        detail,
    })
}

fn check_edges(f: &Function, b: &BasicBlock, instr: &Instr) -> Result<(), VerifyError> {
    for (i, target) in instr.labels.iter().enumerate() {
        let Some(dest) = f.block(target) else {
            return Err(VerifyError::UnknownTarget {
                func: f.name.clone(),
                block: b.label.clone(),
                target: target.clone(),
            });
        };
        let got = instr.br_args.get(i).map_or(0, Vec::len);
        if got != dest.params.len() {
            return Err(VerifyError::BranchArity {
                func: f.name.clone(),
                block: b.label.clone(),
                target: target.clone(),
                got,
                expected: dest.params.len(),
            });
        }
    }
    Ok(())
}
