//! Cursor-based construction of IL functions.
//!
//! The builder owns a mutable borrow of a `Module` plus two cursors: the
//! current function and the current block. Every `emit_*` call appends to
//! the current block. Structural violations (unknown callee, duplicate
//! label, void parameter, appending after a terminator, branch arity
//! mismatch) panic; dangling temp references are debug assertions.

use smallvec::{SmallVec, smallvec};

use crate::module::{BasicBlock, BlockState, Extern, Function, Global, Instr, Module, Param};
use crate::{FastHashMap, Opcode, SourceLoc, Type, Value};

/// Index of a function within its module. Functions are only appended, so
/// ids stay valid for the builder's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FuncId(pub usize);

/// Handle to a block. Blocks are addressed by label because `insert_block`
/// shifts positions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub func: FuncId,
    pub label: String,
}

pub struct IrBuilder<'m> {
    module: &'m mut Module,
    cur_func: Option<FuncId>,
    cur_block: Option<BlockRef>,
    callee_ret: FastHashMap<String, Type>,
}

impl<'m> IrBuilder<'m> {
    pub fn new(module: &'m mut Module) -> Self {
        let mut callee_ret = FastHashMap::default();
        for e in &module.externs {
            callee_ret.insert(e.name.clone(), e.ret_type);
        }
        for f in &module.functions {
            callee_ret.insert(f.name.clone(), f.ret_type);
        }
        Self {
            module,
            cur_func: None,
            cur_block: None,
            callee_ret,
        }
    }

    pub fn module(&self) -> &Module {
        &*self.module
    }

    pub fn current_function(&self) -> Option<FuncId> {
        self.cur_func
    }

    pub fn current_block(&self) -> Option<&BlockRef> {
        self.cur_block.as_ref()
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.module.functions[id.0]
    }

    // ==================== Declarations ====================

    pub fn add_extern(&mut self, name: &str, ret_type: Type, params: Vec<Type>) -> &Extern {
        debug_assert!(
            self.module.find_extern(name).is_none(),
            "duplicate extern @{name}"
        );
        self.callee_ret.insert(name.to_string(), ret_type);
        self.module.externs.push(Extern {
            name: name.to_string(),
            ret_type,
            params,
        });
        let last = self.module.externs.len() - 1;
        &self.module.externs[last]
    }

    pub fn add_global(&mut self, name: &str, ty: Type, init: Vec<u8>) -> &Global {
        debug_assert!(!name.is_empty(), "global name must not be empty");
        self.module.globals.push(Global {
            name: name.to_string(),
            ty,
            init,
        });
        let last = self.module.globals.len() - 1;
        &self.module.globals[last]
    }

    pub fn add_global_str(&mut self, name: &str, literal: &str) -> &Global {
        self.add_global(name, Type::Str, literal.as_bytes().to_vec())
    }

    pub fn start_function(&mut self, name: &str, ret_type: Type, params: Vec<Param>) -> FuncId {
        assert!(
            self.module.find_function(name).is_none(),
            "function @{name} is already defined"
        );
        let mut func = Function {
            name: name.to_string(),
            ret_type,
            params,
            blocks: Vec::new(),
            value_names: Vec::new(),
        };
        for (i, p) in func.params.iter_mut().enumerate() {
            assert!(
                !p.ty.is_void(),
                "parameter '{}' of @{name} has void type",
                p.name
            );
            p.id = i as u32;
            func.value_names.push(p.name.clone());
        }
        log::trace!("start function @{name} ({} params)", func.params.len());

        self.callee_ret.insert(name.to_string(), ret_type);
        self.module.functions.push(func);
        let id = FuncId(self.module.functions.len() - 1);
        self.cur_func = Some(id);
        self.cur_block = None;
        id
    }

    pub fn create_block(&mut self, func: FuncId, label: &str, params: Vec<Param>) -> BlockRef {
        let f = &mut self.module.functions[func.0];
        assert!(
            f.block_index(label).is_none(),
            "duplicate block label '{label}' in @{}",
            f.name
        );
        let mut block = BasicBlock::new(label);
        block.params = params;
        for p in block.params.iter_mut() {
            assert!(
                !p.ty.is_void(),
                "block parameter '{}' of '{label}' has void type",
                p.name
            );
            p.id = f.value_names.len() as u32;
            f.value_names.push(p.name.clone());
        }
        log::debug!("@{}: block '{label}' ({} params)", f.name, block.params.len());
        f.blocks.push(block);
        BlockRef {
            func,
            label: label.to_string(),
        }
    }

    /// Inserts a parameterless block at `index`, clamped to the block count.
    pub fn insert_block(&mut self, func: FuncId, index: usize, label: &str) -> BlockRef {
        let f = &mut self.module.functions[func.0];
        assert!(
            f.block_index(label).is_none(),
            "duplicate block label '{label}' in @{}",
            f.name
        );
        let at = index.min(f.blocks.len());
        log::debug!("@{}: insert block '{label}' at {at}", f.name);
        f.blocks.insert(at, BasicBlock::new(label));
        BlockRef {
            func,
            label: label.to_string(),
        }
    }

    /// Moves the insertion cursor. The block's termination flag is untouched.
    pub fn set_insert_point(&mut self, block: &BlockRef) {
        assert!(
            self.module.functions[block.func.0]
                .block_index(&block.label)
                .is_some(),
            "unknown block '{}'",
            block.label
        );
        self.cur_func = Some(block.func);
        self.cur_block = Some(block.clone());
    }

    pub fn block(&self, block: &BlockRef) -> &BasicBlock {
        match self.module.functions[block.func.0].block(&block.label) {
            Some(b) => b,
            None => panic!("unknown block '{}'", block.label),
        }
    }

    pub fn block_state(&self, block: &BlockRef) -> BlockState {
        self.block(block).state()
    }

    pub fn reserve_temp_id(&mut self) -> u32 {
        let Some(func) = self.cur_func else {
            panic!("reserve_temp_id: no active function");
        };
        let f = &mut self.module.functions[func.0];
        let id = f.value_names.len() as u32;
        f.value_names.push(String::new());
        id
    }

    // ==================== Terminators ====================

    pub fn emit_br(&mut self, target: &BlockRef, args: Vec<Value>) {
        self.check_edge(target, &args);
        let mut instr = Instr::new(Opcode::Br, Type::Void);
        instr.labels.push(target.label.clone());
        instr.br_args.push(args);
        self.append(instr);
    }

    pub fn emit_cbr(
        &mut self,
        cond: Value,
        if_true: &BlockRef,
        true_args: Vec<Value>,
        if_false: &BlockRef,
        false_args: Vec<Value>,
    ) {
        self.check_edge(if_true, &true_args);
        self.check_edge(if_false, &false_args);
        let mut instr = Instr::new(Opcode::CBr, Type::Void);
        instr.operands.push(cond);
        instr.labels = smallvec![if_true.label.clone(), if_false.label.clone()];
        instr.br_args = smallvec![true_args, false_args];
        self.append(instr);
    }

    /// `operands[0]` is the scrutinee, `operands[1..]` the case constants;
    /// `labels[0]` is the default target.
    pub fn emit_switch_i32(&mut self, scrutinee: Value, default: &BlockRef, cases: &[(i32, BlockRef)]) {
        let mut instr = Instr::new(Opcode::SwitchI32, Type::Void);
        instr.operands.push(scrutinee);
        instr.labels.push(default.label.clone());
        instr.br_args.push(Vec::new());
        for (value, target) in cases {
            instr.operands.push(Value::ConstInt(i64::from(*value)));
            instr.labels.push(target.label.clone());
            instr.br_args.push(Vec::new());
        }
        self.append(instr);
    }

    pub fn emit_ret(&mut self, value: Option<Value>, loc: SourceLoc) {
        let mut instr = Instr::new(Opcode::Ret, Type::Void);
        instr.operands.extend(value);
        instr.loc = loc;
        self.append(instr);
    }

    pub fn emit_trap(&mut self, loc: SourceLoc) {
        let mut instr = Instr::new(Opcode::Trap, Type::Void);
        instr.loc = loc;
        self.append(instr);
    }

    pub fn emit_resume_same(&mut self, token: Value, loc: SourceLoc) {
        self.emit_resume(Opcode::ResumeSame, token, None, loc);
    }

    pub fn emit_resume_next(&mut self, token: Value, loc: SourceLoc) {
        self.emit_resume(Opcode::ResumeNext, token, None, loc);
    }

    pub fn emit_resume_label(&mut self, token: Value, target: &BlockRef, loc: SourceLoc) {
        self.emit_resume(Opcode::ResumeLabel, token, Some(target), loc);
    }

    fn emit_resume(&mut self, op: Opcode, token: Value, target: Option<&BlockRef>, loc: SourceLoc) {
        let mut instr = Instr::new(op, Type::Void);
        instr.operands.push(token);
        if let Some(target) = target {
            instr.labels.push(target.label.clone());
            instr.br_args.push(Vec::new());
        }
        instr.loc = loc;
        self.append(instr);
    }

    // ==================== Values ====================

    /// Appends a call. `dst`, when given, must be a temp reserved by the caller.
    pub fn emit_call(&mut self, callee: &str, args: Vec<Value>, dst: Option<Value>, loc: SourceLoc) {
        let Some(&ret) = self.callee_ret.get(callee) else {
            panic!("call to unknown callee @{callee}");
        };
        let result = dst.map(|d| match d {
            Value::Temp(id) => id,
            other => panic!("call destination must be a temp, got {other}"),
        });
        debug_assert!(
            result.is_none() || !ret.is_void(),
            "void callee @{callee} given a destination"
        );
        let mut instr = Instr::new(Opcode::Call, ret);
        instr.result = result;
        instr.callee = Some(callee.to_string());
        instr.operands = SmallVec::from_vec(args);
        instr.loc = loc;
        self.append(instr);
    }

    /// Like `emit_call`, reserving the destination when the callee returns a value.
    pub fn emit_call_ret(&mut self, callee: &str, args: Vec<Value>, loc: SourceLoc) -> Option<Value> {
        let Some(&ret) = self.callee_ret.get(callee) else {
            panic!("call to unknown callee @{callee}");
        };
        let dst = (!ret.is_void()).then(|| Value::Temp(self.reserve_temp_id()));
        self.emit_call(callee, args, dst.clone(), loc);
        dst
    }

    pub fn emit_const_str(&mut self, global: &str, loc: SourceLoc) -> Value {
        let id = self.reserve_temp_id();
        let mut instr = Instr::new(Opcode::ConstStr, Type::Str);
        instr.result = Some(id);
        instr.operands.push(Value::GlobalAddr(global.to_string()));
        instr.loc = loc;
        self.append(instr);
        Value::Temp(id)
    }

    /// Arithmetic, bitwise and comparison instructions. `ty` is the result type.
    pub fn emit_binary(&mut self, op: Opcode, ty: Type, lhs: Value, rhs: Value, loc: SourceLoc) -> Value {
        assert!(op.is_binary(), "{op} is not a binary opcode");
        debug_assert!(
            !op.is_comparison() || ty == Type::I1,
            "comparison {op} must produce i1"
        );
        let id = self.reserve_temp_id();
        let mut instr = Instr::new(op, ty);
        instr.result = Some(id);
        instr.operands = smallvec![lhs, rhs];
        instr.loc = loc;
        self.append(instr);
        Value::Temp(id)
    }

    // ==================== Internals ====================

    fn check_edge(&self, target: &BlockRef, args: &[Value]) {
        let block = self.block(target);
        assert!(
            args.len() == block.params.len(),
            "branch to '{}' passes {} arguments, block expects {}",
            target.label,
            args.len(),
            block.params.len()
        );
    }

    fn append(&mut self, instr: Instr) {
        let Some(cur) = self.cur_block.clone() else {
            panic!("no insertion point for {}", instr.op);
        };
        if let Some(target) = self.cur_func {
            assert!(target == cur.func, "insertion block belongs to another function");
        }
        let f = &mut self.module.functions[cur.func.0];
        let limit = f.value_names.len() as u32;
        if cfg!(debug_assertions) {
            let dangling = instr
                .operands
                .iter()
                .chain(instr.br_args.iter().flatten())
                .filter_map(Value::as_temp)
                .find(|id| *id >= limit);
            if let Some(id) = dangling {
                panic!("dangling temp %t{id} in {} (counter {limit})", instr.op);
            }
        }
        let fname = f.name.clone();
        let Some(block) = f.blocks.iter_mut().find(|b| b.label == cur.label) else {
            panic!("unknown block '{}'", cur.label);
        };
        assert!(
            !block.terminated,
            "cannot append {} to terminated block '{}' in @{fname}",
            instr.op,
            block.label
        );
        if instr.op.is_terminator() {
            block.terminated = true;
        }
        block.instructions.push(instr);
    }
}
