use ks_il::module::{BasicBlock, Function, Instr};
use ks_il::{IrBuilder, Module, Opcode, Param, SourceLoc, Type, Value, VerifyError, verify_module};

fn ret_block(label: &str) -> BasicBlock {
    let mut b = BasicBlock::new(label);
    b.instructions.push(Instr::new(Opcode::Ret, Type::Void));
    b.terminated = true;
    b
}

fn void_fn(name: &str, blocks: Vec<BasicBlock>) -> Function {
    Function {
        name: name.to_string(),
        ret_type: Type::Void,
        params: Vec::new(),
        blocks,
        value_names: Vec::new(),
    }
}

#[test]
fn rejects_block_without_terminator() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("f", Type::Void, vec![]);
    b.create_block(f, "entry", vec![]);
    let err = verify_module(&m).unwrap_err();
    assert!(matches!(err, VerifyError::Unterminated { .. }), "{err}");
}

#[test]
fn rejects_function_without_blocks() {
    let mut m = Module::new();
    m.functions.push(void_fn("f", vec![]));
    assert_eq!(
        verify_module(&m).unwrap_err(),
        VerifyError::NoBlocks { func: "f".into() }
    );
}

#[test]
fn rejects_terminator_in_the_middle() {
    let mut block = ret_block("entry");
    block.instructions.push(Instr::new(Opcode::Ret, Type::Void));
    let mut m = Module::new();
    m.functions.push(void_fn("f", vec![block]));
    let err = verify_module(&m).unwrap_err();
    assert!(matches!(err, VerifyError::EarlyTerminator { op: Opcode::Ret, .. }));
}

#[test]
fn rejects_branch_to_missing_block_and_bad_arity() {
    let mut br = Instr::new(Opcode::Br, Type::Void);
    br.labels.push("nowhere".into());
    br.br_args.push(Vec::new());
    let mut entry = BasicBlock::new("entry");
    entry.instructions.push(br.clone());
    let mut m = Module::new();
    m.functions.push(void_fn("f", vec![entry]));
    assert!(matches!(
        verify_module(&m).unwrap_err(),
        VerifyError::UnknownTarget { .. }
    ));

    let mut target = ret_block("t");
    target.params.push(Param::new("p", Type::I64));
    br.labels[0] = "t".into();
    let mut entry = BasicBlock::new("entry");
    entry.instructions.push(br);
    let mut f = void_fn("f", vec![entry, target]);
    f.value_names.push("p".into());
    m.functions = vec![f];
    let err = verify_module(&m).unwrap_err();
    assert!(
        matches!(err, VerifyError::BranchArity { got: 0, expected: 1, .. }),
        "{err}"
    );
}

#[test]
fn rejects_call_type_mismatch() {
    let mut m = Module::new();
    {
        let mut b = IrBuilder::new(&mut m);
        b.add_extern("now", Type::I64, vec![]);
        let f = b.start_function("main", Type::Void, vec![]);
        let e = b.create_block(f, "entry", vec![]);
        b.set_insert_point(&e);
        b.emit_call_ret("now", vec![], SourceLoc::UNKNOWN);
        b.emit_ret(None, SourceLoc::UNKNOWN);
    }
    m.functions[0].blocks[0].instructions[0].ty = Type::F64;
    let err = verify_module(&m).unwrap_err();
    assert!(matches!(err, VerifyError::CallType { expected: Type::I64, .. }), "{err}");
}

#[test]
fn rejects_call_arity_and_unknown_callee() {
    let mut m = Module::new();
    {
        let mut b = IrBuilder::new(&mut m);
        b.add_extern("put", Type::Void, vec![Type::I64]);
        let f = b.start_function("main", Type::Void, vec![]);
        let e = b.create_block(f, "entry", vec![]);
        b.set_insert_point(&e);
        b.emit_call("put", vec![], None, SourceLoc::UNKNOWN);
        b.emit_ret(None, SourceLoc::UNKNOWN);
    }
    assert!(matches!(
        verify_module(&m).unwrap_err(),
        VerifyError::CallArity { got: 0, expected: 1, .. }
    ));
    m.externs.clear();
    assert!(matches!(
        verify_module(&m).unwrap_err(),
        VerifyError::UnknownCallee { .. }
    ));
}

#[test]
fn rejects_dangling_and_redefined_temps() {
    let mut ret = Instr::new(Opcode::Ret, Type::I64);
    ret.operands.push(Value::temp(7));
    let mut entry = BasicBlock::new("entry");
    entry.instructions.push(ret);
    let mut f = void_fn("f", vec![entry]);
    f.ret_type = Type::I64;
    let mut m = Module::new();
    m.functions.push(f);
    assert!(matches!(
        verify_module(&m).unwrap_err(),
        VerifyError::DanglingTemp { id: 7, count: 0, .. }
    ));

    let mut add = Instr::new(Opcode::Add, Type::I64);
    add.result = Some(0);
    add.operands.push(Value::temp(0));
    add.operands.push(Value::const_int(1));
    let mut entry = ret_block("entry");
    entry.instructions.insert(0, add);
    let mut f = void_fn("g", vec![entry]);
    f.params.push(Param::new("x", Type::I64));
    f.value_names.push("x".into());
    m.functions = vec![f];
    assert!(matches!(
        verify_module(&m).unwrap_err(),
        VerifyError::Redefined { id: 0, .. }
    ));
}

#[test]
fn rejects_return_shape_mismatch() {
    let mut m = Module::new();
    let mut f = void_fn("f", vec![ret_block("entry")]);
    f.ret_type = Type::I32;
    m.functions.push(f);
    assert!(matches!(
        verify_module(&m).unwrap_err(),
        VerifyError::BadReturn { .. }
    ));
}

#[test]
fn rejects_duplicate_symbols() {
    let mut m = Module::new();
    m.functions.push(void_fn("f", vec![ret_block("entry")]));
    m.functions.push(void_fn("f", vec![ret_block("entry")]));
    let err = verify_module(&m).unwrap_err();
    assert_eq!(err.to_string(), "duplicate function @f");
}
