use ks_il::{BlockState, IrBuilder, Module, Opcode, Param, SourceLoc, Type, Value, verify_module};

fn loc(line: u32) -> SourceLoc {
    SourceLoc::new(1, line, 1)
}

fn counting_loop() -> Module {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    b.add_extern("print_i32", Type::Void, vec![Type::I32]);
    let main = b.start_function("main", Type::Void, vec![]);
    let entry = b.create_block(main, "entry", vec![]);
    let header = b.create_block(main, "header", vec![Param::new("i", Type::I32)]);
    let body = b.create_block(main, "body", vec![Param::new("x", Type::I32)]);
    let exit = b.create_block(main, "exit", vec![]);
    let i = Value::temp(b.block(&header).params[0].id);
    let x = Value::temp(b.block(&body).params[0].id);

    b.set_insert_point(&entry);
    b.emit_br(&header, vec![Value::const_int(0)]);

    b.set_insert_point(&header);
    let cmp = b.emit_binary(Opcode::SCmpLT, Type::I1, i.clone(), Value::const_int(10), loc(2));
    b.emit_cbr(cmp, &body, vec![i], &exit, vec![]);

    b.set_insert_point(&body);
    b.emit_call("print_i32", vec![x.clone()], None, loc(3));
    let next = b.emit_binary(Opcode::Add, Type::I32, x, Value::const_int(1), loc(4));
    b.emit_br(&header, vec![next]);

    b.set_insert_point(&exit);
    b.emit_ret(None, loc(5));
    m
}

#[test]
fn counting_loop_is_well_formed() {
    let m = counting_loop();
    verify_module(&m).unwrap();
    let main = m.find_function("main").unwrap();
    assert_eq!(main.id_count(), 4);
    assert!(main.blocks.iter().all(|b| b.terminated));
    let call = &main.block("body").unwrap().instructions[0];
    assert_eq!(call.op, Opcode::Call);
    assert_eq!(call.ty, Type::Void);
    assert_eq!(call.result, None);
    assert_eq!(call.loc.line, 3);
}

#[test]
fn empty_function_with_ret_verifies() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("noop", Type::Void, vec![]);
    let entry = b.create_block(f, "entry", vec![]);
    b.set_insert_point(&entry);
    b.emit_ret(None, SourceLoc::UNKNOWN);
    assert_eq!(b.block_state(&entry), BlockState::Terminated);
    verify_module(&m).unwrap();
}

#[test]
fn ids_count_params_block_params_and_reserves() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function(
        "f",
        Type::I64,
        vec![Param::new("a", Type::I64), Param::new("b", Type::I64)],
    );
    assert_eq!(b.function(f).params[1].id, 1);
    let bb = b.create_block(f, "bb", vec![Param::new("p", Type::F64)]);
    assert_eq!(b.block(&bb).params[0].id, 2);
    assert_eq!(b.reserve_temp_id(), 3);
    assert_eq!(b.reserve_temp_id(), 4);
    assert_eq!(b.function(f).id_count(), 5);
    assert_eq!(b.function(f).value_names[0], "a");
    assert_eq!(b.function(f).value_names[2], "p");

    // A new function restarts numbering at zero.
    let g = b.start_function("g", Type::Void, vec![Param::new("q", Type::Ptr)]);
    assert_eq!(b.function(g).params[0].id, 0);
    assert_eq!(b.reserve_temp_id(), 1);
    assert_eq!(b.current_block(), None);
}

#[test]
fn block_state_moves_fresh_open_terminated() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    b.add_extern("tick", Type::I64, vec![]);
    let f = b.start_function("f", Type::I64, vec![]);
    let entry = b.create_block(f, "entry", vec![]);
    assert_eq!(b.block_state(&entry), BlockState::Fresh);
    b.set_insert_point(&entry);
    let v = b.emit_call_ret("tick", vec![], loc(1)).unwrap();
    assert_eq!(b.block_state(&entry), BlockState::Open);
    b.emit_ret(Some(v), loc(2));
    assert_eq!(b.block_state(&entry), BlockState::Terminated);

    // Moving the cursor away and back keeps the flag.
    let other = b.create_block(f, "other", vec![]);
    b.set_insert_point(&other);
    b.set_insert_point(&entry);
    assert_eq!(b.block_state(&entry), BlockState::Terminated);
}

#[test]
fn insert_block_clamps_position() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("f", Type::Void, vec![]);
    b.create_block(f, "a", vec![]);
    b.create_block(f, "b", vec![]);
    b.insert_block(f, 1, "mid");
    b.insert_block(f, 99, "tail");
    let labels: Vec<_> = b.function(f).blocks.iter().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, ["a", "mid", "b", "tail"]);
    assert!(b.function(f).blocks[1].params.is_empty());
}

#[test]
fn call_result_type_comes_from_callee() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    b.add_extern("rt_str_len", Type::I64, vec![Type::Str]);
    b.add_global_str(".L0", "hello");
    let f = b.start_function("len", Type::I64, vec![]);
    let entry = b.create_block(f, "entry", vec![]);
    b.set_insert_point(&entry);
    let s = b.emit_const_str(".L0", loc(1));
    let dst = Value::temp(b.reserve_temp_id());
    b.emit_call("rt_str_len", vec![s], Some(dst.clone()), loc(1));
    b.emit_ret(Some(dst), loc(1));

    let instrs = &m.functions[0].blocks[0].instructions;
    assert_eq!(instrs[0].op, Opcode::ConstStr);
    assert_eq!(instrs[0].ty, Type::Str);
    assert_eq!(instrs[1].ty, Type::I64);
    assert_eq!(instrs[1].result, Some(1));
    assert_eq!(m.globals[0].init, b"hello");
    verify_module(&m).unwrap();
}

#[test]
fn calls_to_functions_defined_earlier_resolve() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let callee = b.start_function("answer", Type::I32, vec![]);
    let e = b.create_block(callee, "entry", vec![]);
    b.set_insert_point(&e);
    b.emit_ret(Some(Value::const_int(42)), SourceLoc::UNKNOWN);

    let caller = b.start_function("main", Type::I32, vec![]);
    let e = b.create_block(caller, "entry", vec![]);
    b.set_insert_point(&e);
    let v = b.emit_call_ret("answer", vec![], SourceLoc::UNKNOWN);
    b.emit_ret(v, SourceLoc::UNKNOWN);
    verify_module(&m).unwrap();
}

#[test]
fn builder_over_existing_module_knows_its_callees() {
    let mut m = Module::new();
    {
        let mut b = IrBuilder::new(&mut m);
        b.add_extern("rt_gc_collect", Type::I64, vec![]);
    }
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("main", Type::Void, vec![]);
    let e = b.create_block(f, "entry", vec![]);
    b.set_insert_point(&e);
    assert!(b.emit_call_ret("rt_gc_collect", vec![], SourceLoc::UNKNOWN).is_some());
    b.emit_ret(None, SourceLoc::UNKNOWN);
    verify_module(&m).unwrap();
}

#[test]
fn switch_and_resume_terminators() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function(
        "dispatch",
        Type::Void,
        vec![Param::new("k", Type::I32), Param::new("tok", Type::ResumeTok)],
    );
    let entry = b.create_block(f, "entry", vec![]);
    let one = b.create_block(f, "one", vec![]);
    let two = b.create_block(f, "two", vec![]);
    let other = b.create_block(f, "other", vec![]);
    let tok = Value::temp(1);

    b.set_insert_point(&entry);
    b.emit_switch_i32(Value::temp(0), &other, &[(1, one.clone()), (2, two.clone())]);
    b.set_insert_point(&one);
    b.emit_resume_same(tok.clone(), loc(1));
    b.set_insert_point(&two);
    b.emit_resume_label(tok.clone(), &other, loc(2));
    b.set_insert_point(&other);
    b.emit_resume_next(tok, loc(3));

    let sw = &b.block(&entry).instructions[0];
    assert_eq!(sw.labels.as_slice(), ["other", "one", "two"]);
    let cases: Vec<_> = sw.switch_cases().collect();
    assert_eq!(cases, [(1, "one"), (2, "two")]);
    assert!(b.function(f).blocks.iter().all(|bb| bb.terminated));
    verify_module(&m).unwrap();
}

#[test]
#[should_panic(expected = "unknown callee")]
fn unknown_callee_is_fatal() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("main", Type::Void, vec![]);
    let e = b.create_block(f, "entry", vec![]);
    b.set_insert_point(&e);
    b.emit_call("missing", vec![], None, SourceLoc::UNKNOWN);
}

#[test]
#[should_panic(expected = "terminated block")]
fn appending_after_terminator_is_fatal() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("main", Type::Void, vec![]);
    let e = b.create_block(f, "entry", vec![]);
    b.set_insert_point(&e);
    b.emit_ret(None, SourceLoc::UNKNOWN);
    b.emit_trap(SourceLoc::UNKNOWN);
}

#[test]
#[should_panic(expected = "passes 0 arguments, block expects 1")]
fn branch_arity_mismatch_is_fatal() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("main", Type::Void, vec![]);
    let e = b.create_block(f, "entry", vec![]);
    let t = b.create_block(f, "t", vec![Param::new("v", Type::I64)]);
    b.set_insert_point(&e);
    b.emit_br(&t, vec![]);
}

#[test]
#[should_panic(expected = "duplicate block label")]
fn duplicate_label_is_fatal() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    let f = b.start_function("main", Type::Void, vec![]);
    b.create_block(f, "entry", vec![]);
    b.insert_block(f, 0, "entry");
}

#[test]
#[should_panic(expected = "void type")]
fn void_parameter_is_fatal() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    b.start_function("main", Type::Void, vec![Param::new("v", Type::Void)]);
}

#[test]
#[should_panic(expected = "already defined")]
fn duplicate_function_is_fatal() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    b.start_function("main", Type::Void, vec![]);
    b.start_function("main", Type::Void, vec![]);
}

#[test]
#[should_panic(expected = "no active function")]
fn reserve_without_function_is_fatal() {
    let mut m = Module::new();
    let mut b = IrBuilder::new(&mut m);
    b.reserve_temp_id();
}
