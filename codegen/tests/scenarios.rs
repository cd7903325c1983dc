//! End-to-end pipeline tests: hand-built flat IR through SSA construction
//! (`cot-frontend`), the pass pipeline, register allocation, stack layout
//! and ARM64 encoding. Each test builds one small function's `IrFunction`
//! directly (the way `cot-frontend`'s own `translate` tests do — there is
//! no AST lowerer in this core to drive the builder from source text),
//! then runs it through `build_ssa` and `Context::compile`.
//!
//! Assertions stay at the shape level (non-empty code, relocation kind and
//! target, a trailing `ret`) rather than exact instruction encodings; the
//! unit tests colocated with `isa::arm64::emit` already cover individual
//! instruction bit patterns.

use cot_codegen::ir::{IrFunction, Node, NodeKind, BinOp, Span};
use cot_codegen::isa::arm64::RelocKind;
use cot_codegen::settings::{Flags, SUPPORTED_TRIPLE};
use cot_codegen::ssa::{BlockKind, Function, Op};
use cot_codegen::types::{Primitive, TypeRegistry};
use cot_codegen::Context;
use cot_entity::EntityRef;
use cot_frontend::build_ssa;

fn span() -> Span {
    Span::default()
}

const RET: [u8; 4] = 0xD65F_03C0u32.to_le_bytes();

fn ends_in_ret(code: &[u8]) {
    assert!(code.len() >= 4, "encoded function has no instructions");
    assert_eq!(&code[code.len() - 4..], &RET, "function body doesn't end in `ret`");
}

/// Scenario 1 (spec §8.3): `fn answer() -> i64 { return 42; }`. The
/// smallest possible function: one block, one constant, one `ret`.
#[test]
fn return_literal() {
    let types = TypeRegistry::new();
    let i64_ty = types.primitive(Primitive::I64);

    let mut ir = IrFunction::new("answer", i64_ty);
    let entry = ir.new_block();
    let c = ir.push_node(Node {
        kind: NodeKind::ConstInt(42),
        result_ty: i64_ty,
        span: span(),
    });
    let ret = ir.push_node(Node {
        kind: NodeKind::Ret(Some(c)),
        result_ty: i64_ty,
        span: span(),
    });
    ir.block_mut(entry).nodes.push(c);
    ir.block_mut(entry).nodes.push(ret);

    let func = build_ssa(&ir, &types);
    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert!(encoded.relocs.is_empty());
}

/// Scenario 2: `fn add() -> i64 { return 20 + 22; }`. Exercises the
/// constant cache (both operands are distinct constants) and a plain
/// `Binary` node.
#[test]
fn arithmetic() {
    let types = TypeRegistry::new();
    let i64_ty = types.primitive(Primitive::I64);

    let mut ir = IrFunction::new("add", i64_ty);
    let entry = ir.new_block();
    let lhs = ir.push_node(Node {
        kind: NodeKind::ConstInt(20),
        result_ty: i64_ty,
        span: span(),
    });
    let rhs = ir.push_node(Node {
        kind: NodeKind::ConstInt(22),
        result_ty: i64_ty,
        span: span(),
    });
    let sum = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Add, lhs, rhs },
        result_ty: i64_ty,
        span: span(),
    });
    let ret = ir.push_node(Node {
        kind: NodeKind::Ret(Some(sum)),
        result_ty: i64_ty,
        span: span(),
    });
    for n in [lhs, rhs, sum, ret] {
        ir.block_mut(entry).nodes.push(n);
    }

    let func = build_ssa(&ir, &types);
    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert!(encoded.relocs.is_empty());
}

/// Scenario 3: `fn factorial(n: i64) -> i64 { if n <= 1 { 1 } else { n *
/// factorial(n - 1) } }`. The `else` arm loads `n` once and uses that same
/// node both as the recursive call's argument and, after the call returns,
/// as the multiplicand — so the register allocator must keep it live
/// across a `static_call`.
#[test]
fn recursive_factorial() {
    let types = TypeRegistry::new();
    let i64_ty = types.primitive(Primitive::I64);
    let void_ty = types.primitive(Primitive::Void);

    let mut ir = IrFunction::new("factorial", i64_ty);
    let n = ir.add_local("n", i64_ty, 8, true);

    let entry = ir.new_block();
    assert_eq!(entry.index(), 0);
    let then_blk = ir.new_block();
    let else_blk = ir.new_block();

    let n_load = ir.push_node(Node { kind: NodeKind::LoadLocal(n), result_ty: i64_ty, span: span() });
    let one = ir.push_node(Node { kind: NodeKind::ConstInt(1), result_ty: i64_ty, span: span() });
    let cmp = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Sle, lhs: n_load, rhs: one },
        result_ty: types.primitive(Primitive::Bool),
        span: span(),
    });
    let branch = ir.push_node(Node {
        kind: NodeKind::Branch { cond: cmp, then_blk, else_blk },
        result_ty: void_ty,
        span: span(),
    });
    for nd in [n_load, one, cmp, branch] {
        ir.block_mut(entry).nodes.push(nd);
    }

    let one_ret = ir.push_node(Node { kind: NodeKind::ConstInt(1), result_ty: i64_ty, span: span() });
    let ret_then = ir.push_node(Node { kind: NodeKind::Ret(Some(one_ret)), result_ty: i64_ty, span: span() });
    ir.block_mut(then_blk).nodes.push(one_ret);
    ir.block_mut(then_blk).nodes.push(ret_then);

    // `n` is loaded exactly once here and referenced by both the subtraction
    // feeding the recursive call and the multiply consuming its result.
    let n_load2 = ir.push_node(Node { kind: NodeKind::LoadLocal(n), result_ty: i64_ty, span: span() });
    let one2 = ir.push_node(Node { kind: NodeKind::ConstInt(1), result_ty: i64_ty, span: span() });
    let n_minus_1 = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Sub, lhs: n_load2, rhs: one2 },
        result_ty: i64_ty,
        span: span(),
    });
    let call = ir.push_node(Node {
        kind: NodeKind::Call { callee: "factorial".to_string(), args: vec![n_minus_1] },
        result_ty: i64_ty,
        span: span(),
    });
    let mul = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Mul, lhs: n_load2, rhs: call },
        result_ty: i64_ty,
        span: span(),
    });
    let ret_else = ir.push_node(Node { kind: NodeKind::Ret(Some(mul)), result_ty: i64_ty, span: span() });
    for nd in [n_load2, one2, n_minus_1, call, mul, ret_else] {
        ir.block_mut(else_blk).nodes.push(nd);
    }

    let func = build_ssa(&ir, &types);
    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert_eq!(encoded.relocs.len(), 1);
    assert_eq!(encoded.relocs[0].symbol, "factorial");
    assert_eq!(encoded.relocs[0].kind, RelocKind::Branch26);
}

/// Scenario 4: a function returning a struct bigger than 16 bytes, so the
/// AAPCS64 hidden-return-pointer convention kicks in (spec §4.5). There is
/// no IR-level node for "store through a computed address", so this
/// builds the `ssa::Function` directly — the same shortcut
/// `Context::compile`'s own colocated test uses for a trivial return —
/// rather than going through the C1 builder. `Context::compile` still
/// infers `uses_hidden_return` itself from `ir_func`'s (empty-params,
/// `Point`-returning) signature, so no hidden-return bookkeeping needs to
/// be hand-built here beyond the `x8` capture.
#[test]
fn large_struct_return() {
    let mut types = TypeRegistry::new();
    let i64_ty = types.primitive(Primitive::I64);
    let void_ty = types.primitive(Primitive::Void);
    let ptr_ty = types.intern_pointer(i64_ty);
    let point_ty = types.intern_struct(
        "Point",
        &[
            ("x".to_string(), i64_ty),
            ("y".to_string(), i64_ty),
            ("z".to_string(), i64_ty),
        ],
    );

    let mut ir = IrFunction::new("make_point", point_ty);

    let mut func = Function::new("make_point", types.size_of(point_ty));
    let entry = func.entry;

    let hrp = func.make_value(Op::LoadReg, ptr_ty);
    func.set_aux_int(hrp, 8);
    func.append_to_block(entry, hrp);

    // Point.x at offset 0.
    let x_val = func.const_int(entry, 1, i64_ty);
    let store_x = func.make_value(Op::Store, void_ty);
    func.add_arg(store_x, hrp);
    func.add_arg(store_x, x_val);
    func.append_to_block(entry, store_x);

    // Point.y at offset 8.
    let off8 = func.const_int(entry, 8, i64_ty);
    let addr_y = func.make_value(Op::Add, ptr_ty);
    func.add_arg(addr_y, hrp);
    func.add_arg(addr_y, off8);
    func.append_to_block(entry, addr_y);
    let y_val = func.const_int(entry, 2, i64_ty);
    let store_y = func.make_value(Op::Store, void_ty);
    func.add_arg(store_y, addr_y);
    func.add_arg(store_y, y_val);
    func.append_to_block(entry, store_y);

    // Point.z at offset 16.
    let off16 = func.const_int(entry, 16, i64_ty);
    let addr_z = func.make_value(Op::Add, ptr_ty);
    func.add_arg(addr_z, hrp);
    func.add_arg(addr_z, off16);
    func.append_to_block(entry, addr_z);
    let z_val = func.const_int(entry, 3, i64_ty);
    let store_z = func.make_value(Op::Store, void_ty);
    func.add_arg(store_z, addr_z);
    func.add_arg(store_z, z_val);
    func.append_to_block(entry, store_z);

    func.block_mut(entry).kind = BlockKind::Ret;

    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert!(encoded.relocs.is_empty());
}

/// Scenario 5: a call with nine integer arguments, one more than fit in
/// `x0..=x7`, so the ABI resolver is forced to place the ninth on the
/// stack (spec §4.5).
#[test]
fn nine_argument_call() {
    let types = TypeRegistry::new();
    let i64_ty = types.primitive(Primitive::I64);

    let mut ir = IrFunction::new("call_sum9", i64_ty);
    let entry = ir.new_block();

    let mut args = Vec::with_capacity(9);
    let mut nodes = Vec::with_capacity(11);
    for i in 1..=9i64 {
        let c = ir.push_node(Node { kind: NodeKind::ConstInt(i), result_ty: i64_ty, span: span() });
        nodes.push(c);
        args.push(c);
    }
    let call = ir.push_node(Node {
        kind: NodeKind::Call { callee: "sum9".to_string(), args },
        result_ty: i64_ty,
        span: span(),
    });
    nodes.push(call);
    let ret = ir.push_node(Node { kind: NodeKind::Ret(Some(call)), result_ty: i64_ty, span: span() });
    nodes.push(ret);
    for n in nodes {
        ir.block_mut(entry).nodes.push(n);
    }

    let func = build_ssa(&ir, &types);
    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert_eq!(encoded.relocs.len(), 1);
    assert_eq!(encoded.relocs[0].symbol, "sum9");
    assert_eq!(encoded.relocs[0].kind, RelocKind::Branch26);
}

/// Scenario 6: a loop that calls a runtime helper on every iteration and
/// carries its result around the back edge, exercising genuine (non-trivial)
/// phi construction on a loop header plus `translate_call`'s string-literal
/// argument special case (spec §4.4.1 step 1: a literal argument passes as
/// its raw pointer/length pair, not a `string_make` aggregate). Modeled as
/// `__cot_str_concat_len(current_len, "x") -> new_len` rather than a full
/// string-returning concat, since there is no IR-level node that extracts a
/// slice's length back out of an aggregate call result (only the SSA-level
/// `decompose` pass knows how to do that, and only for values it introduced
/// itself via `string_make`/`slice_make`).
#[test]
fn loop_with_runtime_call() {
    let mut types = TypeRegistry::new();
    let i64_ty = types.primitive(Primitive::I64);
    let void_ty = types.primitive(Primitive::Void);
    let bool_ty = types.primitive(Primitive::Bool);

    let mut ir = IrFunction::new("count_concats", i64_ty);
    let len = ir.add_local("len", i64_ty, 8, false);
    let i = ir.add_local("i", i64_ty, 8, false);
    let x_lit = ir.add_string_literal(b"x");

    let entry = ir.new_block();
    let header = ir.new_block();
    let body = ir.new_block();
    let exit = ir.new_block();

    let zero_len = ir.push_node(Node { kind: NodeKind::ConstInt(0), result_ty: i64_ty, span: span() });
    let store_len0 = ir.push_node(Node { kind: NodeKind::StoreLocal(len, zero_len), result_ty: void_ty, span: span() });
    let zero_i = ir.push_node(Node { kind: NodeKind::ConstInt(0), result_ty: i64_ty, span: span() });
    let store_i0 = ir.push_node(Node { kind: NodeKind::StoreLocal(i, zero_i), result_ty: void_ty, span: span() });
    let jump_header = ir.push_node(Node { kind: NodeKind::Jump(header), result_ty: void_ty, span: span() });
    for n in [zero_len, store_len0, zero_i, store_i0, jump_header] {
        ir.block_mut(entry).nodes.push(n);
    }

    let i_load = ir.push_node(Node { kind: NodeKind::LoadLocal(i), result_ty: i64_ty, span: span() });
    let three = ir.push_node(Node { kind: NodeKind::ConstInt(3), result_ty: i64_ty, span: span() });
    let cond = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Slt, lhs: i_load, rhs: three },
        result_ty: bool_ty,
        span: span(),
    });
    let branch = ir.push_node(Node {
        kind: NodeKind::Branch { cond, then_blk: body, else_blk: exit },
        result_ty: void_ty,
        span: span(),
    });
    for n in [i_load, three, cond, branch] {
        ir.block_mut(header).nodes.push(n);
    }

    let len_load = ir.push_node(Node { kind: NodeKind::LoadLocal(len), result_ty: i64_ty, span: span() });
    let lit = ir.push_node(Node { kind: NodeKind::ConstString(x_lit), result_ty: i64_ty, span: span() });
    let call = ir.push_node(Node {
        kind: NodeKind::Call {
            callee: "__cot_str_concat_len".to_string(),
            args: vec![len_load, lit],
        },
        result_ty: i64_ty,
        span: span(),
    });
    let store_len = ir.push_node(Node { kind: NodeKind::StoreLocal(len, call), result_ty: void_ty, span: span() });
    let i_load2 = ir.push_node(Node { kind: NodeKind::LoadLocal(i), result_ty: i64_ty, span: span() });
    let one = ir.push_node(Node { kind: NodeKind::ConstInt(1), result_ty: i64_ty, span: span() });
    let inc = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Add, lhs: i_load2, rhs: one },
        result_ty: i64_ty,
        span: span(),
    });
    let store_i = ir.push_node(Node { kind: NodeKind::StoreLocal(i, inc), result_ty: void_ty, span: span() });
    let jump_back = ir.push_node(Node { kind: NodeKind::Jump(header), result_ty: void_ty, span: span() });
    for n in [len_load, lit, call, store_len, i_load2, one, inc, store_i, jump_back] {
        ir.block_mut(body).nodes.push(n);
    }

    let len_final = ir.push_node(Node { kind: NodeKind::LoadLocal(len), result_ty: i64_ty, span: span() });
    let ret = ir.push_node(Node { kind: NodeKind::Ret(Some(len_final)), result_ty: i64_ty, span: span() });
    ir.block_mut(exit).nodes.push(len_final);
    ir.block_mut(exit).nodes.push(ret);

    let func = build_ssa(&ir, &types);
    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert_eq!(encoded.relocs.len(), 1);
    assert_eq!(encoded.relocs[0].symbol, "__cot_str_concat_len");
}

/// Scenario 7: `fn check(a, b, c: bool) -> bool { return a || b || c; }`,
/// parsed as `(a || b) || c`. Per spec §4.2 step 5 the SSA builder itself
/// recognizes `LogicalOr` and short-circuits it, so each `rhs` operand node
/// (`b`, `c`) must exist in the node pool for `translate_short_circuit` to
/// reach, but must **not** also appear in the enclosing block's node list —
/// otherwise the main per-block translation loop would translate it a
/// second time before the short-circuit branch ever runs.
#[test]
fn chained_logical_or() {
    let types = TypeRegistry::new();
    let bool_ty = types.primitive(Primitive::Bool);

    let mut ir = IrFunction::new("check", bool_ty);
    let a = ir.add_local("a", bool_ty, 1, true);
    let b = ir.add_local("b", bool_ty, 1, true);
    let c = ir.add_local("c", bool_ty, 1, true);
    let entry = ir.new_block();

    let a_load = ir.push_node(Node { kind: NodeKind::LoadLocal(a), result_ty: bool_ty, span: span() });
    let b_load = ir.push_node(Node { kind: NodeKind::LoadLocal(b), result_ty: bool_ty, span: span() }); // detached
    let inner_or = ir.push_node(Node {
        kind: NodeKind::LogicalOr { lhs: a_load, rhs: b_load },
        result_ty: bool_ty,
        span: span(),
    });
    let c_load = ir.push_node(Node { kind: NodeKind::LoadLocal(c), result_ty: bool_ty, span: span() }); // detached
    let outer_or = ir.push_node(Node {
        kind: NodeKind::LogicalOr { lhs: inner_or, rhs: c_load },
        result_ty: bool_ty,
        span: span(),
    });
    let ret = ir.push_node(Node { kind: NodeKind::Ret(Some(outer_or)), result_ty: bool_ty, span: span() });

    // `b_load` and `c_load` deliberately excluded: they're reached only
    // through `translate_short_circuit`.
    for n in [a_load, inner_or, outer_or, ret] {
        ir.block_mut(entry).nodes.push(n);
    }

    let func = build_ssa(&ir, &types);
    assert!(func.num_blocks() > 1, "short-circuiting must synthesize branch blocks");
    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert!(encoded.relocs.is_empty());
}

/// Scenario 8: a three-way `if`/`else if`/`else` assigning a local `r`
/// differently in each arm before a shared `return r;`, producing a
/// three-predecessor phi at the join block.
#[test]
fn switch_as_if_else_chain() {
    let types = TypeRegistry::new();
    let i64_ty = types.primitive(Primitive::I64);
    let void_ty = types.primitive(Primitive::Void);
    let bool_ty = types.primitive(Primitive::Bool);

    let mut ir = IrFunction::new("classify", i64_ty);
    let n = ir.add_local("n", i64_ty, 8, true);
    let r = ir.add_local("r", i64_ty, 8, false);

    let entry = ir.new_block();
    let eq0_blk = ir.new_block();
    let not0_blk = ir.new_block();
    let eq1_blk = ir.new_block();
    let else_blk = ir.new_block();
    let join_blk = ir.new_block();

    let n_load = ir.push_node(Node { kind: NodeKind::LoadLocal(n), result_ty: i64_ty, span: span() });
    let zero = ir.push_node(Node { kind: NodeKind::ConstInt(0), result_ty: i64_ty, span: span() });
    let cmp0 = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Eq, lhs: n_load, rhs: zero },
        result_ty: bool_ty,
        span: span(),
    });
    let branch0 = ir.push_node(Node {
        kind: NodeKind::Branch { cond: cmp0, then_blk: eq0_blk, else_blk: not0_blk },
        result_ty: void_ty,
        span: span(),
    });
    for nd in [n_load, zero, cmp0, branch0] {
        ir.block_mut(entry).nodes.push(nd);
    }

    let ten = ir.push_node(Node { kind: NodeKind::ConstInt(10), result_ty: i64_ty, span: span() });
    let store_r0 = ir.push_node(Node { kind: NodeKind::StoreLocal(r, ten), result_ty: void_ty, span: span() });
    let jump0 = ir.push_node(Node { kind: NodeKind::Jump(join_blk), result_ty: void_ty, span: span() });
    for nd in [ten, store_r0, jump0] {
        ir.block_mut(eq0_blk).nodes.push(nd);
    }

    let n_load2 = ir.push_node(Node { kind: NodeKind::LoadLocal(n), result_ty: i64_ty, span: span() });
    let one = ir.push_node(Node { kind: NodeKind::ConstInt(1), result_ty: i64_ty, span: span() });
    let cmp1 = ir.push_node(Node {
        kind: NodeKind::Binary { op: BinOp::Eq, lhs: n_load2, rhs: one },
        result_ty: bool_ty,
        span: span(),
    });
    let branch1 = ir.push_node(Node {
        kind: NodeKind::Branch { cond: cmp1, then_blk: eq1_blk, else_blk },
        result_ty: void_ty,
        span: span(),
    });
    for nd in [n_load2, one, cmp1, branch1] {
        ir.block_mut(not0_blk).nodes.push(nd);
    }

    let twenty = ir.push_node(Node { kind: NodeKind::ConstInt(20), result_ty: i64_ty, span: span() });
    let store_r1 = ir.push_node(Node { kind: NodeKind::StoreLocal(r, twenty), result_ty: void_ty, span: span() });
    let jump1 = ir.push_node(Node { kind: NodeKind::Jump(join_blk), result_ty: void_ty, span: span() });
    for nd in [twenty, store_r1, jump1] {
        ir.block_mut(eq1_blk).nodes.push(nd);
    }

    let thirty = ir.push_node(Node { kind: NodeKind::ConstInt(30), result_ty: i64_ty, span: span() });
    let store_r2 = ir.push_node(Node { kind: NodeKind::StoreLocal(r, thirty), result_ty: void_ty, span: span() });
    let jump2 = ir.push_node(Node { kind: NodeKind::Jump(join_blk), result_ty: void_ty, span: span() });
    for nd in [thirty, store_r2, jump2] {
        ir.block_mut(else_blk).nodes.push(nd);
    }

    let r_load = ir.push_node(Node { kind: NodeKind::LoadLocal(r), result_ty: i64_ty, span: span() });
    let ret = ir.push_node(Node { kind: NodeKind::Ret(Some(r_load)), result_ty: i64_ty, span: span() });
    ir.block_mut(join_blk).nodes.push(r_load);
    ir.block_mut(join_blk).nodes.push(ret);

    let func = build_ssa(&ir, &types);
    assert_eq!(func.block(func.entry).kind, BlockKind::If);
    let flags = Flags::new(SUPPORTED_TRIPLE);
    let encoded = Context::new(func).compile(&mut ir, &types, &flags).unwrap();

    ends_in_ret(&encoded.code);
    assert!(encoded.relocs.is_empty());
}
