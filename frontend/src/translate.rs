//! The driver for spec §4.2: turns one finished `ir::IrFunction` into an
//! `ssa::Function`.
//!
//! Two passes over the block list. The first only allocates `ssa::BlockId`s
//! (reusing `Function::new`'s auto-created entry block for `ir_func`'s block
//! 0) and counts, for every block, how many *macro* predecessors it has —
//! found by scanning each block's terminator node, never by translating node
//! bodies. The second pass walks every block's nodes in order, translating
//! each into one or more SSA values and calling `SsaBuilder::seal_block` the
//! moment a block's macro predecessor count is satisfied. A block is sealed
//! strictly after the edge into it has actually been wired, so a loop
//! header's back edge (wired only once the loop body is translated, after
//! the header itself was already read from) goes through the builder's
//! ordinary incomplete-phi path rather than anything special-cased here.
//!
//! `LogicalAnd`/`LogicalOr` (spec §4.2 step 5) are the one place this
//! translator creates SSA blocks that don't correspond to any `ir::IrBlock`:
//! short-circuiting needs a branch, and that branch's `then`/`else` targets
//! and its join point are purely local to the one expression, so they're
//! synthesized, wired and sealed inline rather than planned for ahead of
//! time. The join's value is resolved via the ordinary `def_var`/`use_var`
//! machinery under a fresh synthetic `Variable` minted just for that one
//! expression, rather than a hand-built phi: reusing `SsaBuilder` here is
//! what "the SSA builder itself recognizes and short-circuits them" (spec
//! §4.2) means in practice.

use crate::ssa_builder::{remove_trivial_phis_to_fixpoint, SsaBuilder};
use crate::variable::Variable;
use cot_codegen::ir::{BinOp, IrBlock, IrFunction, LocalId, Node, NodeId, NodeKind, StringId, UnOp};
use cot_codegen::ssa::{AuxPtr, BlockId, BlockKind, Function, Op, ValueId};
use cot_codegen::types::{Primitive, TypeData, TypeId, TypeRegistry};
use cot_entity::EntityRef;
use std::collections::HashMap;

/// Per-function scratch state threaded through every `translate_*` helper.
struct TranslateCx<'a> {
    ir: &'a IrFunction,
    types: &'a TypeRegistry,
    builder: SsaBuilder,
    entry_of: Vec<BlockId>,
    expected_preds: Vec<u32>,
    wired: Vec<u32>,
    node_vals: HashMap<u32, ValueId>,
    synth_base: usize,
    synth_next: usize,
}

impl<'a> TranslateCx<'a> {
    fn fresh_var(&mut self) -> Variable {
        let v = LocalId::new(self.synth_base + self.synth_next);
        self.synth_next += 1;
        v
    }

    fn set_val(&mut self, node: NodeId, v: ValueId) {
        self.node_vals.insert(node.index() as u32, v);
    }

    fn val(&self, node: NodeId) -> ValueId {
        *self
            .node_vals
            .get(&(node.index() as u32))
            .unwrap_or_else(|| panic!("{node:?} used before it was translated"))
    }

    /// Record that `target`'s edge from one more predecessor has just been
    /// wired via `func.add_edge`; seal it once every edge it will ever get
    /// has landed.
    fn note_edge_wired(&mut self, func: &mut Function, target_ir_block: IrBlock) {
        let idx = target_ir_block.index();
        self.wired[idx] += 1;
        if self.wired[idx] == self.expected_preds[idx] {
            self.builder.seal_block(func, self.entry_of[idx]);
        }
    }
}

pub fn build_ssa(ir: &IrFunction, types: &TypeRegistry) -> Function {
    let mut func = Function::new(ir.name.clone(), types.size_of(ir.ret_ty));
    let mut builder = SsaBuilder::new();

    for (local_id, local) in ir.locals() {
        builder.declare_var(local_id, local.ty);
    }

    let num_blocks = ir.num_blocks();
    let mut entry_of: Vec<BlockId> = Vec::with_capacity(num_blocks);
    for (i, _) in ir.blocks() {
        entry_of.push(if i.index() == 0 {
            func.entry
        } else {
            func.new_block()
        });
    }

    let mut expected_preds = vec![0u32; num_blocks];
    for (_, data) in ir.blocks() {
        if let Some(&last) = data.nodes.last() {
            match &ir.node(last).kind {
                NodeKind::Jump(t) => expected_preds[t.index()] += 1,
                NodeKind::Branch {
                    then_blk, else_blk, ..
                } => {
                    expected_preds[then_blk.index()] += 1;
                    expected_preds[else_blk.index()] += 1;
                }
                _ => {}
            }
        }
    }

    for idx in 0..num_blocks {
        if expected_preds[idx] == 0 {
            builder.seal_block(&mut func, entry_of[idx]);
        }
    }

    // A string/slice parameter arrives as two incoming argument registers
    // (pointer half, length half), not one value of the aggregate type —
    // they have to be combined via `string_make`/`slice_make` before the
    // local can be bound to a single SSA value (spec §4.2 step 6), the
    // same shape `string_pair` builds for a `const` string argument.
    let mut next_reg = 0i64;
    for &local_id in ir.params.iter() {
        let ty = ir.local(local_id).ty;
        let v = match types.data(ty) {
            TypeData::Slice { elem } => {
                let is_string = matches!(types.data(*elem), TypeData::Primitive(Primitive::U8));
                let word_ty = types.primitive(Primitive::I64);

                let ptr = func.make_value(Op::Arg, word_ty);
                func.set_aux_int(ptr, next_reg);
                func.append_to_block(func.entry, ptr);
                next_reg += 1;

                let len = func.make_value(Op::Arg, word_ty);
                func.set_aux_int(len, next_reg);
                func.append_to_block(func.entry, len);
                next_reg += 1;

                let make_op = if is_string { Op::StringMake } else { Op::SliceMake };
                let made = func.make_value(make_op, ty);
                func.append_to_block(func.entry, made);
                func.add_arg(made, ptr);
                func.add_arg(made, len);
                made
            }
            _ => {
                let v = func.make_value(Op::Arg, ty);
                func.set_aux_int(v, next_reg);
                func.append_to_block(func.entry, v);
                next_reg += 1;
                v
            }
        };
        builder.def_var(func.entry, local_id, v);
    }

    let mut cx = TranslateCx {
        ir,
        types,
        builder,
        entry_of,
        expected_preds,
        wired: vec![0u32; num_blocks],
        node_vals: HashMap::new(),
        synth_base: ir.locals().count(),
        synth_next: 0,
    };

    for (i, data) in ir.blocks() {
        let mut cur = cx.entry_of[i.index()];

        for &node_id in &data.nodes {
            let node = ir.node(node_id).clone();
            match &node.kind {
                NodeKind::Jump(target) => {
                    func.block_mut(cur).kind = BlockKind::Plain;
                    let to = cx.entry_of[target.index()];
                    func.add_edge(cur, to);
                    cx.note_edge_wired(&mut func, *target);
                }
                NodeKind::Branch {
                    cond,
                    then_blk,
                    else_blk,
                } => {
                    let cond_val = cx.val(*cond);
                    func.block_mut(cur).kind = BlockKind::If;
                    func.block_mut(cur).control[0] = Some(cond_val);
                    let then_target = cx.entry_of[then_blk.index()];
                    func.add_edge(cur, then_target);
                    cx.note_edge_wired(&mut func, *then_blk);
                    let else_target = cx.entry_of[else_blk.index()];
                    func.add_edge(cur, else_target);
                    cx.note_edge_wired(&mut func, *else_blk);
                }
                NodeKind::Ret(val) => {
                    func.block_mut(cur).kind = BlockKind::Ret;
                    if let Some(v) = val {
                        let rv = cx.val(*v);
                        func.block_mut(cur).control[0] = Some(rv);
                    }
                }
                _ => {
                    if let Some(v) = translate_node(&mut cx, &mut func, &mut cur, &node) {
                        cx.set_val(node_id, v);
                    }
                }
            }
        }
    }

    remove_trivial_phis_to_fixpoint(&mut func);
    func
}

fn translate_node(cx: &mut TranslateCx, func: &mut Function, cur: &mut BlockId, node: &Node) -> Option<ValueId> {
    let ty = node.result_ty;
    match &node.kind {
        NodeKind::ConstInt(i) => Some(func.const_int(*cur, *i, ty)),
        NodeKind::ConstBool(b) => Some(func.const_int(*cur, if *b { 1 } else { 0 }, ty)),
        NodeKind::ConstFloat(bits) => {
            let v = func.make_value(Op::ConstFloat, ty);
            func.set_aux_int(v, *bits as i64);
            func.append_to_block(*cur, v);
            Some(v)
        }
        NodeKind::ConstNil => Some(func.const_int(*cur, 0, ty)),
        NodeKind::ConstString(sid) => Some(string_pair(cx, func, *cur, *sid)),
        NodeKind::StringHeader(sid) => Some(string_pair(cx, func, *cur, *sid)),

        NodeKind::Binary { op, lhs, rhs } => {
            let lv = cx.val(*lhs);
            let rv = cx.val(*rhs);
            let opc = bin_to_op(*op);
            let v = func.make_value(opc, ty);
            func.append_to_block(*cur, v);
            func.add_arg(v, lv);
            func.add_arg(v, rv);
            Some(v)
        }
        NodeKind::Unary { op, operand } => {
            let ov = cx.val(*operand);
            let opc = match op {
                UnOp::Neg => Op::Neg,
                UnOp::Not => Op::Not,
                UnOp::BNot => Op::BNot,
            };
            let v = func.make_value(opc, ty);
            func.append_to_block(*cur, v);
            func.add_arg(v, ov);
            Some(v)
        }

        NodeKind::LogicalAnd { lhs, rhs } => Some(translate_short_circuit(cx, func, cur, *lhs, *rhs, ty, true)),
        NodeKind::LogicalOr { lhs, rhs } => Some(translate_short_circuit(cx, func, cur, *lhs, *rhs, ty, false)),

        NodeKind::LoadLocal(local) => Some(cx.builder.use_var(func, *cur, *local)),
        NodeKind::StoreLocal(local, val) => {
            let v = cx.val(*val);
            cx.builder.def_var(*cur, *local, v);
            None
        }
        NodeKind::AddrLocal(local) => {
            let v = func.make_value(Op::LocalAddr, ty);
            func.set_aux_int(v, local.index() as i64);
            func.append_to_block(*cur, v);
            Some(v)
        }
        NodeKind::AddrGlobal(name) => {
            let v = func.make_value(Op::GlobalAddr, ty);
            func.set_aux_ptr(v, AuxPtr::GlobalName(name.clone()));
            func.append_to_block(*cur, v);
            Some(v)
        }

        NodeKind::FieldLocal { local, field } => {
            let local_ty = cx.ir.local(*local).ty;
            let off = cx
                .types
                .field_offset(local_ty, field)
                .unwrap_or_else(|| panic!("field {field:?} not found on local's type"));
            let ptr_ty = cx.types.primitive(Primitive::I64);
            let base = func.make_value(Op::LocalAddr, ptr_ty);
            func.set_aux_int(base, local.index() as i64);
            func.append_to_block(*cur, base);
            let v = func.make_value(Op::OffPtr, ty);
            func.set_aux_int(v, off as i64);
            func.append_to_block(*cur, v);
            func.add_arg(v, base);
            Some(v)
        }
        // `base`'s own declared result type doubles as the struct type it
        // addresses: this frontend never materializes a struct as a single
        // scalar SSA value, so `base` is always itself an address-producing
        // node (`FieldLocal`/`AddrLocal`/another `FieldValue`).
        NodeKind::FieldValue { base, field } => {
            let base_ty = cx.ir.node(*base).result_ty;
            let off = cx
                .types
                .field_offset(base_ty, field)
                .unwrap_or_else(|| panic!("field {field:?} not found on {base_ty:?}"));
            let base_ptr = cx.val(*base);
            let ptr_ty = cx.types.primitive(Primitive::I64);
            let addr = func.make_value(Op::OffPtr, ptr_ty);
            func.set_aux_int(addr, off as i64);
            func.append_to_block(*cur, addr);
            func.add_arg(addr, base_ptr);
            let v = func.make_value(Op::Load, ty);
            func.append_to_block(*cur, v);
            func.add_arg(v, addr);
            Some(v)
        }
        NodeKind::IndexLocal { local, index } => {
            let local_ty = cx.ir.local(*local).ty;
            let elem_size = match cx.types.data(local_ty) {
                TypeData::Array { elem, .. } => cx.types.size_of(*elem),
                TypeData::Slice { elem } => cx.types.size_of(*elem),
                _ => panic!("index_local on a non-indexable local type"),
            };
            let ptr_ty = cx.types.primitive(Primitive::I64);
            let base = func.make_value(Op::LocalAddr, ptr_ty);
            func.set_aux_int(base, local.index() as i64);
            func.append_to_block(*cur, base);
            let idx_val = cx.val(*index);
            let scale = func.const_int(*cur, elem_size as i64, ptr_ty);
            let scaled = func.make_value(Op::Mul, ptr_ty);
            func.append_to_block(*cur, scaled);
            func.add_arg(scaled, idx_val);
            func.add_arg(scaled, scale);
            let v = func.make_value(Op::AddPtr, ty);
            func.append_to_block(*cur, v);
            func.add_arg(v, base);
            func.add_arg(v, scaled);
            Some(v)
        }

        NodeKind::Call { callee, args } => Some(translate_call(cx, func, cur, callee, args, ty)),

        NodeKind::Nop => None,

        NodeKind::Ret(_) | NodeKind::Jump(_) | NodeKind::Branch { .. } => {
            unreachable!("terminators are handled by build_ssa's own match, not translate_node")
        }
    }
}

fn bin_to_op(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::SDiv => Op::SDiv,
        BinOp::UDiv => Op::UDiv,
        BinOp::SMod => Op::SMod,
        BinOp::BAnd => Op::BAnd,
        BinOp::BOr => Op::BOr,
        BinOp::BXor => Op::BXor,
        BinOp::Shl => Op::Shl,
        BinOp::Shr => Op::Shr,
        BinOp::AShr => Op::AShr,
        BinOp::Eq => Op::Eq,
        BinOp::Ne => Op::Ne,
        BinOp::Slt => Op::Slt,
        BinOp::Sle => Op::Sle,
        BinOp::Sgt => Op::Sgt,
        BinOp::Sge => Op::Sge,
        BinOp::Ult => Op::Ult,
        BinOp::Ule => Op::Ule,
    }
}

/// spec §4.2 step 5: `a && b` evaluates `b` only if `a` is true; `a || b`
/// evaluates `b` only if `a` is false. Both lower to a 2-way branch plus a
/// join whose value is read back through the ordinary variable machinery
/// under a synthetic `Variable` scoped to this one expression. These
/// synthetic blocks are never a target of any `ir::IrBlock`'s `Jump`/
/// `Branch`, so they're wired and sealed immediately rather than through
/// `note_edge_wired`'s macro-predecessor counting.
fn translate_short_circuit(
    cx: &mut TranslateCx,
    func: &mut Function,
    cur: &mut BlockId,
    lhs: NodeId,
    rhs: NodeId,
    ty: TypeId,
    is_and: bool,
) -> ValueId {
    let lhs_val = cx.val(lhs);
    let entry = *cur;
    let rhs_blk = func.new_block();
    let join_blk = func.new_block();

    func.block_mut(entry).kind = BlockKind::If;
    func.block_mut(entry).control[0] = Some(lhs_val);
    // `a && b`: true -> evaluate rhs, false -> short-circuit to `false`.
    // `a || b`: true -> short-circuit to `true`, false -> evaluate rhs.
    let (then_target, else_target) = if is_and { (rhs_blk, join_blk) } else { (join_blk, rhs_blk) };
    func.add_edge(entry, then_target);
    func.add_edge(entry, else_target);
    cx.builder.seal_block(func, rhs_blk);

    let short_circuit_val = func.const_int(entry, if is_and { 0 } else { 1 }, ty);
    let result_var = cx.fresh_var();
    cx.builder.declare_var(result_var, ty);
    cx.builder.def_var(entry, result_var, short_circuit_val);

    // `rhs` may itself be (or contain) another short-circuit expression, in
    // which case translating it moves the "current" block further still —
    // `rhs_cur` tracks wherever that ends up, since that's the block whose
    // end actually flows into `join_blk`, not necessarily `rhs_blk` itself.
    let rhs_node = cx.ir.node(rhs).clone();
    let mut rhs_cur = rhs_blk;
    let rhs_val = match translate_node(cx, func, &mut rhs_cur, &rhs_node) {
        Some(v) => v,
        None => panic!("rhs of a logical operator produced no value"),
    };
    func.block_mut(rhs_cur).kind = BlockKind::Plain;
    func.add_edge(rhs_cur, join_blk);
    cx.builder.def_var(rhs_cur, result_var, rhs_val);

    cx.builder.seal_block(func, join_blk);
    *cur = join_blk;
    cx.builder.use_var(func, join_blk, result_var)
}

fn string_pair(cx: &mut TranslateCx, func: &mut Function, block: BlockId, sid: StringId) -> ValueId {
    let ptr_ty = cx.types.primitive(Primitive::I64);
    let str_ty = cx
        .types
        .lookup_by_name("[u8]")
        .unwrap_or(ptr_ty); // falls back to a scalar placeholder if the caller never interned `[u8]`.

    let ptr = func.make_value(Op::ConstString, ptr_ty);
    func.set_aux_ptr(ptr, AuxPtr::GlobalName(format!("__cot_str_{}", sid.index())));
    func.append_to_block(block, ptr);

    let len = func.const_int(block, cx.ir.string(sid).bytes.len() as i64, ptr_ty);

    let v = func.make_value(Op::StringMake, str_ty);
    func.append_to_block(block, v);
    func.add_arg(v, ptr);
    func.add_arg(v, len);
    v
}

fn translate_call(
    cx: &mut TranslateCx,
    func: &mut Function,
    cur: &mut BlockId,
    callee: &str,
    args: &[NodeId],
    ret_ty: TypeId,
) -> ValueId {
    let mut arg_vals: Vec<ValueId> = Vec::with_capacity(args.len() + 1);
    for &a in args {
        let node = cx.ir.node(a);
        if let NodeKind::ConstString(sid) = &node.kind {
            // spec §4.4.1 step 1: a string-literal call argument passes as
            // its raw (pointer, length) pair rather than the `string_make`
            // aggregate a general expression would produce, so no later
            // pass (`expand_calls` included) ever needs to go back to the
            // IR's string table to recover the literal's length.
            let ptr_ty = cx.types.primitive(Primitive::I64);
            let ptr = func.make_value(Op::ConstString, ptr_ty);
            func.set_aux_ptr(ptr, AuxPtr::GlobalName(format!("__cot_str_{}", sid.index())));
            func.append_to_block(*cur, ptr);
            let len = func.const_int(*cur, cx.ir.string(*sid).bytes.len() as i64, ptr_ty);
            arg_vals.push(ptr);
            arg_vals.push(len);
        } else {
            arg_vals.push(cx.val(a));
        }
    }

    let v = func.make_value(Op::StaticCall, ret_ty);
    func.set_aux_ptr(v, AuxPtr::CalleeName(callee.to_string()));
    func.append_to_block(*cur, v);
    for a in arg_vals {
        func.add_arg(v, a);
    }
    v
}
