//! The IR Builder (C1, spec §4.1): the mutation API the (out-of-scope)
//! lowering phase uses to build flat IR function-by-function.
//!
//! Modeled on `cranelift-codegen`'s cursor idiom (`cursor.rs`): the builder
//! tracks a "current block" position, and `emit_*` helpers append to both
//! the node pool and the current block's node list. Emitting a terminator
//! does **not** close the current block automatically — per spec §4.1's
//! contract, the caller must call `set_current_block` before appending
//! anything else.

use crate::ir::entities::{IrBlock, LocalId, NodeId, StringId};
use crate::ir::function::IrFunction;
use crate::ir::node::{BinOp, Node, NodeKind, Span, UnOp};
use crate::types::TypeId;

/// Builds one [`IrFunction`] at a time.
pub struct IrBuilder {
    func: IrFunction,
    current: Option<IrBlock>,
    void_ty: TypeId,
}

impl IrBuilder {
    /// Start building a new function. Mirrors `start_func(name, params,
    /// ret_type)` from spec §4.1; params are declared separately via
    /// `add_param` so the caller controls declaration order (they must
    /// appear first in the local table, per spec §3.2). `void_ty` is the
    /// registry's reserved `Primitive::Void` type, used for every node that
    /// doesn't produce a usable value.
    pub fn start_func(name: impl Into<String>, ret_type: TypeId, void_ty: TypeId) -> Self {
        Self {
            func: IrFunction::new(name, ret_type),
            current: None,
            void_ty,
        }
    }

    /// Create a new block. Does not switch the builder's position to it.
    pub fn new_block(&mut self) -> IrBlock {
        self.func.new_block()
    }

    /// Switch the cursor to `block`. Subsequent `emit_*` calls append there.
    pub fn set_current_block(&mut self, block: IrBlock) {
        self.current = Some(block);
    }

    /// Declare a local. `is_param` locals must be declared, in order,
    /// before any non-param local (spec §3.2 invariant).
    pub fn add_local(&mut self, name: impl Into<String>, ty: TypeId, size: u32, is_param: bool) -> LocalId {
        self.func.add_local(name, ty, size, is_param)
    }

    /// Declare a parameter. Convenience wrapper around `add_local` that
    /// also records it as a function parameter in declaration order.
    pub fn add_param(&mut self, name: impl Into<String>, ty: TypeId, size: u32) -> LocalId {
        self.add_local(name, ty, size, true)
    }

    /// Intern a string literal (deduplicated by content).
    pub fn add_string_literal(&mut self, bytes: &[u8]) -> StringId {
        self.func.add_string_literal(bytes)
    }

    fn current_block(&self) -> IrBlock {
        self.current
            .expect("set_current_block must be called before emitting")
    }

    fn emit(&mut self, kind: NodeKind, result_ty: TypeId, span: Span) -> NodeId {
        let id = self.func.push_node(Node {
            kind,
            result_ty,
            span,
        });
        let block = self.current_block();
        self.func.block_mut(block).nodes.push(id);
        id
    }

    pub fn emit_const_int(&mut self, v: i64, ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::ConstInt(v), ty, span)
    }

    pub fn emit_const_bool(&mut self, v: bool, ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::ConstBool(v), ty, span)
    }

    pub fn emit_const_float(&mut self, bits: u64, ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::ConstFloat(bits), ty, span)
    }

    pub fn emit_const_string(&mut self, s: StringId, ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::ConstString(s), ty, span)
    }

    pub fn emit_binary(&mut self, op: BinOp, lhs: NodeId, rhs: NodeId, ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::Binary { op, lhs, rhs }, ty, span)
    }

    pub fn emit_unary(&mut self, op: UnOp, operand: NodeId, ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::Unary { op, operand }, ty, span)
    }

    pub fn emit_logical_and(&mut self, lhs: NodeId, rhs: NodeId, bool_ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::LogicalAnd { lhs, rhs }, bool_ty, span)
    }

    pub fn emit_logical_or(&mut self, lhs: NodeId, rhs: NodeId, bool_ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::LogicalOr { lhs, rhs }, bool_ty, span)
    }

    pub fn emit_load_local(&mut self, local: LocalId, ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::LoadLocal(local), ty, span)
    }

    pub fn emit_store_local(&mut self, local: LocalId, value: NodeId, span: Span) -> NodeId {
        self.emit(NodeKind::StoreLocal(local, value), self.void_ty, span)
    }

    pub fn emit_addr_local(&mut self, local: LocalId, ptr_ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::AddrLocal(local), ptr_ty, span)
    }

    pub fn emit_addr_global(&mut self, name: impl Into<String>, ptr_ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::AddrGlobal(name.into()), ptr_ty, span)
    }

    /// Load of `base.field` by value. Per spec §4.2 step 4, pass the
    /// field's own type when it is itself a composite; pass `Void` for a
    /// scalar field (the scalar extraction happens via address + load).
    pub fn emit_field_value(&mut self, base: NodeId, field: impl Into<String>, result_ty: TypeId, span: Span) -> NodeId {
        self.emit(
            NodeKind::FieldValue {
                base,
                field: field.into(),
            },
            result_ty,
            span,
        )
    }

    pub fn emit_field_local(&mut self, local: LocalId, field: impl Into<String>, ptr_ty: TypeId, span: Span) -> NodeId {
        self.emit(
            NodeKind::FieldLocal {
                local,
                field: field.into(),
            },
            ptr_ty,
            span,
        )
    }

    pub fn emit_index_local(&mut self, local: LocalId, index: NodeId, ptr_ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::IndexLocal { local, index }, ptr_ty, span)
    }

    pub fn emit_call(&mut self, callee: impl Into<String>, args: Vec<NodeId>, ret_ty: TypeId, span: Span) -> NodeId {
        self.emit(
            NodeKind::Call {
                callee: callee.into(),
                args,
            },
            ret_ty,
            span,
        )
    }

    /// Emits a terminator. Per spec §4.1, this does not close the current
    /// block; the caller must `set_current_block` before emitting again.
    pub fn emit_ret(&mut self, value: Option<NodeId>, span: Span) -> NodeId {
        let void = self.void_ty;
        self.emit(NodeKind::Ret(value), void, span)
    }

    pub fn emit_jump(&mut self, target: IrBlock, span: Span) -> NodeId {
        let void = self.void_ty;
        self.emit(NodeKind::Jump(target), void, span)
    }

    pub fn emit_branch(&mut self, cond: NodeId, then_blk: IrBlock, else_blk: IrBlock, span: Span) -> NodeId {
        let void = self.void_ty;
        self.emit(
            NodeKind::Branch {
                cond,
                then_blk,
                else_blk,
            },
            void,
            span,
        )
    }

    pub fn emit_nop(&mut self, span: Span) -> NodeId {
        let void = self.void_ty;
        self.emit(NodeKind::Nop, void, span)
    }

    pub fn emit_string_header(&mut self, s: StringId, string_ty: TypeId, span: Span) -> NodeId {
        self.emit(NodeKind::StringHeader(s), string_ty, span)
    }

    /// Finish building and hand over ownership of the function.
    pub fn finish(self) -> IrFunction {
        self.func
    }
}
