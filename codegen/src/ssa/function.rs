//! The SSA `Block`/`Function` (spec §3.3).

use crate::ssa::entities::{BlockId, ValueId};
use crate::ssa::op::Op;
use crate::ssa::value::{AuxPtr, Value};
use crate::types::TypeId;
use cot_entity::PrimaryMap;
use std::collections::HashMap;

/// What terminates a block.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Plain,
    If,
    Ret,
    Exit,
}

/// A successor edge. `dest_index` is this edge's index in the *target*
/// block's `preds` list, so the bidirectional invariant (spec §8.1 #2) can
/// be checked in O(1) from either side.
#[derive(Copy, Clone, Debug)]
pub struct SuccEdge {
    pub block: BlockId,
    pub dest_index: usize,
}

/// A predecessor edge, the mirror of [`SuccEdge`].
#[derive(Copy, Clone, Debug)]
pub struct PredEdge {
    pub block: BlockId,
    pub src_index: usize,
}

/// One SSA block.
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub values: Vec<ValueId>,
    pub succs: Vec<SuccEdge>,
    pub preds: Vec<PredEdge>,
    /// `if`'s condition value, or `ret`'s return value. At most one is
    /// meaningful, matching spec §3.3's "0-2 control values" (0 for
    /// `Plain`/`Exit`, 1 for `If`/`Ret`; kept as two optional slots rather
    /// than one so a future two-operand control op doesn't need a shape
    /// change).
    pub control: [Option<ValueId>; 2],
}

impl Block {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            kind: BlockKind::Plain,
            values: Vec::new(),
            succs: Vec::new(),
            preds: Vec::new(),
            control: [None, None],
        }
    }
}

/// A complete SSA function, after C2.
pub struct Function {
    pub name: String,
    pub entry: BlockId,
    pub ret_size: u32,
    /// Reverse-postorder block list; populated by `schedule` (C3). Empty
    /// (and `scheduled == false`) until then.
    pub layout: Vec<BlockId>,
    pub scheduled: bool,
    pub laidout: bool,

    blocks: PrimaryMap<BlockId, Block>,
    values: PrimaryMap<ValueId, Value>,
    /// The constant cache (spec §3.3 invariant 4): `const_int` values with
    /// identical payload are canonicalized to one `Value` per function.
    const_int_cache: HashMap<i64, ValueId>,
}

impl Function {
    pub fn new(name: impl Into<String>, ret_size: u32) -> Self {
        let mut blocks: PrimaryMap<BlockId, Block> = PrimaryMap::new();
        let entry = blocks.next_key();
        blocks.push(Block::new(entry));
        Self {
            name: name.into(),
            entry,
            ret_size,
            layout: Vec::new(),
            scheduled: false,
            laidout: false,
            blocks,
            values: PrimaryMap::new(),
            const_int_cache: HashMap::new(),
        }
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = self.blocks.next_key();
        let mut b = Block::new(id);
        b.id = id;
        self.blocks.push(b);
        id
    }

    pub fn block(&self, b: BlockId) -> &Block {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: BlockId) -> &mut Block {
        &mut self.blocks[b]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Link `from -> to` with a fresh bidirectional edge pair.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        let dest_index = self.blocks[to].preds.len();
        let src_index = self.blocks[from].succs.len();
        self.blocks[from].succs.push(SuccEdge {
            block: to,
            dest_index,
        });
        self.blocks[to].preds.push(PredEdge {
            block: from,
            src_index,
        });
    }

    /// Append a brand-new value to `block` and return its id. Most callers
    /// should use `build_value`, which also sets up args/aux via the
    /// use-count-safe helpers below.
    pub fn make_value(&mut self, op: Op, result_ty: TypeId) -> ValueId {
        let id = self.values.next_key();
        self.values.push(Value::new(id, op, result_ty));
        id
    }

    pub fn append_to_block(&mut self, block: BlockId, value: ValueId) {
        self.blocks[block].values.push(value);
    }

    pub fn value(&self, v: ValueId) -> &Value {
        &self.values[v]
    }

    pub fn value_mut(&mut self, v: ValueId) -> &mut Value {
        &mut self.values[v]
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.values.iter()
    }

    pub fn num_values(&self) -> usize {
        self.values.len()
    }

    /// Clear `v`'s argument list, decrementing every former argument's use
    /// count. Per spec §9: never assign into `Value::args` directly.
    pub fn reset_args(&mut self, v: ValueId) {
        let old: SmallVecArgs = self.values[v].args.clone();
        self.values[v].args.clear();
        for a in old {
            self.values[a].bump_uses(-1);
        }
    }

    /// Append `arg` to `v`'s argument list, incrementing `arg`'s use count.
    pub fn add_arg(&mut self, v: ValueId, arg: ValueId) {
        self.values[v].args.push(arg);
        self.values[arg].bump_uses(1);
    }

    /// Overwrite a single argument slot in place (still use-count safe).
    pub fn set_arg(&mut self, v: ValueId, index: usize, new_arg: ValueId) {
        let old_arg = self.values[v].args[index];
        self.values[old_arg].bump_uses(-1);
        self.values[v].args[index] = new_arg;
        self.values[new_arg].bump_uses(1);
    }

    pub fn set_aux_int(&mut self, v: ValueId, aux: i64) {
        self.values[v].aux_int = Some(aux);
    }

    pub fn set_aux_ptr(&mut self, v: ValueId, aux: AuxPtr) {
        self.values[v].aux_ptr = Some(aux);
    }

    /// Build and canonicalize a `const_int`, per spec §3.3 invariant 4.
    pub fn const_int(&mut self, block: BlockId, value: i64, ty: TypeId) -> ValueId {
        if let Some(&id) = self.const_int_cache.get(&value) {
            return id;
        }
        let id = self.make_value(Op::ConstInt, ty);
        self.set_aux_int(id, value);
        self.append_to_block(block, id);
        self.const_int_cache.insert(value, id);
        id
    }

    /// Remove `v` from its owning block's value list (used by dead-code
    /// elimination and by `decompose`'s rewrite rules). Does not touch
    /// `v`'s own use count or its arguments' use counts; callers that are
    /// actually deleting the value (not just relocating it) must call
    /// `reset_args` first.
    pub fn remove_from_block(&mut self, block: BlockId, v: ValueId) {
        self.blocks[block].values.retain(|&x| x != v);
    }
}

type SmallVecArgs = smallvec::SmallVec<[ValueId; 4]>;
