//! The flat, pre-SSA per-function IR (spec §3.2).
//!
//! Immutable from SSA construction onward: `cot-frontend`'s `SsaBuilder`
//! reads local IDs and string handles out of this structure but never
//! mutates it, matching the "Lifecycle" paragraph of spec §3.2.

use crate::ir::entities::{IrBlock, LocalId, NodeId, StringId};
use crate::ir::node::Node;
use crate::types::TypeId;
use cot_entity::PrimaryMap;
use std::collections::HashMap;

/// One entry in the local table. Params appear first, in declaration order
/// (spec §3.2 invariant).
#[derive(Clone, Debug)]
pub struct Local {
    pub name: String,
    pub ty: TypeId,
    pub size: u32,
    pub is_param: bool,
    /// Filled in later by the stack allocator (C7).
    pub stack_offset: Option<i32>,
}

/// An owned, deduplicated string literal.
#[derive(Clone, Debug)]
pub struct StringLiteral {
    pub bytes: Vec<u8>,
}

/// One block of the flat IR: an ordered sequence of node indices.
#[derive(Clone, Debug, Default)]
pub struct IrBlockData {
    pub nodes: Vec<NodeId>,
}

/// A complete flat-IR function, as produced by AST lowering.
pub struct IrFunction {
    pub name: String,
    pub params: Vec<LocalId>,
    pub ret_ty: TypeId,

    blocks: PrimaryMap<IrBlock, IrBlockData>,
    nodes: PrimaryMap<NodeId, Node>,
    locals: PrimaryMap<LocalId, Local>,
    strings: PrimaryMap<StringId, StringLiteral>,
    string_dedup: HashMap<Vec<u8>, StringId>,
}

impl IrFunction {
    pub fn new(name: impl Into<String>, ret_ty: TypeId) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret_ty,
            blocks: PrimaryMap::new(),
            nodes: PrimaryMap::new(),
            locals: PrimaryMap::new(),
            strings: PrimaryMap::new(),
            string_dedup: HashMap::new(),
        }
    }

    pub fn new_block(&mut self) -> IrBlock {
        self.blocks.push(IrBlockData::default())
    }

    pub fn block(&self, b: IrBlock) -> &IrBlockData {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: IrBlock) -> &mut IrBlockData {
        &mut self.blocks[b]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (IrBlock, &IrBlockData)> {
        self.blocks.iter()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node)
    }

    pub fn node(&self, n: NodeId) -> &Node {
        &self.nodes[n]
    }

    pub fn add_local(&mut self, name: impl Into<String>, ty: TypeId, size: u32, is_param: bool) -> LocalId {
        let id = self.locals.push(Local {
            name: name.into(),
            ty,
            size,
            is_param,
            stack_offset: None,
        });
        if is_param {
            self.params.push(id);
        }
        id
    }

    pub fn local(&self, l: LocalId) -> &Local {
        &self.locals[l]
    }

    pub fn local_mut(&mut self, l: LocalId) -> &mut Local {
        &mut self.locals[l]
    }

    pub fn locals(&self) -> impl Iterator<Item = (LocalId, &Local)> {
        self.locals.iter()
    }

    /// Intern a string literal by content (spec §3.2: "owned bytes with
    /// deduplication by content").
    pub fn add_string_literal(&mut self, bytes: &[u8]) -> StringId {
        if let Some(id) = self.string_dedup.get(bytes) {
            return *id;
        }
        let id = self.strings.push(StringLiteral {
            bytes: bytes.to_vec(),
        });
        self.string_dedup.insert(bytes.to_vec(), id);
        id
    }

    pub fn string(&self, s: StringId) -> &StringLiteral {
        &self.strings[s]
    }
}
