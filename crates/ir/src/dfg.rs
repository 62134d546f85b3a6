//! This module contains the IR data flow graph.
use cranelift_entity::{entity_impl, packed_option::PackedOption, PrimaryMap, SecondaryMap};
use rustc_hash::FxHashMap;

use crate::{inst::InstId, GlobalVariable, InstData};

use super::{Value, ValueId};

#[derive(Debug, Clone, Default)]
pub struct DataFlowGraph {
    #[doc(hidden)]
    pub blocks: PrimaryMap<BlockId, Block>,
    #[doc(hidden)]
    pub values: PrimaryMap<ValueId, Value>,
    insts: PrimaryMap<InstId, InstData>,
    inst_results: SecondaryMap<InstId, PackedOption<ValueId>>,
    globals: FxHashMap<GlobalVariable, ValueId>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_block(&mut self) -> BlockId {
        self.blocks.push(Block::new())
    }

    pub fn make_value(&mut self, value: Value) -> ValueId {
        self.values.push(value)
    }

    pub fn make_inst(&mut self, inst: InstData) -> InstId {
        self.insts.push(inst)
    }

    pub fn make_arg_value(&mut self, idx: usize) -> ValueId {
        self.make_value(Value::Arg { idx })
    }

    /// Returns the address value of the global variable. The value is shared
    /// by all uses in the function.
    pub fn make_global_value(&mut self, gv: GlobalVariable) -> ValueId {
        if let Some(&value) = self.globals.get(&gv) {
            return value;
        }

        let value = self.make_value(Value::Global { gv });
        self.globals.insert(gv, value);
        value
    }

    pub fn attach_result(&mut self, inst_id: InstId, value_id: ValueId) {
        debug_assert!(self.inst_results[inst_id].is_none());
        self.inst_results[inst_id] = value_id.into();
    }

    pub fn inst(&self, inst_id: InstId) -> &InstData {
        &self.insts[inst_id]
    }

    pub fn value(&self, value_id: ValueId) -> &Value {
        &self.values[value_id]
    }

    pub fn inst_result(&self, inst_id: InstId) -> Option<ValueId> {
        self.inst_results[inst_id].expand()
    }

    /// Returns the instruction that defines `value`, if any.
    pub fn value_inst(&self, value: ValueId) -> Option<InstId> {
        match self.value(value) {
            Value::Inst { inst } => Some(*inst),
            _ => None,
        }
    }

    /// Returns the data of the instruction that defines `value`, if any.
    pub fn value_inst_data(&self, value: ValueId) -> Option<&InstData> {
        self.value_inst(value).map(|inst| self.inst(inst))
    }

    pub fn is_terminator(&self, inst: InstId) -> bool {
        self.inst(inst).is_terminator()
    }

    pub fn is_apply(&self, inst: InstId) -> bool {
        matches!(self.inst(inst), InstData::Apply { .. })
    }
}

/// An opaque reference to a block.
#[derive(Clone, PartialEq, Eq, Copy, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);
entity_impl!(BlockId, "block");

/// A block data definition.
/// A Block data doesn't hold any information for layout of a program. It is managed by
/// [`super::layout::Layout`].
#[derive(Debug, Clone, Default)]
pub struct Block {}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }
}
