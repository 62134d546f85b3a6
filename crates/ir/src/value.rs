//! This module contains the IR value definition.
use std::io;

use crate::{
    ir_writer::WriteWithModule, module::FuncRef, GlobalVariable, InstId, Module,
};

/// An opaque reference to [`Value`].
///
/// Value ids are local to the function that defines them. Use [`FuncValue`]
/// when a value must be identified across functions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct ValueId(pub u32);
cranelift_entity::entity_impl!(ValueId);

/// An value data definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    /// The value is defined by an instruction.
    Inst { inst: InstId },

    /// The value is a function argument.
    Arg { idx: usize },

    /// The value is the address of a global variable.
    Global { gv: GlobalVariable },
}

/// A value qualified by the function that defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncValue {
    pub func: FuncRef,
    pub value: ValueId,
}

impl FuncValue {
    pub fn new(func: FuncRef, value: ValueId) -> Self {
        Self { func, value }
    }
}

impl WriteWithModule for FuncValue {
    fn write(&self, module: &Module, w: &mut impl io::Write) -> io::Result<()> {
        let func = &module.funcs[self.func];
        match func.dfg.value(self.value) {
            Value::Global { gv } => {
                write!(w, "%{}", module.globals.gv_data(*gv).symbol)
            }
            _ => write!(w, "%{}::v{}", func.sig.name(), self.value.0),
        }
    }
}
