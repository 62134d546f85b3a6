use std::io;

use smallvec::SmallVec;

use super::{DataFlowGraph, Layout, ValueId};
use crate::{ir_writer::WriteWithModule, side_effect::FuncSideEffects, Linkage, Module};

#[derive(Debug, Clone)]
pub struct Function {
    /// Signature of the function.
    pub sig: Signature,
    pub arg_values: SmallVec<[ValueId; 8]>,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
}

impl Function {
    pub fn new(sig: Signature) -> Self {
        let mut dfg = DataFlowGraph::new();
        let arg_values = (0..sig.num_params())
            .map(|idx| dfg.make_arg_value(idx))
            .collect();

        Self {
            sig,
            arg_values,
            dfg,
            layout: Layout::default(),
        }
    }

    /// Returns `true` if the body of the function is visible.
    pub fn is_definition(&self) -> bool {
        self.sig.linkage().has_definition() && self.layout.entry_block().is_some()
    }

    /// Returns the argument value bound to the `idx`th parameter.
    pub fn arg_value(&self, idx: usize) -> Option<ValueId> {
        self.arg_values.get(idx).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    /// Name of the function.
    name: String,

    /// Linkage of the function.
    linkage: Linkage,

    num_params: usize,

    /// Declared memory effects. Only meaningful for functions without a body.
    effects: Option<FuncSideEffects>,
}

impl Signature {
    pub fn new(name: &str, linkage: Linkage, num_params: usize) -> Self {
        Self {
            name: name.to_string(),
            linkage,
            num_params,
            effects: None,
        }
    }

    pub fn with_effects(mut self, effects: FuncSideEffects) -> Self {
        self.effects = Some(effects);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn update_linkage(&mut self, linkage: Linkage) {
        self.linkage = linkage;
    }

    pub fn num_params(&self) -> usize {
        self.num_params
    }

    pub fn effects(&self) -> Option<&FuncSideEffects> {
        self.effects.as_ref()
    }
}

impl WriteWithModule for Signature {
    fn write(&self, _module: &Module, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "func {} %{}(", self.linkage, self.name)?;
        for idx in 0..self.num_params {
            if idx > 0 {
                write!(w, ", ")?;
            }
            write!(w, "v{idx}")?;
        }
        write!(w, ")")
    }
}
