use std::io;

use cranelift_entity::PrimaryMap;
use rustc_hash::FxHashMap;

use crate::{ir_writer::WriteWithModule, Linkage, Module};

#[derive(Debug, Default, Clone)]
pub struct GlobalVariableStore {
    gv_data: PrimaryMap<GlobalVariable, GlobalVariableData>,
    symbols: FxHashMap<String, GlobalVariable>,
}

impl GlobalVariableStore {
    /// Registers a global variable.
    ///
    /// # Panics
    /// Panics if the symbol is already registered. Use
    /// [`crate::builder::ModuleBuilder::make_global`] for a checked variant.
    pub fn make_gv(&mut self, gv_data: GlobalVariableData) -> GlobalVariable {
        match self.symbols.entry(gv_data.symbol.clone()) {
            std::collections::hash_map::Entry::Occupied(_) => {
                panic!("duplicate global symbol `{}`", gv_data.symbol);
            }
            std::collections::hash_map::Entry::Vacant(v) => {
                let gv = self.gv_data.push(gv_data);
                v.insert(gv);
                gv
            }
        }
    }

    pub fn gv_data(&self, gv: GlobalVariable) -> &GlobalVariableData {
        &self.gv_data[gv]
    }

    pub fn gv_by_symbol(&self, symbol: &str) -> Option<GlobalVariable> {
        self.symbols.get(symbol).copied()
    }

    pub fn is_const(&self, gv: GlobalVariable) -> bool {
        self.gv_data[gv].is_const
    }

    pub fn all_gv_data(&self) -> impl Iterator<Item = &GlobalVariableData> {
        self.gv_data.values()
    }
}

/// An opaque reference to [`GlobalVariableData`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Copy, Hash)]
pub struct GlobalVariable(pub u32);
cranelift_entity::entity_impl!(GlobalVariable);

impl WriteWithModule for GlobalVariable {
    fn write(&self, module: &Module, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "%{}", module.globals.gv_data(*self).symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalVariableData {
    pub symbol: String,
    pub linkage: Linkage,
    pub is_const: bool,
}

impl GlobalVariableData {
    pub fn new(symbol: impl Into<String>, linkage: Linkage, is_const: bool) -> Self {
        Self {
            symbol: symbol.into(),
            linkage,
            is_const,
        }
    }
}

impl WriteWithModule for GlobalVariableData {
    fn write(&self, _module: &Module, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "global {} ", self.linkage)?;
        if self.is_const {
            write!(w, "const ")?;
        }
        writeln!(w, "%{}", self.symbol)
    }
}
