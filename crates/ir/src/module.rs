use cranelift_entity::{entity_impl, PrimaryMap};

use crate::{Function, GlobalVariableStore};

#[derive(Debug, Clone, Default)]
pub struct Module {
    /// Holds all functions declared in the module.
    pub funcs: PrimaryMap<FuncRef, Function>,

    /// Holds all global variables declared in the module.
    pub globals: GlobalVariableStore,
}

impl Module {
    #[doc(hidden)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `func_ref` in the module.
    pub fn iter_functions(&self) -> impl Iterator<Item = FuncRef> {
        self.funcs.keys()
    }

    pub fn func_name(&self, func_ref: FuncRef) -> &str {
        self.funcs[func_ref].sig.name()
    }

    pub fn lookup_func(&self, name: &str) -> Option<FuncRef> {
        self.funcs
            .iter()
            .find_map(|(func_ref, func)| (func.sig.name() == name).then_some(func_ref))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncRef(u32);
entity_impl!(FuncRef);
