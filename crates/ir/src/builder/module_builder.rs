use rustc_hash::FxHashMap;

use super::{BuildError, FunctionBuilder};
use crate::{module::FuncRef, Function, GlobalVariable, GlobalVariableData, Module, Signature};

#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,

    /// Map function name -> FuncRef to avoid duplicated declaration.
    declared_funcs: FxHashMap<String, FuncRef>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_function(&mut self, sig: Signature) -> Result<FuncRef, BuildError> {
        if self.declared_funcs.contains_key(sig.name()) {
            return Err(BuildError::DuplicatedFunction(sig.name().to_string()));
        }

        let name = sig.name().to_string();
        let func_ref = self.module.funcs.push(Function::new(sig));
        self.declared_funcs.insert(name, func_ref);
        Ok(func_ref)
    }

    pub fn lookup_func(&self, name: &str) -> Option<FuncRef> {
        self.declared_funcs.get(name).copied()
    }

    pub fn sig(&self, func_ref: FuncRef) -> &Signature {
        &self.module.funcs[func_ref].sig
    }

    pub fn make_global(&mut self, global: GlobalVariableData) -> Result<GlobalVariable, BuildError> {
        if self.module.globals.gv_by_symbol(&global.symbol).is_some() {
            return Err(BuildError::DuplicatedGlobal(global.symbol));
        }

        Ok(self.module.globals.make_gv(global))
    }

    /// Returns a builder for the body of `func`. The body replaces any body
    /// the function had before once [`FunctionBuilder::finish`] is called.
    pub fn func_builder(&mut self, func: FuncRef) -> Result<FunctionBuilder<'_>, BuildError> {
        let sig = self.sig(func);
        if sig.linkage().is_external() {
            return Err(BuildError::ExternalDefinition(sig.name().to_string()));
        }

        Ok(FunctionBuilder::new(self, func))
    }

    pub(super) fn define(&mut self, func_ref: FuncRef, func: Function) {
        self.module.funcs[func_ref] = func;
    }

    pub fn build(self) -> Module {
        self.module
    }
}
