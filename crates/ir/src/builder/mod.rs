mod func_builder;
mod module_builder;

pub use func_builder::FunctionBuilder;
pub use module_builder::ModuleBuilder;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("duplicated function declaration `{0}`")]
    DuplicatedFunction(String),

    #[error("duplicated global symbol `{0}`")]
    DuplicatedGlobal(String),

    #[error("external function `{0}` can't have a body")]
    ExternalDefinition(String),
}

pub mod test_util {
    use super::*;

    use crate::{
        ir_writer::FuncWriter, module::FuncRef, side_effect::FuncSideEffects, GlobalVariable,
        GlobalVariableData, Linkage, Module, Signature,
    };

    #[derive(Default)]
    pub struct TestModuleBuilder {
        module_builder: ModuleBuilder,
    }

    impl TestModuleBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        /// Declares a public function and returns a builder for its body.
        pub fn func_builder(&mut self, name: &str, num_params: usize) -> (FuncRef, FunctionBuilder) {
            let func_ref = self.declare(name, num_params);
            let builder = self.module_builder.func_builder(func_ref).unwrap();
            (func_ref, builder)
        }

        /// Declares a public function without defining its body yet.
        pub fn declare(&mut self, name: &str, num_params: usize) -> FuncRef {
            let sig = Signature::new(name, Linkage::Public, num_params);
            self.module_builder.declare_function(sig).unwrap()
        }

        pub fn define(&mut self, func_ref: FuncRef) -> FunctionBuilder {
            self.module_builder.func_builder(func_ref).unwrap()
        }

        /// Declares an external function, optionally with known side effects.
        pub fn declare_external(
            &mut self,
            name: &str,
            num_params: usize,
            effects: Option<FuncSideEffects>,
        ) -> FuncRef {
            let mut sig = Signature::new(name, Linkage::External, num_params);
            if let Some(effects) = effects {
                sig = sig.with_effects(effects);
            }
            self.module_builder.declare_function(sig).unwrap()
        }

        pub fn make_global(&mut self, name: &str) -> GlobalVariable {
            let data = GlobalVariableData::new(name, Linkage::Private, false);
            self.module_builder.make_global(data).unwrap()
        }

        pub fn build(self) -> Module {
            self.module_builder.build()
        }
    }

    pub fn dump_func(module: &Module, func_ref: FuncRef) -> String {
        let mut writer = FuncWriter::new(module, func_ref);
        writer.dump_string()
    }
}
