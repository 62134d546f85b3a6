use smallvec::SmallVec;

use super::ModuleBuilder;
use crate::{
    module::FuncRef, AccessMarker, BlockId, Function, GlobalVariable, InstData, InstId, Value,
    ValueId,
};

pub struct FunctionBuilder<'a> {
    module_builder: &'a mut ModuleBuilder,
    pub func: Function,
    func_ref: FuncRef,
    current_block: Option<BlockId>,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(module_builder: &'a mut ModuleBuilder, func_ref: FuncRef) -> Self {
        let func = Function::new(module_builder.sig(func_ref).clone());

        Self {
            module_builder,
            func,
            func_ref,
            current_block: None,
        }
    }

    /// Stores the built function into the module.
    pub fn finish(self) -> FuncRef {
        let Self {
            module_builder,
            func,
            func_ref,
            ..
        } = self;

        if cfg!(debug_assertions) {
            for block in func.layout.iter_block() {
                debug_assert!(
                    func.layout
                        .last_inst_of(block)
                        .is_some_and(|inst| func.dfg.is_terminator(inst)),
                    "`{block}` is not terminated"
                );
            }
        }

        module_builder.define(func_ref, func);
        func_ref
    }

    pub fn func_ref(&self) -> FuncRef {
        self.func_ref
    }

    pub fn args(&self) -> &[ValueId] {
        &self.func.arg_values
    }

    pub fn append_block(&mut self) -> BlockId {
        let block = self.func.dfg.make_block();
        self.func.layout.append_block(block);
        block
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = Some(block);
    }

    /// Return pointer value to the global variable.
    pub fn make_global_value(&mut self, gv: GlobalVariable) -> ValueId {
        self.func.dfg.make_global_value(gv)
    }

    /// Appends an instruction to the current block.
    ///
    /// # Panics
    /// Panics if no block has been selected with [`Self::switch_to_block`].
    pub fn insert_inst(&mut self, inst: InstData) -> InstId {
        let block = self
            .current_block
            .expect("no block is selected for insertion");
        let has_result = inst.has_result();

        let inst_id = self.func.dfg.make_inst(inst);
        self.func.layout.append_inst(inst_id, block);
        if has_result {
            let result = self.func.dfg.make_value(Value::Inst { inst: inst_id });
            self.func.dfg.attach_result(inst_id, result);
        }
        inst_id
    }

    fn insert_value_inst(&mut self, inst: InstData) -> ValueId {
        let inst_id = self.insert_inst(inst);
        self.func.dfg.inst_result(inst_id).unwrap()
    }

    pub fn alloc_stack(&mut self) -> ValueId {
        self.insert_value_inst(InstData::AllocStack)
    }

    pub fn alloc_box(&mut self) -> ValueId {
        self.insert_value_inst(InstData::AllocBox)
    }

    pub fn project_box(&mut self, boxed: ValueId) -> ValueId {
        self.insert_value_inst(InstData::ProjectBox { boxed })
    }

    pub fn ref_element_addr(&mut self, object: ValueId, field: u32) -> ValueId {
        self.insert_value_inst(InstData::RefElementAddr { object, field })
    }

    pub fn struct_element_addr(&mut self, base: ValueId, field: u32) -> ValueId {
        self.insert_value_inst(InstData::StructElementAddr { base, field })
    }

    pub fn begin_access(&mut self, marker: AccessMarker) -> ValueId {
        self.insert_value_inst(InstData::BeginAccess(marker))
    }

    pub fn end_access(&mut self, access: ValueId) -> InstId {
        self.insert_inst(InstData::EndAccess { access })
    }

    pub fn begin_unpaired_access(&mut self, marker: AccessMarker) -> InstId {
        self.insert_inst(InstData::BeginUnpairedAccess(marker))
    }

    pub fn load(&mut self, addr: ValueId) -> ValueId {
        self.insert_value_inst(InstData::Load { addr })
    }

    pub fn store(&mut self, value: ValueId, addr: ValueId) -> InstId {
        self.insert_inst(InstData::Store { value, addr })
    }

    pub fn function_ref(&mut self, func: FuncRef) -> ValueId {
        self.insert_value_inst(InstData::FunctionRef { func })
    }

    pub fn class_method(
        &mut self,
        object: ValueId,
        candidates: &[FuncRef],
        is_complete: bool,
    ) -> ValueId {
        self.insert_value_inst(InstData::ClassMethod {
            object,
            candidates: SmallVec::from_slice(candidates),
            is_complete,
        })
    }

    pub fn partial_apply(&mut self, callee: ValueId, args: &[ValueId]) -> ValueId {
        self.insert_value_inst(InstData::PartialApply {
            callee,
            args: SmallVec::from_slice(args),
        })
    }

    /// Inserts a full application of `callee` and returns the call instruction.
    pub fn apply(&mut self, callee: ValueId, args: &[ValueId]) -> InstId {
        self.insert_inst(InstData::Apply {
            callee,
            args: SmallVec::from_slice(args),
        })
    }

    /// Shorthand for `function_ref` followed by `apply`.
    pub fn call(&mut self, func: FuncRef, args: &[ValueId]) -> InstId {
        let callee = self.function_ref(func);
        self.apply(callee, args)
    }

    pub fn jump(&mut self, dest: BlockId) -> InstId {
        self.insert_inst(InstData::Jump { dest })
    }

    pub fn br(&mut self, cond: ValueId, then_dest: BlockId, else_dest: BlockId) -> InstId {
        self.insert_inst(InstData::Br {
            cond,
            then_dest,
            else_dest,
        })
    }

    pub fn ret(&mut self, arg: Option<ValueId>) -> InstId {
        self.insert_inst(InstData::Return { arg })
    }
}
