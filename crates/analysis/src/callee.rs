//! Call sites and the functions they may call.
use exclusivity_ir::{FuncRef, Function, InstData, InstId, Module, ValueId};
use smallvec::SmallVec;

/// A full application, identified by the function containing it and the
/// `apply` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ApplySite {
    pub caller: FuncRef,
    pub inst: InstId,
}

impl ApplySite {
    pub fn new(caller: FuncRef, inst: InstId) -> Self {
        Self { caller, inst }
    }

    /// Collects every apply site of `func` in layout order.
    pub fn collect(caller: FuncRef, func: &Function) -> Vec<Self> {
        func.layout
            .iter_all_insts()
            .filter(|inst| func.dfg.is_apply(*inst))
            .map(|inst| Self::new(caller, inst))
            .collect()
    }

    /// Returns the callee operand and the arguments of the site.
    ///
    /// # Panics
    /// Panics if the site doesn't refer to an `apply`.
    pub fn operands<'a>(&self, module: &'a Module) -> (ValueId, &'a [ValueId]) {
        match module.funcs[self.caller].dfg.inst(self.inst) {
            InstData::Apply { callee, args } => (*callee, args),
            inst => panic!("`{}` is not a full apply", inst.name()),
        }
    }
}

/// The functions an apply site may call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalleeList {
    callees: SmallVec<[FuncRef; 4]>,
    is_complete: bool,
}

impl CalleeList {
    fn single(func: FuncRef) -> Self {
        Self {
            callees: smallvec::smallvec![func],
            is_complete: true,
        }
    }

    /// The site may call anything.
    fn unknown() -> Self {
        Self::default()
    }

    /// `false` if the site may call a function not in the list.
    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn iter(&self) -> impl Iterator<Item = FuncRef> + '_ {
        self.callees.iter().copied()
    }

    pub fn contains(&self, func: FuncRef) -> bool {
        self.callees.contains(&func)
    }

    pub fn len(&self) -> usize {
        self.callees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callees.is_empty()
    }
}

/// Resolves the functions the apply `site` may call.
///
/// Partial applications are looked through. A callee that is neither a
/// function reference nor a method lookup (e.g., a closure passed in as an
/// argument) yields an empty, incomplete list.
pub fn callee_list(module: &Module, site: ApplySite) -> CalleeList {
    let func = &module.funcs[site.caller];
    let (mut callee, _) = site.operands(module);

    loop {
        match func.dfg.value_inst_data(callee) {
            Some(InstData::FunctionRef { func }) => return CalleeList::single(*func),
            Some(InstData::ClassMethod {
                candidates,
                is_complete,
                ..
            }) => {
                return CalleeList {
                    callees: candidates.clone(),
                    is_complete: *is_complete,
                }
            }
            Some(InstData::PartialApply { callee: inner, .. }) => callee = *inner,
            _ => return CalleeList::unknown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use exclusivity_ir::builder::test_util::TestModuleBuilder;

    use super::*;

    #[test]
    fn resolve_callees() {
        let mut mb = TestModuleBuilder::new();
        let a = mb.declare_external("a", 1, None);
        let b = mb.declare_external("b", 1, None);
        let (caller, mut builder) = mb.func_builder("caller", 2);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        let obj = builder.args()[0];
        let closure = builder.args()[1];

        let direct = builder.call(a, &[obj]);

        let a_ref = builder.function_ref(a);
        let partial = builder.partial_apply(a_ref, &[obj]);
        let through_partial = builder.apply(partial, &[]);

        let method = builder.class_method(obj, &[a, b], true);
        let complete = builder.apply(method, &[obj]);
        let method = builder.class_method(obj, &[b], false);
        let incomplete = builder.apply(method, &[obj]);

        let opaque = builder.apply(closure, &[obj]);
        builder.ret(None);
        builder.finish();
        let module = mb.build();

        let sites = ApplySite::collect(caller, &module.funcs[caller]);
        assert_eq!(
            sites.iter().map(|site| site.inst).collect::<Vec<_>>(),
            vec![direct, through_partial, complete, incomplete, opaque]
        );

        let resolve = |inst| callee_list(&module, ApplySite::new(caller, inst));

        let callees = resolve(direct);
        assert!(callees.is_complete());
        assert_eq!(callees.iter().collect::<Vec<_>>(), vec![a]);

        let callees = resolve(through_partial);
        assert!(callees.is_complete());
        assert!(callees.contains(a));

        let callees = resolve(complete);
        assert!(callees.is_complete());
        assert_eq!(callees.iter().collect::<Vec<_>>(), vec![a, b]);

        let callees = resolve(incomplete);
        assert!(!callees.is_complete());
        assert_eq!(callees.len(), 1);

        let callees = resolve(opaque);
        assert!(!callees.is_complete());
        assert!(callees.is_empty());
    }
}
