//! Identification of the storage a memory access is rooted at.
use std::{
    hash::{Hash, Hasher},
    io,
};

use crate::{
    ir_writer::WriteWithModule, module::FuncRef, FuncValue, Function, GlobalVariable, InstData,
    Module, Value, ValueId,
};

/// The root of the storage accessed by a memory access.
///
/// Values are qualified with their defining function so that storage found in
/// a callee stays distinguishable after it has been merged into a caller.
#[derive(Debug, Clone, Copy, Eq)]
pub enum AccessedStorage {
    /// The contents of a box allocated by `alloc`.
    Box { alloc: FuncValue },
    /// A stack slot allocated by `alloc`. Never escapes the function.
    Stack { alloc: FuncValue },
    Global { gv: GlobalVariable },
    /// A stored property of the class instance `object`. `field` identifies
    /// the property declaration, so equal fields of unrelated classes never
    /// share an index.
    Class { object: FuncValue, field: u32 },
    /// Memory passed in through the `index`th parameter.
    ///
    /// Arguments are identified by `index` alone; `value` records the
    /// parameter value it was found at.
    Argument { index: usize, value: FuncValue },
    /// Storage that could not be classified.
    Unidentified { value: FuncValue },
    /// An access contained in the scope of another access.
    Nested { value: FuncValue },
}

impl AccessedStorage {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Stack { .. } => "stack",
            Self::Global { .. } => "global",
            Self::Class { .. } => "class",
            Self::Argument { .. } => "argument",
            Self::Unidentified { .. } => "unidentified",
            Self::Nested { .. } => "nested",
        }
    }

    /// Returns `true` if no other storage kind can refer to the same memory.
    pub fn is_uniquely_identified(&self) -> bool {
        matches!(self, Self::Box { .. } | Self::Stack { .. } | Self::Global { .. })
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Box { .. } | Self::Stack { .. })
    }

    pub fn is_unidentified(&self) -> bool {
        matches!(self, Self::Unidentified { .. })
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Self::Nested { .. })
    }

    /// Returns `true` only if `self` and `other` provably never overlap.
    ///
    /// `false` means that the storages may overlap, not that they do.
    pub fn is_distinct_from(&self, other: &Self) -> bool {
        if self.is_uniquely_identified() && other.is_uniquely_identified() {
            return self != other;
        }

        match (self, other) {
            (Self::Class { field: lhs, .. }, Self::Class { field: rhs, .. }) => lhs != rhs,
            _ => false,
        }
    }
}

impl PartialEq for AccessedStorage {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Box { alloc: lhs }, Self::Box { alloc: rhs })
            | (Self::Stack { alloc: lhs }, Self::Stack { alloc: rhs }) => lhs == rhs,
            (Self::Global { gv: lhs }, Self::Global { gv: rhs }) => lhs == rhs,
            (
                Self::Class {
                    object: lhs_obj,
                    field: lhs_field,
                },
                Self::Class {
                    object: rhs_obj,
                    field: rhs_field,
                },
            ) => lhs_obj == rhs_obj && lhs_field == rhs_field,
            (Self::Argument { index: lhs, .. }, Self::Argument { index: rhs, .. }) => lhs == rhs,
            (Self::Unidentified { value: lhs }, Self::Unidentified { value: rhs })
            | (Self::Nested { value: lhs }, Self::Nested { value: rhs }) => lhs == rhs,
            _ => false,
        }
    }
}

impl Hash for AccessedStorage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Box { alloc } | Self::Stack { alloc } => alloc.hash(state),
            Self::Global { gv } => gv.hash(state),
            Self::Class { object, field } => {
                object.hash(state);
                field.hash(state);
            }
            Self::Argument { index, .. } => index.hash(state),
            Self::Unidentified { value } | Self::Nested { value } => value.hash(state),
        }
    }
}

impl WriteWithModule for AccessedStorage {
    fn write(&self, module: &Module, w: &mut impl io::Write) -> io::Result<()> {
        write!(w, "{} ", self.kind_name())?;
        match self {
            Self::Box { alloc } | Self::Stack { alloc } => alloc.write(module, w),
            Self::Global { gv } => gv.write(module, w),
            Self::Class { object, field } => {
                object.write(module, w)?;
                write!(w, " #{field}")
            }
            Self::Argument { index, .. } => write!(w, "#{index}"),
            Self::Unidentified { value } | Self::Nested { value } => value.write(module, w),
        }
    }
}

/// Returns the storage `value` is an address of.
///
/// An address produced by a `begin_access` is reported as
/// [`AccessedStorage::Nested`].
pub fn find_accessed_storage(func_ref: FuncRef, func: &Function, value: ValueId) -> AccessedStorage {
    find_storage(func_ref, func, value, false)
}

/// Returns the storage `value` is an address of, looking through enclosing
/// `begin_access` scopes. Never returns [`AccessedStorage::Nested`].
pub fn find_accessed_storage_origin(
    func_ref: FuncRef,
    func: &Function,
    value: ValueId,
) -> AccessedStorage {
    find_storage(func_ref, func, value, true)
}

fn find_storage(
    func_ref: FuncRef,
    func: &Function,
    mut value: ValueId,
    look_through_access: bool,
) -> AccessedStorage {
    loop {
        let here = FuncValue::new(func_ref, value);
        let inst = match func.dfg.value(value) {
            Value::Arg { idx } => {
                return AccessedStorage::Argument {
                    index: *idx,
                    value: here,
                }
            }
            Value::Global { gv } => return AccessedStorage::Global { gv: *gv },
            Value::Inst { inst } => *inst,
        };

        match func.dfg.inst(inst) {
            InstData::AllocStack => return AccessedStorage::Stack { alloc: here },
            InstData::AllocBox => return AccessedStorage::Box { alloc: here },
            InstData::ProjectBox { boxed } => {
                return match func.dfg.value_inst_data(*boxed) {
                    Some(InstData::AllocBox) => AccessedStorage::Box {
                        alloc: FuncValue::new(func_ref, *boxed),
                    },
                    _ => AccessedStorage::Unidentified { value: here },
                };
            }
            InstData::RefElementAddr { object, field } => {
                return AccessedStorage::Class {
                    object: FuncValue::new(func_ref, *object),
                    field: *field,
                }
            }
            InstData::StructElementAddr { base, .. } => value = *base,
            InstData::BeginAccess(marker) if look_through_access => value = marker.source,
            InstData::BeginAccess(..) => return AccessedStorage::Nested { value: here },
            _ => return AccessedStorage::Unidentified { value: here },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::test_util::TestModuleBuilder, AccessKind, AccessMarker, Enforcement,
        GlobalVariableData, Linkage,
    };

    #[test]
    fn classify_roots() {
        let mut mb = TestModuleBuilder::new();
        let g = mb.make_global("g");
        let (func_ref, mut builder) = mb.func_builder("f", 2);
        let entry = builder.append_block();
        builder.switch_to_block(entry);

        let slot = builder.alloc_stack();
        let boxed = builder.alloc_box();
        let box_addr = builder.project_box(boxed);
        let g_addr = builder.make_global_value(g);
        let obj = builder.args()[0];
        let field_addr = builder.ref_element_addr(obj, 3);
        let inner = builder.struct_element_addr(slot, 1);
        let loaded = builder.load(g_addr);
        let addr_arg = builder.args()[1];
        builder.ret(None);
        builder.finish();

        let module = mb.build();
        let func = &module.funcs[func_ref];
        let storage = |v| find_accessed_storage_origin(func_ref, func, v);
        assert_eq!(
            storage(slot),
            AccessedStorage::Stack {
                alloc: FuncValue::new(func_ref, slot)
            }
        );
        assert_eq!(storage(inner), storage(slot));
        assert_eq!(
            storage(box_addr),
            AccessedStorage::Box {
                alloc: FuncValue::new(func_ref, boxed)
            }
        );
        assert_eq!(storage(g_addr), AccessedStorage::Global { gv: g });
        assert_eq!(
            storage(field_addr),
            AccessedStorage::Class {
                object: FuncValue::new(func_ref, obj),
                field: 3
            }
        );
        assert!(storage(loaded).is_unidentified());
        assert!(matches!(
            storage(addr_arg),
            AccessedStorage::Argument { index: 1, .. }
        ));
    }

    #[test]
    fn nested_access() {
        let mut mb = TestModuleBuilder::new();
        let (func_ref, mut builder) = mb.func_builder("f", 0);
        let entry = builder.append_block();
        builder.switch_to_block(entry);

        let slot = builder.alloc_stack();
        let outer = builder.begin_access(AccessMarker::new(
            slot,
            AccessKind::Modify,
            Enforcement::Dynamic,
        ));
        let projected = builder.struct_element_addr(outer, 0);
        builder.end_access(outer);
        builder.ret(None);
        builder.finish();

        let module = mb.build();
        let func = &module.funcs[func_ref];
        assert!(find_accessed_storage(func_ref, func, projected).is_nested());
        assert_eq!(
            find_accessed_storage_origin(func_ref, func, projected),
            AccessedStorage::Stack {
                alloc: FuncValue::new(func_ref, slot)
            }
        );
    }

    #[test]
    fn argument_identity_ignores_value() {
        let f0 = FuncRef::from_u32(0);
        let f1 = FuncRef::from_u32(1);
        let lhs = AccessedStorage::Argument {
            index: 0,
            value: FuncValue::new(f0, ValueId(0)),
        };
        let rhs = AccessedStorage::Argument {
            index: 0,
            value: FuncValue::new(f1, ValueId(0)),
        };
        assert_eq!(lhs, rhs);

        let mut set = rustc_hash::FxHashSet::default();
        set.insert(lhs);
        assert!(!set.insert(rhs));
    }

    #[test]
    fn distinctness() {
        let mut module = Module::new();
        let g0 = module
            .globals
            .make_gv(GlobalVariableData::new("g0", Linkage::Private, false));
        let g1 = module
            .globals
            .make_gv(GlobalVariableData::new("g1", Linkage::Private, false));
        let f = FuncRef::from_u32(0);
        let v = |n| FuncValue::new(f, ValueId(n));

        let global0 = AccessedStorage::Global { gv: g0 };
        let global1 = AccessedStorage::Global { gv: g1 };
        let stack = AccessedStorage::Stack { alloc: v(1) };
        let class0 = AccessedStorage::Class {
            object: v(2),
            field: 0,
        };
        let class1 = AccessedStorage::Class {
            object: v(3),
            field: 1,
        };
        let class0_other_object = AccessedStorage::Class {
            object: v(3),
            field: 0,
        };
        let arg = AccessedStorage::Argument {
            index: 0,
            value: v(0),
        };
        let unidentified = AccessedStorage::Unidentified { value: v(4) };

        assert!(global0.is_distinct_from(&global1));
        assert!(!global0.is_distinct_from(&global0));
        assert!(stack.is_distinct_from(&global0));
        assert!(class0.is_distinct_from(&class1));
        assert!(!class0.is_distinct_from(&class0_other_object));
        assert!(!arg.is_distinct_from(&stack));
        assert!(!unidentified.is_distinct_from(&global0));
        assert!(!global1.is_distinct_from(&unidentified));
    }
}
