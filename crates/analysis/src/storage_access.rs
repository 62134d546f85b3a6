//! Per-function summaries of the storage accessed under dynamic exclusivity
//! enforcement.
use std::io;

use exclusivity_ir::{
    AccessKind, AccessMarker, AccessedStorage, FuncRef, Function, InstId, Module,
    ir_writer::WriteWithModule,
    side_effect::summarize_opaque_function,
    storage::find_accessed_storage_origin,
};
use indexmap::{IndexMap, map::Entry};
use rustc_hash::FxBuildHasher;

use crate::{AccessedStorageConfig, callee::ApplySite, transform::transform_callee_storage};

pub type StorageAccessMap = IndexMap<AccessedStorage, StorageAccessInfo, FxBuildHasher>;

/// How a single storage location is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageAccessInfo {
    pub access_kind: AccessKind,
    /// `true` only if every merged access was marked `no_nested_conflict`.
    pub no_nested_conflict: bool,
}

impl StorageAccessInfo {
    pub fn new(access_kind: AccessKind, no_nested_conflict: bool) -> Self {
        Self {
            access_kind,
            no_nested_conflict,
        }
    }

    pub fn from_marker(marker: &AccessMarker) -> Self {
        Self::new(marker.kind, marker.no_nested_conflict)
    }

    /// Joins `other` into `self`. Returns `true` if `self` changed.
    pub fn merge_from(&mut self, other: &Self) -> bool {
        let mut changed = false;

        let access_kind = self.access_kind.join(other.access_kind);
        if access_kind != self.access_kind {
            self.access_kind = access_kind;
            changed = true;
        }

        if self.no_nested_conflict && !other.no_nested_conflict {
            self.no_nested_conflict = false;
            changed = true;
        }

        changed
    }
}

/// The storage a function may access, including the accesses of everything
/// it calls.
///
/// Accesses whose storage could not be identified are folded into a single
/// `unidentified_access` kind, which may alias any storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionAccessedStorage {
    storage_access_map: StorageAccessMap,
    unidentified_access: Option<AccessKind>,
}

impl FunctionAccessedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn storage_access_map(&self) -> &StorageAccessMap {
        &self.storage_access_map
    }

    pub fn access_info(&self, storage: &AccessedStorage) -> Option<&StorageAccessInfo> {
        self.storage_access_map.get(storage)
    }

    pub fn unidentified_access(&self) -> Option<AccessKind> {
        self.unidentified_access
    }

    /// Returns `true` if the function is known not to access any memory.
    pub fn has_no_effects(&self) -> bool {
        self.storage_access_map.is_empty() && self.unidentified_access.is_none()
    }

    /// Makes the summary as pessimistic as possible.
    pub fn set_worst_effects(&mut self) -> bool {
        self.update_unidentified_access(AccessKind::Modify)
    }

    pub fn update_unidentified_access(&mut self, access_kind: AccessKind) -> bool {
        match self.unidentified_access {
            Some(current) => {
                let joined = current.join(access_kind);
                self.unidentified_access = Some(joined);
                joined != current
            }
            None => {
                self.unidentified_access = Some(access_kind);
                true
            }
        }
    }

    /// Summarizes a function whose body is not visible.
    ///
    /// Returns `false` without touching the summary if `func` has a body; its
    /// instructions must be visited with [`Self::analyze_instruction`]
    /// instead.
    pub fn summarize_function(&mut self, func: &Function) -> bool {
        assert!(
            self.storage_access_map.is_empty(),
            "expected an uninitialized summary"
        );

        if func.is_definition() {
            return false;
        }

        // There are no instructions to visit, so a missing side-effect summary
        // still gives a complete, if pessimistic, result.
        let Some(effects) = summarize_opaque_function(func) else {
            self.set_worst_effects();
            return true;
        };

        let behavior = effects.overall();
        if behavior.may_write() {
            self.unidentified_access = Some(AccessKind::Modify);
        } else if behavior.may_read() {
            self.unidentified_access = Some(AccessKind::Read);
        }

        true
    }

    /// Records the access begun by `inst` if it is dynamically enforced.
    pub fn analyze_instruction(&mut self, func_ref: FuncRef, func: &Function, inst: InstId) {
        let Some(marker) = func.dfg.inst(inst).access_marker() else {
            return;
        };
        if !marker.is_dynamic() {
            return;
        }

        let storage = find_accessed_storage_origin(func_ref, func, marker.source);
        if storage.is_unidentified() {
            self.update_unidentified_access(marker.kind);
            return;
        }

        self.add_access(storage, StorageAccessInfo::from_marker(marker));
    }

    fn add_access(&mut self, storage: AccessedStorage, info: StorageAccessInfo) -> bool {
        assert!(
            !storage.is_nested(),
            "nested access can't be a summary key"
        );

        match self.storage_access_map.entry(storage) {
            Entry::Vacant(entry) => {
                entry.insert(info);
                true
            }
            Entry::Occupied(mut entry) => entry.get_mut().merge_from(&info),
        }
    }

    /// Merges the accesses of `other` into `self`, mapping each storage of
    /// `other` into the context of `self` with `transform_storage`. Storage
    /// for which `transform_storage` returns `None` is dropped.
    ///
    /// `self` and `other` never alias, so merging a summary into itself (a
    /// self recursive call) has to go through a copy of the summary.
    ///
    /// Returns `true` if `self` changed.
    pub fn merge_accesses<F>(&mut self, other: &Self, mut transform_storage: F) -> bool
    where
        F: FnMut(&AccessedStorage) -> Option<AccessedStorage>,
    {
        let mut changed = false;

        for (storage, info) in &other.storage_access_map {
            let Some(storage) = transform_storage(storage) else {
                continue;
            };

            if storage.is_unidentified() {
                changed |= self.update_unidentified_access(info.access_kind);
            } else {
                changed |= self.add_access(storage, *info);
            }
        }

        if let Some(access_kind) = other.unidentified_access {
            changed |= self.update_unidentified_access(access_kind);
        }

        changed
    }

    /// Merges a summary of the same context, e.g., another candidate callee
    /// of the same call site.
    pub fn merge_from(&mut self, other: &Self) -> bool {
        self.merge_accesses(other, |storage| Some(*storage))
    }

    /// Merges the summary of a callee called at `site` into the summary of
    /// the caller.
    pub fn merge_from_apply(
        &mut self,
        callee: &Self,
        module: &Module,
        site: ApplySite,
        config: &AccessedStorageConfig,
    ) -> bool {
        self.merge_accesses(callee, |storage| {
            transform_callee_storage(module, site, storage, config)
        })
    }

    /// Returns `true` if an access of `access_kind` to `storage` may conflict
    /// with any access summarized here.
    pub fn may_conflict_with(&self, access_kind: AccessKind, storage: &AccessedStorage) -> bool {
        if self
            .unidentified_access
            .is_some_and(|unidentified| access_kind.may_conflict(unidentified))
        {
            return true;
        }

        self.storage_access_map.iter().any(|(other, info)| {
            access_kind.may_conflict(info.access_kind) && !storage.is_distinct_from(other)
        })
    }
}

impl WriteWithModule for FunctionAccessedStorage {
    fn write(&self, module: &Module, w: &mut impl io::Write) -> io::Result<()> {
        for (storage, info) in &self.storage_access_map {
            write!(w, "  [{}] ", info.access_kind)?;
            if info.no_nested_conflict {
                write!(w, "[no_nested_conflict] ")?;
            }
            storage.write(module, w)?;
            writeln!(w)?;
        }

        if let Some(access_kind) = self.unidentified_access {
            writeln!(w, "  unidentified accesses: {access_kind}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use exclusivity_ir::{
        Enforcement, FuncSideEffects, FuncValue, MemoryBehavior, ValueId,
        builder::test_util::TestModuleBuilder,
    };

    use super::*;

    fn info(access_kind: AccessKind, no_nested_conflict: bool) -> StorageAccessInfo {
        StorageAccessInfo::new(access_kind, no_nested_conflict)
    }

    #[test]
    fn storage_access_info_merge() {
        let mut lhs = info(AccessKind::Read, true);
        assert!(!lhs.merge_from(&info(AccessKind::Read, true)));
        assert_eq!(lhs, info(AccessKind::Read, true));

        assert!(lhs.merge_from(&info(AccessKind::Modify, true)));
        assert_eq!(lhs, info(AccessKind::Modify, true));

        assert!(lhs.merge_from(&info(AccessKind::Read, false)));
        assert_eq!(lhs, info(AccessKind::Modify, false));

        // Nothing can raise a merged value back.
        assert!(!lhs.merge_from(&info(AccessKind::Read, true)));
        assert_eq!(lhs, info(AccessKind::Modify, false));
    }

    #[test]
    fn storage_access_info_merge_is_join() {
        for lhs_kind in [AccessKind::Read, AccessKind::Modify] {
            for rhs_kind in [AccessKind::Read, AccessKind::Modify] {
                for (lhs_nnc, rhs_nnc) in [(true, true), (true, false), (false, true), (false, false)] {
                    let mut merged = info(lhs_kind, lhs_nnc);
                    let rhs = info(rhs_kind, rhs_nnc);
                    merged.merge_from(&rhs);
                    assert_eq!(merged.access_kind, lhs_kind.join(rhs_kind));
                    assert_eq!(merged.no_nested_conflict, lhs_nnc && rhs_nnc);

                    let snapshot = merged;
                    assert!(!merged.merge_from(&snapshot));
                }
            }
        }
    }

    fn stack(n: u32) -> AccessedStorage {
        AccessedStorage::Stack {
            alloc: FuncValue::new(FuncRef::from_u32(0), ValueId(n)),
        }
    }

    #[test]
    fn merge_from_is_idempotent() {
        let mut other = FunctionAccessedStorage::new();
        other.add_access(stack(1), info(AccessKind::Read, true));
        other.add_access(stack(2), info(AccessKind::Modify, false));
        other.update_unidentified_access(AccessKind::Read);

        let mut summary = FunctionAccessedStorage::new();
        assert!(summary.merge_from(&other));
        assert_eq!(summary, other);
        assert!(!summary.merge_from(&other));

        let snapshot = summary.clone();
        assert!(!summary.merge_from(&snapshot));
    }

    #[test]
    fn merge_drops_untransferable_storage() {
        let mut other = FunctionAccessedStorage::new();
        other.add_access(stack(1), info(AccessKind::Modify, false));

        let mut summary = FunctionAccessedStorage::new();
        assert!(!summary.merge_accesses(&other, |_| None));
        assert!(summary.has_no_effects());
    }

    #[test]
    fn merge_unidentified_storage() {
        let mut other = FunctionAccessedStorage::new();
        other.add_access(stack(1), info(AccessKind::Read, true));

        let unidentified = AccessedStorage::Unidentified {
            value: FuncValue::new(FuncRef::from_u32(0), ValueId(1)),
        };
        let mut summary = FunctionAccessedStorage::new();
        assert!(summary.merge_accesses(&other, |_| Some(unidentified)));
        assert!(summary.storage_access_map().is_empty());
        assert_eq!(summary.unidentified_access(), Some(AccessKind::Read));
    }

    #[test]
    #[should_panic(expected = "nested access can't be a summary key")]
    fn nested_storage_is_rejected() {
        let nested = AccessedStorage::Nested {
            value: FuncValue::new(FuncRef::from_u32(0), ValueId(0)),
        };
        let mut summary = FunctionAccessedStorage::new();
        summary.add_access(nested, info(AccessKind::Read, false));
    }

    #[test]
    fn conflict_query() {
        let mut mb = TestModuleBuilder::new();
        let g0 = mb.make_global("g0");
        let g1 = mb.make_global("g1");
        let global0 = AccessedStorage::Global { gv: g0 };
        let global1 = AccessedStorage::Global { gv: g1 };

        let mut summary = FunctionAccessedStorage::new();
        summary.add_access(global0, info(AccessKind::Modify, false));

        assert!(summary.may_conflict_with(AccessKind::Read, &global0));
        assert!(summary.may_conflict_with(AccessKind::Modify, &global0));
        assert!(!summary.may_conflict_with(AccessKind::Modify, &global1));
        assert!(!summary.may_conflict_with(AccessKind::Modify, &stack(5)));

        let mut reads = FunctionAccessedStorage::new();
        reads.add_access(global0, info(AccessKind::Read, false));
        assert!(!reads.may_conflict_with(AccessKind::Read, &global0));
        assert!(reads.may_conflict_with(AccessKind::Modify, &global0));

        let arg = AccessedStorage::Argument {
            index: 0,
            value: FuncValue::new(FuncRef::from_u32(0), ValueId(0)),
        };
        assert!(reads.may_conflict_with(AccessKind::Modify, &arg));
    }

    #[test]
    fn unidentified_access_dominates() {
        let mut mb = TestModuleBuilder::new();
        let g = mb.make_global("g");
        let global = AccessedStorage::Global { gv: g };

        let mut summary = FunctionAccessedStorage::new();
        summary.update_unidentified_access(AccessKind::Read);
        assert!(!summary.may_conflict_with(AccessKind::Read, &global));
        assert!(summary.may_conflict_with(AccessKind::Modify, &global));

        assert!(summary.set_worst_effects());
        assert!(!summary.set_worst_effects());
        assert!(summary.may_conflict_with(AccessKind::Read, &stack(0)));
        assert!(summary.may_conflict_with(AccessKind::Modify, &global));
    }

    #[test]
    fn summarize_opaque_functions() {
        let mut mb = TestModuleBuilder::new();
        let unknown = mb.declare_external("unknown", 0, None);
        let read_none = mb.declare_external("read_none", 1, Some(FuncSideEffects::read_none()));
        let reads_param = mb.declare_external(
            "reads_param",
            1,
            Some(FuncSideEffects::read_none().with_param(MemoryBehavior::READ)),
        );
        let writes_global = mb.declare_external(
            "writes_global",
            0,
            Some(FuncSideEffects::read_write()),
        );
        let (defined, mut builder) = mb.func_builder("defined", 0);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        builder.ret(None);
        builder.finish();
        let module = mb.build();

        let summarize = |func_ref| {
            let mut summary = FunctionAccessedStorage::new();
            let summarized = summary.summarize_function(&module.funcs[func_ref]);
            (summarized, summary)
        };

        let (summarized, summary) = summarize(unknown);
        assert!(summarized);
        assert_eq!(summary.unidentified_access(), Some(AccessKind::Modify));
        assert!(summary.storage_access_map().is_empty());

        let (summarized, summary) = summarize(read_none);
        assert!(summarized);
        assert!(summary.has_no_effects());

        let (_, summary) = summarize(reads_param);
        assert_eq!(summary.unidentified_access(), Some(AccessKind::Read));

        let (_, summary) = summarize(writes_global);
        assert_eq!(summary.unidentified_access(), Some(AccessKind::Modify));
        assert!(summary.storage_access_map().is_empty());

        let (summarized, summary) = summarize(defined);
        assert!(!summarized);
        assert!(summary.has_no_effects());
    }

    #[test]
    fn analyze_dynamic_accesses_only() {
        let mut mb = TestModuleBuilder::new();
        let (func_ref, mut builder) = mb.func_builder("f", 0);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        let slot = builder.alloc_stack();
        let other = builder.alloc_stack();

        let read = builder.begin_access(
            AccessMarker::new(slot, AccessKind::Read, Enforcement::Dynamic)
                .with_no_nested_conflict(),
        );
        builder.end_access(read);
        let modify = builder.begin_access(AccessMarker::new(
            slot,
            AccessKind::Modify,
            Enforcement::Dynamic,
        ));
        builder.end_access(modify);
        builder.begin_access(AccessMarker::new(
            other,
            AccessKind::Modify,
            Enforcement::Static,
        ));
        let obj = builder.load(slot);
        builder.begin_unpaired_access(AccessMarker::new(
            obj,
            AccessKind::Read,
            Enforcement::Dynamic,
        ));
        builder.ret(None);
        builder.finish();
        let module = mb.build();

        let func = &module.funcs[func_ref];
        let mut summary = FunctionAccessedStorage::new();
        for inst in func.layout.iter_all_insts() {
            summary.analyze_instruction(func_ref, func, inst);
        }

        let slot_storage = AccessedStorage::Stack {
            alloc: FuncValue::new(func_ref, slot),
        };
        assert_eq!(summary.storage_access_map().len(), 1);
        assert_eq!(
            summary.access_info(&slot_storage),
            Some(&info(AccessKind::Modify, false))
        );
        assert_eq!(summary.unidentified_access(), Some(AccessKind::Read));
    }
}
