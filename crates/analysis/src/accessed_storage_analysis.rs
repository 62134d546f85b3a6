//! Interprocedural summaries of dynamically enforced accesses, computed on
//! demand and cached per function.
use std::io;

use exclusivity_ir::{AccessKind, AccessedStorage, FuncRef, Module, ir_writer::WriteWithModule};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, debug_span, trace};

use crate::{
    AccessedStorageConfig,
    callee::{ApplySite, callee_list},
    module_analysis::{CallGraph, SccBuilder},
    storage_access::FunctionAccessedStorage,
};

#[derive(Debug, Clone)]
enum SummaryState {
    /// The summary may still be missing the effects of some call sites.
    Computing(FunctionAccessedStorage),
    Cached(FunctionAccessedStorage),
}

impl SummaryState {
    fn summary(&self) -> &FunctionAccessedStorage {
        match self {
            Self::Computing(summary) | Self::Cached(summary) => summary,
        }
    }

    fn summary_mut(&mut self) -> &mut FunctionAccessedStorage {
        match self {
            Self::Computing(summary) | Self::Cached(summary) => summary,
        }
    }

    fn into_summary(self) -> FunctionAccessedStorage {
        match self {
            Self::Computing(summary) | Self::Cached(summary) => summary,
        }
    }
}

/// Bookkeeping of a single top level query.
#[derive(Debug, Default)]
struct Query {
    /// Functions summarized by the query, in the order they were started.
    computed: Vec<FuncRef>,
    /// Set once a call reaches a function whose summary is still being
    /// computed.
    hit_cycle: bool,
}

/// Caches a [`FunctionAccessedStorage`] per function.
///
/// A summary covers the accesses of the function itself and of everything it
/// transitively calls. Summaries are computed on the first query and stay
/// cached until they are invalidated.
#[derive(Debug, Default)]
pub struct AccessedStorageAnalysis {
    config: AccessedStorageConfig,
    states: FxHashMap<FuncRef, SummaryState>,
    /// Maps a callee to the functions whose summaries merged its summary.
    dependents: FxHashMap<FuncRef, FxHashSet<FuncRef>>,
}

impl AccessedStorageAnalysis {
    pub fn new(config: AccessedStorageConfig) -> Self {
        Self {
            config,
            states: FxHashMap::default(),
            dependents: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &AccessedStorageConfig {
        &self.config
    }

    /// Returns the cached summary of `func`, if any.
    pub fn cached_summary(&self, func: FuncRef) -> Option<&FunctionAccessedStorage> {
        match self.states.get(&func)? {
            SummaryState::Cached(summary) => Some(summary),
            SummaryState::Computing(_) => None,
        }
    }

    pub fn is_cached(&self, func: FuncRef) -> bool {
        self.cached_summary(func).is_some()
    }

    /// Returns the summary of `func`, computing it and the summaries of its
    /// transitive callees if they aren't cached yet.
    pub fn get_or_compute_summary(
        &mut self,
        module: &Module,
        func: FuncRef,
    ) -> &FunctionAccessedStorage {
        if !self.states.contains_key(&func) {
            let _span = debug_span!("accessed_storage", func = module.func_name(func)).entered();

            let mut query = Query::default();
            self.compute(module, func, 0, &mut query);
            if query.hit_cycle && self.config.refine_recursive_summaries {
                self.refine(module, &query.computed);
            }

            debug!(summarized = query.computed.len(), "query finished");
        }

        self.states[&func].summary()
    }

    /// Returns `true` if an access of `access_kind` to `storage` may conflict
    /// with any access made during a call to `func`.
    pub fn may_conflict_with(
        &mut self,
        module: &Module,
        func: FuncRef,
        access_kind: AccessKind,
        storage: &AccessedStorage,
    ) -> bool {
        self.get_or_compute_summary(module, func)
            .may_conflict_with(access_kind, storage)
    }

    /// Summarizes every function of the module, callees first.
    pub fn compute_all(&mut self, module: &Module) {
        let call_graph = CallGraph::build_graph(module);
        let sccs = SccBuilder::new().compute_scc(&call_graph);
        for scc in sccs.bottom_up() {
            for func in scc.sorted_components() {
                self.get_or_compute_summary(module, func);
            }
        }
    }

    /// Drops the summary of `func` together with every cached summary that
    /// merged it, directly or transitively.
    pub fn invalidate(&mut self, func: FuncRef) {
        let mut worklist = vec![func];
        while let Some(func) = worklist.pop() {
            if let Some(dependents) = self.dependents.remove(&func) {
                worklist.extend(dependents);
            }
            if self.states.remove(&func).is_some() {
                trace!(?func, "invalidated summary");
            }
        }
    }

    /// Drops the summaries of `func` and every function that transitively
    /// calls it according to `call_graph`.
    ///
    /// Unlike [`Self::invalidate`], this also reaches callers whose call to
    /// `func` was introduced after their summaries were computed.
    pub fn invalidate_with_callers(&mut self, call_graph: &CallGraph, func: FuncRef) {
        for caller in call_graph.transitive_callers(func) {
            self.invalidate(caller);
        }
    }

    pub fn invalidate_all(&mut self) {
        debug!(dropped = self.states.len(), "invalidated all summaries");
        self.states.clear();
        self.dependents.clear();
    }

    /// Writes the cached summaries in function order.
    pub fn write_summaries(&self, module: &Module, w: &mut impl io::Write) -> io::Result<()> {
        for func in module.iter_functions() {
            let Some(summary) = self.cached_summary(func) else {
                continue;
            };
            writeln!(w, "func %{}:", module.func_name(func))?;
            summary.write(module, w)?;
        }
        Ok(())
    }

    pub fn dump_summaries(&self, module: &Module) -> String {
        let mut s = Vec::new();
        self.write_summaries(module, &mut s).unwrap();
        String::from_utf8(s).unwrap()
    }

    fn compute(&mut self, module: &Module, func_ref: FuncRef, depth: usize, query: &mut Query) {
        match self.states.get(&func_ref) {
            Some(SummaryState::Cached(_)) => return,
            Some(SummaryState::Computing(_)) => {
                // Recursion. The caller merges the partial summary computed so
                // far.
                trace!(func = module.func_name(func_ref), "reached function being summarized");
                query.hit_cycle = true;
                return;
            }
            None => {}
        }

        let func = &module.funcs[func_ref];
        let _span = debug_span!("summarize", func = func.sig.name()).entered();
        query.computed.push(func_ref);

        let mut summary = FunctionAccessedStorage::new();
        if summary.summarize_function(func) {
            trace!(func = func.sig.name(), "summarized opaque function");
            self.states.insert(func_ref, SummaryState::Cached(summary));
            return;
        }

        for inst in func.layout.iter_all_insts() {
            summary.analyze_instruction(func_ref, func, inst);
        }
        self.states
            .insert(func_ref, SummaryState::Computing(summary));

        for site in ApplySite::collect(func_ref, func) {
            self.merge_call_site(module, site, depth, query);
        }

        if let Some(state) = self.states.remove(&func_ref) {
            let summary = state.into_summary();
            debug!(
                func = func.sig.name(),
                storage = summary.storage_access_map().len(),
                unidentified = ?summary.unidentified_access(),
                "summarized function"
            );
            self.states.insert(func_ref, SummaryState::Cached(summary));
        }
    }

    fn merge_call_site(
        &mut self,
        module: &Module,
        site: ApplySite,
        depth: usize,
        query: &mut Query,
    ) -> bool {
        let callees = callee_list(module, site);
        let mut changed = false;

        if !callees.is_complete() {
            trace!(?site, "call site with unknown callees");
            changed |= self.summary_mut(site.caller).set_worst_effects();
        }

        for callee in callees.iter() {
            if depth >= self.config.max_recursion_depth && !self.states.contains_key(&callee) {
                trace!(
                    callee = module.func_name(callee),
                    depth,
                    "recursion depth exceeded"
                );
                changed |= self.summary_mut(site.caller).set_worst_effects();
                continue;
            }

            self.compute(module, callee, depth + 1, query);
        }

        changed | self.merge_callees(module, site)
    }

    /// Merges the current summaries of the callees of `site` into the summary
    /// of its caller. Callees without a summary are skipped.
    ///
    /// The candidates are joined in the callee context first, so the caller
    /// side mapping runs once per site. The joined summary is a copy, which
    /// also covers a function calling itself.
    fn merge_callees(&mut self, module: &Module, site: ApplySite) -> bool {
        let mut callee_summary = FunctionAccessedStorage::new();
        for callee in callee_list(module, site).iter() {
            let Some(state) = self.states.get(&callee) else {
                continue;
            };
            callee_summary.merge_from(state.summary());
            self.dependents.entry(callee).or_default().insert(site.caller);
        }

        let Some(caller) = self.states.get_mut(&site.caller) else {
            return false;
        };
        caller
            .summary_mut()
            .merge_from_apply(&callee_summary, module, site, &self.config)
    }

    /// Re-merges the call sites of the functions summarized by a query until
    /// none of their summaries change.
    ///
    /// Summaries computed inside a call cycle only see the partial summaries
    /// of the functions on the cycle. Every merge is monotone, so this
    /// reaches a fixed point.
    fn refine(&mut self, module: &Module, funcs: &[FuncRef]) {
        let sites: Vec<ApplySite> = funcs
            .iter()
            .flat_map(|&func| ApplySite::collect(func, &module.funcs[func]))
            .collect();

        let mut iterations = 0;
        loop {
            iterations += 1;
            let mut changed = false;
            for &site in &sites {
                changed |= self.merge_callees(module, site);
            }

            if !changed {
                break;
            }
        }

        debug!(iterations, "refined recursive summaries");
    }

    fn summary_mut(&mut self, func: FuncRef) -> &mut FunctionAccessedStorage {
        self.states
            .get_mut(&func)
            .expect("summary must be in progress")
            .summary_mut()
    }
}
