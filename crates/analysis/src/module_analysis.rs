use cranelift_entity::{PrimaryMap, SecondaryMap, entity_impl};
use exclusivity_ir::{Module, module::FuncRef};
use rustc_hash::FxHashSet;

use crate::callee::{ApplySite, callee_list};

#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    nodes: SecondaryMap<FuncRef, Node>,
}

impl CallGraph {
    /// Builds a call graph from a module.
    ///
    /// Edges are derived from the resolved callees of every apply site, so a
    /// dynamically dispatched call contributes an edge to each candidate.
    pub fn build_graph(module: &Module) -> Self {
        let mut nodes: SecondaryMap<FuncRef, Node> = SecondaryMap::new();

        for func_ref in module.iter_functions() {
            let func = &module.funcs[func_ref];
            let mut callees = FxHashSet::default();
            let mut has_unknown_callee = false;
            for site in ApplySite::collect(func_ref, func) {
                let list = callee_list(module, site);
                has_unknown_callee |= !list.is_complete();
                callees.extend(list.iter());
            }

            let mut callees: Vec<_> = callees.into_iter().collect();
            callees.sort_unstable();
            nodes[func_ref].callees = callees;
            nodes[func_ref].has_unknown_callee = has_unknown_callee;
        }

        for func_ref in module.iter_functions() {
            for callee in nodes[func_ref].callees.clone() {
                nodes[callee].callers.push(func_ref);
            }
        }

        CallGraph { nodes }
    }

    pub fn funcs(&self) -> impl Iterator<Item = FuncRef> + '_ {
        self.nodes.keys()
    }

    /// Get the callees of a function.
    pub fn callee_of(&self, func_ref: FuncRef) -> &[FuncRef] {
        &self.nodes[func_ref].callees
    }

    /// Get the functions that may call `func_ref`, sorted.
    pub fn callers_of(&self, func_ref: FuncRef) -> &[FuncRef] {
        &self.nodes[func_ref].callers
    }

    /// Returns `true` if the function has a call whose callees are not all
    /// known.
    pub fn has_unknown_callee(&self, func_ref: FuncRef) -> bool {
        self.nodes[func_ref].has_unknown_callee
    }

    /// Collects `func_ref` and every function that transitively calls it.
    pub fn transitive_callers(&self, func_ref: FuncRef) -> FxHashSet<FuncRef> {
        let mut visited = FxHashSet::default();
        let mut worklist = vec![func_ref];
        while let Some(func) = worklist.pop() {
            if visited.insert(func) {
                worklist.extend(self.callers_of(func).iter().copied());
            }
        }
        visited
    }
}

/// Represents the strongly connected components of a call graph in a module.
#[derive(Debug, Clone)]
pub struct CallGraphSccs {
    scc_map: SecondaryMap<FuncRef, SccRef>,
    scc_store: PrimaryMap<SccRef, SccInfo>,
}

impl CallGraphSccs {
    pub fn scc_ref(&self, func_ref: FuncRef) -> SccRef {
        self.scc_map[func_ref]
    }

    /// Iterates SCCs so that every SCC comes after all SCCs it calls into.
    pub fn bottom_up(&self) -> impl Iterator<Item = &SccInfo> {
        // Tarjan's algorithm completes an SCC only after every SCC reachable
        // from it.
        self.scc_store.values()
    }
}

/// Represents the information of a strongly connected component in a call graph
/// of a module.
#[derive(Debug, Clone)]
pub struct SccInfo {
    /// The functions in the SCC.
    pub components: FxHashSet<FuncRef>,
}

impl SccInfo {
    /// Returns the components sorted by function reference.
    pub fn sorted_components(&self) -> Vec<FuncRef> {
        let mut components: Vec<_> = self.components.iter().copied().collect();
        components.sort_unstable();
        components
    }
}

#[derive(Debug, Default)]
pub struct SccBuilder {
    scc_map: SecondaryMap<FuncRef, SccRef>,
    scc_store: PrimaryMap<SccRef, SccInfo>,
    stack: Vec<FuncRef>,
    nodes: SecondaryMap<FuncRef, NodeState>,
    next_index: usize,
}

impl SccBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compute_scc(mut self, call_graph: &CallGraph) -> CallGraphSccs {
        for func_ref in call_graph.nodes.keys() {
            if !self.nodes[func_ref].visited {
                self.strong_component(func_ref, call_graph);
            }
        }

        CallGraphSccs {
            scc_map: self.scc_map,
            scc_store: self.scc_store,
        }
    }

    /// Runs Tarjan's algorithm from `root` with an explicit stack of
    /// frames, so long call chains don't overflow the native stack.
    fn strong_component(&mut self, root: FuncRef, call_graph: &CallGraph) {
        self.enter(root);
        // A frame is a function and the position of its next callee.
        let mut frames = vec![(root, 0)];

        while let Some((func_ref, next_callee)) = frames.last_mut() {
            let func_ref = *func_ref;
            if let Some(&callee) = call_graph.callee_of(func_ref).get(*next_callee) {
                *next_callee += 1;
                if !self.nodes[callee].visited {
                    self.enter(callee);
                    frames.push((callee, 0));
                } else if self.nodes[callee].on_stack {
                    let index = self.nodes[callee].index;
                    self.lower_lowlink(func_ref, index);
                }
                continue;
            }

            frames.pop();
            let lowlink = self.nodes[func_ref].lowlink;
            if let Some(&(parent, _)) = frames.last() {
                self.lower_lowlink(parent, lowlink);
            }
            if self.nodes[func_ref].index == lowlink {
                self.pop_scc(func_ref);
            }
        }
    }

    fn enter(&mut self, func_ref: FuncRef) {
        let index = self.next_index;
        self.next_index += 1;
        self.nodes[func_ref] = NodeState {
            index,
            lowlink: index,
            on_stack: true,
            visited: true,
        };
        self.stack.push(func_ref);
    }

    fn lower_lowlink(&mut self, func_ref: FuncRef, lowlink: usize) {
        let node = &mut self.nodes[func_ref];
        node.lowlink = node.lowlink.min(lowlink);
    }

    /// Pops the SCC rooted at `root` off the stack.
    fn pop_scc(&mut self, root: FuncRef) {
        let scc_ref = self.scc_store.next_key();
        let mut components = FxHashSet::default();
        while let Some(func_ref) = self.stack.pop() {
            self.nodes[func_ref].on_stack = false;
            self.scc_map[func_ref] = scc_ref;
            components.insert(func_ref);
            if func_ref == root {
                break;
            }
        }

        self.scc_store.push(SccInfo { components });
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    callees: Vec<FuncRef>,
    callers: Vec<FuncRef>,
    has_unknown_callee: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SccRef(u32);
entity_impl!(SccRef);

#[derive(Default, Debug, Clone)]
struct NodeState {
    index: usize,
    lowlink: usize,
    on_stack: bool,
    visited: bool,
}

#[cfg(test)]
mod tests {
    use exclusivity_ir::builder::test_util::TestModuleBuilder;

    use super::*;

    #[test]
    fn call_graph_and_sccs() {
        let mut mb = TestModuleBuilder::new();
        let ext = mb.declare_external("ext", 0, None);
        let leaf = mb.declare("leaf", 0);
        let even = mb.declare("even", 0);
        let odd = mb.declare("odd", 0);
        let main = mb.declare("main", 1);

        let mut builder = mb.define(leaf);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        builder.ret(None);
        builder.finish();

        let mut builder = mb.define(even);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        builder.call(odd, &[]);
        builder.call(leaf, &[]);
        builder.ret(None);
        builder.finish();

        let mut builder = mb.define(odd);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        builder.call(even, &[]);
        builder.ret(None);
        builder.finish();

        let mut builder = mb.define(main);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        let closure = builder.args()[0];
        builder.call(even, &[]);
        builder.call(ext, &[]);
        builder.apply(closure, &[]);
        builder.ret(None);
        builder.finish();

        let module = mb.build();
        let call_graph = CallGraph::build_graph(&module);

        assert_eq!(call_graph.callee_of(main), &[ext, even]);
        assert_eq!(call_graph.callers_of(even), &[odd, main]);
        assert!(call_graph.has_unknown_callee(main));
        assert!(!call_graph.has_unknown_callee(even));
        assert!(call_graph.callee_of(leaf).is_empty());
        assert!(call_graph.callee_of(ext).is_empty());

        let callers = call_graph.transitive_callers(leaf);
        assert_eq!(callers.len(), 4);
        assert!(!callers.contains(&ext));

        let sccs = SccBuilder::new().compute_scc(&call_graph);
        assert_eq!(sccs.scc_ref(even), sccs.scc_ref(odd));
        assert_ne!(sccs.scc_ref(even), sccs.scc_ref(leaf));
        assert_ne!(sccs.scc_ref(even), sccs.scc_ref(main));

        let order: Vec<_> = sccs.bottom_up().map(|scc| scc.sorted_components()).collect();
        let position = |func| order.iter().position(|scc| scc.contains(&func)).unwrap();
        assert!(position(leaf) < position(even));
        assert!(position(ext) < position(main));
        assert!(position(even) < position(main));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn self_recursion_scc() {
        let mut mb = TestModuleBuilder::new();
        let (f, mut builder) = mb.func_builder("f", 0);
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        builder.call(f, &[]);
        builder.ret(None);
        builder.finish();

        let module = mb.build();
        let call_graph = CallGraph::build_graph(&module);
        let sccs = SccBuilder::new().compute_scc(&call_graph);
        let order: Vec<_> = sccs.bottom_up().map(|scc| scc.sorted_components()).collect();
        assert_eq!(order, vec![vec![f]]);
        assert_eq!(call_graph.callers_of(f), &[f]);
    }

    #[test]
    fn long_call_chain() {
        // func0 -> func1 -> ... -> func{N-1}, with the last one calling back
        // into the middle of the chain.
        const N: usize = 5000;
        let mut mb = TestModuleBuilder::new();
        let funcs: Vec<_> = (0..N).map(|i| mb.declare(&format!("func{i}"), 0)).collect();
        for (i, &func) in funcs.iter().enumerate() {
            let mut builder = mb.define(func);
            let entry = builder.append_block();
            builder.switch_to_block(entry);
            let callee = if i + 1 < N { funcs[i + 1] } else { funcs[N / 2] };
            builder.call(callee, &[]);
            builder.ret(None);
            builder.finish();
        }

        let module = mb.build();
        let call_graph = CallGraph::build_graph(&module);
        let sccs = SccBuilder::new().compute_scc(&call_graph);

        let order: Vec<_> = sccs.bottom_up().collect();
        assert_eq!(order.len(), N / 2 + 1);
        assert_eq!(order[0].components.len(), N - N / 2);
        assert_eq!(sccs.scc_ref(funcs[N / 2]), sccs.scc_ref(funcs[N - 1]));
        assert_eq!(order.last().unwrap().sorted_components(), vec![funcs[0]]);
    }
}
