//! Hooks through which a pass manager reports IR changes to cached analyses.
use exclusivity_ir::FuncRef;

use crate::AccessedStorageAnalysis;

/// An analysis whose results depend on the IR and must be dropped when the
/// IR changes.
///
/// The implementor only drops what is directly affected. Propagating a change
/// to other functions, e.g., to the callers of a changed function, is the
/// responsibility of whoever reports it.
pub trait InvalidationListener {
    /// The body of `func` changed.
    fn notify_func_changed(&mut self, func: FuncRef);

    /// Anything in the module may have changed.
    fn notify_module_changed(&mut self);
}

impl InvalidationListener for AccessedStorageAnalysis {
    fn notify_func_changed(&mut self, func: FuncRef) {
        self.invalidate(func);
    }

    fn notify_module_changed(&mut self) {
        self.invalidate_all();
    }
}

/// Forwards change notifications to every registered listener.
#[derive(Default)]
pub struct InvalidationNotifier<'a> {
    listeners: Vec<&'a mut dyn InvalidationListener>,
}

impl<'a> InvalidationNotifier<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: &'a mut dyn InvalidationListener) {
        self.listeners.push(listener);
    }

    pub fn func_changed(&mut self, func: FuncRef) {
        for listener in &mut self.listeners {
            listener.notify_func_changed(func);
        }
    }

    pub fn module_changed(&mut self) {
        for listener in &mut self.listeners {
            listener.notify_module_changed();
        }
    }
}
