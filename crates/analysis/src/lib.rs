//! Interprocedural summaries of the storage a function may access under
//! dynamic exclusivity enforcement.
//!
//! A summary lets an optimizer ask whether an access in a caller can conflict
//! with any access performed during a call, without re-walking the callee.
pub mod accessed_storage_analysis;
pub mod callee;
pub mod config;
pub mod invalidation;
pub mod module_analysis;
pub mod storage_access;
pub mod transform;

pub use accessed_storage_analysis::AccessedStorageAnalysis;
pub use callee::{ApplySite, CalleeList, callee_list};
pub use config::AccessedStorageConfig;
pub use invalidation::{InvalidationListener, InvalidationNotifier};
pub use module_analysis::{CallGraph, CallGraphSccs, SccBuilder, SccInfo, SccRef};
pub use storage_access::{FunctionAccessedStorage, StorageAccessInfo, StorageAccessMap};
pub use transform::{caller_arg, transform_callee_storage};
