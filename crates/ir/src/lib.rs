//! A small SSA intermediate representation with formal memory access
//! markers, together with the storage identification and side-effect
//! queries that the accessed storage analysis consumes.
pub mod builder;
pub mod dfg;
pub mod function;
pub mod global_variable;
pub mod inst;
pub mod ir_writer;
pub mod layout;
pub mod linkage;
pub mod module;
pub mod side_effect;
pub mod storage;
pub mod value;

pub use dfg::{Block, BlockId, DataFlowGraph};
pub use function::{Function, Signature};
pub use global_variable::{GlobalVariable, GlobalVariableData, GlobalVariableStore};
pub use inst::{AccessKind, AccessMarker, Enforcement, InstData, InstId};
pub use layout::Layout;
pub use linkage::Linkage;
pub use module::{FuncRef, Module};
pub use side_effect::{FuncSideEffects, MemoryBehavior};
pub use storage::AccessedStorage;
pub use value::{FuncValue, Value, ValueId};
