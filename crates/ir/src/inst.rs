//! Instruction definitions.
use std::fmt;

use cranelift_entity::entity_impl;
use smallvec::SmallVec;

use crate::{module::FuncRef, BlockId, ValueId};

/// An opaque reference to [`InstData`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);
entity_impl!(InstId, "inst");

/// The kind of a formal memory access.
///
/// `Read < Modify` forms a two point lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccessKind {
    Read,
    Modify,
}

impl AccessKind {
    pub fn join(self, rhs: Self) -> Self {
        self.max(rhs)
    }

    /// Two accesses conflict unless both of them only read.
    pub fn may_conflict(self, rhs: Self) -> bool {
        self == Self::Modify || rhs == Self::Modify
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Modify => "modify",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the exclusivity of an access is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Enforcement {
    /// Proven at compile time.
    Static,
    /// Checked at runtime.
    Dynamic,
    /// Not enforced at all.
    Unsafe,
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Dynamic => write!(f, "dynamic"),
            Self::Unsafe => write!(f, "unsafe"),
        }
    }
}

/// Operands shared by `begin_access` and `begin_unpaired_access`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessMarker {
    pub source: ValueId,
    pub kind: AccessKind,
    pub enforcement: Enforcement,
    /// Set when no nested access inside this scope may conflict with it.
    pub no_nested_conflict: bool,
}

impl AccessMarker {
    pub fn new(source: ValueId, kind: AccessKind, enforcement: Enforcement) -> Self {
        Self {
            source,
            kind,
            enforcement,
            no_nested_conflict: false,
        }
    }

    pub fn with_no_nested_conflict(mut self) -> Self {
        self.no_nested_conflict = true;
        self
    }

    pub fn is_dynamic(&self) -> bool {
        self.enforcement == Enforcement::Dynamic
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstData {
    /// Allocates a stack slot that never outlives the function.
    AllocStack,
    /// Allocates a reference counted box.
    AllocBox,
    /// Projects the address of the value stored in a box.
    ProjectBox { boxed: ValueId },
    /// Projects the address of a stored field of a class instance.
    RefElementAddr { object: ValueId, field: u32 },
    /// Projects the address of a struct field from the address of the struct.
    StructElementAddr { base: ValueId, field: u32 },
    /// Begins an access scope. The result is the address accessed inside the
    /// scope.
    BeginAccess(AccessMarker),
    EndAccess { access: ValueId },
    /// Begins an access that is not delimited by an `end_access`.
    BeginUnpairedAccess(AccessMarker),
    Load { addr: ValueId },
    Store { value: ValueId, addr: ValueId },
    FunctionRef { func: FuncRef },
    /// Dynamically dispatched method lookup.
    ClassMethod {
        object: ValueId,
        candidates: SmallVec<[FuncRef; 4]>,
        /// `false` if the method may resolve to a function outside of
        /// `candidates`.
        is_complete: bool,
    },
    /// Forms a closure by binding the trailing `args` of `callee`.
    PartialApply {
        callee: ValueId,
        args: SmallVec<[ValueId; 4]>,
    },
    /// Calls `callee` with all of its remaining arguments.
    Apply {
        callee: ValueId,
        args: SmallVec<[ValueId; 4]>,
    },
    Jump { dest: BlockId },
    Br {
        cond: ValueId,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Return { arg: Option<ValueId> },
}

impl InstData {
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Jump { .. } | Self::Br { .. } | Self::Return { .. })
    }

    /// Returns `true` if the instruction defines a value.
    pub fn has_result(&self) -> bool {
        !matches!(
            self,
            Self::EndAccess { .. }
                | Self::BeginUnpairedAccess(..)
                | Self::Store { .. }
                | Self::Jump { .. }
                | Self::Br { .. }
                | Self::Return { .. }
        )
    }

    /// Returns the access marker if the instruction begins an access.
    pub fn access_marker(&self) -> Option<&AccessMarker> {
        match self {
            Self::BeginAccess(marker) | Self::BeginUnpairedAccess(marker) => Some(marker),
            _ => None,
        }
    }

    pub fn visit_values(&self, f: &mut impl FnMut(ValueId)) {
        match self {
            Self::AllocStack | Self::AllocBox | Self::FunctionRef { .. } | Self::Jump { .. } => {}
            Self::ProjectBox { boxed } => f(*boxed),
            Self::RefElementAddr { object, .. } => f(*object),
            Self::StructElementAddr { base, .. } => f(*base),
            Self::BeginAccess(marker) | Self::BeginUnpairedAccess(marker) => f(marker.source),
            Self::EndAccess { access } => f(*access),
            Self::Load { addr } => f(*addr),
            Self::Store { value, addr } => {
                f(*value);
                f(*addr);
            }
            Self::ClassMethod { object, .. } => f(*object),
            Self::PartialApply { callee, args } | Self::Apply { callee, args } => {
                f(*callee);
                for &arg in args {
                    f(arg);
                }
            }
            Self::Br { cond, .. } => f(*cond),
            Self::Return { arg } => {
                if let Some(arg) = arg {
                    f(*arg)
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AllocStack => "alloc_stack",
            Self::AllocBox => "alloc_box",
            Self::ProjectBox { .. } => "project_box",
            Self::RefElementAddr { .. } => "ref_element_addr",
            Self::StructElementAddr { .. } => "struct_element_addr",
            Self::BeginAccess(..) => "begin_access",
            Self::EndAccess { .. } => "end_access",
            Self::BeginUnpairedAccess(..) => "begin_unpaired_access",
            Self::Load { .. } => "load",
            Self::Store { .. } => "store",
            Self::FunctionRef { .. } => "function_ref",
            Self::ClassMethod { .. } => "class_method",
            Self::PartialApply { .. } => "partial_apply",
            Self::Apply { .. } => "apply",
            Self::Jump { .. } => "jump",
            Self::Br { .. } => "br",
            Self::Return { .. } => "return",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_kind_lattice() {
        use AccessKind::*;
        assert_eq!(Read.join(Read), Read);
        assert_eq!(Read.join(Modify), Modify);
        assert_eq!(Modify.join(Read), Modify);
        assert_eq!(Modify.join(Modify), Modify);
    }

    #[test]
    fn access_kind_conflict() {
        use AccessKind::*;
        assert!(!Read.may_conflict(Read));
        assert!(Read.may_conflict(Modify));
        assert!(Modify.may_conflict(Read));
        assert!(Modify.may_conflict(Modify));
    }

    #[test]
    fn inst_id_display() {
        assert_eq!(InstId(3).to_string(), "inst3");
        assert_eq!(format!("{:?}", InstId(3)), "inst3");
    }

    #[test]
    fn unpaired_access_has_no_result() {
        let marker = AccessMarker::new(ValueId(0), AccessKind::Read, Enforcement::Dynamic);
        assert!(InstData::BeginAccess(marker).has_result());
        assert!(!InstData::BeginUnpairedAccess(marker).has_result());
        assert!(marker.is_dynamic());
        assert!(marker.with_no_nested_conflict().no_nested_conflict);
    }
}
