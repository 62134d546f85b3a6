//! Conservative memory effects of functions whose body is not visible.
use smallvec::SmallVec;

use crate::Function;

/// Whether some memory may be read or written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryBehavior {
    pub read: bool,
    pub write: bool,
}

impl MemoryBehavior {
    pub const NONE: Self = Self {
        read: false,
        write: false,
    };
    pub const READ: Self = Self {
        read: true,
        write: false,
    };
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    pub fn may_read(self) -> bool {
        self.read
    }

    pub fn may_write(self) -> bool {
        self.write
    }

    pub fn union(self, rhs: Self) -> Self {
        Self {
            read: self.read | rhs.read,
            write: self.write | rhs.write,
        }
    }
}

/// Side effects of a function, split into effects on global memory and on the
/// memory reachable from each parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FuncSideEffects {
    pub global: MemoryBehavior,
    pub params: SmallVec<[MemoryBehavior; 4]>,
}

impl FuncSideEffects {
    /// A function that touches no memory at all.
    pub fn read_none() -> Self {
        Self::default()
    }

    pub fn read_only() -> Self {
        Self {
            global: MemoryBehavior::READ,
            params: SmallVec::new(),
        }
    }

    pub fn read_write() -> Self {
        Self {
            global: MemoryBehavior::READ_WRITE,
            params: SmallVec::new(),
        }
    }

    pub fn with_param(mut self, behavior: MemoryBehavior) -> Self {
        self.params.push(behavior);
        self
    }

    /// Union of the global effects and the effects on every parameter.
    pub fn overall(&self) -> MemoryBehavior {
        self.params
            .iter()
            .fold(self.global, |acc, param| acc.union(*param))
    }
}

/// Returns a conservative summary of a function that has no visible body.
///
/// The summary comes from the effects declared on the function signature.
/// Returns `None` if nothing is known about the function, or if the function
/// has a body (whose instructions are the precise source of its effects).
pub fn summarize_opaque_function(func: &Function) -> Option<FuncSideEffects> {
    if func.is_definition() {
        return None;
    }

    func.sig.effects().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_includes_params() {
        let effects = FuncSideEffects::read_none()
            .with_param(MemoryBehavior::NONE)
            .with_param(MemoryBehavior::READ);
        assert_eq!(effects.overall(), MemoryBehavior::READ);

        let effects = FuncSideEffects::read_only().with_param(MemoryBehavior::READ_WRITE);
        assert!(effects.overall().may_write());
        assert_eq!(FuncSideEffects::read_none().overall(), MemoryBehavior::NONE);
    }
}
