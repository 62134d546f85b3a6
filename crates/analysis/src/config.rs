/// Tuning knobs of [`crate::AccessedStorageAnalysis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessedStorageConfig {
    /// How many `partial_apply` levels are walked to find the caller side
    /// argument of a callee parameter. Parameters bound deeper in a chain of
    /// partial applications are treated as unknown.
    pub max_partial_apply_depth: usize,

    /// Maximum nesting of on-demand callee summarization. A call whose callee
    /// would be summarized deeper than this gets the worst case summary.
    pub max_recursion_depth: usize,

    /// Re-merge call sites of recursive functions until the summaries stop
    /// changing. Without this, a function reached again while it is being
    /// summarized contributes only its partial summary.
    pub refine_recursive_summaries: bool,
}

impl AccessedStorageConfig {
    /// A configuration that summarizes exactly like a single bottom-up walk:
    /// recursion contributes partial summaries and is never revisited.
    pub fn single_pass() -> Self {
        Self {
            refine_recursive_summaries: false,
            ..Self::default()
        }
    }
}

impl Default for AccessedStorageConfig {
    fn default() -> Self {
        Self {
            max_partial_apply_depth: 1,
            max_recursion_depth: 32,
            refine_recursive_summaries: true,
        }
    }
}
