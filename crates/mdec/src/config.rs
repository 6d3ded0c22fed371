//! Decompiler options.

/// Default bound on analyzer rounds.
pub const DEFAULT_MAX_ANALYSIS_ROUNDS: usize = 16;

/// Options for one decompilation session.
#[derive(Clone, Debug)]
pub struct DecompilerConfig {
    /// Analyzer rounds before reporting non-convergence. At least 1.
    pub max_analysis_rounds: usize,
    /// Drop callee-saved register spills, their reloads and stack pointer
    /// adjustment.
    pub elide_frame: bool,
    /// Copy propagation, single-use inlining and dead assignment removal.
    pub propagate_expressions: bool,
    /// Worker threads for bulk decompilation (0 = rayon default).
    pub jobs: usize,
}

impl Default for DecompilerConfig {
    fn default() -> Self {
        Self {
            max_analysis_rounds: DEFAULT_MAX_ANALYSIS_ROUNDS,
            elide_frame: true,
            propagate_expressions: true,
            jobs: 0,
        }
    }
}

impl DecompilerConfig {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the analyzer round bound. Clamped to at least one round.
    #[must_use]
    pub fn with_max_analysis_rounds(mut self, rounds: usize) -> Self {
        self.max_analysis_rounds = rounds.max(1);
        self
    }

    #[must_use]
    pub const fn with_elide_frame(mut self, enabled: bool) -> Self {
        self.elide_frame = enabled;
        self
    }

    #[must_use]
    pub const fn with_propagate_expressions(mut self, enabled: bool) -> Self {
        self.propagate_expressions = enabled;
        self
    }

    /// Set worker count for [`Session::decompile_functions`](crate::Session::decompile_functions).
    #[must_use]
    pub const fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }
}
