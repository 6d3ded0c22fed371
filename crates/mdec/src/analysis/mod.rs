//! Fixed-point rewriting of the structured tree.
//!
//! Every registered [`Analysis`] is applied to every node of the tree, in
//! name order, once per round. Rounds repeat until one of them changes
//! nothing. Passes never turn a classified memory access back into an
//! unclassified one, so the unclassified count only goes down.

mod array;
mod fields;
mod loops;
mod references;

use std::collections::BTreeMap;

use mdec_ir::{AstNode, VarId};
use mdec_types::TypeSystem;
use tracing::{debug, debug_span, trace};

use crate::error::{Error, Result};
use crate::ssa::SsaForm;
use crate::vars::VariableDatabase;

pub use array::ArrayAccessPass;
pub use fields::FieldAccessPass;
pub use loops::LoopVariablePass;
pub use references::VariableReferencePass;

/// State shared by the passes of one decompilation.
pub struct AnalysisContext<'a> {
    pub types: &'a TypeSystem,
    pub ssa: &'a SsaForm,
    pub variables: &'a mut VariableDatabase,
}

/// A rewrite applied to one node at a time.
pub trait Analysis: Send + Sync {
    /// Registry key. Passes run in ascending name order.
    fn name(&self) -> &'static str;

    /// Rewrite `node` in place. Nested bodies are visited separately.
    /// Returns whether anything changed.
    fn analyze(&self, node: &mut AstNode, ctx: &mut AnalysisContext<'_>) -> Result<bool>;
}

/// Outcome of [`Analyzer::run`].
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AnalysisReport {
    /// Rounds executed, including the final unchanged one.
    pub rounds: usize,
    /// Unclassified memory accesses before the first round and after each
    /// round.
    pub unclassified: Vec<usize>,
}

/// Pass registry and fixed-point driver.
pub struct Analyzer {
    passes: BTreeMap<&'static str, Box<dyn Analysis>>,
    max_rounds: usize,
}

impl Analyzer {
    /// Analyzer without passes.
    pub fn empty(max_rounds: usize) -> Self {
        Self {
            passes: BTreeMap::new(),
            max_rounds: max_rounds.max(1),
        }
    }

    /// Analyzer with every built-in pass.
    pub fn standard(max_rounds: usize) -> Self {
        Self::empty(max_rounds)
            .with_pass(ArrayAccessPass)
            .with_pass(FieldAccessPass)
            .with_pass(LoopVariablePass)
            .with_pass(VariableReferencePass)
    }

    /// Register a pass, replacing any pass with the same name.
    #[must_use]
    pub fn with_pass(mut self, pass: impl Analysis + 'static) -> Self {
        self.register(Box::new(pass));
        self
    }

    pub fn register(&mut self, pass: Box<dyn Analysis>) {
        self.passes.insert(pass.name(), pass);
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.keys().copied().collect()
    }

    /// Run rounds until nothing changes.
    ///
    /// Fails with [`Error::AnalysisDidNotConverge`] when every one of the
    /// allowed rounds made a change.
    pub fn run(&self, root: &mut AstNode, ctx: &mut AnalysisContext<'_>) -> Result<AnalysisReport> {
        let _span = debug_span!("analyze", passes = self.passes.len()).entered();
        let mut report = AnalysisReport {
            rounds: 0,
            unclassified: vec![root.unclassified_accesses()],
        };
        for round in 1..=self.max_rounds {
            let mut changed = false;
            for (name, pass) in &self.passes {
                if apply(pass.as_ref(), root, ctx)? {
                    trace!(pass = name, round, "changed");
                    changed = true;
                }
            }
            report.rounds = round;
            report.unclassified.push(root.unclassified_accesses());
            if !changed {
                debug!(rounds = round, unclassified = root.unclassified_accesses(), "converged");
                return Ok(report);
            }
        }
        Err(Error::AnalysisDidNotConverge {
            rounds: self.max_rounds,
        })
    }
}

/// Type `id` as `int` unless it already has a meaningful type. Returns
/// whether the type was set.
fn default_to_int(id: VarId, ctx: &mut AnalysisContext<'_>) -> Result<bool> {
    let current = ctx.variables.variable(id).and_then(|var| var.data_type);
    let unset = match current {
        None => true,
        Some(ty) => ctx.types.type_name(ty)? == "undefined",
    };
    if unset {
        ctx.variables.set_type(id, ctx.types.resolve("int")?);
    }
    Ok(unset)
}

/// Apply `pass` to `node` and then to every nested node.
fn apply(pass: &dyn Analysis, node: &mut AstNode, ctx: &mut AnalysisContext<'_>) -> Result<bool> {
    let mut changed = pass.analyze(node, ctx)?;
    for body in node.bodies_mut() {
        for child in body.iter_mut() {
            changed |= apply(pass, child, ctx)?;
        }
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BASE, Fixture, array_sum, synthesize};
    use mdec_ir::LoopKind;
    use mdec_isa::{A0, RA, V0, asm};

    /// Flips a flag on every visit, so it never settles.
    struct Restless;

    impl Analysis for Restless {
        fn name(&self) -> &'static str {
            "restless"
        }

        fn analyze(&self, node: &mut AstNode, _ctx: &mut AnalysisContext<'_>) -> Result<bool> {
            Ok(matches!(node, AstNode::Block { .. }))
        }
    }

    #[test]
    fn test_standard_pass_order() {
        let analyzer = Analyzer::standard(4);
        assert_eq!(
            analyzer.pass_names(),
            vec!["array_access", "field_access", "loop_variable", "variable_reference"]
        );
    }

    #[test]
    fn test_array_loop_converges() {
        let fx = Fixture::new();
        let words = array_sum();
        let function = fx.function("sum", BASE, words.len(), "int", &["int*", "int"]);
        let (ssa, mut root) = synthesize(&fx, &words, &function);
        let mut variables = VariableDatabase::with_parameters(&ssa, &function, &fx.types).unwrap();
        let mut ctx = AnalysisContext {
            types: &fx.types,
            ssa: &ssa,
            variables: &mut variables,
        };
        let report = Analyzer::standard(16).run(&mut root, &mut ctx).unwrap();

        assert_eq!(report.rounds, 2);
        assert_eq!(report.unclassified, vec![1, 0, 0]);
        assert!(report.unclassified.windows(2).all(|w| w[1] <= w[0]));

        let i = variables.variables().iter().find(|var| var.name == "i").unwrap();
        assert_eq!(i.data_type, Some(fx.ty("int")));
        let mut found_loop = false;
        root.walk(&mut |node| {
            if let AstNode::Loop { kind, condition, .. } = node {
                found_loop = true;
                assert_eq!(*kind, LoopKind::DoWhile);
                let refs = condition.as_ref().unwrap().references();
                assert!(refs.contains(&i.id));
            }
        });
        assert!(found_loop);
    }

    #[test]
    fn test_second_run_is_stable() {
        let fx = Fixture::new();
        let words = array_sum();
        let function = fx.function("sum", BASE, words.len(), "int", &["int*", "int"]);
        let (ssa, mut root) = synthesize(&fx, &words, &function);
        let mut variables = VariableDatabase::with_parameters(&ssa, &function, &fx.types).unwrap();
        let mut ctx = AnalysisContext {
            types: &fx.types,
            ssa: &ssa,
            variables: &mut variables,
        };
        let analyzer = Analyzer::standard(16);
        analyzer.run(&mut root, &mut ctx).unwrap();
        let settled = root.clone();
        let report = analyzer.run(&mut root, &mut ctx).unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(root, settled);
    }

    #[test]
    fn test_round_bound_is_reported() {
        let fx = Fixture::new();
        let words = [asm::jr(RA), asm::nop()];
        let function = fx.function("f", BASE, words.len(), "void", &[]);
        let (ssa, mut root) = synthesize(&fx, &words, &function);
        let mut variables = VariableDatabase::new(&ssa);
        let mut ctx = AnalysisContext {
            types: &fx.types,
            ssa: &ssa,
            variables: &mut variables,
        };
        let err = Analyzer::empty(3)
            .with_pass(Restless)
            .run(&mut root, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::AnalysisDidNotConverge { rounds: 3 }));
    }

    #[test]
    fn test_empty_analyzer_settles_immediately() {
        let fx = Fixture::new();
        let words = [asm::lw(V0, 0, A0), asm::jr(RA), asm::nop()];
        let function = fx.function("f", BASE, words.len(), "int", &["int*"]);
        let (ssa, mut root) = synthesize(&fx, &words, &function);
        let mut variables = VariableDatabase::new(&ssa);
        let mut ctx = AnalysisContext {
            types: &fx.types,
            ssa: &ssa,
            variables: &mut variables,
        };
        let report = Analyzer::empty(16).run(&mut root, &mut ctx).unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(report.unclassified, vec![1, 1]);
    }
}
