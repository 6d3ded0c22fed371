//! Single-function pipeline: CFG, SSA, lifting, structuring and analysis.

use std::collections::BTreeMap;
use std::sync::Arc;

use mdec_cfg::{ControlFlowGraph, JumpTableResolver};
use mdec_ir::{AstNode, VarId};
use mdec_isa::Instruction;
use mdec_types::{Function, FunctionResolver, TypeSystem};
use tracing::{debug, debug_span, info_span};

use crate::analysis::{AnalysisContext, AnalysisReport, Analyzer};
use crate::config::DecompilerConfig;
use crate::error::Result;
use crate::lift::lift;
use crate::propagate::{PropagationStats, propagate};
use crate::serialize::{SerializedDecompilation, serialize};
use crate::ssa::SsaForm;
use crate::structure::structure;
use crate::vars::VariableDatabase;

/// Intermediate artifacts of one function, reused across runs.
///
/// The CFG, SSA form and variable database only depend on the function's
/// bytes and signature. Drop the cache when either changes.
#[derive(Debug)]
pub struct FunctionCache {
    function: Arc<Function>,
    cfg: Option<ControlFlowGraph>,
    ssa: Option<SsaForm>,
    variables: Option<VariableDatabase>,
}

impl FunctionCache {
    pub const fn new(function: Arc<Function>) -> Self {
        Self {
            function,
            cfg: None,
            ssa: None,
            variables: None,
        }
    }

    pub const fn function(&self) -> &Arc<Function> {
        &self.function
    }

    pub const fn cfg(&self) -> Option<&ControlFlowGraph> {
        self.cfg.as_ref()
    }

    pub const fn ssa(&self) -> Option<&SsaForm> {
        self.ssa.as_ref()
    }

    pub const fn variables(&self) -> Option<&VariableDatabase> {
        self.variables.as_ref()
    }

    /// Whether a previous run left artifacts behind.
    pub const fn is_warm(&self) -> bool {
        self.cfg.is_some()
    }

    pub fn clear(&mut self) {
        self.cfg = None;
        self.ssa = None;
        self.variables = None;
    }
}

/// A call site and the function it resolved to.
#[derive(Clone, Debug)]
pub struct Callee {
    /// Address of the call instruction.
    pub site: u32,
    pub target: u32,
    pub function: Option<Arc<Function>>,
}

/// Size counters for one run.
#[derive(Clone, Copy, Debug, Default)]
pub struct DecompileStats {
    pub instructions: usize,
    pub blocks: usize,
    pub frame_size: i32,
    pub propagation: PropagationStats,
}

/// Result of decompiling one function.
#[derive(Clone, Debug)]
pub struct Decompilation {
    pub function: Arc<Function>,
    pub root: AstNode,
    pub variables: VariableDatabase,
    /// Type name of every typed variable.
    pub type_names: BTreeMap<VarId, String>,
    pub return_type: String,
    pub owner: Option<String>,
    pub callees: Vec<Callee>,
    pub report: AnalysisReport,
    pub stats: DecompileStats,
}

impl Decompilation {
    /// Self-contained artifact for presentation layers.
    pub fn serialize(&self) -> SerializedDecompilation {
        serialize(self)
    }
}

/// Runs the pipeline against a shared type system.
pub struct Decompiler<'a> {
    types: &'a TypeSystem,
    jump_tables: &'a dyn JumpTableResolver,
    config: DecompilerConfig,
}

impl<'a> Decompiler<'a> {
    pub fn new(types: &'a TypeSystem, jump_tables: &'a dyn JumpTableResolver) -> Self {
        Self {
            types,
            jump_tables,
            config: DecompilerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DecompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn config(&self) -> &DecompilerConfig {
        &self.config
    }

    /// Decompile `instructions`, the full body of the cached function.
    ///
    /// # Errors
    ///
    /// Control flow errors, type lookups of unregistered ids, and analysis
    /// that does not settle within the configured rounds.
    pub fn decompile(
        &self,
        instructions: &[Instruction],
        cache: &mut FunctionCache,
        resolver: &dyn FunctionResolver,
    ) -> Result<Decompilation> {
        let function = Arc::clone(&cache.function);
        let _span = info_span!(
            "decompile",
            function = %function.name,
            address = format_args!("{:#x}", function.address)
        )
        .entered();
        let warm = cache.is_warm();

        let cfg: &ControlFlowGraph = match &mut cache.cfg {
            Some(cfg) => cfg,
            slot @ None => {
                let _span = debug_span!("cfg").entered();
                let mut cfg = ControlFlowGraph::build(instructions, self.jump_tables)?;
                let resolved = cfg.post_process(&function, resolver);
                debug!(blocks = cfg.len(), resolved, "built cfg");
                slot.insert(cfg)
            }
        };
        let ssa: &SsaForm = match &mut cache.ssa {
            Some(ssa) => ssa,
            slot @ None => {
                let _span = debug_span!("ssa").entered();
                slot.insert(SsaForm::build(cfg, &function))
            }
        };
        let variables = match &mut cache.variables {
            Some(variables) => variables,
            slot @ None => {
                let mut variables = VariableDatabase::with_parameters(ssa, &function, self.types)?;
                let webs = variables.promote_webs();
                debug!(parameters = variables.len() - webs, webs, "promoted variables");
                slot.insert(variables)
            }
        };
        debug!(warm, "artifacts ready");

        let mut blocks = {
            let _span = debug_span!("lift").entered();
            lift(cfg, ssa, &function)
        };
        let propagation = propagate(&mut blocks, cfg, ssa, &self.config);
        let mut root = {
            let _span = debug_span!("structure").entered();
            structure(cfg, blocks)
        };
        let report = Analyzer::standard(self.config.max_analysis_rounds).run(
            &mut root,
            &mut AnalysisContext {
                types: self.types,
                ssa,
                variables: &mut *variables,
            },
        )?;

        let mut type_names = BTreeMap::new();
        for var in variables.variables() {
            if let Some(ty) = var.data_type {
                type_names.insert(var.id, self.types.type_name(ty)?);
            }
        }
        let owner = function
            .owner()
            .map(|owner| self.types.type_name(owner))
            .transpose()?;
        let callees = cfg
            .blocks()
            .iter()
            .filter_map(|block| block.call.as_ref())
            .map(|site| Callee {
                site: site.address,
                target: site.target,
                function: site.function.clone(),
            })
            .collect();

        Ok(Decompilation {
            return_type: self.types.type_name(function.return_type)?,
            owner,
            type_names,
            callees,
            report,
            stats: DecompileStats {
                instructions: instructions.len(),
                blocks: cfg.len(),
                frame_size: ssa.frame().size(),
                propagation,
            },
            variables: variables.clone(),
            root,
            function,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_support::{BASE, Fixture, array_sum};
    use mdec_cfg::NoJumpTables;
    use mdec_isa::{A0, RA, SP, V0, asm, decode_all};

    #[test]
    fn test_cache_is_filled_and_reused() {
        let fx = Fixture::new();
        let words = array_sum();
        let function = fx.function("sum", BASE, words.len(), "int", &["int*", "int"]);
        let decompiler = Decompiler::new(&fx.types, &NoJumpTables);
        let mut cache = FunctionCache::new(Arc::clone(&function));
        assert!(!cache.is_warm());

        let instructions = decode_all(&words, BASE);
        let first = decompiler.decompile(&instructions, &mut cache, &fx.registry).unwrap();
        assert!(cache.is_warm());
        assert!(cache.variables().is_some());
        let second = decompiler.decompile(&instructions, &mut cache, &fx.registry).unwrap();
        assert_eq!(first.root, second.root);
        assert_eq!(first.stats.blocks, 3);
        assert_eq!(first.return_type, "int");
        assert_eq!(first.type_names.values().filter(|name| *name == "int").count(), 2);

        cache.clear();
        assert!(!cache.is_warm());
    }

    #[test]
    fn test_frame_and_callees_are_reported() {
        let fx = Fixture::new();
        fx.function("helper", 0x0020_0000, 2, "void", &["int"]);
        let words = [
            asm::addiu(SP, SP, -16),
            asm::sw(RA, 12, SP),
            asm::jal(0x0020_0000),
            asm::mov(A0, V0),
            asm::lw(RA, 12, SP),
            asm::jr(RA),
            asm::addiu(SP, SP, 16),
        ];
        let function = fx.function("outer", BASE, words.len(), "void", &[]);
        let decompiler = Decompiler::new(&fx.types, &NoJumpTables);
        let mut cache = FunctionCache::new(function);
        let result = decompiler
            .decompile(&decode_all(&words, BASE), &mut cache, &fx.registry)
            .unwrap();
        assert_eq!(result.stats.frame_size, 16);
        assert_eq!(result.callees.len(), 1);
        assert_eq!(result.callees[0].target, 0x0020_0000);
        assert_eq!(result.callees[0].function.as_ref().unwrap().name, "helper");
        assert!(result.stats.propagation.elided > 0);
    }

    #[test]
    fn test_empty_function_is_an_error() {
        let fx = Fixture::new();
        let function = fx.function("empty", BASE, 1, "void", &[]);
        let decompiler = Decompiler::new(&fx.types, &NoJumpTables);
        let mut cache = FunctionCache::new(function);
        let err = decompiler.decompile(&[], &mut cache, &fx.registry).unwrap_err();
        assert!(matches!(err, Error::Cfg(_)));
        assert!(!cache.is_warm());
    }
}
