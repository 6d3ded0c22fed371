//! Long-lived decompilation session.
//!
//! A [`Session`] owns the type system, the function registry, the memory
//! capability and one [`FunctionCache`] per function. Requests for
//! different functions run concurrently; requests for the same function
//! queue on its cache slot.

use std::path::Path;
use std::sync::Arc;

use mdec_cfg::{JumpTableResolver, MemoryReader, TableJumpResolver};
use mdec_types::{Function, FunctionId, FunctionRegistry, FunctionResolver, TypeSystem};
use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DecompilerConfig;
use crate::decompiler::{Decompilation, Decompiler, FunctionCache};
use crate::error::{Error, Result};
use crate::serialize::SerializedDecompilation;
use crate::symbols::{SymbolFile, SymbolSummary};

/// Result of [`Session::decompile_function`]: the artifact, or
/// `{ "error": message }`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecompileOutcome {
    Success(Box<SerializedDecompilation>),
    Failure { error: String },
}

impl DecompileOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn decompilation(&self) -> Option<&SerializedDecompilation> {
        match self {
            Self::Success(decompilation) => Some(decompilation.as_ref()),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error } => Some(error),
        }
    }
}

type CacheSlot = Arc<Mutex<FunctionCache>>;

pub struct Session {
    types: TypeSystem,
    registry: FunctionRegistry,
    memory: Arc<dyn MemoryReader>,
    jump_tables: Arc<dyn JumpTableResolver>,
    config: DecompilerConfig,
    caches: Mutex<FxHashMap<FunctionId, CacheSlot>>,
}

impl Session {
    /// Session over `memory` with jump tables read from the same memory.
    pub fn new(memory: Arc<dyn MemoryReader>) -> Self {
        let jump_tables = Arc::new(TableJumpResolver::new(Arc::clone(&memory)));
        Self {
            types: TypeSystem::new(),
            registry: FunctionRegistry::new(),
            memory,
            jump_tables,
            config: DecompilerConfig::default(),
            caches: Mutex::new(FxHashMap::default()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: DecompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default table resolver.
    #[must_use]
    pub fn with_jump_tables(mut self, jump_tables: Arc<dyn JumpTableResolver>) -> Self {
        self.jump_tables = jump_tables;
        self
    }

    pub const fn types(&self) -> &TypeSystem {
        &self.types
    }

    pub const fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub const fn config(&self) -> &DecompilerConfig {
        &self.config
    }

    pub fn memory(&self) -> &dyn MemoryReader {
        self.memory.as_ref()
    }

    /// Declare the structures and functions of a symbol file.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed files and declarations the type system
    /// rejects.
    pub fn load_symbols(&self, path: &Path) -> Result<SymbolSummary> {
        let symbols = SymbolFile::from_path(path)?;
        let summary = symbols.declare(&self.types, &self.registry)?;
        info!(
            path = %path.display(),
            structures = summary.structures,
            functions = summary.functions,
            "loaded symbols"
        );
        Ok(summary)
    }

    /// Decompile one registered function. Errors are reported in the
    /// outcome, never raised.
    pub fn decompile_function(&self, id: FunctionId) -> DecompileOutcome {
        match self.try_decompile_function(id) {
            Ok(decompilation) => DecompileOutcome::Success(Box::new(decompilation.serialize())),
            Err(e) => {
                warn!(function = %id, error = %e, "decompilation failed");
                DecompileOutcome::Failure {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Decompile one registered function, keeping the typed result.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownFunction`] for unregistered ids, otherwise whatever
    /// the pipeline reports.
    pub fn try_decompile_function(&self, id: FunctionId) -> Result<Decompilation> {
        let function = self
            .registry
            .find_function_by_id(id)
            .ok_or(Error::UnknownFunction(id))?;
        let slot = self.cache_slot(id, &function);
        let mut cache = slot.lock();
        if !Arc::ptr_eq(cache.function(), &function) {
            *cache = FunctionCache::new(Arc::clone(&function));
        }
        let instructions = self
            .memory
            .decode_range(function.address, function.end_address);
        let result = Decompiler::new(&self.types, self.jump_tables.as_ref())
            .with_config(self.config.clone())
            .decompile(&instructions, &mut cache, &self.registry);
        if result.is_err() {
            cache.clear();
        }
        result
    }

    /// Decompile `ids` in parallel. Outcomes are returned in input order.
    pub fn decompile_functions(&self, ids: &[FunctionId]) -> Vec<DecompileOutcome> {
        let run = || {
            ids.par_iter()
                .map(|&id| self.decompile_function(id))
                .collect::<Vec<_>>()
        };
        if self.config.jobs == 0 {
            return run();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!(error = %e, jobs = self.config.jobs, "falling back to the global pool");
                run()
            }
        }
    }

    /// Drop the cached artifacts of `id`. Returns whether any existed.
    pub fn invalidate(&self, id: FunctionId) -> bool {
        let removed = self.caches.lock().remove(&id).is_some();
        debug!(function = %id, removed, "invalidated cache");
        removed
    }

    pub fn clear_cache(&self) {
        self.caches.lock().clear();
    }

    /// Number of functions with a cache slot.
    pub fn cached_functions(&self) -> usize {
        self.caches.lock().len()
    }

    fn cache_slot(&self, id: FunctionId, function: &Arc<Function>) -> CacheSlot {
        let mut caches = self.caches.lock();
        Arc::clone(
            caches
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(FunctionCache::new(Arc::clone(function))))),
        )
    }
}
