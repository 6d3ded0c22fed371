//! Promoted, named and typed variables for one decompilation.

use std::collections::BTreeSet;

use mdec_ir::{Location, VarId, VersionedLocation};
use mdec_types::{ArgLocation, Function, TypeId, TypeSystem};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::Result;
use crate::ssa::SsaForm;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VariableKind {
    Local,
    Receiver,
    /// Declared argument at this position.
    Parameter(usize),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DecompVariable {
    pub id: VarId,
    pub name: String,
    pub data_type: Option<TypeId>,
    pub kind: VariableKind,
    pub versions: BTreeSet<VersionedLocation>,
}

/// The only owner of variable state. Passes promote and annotate through
/// this API; a promoted version never moves to another variable.
#[derive(Clone, Debug, Default)]
pub struct VariableDatabase {
    variables: Vec<DecompVariable>,
    by_version: FxHashMap<VersionedLocation, VarId>,
    webs: FxHashMap<VersionedLocation, Vec<VersionedLocation>>,
}

fn default_name(id: VarId, location: Location) -> String {
    match location {
        Location::Stack(offset) if offset < 0 => format!("local_{:x}", offset.unsigned_abs()),
        Location::Stack(offset) => format!("stack_{offset:x}"),
        Location::Register(_) => format!("var{}", id.0),
    }
}

impl VariableDatabase {
    /// Empty database sharing the phi webs of `ssa`.
    pub fn new(ssa: &SsaForm) -> Self {
        let mut webs = FxHashMap::default();
        for class in ssa.congruence_classes() {
            for vloc in class {
                webs.insert(*vloc, class.clone());
            }
        }
        Self {
            variables: Vec::new(),
            by_version: FxHashMap::default(),
            webs,
        }
    }

    /// Database with the receiver and arguments of `function` promoted.
    pub fn with_parameters(ssa: &SsaForm, function: &Function, types: &TypeSystem) -> Result<Self> {
        let mut db = Self::new(ssa);
        let config = &function.call_config;
        if let (Some(location), Some(owner)) = (config.receiver, function.owner()) {
            let id = db.promote_parameter(location, VariableKind::Receiver, "this");
            db.set_type(id, types.get_pointer_type(owner)?);
        }
        for (index, location) in config.arguments.iter().enumerate() {
            let Some(location) = *location else {
                continue;
            };
            let id = db.promote_parameter(location, VariableKind::Parameter(index), &format!("arg{index}"));
            if let Some(&ty) = function.argument_types.get(index) {
                db.set_type(id, ty);
            }
        }
        Ok(db)
    }

    fn promote_parameter(&mut self, location: ArgLocation, kind: VariableKind, name: &str) -> VarId {
        let location = match location {
            ArgLocation::Register(reg) => Location::Register(reg),
            ArgLocation::Stack(offset) => Location::Stack(offset),
        };
        let id = self.promote_version_to_variable(VersionedLocation::entry(location));
        if let Some(var) = self.variable_mut(id) {
            var.kind = kind;
            var.name = name.to_string();
        }
        id
    }

    pub fn get_variable_with_version(&self, location: Location, version: u32) -> Option<&DecompVariable> {
        self.variable_of(VersionedLocation::new(location, version))
            .and_then(|id| self.variable(id))
    }

    pub fn variable_of(&self, vloc: VersionedLocation) -> Option<VarId> {
        self.by_version.get(&vloc).copied()
    }

    /// Promote `vloc` and every version in its phi web. Idempotent.
    pub fn promote_version_to_variable(&mut self, vloc: VersionedLocation) -> VarId {
        if let Some(id) = self.variable_of(vloc) {
            return id;
        }
        let web = self.webs.get(&vloc).cloned().unwrap_or_else(|| vec![vloc]);
        let existing = web.iter().find_map(|member| self.variable_of(*member));
        let id = existing.unwrap_or_else(|| {
            let id = VarId(u32::try_from(self.variables.len()).unwrap_or(u32::MAX));
            self.variables.push(DecompVariable {
                id,
                name: default_name(id, vloc.location),
                data_type: None,
                kind: VariableKind::Local,
                versions: BTreeSet::new(),
            });
            id
        });
        for member in web {
            self.by_version.insert(member, id);
            if let Some(var) = self.variable_mut(id) {
                var.versions.insert(member);
            }
        }
        trace!(%vloc, var = %id, "promoted");
        id
    }

    /// Promote every phi web, so all versions joined by a phi share one
    /// variable. Returns the number of new variables.
    pub fn promote_webs(&mut self) -> usize {
        let mut heads: Vec<VersionedLocation> = self
            .webs
            .values()
            .filter_map(|web| web.iter().min().copied())
            .collect();
        heads.sort_unstable();
        heads.dedup();
        let before = self.variables.len();
        for head in heads {
            self.promote_version_to_variable(head);
        }
        self.variables.len() - before
    }

    pub fn set_name(&mut self, id: VarId, name: &str) {
        if let Some(var) = self.variable_mut(id) {
            var.name = name.to_string();
        }
    }

    pub fn set_type(&mut self, id: VarId, ty: TypeId) {
        if let Some(var) = self.variable_mut(id) {
            var.data_type = Some(ty);
        }
    }

    pub fn variable(&self, id: VarId) -> Option<&DecompVariable> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.variables.get(index))
    }

    fn variable_mut(&mut self, id: VarId) -> Option<&mut DecompVariable> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.variables.get_mut(index))
    }

    pub fn variables(&self) -> &[DecompVariable] {
        &self.variables
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.variables.iter().any(|var| var.name == name)
    }

    /// Whether `id` still carries the name it was promoted with.
    pub fn has_default_name(&self, id: VarId) -> bool {
        self.variable(id).is_some_and(|var| {
            var.kind == VariableKind::Local
                && var
                    .versions
                    .first()
                    .is_some_and(|vloc| var.name == default_name(id, vloc.location))
        })
    }

    /// Variable name if promoted, otherwise the SSA name.
    pub fn display_name(&self, vloc: VersionedLocation) -> String {
        self.get_variable_with_version(vloc.location, vloc.version)
            .map_or_else(|| vloc.to_string(), |var| var.name.clone())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BASE, Fixture};
    use mdec_isa::{A0, A1, RA, V0, ZERO, asm};

    fn loop_ssa(fx: &Fixture) -> (std::sync::Arc<Function>, SsaForm) {
        let words = [
            asm::addiu(V0, ZERO, 0),
            asm::addiu(V0, V0, 1),
            asm::bne(V0, A1, -2),
            asm::nop(),
            asm::jr(RA),
            asm::nop(),
        ];
        let function = fx.function("count", BASE, words.len(), "int", &["int", "int"]);
        let cfg = fx.cfg(&words, &function);
        let ssa = SsaForm::build(&cfg, &function);
        (function, ssa)
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let fx = Fixture::new();
        let (_, ssa) = loop_ssa(&fx);
        let mut db = VariableDatabase::new(&ssa);
        let vloc = VersionedLocation::new(Location::Register(V0), 3);
        let first = db.promote_version_to_variable(vloc);
        let second = db.promote_version_to_variable(vloc);
        assert_eq!(first, second);
        assert_eq!(db.len(), 1);
    }

    #[test]
    fn test_promotion_covers_phi_web() {
        let fx = Fixture::new();
        let (_, ssa) = loop_ssa(&fx);
        let mut db = VariableDatabase::new(&ssa);
        let id = db.promote_version_to_variable(VersionedLocation::new(Location::Register(V0), 1));
        let var = db.get_variable_with_version(Location::Register(V0), 2).unwrap();
        assert_eq!(var.id, id);
        assert_eq!(var.versions.len(), 3);
        assert_eq!(
            db.promote_version_to_variable(VersionedLocation::new(Location::Register(V0), 3)),
            id
        );
    }

    #[test]
    fn test_webs_are_promoted_once() {
        let fx = Fixture::new();
        let (function, ssa) = loop_ssa(&fx);
        let mut db = VariableDatabase::with_parameters(&ssa, &function, &fx.types).unwrap();
        assert_eq!(db.promote_webs(), 1);
        assert_eq!(db.promote_webs(), 0);
        let var = db.get_variable_with_version(Location::Register(V0), 3).unwrap();
        assert_eq!(var.name, "var2");
        assert!(db.has_default_name(var.id));
    }

    #[test]
    fn test_parameters_are_promoted() {
        let fx = Fixture::new();
        let (function, ssa) = loop_ssa(&fx);
        let db = VariableDatabase::with_parameters(&ssa, &function, &fx.types).unwrap();
        let arg0 = db.get_variable_with_version(Location::Register(A0), 0).unwrap();
        assert_eq!(arg0.name, "arg0");
        assert_eq!(arg0.kind, VariableKind::Parameter(0));
        assert_eq!(arg0.data_type, Some(fx.ty("int")));
        assert_eq!(
            db.display_name(VersionedLocation::entry(Location::Register(A1))),
            "arg1"
        );
        assert_eq!(
            db.display_name(VersionedLocation::new(Location::Register(V0), 1)),
            "v0_1"
        );
    }

    #[test]
    fn test_set_name_and_type() {
        let fx = Fixture::new();
        let (_, ssa) = loop_ssa(&fx);
        let mut db = VariableDatabase::new(&ssa);
        let id = db.promote_version_to_variable(VersionedLocation::new(Location::Stack(-8), 1));
        assert_eq!(db.variable(id).unwrap().name, "local_8");
        assert!(db.has_default_name(id));
        db.set_name(id, "i");
        db.set_type(id, fx.ty("int"));
        assert!(!db.has_default_name(id));
        assert!(db.is_name_taken("i"));
        assert_eq!(db.variable(id).unwrap().data_type, Some(fx.ty("int")));
    }
}
