//! Functions, methods and the function registry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{Result, TypeError};
use crate::{CallConfig, TypeId, TypeSystem};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FunctionKind {
    Free,
    Method { owner: TypeId },
}

/// A function with a resolved signature. Shared as `Arc<Function>`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub address: u32,
    /// Exclusive.
    pub end_address: u32,
    pub signature: TypeId,
    pub call_config: CallConfig,
    pub return_type: TypeId,
    pub argument_types: Vec<TypeId>,
    pub kind: FunctionKind,
}

impl Function {
    pub const fn contains(&self, address: u32) -> bool {
        address >= self.address && address < self.end_address
    }

    pub const fn instruction_count(&self) -> u32 {
        self.end_address.saturating_sub(self.address) / 4
    }

    pub const fn owner(&self) -> Option<TypeId> {
        match self.kind {
            FunctionKind::Method { owner } => Some(owner),
            FunctionKind::Free => None,
        }
    }
}

/// Function lookup capability consumed by the CFG builder and lifter.
pub trait FunctionResolver: Send + Sync {
    fn find_function_by_address(&self, address: u32) -> Option<Arc<Function>>;
    fn find_function_by_id(&self, id: FunctionId) -> Option<Arc<Function>>;
}

#[derive(Default)]
struct Registry {
    by_id: FxHashMap<FunctionId, Arc<Function>>,
    by_address: BTreeMap<u32, FunctionId>,
    by_name: FxHashMap<String, FunctionId>,
    next_id: u32,
}

/// Process-wide function table.
#[derive(Default)]
pub struct FunctionRegistry {
    inner: RwLock<Registry>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a free function with signature type `signature`.
    pub fn register_function(
        &self,
        types: &TypeSystem,
        name: &str,
        address: u32,
        end_address: u32,
        signature: TypeId,
    ) -> Result<Arc<Function>> {
        self.register(types, name, address, end_address, signature, FunctionKind::Free)
    }

    /// Register a method of structure `owner`. The signature must carry a receiver.
    pub fn register_method(
        &self,
        types: &TypeSystem,
        owner: TypeId,
        name: &str,
        address: u32,
        end_address: u32,
        signature: TypeId,
    ) -> Result<Arc<Function>> {
        let owner_type = types.get_type(owner)?;
        if owner_type.structure().is_none() {
            return Err(TypeError::NotAStructure(owner_type.name.clone()));
        }
        self.register(
            types,
            name,
            address,
            end_address,
            signature,
            FunctionKind::Method { owner },
        )
    }

    fn register(
        &self,
        types: &TypeSystem,
        name: &str,
        address: u32,
        end_address: u32,
        signature: TypeId,
        kind: FunctionKind,
    ) -> Result<Arc<Function>> {
        let sig_type = types.get_type(signature)?;
        let Some(sig) = sig_type.signature() else {
            return Err(TypeError::InvalidSignature(format!(
                "{name} declared with non-signature type {}",
                sig_type.name
            )));
        };
        if matches!(kind, FunctionKind::Method { .. }) && sig.receiver.is_none() {
            return Err(TypeError::InvalidSignature(format!(
                "method {name} has no receiver"
            )));
        }
        if end_address <= address {
            return Err(TypeError::InvalidSignature(format!(
                "{name} has empty range {address:#x}..{end_address:#x}"
            )));
        }

        let mut inner = self.inner.write();
        if inner.by_name.contains_key(name) {
            return Err(TypeError::DuplicateName(name.to_string()));
        }
        let id = FunctionId(inner.next_id);
        inner.next_id += 1;
        let function = Arc::new(Function {
            id,
            name: name.to_string(),
            address,
            end_address,
            signature,
            call_config: sig.call_config.clone(),
            return_type: sig.return_type,
            argument_types: sig.arguments.clone(),
            kind,
        });
        inner.by_id.insert(id, Arc::clone(&function));
        inner.by_address.insert(address, id);
        inner.by_name.insert(name.to_string(), id);
        debug!(name, address = format_args!("{address:#x}"), "registered function");
        Ok(function)
    }

    pub fn find_function_by_name(&self, name: &str) -> Option<Arc<Function>> {
        let inner = self.inner.read();
        inner
            .by_name
            .get(name)
            .and_then(|id| inner.by_id.get(id))
            .cloned()
    }

    /// Every function, ordered by address.
    pub fn functions(&self) -> Vec<Arc<Function>> {
        let inner = self.inner.read();
        inner
            .by_address
            .values()
            .filter_map(|id| inner.by_id.get(id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FunctionResolver for FunctionRegistry {
    fn find_function_by_address(&self, address: u32) -> Option<Arc<Function>> {
        let inner = self.inner.read();
        inner
            .by_address
            .get(&address)
            .and_then(|id| inner.by_id.get(id))
            .cloned()
    }

    fn find_function_by_id(&self, id: FunctionId) -> Option<Arc<Function>> {
        self.inner.read().by_id.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArgLocation;
    use mdec_isa::{A0, A1, A2};

    fn setup() -> (TypeSystem, FunctionRegistry) {
        (TypeSystem::new(), FunctionRegistry::new())
    }

    #[test]
    fn test_register_and_resolve() {
        let (types, registry) = setup();
        let void = types.lookup("void").unwrap();
        let int = types.lookup("int").unwrap();
        let sig = types.get_signature_type(void, &[int], None).unwrap();
        let f = registry
            .register_function(&types, "FUN_0031b958", 0x0031_B958, 0x0031_B988, sig)
            .unwrap();

        let by_addr = registry.find_function_by_address(0x0031_B958).unwrap();
        let by_id = registry.find_function_by_id(f.id).unwrap();
        assert!(Arc::ptr_eq(&f, &by_addr));
        assert!(Arc::ptr_eq(&f, &by_id));
        assert_eq!(f.call_config.arguments, vec![Some(ArgLocation::Register(A0))]);
        assert!(registry.find_function_by_address(0x0031_B95C).is_none());
        assert_eq!(f.instruction_count(), 12);
    }

    #[test]
    fn test_register_method() {
        let (types, registry) = setup();
        let void = types.lookup("void").unwrap();
        let int = types.lookup("int").unwrap();
        let owner = types.create_structure("ragUnk0").unwrap().finish().unwrap();
        let this = types.get_pointer_type(owner).unwrap();
        let sig = types.get_signature_type(void, &[int, int], Some(this)).unwrap();
        let m = registry
            .register_method(&types, owner, "ragUnk0::Init", 0x0028_2848, 0x0028_28FC, sig)
            .unwrap();
        assert_eq!(m.owner(), Some(owner));
        assert_eq!(m.call_config.receiver, Some(ArgLocation::Register(A0)));
        assert_eq!(
            m.call_config.arguments,
            vec![
                Some(ArgLocation::Register(A1)),
                Some(ArgLocation::Register(A2))
            ]
        );
    }

    #[test]
    fn test_method_without_receiver_rejected() {
        let (types, registry) = setup();
        let void = types.lookup("void").unwrap();
        let owner = types.create_structure("Widget").unwrap().finish().unwrap();
        let sig = types.get_signature_type(void, &[], None).unwrap();
        let result = registry.register_method(&types, owner, "Widget::draw", 0x100, 0x104, sig);
        assert!(matches!(result, Err(TypeError::InvalidSignature(_))));
    }

    #[test]
    fn test_non_signature_rejected() {
        let (types, registry) = setup();
        let int = types.lookup("int").unwrap();
        let result = registry.register_function(&types, "f", 0x100, 0x104, int);
        assert!(matches!(result, Err(TypeError::InvalidSignature(_))));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (types, registry) = setup();
        let void = types.lookup("void").unwrap();
        let sig = types.get_signature_type(void, &[], None).unwrap();
        registry.register_function(&types, "f", 0x100, 0x104, sig).unwrap();
        let result = registry.register_function(&types, "f", 0x200, 0x204, sig);
        assert!(matches!(result, Err(TypeError::DuplicateName(_))));
        assert_eq!(registry.functions().len(), 1);
    }
}
