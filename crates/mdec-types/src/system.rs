//! The type registry.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::callconv::{ArgClass, CallConfig, CallingConvention, place_arguments};
use crate::error::{Result, TypeError};
use crate::{
    BitfieldField, DataType, EnumField, SignatureInfo, StructureBuilder, StructureInfo, TypeId,
    TypeKind, TypeRef,
};

/// Name, size, signedness and float flag of every builtin.
const PRIMITIVES: &[(&str, u32, bool, bool)] = &[
    ("void", 0, false, false),
    ("bool", 1, false, false),
    ("char", 1, true, false),
    ("i8", 1, true, false),
    ("u8", 1, false, false),
    ("i16", 2, true, false),
    ("u16", 2, false, false),
    ("int", 4, true, false),
    ("i32", 4, true, false),
    ("u32", 4, false, false),
    ("i64", 8, true, false),
    ("u64", 8, false, false),
    ("i128", 16, true, false),
    ("u128", 16, false, false),
    ("float", 4, true, true),
    ("double", 8, true, true),
    ("undefined", 4, false, false),
];

const POINTER_SIZE: u32 = 4;

#[derive(Clone, PartialEq, Eq, Hash)]
struct SignatureKey {
    return_type: TypeId,
    receiver: Option<TypeId>,
    arguments: Vec<TypeId>,
    variadic: bool,
}

#[derive(Default)]
struct TypeStore {
    types: Vec<Arc<DataType>>,
    names: FxHashMap<String, TypeId>,
    pointers: FxHashMap<TypeId, TypeId>,
    arrays: FxHashMap<(TypeId, u32), TypeId>,
    signatures: FxHashMap<SignatureKey, TypeId>,
}

impl TypeStore {
    fn get(&self, id: TypeId) -> Result<&Arc<DataType>> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.types.get(index))
            .ok_or_else(|| TypeError::UnknownType(id.to_string()))
    }

    fn register(&mut self, name: String, size: u32, kind: TypeKind) -> Result<TypeId> {
        if self.names.contains_key(&name) {
            return Err(TypeError::DuplicateName(name));
        }
        let id = TypeId(u32::try_from(self.types.len()).map_err(|_| {
            TypeError::InvalidSignature("type id space exhausted".to_string())
        })?);
        self.names.insert(name.clone(), id);
        self.types.push(Arc::new(DataType {
            id,
            name,
            size,
            kind,
        }));
        Ok(id)
    }

    fn classify(&self, id: TypeId) -> Result<ArgClass> {
        let ty = self.get(id)?;
        Ok(if ty.is_void() {
            ArgClass::Void
        } else if ty.is_float() {
            ArgClass::Float
        } else if ty.is_aggregate() {
            ArgClass::Aggregate
        } else {
            ArgClass::Integer
        })
    }

    fn call_config(
        &self,
        convention: CallingConvention,
        return_type: TypeId,
        argument_types: &[TypeId],
        receiver: Option<TypeId>,
    ) -> Result<CallConfig> {
        if let Some(receiver) = receiver {
            self.get(receiver)?;
        }
        let return_class = self.classify(return_type)?;
        let classes = argument_types
            .iter()
            .map(|&id| self.classify(id))
            .collect::<Result<Vec<_>>>()?;
        Ok(place_arguments(
            convention,
            return_class,
            receiver.is_some(),
            &classes,
        ))
    }

    fn pointer(&mut self, pointee: TypeId) -> Result<TypeId> {
        if let Some(&id) = self.pointers.get(&pointee) {
            return Ok(id);
        }
        let name = format!("{}*", self.get(pointee)?.name);
        let id = self.register(name, POINTER_SIZE, TypeKind::Pointer { pointee })?;
        self.pointers.insert(pointee, id);
        Ok(id)
    }

    fn array(&mut self, element: TypeId, length: u32) -> Result<TypeId> {
        if let Some(&id) = self.arrays.get(&(element, length)) {
            return Ok(id);
        }
        let element_type = self.get(element)?;
        let name = format!("{}[{length}]", element_type.name);
        let size = element_type.size.saturating_mul(length);
        let id = self.register(name, size, TypeKind::Array { element, length })?;
        self.arrays.insert((element, length), id);
        Ok(id)
    }

    fn signature(&mut self, key: SignatureKey) -> Result<TypeId> {
        if let Some(&id) = self.signatures.get(&key) {
            return Ok(id);
        }
        let call_config = self.call_config(
            CallingConvention::Eabi,
            key.return_type,
            &key.arguments,
            key.receiver,
        )?;
        let mut args: Vec<String> = key
            .arguments
            .iter()
            .map(|&id| self.get(id).map(|ty| ty.name.clone()))
            .collect::<Result<_>>()?;
        if key.variadic {
            args.push("...".to_string());
        }
        let return_name = &self.get(key.return_type)?.name;
        let name = match key.receiver {
            Some(receiver) => format!(
                "{return_name} ({}::*)({})",
                self.get(receiver)?.name,
                args.join(", ")
            ),
            None => format!("{return_name} (*)({})", args.join(", ")),
        };
        let info = SignatureInfo {
            return_type: key.return_type,
            receiver: key.receiver,
            arguments: key.arguments.clone(),
            call_config,
            variadic: key.variadic,
        };
        let id = self.register(name, POINTER_SIZE, TypeKind::Signature(info))?;
        self.signatures.insert(key, id);
        Ok(id)
    }
}

/// Registry of every data type known to a session.
///
/// Read-mostly: lookups take a shared lock, registration takes the write lock.
/// Returned types are immutable snapshots.
pub struct TypeSystem {
    store: RwLock<TypeStore>,
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeSystem {
    /// Create a type system with the builtin primitives registered.
    pub fn new() -> Self {
        let mut store = TypeStore::default();
        for &(name, size, signed, float) in PRIMITIVES {
            // Builtin names are distinct.
            let _ = store.register(name.to_string(), size, TypeKind::Primitive { signed, float });
        }
        Self {
            store: RwLock::new(store),
        }
    }

    /// Look up a type by id or by exact name.
    pub fn get_type<'a>(&self, key: impl Into<TypeRef<'a>>) -> Result<Arc<DataType>> {
        let store = self.store.read();
        match key.into() {
            TypeRef::Id(id) => store.get(id).cloned(),
            TypeRef::Name(name) => store
                .names
                .get(name)
                .and_then(|&id| store.get(id).ok())
                .cloned()
                .ok_or_else(|| TypeError::UnknownType(name.to_string())),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.store.read().names.get(name).copied()
    }

    pub fn type_name(&self, id: TypeId) -> Result<String> {
        Ok(self.store.read().get(id)?.name.clone())
    }

    pub fn len(&self) -> usize {
        self.store.read().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a type name, building pointer (`T*`) and array (`T[n]`)
    /// types on demand.
    pub fn resolve(&self, name: &str) -> Result<TypeId> {
        let name = name.trim();
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        if let Some(pointee) = name.strip_suffix('*') {
            let pointee = self.resolve(pointee)?;
            return self.get_pointer_type(pointee);
        }
        if let Some(prefix) = name.strip_suffix(']') {
            if let Some((element, length)) = prefix.rsplit_once('[') {
                let length = length
                    .trim()
                    .parse()
                    .map_err(|_| TypeError::UnknownType(name.to_string()))?;
                let element = self.resolve(element)?;
                return self.get_array_type(element, length);
            }
        }
        Err(TypeError::UnknownType(name.to_string()))
    }

    /// Start a structure declaration. The id is reserved immediately so
    /// members may refer to the structure itself.
    pub fn create_structure(&self, name: &str) -> Result<StructureBuilder<'_>> {
        let id = self.store.write().register(
            name.to_string(),
            0,
            TypeKind::Structure(StructureInfo::default()),
        )?;
        debug!(name, id = id.0, "created structure");
        Ok(StructureBuilder::new(self, id, name))
    }

    /// Replace a reserved structure with its finished definition.
    pub(crate) fn define_structure(
        &self,
        id: TypeId,
        size: u32,
        info: StructureInfo,
    ) -> Result<TypeId> {
        let mut store = self.store.write();
        let existing = store.get(id)?;
        if existing.structure().is_none() {
            return Err(TypeError::NotAStructure(existing.name.clone()));
        }
        let name = existing.name.clone();
        let index = usize::try_from(id.0).map_err(|_| TypeError::UnknownType(id.to_string()))?;
        store.types[index] = Arc::new(DataType {
            id,
            name,
            size,
            kind: TypeKind::Structure(info),
        });
        Ok(id)
    }

    pub(crate) fn type_size(&self, id: TypeId) -> Result<u32> {
        Ok(self.store.read().get(id)?.size)
    }

    pub fn get_pointer_type(&self, pointee: TypeId) -> Result<TypeId> {
        if let Some(&id) = self.store.read().pointers.get(&pointee) {
            return Ok(id);
        }
        self.store.write().pointer(pointee)
    }

    pub fn get_array_type(&self, element: TypeId, length: u32) -> Result<TypeId> {
        self.store.write().array(element, length)
    }

    /// Memoized signature type; structurally identical signatures share an id.
    pub fn get_signature_type(
        &self,
        return_type: TypeId,
        argument_types: &[TypeId],
        receiver: Option<TypeId>,
    ) -> Result<TypeId> {
        self.signature_type(return_type, argument_types, receiver, false)
    }

    pub fn get_variadic_signature_type(
        &self,
        return_type: TypeId,
        argument_types: &[TypeId],
        receiver: Option<TypeId>,
    ) -> Result<TypeId> {
        self.signature_type(return_type, argument_types, receiver, true)
    }

    fn signature_type(
        &self,
        return_type: TypeId,
        argument_types: &[TypeId],
        receiver: Option<TypeId>,
        variadic: bool,
    ) -> Result<TypeId> {
        let key = SignatureKey {
            return_type,
            receiver,
            arguments: argument_types.to_vec(),
            variadic,
        };
        if let Some(&id) = self.store.read().signatures.get(&key) {
            return Ok(id);
        }
        self.store.write().signature(key)
    }

    /// Placement of receiver, arguments and return value.
    pub fn get_call_config(
        &self,
        convention: CallingConvention,
        return_type: TypeId,
        argument_types: &[TypeId],
        receiver: Option<TypeId>,
    ) -> Result<CallConfig> {
        self.store
            .read()
            .call_config(convention, return_type, argument_types, receiver)
    }

    pub fn create_enum(&self, name: &str, size: u32, fields: Vec<EnumField>) -> Result<TypeId> {
        self.store
            .write()
            .register(name.to_string(), size, TypeKind::Enum { fields })
    }

    pub fn create_bitfield(
        &self,
        name: &str,
        size: u32,
        fields: Vec<BitfieldField>,
    ) -> Result<TypeId> {
        self.store
            .write()
            .register(name.to_string(), size, TypeKind::Bitfield { fields })
    }

    /// Structure behind a pointer-to-structure type.
    pub fn pointee_structure(&self, pointer: TypeId) -> Option<Arc<DataType>> {
        let store = self.store.read();
        let pointee = store.get(pointer).ok()?.pointee()?;
        let target = store.get(pointee).ok()?;
        target.structure().is_some().then(|| Arc::clone(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_registered() {
        let types = TypeSystem::new();
        for &(name, size, ..) in PRIMITIVES {
            let ty = types.get_type(name).unwrap();
            assert_eq!(ty.name, name);
            assert_eq!(ty.size, size);
        }
        assert!(types.get_type("float").unwrap().is_float());
        assert!(types.get_type("void").unwrap().is_void());
    }

    #[test]
    fn test_unknown_type_fails() {
        let types = TypeSystem::new();
        assert_eq!(
            types.get_type("ragUnk0").unwrap_err(),
            TypeError::UnknownType("ragUnk0".to_string())
        );
        assert!(types.get_type(TypeId(9999)).is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        let types = TypeSystem::new();
        let int = types.lookup("int").unwrap();
        let p = types.get_pointer_type(int).unwrap();
        let a = types.get_array_type(int, 4).unwrap();
        assert_ne!(p, a);
        assert_eq!(types.get_pointer_type(int).unwrap(), p);
        assert_eq!(types.type_name(p).unwrap(), "int*");
        assert_eq!(types.type_name(a).unwrap(), "int[4]");
        assert_eq!(types.get_type(a).unwrap().size, 16);
    }

    #[test]
    fn test_signature_memoized() {
        let types = TypeSystem::new();
        let int = types.lookup("int").unwrap();
        let void = types.lookup("void").unwrap();
        let a = types.get_signature_type(void, &[int, int], None).unwrap();
        let b = types.get_signature_type(void, &[int, int], None).unwrap();
        let c = types.get_variadic_signature_type(void, &[int, int], None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let sig = types.get_type(a).unwrap();
        assert_eq!(sig.name, "void (*)(int, int)");
        assert_eq!(sig.signature().unwrap().arguments, vec![int, int]);
    }

    #[test]
    fn test_resolve_derived_names() {
        let types = TypeSystem::new();
        let id = types.resolve("u16*").unwrap();
        let ty = types.get_type(id).unwrap();
        assert_eq!(ty.pointee(), types.lookup("u16"));
        let id = types.resolve("int[8]").unwrap();
        assert_eq!(types.get_type(id).unwrap().size, 32);
        assert!(types.resolve("nope*").is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let types = TypeSystem::new();
        assert!(matches!(
            types.create_structure("int"),
            Err(TypeError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_enum_and_bitfield() {
        let types = TypeSystem::new();
        let e = types
            .create_enum(
                "State",
                4,
                vec![EnumField {
                    name: "Idle".to_string(),
                    value: 0,
                }],
            )
            .unwrap();
        let b = types
            .create_bitfield(
                "Flags",
                1,
                vec![BitfieldField {
                    name: "visible".to_string(),
                    bit_offset: 0,
                    bit_width: 1,
                }],
            )
            .unwrap();
        assert!(matches!(types.get_type(e).unwrap().kind, TypeKind::Enum { .. }));
        assert!(matches!(
            types.get_type(b).unwrap().kind,
            TypeKind::Bitfield { .. }
        ));
    }
}
