//! Data type definitions.

use std::fmt;

use crate::CallConfig;

/// Session-unique type identifier. Never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Lookup key for [`crate::TypeSystem::get_type`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TypeRef<'a> {
    Id(TypeId),
    Name(&'a str),
}

impl From<TypeId> for TypeRef<'_> {
    fn from(id: TypeId) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a str> for TypeRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for TypeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// A structure member.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StructField {
    pub name: String,
    pub offset: u32,
    pub type_id: TypeId,
}

/// A method declared on a structure.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Method {
    pub name: String,
    pub signature: TypeId,
    /// Slot in the virtual dispatch table, for virtual methods.
    pub vtable_index: Option<u32>,
}

/// Inheritance link to a base structure.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BaseLink {
    pub base: TypeId,
    pub data_offset: u32,
    pub vtable_offset: u32,
}

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct StructureInfo {
    pub fields: Vec<StructField>,
    pub methods: Vec<Method>,
    pub vtable: Option<TypeId>,
    pub bases: Vec<BaseLink>,
}

impl StructureInfo {
    /// Member starting exactly at `offset`.
    pub fn field_at(&self, offset: u32) -> Option<&StructField> {
        self.fields.iter().find(|field| field.offset == offset)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureInfo {
    pub return_type: TypeId,
    pub receiver: Option<TypeId>,
    pub arguments: Vec<TypeId>,
    pub call_config: CallConfig,
    pub variadic: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumField {
    pub name: String,
    pub value: i64,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BitfieldField {
    pub name: String,
    pub bit_offset: u8,
    pub bit_width: u8,
}

/// Closed set of type shapes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TypeKind {
    Primitive { signed: bool, float: bool },
    Pointer { pointee: TypeId },
    Array { element: TypeId, length: u32 },
    Structure(StructureInfo),
    Signature(SignatureInfo),
    Enum { fields: Vec<EnumField> },
    Bitfield { fields: Vec<BitfieldField> },
}

/// A registered type.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DataType {
    pub id: TypeId,
    pub name: String,
    pub size: u32,
    pub kind: TypeKind,
}

impl DataType {
    pub const fn is_float(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive { float: true, .. })
    }

    /// Structures and arrays, which are never passed in registers.
    pub const fn is_aggregate(&self) -> bool {
        matches!(self.kind, TypeKind::Structure(_) | TypeKind::Array { .. })
    }

    pub const fn is_void(&self) -> bool {
        self.size == 0 && matches!(self.kind, TypeKind::Primitive { .. })
    }

    pub const fn pointee(&self) -> Option<TypeId> {
        match self.kind {
            TypeKind::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    pub const fn structure(&self) -> Option<&StructureInfo> {
        match &self.kind {
            TypeKind::Structure(info) => Some(info),
            _ => None,
        }
    }

    pub const fn signature(&self) -> Option<&SignatureInfo> {
        match &self.kind {
            TypeKind::Signature(info) => Some(info),
            _ => None,
        }
    }
}
