//! Incremental structure declaration.

use crate::error::{Result, TypeError};
use crate::{BaseLink, Method, StructField, StructureInfo, TypeId, TypeSystem};

/// Collects the members of a structure whose id is already reserved.
pub struct StructureBuilder<'a> {
    types: &'a TypeSystem,
    id: TypeId,
    name: String,
    info: StructureInfo,
    size: Option<u32>,
}

impl<'a> StructureBuilder<'a> {
    pub(crate) fn new(types: &'a TypeSystem, id: TypeId, name: &str) -> Self {
        Self {
            types,
            id,
            name: name.to_string(),
            info: StructureInfo::default(),
            size: None,
        }
    }

    /// The reserved id, usable for self-referential members.
    pub const fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn add_property(mut self, name: &str, offset: u32, type_id: TypeId) -> Self {
        self.info.fields.push(StructField {
            name: name.to_string(),
            offset,
            type_id,
        });
        self
    }

    #[must_use]
    pub fn add_method(mut self, name: &str, signature: TypeId, vtable_index: Option<u32>) -> Self {
        self.info.methods.push(Method {
            name: name.to_string(),
            signature,
            vtable_index,
        });
        self
    }

    #[must_use]
    pub const fn with_vtable(mut self, vtable: TypeId) -> Self {
        self.info.vtable = Some(vtable);
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: TypeId, data_offset: u32, vtable_offset: u32) -> Self {
        self.info.bases.push(BaseLink {
            base,
            data_offset,
            vtable_offset,
        });
        self
    }

    /// Explicit size. Defaults to the end of the last member.
    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Validate member types and publish the definition.
    pub fn finish(mut self) -> Result<TypeId> {
        let mut end = 0u32;
        for field in &self.info.fields {
            let size = self.types.type_size(field.type_id)?;
            end = end.max(field.offset.saturating_add(size));
        }
        for method in &self.info.methods {
            let sig = self.types.get_type(method.signature)?;
            if sig.signature().is_none() {
                return Err(TypeError::InvalidSignature(format!(
                    "{}::{} has type {}",
                    self.name, method.name, sig.name
                )));
            }
        }
        for base in &self.info.bases {
            let base_type = self.types.get_type(base.base)?;
            if base_type.structure().is_none() {
                return Err(TypeError::NotAStructure(base_type.name.clone()));
            }
        }
        self.info.fields.sort_by_key(|field| field.offset);
        let size = self.size.unwrap_or(end);
        self.types.define_structure(self.id, size, self.info)
    }
}
