//! JSON symbol files: structure and function declarations.
//!
//! ```json
//! {
//!   "structures": [
//!     { "name": "node", "fields": [
//!       { "name": "next", "offset": 0, "type": "node*" },
//!       { "name": "count", "offset": "0x4", "type": "int" }
//!     ] }
//!   ],
//!   "functions": [
//!     { "name": "Sum", "owner": "node", "address": "0x282848", "end": "0x2828fc",
//!       "return_type": "int", "arguments": ["int"] }
//!   ]
//! }
//! ```
//!
//! Structures are reserved before any field is resolved, so members may
//! point at structures declared later in the file.

use std::path::Path;

use mdec_types::{FunctionRegistry, StructureBuilder, TypeSystem};
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// A number, or a string in decimal or `0x` hexadecimal.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Address {
    Number(u32),
    Text(String),
}

impl Address {
    fn resolve(&self, what: &str) -> Result<u32> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Text(text) => {
                parse_address(text).ok_or_else(|| Error::Symbols(format!("invalid {what} {text:?}")))
            }
        }
    }
}

/// Parse `0x`-prefixed hexadecimal or decimal text.
pub fn parse_address(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => text.parse().ok(),
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub offset: Address,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StructureDecl {
    pub name: String,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub address: Address,
    pub end: Address,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    /// Declares a method; the receiver is a pointer to this structure.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub variadic: bool,
}

fn default_return_type() -> String {
    "void".to_string()
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SymbolFile {
    #[serde(default)]
    pub structures: Vec<StructureDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
}

/// Counts of declared symbols.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SymbolSummary {
    pub structures: usize,
    pub functions: usize,
}

impl SymbolFile {
    /// Read and parse a symbol file.
    ///
    /// # Errors
    ///
    /// IO and JSON errors.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// # Errors
    ///
    /// Malformed JSON.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Declare every structure, then every function.
    ///
    /// # Errors
    ///
    /// Unknown type names, duplicate names, invalid addresses and methods
    /// of non-structure owners.
    pub fn declare(&self, types: &TypeSystem, registry: &FunctionRegistry) -> Result<SymbolSummary> {
        let builders = self
            .structures
            .iter()
            .map(|decl| types.create_structure(&decl.name))
            .collect::<std::result::Result<Vec<StructureBuilder<'_>>, _>>()?;
        for (decl, builder) in self.structures.iter().zip(builders) {
            let mut builder = builder;
            for field in &decl.fields {
                let offset = field.offset.resolve("field offset")?;
                builder = builder.add_property(&field.name, offset, types.resolve(&field.type_name)?);
            }
            if let Some(size) = decl.size {
                builder = builder.with_size(size);
            }
            builder.finish()?;
            debug!(name = %decl.name, fields = decl.fields.len(), "declared structure");
        }

        for decl in &self.functions {
            Self::declare_function(decl, types, registry)?;
        }
        Ok(SymbolSummary {
            structures: self.structures.len(),
            functions: self.functions.len(),
        })
    }

    fn declare_function(decl: &FunctionDecl, types: &TypeSystem, registry: &FunctionRegistry) -> Result<()> {
        let address = decl.address.resolve("address")?;
        let end = decl.end.resolve("end address")?;
        let return_type = types.resolve(&decl.return_type)?;
        let arguments = decl
            .arguments
            .iter()
            .map(|name| types.resolve(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let owner = decl.owner.as_deref().map(|name| types.resolve(name)).transpose()?;
        let receiver = owner.map(|owner| types.get_pointer_type(owner)).transpose()?;
        let signature = if decl.variadic {
            types.get_variadic_signature_type(return_type, &arguments, receiver)?
        } else {
            types.get_signature_type(return_type, &arguments, receiver)?
        };
        match (owner, &decl.owner) {
            (Some(owner), Some(owner_name)) => {
                let name = format!("{owner_name}::{}", decl.name);
                registry.register_method(types, owner, &name, address, end, signature)?;
            }
            _ => {
                registry.register_function(types, &decl.name, address, end, signature)?;
            }
        }
        Ok(())
    }
}
