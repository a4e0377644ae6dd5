use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RefHuntError;

/// Name of the universal base type. Never walked when collecting accessors.
pub const ROOT_TYPE: &str = "Object";

/// Whether a member is stored state (field) or computed through a getter (property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    #[default]
    Field,
    Property,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Declared type of a member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    /// bool, integers, floats, chars.
    Primitive,
    Enum,
    String,
    /// Any other named type: a host type or an opaque value type.
    Named(String),
    /// A collection whose elements have the inner type.
    Sequence(Box<ValueType>),
    /// Statically unknown (may hold anything).
    Dynamic,
}

const PRIMITIVE_NAMES: &[&str] = &[
    "bool", "byte", "sbyte", "char", "short", "ushort", "int", "uint", "long", "ulong", "float",
    "double", "decimal",
];

impl ValueType {
    /// Parse a declared type: `int`, `string`, `enum`, `enum:Axis`, `dynamic`,
    /// `list<Texture>`, `Texture[]` or a bare type name.
    pub fn parse(text: &str) -> Result<Self, RefHuntError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RefHuntError::Schema("empty member type".into()));
        }
        if let Some(inner) = text.strip_suffix("[]") {
            return Ok(ValueType::Sequence(Box::new(Self::parse(inner)?)));
        }
        if let Some(rest) = text.strip_prefix("list<") {
            let inner = rest
                .strip_suffix('>')
                .ok_or_else(|| RefHuntError::Schema(format!("unterminated list type '{text}'")))?;
            return Ok(ValueType::Sequence(Box::new(Self::parse(inner)?)));
        }
        if PRIMITIVE_NAMES.contains(&text) {
            return Ok(ValueType::Primitive);
        }
        match text {
            "string" => Ok(ValueType::String),
            "enum" => Ok(ValueType::Enum),
            "dynamic" | "object" => Ok(ValueType::Dynamic),
            _ if text.starts_with("enum:") => Ok(ValueType::Enum),
            _ => Ok(ValueType::Named(text.to_owned())),
        }
    }

    /// Primitive, enum and string values can never hold a reference.
    pub fn is_scalar(&self) -> bool {
        matches!(self, ValueType::Primitive | ValueType::Enum | ValueType::String)
    }

    /// The element type of a sequence, or the type itself.
    pub fn element(&self) -> &ValueType {
        match self {
            ValueType::Sequence(inner) => inner,
            other => other,
        }
    }

    pub fn named(&self) -> Option<&str> {
        match self {
            ValueType::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl TryFrom<String> for ValueType {
    type Error = RefHuntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ValueType::parse(&value)
    }
}

impl From<ValueType> for String {
    fn from(value: ValueType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Primitive => f.write_str("int"),
            ValueType::Enum => f.write_str("enum"),
            ValueType::String => f.write_str("string"),
            ValueType::Named(name) => f.write_str(name),
            ValueType::Sequence(inner) => write!(f, "list<{inner}>"),
            ValueType::Dynamic => f.write_str("dynamic"),
        }
    }
}

fn default_true() -> bool {
    true
}

/// One declared member of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDecl {
    pub name: String,
    #[serde(default)]
    pub kind: MemberKind,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub deprecated: bool,
    /// Explicitly excluded from serialization.
    #[serde(default)]
    pub non_serialized: bool,
    /// Properties only: whether a getter exists.
    #[serde(default = "default_true")]
    pub readable: bool,
    /// Properties only: indexer-style member that takes parameters.
    #[serde(default)]
    pub indexed: bool,
    /// Redeclares a member of a base type.
    #[serde(default)]
    pub overrides_base: bool,
}

impl MemberDecl {
    pub fn field(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            kind: MemberKind::Field,
            visibility: Visibility::Public,
            value_type,
            deprecated: false,
            non_serialized: false,
            readable: true,
            indexed: false,
            overrides_base: false,
        }
    }

    pub fn property(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            kind: MemberKind::Property,
            ..Self::field(name, value_type)
        }
    }

    pub fn private(mut self) -> Self {
        self.visibility = Visibility::Private;
        self
    }

    /// Stored fields persist unless explicitly excluded; properties never do.
    pub fn is_serializable(&self) -> bool {
        self.kind == MemberKind::Field && !self.non_serialized
    }
}

/// A host type: its name, optional base type and declared members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub members: Vec<MemberDecl>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, base: Option<&str>, members: Vec<MemberDecl>) -> Self {
        Self {
            name: name.into(),
            base: base.map(str::to_owned),
            members,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default)]
    types: HashMap<String, TypeDescriptor>,
}

/// All types known to the host, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `schema.toml` document (`[types.<Name>]` tables).
    pub fn from_toml(contents: &str) -> Result<Self, RefHuntError> {
        let file: SchemaFile =
            toml::from_str(contents).map_err(|e| RefHuntError::Schema(e.to_string()))?;
        let mut registry = Self::new();
        for (name, mut desc) in file.types {
            desc.name = name;
            registry.insert(desc);
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn insert(&mut self, desc: TypeDescriptor) {
        self.types.insert(desc.name.clone(), desc);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The inheritance chain of `name`, most-derived first, stopping before the
    /// universal base type. Unknown bases end the chain.
    pub fn chain(&self, name: &str) -> Vec<&TypeDescriptor> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(type_name) = current {
            if type_name == ROOT_TYPE || chain.iter().any(|d: &&TypeDescriptor| d.name == type_name)
            {
                break;
            }
            let Some(desc) = self.types.get(type_name) else {
                break;
            };
            chain.push(desc);
            current = desc.base.as_deref();
        }
        chain
    }

    /// True if `name` equals `ancestor` or derives from it.
    pub fn is_subtype(&self, name: &str, ancestor: &str) -> bool {
        name == ancestor || self.chain(name).iter().any(|d| d.name == ancestor)
    }

    /// Reject inheritance cycles.
    fn validate(&self) -> Result<(), RefHuntError> {
        for name in self.types.keys() {
            let mut seen = vec![name.as_str()];
            let mut current = self.types.get(name).and_then(|d| d.base.as_deref());
            while let Some(base) = current {
                if seen.contains(&base) {
                    return Err(RefHuntError::Schema(format!(
                        "inheritance cycle through type '{name}'"
                    )));
                }
                seen.push(base);
                current = self.types.get(base).and_then(|d| d.base.as_deref());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_types() {
        assert_eq!(ValueType::parse("int").unwrap(), ValueType::Primitive);
        assert_eq!(ValueType::parse("enum:Axis").unwrap(), ValueType::Enum);
        assert_eq!(
            ValueType::parse("list<Texture>").unwrap(),
            ValueType::Sequence(Box::new(ValueType::Named("Texture".into())))
        );
        assert_eq!(
            ValueType::parse("Mesh[]").unwrap(),
            ValueType::Sequence(Box::new(ValueType::Named("Mesh".into())))
        );
        assert!(ValueType::parse("list<Texture").is_err());
    }

    #[test]
    fn test_schema_from_toml_and_chain() {
        let schema = r#"
            [types.Asset]
            base = "Object"
            members = [{ name = "tags", type = "list<string>" }]

            [types.Material]
            base = "Asset"
            members = [
                { name = "mainTexture", type = "Texture" },
                { name = "shader", type = "Shader", kind = "property" },
            ]
        "#;
        let registry = TypeRegistry::from_toml(schema).unwrap();
        let chain: Vec<&str> = registry
            .chain("Material")
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(chain, vec!["Material", "Asset"]);
        assert!(registry.is_subtype("Material", "Asset"));
        assert!(!registry.is_subtype("Asset", "Material"));
        let material = registry.get("Material").unwrap();
        assert_eq!(material.members[1].kind, MemberKind::Property);
        assert!(material.members[1].readable, "readable defaults to true");
    }

    #[test]
    fn test_schema_rejects_inheritance_cycle() {
        let schema = r#"
            [types.A]
            base = "B"
            [types.B]
            base = "A"
        "#;
        assert!(matches!(
            TypeRegistry::from_toml(schema),
            Err(RefHuntError::Schema(_))
        ));
    }
}
