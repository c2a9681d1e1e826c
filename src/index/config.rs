//! Index configuration: the field-naming contract and typed-field registry.
//!
//! Field names are fixed once at index-build time. The XPath compiler and
//! the query parser extension both read the same [`FieldConfig`], so the two
//! sides cannot disagree about where element text or attribute names live.
//! A renamed field is a configuration change, never a soft fallback.

use serde::{Deserialize, Serialize};

/// Names of the structural index fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Whole-document text.
    pub text_field: String,
    /// Element text, terms prefixed with the element QName.
    pub elt_text_field: String,
    /// Attribute text, terms prefixed with `@name`.
    pub att_text_field: String,
    /// Element name presence.
    pub elt_name_field: String,
    /// Attribute name presence.
    pub att_name_field: String,
    /// Root-to-element name paths.
    pub path_field: String,
    /// Stored document identifier.
    pub uri_field: String,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            text_field: "lux_text".to_string(),
            elt_text_field: "lux_elt_text".to_string(),
            att_text_field: "lux_att_text".to_string(),
            elt_name_field: "lux_elt_name".to_string(),
            att_name_field: "lux_att_name".to_string(),
            path_field: "lux_path".to_string(),
            uri_field: "lux_uri".to_string(),
        }
    }
}

/// Storage type of a registered sortable/rangeable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Number,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Number => "number",
        }
    }

    /// Parse a type tag as written in range syntax or configuration.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "int" => Some(Self::Int),
            "number" => Some(Self::Number),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field whose values are stored with a declared type, making it usable
/// for range queries and native sorting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    pub field_type: FieldType,
}

/// How parsed documents are stored alongside the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStorage {
    /// Raw serialized XML text, re-parsed on retrieval.
    RawXml,
    /// Binary tree buffers decoded by the codec.
    BinaryTree,
}

/// Complete index-side configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub fields: FieldConfig,
    pub storage: DocumentStorage,
    /// When off, unbound QName prefixes in queries are kept as written
    /// instead of failing the parse.
    pub namespace_aware: bool,
    pub typed_fields: Vec<TypedField>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fields: FieldConfig::default(),
            storage: DocumentStorage::BinaryTree,
            namespace_aware: true,
            typed_fields: Vec::new(),
        }
    }
}

impl IndexConfig {
    /// The declared storage type of `field`, if registered.
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.typed_fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.field_type)
    }

    /// Register a typed field (builder-style, used in tests and setup code).
    pub fn with_typed_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.typed_fields.push(TypedField {
            name: name.into(),
            field_type,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_field_names() {
        let config = FieldConfig::default();
        assert_eq!(config.elt_text_field, "lux_elt_text");
        assert_eq!(config.text_field, "lux_text");
    }

    #[test]
    fn test_field_type_parse() {
        assert_eq!(FieldType::parse("int"), Some(FieldType::Int));
        assert_eq!(FieldType::parse("decimal"), None);
    }

    #[test]
    fn test_typed_field_lookup() {
        let config = IndexConfig::default().with_typed_field("year", FieldType::Int);
        assert_eq!(config.field_type("year"), Some(FieldType::Int));
        assert_eq!(config.field_type("title"), None);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = IndexConfig::default().with_typed_field("year", FieldType::Int);
        let json = serde_json::to_string(&config).unwrap();
        let back: IndexConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
