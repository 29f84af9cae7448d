//! Collection schema model served by the metadata cache.

use serde::{Deserialize, Serialize};

/// Field value types understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Boolean scalar.
    Bool,
    /// 32-bit signed integer scalar.
    Int32,
    /// 64-bit signed integer scalar.
    Int64,
    /// 32-bit float scalar.
    Float,
    /// 64-bit float scalar.
    Double,
    /// Variable-length string scalar.
    VarChar,
    /// Dense float vector.
    FloatVector,
    /// Packed binary vector.
    BinaryVector,
}

impl DataType {
    /// Returns whether this type is a vector type.
    pub fn is_vector(self) -> bool {
        matches!(self, DataType::FloatVector | DataType::BinaryVector)
    }
}

/// One field of a collection schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Stable field id assigned by the metadata service.
    pub field_id: i64,
    /// Field name as addressed by requests.
    pub name: String,
    /// Field value type.
    pub data_type: DataType,
    /// Whether this field is the collection's primary key.
    #[serde(default)]
    pub is_primary_key: bool,
    /// Vector dimensionality; `None` for scalar fields.
    #[serde(default)]
    pub dim: Option<usize>,
}

/// Collection schema snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Declared fields in schema order.
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns whether any declared field is a vector field.
    pub fn has_vector_field(&self) -> bool {
        self.fields.iter().any(|f| f.data_type.is_vector())
    }

    /// Scalar fields in schema order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| !f.data_type.is_vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> CollectionSchema {
        CollectionSchema {
            name: "docs".to_string(),
            description: String::new(),
            fields: vec![
                FieldSchema {
                    field_id: 100,
                    name: "id".to_string(),
                    data_type: DataType::Int64,
                    is_primary_key: true,
                    dim: None,
                },
                FieldSchema {
                    field_id: 101,
                    name: "embedding".to_string(),
                    data_type: DataType::FloatVector,
                    is_primary_key: false,
                    dim: Some(8),
                },
            ],
        }
    }

    #[test]
    fn classifies_vector_fields() {
        let s = schema();
        assert!(s.has_vector_field());
        assert!(s.field("embedding").unwrap().data_type.is_vector());
        assert!(!s.field("id").unwrap().data_type.is_vector());
        assert_eq!(s.scalar_fields().count(), 1);
    }

    #[test]
    fn unknown_field_lookup_is_none() {
        assert!(schema().field("missing").is_none());
    }
}
