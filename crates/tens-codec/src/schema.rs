//! Schema registry: deduplicates flattened row shapes within a batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tens_canonical::{CanonicalValue, Number};

/// Inferred type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Only `null` was observed.
    Null,
    /// Booleans.
    Boolean,
    /// Integers.
    Integer,
    /// Numbers, at least one of them fractional.
    Number,
    /// Strings, or a mix of incompatible types.
    String,
    /// Arrays.
    Array,
    /// Objects kept as leaves (empty objects).
    Object,
}

impl FieldType {
    /// All field types in tag order.
    pub const ALL: [FieldType; 7] = [
        FieldType::Null,
        FieldType::Boolean,
        FieldType::Integer,
        FieldType::Number,
        FieldType::String,
        FieldType::Array,
        FieldType::Object,
    ];

    /// Type of a single value.
    pub fn of(value: &CanonicalValue) -> Self {
        match value {
            CanonicalValue::Null => FieldType::Null,
            CanonicalValue::Bool(_) => FieldType::Boolean,
            CanonicalValue::Number(Number::Int(_)) => FieldType::Integer,
            CanonicalValue::Number(Number::Float(_)) => FieldType::Number,
            CanonicalValue::String(_) => FieldType::String,
            CanonicalValue::Array(_) => FieldType::Array,
            CanonicalValue::Object(_) => FieldType::Object,
        }
    }

    /// Narrowest type covering both `self` and `other`.
    pub fn widen(self, other: FieldType) -> Self {
        use FieldType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, t) | (t, Null) => t,
            (Integer, Number) | (Number, Integer) => Number,
            _ => String,
        }
    }

    /// Short label.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Null => "null",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::String => "string",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

/// One distinct flattened row shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema id, starting at 1 in registration order.
    pub id: u32,
    /// Sorted flattened field paths.
    pub fields: Vec<String>,
    /// Inferred type per field, parallel to `fields`.
    pub field_types: Vec<FieldType>,
}

impl Schema {
    /// Comma-joined sorted field list identifying this shape.
    pub fn signature(&self) -> String {
        self.fields.join(",")
    }

    /// Number of fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Type of field `index`, `Null` if out of range.
    pub fn field_type(&self, index: usize) -> FieldType {
        self.field_types
            .get(index)
            .copied()
            .unwrap_or(FieldType::Null)
    }
}

/// Registry of schemas seen in one batch.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    lookup: HashMap<Vec<String>, u32>,
    schemas: Vec<Schema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema for `flat_fields`, registering it on first sight.
    ///
    /// Field order in the argument does not matter.
    pub fn register(&mut self, flat_fields: &[String]) -> &Schema {
        let mut fields = flat_fields.to_vec();
        fields.sort();
        fields.dedup();

        let index = match self.lookup.get(&fields) {
            Some(&id) => id as usize - 1,
            None => {
                let id = self.schemas.len() as u32 + 1;
                self.lookup.insert(fields.clone(), id);
                self.schemas.push(Schema {
                    id,
                    field_types: vec![FieldType::Null; fields.len()],
                    fields,
                });
                self.schemas.len() - 1
            }
        };
        &self.schemas[index]
    }

    /// Widens the type of `field` in schema `id` with an observed value.
    pub fn observe(&mut self, id: u32, field: &str, value: &CanonicalValue) {
        let Some(schema) = id
            .checked_sub(1)
            .and_then(|index| self.schemas.get_mut(index as usize))
        else {
            return;
        };
        if let Ok(pos) = schema.fields.binary_search_by(|f| f.as_str().cmp(field)) {
            schema.field_types[pos] = schema.field_types[pos].widen(FieldType::of(value));
        }
    }

    /// Looks up a schema by id.
    pub fn get(&self, id: u32) -> Option<&Schema> {
        id.checked_sub(1)
            .and_then(|index| self.schemas.get(index as usize))
    }

    /// Schemas in id order.
    pub fn schemas(&self) -> &[Schema] {
        &self.schemas
    }

    /// Number of distinct schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schema was registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Consumes the registry, returning schemas in id order.
    pub fn into_schemas(self) -> Vec<Schema> {
        self.schemas
    }
}
