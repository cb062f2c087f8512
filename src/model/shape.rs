//! Described records: one generic shape type parameterized by field descriptors.

use crate::error::AppError;
use crate::mapping::FieldType;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub ty: FieldType,
    /// Must be supplied (non-null) on create.
    pub required: bool,
    /// Declared SQL type; used to cast bound parameters.
    pub sql_type: String,
    /// Server fills the value when omitted (default, identity, generated).
    pub has_default: bool,
    /// Part of the primary key.
    pub key: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationMode {
    /// Every required field without a server default must be present and non-null.
    Create,
    /// Only the fields present are checked.
    Partial,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Shape {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Shape {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Shape {
            name: name.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Check a request object against this shape. Unknown keys are rejected.
    pub fn validate(&self, body: &Map<String, Value>, mode: ValidationMode) -> Result<(), AppError> {
        for key in body.keys() {
            if self.field(key).is_none() {
                return Err(AppError::Validation(format!("unknown field '{}' for {}", key, self.name)));
            }
        }
        for field in &self.fields {
            match body.get(&field.name) {
                None => {
                    if mode == ValidationMode::Create && field.required && !field.has_default {
                        return Err(AppError::Validation(format!("{} is required", field.name)));
                    }
                }
                Some(Value::Null) if field.required => {
                    return Err(AppError::Validation(format!("{} must not be null", field.name)));
                }
                Some(v) => {
                    if !field.ty.accepts(v) {
                        return Err(AppError::Validation(format!(
                            "{} must be {}",
                            field.name,
                            field.ty.ty.label()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Serialize a row through the shape: shape field order, missing optionals as null, missing lists as `[]`.
    pub fn project(&self, row: Value) -> Value {
        let Value::Object(mut obj) = row else {
            return row;
        };
        let mut out = Map::new();
        for field in &self.fields {
            let v = match obj.remove(&field.name) {
                Some(Value::Null) | None if field.ty.ty.is_array() => Value::Array(Vec::new()),
                Some(v) => v,
                None => Value::Null,
            };
            out.insert(field.name.clone(), v);
        }
        Value::Object(out)
    }
}
