//! Per-entity models derived from catalog descriptors.

use crate::catalog::{ColumnDescriptor, FunctionDescriptor, TableDescriptor, ViewDescriptor};
use crate::mapping::{normalize_type_name, FieldType, ScalarKind, TypeDescriptor, TypeMapper};
use crate::model::shape::{Field, Shape};
use serde_json::Value;

/// Validation (API-facing) and persistence (row-facing) shapes of one table.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelPair {
    pub validation: Shape,
    pub persistence: Shape,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableModel {
    pub descriptor: TableDescriptor,
    pub models: ModelPair,
}

impl TableModel {
    pub fn build(descriptor: TableDescriptor, mapper: &TypeMapper) -> Self {
        let key = descriptor.key();
        let persistence = Shape::new(
            format!("{}.persistence", key),
            descriptor.columns.iter().map(|c| column_field(c, mapper)).collect(),
        );
        // Same names and types; nullability alone decides optional vs mandatory.
        let validation = Shape::new(
            format!("{}.validation", key),
            descriptor
                .columns
                .iter()
                .map(|c| Field {
                    required: !c.nullable,
                    ..column_field(c, mapper)
                })
                .collect(),
        );
        TableModel {
            descriptor,
            models: ModelPair {
                validation,
                persistence,
            },
        }
    }

    pub fn has_primary_key(&self) -> bool {
        !self.descriptor.primary_key.is_empty()
    }

    /// Persistence fields of the primary key, in key order.
    pub fn key_fields(&self) -> Vec<&Field> {
        self.descriptor
            .primary_key
            .iter()
            .filter_map(|k| self.models.persistence.field(k))
            .collect()
    }
}

fn column_field(c: &ColumnDescriptor, mapper: &TypeMapper) -> Field {
    Field {
        name: c.name.clone(),
        ty: mapper.map(&c.sql_type, c.nullable, None),
        required: !c.nullable,
        sql_type: c.sql_type.clone(),
        has_default: c.has_default,
        key: c.is_primary_key,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewModel {
    pub descriptor: ViewDescriptor,
    /// Filter parameters: every column optional.
    pub query: Shape,
    /// Row serialization, with JSON columns shaped by the sample row.
    pub response: Shape,
}

impl ViewModel {
    /// `sample` is one row of the view as a JSON object, when one could be fetched.
    pub fn build(descriptor: ViewDescriptor, mapper: &TypeMapper, sample: Option<&Value>) -> Self {
        let key = descriptor.key();
        let mut query_fields = Vec::with_capacity(descriptor.columns.len());
        let mut response_fields = Vec::with_capacity(descriptor.columns.len());

        for c in &descriptor.columns {
            let is_json = matches!(normalize_type_name(&c.sql_type).as_str(), "json" | "jsonb");
            let observed = if is_json {
                sample.and_then(|row| row.get(&c.name))
            } else {
                None
            };
            let mapped = mapper.map(&c.sql_type, c.nullable, observed);

            let filter_ty = if mapped.ty.is_structured() || mapped.ty.is_array() {
                TypeDescriptor::Scalar(ScalarKind::Text)
            } else {
                mapped.ty.clone()
            };
            query_fields.push(Field {
                name: c.name.clone(),
                ty: FieldType::new(filter_ty, true),
                required: false,
                sql_type: c.sql_type.clone(),
                has_default: false,
                key: false,
            });

            // Lists always serialize, empty when absent.
            let response_ty = if mapped.ty.is_array() {
                FieldType::required(mapped.ty)
            } else {
                mapped
            };
            response_fields.push(Field {
                name: c.name.clone(),
                ty: response_ty,
                required: false,
                sql_type: c.sql_type.clone(),
                has_default: false,
                key: false,
            });
        }

        ViewModel {
            query: Shape::new(format!("{}.query", key), query_fields),
            response: Shape::new(format!("{}.response", key), response_fields),
            descriptor,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionModel {
    pub descriptor: FunctionDescriptor,
    /// One field per input parameter; unnamed parameters are `arg1`, `arg2`, ...
    pub params: Shape,
}

impl FunctionModel {
    pub fn build(descriptor: FunctionDescriptor, mapper: &TypeMapper) -> Self {
        let fields = descriptor
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| Field {
                name: if p.name.is_empty() {
                    format!("arg{}", i + 1)
                } else {
                    p.name.clone()
                },
                ty: mapper.map(&p.sql_type, true, None),
                required: !p.has_default,
                sql_type: p.sql_type.clone(),
                has_default: p.has_default,
                key: false,
            })
            .collect();
        FunctionModel {
            params: Shape::new(format!("{}.params", descriptor.key()), fields),
            descriptor,
        }
    }
}
