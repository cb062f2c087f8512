//! Catalog descriptors: immutable values describing one live catalog entity.

use serde::Serialize;
use std::collections::HashSet;

/// Which schemas and tables enter the catalog.
#[derive(Clone, Debug, Default)]
pub struct CatalogFilter {
    pub include_schemas: Vec<String>,
    /// Bare table names or `schema.table`.
    pub exclude_tables: Vec<String>,
}

impl CatalogFilter {
    pub fn excludes_table(&self, schema: &str, table: &str) -> bool {
        self.exclude_tables.iter().any(|t| match t.split_once('.') {
            Some((s, n)) => s == schema && n == table,
            None => t == table,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ForeignKeyRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Declared type as formatted by the catalog, e.g. `character varying(80)`, `integer[]`, `pharma.status`.
    pub sql_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub is_enum: bool,
    /// Column has a server-side default or is an identity/generated column.
    pub has_default: bool,
    pub references: Option<ForeignKeyRef>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, nullable: bool) -> Self {
        ColumnDescriptor {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable,
            is_primary_key: false,
            is_enum: false,
            has_default: false,
            references: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TableDescriptor {
    pub schema: String,
    pub name: String,
    /// Catalog ordinal order.
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key columns in key order.
    pub primary_key: Vec<String>,
}

impl TableDescriptor {
    pub fn key(&self) -> String {
        cache_key(&self.schema, &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewDescriptor {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl ViewDescriptor {
    pub fn key(&self) -> String {
        cache_key(&self.schema, &self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnumDescriptor {
    pub schema: String,
    pub name: String,
    /// Sort order from the catalog.
    pub values: Vec<String>,
}

impl EnumDescriptor {
    pub fn key(&self) -> String {
        cache_key(&self.schema, &self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnShape {
    /// One value.
    Scalar,
    /// One composite row.
    Row,
    /// `SETOF ...`
    RowSet,
    /// `RETURNS TABLE (...)`
    Table,
}

impl ReturnShape {
    pub fn returns_many(self) -> bool {
        matches!(self, ReturnShape::RowSet | ReturnShape::Table)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionParam {
    /// Empty for unnamed parameters.
    pub name: String,
    pub sql_type: String,
    pub has_default: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDescriptor {
    pub schema: String,
    pub name: String,
    /// Input parameters (in, inout, variadic) in declaration order.
    pub params: Vec<FunctionParam>,
    pub return_type: String,
    pub returns: ReturnShape,
}

impl FunctionDescriptor {
    pub fn key(&self) -> String {
        cache_key(&self.schema, &self.name)
    }
}

/// Everything one catalog walk produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Catalog {
    /// Included schemas that exist in the live catalog, in configuration order.
    pub schemas: Vec<String>,
    pub tables: Vec<TableDescriptor>,
    pub views: Vec<ViewDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub functions: Vec<FunctionDescriptor>,
}

impl Catalog {
    /// Drop foreign-key references whose target column is not part of a loaded table.
    pub fn resolve_foreign_keys(&mut self) {
        let known: HashSet<(String, String, String)> = self
            .tables
            .iter()
            .flat_map(|t| {
                t.columns
                    .iter()
                    .map(move |c| (t.schema.clone(), t.name.clone(), c.name.clone()))
            })
            .collect();
        for table in &mut self.tables {
            for col in &mut table.columns {
                let dangling = col.references.as_ref().is_some_and(|r| {
                    !known.contains(&(r.schema.clone(), r.table.clone(), r.column.clone()))
                });
                if dangling {
                    tracing::debug!(
                        table = %table.name,
                        column = %col.name,
                        "dropping reference to a table outside the loaded catalog"
                    );
                    col.references = None;
                }
            }
        }
    }
}

pub fn cache_key(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pharmacy() -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", "integer", false);
        id.is_primary_key = true;
        id.has_default = true;
        let name = ColumnDescriptor::new("name", "character varying", false);
        let mut category = ColumnDescriptor::new("category_id", "integer", true);
        category.references = Some(ForeignKeyRef {
            schema: "public".into(),
            table: "category".into(),
            column: "id".into(),
        });
        let mut supplier = ColumnDescriptor::new("supplier_id", "integer", true);
        supplier.references = Some(ForeignKeyRef {
            schema: "vendor".into(),
            table: "supplier".into(),
            column: "id".into(),
        });
        TableDescriptor {
            schema: "public".into(),
            name: "pharmacy".into(),
            columns: vec![id, name, category, supplier],
            primary_key: vec!["id".into()],
        }
    }

    fn category() -> TableDescriptor {
        let mut id = ColumnDescriptor::new("id", "integer", false);
        id.is_primary_key = true;
        TableDescriptor {
            schema: "public".into(),
            name: "category".into(),
            columns: vec![id],
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn resolving_keeps_loaded_targets_and_drops_dangling() {
        let mut catalog = Catalog {
            schemas: vec!["public".into()],
            tables: vec![pharmacy(), category()],
            ..Default::default()
        };
        catalog.resolve_foreign_keys();
        let t = &catalog.tables[0];
        assert_eq!(
            t.column("category_id").unwrap().references,
            Some(ForeignKeyRef {
                schema: "public".into(),
                table: "category".into(),
                column: "id".into()
            })
        );
        assert_eq!(t.column("supplier_id").unwrap().references, None);
        assert_eq!(t.column("name").unwrap().references, None);
    }

    #[test]
    fn exclude_matches_bare_and_qualified_names() {
        let filter = CatalogFilter {
            include_schemas: vec!["public".into(), "pharma".into()],
            exclude_tables: vec!["secrets".into(), "pharma.audit".into()],
        };
        assert!(filter.excludes_table("public", "secrets"));
        assert!(filter.excludes_table("pharma", "secrets"));
        assert!(filter.excludes_table("pharma", "audit"));
        assert!(!filter.excludes_table("public", "audit"));
    }

    #[test]
    fn keys_are_schema_dot_name() {
        assert_eq!(pharmacy().key(), "public.pharmacy");
        assert!(ReturnShape::Table.returns_many());
        assert!(!ReturnShape::Row.returns_many());
    }
}
