//! Walk `pg_catalog` for the configured schemas and build descriptors.

use crate::catalog::types::*;
use crate::catalog::CatalogSource;
use crate::db::ConnectionManager;
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgConnection;
use std::collections::HashMap;

const SCHEMAS_SQL: &str = "SELECT nspname::text FROM pg_namespace WHERE nspname = ANY($1)";

const RELATIONS_SQL: &str = r#"
SELECT c.relname::text, c.relkind::text
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1
  AND c.relkind IN ('r', 'p', 'v', 'm')
  AND NOT c.relispartition
ORDER BY c.relname
"#;

const COLUMNS_SQL: &str = r#"
SELECT c.relname::text,
       a.attname::text,
       format_type(a.atttypid, a.atttypmod),
       NOT a.attnotnull,
       (a.atthasdef OR a.attidentity <> '' OR a.attgenerated <> ''),
       t.typtype = 'e'
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_type t ON t.oid = a.atttypid
WHERE n.nspname = $1
  AND c.relkind IN ('r', 'p', 'v', 'm')
  AND a.attnum > 0
  AND NOT a.attisdropped
ORDER BY c.relname, a.attnum
"#;

const PRIMARY_KEYS_SQL: &str = r#"
SELECT c.relname::text, a.attname::text
FROM pg_index i
JOIN pg_class c ON c.oid = i.indrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
WHERE n.nspname = $1 AND i.indisprimary
ORDER BY c.relname, k.ord
"#;

const FOREIGN_KEYS_SQL: &str = r#"
SELECT c.relname::text, a.attname::text, fn.nspname::text, fc.relname::text, fa.attname::text
FROM pg_constraint con
JOIN pg_class c ON c.oid = con.conrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN pg_class fc ON fc.oid = con.confrelid
JOIN pg_namespace fn ON fn.oid = fc.relnamespace
CROSS JOIN LATERAL unnest(con.conkey, con.confkey) AS k(attnum, fattnum)
JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
JOIN pg_attribute fa ON fa.attrelid = con.confrelid AND fa.attnum = k.fattnum
WHERE con.contype = 'f' AND n.nspname = $1
ORDER BY c.relname, con.conname, k.attnum
"#;

const ENUMS_SQL: &str = r#"
SELECT t.typname::text, e.enumlabel::text
FROM pg_type t
JOIN pg_namespace n ON n.oid = t.typnamespace
JOIN pg_enum e ON e.enumtypid = t.oid
WHERE n.nspname = $1
ORDER BY t.typname, e.enumsortorder
"#;

const FUNCTIONS_SQL: &str = r#"
SELECT p.oid::int8,
       p.proname::text,
       p.proretset,
       format_type(p.prorettype, NULL),
       rt.typtype::text,
       COALESCE(p.proargmodes::text[] && ARRAY['t'], false),
       p.pronargdefaults::int4
FROM pg_proc p
JOIN pg_namespace n ON n.oid = p.pronamespace
JOIN pg_type rt ON rt.oid = p.prorettype
WHERE n.nspname = $1
  AND p.prokind = 'f'
  AND p.prorettype NOT IN ('trigger'::regtype, 'event_trigger'::regtype)
  AND NOT EXISTS (SELECT 1 FROM pg_depend d WHERE d.objid = p.oid AND d.deptype = 'e')
ORDER BY p.proname, p.oid
"#;

const FUNCTION_PARAMS_SQL: &str = r#"
SELECT p.oid::int8,
       COALESCE(p.proargnames[k.ord], '')::text,
       format_type(k.typ, NULL),
       COALESCE(p.proargmodes[k.ord]::text, 'i')
FROM pg_proc p
JOIN pg_namespace n ON n.oid = p.pronamespace
CROSS JOIN LATERAL unnest(COALESCE(p.proallargtypes, p.proargtypes::oid[])) WITH ORDINALITY AS k(typ, ord)
WHERE n.nspname = $1 AND p.prokind = 'f'
ORDER BY p.oid, k.ord
"#;

/// Reads tables, views, enums and functions for a schema set from a live PostgreSQL catalog.
#[derive(Clone)]
pub struct SchemaCatalogLoader {
    db: ConnectionManager,
}

impl SchemaCatalogLoader {
    pub fn new(db: ConnectionManager) -> Self {
        SchemaCatalogLoader { db }
    }

    async fn load_schema(
        conn: &mut PgConnection,
        schema: &str,
        filter: &CatalogFilter,
        catalog: &mut Catalog,
    ) -> Result<(), AppError> {
        let relations: Vec<(String, String)> = sqlx::query_as(RELATIONS_SQL)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;
        let columns: Vec<(String, String, String, bool, bool, bool)> = sqlx::query_as(COLUMNS_SQL)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;
        let pks: Vec<(String, String)> = sqlx::query_as(PRIMARY_KEYS_SQL)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;
        let fks: Vec<(String, String, String, String, String)> = sqlx::query_as(FOREIGN_KEYS_SQL)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;

        let mut columns_by_rel: HashMap<String, Vec<ColumnDescriptor>> = HashMap::new();
        for (rel, name, sql_type, nullable, has_default, is_enum) in columns {
            let mut col = ColumnDescriptor::new(name, sql_type, nullable);
            col.has_default = has_default;
            col.is_enum = is_enum;
            columns_by_rel.entry(rel).or_default().push(col);
        }
        let mut pk_by_rel: HashMap<String, Vec<String>> = HashMap::new();
        for (rel, col) in pks {
            pk_by_rel.entry(rel).or_default().push(col);
        }
        let mut fk_by_col: HashMap<(String, String), ForeignKeyRef> = HashMap::new();
        for (rel, col, ref_schema, ref_table, ref_column) in fks {
            // First constraint (by name) wins for columns with several foreign keys.
            fk_by_col.entry((rel, col)).or_insert(ForeignKeyRef {
                schema: ref_schema,
                table: ref_table,
                column: ref_column,
            });
        }

        for (rel, kind) in relations {
            let mut cols = columns_by_rel.remove(&rel).unwrap_or_default();
            match kind.as_str() {
                "r" | "p" => {
                    if filter.excludes_table(schema, &rel) {
                        tracing::debug!(schema, table = %rel, "table excluded by config");
                        continue;
                    }
                    let primary_key = pk_by_rel.remove(&rel).unwrap_or_default();
                    for col in &mut cols {
                        col.is_primary_key = primary_key.contains(&col.name);
                        col.references = fk_by_col.remove(&(rel.clone(), col.name.clone()));
                    }
                    catalog.tables.push(TableDescriptor {
                        schema: schema.to_string(),
                        name: rel,
                        columns: cols,
                        primary_key,
                    });
                }
                _ => {
                    // Views carry no key or reference semantics.
                    catalog.views.push(ViewDescriptor {
                        schema: schema.to_string(),
                        name: rel,
                        columns: cols,
                    });
                }
            }
        }

        Self::load_enums(conn, schema, catalog).await?;
        Self::load_functions(conn, schema, catalog).await?;
        Ok(())
    }

    async fn load_enums(conn: &mut PgConnection, schema: &str, catalog: &mut Catalog) -> Result<(), AppError> {
        let rows: Vec<(String, String)> = sqlx::query_as(ENUMS_SQL)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;
        for (name, label) in rows {
            match catalog.enums.last_mut() {
                Some(e) if e.schema == schema && e.name == name => e.values.push(label),
                _ => catalog.enums.push(EnumDescriptor {
                    schema: schema.to_string(),
                    name,
                    values: vec![label],
                }),
            }
        }
        Ok(())
    }

    async fn load_functions(conn: &mut PgConnection, schema: &str, catalog: &mut Catalog) -> Result<(), AppError> {
        let functions: Vec<(i64, String, bool, String, String, bool, i32)> = sqlx::query_as(FUNCTIONS_SQL)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;
        let params: Vec<(i64, String, String, String)> = sqlx::query_as(FUNCTION_PARAMS_SQL)
            .bind(schema)
            .fetch_all(&mut *conn)
            .await?;

        let mut params_by_oid: HashMap<i64, Vec<FunctionParam>> = HashMap::new();
        for (oid, name, sql_type, mode) in params {
            if is_input_mode(&mode) {
                params_by_oid.entry(oid).or_default().push(FunctionParam {
                    name,
                    sql_type,
                    has_default: false,
                });
            }
        }

        let mut seen: Vec<String> = Vec::new();
        for (oid, name, returns_set, return_type, return_kind, returns_table, n_defaults) in functions {
            if seen.contains(&name) {
                tracing::warn!(schema, function = %name, "overloaded function skipped; first overload wins");
                continue;
            }
            let mut fn_params = params_by_oid.remove(&oid).unwrap_or_default();
            mark_defaults(&mut fn_params, n_defaults.max(0) as usize);
            let returns = classify_return(returns_set, returns_table, &return_type, &return_kind);
            seen.push(name.clone());
            catalog.functions.push(FunctionDescriptor {
                schema: schema.to_string(),
                name,
                params: fn_params,
                return_type,
                returns,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for SchemaCatalogLoader {
    async fn load(&self, filter: &CatalogFilter) -> Result<Catalog, AppError> {
        let mut session = self.db.session().await.map_err(|e| match e {
            AppError::Db(inner) => AppError::Connectivity(inner.to_string()),
            other => other,
        })?;
        let conn = session.conn();

        let existing: Vec<String> = sqlx::query_scalar(SCHEMAS_SQL)
            .bind(&filter.include_schemas)
            .fetch_all(&mut *conn)
            .await?;
        let mut catalog = Catalog::default();
        for schema in &filter.include_schemas {
            if !existing.contains(schema) {
                tracing::warn!(schema = %schema, "included schema not present in database");
                continue;
            }
            catalog.schemas.push(schema.clone());
            Self::load_schema(&mut *conn, schema, filter, &mut catalog).await?;
        }
        catalog.resolve_foreign_keys();
        tracing::debug!(
            tables = catalog.tables.len(),
            views = catalog.views.len(),
            enums = catalog.enums.len(),
            functions = catalog.functions.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }
}

/// `i` in, `b` inout, `v` variadic. `o` out and `t` table columns are outputs.
fn is_input_mode(mode: &str) -> bool {
    matches!(mode, "i" | "b" | "v")
}

/// The last `n_defaults` input parameters carry defaults.
fn mark_defaults(params: &mut [FunctionParam], n_defaults: usize) {
    let start = params.len().saturating_sub(n_defaults);
    for p in &mut params[start..] {
        p.has_default = true;
    }
}

fn classify_return(returns_set: bool, returns_table: bool, return_type: &str, return_kind: &str) -> ReturnShape {
    if returns_table {
        ReturnShape::Table
    } else if returns_set {
        ReturnShape::RowSet
    } else if return_kind == "c" || return_type == "record" {
        ReturnShape::Row
    } else {
        ReturnShape::Scalar
    }
}
