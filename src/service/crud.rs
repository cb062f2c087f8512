//! Generic CRUD and function execution against PostgreSQL.

use crate::catalog::ReturnShape;
use crate::error::AppError;
use crate::model::{FunctionModel, Shape, TableModel, ValidationMode, ViewModel};
use crate::service::query::ListQuery;
use crate::sql::{call_function, delete, insert, select_by_key, select_list, update, QueryBuf};
use serde_json::{Map, Value};
use sqlx::PgConnection;

pub struct CrudService;

impl CrudService {
    /// List table rows ordered by primary key (unordered without one).
    pub async fn list_table(
        conn: &mut PgConnection,
        table: &TableModel,
        query: &ListQuery,
    ) -> Result<Vec<Value>, AppError> {
        let d = &table.descriptor;
        let shape = &table.models.persistence;
        let q = select_list(&d.schema, &d.name, shape, &query.filters, &d.primary_key, query.limit, query.offset);
        let rows = Self::fetch_rows(conn, &q).await?;
        Ok(rows.into_iter().map(|r| shape.project(r)).collect())
    }

    pub async fn list_view(
        conn: &mut PgConnection,
        view: &ViewModel,
        query: &ListQuery,
    ) -> Result<Vec<Value>, AppError> {
        let d = &view.descriptor;
        let q = select_list(&d.schema, &d.name, &view.query, &query.filters, &[], query.limit, query.offset);
        let rows = Self::fetch_rows(conn, &q).await?;
        Ok(rows.into_iter().map(|r| view.response.project(r)).collect())
    }

    /// Fetch one row by primary key. Returns projected row or None.
    pub async fn read(
        conn: &mut PgConnection,
        table: &TableModel,
        key: &[Value],
    ) -> Result<Option<Value>, AppError> {
        let d = &table.descriptor;
        let q = select_by_key(&d.schema, &d.name, &table.key_fields(), key);
        Self::fetch_one(conn, &q, &table.models.persistence).await
    }

    /// Insert one row; fields with server defaults may be omitted. Returns created row.
    pub async fn create(
        conn: &mut PgConnection,
        table: &TableModel,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        table.models.validation.validate(body, ValidationMode::Create)?;
        let d = &table.descriptor;
        let q = insert(&d.schema, &d.name, &table.models.persistence, body);
        Self::fetch_one(conn, &q, &table.models.persistence)
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))
    }

    /// Update the given fields of one row. Returns updated row or None.
    pub async fn update(
        conn: &mut PgConnection,
        table: &TableModel,
        key: &[Value],
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        table.models.validation.validate(body, ValidationMode::Partial)?;
        let d = &table.descriptor;
        let q = update(&d.schema, &d.name, &table.models.persistence, &table.key_fields(), key, body);
        Self::fetch_one(conn, &q, &table.models.persistence).await
    }

    /// Delete one row by key. Returns deleted row or None.
    pub async fn delete(
        conn: &mut PgConnection,
        table: &TableModel,
        key: &[Value],
    ) -> Result<Option<Value>, AppError> {
        let d = &table.descriptor;
        let q = delete(&d.schema, &d.name, &table.key_fields(), key);
        Self::fetch_one(conn, &q, &table.models.persistence).await
    }

    /// Invoke a function. Scalar → value, row → object or null, row-set/table → array.
    pub async fn call(
        conn: &mut PgConnection,
        function: &FunctionModel,
        body: Value,
    ) -> Result<Value, AppError> {
        let args = function_args(function, body)?;
        function.params.validate(&args, ValidationMode::Partial)?;
        let q = call_function(function, &args)?;
        let values = Self::fetch_values(conn, &q).await?;
        Ok(match function.descriptor.returns {
            ReturnShape::Scalar | ReturnShape::Row => values.into_iter().next().unwrap_or(Value::Null),
            ReturnShape::RowSet | ReturnShape::Table => Value::Array(values),
        })
    }

    async fn fetch_one(conn: &mut PgConnection, q: &QueryBuf, shape: &Shape) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let row = query.fetch_optional(&mut *conn).await?;
        Ok(row.map(|r| shape.project(r)))
    }

    async fn fetch_rows(conn: &mut PgConnection, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_all(&mut *conn).await?)
    }

    /// Like `fetch_rows`, but SQL NULL results become JSON null.
    async fn fetch_values(conn: &mut PgConnection, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Option<Value>>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let rows = query.fetch_all(&mut *conn).await?;
        Ok(rows.into_iter().map(|v| v.unwrap_or(Value::Null)).collect())
    }
}

/// Normalize a function request body: an object is taken by name, an array by position.
pub fn function_args(function: &FunctionModel, body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Null => Ok(Map::new()),
        Value::Object(m) => Ok(m),
        Value::Array(items) => {
            let fields = &function.params.fields;
            if items.len() > fields.len() {
                return Err(AppError::Validation(format!(
                    "{} takes {} arguments, got {}",
                    function.descriptor.key(),
                    fields.len(),
                    items.len()
                )));
            }
            Ok(fields.iter().map(|f| f.name.clone()).zip(items).collect())
        }
        _ => Err(AppError::BadRequest("body must be a JSON object or array".into())),
    }
}
