//! Builds parameterized SELECT, INSERT, UPDATE, DELETE and function calls from shapes.
//! Every statement yields rows as one `jsonb` column so decoding is type-independent.

use crate::error::AppError;
use crate::mapping::{array_element_type, normalize_type_name};
use crate::model::{Field, FunctionModel, Shape};
use crate::sql::params::PgBindValue;
use serde_json::{Map, Value};

const ROW_ALIAS: &str = "r";

/// Quote identifier for PostgreSQL (identifiers come from the catalog only).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    /// Add a parameter and return its cast placeholder, e.g. `$2::integer`.
    fn push_param(&mut self, v: &Value, sql_type: &str) -> String {
        self.params.push(PgBindValue::from_json(v, sql_type));
        format!("${}::{}", self.params.len(), sql_type)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    /// Split `price__gte` into (`price`, Gte). A bare name is equality.
    pub fn parse_key(key: &str) -> (&str, FilterOp) {
        if let Some((col, suffix)) = key.rsplit_once("__") {
            let op = match suffix {
                "gt" => Some(FilterOp::Gt),
                "gte" => Some(FilterOp::Gte),
                "lt" => Some(FilterOp::Lt),
                "lte" => Some(FilterOp::Lte),
                _ => None,
            };
            if let Some(op) = op {
                return (col, op);
            }
        }
        (key, FilterOp::Eq)
    }

    fn sql(self) -> &'static str {
        match self {
            FilterOp::Eq => "=",
            FilterOp::Gt => ">",
            FilterOp::Gte => ">=",
            FilterOp::Lt => "<",
            FilterOp::Lte => "<=",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// JSON and array columns compare on their text form; `json` has no equality operator.
fn filters_as_text(field: &Field) -> bool {
    field.ty.ty.is_structured()
        || field.ty.ty.is_array()
        || array_element_type(&field.sql_type).is_some()
        || matches!(normalize_type_name(&field.sql_type).as_str(), "json" | "jsonb")
}

fn where_clause(q: &mut QueryBuf, shape: &Shape, filters: &[Filter]) -> String {
    let parts: Vec<String> = filters
        .iter()
        .filter_map(|f| {
            let field = shape.field(&f.column)?;
            let column = format!("{}.{}", ROW_ALIAS, quoted(&f.column));
            Some(if filters_as_text(field) {
                let ph = q.push_param(&f.value, "text");
                format!("{}::text {} {}", column, f.op.sql(), ph)
            } else {
                let ph = q.push_param(&f.value, &field.sql_type);
                format!("{} {} {}", column, f.op.sql(), ph)
            })
        })
        .collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn key_predicate(q: &mut QueryBuf, key: &[&Field], values: &[Value]) -> String {
    key.iter()
        .zip(values)
        .map(|(field, v)| {
            let ph = q.push_param(v, &field.sql_type);
            format!("{}.{} = {}", ROW_ALIAS, quoted(&field.name), ph)
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// SELECT rows with filters (columns outside the shape are ignored), ORDER BY `order_by`, LIMIT/OFFSET.
pub fn select_list(
    schema: &str,
    relation: &str,
    shape: &Shape,
    filters: &[Filter],
    order_by: &[String],
    limit: u32,
    offset: u32,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, shape, filters);
    let order_sql = if order_by.is_empty() {
        String::new()
    } else {
        let cols: Vec<String> = order_by
            .iter()
            .map(|c| format!("{}.{}", ROW_ALIAS, quoted(c)))
            .collect();
        format!(" ORDER BY {}", cols.join(", "))
    };
    q.sql = format!(
        "SELECT to_jsonb({a}) FROM {} AS {a}{}{} LIMIT {} OFFSET {}",
        qualified_table(schema, relation),
        where_sql,
        order_sql,
        limit,
        offset,
        a = ROW_ALIAS
    );
    q
}

/// SELECT one row by its full primary key.
pub fn select_by_key(schema: &str, table: &str, key: &[&Field], values: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pred = key_predicate(&mut q, key, values);
    q.sql = format!(
        "SELECT to_jsonb({a}) FROM {} AS {a} WHERE {}",
        qualified_table(schema, table),
        pred,
        a = ROW_ALIAS
    );
    q
}

/// INSERT the body's columns in shape order; server defaults fill the rest.
pub fn insert(schema: &str, table: &str, shape: &Shape, body: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for field in &shape.fields {
        if let Some(v) = body.get(&field.name) {
            cols.push(quoted(&field.name));
            placeholders.push(q.push_param(v, &field.sql_type));
        }
    }
    let target = format!("{} AS {}", qualified_table(schema, table), ROW_ALIAS);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING to_jsonb({})", target, ROW_ALIAS)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING to_jsonb({})",
            target,
            cols.join(", "),
            placeholders.join(", "),
            ROW_ALIAS
        )
    };
    q
}

/// UPDATE the body's non-key columns of one row. With nothing to set, falls back to a select.
pub fn update(
    schema: &str,
    table: &str,
    shape: &Shape,
    key: &[&Field],
    values: &[Value],
    body: &Map<String, Value>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets: Vec<String> = shape
        .fields
        .iter()
        .filter(|f| !f.key)
        .filter_map(|f| {
            let v = body.get(&f.name)?;
            Some(format!("{} = {}", quoted(&f.name), q.push_param(v, &f.sql_type)))
        })
        .collect();
    if sets.is_empty() {
        return select_by_key(schema, table, key, values);
    }
    let pred = key_predicate(&mut q, key, values);
    q.sql = format!(
        "UPDATE {} AS {a} SET {} WHERE {} RETURNING to_jsonb({a})",
        qualified_table(schema, table),
        sets.join(", "),
        pred,
        a = ROW_ALIAS
    );
    q
}

/// DELETE one row by key, returning it.
pub fn delete(schema: &str, table: &str, key: &[&Field], values: &[Value]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pred = key_predicate(&mut q, key, values);
    q.sql = format!(
        "DELETE FROM {} AS {a} WHERE {} RETURNING to_jsonb({a})",
        qualified_table(schema, table),
        pred,
        a = ROW_ALIAS
    );
    q
}

/// Call a function with arguments taken by name from `args`.
///
/// Named parameters use `name => value` notation so omitted defaulted parameters
/// can be skipped; unnamed ones are positional and must come first.
pub fn call_function(function: &FunctionModel, args: &Map<String, Value>) -> Result<QueryBuf, AppError> {
    let mut q = QueryBuf::new();
    let mut rendered = Vec::new();
    let mut positional_open = true;
    for (field, param) in function.params.fields.iter().zip(&function.descriptor.params) {
        let named = !param.name.is_empty();
        match args.get(&field.name) {
            Some(v) if named => {
                positional_open = false;
                let ph = q.push_param(v, &field.sql_type);
                rendered.push(format!("{} => {}", quoted(&field.name), ph));
            }
            Some(v) => {
                if !positional_open {
                    return Err(AppError::Validation(format!(
                        "{} cannot follow a named or omitted argument",
                        field.name
                    )));
                }
                rendered.push(q.push_param(v, &field.sql_type));
            }
            None if field.has_default => positional_open = false,
            None => return Err(AppError::Validation(format!("{} is required", field.name))),
        }
    }
    q.sql = format!(
        "SELECT to_jsonb({}({})) AS value",
        qualified_table(&function.descriptor.schema, &function.descriptor.name),
        rendered.join(", ")
    );
    Ok(q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FunctionDescriptor, FunctionParam, ReturnShape};
    use crate::mapping::{FieldType, ScalarKind, TypeDescriptor};
    use serde_json::json;

    fn field(name: &str, sql_type: &str, key: bool) -> Field {
        Field {
            name: name.into(),
            ty: FieldType::new(TypeDescriptor::Scalar(ScalarKind::Opaque), !key),
            required: key,
            sql_type: sql_type.into(),
            has_default: key,
            key,
        }
    }

    fn inventory() -> Shape {
        Shape::new(
            "pharma.inventory",
            vec![
                field("pharmacy_id", "integer", true),
                field("medicine_id", "integer", true),
                field("quantity", "integer", false),
                field("note", "text", false),
            ],
        )
    }

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn parse_filter_keys() {
        assert_eq!(FilterOp::parse_key("price__gte"), ("price", FilterOp::Gte));
        assert_eq!(FilterOp::parse_key("price"), ("price", FilterOp::Eq));
        assert_eq!(FilterOp::parse_key("first__name"), ("first__name", FilterOp::Eq));
    }

    #[test]
    fn list_casts_filters_and_skips_unknown_columns() {
        let filters = vec![
            Filter {
                column: "quantity".into(),
                op: FilterOp::Lt,
                value: json!("5"),
            },
            Filter {
                column: "color".into(),
                op: FilterOp::Eq,
                value: json!("red"),
            },
        ];
        let q = select_list(
            "pharma",
            "inventory",
            &inventory(),
            &filters,
            &["pharmacy_id".into(), "medicine_id".into()],
            100,
            0,
        );
        assert_eq!(
            q.sql,
            "SELECT to_jsonb(r) FROM \"pharma\".\"inventory\" AS r WHERE r.\"quantity\" < $1::integer \
             ORDER BY r.\"pharmacy_id\", r.\"medicine_id\" LIMIT 100 OFFSET 0"
        );
        assert_eq!(q.params, vec![PgBindValue::Text("5".into())]);
    }

    #[test]
    fn json_and_array_filters_compare_as_text() {
        let shape = Shape::new(
            "pharma.low_stock.query",
            vec![
                Field {
                    name: "details".into(),
                    ty: FieldType::new(TypeDescriptor::Scalar(ScalarKind::Text), true),
                    required: false,
                    sql_type: "jsonb".into(),
                    has_default: false,
                    key: false,
                },
                Field {
                    name: "info".into(),
                    ty: FieldType::new(TypeDescriptor::untyped(), true),
                    required: false,
                    sql_type: "json".into(),
                    has_default: false,
                    key: false,
                },
                field("tags", "text[]", false),
            ],
        );
        let filters: Vec<Filter> = ["details", "info", "tags"]
            .iter()
            .map(|c| Filter {
                column: c.to_string(),
                op: FilterOp::Eq,
                value: json!("x"),
            })
            .collect();
        let q = select_list("pharma", "low_stock", &shape, &filters, &[], 100, 0);
        assert_eq!(
            q.sql,
            "SELECT to_jsonb(r) FROM \"pharma\".\"low_stock\" AS r WHERE r.\"details\"::text = $1::text \
             AND r.\"info\"::text = $2::text AND r.\"tags\"::text = $3::text LIMIT 100 OFFSET 0"
        );
        assert_eq!(q.params, vec![PgBindValue::Text("x".into()); 3]);
    }

    #[test]
    fn composite_key_update_sets_non_key_columns_only() {
        let shape = inventory();
        let key: Vec<&Field> = shape.fields.iter().filter(|f| f.key).collect();
        let q = update(
            "pharma",
            "inventory",
            &shape,
            &key,
            &[json!("1"), json!("7")],
            &obj(json!({"quantity": 3, "pharmacy_id": 9})),
        );
        assert_eq!(
            q.sql,
            "UPDATE \"pharma\".\"inventory\" AS r SET \"quantity\" = $1::integer \
             WHERE r.\"pharmacy_id\" = $2::integer AND r.\"medicine_id\" = $3::integer RETURNING to_jsonb(r)"
        );
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn empty_update_reads_instead() {
        let shape = inventory();
        let key: Vec<&Field> = shape.fields.iter().filter(|f| f.key).collect();
        let q = update("pharma", "inventory", &shape, &key, &[json!(1), json!(2)], &Map::new());
        assert!(q.sql.starts_with("SELECT to_jsonb(r)"));
    }

    #[test]
    fn insert_without_columns_uses_defaults() {
        let q = insert("pharma", "inventory", &inventory(), &Map::new());
        assert_eq!(
            q.sql,
            "INSERT INTO \"pharma\".\"inventory\" AS r DEFAULT VALUES RETURNING to_jsonb(r)"
        );
        let q = insert("pharma", "inventory", &inventory(), &obj(json!({"note": "x", "quantity": 1})));
        assert_eq!(
            q.sql,
            "INSERT INTO \"pharma\".\"inventory\" AS r (\"quantity\", \"note\") VALUES ($1::integer, $2::text) \
             RETURNING to_jsonb(r)"
        );
    }

    fn restock() -> FunctionModel {
        let params = vec![
            FunctionParam {
                name: "item_id".into(),
                sql_type: "integer".into(),
                has_default: false,
            },
            FunctionParam {
                name: "amount".into(),
                sql_type: "integer".into(),
                has_default: true,
            },
            FunctionParam {
                name: "note".into(),
                sql_type: "text".into(),
                has_default: true,
            },
        ];
        FunctionModel::build(
            FunctionDescriptor {
                schema: "pharma".into(),
                name: "restock".into(),
                params,
                return_type: "integer".into(),
                returns: ReturnShape::Scalar,
            },
            &crate::mapping::TypeMapper::default(),
        )
    }

    #[test]
    fn function_call_skips_defaulted_arguments() {
        let q = call_function(&restock(), &obj(json!({"item_id": 4, "note": "weekly"}))).unwrap();
        assert_eq!(
            q.sql,
            "SELECT to_jsonb(\"pharma\".\"restock\"(\"item_id\" => $1::integer, \"note\" => $2::text)) AS value"
        );
    }

    #[test]
    fn function_call_requires_non_default_arguments() {
        let err = call_function(&restock(), &obj(json!({"amount": 2}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
