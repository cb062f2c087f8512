//! Convert serde_json::Value to text parameters that PostgreSQL casts to the column type.

use crate::mapping::array_element_type;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A bindable value. Always sent as text; the statement casts it with `$n::<sql_type>`.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Text(String),
}

impl PgBindValue {
    /// Render `v` as the text input form of `sql_type`.
    pub fn from_json(v: &Value, sql_type: &str) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::String(s) => PgBindValue::Text(s.clone()),
            Value::Bool(b) => PgBindValue::Text(b.to_string()),
            Value::Number(n) => PgBindValue::Text(n.to_string()),
            Value::Array(items) if array_element_type(sql_type).is_some() => {
                PgBindValue::Text(array_literal(items))
            }
            Value::Array(_) | Value::Object(_) => PgBindValue::Text(v.to_string()),
        }
    }
}

/// PostgreSQL array input syntax: `{1,2}`, `{"a","b \"c\""}`, nested for multi-dimensional arrays.
pub fn array_literal(items: &[Value]) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_element(s),
            Value::Array(inner) => array_literal(inner),
            Value::Object(_) => quote_element(&item.to_string()),
        })
        .collect();
    format!("{{{}}}", parts.join(","))
}

fn quote_element(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Null => Ok(IsNull::Yes),
            PgBindValue::Text(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf),
        }
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_become_text() {
        assert_eq!(PgBindValue::from_json(&json!(42), "integer"), PgBindValue::Text("42".into()));
        assert_eq!(PgBindValue::from_json(&json!(true), "boolean"), PgBindValue::Text("true".into()));
        assert_eq!(PgBindValue::from_json(&Value::Null, "integer"), PgBindValue::Null);
    }

    #[test]
    fn arrays_follow_column_kind() {
        assert_eq!(
            PgBindValue::from_json(&json!(["a", "b\"c", null]), "text[]"),
            PgBindValue::Text(r#"{"a","b\"c",NULL}"#.into())
        );
        assert_eq!(
            PgBindValue::from_json(&json!([[1, 2], [3, 4]]), "integer[]"),
            PgBindValue::Text("{{1,2},{3,4}}".into())
        );
        assert_eq!(
            PgBindValue::from_json(&json!([{"k": 1}]), "jsonb"),
            PgBindValue::Text(r#"[{"k":1}]"#.into())
        );
    }
}
