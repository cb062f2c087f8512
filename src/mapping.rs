//! SQL type name → semantic type descriptor, including shallow structural inference for JSON columns.

use crate::catalog::EnumDescriptor;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Date,
    Time,
    DateTime,
    Uuid,
    Binary,
    /// Unrecognized type; any value passes through.
    Opaque,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EnumRef {
    pub schema: String,
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectShape {
    /// Arbitrary key → value mapping.
    Untyped,
    /// Fields observed in one sample, in key order.
    Object { fields: Vec<(String, FieldType)> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "of", rename_all = "snake_case")]
pub enum TypeDescriptor {
    Scalar(ScalarKind),
    Enum(EnumRef),
    Array(Box<TypeDescriptor>),
    Structured(ObjectShape),
}

/// A descriptor plus the optional marker. Nullability never changes the variant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldType {
    pub ty: TypeDescriptor,
    pub optional: bool,
}

impl FieldType {
    pub fn new(ty: TypeDescriptor, optional: bool) -> Self {
        FieldType { ty, optional }
    }

    pub fn required(ty: TypeDescriptor) -> Self {
        FieldType { ty, optional: false }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.optional;
        }
        self.ty.accepts(value)
    }
}

impl TypeDescriptor {
    pub fn untyped() -> Self {
        TypeDescriptor::Structured(ObjectShape::Untyped)
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, TypeDescriptor::Structured(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeDescriptor::Array(_))
    }

    /// Short human label, e.g. `integer`, `list<object>`.
    pub fn label(&self) -> String {
        match self {
            TypeDescriptor::Scalar(k) => format!("{:?}", k).to_lowercase(),
            TypeDescriptor::Enum(e) => format!("enum<{}.{}>", e.schema, e.name),
            TypeDescriptor::Array(inner) => format!("list<{}>", inner.label()),
            TypeDescriptor::Structured(ObjectShape::Untyped) => "json".into(),
            TypeDescriptor::Structured(ObjectShape::Object { .. }) => "object".into(),
        }
    }

    /// Whether a non-null JSON value is a valid instance.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            TypeDescriptor::Scalar(kind) => scalar_accepts(*kind, value),
            TypeDescriptor::Enum(e) => value.as_str().is_some_and(|s| e.values.iter().any(|v| v == s)),
            TypeDescriptor::Array(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|v| v.is_null() || inner.accepts(v))),
            TypeDescriptor::Structured(ObjectShape::Untyped) => true,
            TypeDescriptor::Structured(ObjectShape::Object { fields }) => match value.as_object() {
                Some(obj) => fields
                    .iter()
                    .all(|(name, ft)| obj.get(name).map_or(ft.optional, |v| ft.accepts(v))),
                None => false,
            },
        }
    }
}

fn scalar_accepts(kind: ScalarKind, value: &Value) -> bool {
    match kind {
        ScalarKind::Integer => value.is_i64() || value.is_u64(),
        ScalarKind::Float => value.is_number(),
        ScalarKind::Decimal => {
            value.is_number() || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
        }
        ScalarKind::Boolean => value.is_boolean(),
        ScalarKind::Text | ScalarKind::Binary => value.is_string(),
        ScalarKind::Date => value
            .as_str()
            .is_some_and(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
        ScalarKind::Time => value.as_str().is_some_and(|s| {
            chrono::NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
                || chrono::NaiveTime::parse_from_str(s, "%H:%M").is_ok()
                || chrono::DateTime::parse_from_str(&format!("1970-01-01T{}", s), "%Y-%m-%dT%H:%M:%S%.f%#z").is_ok()
        }),
        ScalarKind::DateTime => value.as_str().is_some_and(|s| {
            chrono::DateTime::parse_from_rfc3339(s).is_ok()
                || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
                || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        }),
        ScalarKind::Uuid => value.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        ScalarKind::Opaque => true,
    }
}

fn base_scalar(name: &str) -> Option<ScalarKind> {
    use ScalarKind::*;
    Some(match name {
        "smallint" | "integer" | "bigint" | "int" | "int2" | "int4" | "int8" | "smallserial" | "serial"
        | "bigserial" | "serial2" | "serial4" | "serial8" | "oid" => Integer,
        "real" | "double precision" | "float" | "float4" | "float8" => Float,
        "numeric" | "decimal" | "money" => Decimal,
        "boolean" | "bool" => Boolean,
        "text" | "character varying" | "varchar" | "character" | "char" | "bpchar" | "name" | "citext"
        | "\"char\"" | "inet" | "cidr" | "macaddr" | "interval" | "xml" => Text,
        "date" => Date,
        "time" | "time without time zone" | "time with time zone" | "timetz" => Time,
        "timestamp" | "timestamp without time zone" | "timestamp with time zone" | "timestamptz" => DateTime,
        "uuid" => Uuid,
        "bytea" => Binary,
        _ => return None,
    })
}

fn is_json(name: &str) -> bool {
    matches!(name, "json" | "jsonb")
}

fn type_params_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `character varying(80)`, `numeric(10,2)`, `timestamp(3) with time zone`
    RE.get_or_init(|| Regex::new(r"\(\s*\d+(\s*,\s*\d+)?\s*\)").expect("static regex"))
}

fn array_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `integer[]`, `text[][]`, `integer[3]`, `integer ARRAY`
    RE.get_or_init(|| Regex::new(r"(?i)(\[\d*\]|\s+array(\[\d*\])?)$").expect("static regex"))
}

/// Lowercase, drop length/precision modifiers and surrounding whitespace.
pub fn normalize_type_name(sql_type: &str) -> String {
    let lower = sql_type.trim().to_lowercase();
    let stripped = type_params_re().replace_all(&lower, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Element type of an array spelling, or `None` if not an array.
pub fn array_element_type(sql_type: &str) -> Option<String> {
    let t = sql_type.trim();
    if let Some(m) = array_suffix_re().find(t) {
        return Some(t[..m.start()].trim().to_string());
    }
    // Internal array type names: `_int4`, `_text`.
    t.strip_prefix('_')
        .filter(|rest| !rest.is_empty() && base_scalar(rest).is_some())
        .map(str::to_string)
}

/// Maps SQL types against a fixed table and the enums known to the catalog.
#[derive(Clone, Debug, Default)]
pub struct TypeMapper {
    /// Keyed `schema.name`.
    qualified: HashMap<String, EnumRef>,
    /// Keyed bare name; first enum wins when several schemas share a name.
    bare: HashMap<String, EnumRef>,
}

impl TypeMapper {
    pub fn new(enums: &[EnumDescriptor]) -> Self {
        let mut mapper = TypeMapper::default();
        for e in enums {
            let r = EnumRef {
                schema: e.schema.clone(),
                name: e.name.clone(),
                values: e.values.clone(),
            };
            mapper
                .qualified
                .insert(format!("{}.{}", e.schema.to_lowercase(), e.name.to_lowercase()), r.clone());
            mapper.bare.entry(e.name.to_lowercase()).or_insert(r);
        }
        mapper
    }

    fn lookup_enum(&self, name: &str) -> Option<&EnumRef> {
        let unquoted = name.replace('"', "").to_lowercase();
        if unquoted.contains('.') {
            self.qualified.get(&unquoted)
        } else {
            self.bare.get(&unquoted)
        }
    }

    /// Descriptor for a declared type, without the optional marker. Never fails.
    pub fn descriptor(&self, sql_type: &str, sample: Option<&Value>) -> TypeDescriptor {
        if let Some(elem) = array_element_type(sql_type) {
            return TypeDescriptor::Array(Box::new(self.descriptor(&elem, None)));
        }
        let name = normalize_type_name(sql_type);
        if is_json(&name) {
            return infer_structured(sample);
        }
        if let Some(kind) = base_scalar(&name) {
            return TypeDescriptor::Scalar(kind);
        }
        if let Some(e) = self.lookup_enum(&name) {
            return TypeDescriptor::Enum(e.clone());
        }
        tracing::trace!(sql_type, "unrecognized type, mapping to opaque scalar");
        TypeDescriptor::Scalar(ScalarKind::Opaque)
    }

    pub fn map(&self, sql_type: &str, nullable: bool, sample: Option<&Value>) -> FieldType {
        FieldType::new(self.descriptor(sql_type, sample), nullable)
    }
}

/// Ordered classification of one sample value of a JSON column:
/// absent or null → untyped; sequence → list of the first element's object shape;
/// mapping → object shape; anything else → untyped.
pub fn infer_structured(sample: Option<&Value>) -> TypeDescriptor {
    match sample {
        None | Some(Value::Null) => TypeDescriptor::untyped(),
        Some(Value::Array(items)) => {
            let elem = match items.first() {
                Some(Value::Object(map)) => TypeDescriptor::Structured(object_shape(map)),
                _ => TypeDescriptor::untyped(),
            };
            TypeDescriptor::Array(Box::new(elem))
        }
        Some(Value::Object(map)) => TypeDescriptor::Structured(object_shape(map)),
        Some(_) => TypeDescriptor::untyped(),
    }
}

fn object_shape(map: &serde_json::Map<String, Value>) -> ObjectShape {
    let fields = map
        .iter()
        .map(|(k, v)| (k.clone(), FieldType::new(shallow_kind(v), true)))
        .collect();
    ObjectShape::Object { fields }
}

/// One level only: nested containers stay untyped.
fn shallow_kind(value: &Value) -> TypeDescriptor {
    match value {
        Value::Null => TypeDescriptor::Scalar(ScalarKind::Opaque),
        Value::Bool(_) => TypeDescriptor::Scalar(ScalarKind::Boolean),
        Value::Number(n) if n.is_i64() || n.is_u64() => TypeDescriptor::Scalar(ScalarKind::Integer),
        Value::Number(_) => TypeDescriptor::Scalar(ScalarKind::Float),
        Value::String(_) => TypeDescriptor::Scalar(ScalarKind::Text),
        Value::Array(_) => TypeDescriptor::Array(Box::new(TypeDescriptor::Scalar(ScalarKind::Opaque))),
        Value::Object(_) => TypeDescriptor::untyped(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> TypeMapper {
        TypeMapper::new(&[EnumDescriptor {
            schema: "pharma".into(),
            name: "stock_status".into(),
            values: vec!["in_stock".into(), "low".into(), "out".into()],
        }])
    }

    #[test]
    fn base_types_map_to_scalars() {
        let m = mapper();
        let cases = [
            ("integer", ScalarKind::Integer),
            ("bigint", ScalarKind::Integer),
            ("character varying(255)", ScalarKind::Text),
            ("numeric(10,2)", ScalarKind::Decimal),
            ("double precision", ScalarKind::Float),
            ("boolean", ScalarKind::Boolean),
            ("timestamp(3) with time zone", ScalarKind::DateTime),
            ("date", ScalarKind::Date),
            ("uuid", ScalarKind::Uuid),
            ("bytea", ScalarKind::Binary),
        ];
        for (sql, kind) in cases {
            assert_eq!(m.descriptor(sql, None), TypeDescriptor::Scalar(kind), "{}", sql);
        }
    }

    #[test]
    fn unknown_types_fall_back_without_error() {
        let m = mapper();
        for sql in ["geometry(Point,4326)", "tsvector", "", "public.unknown_type"] {
            assert_eq!(m.descriptor(sql, None), TypeDescriptor::Scalar(ScalarKind::Opaque));
        }
    }

    #[test]
    fn arrays_resolve_element_recursively() {
        let m = mapper();
        assert_eq!(
            m.descriptor("integer[]", None),
            TypeDescriptor::Array(Box::new(TypeDescriptor::Scalar(ScalarKind::Integer)))
        );
        assert_eq!(
            m.descriptor("_text", None),
            TypeDescriptor::Array(Box::new(TypeDescriptor::Scalar(ScalarKind::Text)))
        );
        assert_eq!(
            m.descriptor("text[][]", None),
            TypeDescriptor::Array(Box::new(TypeDescriptor::Array(Box::new(TypeDescriptor::Scalar(
                ScalarKind::Text
            )))))
        );
        match m.descriptor("pharma.stock_status[]", None) {
            TypeDescriptor::Array(inner) => assert!(matches!(*inner, TypeDescriptor::Enum(_))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn enum_values_follow_catalog_order() {
        let m = mapper();
        for sql in ["stock_status", "pharma.stock_status", "\"pharma\".\"stock_status\""] {
            match m.descriptor(sql, None) {
                TypeDescriptor::Enum(e) => assert_eq!(e.values, vec!["in_stock", "low", "out"]),
                other => panic!("{} mapped to {:?}", sql, other),
            }
        }
        assert_eq!(
            m.descriptor("other.stock_status", None),
            TypeDescriptor::Scalar(ScalarKind::Opaque)
        );
    }

    #[test]
    fn nullability_only_sets_optional() {
        let m = mapper();
        let a = m.map("text", true, None);
        let b = m.map("text", false, None);
        assert_eq!(a.ty, b.ty);
        assert!(a.optional && !b.optional);
    }

    #[test]
    fn json_list_sample_infers_list_of_object() {
        let m = mapper();
        let sample = json!([{"item": "aspirin", "qty": 3}]);
        let ft = m.map("jsonb", true, Some(&sample));
        let TypeDescriptor::Array(inner) = ft.ty else {
            panic!("expected list");
        };
        let TypeDescriptor::Structured(ObjectShape::Object { fields }) = *inner else {
            panic!("expected object element");
        };
        assert_eq!(
            fields
                .iter()
                .map(|(k, f)| (k.as_str(), f.ty.clone()))
                .collect::<Vec<_>>(),
            vec![
                ("item", TypeDescriptor::Scalar(ScalarKind::Text)),
                ("qty", TypeDescriptor::Scalar(ScalarKind::Integer)),
            ]
        );
    }

    #[test]
    fn json_mapping_sample_infers_object() {
        let m = mapper();
        let sample = json!({"price": 2.5, "tags": ["a"], "meta": {"x": 1}, "active": true});
        let ft = m.map("json", false, Some(&sample));
        assert!(!ft.optional);
        let TypeDescriptor::Structured(ObjectShape::Object { fields }) = ft.ty else {
            panic!("expected object");
        };
        let kinds: HashMap<_, _> = fields.into_iter().map(|(k, f)| (k, f.ty)).collect();
        assert_eq!(kinds["price"], TypeDescriptor::Scalar(ScalarKind::Float));
        assert_eq!(kinds["active"], TypeDescriptor::Scalar(ScalarKind::Boolean));
        assert_eq!(kinds["meta"], TypeDescriptor::untyped());
        assert!(kinds["tags"].is_array());
    }

    #[test]
    fn json_without_usable_sample_is_untyped() {
        let m = mapper();
        assert_eq!(m.descriptor("jsonb", None), TypeDescriptor::untyped());
        assert_eq!(m.descriptor("jsonb", Some(&Value::Null)), TypeDescriptor::untyped());
        assert_eq!(m.descriptor("jsonb", Some(&json!(42))), TypeDescriptor::untyped());
        assert_eq!(
            m.descriptor("jsonb", Some(&json!([]))),
            TypeDescriptor::Array(Box::new(TypeDescriptor::untyped()))
        );
        assert_eq!(
            m.descriptor("jsonb", Some(&json!([1, 2]))),
            TypeDescriptor::Array(Box::new(TypeDescriptor::untyped()))
        );
    }

    #[test]
    fn accepts_checks_values() {
        let m = mapper();
        assert!(m.map("integer", false, None).accepts(&json!(7)));
        assert!(!m.map("integer", false, None).accepts(&json!("7")));
        assert!(!m.map("integer", false, None).accepts(&Value::Null));
        assert!(m.map("integer", true, None).accepts(&Value::Null));
        assert!(m.map("numeric", false, None).accepts(&json!("12.50")));
        assert!(m.map("date", false, None).accepts(&json!("2024-02-29")));
        assert!(!m.map("date", false, None).accepts(&json!("yesterday")));
        assert!(m.map("timestamptz", false, None).accepts(&json!("2024-01-01T10:00:00Z")));
        assert!(m.map("uuid", false, None).accepts(&json!("67e55044-10b1-426f-9247-bb680e5fe0c8")));
        assert!(m.map("stock_status", false, None).accepts(&json!("low")));
        assert!(!m.map("stock_status", false, None).accepts(&json!("gone")));
        assert!(m.map("integer[]", false, None).accepts(&json!([1, null, 3])));
        assert!(!m.map("integer[]", false, None).accepts(&json!([1, "x"])));
        assert!(m.map("jsonb", false, None).accepts(&json!({"anything": [1]})));
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_type_name(" Character Varying(80) "), "character varying");
        assert_eq!(normalize_type_name("timestamp(6) without time zone"), "timestamp without time zone");
        assert_eq!(array_element_type("integer ARRAY").as_deref(), Some("integer"));
        assert_eq!(array_element_type("integer"), None);
        assert_eq!(array_element_type("_unknown"), None);
    }
}
