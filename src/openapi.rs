//! OpenAPI document: static `/dt` routes plus per-entity schemas and paths from the snapshot.

use crate::config::ForgeInfo;
use crate::handlers::{health, metadata as meta_handlers};
use crate::mapping::{ObjectShape, ScalarKind, TypeDescriptor};
use crate::metadata::{
    CacheStatus, ColumnMetadata, ColumnRef, EnumMetadata, FunctionMetadata, FunctionParamMetadata, HealthStatus,
    ReloadResult, SchemaMetadata, TableMetadata, ViewColumnMetadata, ViewMetadata,
};
use crate::model::{CacheSnapshot, Field, Shape};
use crate::routes::{EntityKind, Operation, RouteBinding};
use utoipa::openapi::path::{HttpMethod, OperationBuilder, ParameterBuilder, ParameterIn};
use utoipa::openapi::request_body::RequestBodyBuilder;
use utoipa::openapi::schema::{Array, KnownFormat, ObjectBuilder, Schema, SchemaFormat, SchemaType, Type};
use utoipa::openapi::{Components, ContactBuilder, ContentBuilder, Ref, RefOr, Required, ResponseBuilder};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::ping,
        health::cache_status,
        health::clear_cache,
        meta_handlers::get_schemas,
        meta_handlers::get_tables,
        meta_handlers::get_views,
        meta_handlers::get_enums,
        meta_handlers::get_functions
    ),
    components(schemas(
        HealthStatus,
        CacheStatus,
        ReloadResult,
        ColumnRef,
        ColumnMetadata,
        TableMetadata,
        SchemaMetadata,
        ViewColumnMetadata,
        ViewMetadata,
        EnumMetadata,
        FunctionParamMetadata,
        FunctionMetadata
    )),
    tags(
        (name = "metadata", description = "Catalog metadata from the model cache"),
        (name = "operational", description = "Health and cache control")
    )
)]
pub struct MetadataApi;

fn boxed(s: Schema) -> RefOr<Schema> {
    RefOr::T(s)
}

fn typed(t: Type) -> ObjectBuilder {
    ObjectBuilder::new().schema_type(SchemaType::Type(t))
}

fn formatted(t: Type, f: KnownFormat) -> Schema {
    Schema::Object(typed(t).format(Some(SchemaFormat::KnownFormat(f))).build())
}

fn scalar_schema(kind: ScalarKind) -> Schema {
    match kind {
        ScalarKind::Integer => formatted(Type::Integer, KnownFormat::Int64),
        ScalarKind::Float => formatted(Type::Number, KnownFormat::Double),
        ScalarKind::Decimal => Schema::Object(typed(Type::Number).build()),
        ScalarKind::Boolean => Schema::Object(typed(Type::Boolean).build()),
        ScalarKind::Text => Schema::Object(typed(Type::String).build()),
        ScalarKind::Date => formatted(Type::String, KnownFormat::Date),
        ScalarKind::Time => Schema::Object(typed(Type::String).description(Some("time of day")).build()),
        ScalarKind::DateTime => formatted(Type::String, KnownFormat::DateTime),
        ScalarKind::Uuid => formatted(Type::String, KnownFormat::Uuid),
        ScalarKind::Binary => formatted(Type::String, KnownFormat::Binary),
        ScalarKind::Opaque => Schema::Object(ObjectBuilder::new().schema_type(SchemaType::AnyValue).build()),
    }
}

/// JSON Schema for one type descriptor.
pub fn type_schema(ty: &TypeDescriptor) -> Schema {
    match ty {
        TypeDescriptor::Scalar(kind) => scalar_schema(*kind),
        TypeDescriptor::Enum(e) => Schema::Object(
            typed(Type::String)
                .enum_values(Some(e.values.clone()))
                .description(Some(format!("{}.{}", e.schema, e.name)))
                .build(),
        ),
        TypeDescriptor::Array(inner) => Schema::Array(Array::new(boxed(type_schema(inner)))),
        TypeDescriptor::Structured(ObjectShape::Untyped) => Schema::Object(typed(Type::Object).build()),
        TypeDescriptor::Structured(ObjectShape::Object { fields }) => {
            let mut obj = typed(Type::Object);
            for (name, ft) in fields {
                obj = obj.property(name.clone(), boxed(type_schema(&ft.ty)));
                if !ft.optional {
                    obj = obj.required(name.clone());
                }
            }
            Schema::Object(obj.build())
        }
    }
}

/// Object schema of a shape; `required` picks which fields are mandatory.
pub fn shape_schema(shape: &Shape, required: impl Fn(&Field) -> bool) -> Schema {
    let mut obj = typed(Type::Object).title(Some(shape.name.clone()));
    for field in &shape.fields {
        obj = obj.property(field.name.clone(), boxed(type_schema(&field.ty.ty)));
        if required(field) {
            obj = obj.required(field.name.clone());
        }
    }
    Schema::Object(obj.build())
}

fn reference(name: &str) -> RefOr<Schema> {
    RefOr::Ref(Ref::from_schema_name(name))
}

/// `{ "data": ..., "meta": { "count": n } }` or `{ "data": ... }`.
fn envelope(data: RefOr<Schema>, many: bool) -> RefOr<Schema> {
    let mut obj = typed(Type::Object);
    if many {
        let meta = typed(Type::Object)
            .property("count", boxed(Schema::Object(typed(Type::Integer).build())))
            .required("count")
            .build();
        obj = obj
            .property("data", boxed(Schema::Array(Array::new(data))))
            .property("meta", boxed(Schema::Object(meta)))
            .required("meta");
    } else {
        obj = obj.property("data", data);
    }
    boxed(Schema::Object(obj.required("data").build()))
}

fn json_body(schema: RefOr<Schema>) -> utoipa::openapi::request_body::RequestBody {
    RequestBodyBuilder::new()
        .content("application/json", ContentBuilder::new().schema(Some(schema)).build())
        .required(Some(Required::True))
        .build()
}

fn json_response(description: &str, schema: RefOr<Schema>) -> utoipa::openapi::Response {
    ResponseBuilder::new()
        .description(description)
        .content("application/json", ContentBuilder::new().schema(Some(schema)).build())
        .build()
}

fn query_param(name: &str, schema: Schema) -> utoipa::openapi::path::Parameter {
    ParameterBuilder::new()
        .name(name)
        .parameter_in(ParameterIn::Query)
        .required(Required::False)
        .schema(Some(boxed(schema)))
        .build()
}

fn paging_params() -> Vec<utoipa::openapi::path::Parameter> {
    vec![
        query_param("limit", Schema::Object(typed(Type::Integer).description(Some("default 100, max 1000")).build())),
        query_param("offset", Schema::Object(typed(Type::Integer).build())),
    ]
}

fn http_method(op: Operation) -> HttpMethod {
    match op {
        Operation::List | Operation::Read => HttpMethod::Get,
        Operation::Create | Operation::Call => HttpMethod::Post,
        Operation::Update => HttpMethod::Put,
        Operation::Delete => HttpMethod::Delete,
    }
}

fn operation_for(binding: &RouteBinding) -> utoipa::openapi::path::Operation {
    let key = &binding.key;
    let schema = key.split_once('.').map_or(key.as_str(), |(s, _)| s);
    let op = OperationBuilder::new()
        .operation_id(Some(format!("{}_{}", binding.operation.as_str(), key.replace('.', "_"))))
        .tag(schema);
    let op = match (binding.kind, binding.operation) {
        (EntityKind::Table, Operation::List) => op
            .summary(Some(format!("List {}", key)))
            .parameters(Some(paging_params()))
            .response("200", json_response("Rows", envelope(reference(&format!("{}.persistence", key)), true))),
        (EntityKind::Table, Operation::Create) => op
            .summary(Some(format!("Create {}", key)))
            .request_body(Some(json_body(reference(&format!("{}.validation", key)))))
            .response("201", json_response("Created row", envelope(reference(&format!("{}.persistence", key)), false)))
            .response("409", ResponseBuilder::new().description("Constraint violation").build())
            .response("422", ResponseBuilder::new().description("Validation error").build()),
        (EntityKind::Table, operation) => {
            let id = ParameterBuilder::new()
                .name("id")
                .parameter_in(ParameterIn::Path)
                .required(Required::True)
                .description(Some("Primary key; comma-separated for composite keys"))
                .schema(Some(boxed(Schema::Object(typed(Type::String).build()))))
                .build();
            let op = op
                .summary(Some(format!("{} {}", operation.as_str(), key)))
                .parameter(id)
                .response("404", ResponseBuilder::new().description("No such row").build());
            match operation {
                Operation::Update => op
                    .request_body(Some(json_body(reference(&format!("{}.validation", key)))))
                    .response("200", json_response("Updated row", envelope(reference(&format!("{}.persistence", key)), false))),
                Operation::Delete => op.response("204", ResponseBuilder::new().description("Deleted").build()),
                _ => op.response("200", json_response("Row", envelope(reference(&format!("{}.persistence", key)), false))),
            }
        }
        (EntityKind::View, _) => op
            .summary(Some(format!("Read {}", key)))
            .parameters(Some(paging_params()))
            .response("200", json_response("Rows", envelope(reference(&format!("{}.response", key)), true))),
        (EntityKind::Function, _) => op
            .summary(Some(format!("Call {}", key)))
            .request_body(Some(json_body(reference(&format!("{}.params", key)))))
            .response("200", json_response("Function result", boxed(scalar_schema(ScalarKind::Opaque)))),
    };
    op.build()
}

/// Build the full document for one snapshot.
pub fn document(snapshot: &CacheSnapshot, info: &ForgeInfo) -> utoipa::openapi::OpenApi {
    let mut doc = MetadataApi::openapi();
    doc.info.title = info.project_name.clone();
    doc.info.version = info.version.clone();
    doc.info.description = info.description.clone();
    if let Some(author) = &info.author {
        doc.info.contact = Some(ContactBuilder::new().name(Some(author.clone())).build());
    }

    let components = doc.components.get_or_insert_with(Components::new);
    for t in snapshot.tables.values() {
        let v = &t.models.validation;
        components
            .schemas
            .insert(v.name.clone(), boxed(shape_schema(v, |f| f.required && !f.has_default)));
        let p = &t.models.persistence;
        components.schemas.insert(p.name.clone(), boxed(shape_schema(p, |f| !f.ty.optional)));
    }
    for v in snapshot.views.values() {
        components.schemas.insert(v.query.name.clone(), boxed(shape_schema(&v.query, |_| false)));
        components
            .schemas
            .insert(v.response.name.clone(), boxed(shape_schema(&v.response, |f| !f.ty.optional)));
    }
    for f in snapshot.functions.values() {
        components.schemas.insert(f.params.name.clone(), boxed(shape_schema(&f.params, |p| p.required)));
    }

    for binding in snapshot.routes.bindings() {
        let mut op = operation_for(binding);
        // View filters are every column of the query shape.
        if binding.kind == EntityKind::View {
            if let Some(view) = snapshot.views.get(&binding.key) {
                let params = op.parameters.get_or_insert_with(Vec::new);
                for field in &view.query.fields {
                    params.push(query_param(&field.name, type_schema(&field.ty.ty)));
                }
            }
        }
        doc.paths.add_path_operation(&binding.path, vec![http_method(binding.operation)], op);
    }
    doc
}
