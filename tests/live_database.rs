//! Tests against a real PostgreSQL. Skipped unless DATABASE_URL is set.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use db_forge::config::{DbConfig, ForgeConfig};
use db_forge::{forge_routes, AppError, AppState, ConnectionManager, ModelCache, SchemaCatalogLoader};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn database_url() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").ok()
}

#[tokio::test]
async fn checkout_past_timeout_is_pool_exhaustion() {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(300))
        .connect(&url)
        .await
        .unwrap();
    let db = ConnectionManager::from_pool(pool);

    let held = db.session().await.unwrap();
    let err = match db.session().await {
        Ok(_) => panic!("second checkout should time out"),
        Err(e) => e,
    };
    assert!(matches!(err, AppError::PoolExhausted));
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.headers().get("retry-after").unwrap(), "1");

    drop(held);
    assert!(db.session().await.is_ok());
}

const FIXTURE: &[&str] = &[
    "DROP SCHEMA IF EXISTS forge_it CASCADE",
    "CREATE SCHEMA forge_it",
    "CREATE TYPE forge_it.status AS ENUM ('active', 'closed')",
    "CREATE TABLE forge_it.pharmacy (
        id serial PRIMARY KEY,
        name varchar(80) NOT NULL,
        status forge_it.status NOT NULL DEFAULT 'active',
        tags text[],
        hours json
    )",
    "CREATE TABLE forge_it.stock (
        pharmacy_id integer REFERENCES forge_it.pharmacy(id),
        medicine text,
        qty integer NOT NULL CHECK (qty >= 0),
        PRIMARY KEY (pharmacy_id, medicine)
    )",
    "CREATE TABLE forge_it.audit_log (message text)",
    "CREATE VIEW forge_it.summary AS
        SELECT p.name, jsonb_agg(jsonb_build_object('medicine', s.medicine, 'qty', s.qty)) AS items
        FROM forge_it.pharmacy p JOIN forge_it.stock s ON s.pharmacy_id = p.id
        GROUP BY p.name",
    "CREATE FUNCTION forge_it.total_qty(pid integer, min_qty integer DEFAULT 0) RETURNS bigint
        LANGUAGE sql AS $$ SELECT COALESCE(sum(qty), 0) FROM forge_it.stock WHERE pharmacy_id = pid AND qty >= min_qty $$",
];

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn crud_views_and_functions_round_trip_through_the_router() {
    let Some(url) = database_url() else {
        eprintln!("DATABASE_URL not set; skipping");
        return;
    };
    let pool = PgPoolOptions::new().max_connections(4).connect(&url).await.unwrap();
    for stmt in FIXTURE {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    let db = ConnectionManager::from_pool(pool);
    let config = ForgeConfig::new(
        DbConfig {
            db_type: "postgresql".into(),
            driver_type: "async".into(),
            host: "localhost".into(),
            port: 5432,
            database: "unused".into(),
            user: "unused".into(),
            password: String::new(),
            echo: false,
            pool: Default::default(),
        },
        vec!["forge_it".into()],
    );
    let cache = ModelCache::load(
        Arc::new(SchemaCatalogLoader::new(db.clone())),
        Arc::new(db.clone()),
        config.catalog_filter(),
    )
    .await
    .unwrap();
    let snapshot = cache.snapshot();
    assert!(snapshot.tables.contains_key("forge_it.stock"));
    assert!(snapshot.views.contains_key("forge_it.summary"));
    assert_eq!(snapshot.enums["forge_it.status"].values, vec!["active", "closed"]);
    let app = forge_routes(AppState::new(db, Arc::new(cache), config));

    let (status, created) = send(&app, "POST", "/forge_it/pharmacy", Some(json!({"name": "Central", "tags": ["24h", "drive \"thru\""]}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].as_i64().unwrap();
    assert_eq!(created["data"]["status"], "active");
    assert_eq!(created["data"]["tags"], json!(["24h", "drive \"thru\""]));

    let (status, _) = send(&app, "POST", "/forge_it/pharmacy", Some(json!({"status": "active"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, "POST", "/forge_it/stock", Some(json!({"pharmacy_id": id, "medicine": "aspirin", "qty": 3}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, dup) = send(&app, "POST", "/forge_it/stock", Some(json!({"pharmacy_id": id, "medicine": "aspirin", "qty": 1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(dup["error"]["code"], "conflict");

    let (status, body) = send(&app, "POST", "/forge_it/stock", Some(json!({"pharmacy_id": id, "medicine": "ibuprofen", "qty": 9999999999u64}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "validation_error");
    let (status, _) = send(&app, "POST", "/forge_it/stock", Some(json!({"pharmacy_id": id, "medicine": "ibuprofen", "qty": -1}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, row) = send(&app, "GET", &format!("/forge_it/stock/{},aspirin", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["data"]["qty"], 3);

    let (status, updated) = send(&app, "PUT", &format!("/forge_it/pharmacy/{}", id), Some(json!({"status": "closed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["status"], "closed");
    assert_eq!(updated["data"]["name"], "Central");

    let (_, listed) = send(&app, "GET", "/forge_it/stock?qty__gte=2&limit=10", None).await;
    assert_eq!(listed["meta"]["count"], 1);
    let (_, listed) = send(&app, "GET", "/forge_it/stock?qty__gt=3", None).await;
    assert_eq!(listed["meta"]["count"], 0);

    let (status, summary) = send(&app, "GET", "/forge_it/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["data"][0]["items"][0]["medicine"], "aspirin");

    // JSON and array columns filter on their text form.
    let (status, listed) = send(&app, "GET", "/forge_it/summary?items=x", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["meta"]["count"], 0);
    let (status, listed) = send(&app, "GET", "/forge_it/pharmacy?hours=x", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["meta"]["count"], 0);
    let (status, listed) = send(&app, "GET", "/forge_it/pharmacy?tags=%7B24h%2C%22drive%20%5C%22thru%5C%22%22%7D", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["meta"]["count"], 1);

    let (status, total) = send(&app, "POST", "/forge_it/fn/total_qty", Some(json!({"pid": id}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(total, json!(3));
    let (status, total) = send(&app, "POST", "/forge_it/fn/total_qty", Some(json!([id, 5]))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(total, json!(0));
    let (status, _) = send(&app, "POST", "/forge_it/fn/total_qty", Some(json!({"min_qty": 1}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, "DELETE", &format!("/forge_it/stock/{},aspirin", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &format!("/forge_it/stock/{},aspirin", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/forge_it/audit_log/1", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
