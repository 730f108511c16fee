#![allow(dead_code)]

use campus_talk::models::{vote, Vote};
use reqwest::Client;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Statement,
};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Once,
};
use tokio::sync::Mutex;

static INIT: Once = Once::new();
static MIGRATIONS_RAN: AtomicBool = AtomicBool::new(false);
static USER_COUNTER: AtomicUsize = AtomicUsize::new(0);
static CATEGORY_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Tests in one binary share a database and truncate it on startup.
static DB_LOCK: Mutex<()> = Mutex::const_new(());

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        std::env::remove_var("ALLOWED_EMAIL_DOMAIN");
        let config = campus_talk::config::jwt::JwtConfig::from_env().unwrap();
        let _ = campus_talk::utils::jwt::init_jwt_config(config);
    });
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
    _guard: tokio::sync::MutexGuard<'static, ()>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }
}

pub async fn spawn_app() -> TestApp {
    init_env();
    let guard = DB_LOCK.lock().await;

    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

    let db = sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    if !MIGRATIONS_RAN.swap(true, Ordering::SeqCst) {
        campus_talk::migration::Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
    }

    cleanup_tables(&db).await;

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(campus_talk::routes::create_routes())
        .layer(axum::extract::Extension(db.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
        _guard: guard,
    }
}

async fn cleanup_tables(db: &DatabaseConnection) {
    let tables = ["votes", "comments", "posts", "categories", "users"];

    for table in tables {
        let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", table);
        let _ = db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql,
            ))
            .await;
    }
}

/// Register a user and return (user_id, access_token).
pub async fn create_test_user(app: &TestApp, prefix: &str) -> (i32, String) {
    let counter = USER_COUNTER.fetch_add(1, Ordering::SeqCst);
    let email = format!("{prefix}_{counter}@pucit.edu.pk");

    let resp = app
        .client
        .post(app.url("/auth/register"))
        .json(&serde_json::json!({
            "email": email,
            "password": "test_password_123",
            "first_name": "Test",
            "last_name": prefix,
        }))
        .send()
        .await
        .expect("Failed to register user");

    let status = resp.status();
    let body: Value = resp.json().await.unwrap_or_else(|e| {
        panic!("Failed to parse register response for '{email}': status={status}, error={e}")
    });

    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to register '{email}': status={status}, body={body}");
    }

    let user_id = body["data"]["user"]["id"]
        .as_i64()
        .unwrap_or_else(|| panic!("Response missing user id: {body}")) as i32;
    let token = body["data"]["token"]
        .as_str()
        .unwrap_or_else(|| panic!("Response missing token: {body}"))
        .to_string();
    (user_id, token)
}

/// Give a user a role directly in the database.
pub async fn set_role(db: &DatabaseConnection, user_id: i32, role: &str) {
    db.execute(Statement::from_sql_and_values(
        sea_orm::DatabaseBackend::Postgres,
        "UPDATE users SET role = $1 WHERE id = $2",
        vec![role.into(), user_id.into()],
    ))
    .await
    .expect("Failed to update user role");
}

pub async fn make_admin(db: &DatabaseConnection, user_id: i32) {
    set_role(db, user_id, "admin").await;
}

/// Create a category as `staff_token` and return (id, slug).
pub async fn create_category(app: &TestApp, staff_token: &str) -> (i32, String) {
    let counter = CATEGORY_COUNTER.fetch_add(1, Ordering::SeqCst);
    let slug = format!("category-{counter}");

    let resp = app
        .client
        .post(app.url("/categories"))
        .bearer_auth(staff_token)
        .json(&serde_json::json!({
            "name": format!("Category {counter}"),
            "slug": slug,
            "description": "A test category"
        }))
        .send()
        .await
        .expect("Failed to create category");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    if status != 201 {
        panic!("Failed to create category: status={status}, body={body}");
    }

    (body["data"]["id"].as_i64().unwrap() as i32, slug)
}

/// Create a post as `token` and return its id.
pub async fn create_post(
    app: &TestApp,
    token: &str,
    category_id: Option<i32>,
    title: &str,
) -> i32 {
    let resp = app
        .client
        .post(app.url("/posts"))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "category_id": category_id,
            "title": title,
            "content": "Content"
        }))
        .send()
        .await
        .expect("Failed to create post");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    if status != 201 {
        panic!("Failed to create post: status={status}, body={body}");
    }
    body["data"]["id"].as_i64().unwrap() as i32
}

/// Comment on a post and return the comment id.
pub async fn create_comment(
    app: &TestApp,
    token: &str,
    post_id: i32,
    parent_id: Option<i32>,
) -> i32 {
    let resp = app
        .client
        .post(app.url(&format!("/posts/{post_id}/comments")))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "parent_id": parent_id,
            "content": "A comment"
        }))
        .send()
        .await
        .expect("Failed to create comment");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    if status != 201 {
        panic!("Failed to create comment: status={status}, body={body}");
    }
    body["data"]["id"].as_i64().unwrap() as i32
}

pub async fn get_json(app: &TestApp, path: &str) -> Value {
    app.client
        .get(app.url(path))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// GET with a bearer token.
pub async fn get_json_as(app: &TestApp, token: &str, path: &str) -> Value {
    app.client
        .get(app.url(path))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Stored `(user_id, value)` vote rows whose `column` points at `target_id`.
pub async fn stored_votes(
    db: &DatabaseConnection,
    column: vote::Column,
    target_id: i32,
) -> Vec<(i32, i16)> {
    Vote::find()
        .filter(column.eq(target_id))
        .order_by_asc(vote::Column::UserId)
        .all(db)
        .await
        .expect("Failed to load votes")
        .into_iter()
        .map(|v| (v.user_id, v.value))
        .collect()
}

/// `SUM(value)` over the votes on one post or comment.
pub async fn vote_sum(db: &DatabaseConnection, target_column: &str, target_id: i32) -> i64 {
    let sql = format!(
        "SELECT COALESCE(SUM(value), 0)::BIGINT FROM votes WHERE {target_column} = $1"
    );
    let row = db
        .query_one(Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            sql,
            vec![target_id.into()],
        ))
        .await
        .expect("Failed to sum votes")
        .expect("SUM returned no row");
    row.try_get_by_index(0).unwrap()
}

pub async fn total_votes(db: &DatabaseConnection) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT COUNT(*) FROM votes",
        ))
        .await
        .expect("Failed to count votes")
        .expect("COUNT returned no row");
    row.try_get_by_index(0).unwrap()
}
