use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use campus_talk::{config, handlers, migration, routes, services, utils};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Auth
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::refresh_token,
        handlers::auth::get_current_user,
        // Users
        handlers::user::get_user,
        handlers::user::update_profile,
        // Categories
        handlers::category::list_categories,
        handlers::category::get_category,
        handlers::category::create_category,
        // Posts
        handlers::post::list_posts,
        handlers::post::trending_posts,
        handlers::post::get_post,
        handlers::post::create_post,
        handlers::post::update_post,
        handlers::post::delete_post,
        handlers::post::pin_post,
        handlers::post::lock_post,
        // Comments
        handlers::comment::list_comments,
        handlers::comment::create_comment,
        handlers::comment::update_comment,
        handlers::comment::delete_comment,
        // Votes
        handlers::vote::vote_post,
        handlers::vote::vote_comment,
    ),
    components(
        schemas(
            campus_talk::response::ApiResponse<serde_json::Value>,
            campus_talk::response::PaginatedResponse<serde_json::Value>,
            campus_talk::error::AppError,
            handlers::auth::RegisterRequest,
            handlers::auth::LoginRequest,
            handlers::auth::RefreshTokenRequest,
            handlers::auth::AuthResponse,
            handlers::auth::TokenResponse,
            handlers::auth::UserResponse,
            handlers::user::PublicUserResponse,
            handlers::user::UpdateProfileRequest,
            handlers::category::CategoryResponse,
            handlers::category::CreateCategoryRequest,
            handlers::post::PostResponse,
            handlers::post::CreatePostRequest,
            handlers::post::UpdatePostRequest,
            handlers::post::PostListQuery,
            handlers::comment::CommentResponse,
            handlers::comment::CommentTreeNode,
            handlers::comment::CreateCommentRequest,
            handlers::comment::UpdateCommentRequest,
            handlers::comment::DeleteCommentResponse,
            handlers::vote::VoteRequest,
            handlers::vote::VoteResponse,
        )
    ),
    modifiers(&JwtSecurity),
    tags(
        (name = "auth", description = "Registration, login and tokens"),
        (name = "users", description = "Profiles"),
        (name = "categories", description = "Post categories"),
        (name = "posts", description = "Discussion posts"),
        (name = "comments", description = "Threaded comments"),
        (name = "votes", description = "Up/down votes on posts and comments"),
    )
)]
struct ApiDoc;

struct JwtSecurity;

impl Modify for JwtSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_talk=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Fail fast on bad configuration
    let (db_config, jwt_config) = validate_config()?;
    utils::jwt::init_jwt_config(jwt_config)?;

    tracing::info!("Starting Campus Talk API v{}...", env!("CARGO_PKG_VERSION"));

    let db = db_config.connect().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    services::bootstrap_admin::ensure_bootstrap_admin(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bootstrap admin account: {e}"))?;

    let app = create_app().layer(Extension(db));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Validate all required configuration at startup.
fn validate_config() -> anyhow::Result<(config::database::DatabaseConfig, config::jwt::JwtConfig)>
{
    let jwt_config = config::jwt::JwtConfig::from_env()?;
    let db_config = config::database::DatabaseConfig::from_env()?;

    let accounts = config::accounts::AccountsConfig::from_env();
    match accounts.allowed_email_domain.as_deref() {
        Some(domain) => tracing::info!("Registration restricted to @{}", domain),
        None => tracing::warn!("ALLOWED_EMAIL_DOMAIN not set, any email domain may register"),
    }

    Ok((db_config, jwt_config))
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(db): Extension<DatabaseConnection>) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Campus Talk API",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
