use crate::config::rate_limit::{RateLimitConfig, RateLimitRule, RouteGroup};
use crate::handlers;
use crate::middleware::auth::{auth_middleware, optional_auth_middleware};
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    Router::new().nest("/api/v1", api_routes())
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let auth = auth_routes(&rate_limit_config);
    let public_read = public_read_routes(&rate_limit_config)
        .layer(middleware::from_fn(optional_auth_middleware));
    let protected =
        protected_routes(&rate_limit_config).layer(middleware::from_fn(auth_middleware));

    auth.merge(public_read).merge(protected)
}

/// Unauthenticated account routes.
fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/register", routing::post(handlers::auth::register))
        .route("/auth/login", routing::post(handlers::auth::login))
        .route(
            "/auth/refresh",
            routing::post(handlers::auth::refresh_token),
        );

    with_optional_rate_limit(router, config, RouteGroup::Auth)
}

/// Public GETs. A bearer token is optional and personalises `user_vote`.
fn public_read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        // Users
        .route("/users/{id}", routing::get(handlers::user::get_user))
        // Categories
        .route(
            "/categories",
            routing::get(handlers::category::list_categories),
        )
        .route(
            "/categories/{slug}",
            routing::get(handlers::category::get_category),
        )
        // Posts
        .route("/posts", routing::get(handlers::post::list_posts))
        .route(
            "/posts/trending",
            routing::get(handlers::post::trending_posts),
        )
        .route("/posts/{id}", routing::get(handlers::post::get_post))
        // Comments
        .route(
            "/posts/{post_id}/comments",
            routing::get(handlers::comment::list_comments),
        );

    with_optional_rate_limit(router, config, RouteGroup::PublicRead)
}

/// Everything that needs a bearer token.
fn protected_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        // Auth
        .route(
            "/auth/me",
            routing::get(handlers::auth::get_current_user).put(handlers::user::update_profile),
        )
        // Categories (staff only - checked in handler)
        .route(
            "/categories",
            routing::post(handlers::category::create_category),
        )
        // Posts
        .route("/posts", routing::post(handlers::post::create_post))
        .route(
            "/posts/{id}",
            routing::put(handlers::post::update_post).delete(handlers::post::delete_post),
        )
        .route("/posts/{id}/pin", routing::put(handlers::post::pin_post))
        .route("/posts/{id}/lock", routing::put(handlers::post::lock_post))
        // Votes
        .route("/posts/{id}/vote", routing::post(handlers::vote::vote_post))
        .route(
            "/comments/{id}/vote",
            routing::post(handlers::vote::vote_comment),
        )
        // Comments
        .route(
            "/posts/{post_id}/comments",
            routing::post(handlers::comment::create_comment),
        )
        .route(
            "/comments/{id}",
            routing::put(handlers::comment::update_comment)
                .delete(handlers::comment::delete_comment),
        );

    with_optional_rate_limit(router, config, RouteGroup::Protected)
}

fn with_optional_rate_limit(router: Router, config: &RateLimitConfig, group: RouteGroup) -> Router {
    if !config.enabled {
        return router;
    }

    let RateLimitRule {
        per_second,
        burst_size,
    } = config.rule(group);

    let Some(governor_conf) = GovernorConfigBuilder::default()
        .per_second(per_second)
        .burst_size(burst_size)
        .finish()
    else {
        tracing::warn!(?group, "Invalid rate limit rule, limiter disabled for group");
        return router;
    };

    router.layer(GovernorLayer::new(governor_conf))
}
