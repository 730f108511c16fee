use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{post, PostModel};
use crate::response::{ApiResponse, PaginatedResponse};
use crate::services::post::{PostFilter, PostOrdering, PostService};
use crate::services::vote::VoteService;
use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePostRequest {
    /// Optional category ID
    pub category_id: Option<i32>,
    /// Post title (1-255 characters)
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostResponse {
    pub id: i32,
    /// Author user ID
    pub author_id: i32,
    pub category_id: Option<i32>,
    pub title: String,
    pub content: String,
    /// Net vote total
    pub upvotes_count: i32,
    pub comments_count: i32,
    pub is_pinned: bool,
    /// Locked posts accept no new comments from non-staff
    pub is_locked: bool,
    /// Caller's current vote (1 or -1), null when anonymous or not voted
    pub user_vote: Option<i16>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<PostModel> for PostResponse {
    fn from(p: PostModel) -> Self {
        Self {
            id: p.id,
            author_id: p.author_id,
            category_id: p.category_id,
            title: p.title,
            content: p.content,
            upvotes_count: p.upvotes_count,
            comments_count: p.comments_count,
            is_pinned: p.is_pinned,
            is_locked: p.is_locked,
            user_vote: None,
            created_at: p.created_at.to_string(),
            updated_at: p.updated_at.to_string(),
        }
    }
}

/// Build responses carrying the viewer's own vote on each post.
async fn with_viewer_votes(
    db: &DatabaseConnection,
    viewer: Option<&AuthUser>,
    posts: Vec<PostModel>,
) -> AppResult<Vec<PostResponse>> {
    let ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
    let votes = VoteService::new(db.clone())
        .viewer_votes::<post::Entity>(viewer.map(|u| u.user_id), &ids)
        .await?;

    Ok(posts
        .into_iter()
        .map(|p| {
            let user_vote = votes.get(&p.id).copied();
            PostResponse {
                user_vote,
                ..PostResponse::from(p)
            }
        })
        .collect())
}

async fn single_with_viewer_vote(
    db: &DatabaseConnection,
    viewer: Option<&AuthUser>,
    post: PostModel,
) -> AppResult<PostResponse> {
    with_viewer_votes(db, viewer, vec![post])
        .await?
        .pop()
        .ok_or(AppError::NotFound)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// new, oldest, popular or trending
    pub ordering: Option<String>,
    pub category_slug: Option<String>,
    pub author_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/posts",
    params(
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
        ("ordering" = Option<String>, Query, description = "new, oldest, popular or trending"),
        ("category_slug" = Option<String>, Query, description = "Filter by category"),
        ("author_id" = Option<i32>, Query, description = "Filter by author"),
    ),
    responses(
        (status = 200, description = "List of posts", body = PaginatedResponse<PostResponse>),
        (status = 400, description = "Unknown ordering", body = AppError),
    ),
    tag = "posts"
)]
pub async fn list_posts(
    Extension(db): Extension<DatabaseConnection>,
    viewer: Option<AuthUser>,
    Query(params): Query<PostListQuery>,
) -> AppResult<impl IntoResponse> {
    let page = params.page.unwrap_or(1).max(1);
    let per_page = params.per_page.unwrap_or(20).clamp(1, 100);
    let ordering: PostOrdering = params.ordering.as_deref().unwrap_or_default().parse()?;

    let filter = PostFilter {
        category_slug: params.category_slug,
        author_id: params.author_id,
    };

    let service = PostService::new(db.clone());
    let (posts, total) = service.list(&filter, ordering, page, per_page).await?;
    let items = with_viewer_votes(&db, viewer.as_ref(), posts).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/trending",
    responses(
        (status = 200, description = "Top 10 trending posts", body = Vec<PostResponse>),
    ),
    tag = "posts"
)]
pub async fn trending_posts(
    Extension(db): Extension<DatabaseConnection>,
    viewer: Option<AuthUser>,
) -> AppResult<impl IntoResponse> {
    let posts = PostService::new(db.clone()).trending().await?;
    let items = with_viewer_votes(&db, viewer.as_ref(), posts).await?;
    Ok(ApiResponse::ok(items))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post details", body = PostResponse),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn get_post(
    Extension(db): Extension<DatabaseConnection>,
    viewer: Option<AuthUser>,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let post = PostService::new(db.clone()).get_by_id(id).await?;
    let response = single_with_viewer_vote(&db, viewer.as_ref(), post).await?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts",
    security(("jwt_token" = [])),
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "posts"
)]
pub async fn create_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = PostService::new(db);
    let post = service
        .create(
            auth_user.user_id,
            payload.category_id,
            payload.title.trim(),
            &payload.content,
        )
        .await?;

    Ok(ApiResponse::ok(PostResponse::from(post)).with_status(StatusCode::CREATED))
}

#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = PostResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn update_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdatePostRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = PostService::new(db.clone());
    let post = service
        .update(id, &auth_user, payload.title.trim(), &payload.content)
        .await?;

    let response = single_with_viewer_vote(&db, Some(&auth_user), post).await?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted", body = String),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "posts"
)]
pub async fn delete_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    PostService::new(db).delete(id, &auth_user).await?;
    Ok(ApiResponse::ok("Post deleted"))
}

#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}/pin",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post pin toggled", body = PostResponse),
        (status = 403, description = "Staff only", body = AppError),
    ),
    tag = "posts"
)]
pub async fn pin_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let post = PostService::new(db.clone()).toggle_pin(id).await?;
    let response = single_with_viewer_vote(&db, Some(&auth_user), post).await?;
    Ok(ApiResponse::ok(response))
}

#[utoipa::path(
    put,
    path = "/api/v1/posts/{id}/lock",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post lock toggled", body = PostResponse),
        (status = 403, description = "Staff only", body = AppError),
    ),
    tag = "posts"
)]
pub async fn lock_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    auth_user.require_staff()?;

    let post = PostService::new(db.clone()).toggle_lock(id).await?;
    let response = single_with_viewer_vote(&db, Some(&auth_user), post).await?;
    Ok(ApiResponse::ok(response))
}
