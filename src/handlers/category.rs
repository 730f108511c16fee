use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::CategoryModel;
use crate::response::ApiResponse;
use crate::services::category::{is_valid_slug, CategoryService};
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Lowercase letters, digits and dashes
    #[validate(length(min = 1, max = 100))]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub posts_count: u64,
}

impl CategoryResponse {
    fn new(c: CategoryModel, posts_count: u64) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            posts_count,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses(
        (status = 200, description = "All categories", body = Vec<CategoryResponse>),
    ),
    tag = "categories"
)]
pub async fn list_categories(
    Extension(db): Extension<DatabaseConnection>,
) -> AppResult<impl IntoResponse> {
    let service = CategoryService::new(db);
    let categories = service.list().await?;
    let counts = service.post_counts().await?;

    let items: Vec<CategoryResponse> = categories
        .into_iter()
        .map(|c| {
            let posts_count = counts.get(&c.id).copied().unwrap_or_default();
            CategoryResponse::new(c, posts_count)
        })
        .collect();
    Ok(ApiResponse::ok(items))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Category", body = CategoryResponse),
        (status = 404, description = "Category not found", body = AppError),
    ),
    tag = "categories"
)]
pub async fn get_category(
    Extension(db): Extension<DatabaseConnection>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let service = CategoryService::new(db);
    let category = service.get_by_slug(&slug).await?;
    let posts_count = service.post_count(category.id).await?;
    Ok(ApiResponse::ok(CategoryResponse::new(category, posts_count)))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    security(("jwt_token" = [])),
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Staff only", body = AppError),
        (status = 409, description = "Name or slug taken", body = AppError),
    ),
    tag = "categories"
)]
pub async fn create_category(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> AppResult<impl IntoResponse> {
    auth_user.require_staff()?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let slug = payload.slug.trim();
    if !is_valid_slug(slug) {
        return Err(AppError::Validation(format!("Invalid slug '{slug}'")));
    }

    let category = CategoryService::new(db)
        .create(payload.name.trim(), slug, payload.description.trim())
        .await?;

    Ok(ApiResponse::ok(CategoryResponse::new(category, 0)).with_status(StatusCode::CREATED))
}
