use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{comment, CommentModel};
use crate::response::ApiResponse;
use crate::services::comment::CommentService;
use crate::services::vote::VoteService;
use axum::{extract::Path, http::StatusCode, response::IntoResponse, Extension, Json};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCommentRequest {
    /// Reply target on the same post
    pub parent_id: Option<i32>,
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub upvotes_count: i32,
    /// Caller's current vote (1 or -1), null when not voted
    pub user_vote: Option<i16>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<CommentModel> for CommentResponse {
    fn from(c: CommentModel) -> Self {
        Self {
            id: c.id,
            post_id: c.post_id,
            author_id: c.author_id,
            parent_id: c.parent_id,
            content: c.content,
            upvotes_count: c.upvotes_count,
            user_vote: None,
            created_at: c.created_at.to_string(),
            updated_at: c.updated_at.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct CommentTreeNode {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub parent_id: Option<i32>,
    pub content: String,
    pub upvotes_count: i32,
    /// Number of direct replies
    pub replies_count: usize,
    pub user_vote: Option<i16>,
    pub created_at: String,
    pub updated_at: String,
    pub replies: Vec<CommentTreeNode>,
}

impl utoipa::ToSchema for CommentTreeNode {
    fn name() -> std::borrow::Cow<'static, str> {
        "CommentTreeNode".into()
    }
}

impl utoipa::PartialSchema for CommentTreeNode {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        use utoipa::openapi::schema::{ArrayBuilder, ObjectBuilder, Schema, Type};
        utoipa::openapi::RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::Object)
                .property("id", i32::schema())
                .property("post_id", i32::schema())
                .property("author_id", i32::schema())
                .property("parent_id", Option::<i32>::schema())
                .property("content", String::schema())
                .property("upvotes_count", i32::schema())
                .property("replies_count", usize::schema())
                .property("user_vote", Option::<i16>::schema())
                .property("created_at", String::schema())
                .property("updated_at", String::schema())
                .property(
                    "replies",
                    ArrayBuilder::new()
                        .items(utoipa::openapi::Ref::from_schema_name("CommentTreeNode"))
                        .build(),
                )
                .required("id")
                .required("post_id")
                .required("author_id")
                .required("content")
                .required("upvotes_count")
                .required("replies_count")
                .required("created_at")
                .required("updated_at")
                .required("replies")
                .build(),
        ))
    }
}

impl From<CommentModel> for CommentTreeNode {
    fn from(c: CommentModel) -> Self {
        Self {
            id: c.id,
            post_id: c.post_id,
            author_id: c.author_id,
            parent_id: c.parent_id,
            content: c.content,
            upvotes_count: c.upvotes_count,
            replies_count: 0,
            user_vote: None,
            created_at: c.created_at.to_string(),
            updated_at: c.updated_at.to_string(),
            replies: Vec::new(),
        }
    }
}

/// Nest a post's comments under their parents, keeping input order per level.
/// Comments whose parent is not in the input are dropped. `votes` maps comment
/// id to the viewer's polarity.
fn build_comment_tree(
    comments: Vec<CommentModel>,
    votes: &HashMap<i32, i16>,
) -> Vec<CommentTreeNode> {
    let mut by_parent: HashMap<Option<i32>, Vec<CommentModel>> = HashMap::new();
    for comment in comments {
        by_parent.entry(comment.parent_id).or_default().push(comment);
    }

    fn take_level(
        parent: Option<i32>,
        by_parent: &mut HashMap<Option<i32>, Vec<CommentModel>>,
        votes: &HashMap<i32, i16>,
    ) -> Vec<CommentTreeNode> {
        by_parent
            .remove(&parent)
            .unwrap_or_default()
            .into_iter()
            .map(|comment| {
                let id = comment.id;
                let mut node = CommentTreeNode::from(comment);
                node.user_vote = votes.get(&id).copied();
                node.replies = take_level(Some(id), by_parent, votes);
                node.replies_count = node.replies.len();
                node
            })
            .collect()
    }

    take_level(None, &mut by_parent, votes)
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{post_id}/comments",
    params(("post_id" = i32, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comment tree", body = Vec<CommentTreeNode>),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn list_comments(
    Extension(db): Extension<DatabaseConnection>,
    viewer: Option<AuthUser>,
    Path(post_id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let comments = CommentService::new(db.clone()).list_by_post(post_id).await?;

    let ids: Vec<i32> = comments.iter().map(|c| c.id).collect();
    let votes = VoteService::new(db)
        .viewer_votes::<comment::Entity>(viewer.map(|u| u.user_id), &ids)
        .await?;

    Ok(ApiResponse::ok(build_comment_tree(comments, &votes)))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{post_id}/comments",
    security(("jwt_token" = [])),
    params(("post_id" = i32, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Validation error or locked post", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn create_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(post_id): Path<i32>,
    Json(payload): Json<CreateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let comment = CommentService::new(db)
        .create(post_id, &auth_user, payload.parent_id, &payload.content)
        .await?;

    Ok(ApiResponse::ok(CommentResponse::from(comment)).with_status(StatusCode::CREATED))
}

#[utoipa::path(
    put,
    path = "/api/v1/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Comment updated", body = CommentResponse),
        (status = 400, description = "Validation error", body = AppError),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn update_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCommentRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let comment = CommentService::new(db.clone())
        .update(id, &auth_user, &payload.content)
        .await?;

    let votes = VoteService::new(db)
        .viewer_votes::<comment::Entity>(Some(auth_user.user_id), &[comment.id])
        .await?;
    let user_vote = votes.get(&comment.id).copied();

    Ok(ApiResponse::ok(CommentResponse {
        user_vote,
        ..CommentResponse::from(comment)
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteCommentResponse {
    /// Comment plus replies removed
    pub removed: usize,
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted", body = DeleteCommentResponse),
        (status = 403, description = "Not the author", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
) -> AppResult<impl IntoResponse> {
    let removed = CommentService::new(db).delete(id, &auth_user).await?;
    Ok(ApiResponse::with_message(
        DeleteCommentResponse { removed },
        "Comment deleted",
    ))
}
