use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{comment, post, vote::Votable};
use crate::response::ApiResponse;
use crate::services::vote::{CastVote, VoteOutcome, VoteService};
use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    /// 1 for an upvote, -1 for a downvote
    #[serde(default)]
    #[schema(value_type = i16, example = 1)]
    pub value: serde_json::Value,
}

impl VoteRequest {
    /// Only a JSON object is a vote body; arrays and bare scalars are refused.
    fn from_body(body: Result<Json<serde_json::Value>, JsonRejection>) -> AppResult<Self> {
        let Json(body) = body?;
        if !body.is_object() {
            return Err(AppError::Validation(
                "Request body must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(body).map_err(|e| AppError::Validation(e.to_string()))
    }

    /// The submitted value when it is a whole number (`1.0` counts as 1).
    /// Range checking is the ledger's call.
    fn integral_value(&self) -> Option<i16> {
        let whole = self.value.as_i64().or_else(|| {
            self.value
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })?;
        i16::try_from(whole).ok()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteResponse {
    /// "post" or "comment"
    pub target_type: String,
    pub target_id: i32,
    /// Voter's current polarity, 0 after a retraction
    pub value: i16,
    /// Target's net vote total after this call
    pub upvotes_count: i32,
}

impl From<CastVote> for VoteResponse {
    fn from(cast: CastVote) -> Self {
        Self {
            target_type: cast.target_kind.as_str().to_string(),
            target_id: cast.target_id,
            value: cast.value,
            upvotes_count: cast.upvotes_count,
        }
    }
}

async fn cast<T: Votable>(
    db: DatabaseConnection,
    auth_user: &AuthUser,
    target_id: i32,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Response> {
    let payload = VoteRequest::from_body(body)?;
    let cast = VoteService::new(db)
        .cast_vote::<T>(auth_user.user_id, target_id, payload.integral_value())
        .await?;

    let status = match cast.outcome {
        VoteOutcome::Recorded => StatusCode::CREATED,
        VoteOutcome::Changed | VoteOutcome::Removed => StatusCode::OK,
    };
    Ok(ApiResponse::with_message(VoteResponse::from(cast), cast.outcome.message())
        .with_status(status))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/vote",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Post ID")),
    request_body = VoteRequest,
    responses(
        (status = 201, description = "Vote recorded", body = VoteResponse),
        (status = 200, description = "Vote updated or removed", body = VoteResponse),
        (status = 400, description = "Invalid vote value", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Post not found", body = AppError),
    ),
    tag = "votes"
)]
pub async fn vote_post(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Response> {
    cast::<post::Entity>(db, &auth_user, id, body).await
}

#[utoipa::path(
    post,
    path = "/api/v1/comments/{id}/vote",
    security(("jwt_token" = [])),
    params(("id" = i32, Path, description = "Comment ID")),
    request_body = VoteRequest,
    responses(
        (status = 201, description = "Vote recorded", body = VoteResponse),
        (status = 200, description = "Vote updated or removed", body = VoteResponse),
        (status = 400, description = "Invalid vote value", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 404, description = "Comment not found", body = AppError),
    ),
    tag = "votes"
)]
pub async fn vote_comment(
    Extension(db): Extension<DatabaseConnection>,
    auth_user: AuthUser,
    Path(id): Path<i32>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> AppResult<Response> {
    cast::<comment::Entity>(db, &auth_user, id, body).await
}
