use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{comment, post, Comment, CommentModel, Post},
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionTrait,
};
use std::collections::{HashMap, HashSet};

pub struct CommentService {
    db: DatabaseConnection,
}

impl CommentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// All comments of a post, oldest first.
    pub async fn list_by_post(&self, post_id: i32) -> AppResult<Vec<CommentModel>> {
        Post::find_by_id(post_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let comments = Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(&self.db)
            .await?;
        Ok(comments)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<CommentModel> {
        Comment::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Insert a comment and bump the post's `comments_count` in one transaction.
    pub async fn create(
        &self,
        post_id: i32,
        actor: &AuthUser,
        parent_id: Option<i32>,
        content: &str,
    ) -> AppResult<CommentModel> {
        let txn = self.db.begin().await?;

        let post = Post::find_by_id(post_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        if post.is_locked && !actor.is_staff() {
            return Err(AppError::Validation("This post is locked.".to_string()));
        }

        if let Some(pid) = parent_id {
            let parent = Comment::find_by_id(pid)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::Validation("Parent comment not found".to_string()))?;
            if parent.post_id != post_id {
                return Err(AppError::Validation(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let now = chrono::Utc::now().naive_utc();
        let new_comment = comment::ActiveModel {
            post_id: sea_orm::ActiveValue::Set(post_id),
            author_id: sea_orm::ActiveValue::Set(actor.user_id),
            parent_id: sea_orm::ActiveValue::Set(parent_id),
            content: sea_orm::ActiveValue::Set(content.to_string()),
            upvotes_count: sea_orm::ActiveValue::Set(0),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };
        let comment = new_comment.insert(&txn).await?;

        adjust_comments_count(&txn, post_id, 1).await?;
        txn.commit().await?;

        tracing::debug!(comment_id = comment.id, post_id, "comment created");
        Ok(comment)
    }

    /// Only the author may edit a comment.
    pub async fn update(&self, id: i32, actor: &AuthUser, content: &str) -> AppResult<CommentModel> {
        let existing = self.get_by_id(id).await?;
        if existing.author_id != actor.user_id {
            return Err(AppError::Forbidden);
        }

        let mut active: comment::ActiveModel = existing.into();
        active.content = sea_orm::ActiveValue::Set(content.to_string());
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        Ok(active.update(&self.db).await?)
    }

    /// Delete a comment with its replies. Returns how many rows went away.
    pub async fn delete(&self, id: i32, actor: &AuthUser) -> AppResult<usize> {
        let txn = self.db.begin().await?;

        let existing = Comment::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;
        if existing.author_id != actor.user_id && !actor.is_staff() {
            return Err(AppError::Forbidden);
        }

        Post::find_by_id(existing.post_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let edges: Vec<(i32, Option<i32>)> = Comment::find()
            .select_only()
            .column(comment::Column::Id)
            .column(comment::Column::ParentId)
            .filter(comment::Column::PostId.eq(existing.post_id))
            .into_tuple()
            .all(&txn)
            .await?;
        let removed = collect_subtree(id, &edges);

        // Replies go with their parent through the FK cascade.
        Comment::delete_by_id(id).exec(&txn).await?;

        let delta = i32::try_from(removed.len())
            .map_err(|_| AppError::Internal(anyhow::anyhow!("comment subtree too large")))?;
        adjust_comments_count(&txn, existing.post_id, -delta).await?;
        txn.commit().await?;

        tracing::info!(
            comment_id = id,
            post_id = existing.post_id,
            removed = removed.len(),
            actor_id = actor.user_id,
            "comment deleted"
        );
        Ok(removed.len())
    }
}

async fn adjust_comments_count(
    txn: &sea_orm::DatabaseTransaction,
    post_id: i32,
    delta: i32,
) -> AppResult<()> {
    post::Entity::update_many()
        .col_expr(
            post::Column::CommentsCount,
            Expr::col(post::Column::CommentsCount).add(delta),
        )
        .filter(post::Column::Id.eq(post_id))
        .exec(txn)
        .await?;
    Ok(())
}

/// Ids of `root` and every comment below it, given `(id, parent_id)` pairs.
pub fn collect_subtree(root: i32, edges: &[(i32, Option<i32>)]) -> Vec<i32> {
    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for &(id, parent) in edges {
        if let Some(parent) = parent {
            children.entry(parent).or_default().push(id);
        }
    }

    let mut seen = HashSet::new();
    let mut stack = vec![root];
    let mut out = Vec::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        out.push(id);
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().copied());
        }
    }
    out
}
