use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{category, post, Category, Post, PostModel},
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use std::str::FromStr;

pub const TRENDING_LIMIT: u64 = 10;

/// Listing orders accepted by `GET /posts?ordering=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostOrdering {
    /// Pinned first, then newest.
    #[default]
    New,
    Oldest,
    /// Highest vote total first.
    Popular,
    /// Vote total, then comment count, then recency.
    Trending,
}

impl FromStr for PostOrdering {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "new" | "-created_at" => Ok(Self::New),
            "oldest" | "created_at" => Ok(Self::Oldest),
            "popular" => Ok(Self::Popular),
            "trending" => Ok(Self::Trending),
            other => Err(AppError::Validation(format!(
                "Unknown ordering '{other}', expected new, oldest, popular or trending"
            ))),
        }
    }
}

impl PostOrdering {
    fn apply(self, query: Select<Post>) -> Select<Post> {
        match self {
            Self::New => query
                .order_by_desc(post::Column::IsPinned)
                .order_by_desc(post::Column::CreatedAt),
            Self::Oldest => query.order_by_asc(post::Column::CreatedAt),
            Self::Popular => query
                .order_by_desc(post::Column::UpvotesCount)
                .order_by_desc(post::Column::CreatedAt),
            Self::Trending => query
                .order_by_desc(post::Column::UpvotesCount)
                .order_by_desc(post::Column::CommentsCount)
                .order_by_desc(post::Column::CreatedAt),
        }
        // Stable tiebreak for pagination.
        .order_by_desc(post::Column::Id)
    }
}

#[derive(Debug, Default, Clone)]
pub struct PostFilter {
    pub category_slug: Option<String>,
    pub author_id: Option<i32>,
}

pub struct PostService {
    db: DatabaseConnection,
}

impl PostService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        filter: &PostFilter,
        ordering: PostOrdering,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<PostModel>, u64)> {
        let mut query = Post::find();

        if let Some(slug) = filter.category_slug.as_deref() {
            let Some(category) = Category::find()
                .filter(category::Column::Slug.eq(slug))
                .one(&self.db)
                .await?
            else {
                return Ok((Vec::new(), 0));
            };
            query = query.filter(post::Column::CategoryId.eq(category.id));
        }

        if let Some(author_id) = filter.author_id {
            query = query.filter(post::Column::AuthorId.eq(author_id));
        }

        let paginator = ordering.apply(query).paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let posts = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((posts, total))
    }

    pub async fn trending(&self) -> AppResult<Vec<PostModel>> {
        let posts = PostOrdering::Trending
            .apply(Post::find())
            .limit(TRENDING_LIMIT)
            .all(&self.db)
            .await?;
        Ok(posts)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<PostModel> {
        Post::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn create(
        &self,
        author_id: i32,
        category_id: Option<i32>,
        title: &str,
        content: &str,
    ) -> AppResult<PostModel> {
        if let Some(category_id) = category_id {
            Category::find_by_id(category_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| AppError::Validation("Unknown category".to_string()))?;
        }

        let now = chrono::Utc::now().naive_utc();

        let new_post = post::ActiveModel {
            author_id: sea_orm::ActiveValue::Set(author_id),
            category_id: sea_orm::ActiveValue::Set(category_id),
            title: sea_orm::ActiveValue::Set(title.to_string()),
            content: sea_orm::ActiveValue::Set(content.to_string()),
            upvotes_count: sea_orm::ActiveValue::Set(0),
            comments_count: sea_orm::ActiveValue::Set(0),
            is_pinned: sea_orm::ActiveValue::Set(false),
            is_locked: sea_orm::ActiveValue::Set(false),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let post = new_post.insert(&self.db).await?;
        tracing::info!(post_id = post.id, author_id, "post created");
        Ok(post)
    }

    pub async fn update(
        &self,
        id: i32,
        actor: &AuthUser,
        title: &str,
        content: &str,
    ) -> AppResult<PostModel> {
        let existing = self.get_by_id(id).await?;
        ensure_can_moderate(&existing, actor)?;

        // Counters stay untouched: they belong to the vote ledger and comments.
        let mut active: post::ActiveModel = existing.into();
        active.title = sea_orm::ActiveValue::Set(title.to_string());
        active.content = sea_orm::ActiveValue::Set(content.to_string());
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        Ok(active.update(&self.db).await?)
    }

    pub async fn delete(&self, id: i32, actor: &AuthUser) -> AppResult<()> {
        let existing = self.get_by_id(id).await?;
        ensure_can_moderate(&existing, actor)?;

        Post::delete_by_id(id).exec(&self.db).await?;
        tracing::info!(post_id = id, actor_id = actor.user_id, "post deleted");
        Ok(())
    }

    pub async fn toggle_pin(&self, id: i32) -> AppResult<PostModel> {
        self.toggle_flag(id, post::Column::IsPinned).await
    }

    pub async fn toggle_lock(&self, id: i32) -> AppResult<PostModel> {
        self.toggle_flag(id, post::Column::IsLocked).await
    }

    /// Negate a boolean column in one statement so concurrent toggles each
    /// take effect.
    async fn toggle_flag(&self, id: i32, flag: post::Column) -> AppResult<PostModel> {
        let updated = Post::update_many()
            .col_expr(flag, Expr::col(flag).not())
            .filter(post::Column::Id.eq(id))
            .exec_with_returning(&self.db)
            .await?;
        let post = updated.into_iter().next().ok_or(AppError::NotFound)?;
        tracing::info!(post_id = id, ?flag, "post flag toggled");
        Ok(post)
    }
}

/// Authors manage their own posts; staff manage everyone's.
fn ensure_can_moderate(post: &PostModel, actor: &AuthUser) -> AppResult<()> {
    if post.author_id == actor.user_id || actor.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}
