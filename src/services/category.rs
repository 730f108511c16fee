use crate::{
    error::{AppError, AppResult},
    models::{category, post, Category, CategoryModel, Post},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Statement,
};
use std::collections::HashMap;

pub struct CategoryService {
    db: DatabaseConnection,
}

impl CategoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<CategoryModel>> {
        let categories = Category::find()
            .order_by_asc(category::Column::Name)
            .all(&self.db)
            .await?;
        Ok(categories)
    }

    /// Number of posts filed under each category that has any.
    pub async fn post_counts(&self) -> AppResult<HashMap<i32, u64>> {
        let rows = self
            .db
            .query_all(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT category_id, COUNT(*) AS count FROM posts \
                    WHERE category_id IS NOT NULL GROUP BY category_id",
            ))
            .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let category_id: i32 = row.try_get_by_index(0)?;
            let count: i64 = row.try_get_by_index(1)?;
            counts.insert(category_id, u64::try_from(count).unwrap_or_default());
        }
        Ok(counts)
    }

    pub async fn post_count(&self, category_id: i32) -> AppResult<u64> {
        let count = Post::find()
            .filter(post::Column::CategoryId.eq(category_id))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<CategoryModel> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn create(
        &self,
        name: &str,
        slug: &str,
        description: &str,
    ) -> AppResult<CategoryModel> {
        let taken = Category::find()
            .filter(
                Condition::any()
                    .add(category::Column::Name.eq(name))
                    .add(category::Column::Slug.eq(slug)),
            )
            .one(&self.db)
            .await?
            .is_some();
        if taken {
            return Err(AppError::Conflict(
                "Category name or slug already exists".to_string(),
            ));
        }

        let new_category = category::ActiveModel {
            name: sea_orm::ActiveValue::Set(name.to_string()),
            slug: sea_orm::ActiveValue::Set(slug.to_string()),
            description: sea_orm::ActiveValue::Set(description.to_string()),
            created_at: sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc()),
            ..Default::default()
        };

        Ok(new_category.insert(&self.db).await?)
    }
}

/// Slugs are lowercase ASCII letters, digits and single dashes.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
