use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts (created_at DESC)",
        )
        .await?;

        // Backs the popular/trending orderings.
        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_posts_upvotes_count \
             ON posts (upvotes_count DESC, comments_count DESC, created_at DESC)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_comments_post_created \
             ON comments (post_id, created_at)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP INDEX IF EXISTS idx_comments_post_created")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS idx_posts_upvotes_count")
            .await?;
        db.execute_unprepared("DROP INDEX IF EXISTS idx_posts_created_at")
            .await?;

        Ok(())
    }
}
