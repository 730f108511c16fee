use crate::{
    error::{AppError, AppResult},
    models::{user, User, UserModel},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Editable profile fields. `None` leaves a field as it is.
#[derive(Debug, Default)]
pub struct ProfileUpdate<'a> {
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub bio: Option<&'a str>,
}

pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// A profile visible to others; suspended accounts read as missing.
    pub async fn get_visible(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .filter(user::Column::IsSuspended.eq(false))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: i32,
        update: ProfileUpdate<'_>,
    ) -> AppResult<UserModel> {
        let existing = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: user::ActiveModel = existing.into();
        if let Some(first_name) = update.first_name {
            active.first_name = sea_orm::ActiveValue::Set(first_name.trim().to_string());
        }
        if let Some(last_name) = update.last_name {
            active.last_name = sea_orm::ActiveValue::Set(last_name.trim().to_string());
        }
        if let Some(bio) = update.bio {
            active.bio = sea_orm::ActiveValue::Set(bio.trim().to_string());
        }
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());

        let updated = active.update(&self.db).await?;
        tracing::info!(user_id, "profile updated");
        Ok(updated)
    }
}
