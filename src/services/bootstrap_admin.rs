use crate::error::AppResult;
use crate::models::{user, User};
use crate::services::auth::normalize_email;
use crate::utils::hash_password;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::env;

#[derive(Debug, Clone)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: String,
}

impl BootstrapAdminConfig {
    /// Present only when both variables are set.
    pub fn from_env() -> Option<Self> {
        Some(Self {
            email: normalize_email(&env::var("BOOTSTRAP_ADMIN_EMAIL").ok()?),
            password: env::var("BOOTSTRAP_ADMIN_PASSWORD").ok()?,
        })
    }
}

/// Make sure at least one admin exists:
/// - any admin already present: nothing to do
/// - configured email already registered: promote it
/// - otherwise: create the account as admin
pub async fn ensure_bootstrap_admin(db: &DatabaseConnection) -> AppResult<()> {
    let Some(cfg) = BootstrapAdminConfig::from_env() else {
        return Ok(());
    };

    let admin_exists = User::find()
        .filter(user::Column::Role.eq(user::ROLE_ADMIN))
        .one(db)
        .await?
        .is_some();
    if admin_exists {
        return Ok(());
    }

    let now = chrono::Utc::now().naive_utc();

    let existing = User::find()
        .filter(user::Column::Email.eq(cfg.email.as_str()))
        .one(db)
        .await?;

    if let Some(existing) = existing {
        let mut active: user::ActiveModel = existing.into();
        active.role = sea_orm::ActiveValue::Set(user::ROLE_ADMIN.to_string());
        active.updated_at = sea_orm::ActiveValue::Set(now);
        active.update(db).await?;
        tracing::info!(email = %cfg.email, "promoted existing user to admin");
        return Ok(());
    }

    let new_admin = user::ActiveModel {
        email: sea_orm::ActiveValue::Set(cfg.email.clone()),
        password_hash: sea_orm::ActiveValue::Set(hash_password(&cfg.password)?),
        first_name: sea_orm::ActiveValue::Set("Admin".to_string()),
        last_name: sea_orm::ActiveValue::Set(String::new()),
        bio: sea_orm::ActiveValue::Set(String::new()),
        role: sea_orm::ActiveValue::Set(user::ROLE_ADMIN.to_string()),
        is_suspended: sea_orm::ActiveValue::Set(false),
        created_at: sea_orm::ActiveValue::Set(now),
        updated_at: sea_orm::ActiveValue::Set(now),
        ..Default::default()
    };
    new_admin.insert(db).await?;
    tracing::info!(email = %cfg.email, "created bootstrap admin");

    Ok(())
}
