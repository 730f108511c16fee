use crate::{
    config::accounts::AccountsConfig,
    error::{AppError, AppResult},
    models::{user, User, UserModel},
    utils::{
        encode_access_token, encode_refresh_token, hash_password,
        jwt::{verify_token, TokenType},
        verify_password,
    },
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

pub struct RegisterInput<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    db: DatabaseConnection,
    config: AccountsConfig,
}

impl AuthService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            config: AccountsConfig::from_env(),
        }
    }

    /// Register a new account and sign it in.
    pub async fn register(&self, input: RegisterInput<'_>) -> AppResult<(UserModel, TokenPair)> {
        let email = normalize_email(input.email);

        if !self.config.email_allowed(&email) {
            let domain = self.config.allowed_email_domain.as_deref().unwrap_or_default();
            return Err(AppError::Validation(format!(
                "Only @{domain} email addresses are allowed"
            )));
        }

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(input.password)?;
        let now = chrono::Utc::now().naive_utc();

        let new_user = user::ActiveModel {
            email: sea_orm::ActiveValue::Set(email),
            password_hash: sea_orm::ActiveValue::Set(password_hash),
            first_name: sea_orm::ActiveValue::Set(input.first_name.trim().to_string()),
            last_name: sea_orm::ActiveValue::Set(input.last_name.trim().to_string()),
            bio: sea_orm::ActiveValue::Set(String::new()),
            role: sea_orm::ActiveValue::Set(user::ROLE_USER.to_string()),
            is_suspended: sea_orm::ActiveValue::Set(false),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let user = new_user.insert(&self.db).await?;
        tracing::info!(user_id = user.id, "user registered");

        let tokens = issue_tokens(user.id)?;
        Ok((user, tokens))
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<(UserModel, TokenPair)> {
        let user = self
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        if user.is_suspended {
            return Err(AppError::Forbidden);
        }

        let tokens = issue_tokens(user.id)?;
        Ok((user, tokens))
    }

    /// Exchange a refresh token for a fresh pair.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let user_id =
            verify_token(refresh_token, TokenType::Refresh).ok_or(AppError::Unauthorized)?;

        let user = User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if user.is_suspended {
            return Err(AppError::Forbidden);
        }

        issue_tokens(user.id)
    }

    pub async fn get_user_by_id(&self, id: i32) -> AppResult<UserModel> {
        User::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserModel>> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(user)
    }
}

fn issue_tokens(user_id: i32) -> AppResult<TokenPair> {
    Ok(TokenPair {
        access_token: encode_access_token(user_id)?,
        refresh_token: encode_refresh_token(user_id)?,
    })
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
