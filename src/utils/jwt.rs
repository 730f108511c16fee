use crate::config::jwt::JwtConfig;
use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

static JWT_CONFIG: OnceLock<JwtConfig> = OnceLock::new();

/// Install the signing config. Must be called once at startup.
pub fn init_jwt_config(config: JwtConfig) -> Result<()> {
    JWT_CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("JWT config already initialized"))
}

fn get_config() -> Result<&'static JwtConfig> {
    JWT_CONFIG
        .get()
        .ok_or_else(|| anyhow::anyhow!("JWT config not initialized"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

fn encode_token(user_id: i32, token_type: TokenType) -> Result<String> {
    let config = get_config()?;
    let ttl = match token_type {
        TokenType::Access => config.access_token_expiry,
        TokenType::Refresh => config.refresh_token_expiry,
    };
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + ttl as usize,
        iat: now,
        token_type,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to encode {token_type:?} token: {e}"))
}

pub fn encode_access_token(user_id: i32) -> Result<String> {
    encode_token(user_id, TokenType::Access)
}

pub fn encode_refresh_token(user_id: i32) -> Result<String> {
    encode_token(user_id, TokenType::Refresh)
}

pub fn decode_jwt(token: &str) -> Result<Claims> {
    let config = get_config()?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| anyhow::anyhow!("Failed to decode JWT: {e}"))
}

/// Decode and require a specific token type, yielding the user id.
pub fn verify_token(token: &str, expected: TokenType) -> Option<i32> {
    let claims = decode_jwt(token).ok()?;
    if claims.token_type != expected {
        return None;
    }
    claims.user_id()
}
