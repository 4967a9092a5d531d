use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::env::AppConfig;
use crate::error::AppError;

use super::{AccountType, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub email: String,
    pub id: String,
    pub account_type: AccountType,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub fn issue_token(config: &AppConfig, user: &User) -> Result<IssuedToken, AppError> {
    let now = Utc::now();
    let expires = now + Duration::hours(config.token_ttl_hours);

    let claims = SessionClaims {
        email: user.email.clone(),
        id: user.id.clone(),
        account_type: user.account_type,
        iat: now.timestamp(),
        exp: expires.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("encode session token: {e}")))?;

    Ok(IssuedToken {
        token,
        expires_at: expires.timestamp(),
    })
}

pub fn verify_token(config: &AppConfig, token: &str) -> Result<SessionClaims, AppError> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(data.claims)
}
