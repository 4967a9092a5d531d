use chrono::NaiveDateTime;
use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use serde::{Deserialize, Serialize};

use crate::env::AppConfig;
use crate::error::AppError;

use super::token::{SessionClaims, verify_token};
use super::{AccountType, Permission};

/// A registered account. The password digest never leaves the database layer
/// on this type.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_type: AccountType,
    pub image_url: String,
    pub created_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUser {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_digest: String,
    pub account_type: String,
    pub image_url: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(user: DbUser) -> Result<Self, Self::Error> {
        let account_type = AccountType::from_str(&user.account_type)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            account_type,
            image_url: user.image_url,
            created_at: user.created_at,
        })
    }
}

/// User plus stored digest, only handed to the authentication flow.
pub struct UserCredentials {
    pub user: User,
    pub password_digest: String,
}

impl TryFrom<DbUser> for UserCredentials {
    type Error = AppError;

    fn try_from(user: DbUser) -> Result<Self, Self::Error> {
        let password_digest = user.password_digest.clone();
        Ok(Self {
            user: User::try_from(user)?,
            password_digest,
        })
    }
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Identity decoded from a verified session token.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub account_type: AccountType,
}

impl From<SessionClaims> for SessionUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            account_type: claims.account_type,
        }
    }
}

impl SessionUser {
    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.account_type.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                user_id = %self.id,
                account_type = %self.account_type,
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Authorization(format!(
                "This action is not available to {} accounts",
                self.account_type
            )))
        }
    }
}

fn extract_token(request: &Request<'_>) -> Option<String> {
    if let Some(header) = request.headers().get_one("Authorization") {
        if let Some(token) = header.strip_prefix("Bearer ") {
            return Some(token.trim().to_string());
        }
    }

    request
        .cookies()
        .get("token")
        .map(|c| c.value().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("session_guard");
        let _guard = auth_span.enter();

        let config = match request.rocket().state::<AppConfig>() {
            Some(config) => config,
            None => {
                tracing::error!("AppConfig not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let Some(token) = extract_token(request) else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        match verify_token(config, &token) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.id, account_type = %claims.account_type, "Session verified");
                Outcome::Success(SessionUser::from(claims))
            }
            Err(err) => {
                tracing::warn!(error = %err, "Rejected session token");
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}
