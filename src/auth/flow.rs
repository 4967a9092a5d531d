//! OTP-gated signup, login and password change.

use chrono::Utc;
use rand::Rng;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::clients::Mailer;
use crate::clients::templates::{
    OTP_SUBJECT, PASSWORD_UPDATED_SUBJECT, name_from_email, otp_email, password_updated_email,
};
use crate::database::{otps, users};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::models::Otp;
use crate::validation::{not_blank, validate_input};

use super::password::{hash_password, verify_password};
use super::token::{IssuedToken, issue_token};
use super::{AccountType, User, UserCredentials};

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SignupRequest {
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
    #[validate(custom(function = "not_blank"))]
    pub confirm_password: String,
    #[validate(required(message = "is required"))]
    pub account_type: Option<AccountType>,
    pub contact_number: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub otp: String,
}

fn generate_otp_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

pub fn default_avatar_url(first_name: &str, last_name: &str) -> String {
    format!(
        "https://api.dicebear.com/5.x/initials/svg?seed={}%20{}",
        first_name.trim(),
        last_name.trim()
    )
}

/// Issues a fresh OTP for an email that has no account yet and mails it.
#[instrument(skip(pool, config, mailer))]
pub async fn request_otp(
    pool: &Pool<Sqlite>,
    config: &AppConfig,
    mailer: &dyn Mailer,
    email: &str,
) -> Result<Otp, AppError> {
    if users::find_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::AlreadyRegistered);
    }

    let code = generate_otp_code();
    let otp = otps::insert_otp(pool, email, &code, config.otp_ttl_minutes).await?;

    mailer
        .send_mail(
            email,
            OTP_SUBJECT,
            &otp_email(&code, &name_from_email(email), config.otp_ttl_minutes),
        )
        .await
        .map_err(|e| AppError::ExternalService(format!("Could not send OTP email: {}", e)))?;

    info!("OTP issued");
    Ok(otp)
}

/// Creates the user and an empty profile, and consumes the email's OTPs, in
/// one transaction.
#[instrument(skip_all, fields(email = %request.email))]
pub async fn signup(
    pool: &Pool<Sqlite>,
    config: &AppConfig,
    request: &SignupRequest,
) -> Result<User, AppError> {
    validate_input(request)?;

    let account_type = request
        .account_type
        .ok_or_else(|| AppError::Validation("accountType: is required".to_string()))?;

    if request.password != request.confirm_password {
        return Err(AppError::Validation(
            "Password and confirm password do not match".to_string(),
        ));
    }

    let email = request.email.trim();

    if users::find_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::AlreadyRegistered);
    }

    let latest = otps::latest_valid_otp(pool, email, Utc::now().naive_utc())
        .await?
        .ok_or(AppError::OtpNotFound)?;

    if latest.code != request.otp.trim() {
        warn!("OTP did not match the most recent code");
        return Err(AppError::OtpMismatch);
    }

    let digest = hash_password(&request.password, config.bcrypt_cost)?;
    let image_url = default_avatar_url(&request.first_name, &request.last_name);
    let contact_number = request
        .contact_number
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let mut tx = pool.begin().await?;

    let user = users::insert_user(
        &mut *tx,
        &users::NewUser {
            first_name: request.first_name.trim(),
            last_name: request.last_name.trim(),
            email,
            password_digest: &digest,
            account_type,
            image_url: &image_url,
        },
    )
    .await?;

    users::insert_profile(&mut *tx, &user.id, contact_number).await?;
    otps::delete_otps_for_email(&mut *tx, email).await?;

    tx.commit().await?;

    info!(user_id = %user.id, "User registered");
    Ok(user)
}

#[instrument(skip(pool, config, password))]
pub async fn login(
    pool: &Pool<Sqlite>,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> Result<(User, IssuedToken), AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let row = users::find_user_by_email(pool, email.trim())
        .await?
        .ok_or(AppError::NotRegistered)?;

    let credentials = UserCredentials::try_from(row)?;

    if !verify_password(password, &credentials.password_digest) {
        warn!("Password did not verify");
        return Err(AppError::BadCredentials);
    }

    let token = issue_token(config, &credentials.user)?;

    info!(user_id = %credentials.user.id, "User logged in");
    Ok((credentials.user, token))
}

/// The new digest is committed before the notification is sent, so a mail
/// failure surfaces as `NotificationFailed` with the password already changed.
#[instrument(skip(pool, config, mailer, old_password, new_password, confirm_password))]
pub async fn change_password(
    pool: &Pool<Sqlite>,
    config: &AppConfig,
    mailer: &dyn Mailer,
    user_id: &str,
    old_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> Result<(), AppError> {
    let row = users::find_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))?;

    let credentials = UserCredentials::try_from(row)?;

    if !verify_password(old_password, &credentials.password_digest) {
        return Err(AppError::BadCredentials);
    }

    if new_password.trim().is_empty() {
        return Err(AppError::Validation("New password must not be blank".to_string()));
    }

    if new_password != confirm_password {
        return Err(AppError::PasswordMismatch);
    }

    let digest = hash_password(new_password, config.bcrypt_cost)?;
    users::update_user_password(pool, user_id, &digest).await?;
    info!("Password changed");

    let user = &credentials.user;
    mailer
        .send_mail(
            &user.email,
            PASSWORD_UPDATED_SUBJECT,
            &password_updated_email(&user.email, &user.full_name()),
        )
        .await
        .map_err(|e| AppError::NotificationFailed(e.to_string()))?;

    Ok(())
}
