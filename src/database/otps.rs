use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Otp;

#[instrument(skip(executor, code))]
pub async fn insert_otp<'e, E>(
    executor: E,
    email: &str,
    code: &str,
    ttl_minutes: i64,
) -> Result<Otp, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Storing OTP");
    let now = Utc::now().naive_utc();
    let otp = Otp {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        code: code.to_string(),
        created_at: now,
        expires_at: now + Duration::minutes(ttl_minutes),
    };

    sqlx::query("INSERT INTO otps (id, email, code, created_at, expires_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&otp.id)
        .bind(&otp.email)
        .bind(&otp.code)
        .bind(otp.created_at)
        .bind(otp.expires_at)
        .execute(executor)
        .await?;

    Ok(otp)
}

/// Newest unexpired OTP for `email`. Older codes are never consulted.
#[instrument(skip(executor))]
pub async fn latest_valid_otp<'e, E>(
    executor: E,
    email: &str,
    now: NaiveDateTime,
) -> Result<Option<Otp>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Otp>(
        "SELECT id, email, code, created_at, expires_at FROM otps
         WHERE email = ? AND expires_at > ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT 1",
    )
    .bind(email)
    .bind(now)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(executor))]
pub async fn delete_otps_for_email<'e, E>(executor: E, email: &str) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM otps WHERE email = ?")
        .bind(email)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip(executor))]
pub async fn delete_expired_otps<'e, E>(executor: E, now: NaiveDateTime) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM otps WHERE expires_at <= ?")
        .bind(now)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
