use chrono::Utc;
use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{AccountType, DbUser, User};
use crate::error::AppError;
use crate::models::Profile;

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_digest: &'a str,
    pub account_type: AccountType,
    pub image_url: &'a str,
}

#[derive(Debug, Default, Clone)]
pub struct ProfileChanges {
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub about: Option<String>,
    pub contact_number: Option<String>,
}

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_digest, account_type, image_url, created_at";

#[instrument(skip(executor))]
pub async fn find_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<DbUser>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Looking up user by email");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
    ))
    .bind(email)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(executor))]
pub async fn find_user_by_id<'e, E>(executor: E, id: &str) -> Result<Option<DbUser>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(row)
}

#[instrument(skip(executor))]
pub async fn get_user<'e, E>(executor: E, id: &str) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Fetching user by ID");
    match find_user_by_id(executor, id).await? {
        Some(user) => User::try_from(user),
        None => Err(AppError::NotFound(format!("User with id {} not found", id))),
    }
}

#[instrument(skip_all, fields(email = %new_user.email, account_type = %new_user.account_type))]
pub async fn insert_user<'e, E>(executor: E, new_user: &NewUser<'_>) -> Result<User, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Creating user");
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().naive_utc();

    let result = sqlx::query(
        "INSERT INTO users (id, first_name, last_name, email, password_digest, account_type, image_url, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(new_user.first_name)
    .bind(new_user.last_name)
    .bind(new_user.email)
    .bind(new_user.password_digest)
    .bind(new_user.account_type.as_str())
    .bind(new_user.image_url)
    .bind(created_at)
    .execute(executor)
    .await;

    match result {
        Ok(_) => {}
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            return Err(AppError::AlreadyRegistered);
        }
        Err(err) => return Err(err.into()),
    }

    Ok(User {
        id,
        first_name: new_user.first_name.to_string(),
        last_name: new_user.last_name.to_string(),
        email: new_user.email.to_string(),
        account_type: new_user.account_type,
        image_url: new_user.image_url.to_string(),
        created_at,
    })
}

#[instrument(skip(executor))]
pub async fn insert_profile<'e, E>(
    executor: E,
    user_id: &str,
    contact_number: Option<&str>,
) -> Result<Profile, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let id = Uuid::new_v4().to_string();

    sqlx::query("INSERT INTO profiles (id, user_id, contact_number) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(user_id)
        .bind(contact_number)
        .execute(executor)
        .await?;

    Ok(Profile {
        id,
        user_id: user_id.to_string(),
        contact_number: contact_number.map(String::from),
        ..Profile::default()
    })
}

#[instrument(skip(executor))]
pub async fn get_profile<'e, E>(executor: E, user_id: &str) -> Result<Profile, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Profile>(
        "SELECT id, user_id, gender, date_of_birth, about, contact_number
         FROM profiles WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Profile for user {} not found", user_id)))
}

#[instrument(skip(executor, changes))]
pub async fn update_profile<'e, E>(
    executor: E,
    user_id: &str,
    changes: &ProfileChanges,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Updating profile");
    sqlx::query(
        "UPDATE profiles SET
             gender = COALESCE(?, gender),
             date_of_birth = COALESCE(?, date_of_birth),
             about = COALESCE(?, about),
             contact_number = COALESCE(?, contact_number)
         WHERE user_id = ?",
    )
    .bind(changes.gender.as_deref())
    .bind(changes.date_of_birth.as_deref())
    .bind(changes.about.as_deref())
    .bind(changes.contact_number.as_deref())
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(())
}

#[instrument(skip(executor))]
pub async fn update_user_names<'e, E>(
    executor: E,
    user_id: &str,
    first_name: Option<&str>,
    last_name: Option<&str>,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "UPDATE users SET first_name = COALESCE(?, first_name), last_name = COALESCE(?, last_name)
         WHERE id = ?",
    )
    .bind(first_name)
    .bind(last_name)
    .bind(user_id)
    .execute(executor)
    .await?;

    Ok(())
}

#[instrument(skip(executor))]
pub async fn update_user_image<'e, E>(executor: E, user_id: &str, image_url: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Updating display picture");
    sqlx::query("UPDATE users SET image_url = ? WHERE id = ?")
        .bind(image_url)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(())
}

#[instrument(skip_all, fields(user_id = %user_id))]
pub async fn update_user_password<'e, E>(
    executor: E,
    user_id: &str,
    password_digest: &str,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Updating user password");
    let result = sqlx::query("UPDATE users SET password_digest = ? WHERE id = ?")
        .bind(password_digest)
        .bind(user_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    Ok(())
}

#[instrument(skip(executor))]
pub async fn delete_profile<'e, E>(executor: E, user_id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM profiles WHERE user_id = ?")
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(())
}

#[instrument(skip(executor))]
pub async fn delete_user<'e, E>(executor: E, user_id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Deleting user");
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
    }

    Ok(())
}
