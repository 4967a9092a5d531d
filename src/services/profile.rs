use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::auth::{AccountType, User};
use crate::clients::{MediaStore, MediaUpload, delete_quietly};
use crate::database::users::ProfileChanges;
use crate::database::{courses, progress, ratings, users};
use crate::error::AppError;
use crate::models::Profile;
use crate::validation::{not_blank, validate_input};

pub const MAX_PROFILE_IMAGE_BYTES: usize = 2 * 1024 * 1024;
const PROFILE_IMAGE_TYPES: [&str; 2] = ["image/jpeg", "image/png"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    #[serde(flatten)]
    pub user: User,
    pub additional_details: Profile,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(custom(function = "not_blank"))]
    pub first_name: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub about: Option<String>,
    #[validate(length(max = 20, message = "must be at most 20 characters"))]
    pub contact_number: Option<String>,
}

#[instrument(skip(pool))]
pub async fn get_user_details(pool: &Pool<Sqlite>, user_id: &str) -> Result<UserDetails, AppError> {
    let user = users::get_user(pool, user_id).await?;
    let profile = users::get_profile(pool, user_id).await?;
    Ok(UserDetails {
        user,
        additional_details: profile,
    })
}

/// Names live on the user row, the rest on the profile. Both change together.
#[instrument(skip(pool, update))]
pub async fn update_profile(
    pool: &Pool<Sqlite>,
    user_id: &str,
    update: ProfileUpdate,
) -> Result<UserDetails, AppError> {
    validate_input(&update)?;

    let changes = ProfileChanges {
        gender: update.gender,
        date_of_birth: update.date_of_birth,
        about: update.about,
        contact_number: update.contact_number,
    };

    let mut tx = pool.begin().await?;
    users::get_user(&mut *tx, user_id).await?;
    users::update_user_names(
        &mut *tx,
        user_id,
        update.first_name.as_deref().map(str::trim),
        update.last_name.as_deref().map(str::trim),
    )
    .await?;
    users::update_profile(&mut *tx, user_id, &changes).await?;
    tx.commit().await?;

    info!("Profile updated");
    get_user_details(pool, user_id).await
}

pub fn check_profile_image(content_type: Option<&str>, size: usize) -> Result<(), AppError> {
    match content_type {
        Some(ct) if PROFILE_IMAGE_TYPES.contains(&ct) => {}
        _ => {
            return Err(AppError::Validation(
                "Profile image must be a JPEG or PNG file".to_string(),
            ));
        }
    }

    if size > MAX_PROFILE_IMAGE_BYTES {
        return Err(AppError::Validation(
            "Profile image must be at most 2 MiB".to_string(),
        ));
    }

    Ok(())
}

/// Uploads the new picture and points the user at it. The old file is
/// removed afterwards; failing to remove it does not fail the request.
#[instrument(skip(pool, media, image))]
pub async fn update_display_picture(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user_id: &str,
    content_type: Option<&str>,
    image: MediaUpload,
) -> Result<User, AppError> {
    check_profile_image(content_type, image.bytes.len())?;

    let user = users::get_user(pool, user_id).await?;
    let stored = media
        .upload(image)
        .await
        .map_err(|e| AppError::ExternalService(format!("Image upload failed: {}", e)))?;

    if let Err(err) = users::update_user_image(pool, user_id, &stored.secure_url).await {
        delete_quietly(media, &stored.secure_url).await;
        return Err(err);
    }

    delete_quietly(media, &user.image_url).await;

    info!("Display picture updated");
    users::get_user(pool, user_id).await
}

/// Removes the account with its enrollments, reviews and profile. Instructors
/// must delete their courses first.
#[instrument(skip(pool, media))]
pub async fn delete_account(
    pool: &Pool<Sqlite>,
    media: &dyn MediaStore,
    user_id: &str,
) -> Result<(), AppError> {
    let user = users::get_user(pool, user_id).await?;

    let mut tx = pool.begin().await?;

    if user.account_type == AccountType::Instructor {
        let owned = courses::count_courses_by_instructor(&mut *tx, user_id).await?;
        if owned > 0 {
            warn!(owned, "Instructor still owns courses");
            return Err(AppError::Conflict(format!(
                "Delete your {} course(s) before deleting the account",
                owned
            )));
        }
    }

    let enrollments = progress::delete_progress_for_user(&mut *tx, user_id).await?;
    let reviews = ratings::delete_ratings_for_user(&mut *tx, user_id).await?;
    users::delete_profile(&mut *tx, user_id).await?;
    users::delete_user(&mut *tx, user_id).await?;

    tx.commit().await?;

    delete_quietly(media, &user.image_url).await;

    info!(enrollments, reviews, "Account deleted");
    Ok(())
}
