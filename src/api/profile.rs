use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{FromForm, Route, State, delete, get, put, routes};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, SessionUser, User};
use crate::clients::MediaService;
use crate::env::AppConfig;
use crate::error::AppError;
use crate::services::profile::{self, ProfileUpdate, UserDetails};
use crate::services::projection::{self, EnrolledCourse, InstructorCourseStats};

use super::response::ApiResponse;
use super::{ApiResult, content_type_of, read_upload};

#[derive(FromForm)]
pub struct DisplayPictureForm<'r> {
    #[field(name = "displayPicture")]
    display_picture: Option<TempFile<'r>>,
}

#[get("/profile/getUserDetails")]
pub async fn get_user_details(user: SessionUser, db: &State<Pool<Sqlite>>) -> ApiResult<UserDetails> {
    user.require_permission(Permission::ViewOwnProfile)?;
    let details = profile::get_user_details(db.inner(), &user.id).await?;
    Ok(ApiResponse::ok("User data fetched successfully", details))
}

#[put("/profile/updateProfile", data = "<update>")]
pub async fn update_profile(
    user: SessionUser,
    update: Json<ProfileUpdate>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<UserDetails> {
    user.require_permission(Permission::EditOwnProfile)?;
    let details = profile::update_profile(db.inner(), &user.id, update.into_inner()).await?;
    Ok(ApiResponse::ok("Profile updated successfully", details))
}

#[put("/profile/updateDisplayPicture", data = "<form>")]
pub async fn update_display_picture(
    user: SessionUser,
    form: Form<DisplayPictureForm<'_>>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    media: &State<MediaService>,
) -> ApiResult<User> {
    user.require_permission(Permission::EditOwnProfile)?;

    let file = form
        .display_picture
        .as_ref()
        .ok_or_else(|| AppError::Validation("displayPicture: file is required".to_string()))?;

    let content_type = content_type_of(file);
    profile::check_profile_image(content_type.as_deref(), file.len() as usize)?;
    let upload = read_upload(file, &config.media_folder).await?;

    let updated = profile::update_display_picture(
        db.inner(),
        media.inner().as_ref(),
        &user.id,
        content_type.as_deref(),
        upload,
    )
    .await?;

    Ok(ApiResponse::ok("Image updated successfully", updated))
}

#[delete("/profile/deleteProfile")]
pub async fn delete_profile(
    user: SessionUser,
    db: &State<Pool<Sqlite>>,
    media: &State<MediaService>,
) -> ApiResult<()> {
    user.require_permission(Permission::EditOwnProfile)?;
    profile::delete_account(db.inner(), media.inner().as_ref(), &user.id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}

#[get("/profile/getEnrolledCourses")]
pub async fn get_enrolled_courses(
    user: SessionUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<EnrolledCourse>> {
    user.require_permission(Permission::TrackProgress)?;
    let mut conn = db.acquire().await?;
    let courses = projection::enrolled_courses(&mut conn, &user.id).await?;
    Ok(ApiResponse::ok("Enrolled courses fetched successfully", courses))
}

#[get("/profile/instructorDashboard")]
pub async fn instructor_dashboard(
    user: SessionUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<InstructorCourseStats>> {
    user.require_permission(Permission::ViewInstructorDashboard)?;
    let mut conn = db.acquire().await?;
    let stats = projection::instructor_dashboard(&mut conn, &user.id).await?;
    Ok(ApiResponse::ok("Instructor dashboard fetched successfully", stats))
}

pub fn routes() -> Vec<Route> {
    routes![
        get_user_details,
        update_profile,
        update_display_picture,
        delete_profile,
        get_enrolled_courses,
        instructor_dashboard
    ]
}
