use rocket::serde::json::Json;
use rocket::{Route, State, delete, post, routes};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, SessionUser};
use crate::services::enrollment;

use super::ApiResult;
use super::response::ApiResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRequest {
    course_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    course_id: String,
    #[serde(alias = "subsectionId")]
    sub_section_id: String,
}

#[post("/course/enroll", data = "<request>")]
pub async fn enroll(
    user: SessionUser,
    request: Json<EnrollRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::EnrollInCourses)?;
    enrollment::enroll(db.inner(), &request.course_id, &user.id).await?;
    Ok(ApiResponse::message("Enrolled in course successfully"))
}

#[post("/course/unenroll", data = "<request>")]
pub async fn unenroll(
    user: SessionUser,
    request: Json<EnrollRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::EnrollInCourses)?;
    enrollment::unenroll(db.inner(), &request.course_id, &user.id).await?;
    Ok(ApiResponse::message("Unenrolled from course successfully"))
}

#[post("/course/updateCourseProgress", data = "<request>")]
pub async fn mark_complete(
    user: SessionUser,
    request: Json<ProgressRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::TrackProgress)?;
    enrollment::mark_video_complete(db.inner(), &request.course_id, &request.sub_section_id, &user.id)
        .await?;
    Ok(ApiResponse::message("Course progress updated"))
}

#[delete("/course/updateCourseProgress", data = "<request>")]
pub async fn mark_incomplete(
    user: SessionUser,
    request: Json<ProgressRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::TrackProgress)?;
    enrollment::mark_video_incomplete(db.inner(), &request.course_id, &request.sub_section_id, &user.id)
        .await?;
    Ok(ApiResponse::message("Course progress updated"))
}

pub fn routes() -> Vec<Route> {
    routes![enroll, unenroll, mark_complete, mark_incomplete]
}
