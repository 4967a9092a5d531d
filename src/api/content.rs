use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{FromForm, Route, State, post, routes};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use crate::auth::SessionUser;
use crate::clients::MediaService;
use crate::env::AppConfig;
use crate::error::AppError;
use crate::services::content::{self, SubSectionInput};
use crate::services::projection::CourseDetails;

use super::response::ApiResponse;
use super::{ApiResult, parse_number, read_upload};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSectionRequest {
    #[serde(default)]
    section_name: String,
    course_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSectionRequest {
    #[serde(default)]
    section_name: String,
    section_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionIdRequest {
    section_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubSectionIdRequest {
    sub_section_id: String,
}

#[derive(FromForm)]
pub struct SubSectionForm<'r> {
    #[field(name = "sectionId")]
    section_id: Option<String>,
    #[field(name = "subSectionId")]
    sub_section_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[field(name = "timeDuration")]
    time_duration: Option<String>,
    video: Option<TempFile<'r>>,
}

impl SubSectionForm<'_> {
    fn input(&self) -> Result<SubSectionInput, AppError> {
        Ok(SubSectionInput {
            title: self.title.clone(),
            description: self.description.clone(),
            time_duration: self
                .time_duration
                .as_deref()
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| parse_number("timeDuration", raw))
                .transpose()?,
        })
    }
}

fn required(value: &Option<String>, field: &str) -> Result<String, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation(format!("{}: is required", field)))
}

#[post("/course/addSection", data = "<request>")]
pub async fn add_section(
    user: SessionUser,
    request: Json<AddSectionRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CourseDetails> {
    let course = content::create_section(db.inner(), &user, &request.course_id, &request.section_name).await?;
    Ok(ApiResponse::ok("Section created successfully", course))
}

#[post("/course/updateSection", data = "<request>")]
pub async fn update_section(
    user: SessionUser,
    request: Json<UpdateSectionRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CourseDetails> {
    let course =
        content::update_section(db.inner(), &user, &request.section_id, &request.section_name).await?;
    Ok(ApiResponse::ok("Section updated successfully", course))
}

#[post("/course/deleteSection", data = "<request>")]
pub async fn delete_section(
    user: SessionUser,
    request: Json<SectionIdRequest>,
    db: &State<Pool<Sqlite>>,
    media: &State<MediaService>,
) -> ApiResult<CourseDetails> {
    let course =
        content::delete_section(db.inner(), media.inner().as_ref(), &user, &request.section_id).await?;
    Ok(ApiResponse::ok("Section deleted successfully", course))
}

#[post("/course/addSubSection", data = "<form>")]
pub async fn add_sub_section(
    user: SessionUser,
    form: Form<SubSectionForm<'_>>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    media: &State<MediaService>,
) -> ApiResult<CourseDetails> {
    let section_id = required(&form.section_id, "sectionId")?;
    let input = form.input()?;
    let file = form
        .video
        .as_ref()
        .ok_or_else(|| AppError::Validation("video: file is required".to_string()))?;
    let video = read_upload(file, &config.media_folder).await?;

    let course =
        content::create_sub_section(db.inner(), media.inner().as_ref(), &user, &section_id, input, video)
            .await?;
    Ok(ApiResponse::ok("Sub-section created successfully", course))
}

#[post("/course/updateSubSection", data = "<form>")]
pub async fn update_sub_section(
    user: SessionUser,
    form: Form<SubSectionForm<'_>>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    media: &State<MediaService>,
) -> ApiResult<CourseDetails> {
    let sub_section_id = required(&form.sub_section_id, "subSectionId")?;
    let input = form.input()?;
    let video = match form.video.as_ref() {
        Some(file) => Some(read_upload(file, &config.media_folder).await?),
        None => None,
    };

    let course = content::update_sub_section(
        db.inner(),
        media.inner().as_ref(),
        &user,
        &sub_section_id,
        input,
        video,
    )
    .await?;
    Ok(ApiResponse::ok("Sub-section updated successfully", course))
}

#[post("/course/deleteSubSection", data = "<request>")]
pub async fn delete_sub_section(
    user: SessionUser,
    request: Json<SubSectionIdRequest>,
    db: &State<Pool<Sqlite>>,
    media: &State<MediaService>,
) -> ApiResult<CourseDetails> {
    let course = content::delete_sub_section(
        db.inner(),
        media.inner().as_ref(),
        &user,
        &request.sub_section_id,
    )
    .await?;
    Ok(ApiResponse::ok("Sub-section deleted successfully", course))
}

pub fn routes() -> Vec<Route> {
    routes![
        add_section,
        update_section,
        delete_section,
        add_sub_section,
        update_sub_section,
        delete_sub_section
    ]
}
