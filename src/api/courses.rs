use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{FromForm, Route, State, delete, get, post, routes};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, SessionUser};
use crate::clients::MediaService;
use crate::env::AppConfig;
use crate::error::AppError;
use crate::models::CourseStatus;
use crate::services::content::{self, CourseChanges, CourseInput};
use crate::services::projection::{self, CourseDetails, CourseSummary};

use super::response::ApiResponse;
use super::{ApiResult, parse_list, parse_number, read_upload};

/// Multipart body shared by create and edit. Every text field is optional
/// here so that missing values surface as validation errors.
#[derive(FromForm)]
pub struct CourseForm<'r> {
    #[field(name = "courseId")]
    course_id: Option<String>,
    #[field(name = "courseName")]
    course_name: Option<String>,
    #[field(name = "courseDescription")]
    course_description: Option<String>,
    #[field(name = "whatYouWillLearn")]
    what_you_will_learn: Option<String>,
    price: Option<String>,
    #[field(name = "category")]
    category: Option<String>,
    tag: Option<String>,
    instructions: Option<String>,
    status: Option<String>,
    #[field(name = "expectedVersion")]
    expected_version: Option<i64>,
    #[field(name = "thumbnailImage")]
    thumbnail_image: Option<TempFile<'r>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseIdRequest {
    pub course_id: String,
}

fn parse_status(raw: Option<&str>) -> Result<Option<CourseStatus>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => CourseStatus::from_str(s)
            .map(Some)
            .map_err(|e| AppError::Validation(format!("status: {}", e))),
        None => Ok(None),
    }
}

fn parse_optional_list(field: &str, raw: Option<&str>) -> Result<Option<Vec<String>>, AppError> {
    raw.map(|r| parse_list(field, r)).transpose()
}

impl CourseForm<'_> {
    fn to_input(&self) -> Result<CourseInput, AppError> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();

        Ok(CourseInput {
            course_name: text(&self.course_name),
            course_description: text(&self.course_description),
            what_you_will_learn: text(&self.what_you_will_learn),
            price: match self.price.as_deref() {
                Some(raw) => parse_number("price", raw)?,
                None => return Err(AppError::Validation("price: is required".to_string())),
            },
            category_id: text(&self.category),
            tag: parse_list("tag", self.tag.as_deref().unwrap_or_default())?,
            instructions: parse_list("instructions", self.instructions.as_deref().unwrap_or_default())?,
            status: parse_status(self.status.as_deref())?,
        })
    }

    fn to_changes(&self) -> Result<CourseChanges, AppError> {
        Ok(CourseChanges {
            course_name: self.course_name.clone(),
            course_description: self.course_description.clone(),
            what_you_will_learn: self.what_you_will_learn.clone(),
            price: self
                .price
                .as_deref()
                .map(|raw| parse_number("price", raw))
                .transpose()?,
            category_id: self.category.clone().filter(|c| !c.trim().is_empty()),
            tag: parse_optional_list("tag", self.tag.as_deref())?,
            instructions: parse_optional_list("instructions", self.instructions.as_deref())?,
            status: parse_status(self.status.as_deref())?,
        })
    }
}

#[post("/course/createCourse", data = "<form>")]
pub async fn create_course(
    user: SessionUser,
    form: Form<CourseForm<'_>>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    media: &State<MediaService>,
) -> ApiResult<CourseDetails> {
    user.require_permission(Permission::CreateCourses)?;

    let input = form.to_input()?;
    let file = form
        .thumbnail_image
        .as_ref()
        .ok_or_else(|| AppError::Validation("thumbnailImage: file is required".to_string()))?;
    let thumbnail = read_upload(file, &config.media_folder).await?;

    let course = content::create_course(db.inner(), media.inner().as_ref(), &user, input, thumbnail).await?;
    Ok(ApiResponse::ok("Course created successfully", course))
}

#[post("/course/editCourse", data = "<form>")]
pub async fn edit_course(
    user: SessionUser,
    form: Form<CourseForm<'_>>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
    media: &State<MediaService>,
) -> ApiResult<CourseDetails> {
    let course_id = form
        .course_id
        .clone()
        .ok_or_else(|| AppError::Validation("courseId: is required".to_string()))?;
    let changes = form.to_changes()?;

    let thumbnail = match form.thumbnail_image.as_ref() {
        Some(file) => Some(read_upload(file, &config.media_folder).await?),
        None => None,
    };

    let course = content::edit_course(
        db.inner(),
        media.inner().as_ref(),
        &user,
        &course_id,
        changes,
        thumbnail,
        form.expected_version,
    )
    .await?;

    Ok(ApiResponse::ok("Course updated successfully", course))
}

#[delete("/course/deleteCourse", data = "<request>")]
pub async fn delete_course(
    user: SessionUser,
    request: Json<CourseIdRequest>,
    db: &State<Pool<Sqlite>>,
    media: &State<MediaService>,
) -> ApiResult<()> {
    content::delete_course(db.inner(), media.inner().as_ref(), &user, &request.course_id).await?;
    Ok(ApiResponse::message("Course deleted successfully"))
}

#[get("/course/getAllCourses")]
pub async fn get_all_courses(db: &State<Pool<Sqlite>>) -> ApiResult<Vec<CourseSummary>> {
    let mut conn = db.acquire().await?;
    let courses = projection::published_catalogue(&mut conn).await?;
    Ok(ApiResponse::ok("Data for all courses fetched successfully", courses))
}

#[post("/course/getCourseDetails", data = "<request>")]
pub async fn get_course_details(
    request: Json<CourseIdRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CourseDetails> {
    let mut conn = db.acquire().await?;
    let details = projection::course_details(&mut conn, &request.course_id, None).await?;
    Ok(ApiResponse::ok("Fetched course data successfully", details))
}

#[post("/course/getFullCourseDetails", data = "<request>")]
pub async fn get_full_course_details(
    user: SessionUser,
    request: Json<CourseIdRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CourseDetails> {
    let mut conn = db.acquire().await?;
    let details = projection::course_details(&mut conn, &request.course_id, Some(&user.id)).await?;
    Ok(ApiResponse::ok("Fetched course data successfully", details))
}

#[get("/course/getInstructorCourses")]
pub async fn get_instructor_courses(
    user: SessionUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<CourseDetails>> {
    user.require_permission(Permission::ManageOwnCourses)?;
    let mut conn = db.acquire().await?;
    let courses = projection::instructor_courses(&mut conn, &user.id).await?;
    Ok(ApiResponse::ok("Instructor courses fetched successfully", courses))
}

pub fn routes() -> Vec<Route> {
    routes![
        create_course,
        edit_course,
        delete_course,
        get_all_courses,
        get_course_details,
        get_full_course_details,
        get_instructor_courses
    ]
}
