use chrono::Utc;
use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Course, CourseStatus, DbCourse};

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub course_name: String,
    pub course_description: String,
    pub instructor_id: String,
    pub what_you_will_learn: String,
    pub price: f64,
    pub thumbnail_url: String,
    pub category_id: Option<String>,
    pub tag: Vec<String>,
    pub instructions: Vec<String>,
    pub status: CourseStatus,
}

pub(crate) const COURSE_COLUMNS: &str = "c.id, c.course_name, c.course_description, c.instructor_id, \
     c.what_you_will_learn, c.price, c.thumbnail_url, c.category_id, c.tag, c.instructions, \
     c.status, c.version, c.created_at";

fn into_courses(rows: Vec<DbCourse>) -> Result<Vec<Course>, AppError> {
    rows.into_iter().map(Course::try_from).collect()
}

#[instrument(skip_all, fields(instructor_id = %course.instructor_id))]
pub async fn insert_course<'e, E>(executor: E, course: &NewCourse) -> Result<Course, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Creating course");
    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().naive_utc();

    sqlx::query(
        "INSERT INTO courses (id, course_name, course_description, instructor_id, what_you_will_learn,
             price, thumbnail_url, category_id, tag, instructions, status, version, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
    )
    .bind(&id)
    .bind(&course.course_name)
    .bind(&course.course_description)
    .bind(&course.instructor_id)
    .bind(&course.what_you_will_learn)
    .bind(course.price)
    .bind(&course.thumbnail_url)
    .bind(course.category_id.as_deref())
    .bind(serde_json::to_string(&course.tag)?)
    .bind(serde_json::to_string(&course.instructions)?)
    .bind(course.status.as_str())
    .bind(created_at)
    .execute(executor)
    .await?;

    Ok(Course {
        id,
        course_name: course.course_name.clone(),
        course_description: course.course_description.clone(),
        instructor_id: course.instructor_id.clone(),
        what_you_will_learn: course.what_you_will_learn.clone(),
        price: course.price,
        thumbnail_url: course.thumbnail_url.clone(),
        category_id: course.category_id.clone(),
        tag: course.tag.clone(),
        instructions: course.instructions.clone(),
        status: course.status,
        version: 1,
        created_at,
    })
}

#[instrument(skip(executor))]
pub async fn find_course<'e, E>(executor: E, id: &str) -> Result<Option<Course>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, DbCourse>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses c WHERE c.id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.map(Course::try_from).transpose()
}

#[instrument(skip(executor))]
pub async fn get_course<'e, E>(executor: E, id: &str) -> Result<Course, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    find_course(executor, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course with id {} not found", id)))
}

/// Writes every mutable column of `course` and bumps its version. Returns
/// false when the stored version no longer equals `course.version`.
#[instrument(skip_all, fields(course_id = %course.id, version = course.version))]
pub async fn update_course<'e, E>(executor: E, course: &Course) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Updating course");
    let result = sqlx::query(
        "UPDATE courses SET
             course_name = ?, course_description = ?, what_you_will_learn = ?, price = ?,
             thumbnail_url = ?, category_id = ?, tag = ?, instructions = ?, status = ?,
             version = version + 1
         WHERE id = ? AND version = ?",
    )
    .bind(&course.course_name)
    .bind(&course.course_description)
    .bind(&course.what_you_will_learn)
    .bind(course.price)
    .bind(&course.thumbnail_url)
    .bind(course.category_id.as_deref())
    .bind(serde_json::to_string(&course.tag)?)
    .bind(serde_json::to_string(&course.instructions)?)
    .bind(course.status.as_str())
    .bind(&course.id)
    .bind(course.version)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Bumps the version after a change to the course's sections or sub-sections.
#[instrument(skip(executor))]
pub async fn touch_course<'e, E>(executor: E, id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("UPDATE courses SET version = version + 1 WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Progress and review rows cascade with the course. Sections must already
/// be gone.
#[instrument(skip(executor))]
pub async fn delete_course<'e, E>(executor: E, id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Deleting course");
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Course with id {} not found", id)));
    }

    Ok(())
}

#[instrument(skip(executor))]
pub async fn list_published_courses<'e, E>(executor: E) -> Result<Vec<Course>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbCourse>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses c WHERE c.status = 'Published' ORDER BY c.rowid"
    ))
    .fetch_all(executor)
    .await?;

    into_courses(rows)
}

#[instrument(skip(executor))]
pub async fn courses_by_instructor<'e, E>(executor: E, instructor_id: &str) -> Result<Vec<Course>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbCourse>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses c WHERE c.instructor_id = ? ORDER BY c.created_at DESC, c.rowid DESC"
    ))
    .bind(instructor_id)
    .fetch_all(executor)
    .await?;

    into_courses(rows)
}

#[instrument(skip(executor))]
pub async fn published_courses_in_category<'e, E>(
    executor: E,
    category_id: &str,
) -> Result<Vec<Course>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbCourse>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses c
         WHERE c.category_id = ? AND c.status = 'Published'
         ORDER BY c.rowid"
    ))
    .bind(category_id)
    .fetch_all(executor)
    .await?;

    into_courses(rows)
}

#[instrument(skip(executor))]
pub async fn count_courses_by_instructor<'e, E>(executor: E, instructor_id: &str) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM courses WHERE instructor_id = ?")
        .bind(instructor_id)
        .fetch_one(executor)
        .await?;

    Ok(count)
}
