use chrono::Utc;
use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Course, CourseProgress, DbCourse};

use super::courses::COURSE_COLUMNS;

/// Returns true when a new enrollment row was written.
#[instrument(skip(executor))]
pub async fn enroll<'e, E>(executor: E, course_id: &str, user_id: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Enrolling user");
    let result = sqlx::query(
        "INSERT OR IGNORE INTO course_progress (id, course_id, user_id, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(course_id)
    .bind(user_id)
    .bind(Utc::now().naive_utc())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Completed-video markers cascade with the enrollment.
#[instrument(skip(executor))]
pub async fn unenroll<'e, E>(executor: E, course_id: &str, user_id: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Removing enrollment");
    let result = sqlx::query("DELETE FROM course_progress WHERE course_id = ? AND user_id = ?")
        .bind(course_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

#[instrument(skip(executor))]
pub async fn find_progress<'e, E>(
    executor: E,
    course_id: &str,
    user_id: &str,
) -> Result<Option<CourseProgress>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, CourseProgress>(
        "SELECT id, course_id, user_id, created_at FROM course_progress
         WHERE course_id = ? AND user_id = ?",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(executor))]
pub async fn add_completed_video<'e, E>(
    executor: E,
    progress_id: &str,
    sub_section_id: &str,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR IGNORE INTO course_progress_videos (progress_id, sub_section_id) VALUES (?, ?)",
    )
    .bind(progress_id)
    .bind(sub_section_id)
    .execute(executor)
    .await?;

    Ok(())
}

#[instrument(skip(executor))]
pub async fn remove_completed_video<'e, E>(
    executor: E,
    progress_id: &str,
    sub_section_id: &str,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM course_progress_videos WHERE progress_id = ? AND sub_section_id = ?")
        .bind(progress_id)
        .bind(sub_section_id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Ids of the sub-sections `user_id` has completed in `course_id`.
#[instrument(skip(executor))]
pub async fn completed_videos<'e, E>(
    executor: E,
    course_id: &str,
    user_id: &str,
) -> Result<Vec<String>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT v.sub_section_id FROM course_progress_videos v
         JOIN course_progress p ON p.id = v.progress_id
         WHERE p.course_id = ? AND p.user_id = ?
         ORDER BY v.rowid",
    )
    .bind(course_id)
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

#[instrument(skip(executor))]
pub async fn students_enrolled<'e, E>(executor: E, course_id: &str) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_progress WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(executor)
        .await?;

    Ok(count)
}

#[instrument(skip(executor))]
pub async fn enrolled_courses<'e, E>(executor: E, user_id: &str) -> Result<Vec<Course>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, DbCourse>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses c
         JOIN course_progress p ON p.course_id = c.id
         WHERE p.user_id = ?
         ORDER BY p.created_at, p.rowid"
    ))
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(Course::try_from).collect()
}

#[instrument(skip(executor))]
pub async fn delete_progress_for_user<'e, E>(executor: E, user_id: &str) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM course_progress WHERE user_id = ?")
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
