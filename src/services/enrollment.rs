use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::database::{courses, progress, sections, sub_sections};
use crate::error::AppError;
use crate::models::CourseProgress;

/// Enrolling twice leaves a single enrollment.
#[instrument(skip(pool))]
pub async fn enroll(pool: &Pool<Sqlite>, course_id: &str, user_id: &str) -> Result<(), AppError> {
    courses::get_course(pool, course_id).await?;

    if progress::enroll(pool, course_id, user_id).await? {
        info!("Student enrolled");
    } else {
        info!("Student was already enrolled");
    }
    Ok(())
}

/// No-op when the user is not enrolled.
#[instrument(skip(pool))]
pub async fn unenroll(pool: &Pool<Sqlite>, course_id: &str, user_id: &str) -> Result<(), AppError> {
    progress::unenroll(pool, course_id, user_id).await?;
    Ok(())
}

/// Resolves the enrollment and checks the sub-section is part of the course.
async fn progress_for(
    pool: &Pool<Sqlite>,
    course_id: &str,
    sub_section_id: &str,
    user_id: &str,
) -> Result<CourseProgress, AppError> {
    let sub_section = sub_sections::get_sub_section(pool, sub_section_id).await?;
    let section = sections::get_section(pool, &sub_section.section_id).await?;
    if section.course_id != course_id {
        return Err(AppError::NotFound(format!(
            "Sub-section {} does not belong to course {}",
            sub_section_id, course_id
        )));
    }

    progress::find_progress(pool, course_id, user_id)
        .await?
        .ok_or(AppError::NotEnrolled)
}

#[instrument(skip(pool))]
pub async fn mark_video_complete(
    pool: &Pool<Sqlite>,
    course_id: &str,
    sub_section_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    let entry = progress_for(pool, course_id, sub_section_id, user_id).await?;
    progress::add_completed_video(pool, &entry.id, sub_section_id).await?;
    info!("Video marked complete");
    Ok(())
}

#[instrument(skip(pool))]
pub async fn mark_video_incomplete(
    pool: &Pool<Sqlite>,
    course_id: &str,
    sub_section_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    let entry = progress_for(pool, course_id, sub_section_id, user_id).await?;
    progress::remove_completed_video(pool, &entry.id, sub_section_id).await?;
    info!("Video marked incomplete");
    Ok(())
}
