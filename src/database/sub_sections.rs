use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::SubSection;

#[derive(Debug, Clone)]
pub struct NewSubSection {
    pub section_id: String,
    pub title: String,
    pub description: String,
    pub time_duration_seconds: i64,
    pub video_url: String,
}

#[instrument(skip_all, fields(section_id = %sub_section.section_id))]
pub async fn insert_sub_section<'e, E>(
    executor: E,
    sub_section: &NewSubSection,
) -> Result<SubSection, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Creating sub-section");
    let row = sqlx::query_as::<_, SubSection>(
        "INSERT INTO sub_sections (id, title, description, time_duration_seconds, video_url, section_id, position)
         VALUES (?, ?, ?, ?, ?, ?,
             (SELECT COALESCE(MAX(position), -1) + 1 FROM sub_sections WHERE section_id = ?))
         RETURNING id, title, description, time_duration_seconds, video_url, section_id, position",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&sub_section.title)
    .bind(&sub_section.description)
    .bind(sub_section.time_duration_seconds)
    .bind(&sub_section.video_url)
    .bind(&sub_section.section_id)
    .bind(&sub_section.section_id)
    .fetch_one(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(executor))]
pub async fn get_sub_section<'e, E>(executor: E, id: &str) -> Result<SubSection, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, SubSection>(
        "SELECT id, title, description, time_duration_seconds, video_url, section_id, position
         FROM sub_sections WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Sub-section with id {} not found", id)))
}

#[instrument(skip(executor))]
pub async fn sub_sections_for_section<'e, E>(
    executor: E,
    section_id: &str,
) -> Result<Vec<SubSection>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, SubSection>(
        "SELECT id, title, description, time_duration_seconds, video_url, section_id, position
         FROM sub_sections WHERE section_id = ? ORDER BY position, rowid",
    )
    .bind(section_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Every sub-section of a course, in section order then sub-section order.
#[instrument(skip(executor))]
pub async fn sub_sections_for_course<'e, E>(
    executor: E,
    course_id: &str,
) -> Result<Vec<SubSection>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, SubSection>(
        "SELECT ss.id, ss.title, ss.description, ss.time_duration_seconds, ss.video_url,
                ss.section_id, ss.position
         FROM sub_sections ss
         JOIN sections s ON s.id = ss.section_id
         WHERE s.course_id = ?
         ORDER BY s.position, s.rowid, ss.position, ss.rowid",
    )
    .bind(course_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

#[instrument(skip_all, fields(sub_section_id = %sub_section.id))]
pub async fn update_sub_section<'e, E>(executor: E, sub_section: &SubSection) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Updating sub-section");
    let result = sqlx::query(
        "UPDATE sub_sections SET title = ?, description = ?, time_duration_seconds = ?, video_url = ?
         WHERE id = ?",
    )
    .bind(&sub_section.title)
    .bind(&sub_section.description)
    .bind(sub_section.time_duration_seconds)
    .bind(&sub_section.video_url)
    .bind(&sub_section.id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Sub-section with id {} not found",
            sub_section.id
        )));
    }

    Ok(())
}

/// Completed-video markers cascade with the sub-section.
#[instrument(skip(executor))]
pub async fn delete_sub_section<'e, E>(executor: E, id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Deleting sub-section");
    let result = sqlx::query("DELETE FROM sub_sections WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Sub-section with id {} not found", id)));
    }

    Ok(())
}
