use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Section;

/// Appends a section after the course's current last one.
#[instrument(skip(executor))]
pub async fn insert_section<'e, E>(executor: E, course_id: &str, section_name: &str) -> Result<Section, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Creating section");
    let section = sqlx::query_as::<_, Section>(
        "INSERT INTO sections (id, section_name, course_id, position)
         VALUES (?, ?, ?, (SELECT COALESCE(MAX(position), -1) + 1 FROM sections WHERE course_id = ?))
         RETURNING id, section_name, course_id, position",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(section_name)
    .bind(course_id)
    .bind(course_id)
    .fetch_one(executor)
    .await?;

    Ok(section)
}

#[instrument(skip(executor))]
pub async fn get_section<'e, E>(executor: E, id: &str) -> Result<Section, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Section>(
        "SELECT id, section_name, course_id, position FROM sections WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.ok_or_else(|| AppError::NotFound(format!("Section with id {} not found", id)))
}

#[instrument(skip(executor))]
pub async fn sections_for_course<'e, E>(executor: E, course_id: &str) -> Result<Vec<Section>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, Section>(
        "SELECT id, section_name, course_id, position FROM sections
         WHERE course_id = ? ORDER BY position, rowid",
    )
    .bind(course_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

#[instrument(skip(executor))]
pub async fn rename_section<'e, E>(executor: E, id: &str, section_name: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Renaming section");
    let result = sqlx::query("UPDATE sections SET section_name = ? WHERE id = ?")
        .bind(section_name)
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Section with id {} not found", id)));
    }

    Ok(())
}

/// Sub-sections must already be gone.
#[instrument(skip(executor))]
pub async fn delete_section<'e, E>(executor: E, id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Deleting section");
    let result = sqlx::query("DELETE FROM sections WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Section with id {} not found", id)));
    }

    Ok(())
}
