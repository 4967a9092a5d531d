use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Category;

#[instrument(skip(executor))]
pub async fn create_category<'e, E>(
    executor: E,
    name: &str,
    description: &str,
) -> Result<Category, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Creating category");
    let category = Category {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        description: description.to_string(),
    };

    sqlx::query("INSERT INTO categories (id, name, description) VALUES (?, ?, ?)")
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .execute(executor)
        .await?;

    Ok(category)
}

#[instrument(skip(executor))]
pub async fn list_categories<'e, E>(executor: E) -> Result<Vec<Category>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories ORDER BY rowid",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

#[instrument(skip(executor))]
pub async fn find_category<'e, E>(executor: E, id: &str) -> Result<Option<Category>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

#[instrument(skip(executor))]
pub async fn get_category<'e, E>(executor: E, id: &str) -> Result<Category, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    find_category(executor, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
}

#[instrument(skip(executor))]
pub async fn other_categories<'e, E>(executor: E, exclude_id: &str) -> Result<Vec<Category>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, Category>(
        "SELECT id, name, description FROM categories WHERE id != ? ORDER BY rowid",
    )
    .bind(exclude_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Courses in the category keep existing with no category.
#[instrument(skip(executor))]
pub async fn delete_category<'e, E>(executor: E, id: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Deleting category");
    let result = sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Category with id {} not found", id)));
    }

    Ok(())
}
