use chrono::{NaiveDateTime, Utc};
use sqlx::{Executor, Sqlite};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DbCourse, RatingAndReview};

use super::courses::COURSE_COLUMNS;

/// A review joined with its author and course.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: String,
    pub rating: f64,
    pub review: String,
    pub created_at: NaiveDateTime,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: String,
    pub course_id: String,
    pub course_name: String,
}

#[derive(sqlx::FromRow)]
pub struct PopularCourseRow {
    #[sqlx(flatten)]
    pub course: DbCourse,
    pub sold: i64,
}

const REVIEW_SELECT: &str = "SELECT r.id, r.rating, r.review, r.created_at, r.user_id,
            u.first_name, u.last_name, u.email, u.image_url, r.course_id, c.course_name
     FROM rating_and_reviews r
     JOIN users u ON u.id = r.user_id
     JOIN courses c ON c.id = r.course_id";

#[instrument(skip(executor, review))]
pub async fn insert_rating<'e, E>(
    executor: E,
    user_id: &str,
    course_id: &str,
    rating: f64,
    review: &str,
) -> Result<RatingAndReview, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    info!("Creating rating");
    let row = RatingAndReview {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        course_id: course_id.to_string(),
        rating,
        review: review.to_string(),
        created_at: Utc::now().naive_utc(),
    };

    let result = sqlx::query(
        "INSERT INTO rating_and_reviews (id, user_id, course_id, rating, review, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&row.id)
    .bind(&row.user_id)
    .bind(&row.course_id)
    .bind(row.rating)
    .bind(&row.review)
    .bind(row.created_at)
    .execute(executor)
    .await;

    match result {
        Ok(_) => Ok(row),
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            Err(AppError::AlreadyReviewed)
        }
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip(executor))]
pub async fn find_rating<'e, E>(
    executor: E,
    user_id: &str,
    course_id: &str,
) -> Result<Option<RatingAndReview>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, RatingAndReview>(
        "SELECT id, user_id, course_id, rating, review, created_at FROM rating_and_reviews
         WHERE user_id = ? AND course_id = ?",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Mean rating, 0 when the course has no reviews.
#[instrument(skip(executor))]
pub async fn average_rating<'e, E>(executor: E, course_id: &str) -> Result<f64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let avg: Option<f64> =
        sqlx::query_scalar("SELECT AVG(rating) FROM rating_and_reviews WHERE course_id = ?")
            .bind(course_id)
            .fetch_one(executor)
            .await?;

    Ok(avg.unwrap_or(0.0))
}

#[instrument(skip(executor))]
pub async fn reviews_for_course<'e, E>(executor: E, course_id: &str) -> Result<Vec<ReviewRow>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "{REVIEW_SELECT} WHERE r.course_id = ? ORDER BY r.created_at, r.rowid"
    ))
    .bind(course_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Every review on the platform, highest rating first.
#[instrument(skip(executor))]
pub async fn all_reviews<'e, E>(executor: E) -> Result<Vec<ReviewRow>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "{REVIEW_SELECT} ORDER BY r.rating DESC, r.rowid"
    ))
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

/// Published courses by enrollment count, ties in creation order.
#[instrument(skip(executor))]
pub async fn most_popular<'e, E>(executor: E, limit: i64) -> Result<Vec<PopularCourseRow>, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query_as::<_, PopularCourseRow>(&format!(
        "SELECT {COURSE_COLUMNS}, COUNT(p.id) AS sold
         FROM courses c
         LEFT JOIN course_progress p ON p.course_id = c.id
         WHERE c.status = 'Published'
         GROUP BY c.id
         ORDER BY sold DESC, c.rowid ASC
         LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

#[instrument(skip(executor))]
pub async fn delete_ratings_for_user<'e, E>(executor: E, user_id: &str) -> Result<u64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM rating_and_reviews WHERE user_id = ?")
        .bind(user_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected())
}
