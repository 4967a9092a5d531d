use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};
use validator::Validate;

use crate::database::{courses, progress, ratings};
use crate::error::AppError;
use crate::models::RatingAndReview;
use crate::validation::{not_blank, validate_input};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RatingInput {
    #[validate(custom(function = "not_blank"))]
    pub course_id: String,
    #[validate(range(min = 1.0, max = 5.0, message = "must be between 1 and 5"))]
    pub rating: f64,
    #[serde(default)]
    pub review: String,
}

/// One review per enrolled student and course.
#[instrument(skip(pool, input), fields(course_id = %input.course_id))]
pub async fn create_rating(
    pool: &Pool<Sqlite>,
    user_id: &str,
    input: &RatingInput,
) -> Result<RatingAndReview, AppError> {
    validate_input(input)?;
    courses::get_course(pool, &input.course_id).await?;

    if progress::find_progress(pool, &input.course_id, user_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotEnrolled);
    }

    if ratings::find_rating(pool, user_id, &input.course_id)
        .await?
        .is_some()
    {
        return Err(AppError::AlreadyReviewed);
    }

    let rating =
        ratings::insert_rating(pool, user_id, &input.course_id, input.rating, input.review.trim())
            .await?;

    info!(rating_id = %rating.id, "Rating created");
    Ok(rating)
}

#[instrument(skip(pool))]
pub async fn average_rating(pool: &Pool<Sqlite>, course_id: &str) -> Result<f64, AppError> {
    ratings::average_rating(pool, course_id).await
}
