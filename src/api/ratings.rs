use rocket::serde::json::Json;
use rocket::{Route, State, get, post, routes};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};

use crate::auth::{Permission, SessionUser};
use crate::models::RatingAndReview;
use crate::services::projection::{self, CourseSummary, MOST_SELLING_LIMIT, ReviewView};
use crate::services::ratings::{self, RatingInput};

use super::ApiResult;
use super::response::ApiResponse;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageRatingRequest {
    course_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageRating {
    average_rating: f64,
}

#[post("/course/createRating", data = "<request>")]
pub async fn create_rating(
    user: SessionUser,
    request: Json<RatingInput>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<RatingAndReview> {
    user.require_permission(Permission::ReviewCourses)?;
    let rating = ratings::create_rating(db.inner(), &user.id, &request).await?;
    Ok(ApiResponse::ok("Rating and review created successfully", rating))
}

#[post("/course/getAverageRating", data = "<request>")]
pub async fn get_average_rating(
    request: Json<AverageRatingRequest>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<AverageRating> {
    let average_rating = ratings::average_rating(db.inner(), &request.course_id).await?;
    Ok(ApiResponse::ok(
        "Average rating fetched successfully",
        AverageRating { average_rating },
    ))
}

#[get("/course/getReviews")]
pub async fn get_reviews(db: &State<Pool<Sqlite>>) -> ApiResult<Vec<ReviewView>> {
    let mut conn = db.acquire().await?;
    let reviews = projection::all_reviews(&mut conn).await?;
    Ok(ApiResponse::ok("All reviews fetched successfully", reviews))
}

#[get("/course/getMostPopular?<limit>")]
pub async fn get_most_popular(
    limit: Option<i64>,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<CourseSummary>> {
    let limit = limit.filter(|l| *l > 0).unwrap_or(MOST_SELLING_LIMIT);
    let mut conn = db.acquire().await?;
    let courses = projection::most_popular(&mut conn, limit).await?;
    Ok(ApiResponse::ok("Most popular courses fetched successfully", courses))
}

pub fn routes() -> Vec<Route> {
    routes![create_rating, get_average_rating, get_reviews, get_most_popular]
}
