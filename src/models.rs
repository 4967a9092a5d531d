use anyhow::Error;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CourseStatus {
    #[default]
    Draft,
    Published,
}

impl CourseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseStatus::Draft => "Draft",
            CourseStatus::Published => "Published",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Draft" => Ok(CourseStatus::Draft),
            "Published" => Ok(CourseStatus::Published),
            _ => Err(Error::msg(format!("Unknown course status: {}", s))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
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
    pub version: i64,
    pub created_at: NaiveDateTime,
}

// tag and instructions are stored as JSON arrays to keep their order.
#[derive(sqlx::FromRow, Clone)]
pub struct DbCourse {
    pub id: String,
    pub course_name: String,
    pub course_description: String,
    pub instructor_id: String,
    pub what_you_will_learn: String,
    pub price: f64,
    pub thumbnail_url: String,
    pub category_id: Option<String>,
    pub tag: String,
    pub instructions: String,
    pub status: String,
    pub version: i64,
    pub created_at: NaiveDateTime,
}

impl TryFrom<DbCourse> for Course {
    type Error = AppError;

    fn try_from(course: DbCourse) -> Result<Self, Self::Error> {
        Ok(Self {
            tag: serde_json::from_str(&course.tag)?,
            instructions: serde_json::from_str(&course.instructions)?,
            status: CourseStatus::from_str(&course.status)
                .map_err(|e| AppError::Internal(e.to_string()))?,
            id: course.id,
            course_name: course.course_name,
            course_description: course.course_description,
            instructor_id: course.instructor_id,
            what_you_will_learn: course.what_you_will_learn,
            price: course.price,
            thumbnail_url: course.thumbnail_url,
            category_id: course.category_id,
            version: course.version,
            created_at: course.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    pub section_name: String,
    pub course_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubSection {
    pub id: String,
    pub title: String,
    pub description: String,
    pub time_duration_seconds: i64,
    pub video_url: String,
    pub section_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RatingAndReview {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub rating: f64,
    pub review: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub id: String,
    pub course_id: String,
    pub user_id: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, Default)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub about: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Otp {
    pub id: String,
    pub email: String,
    pub code: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
