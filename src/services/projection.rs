//! Read models assembled from the content graph.
//!
//! Every endpoint that returns a course in full goes through [`course_details`],
//! so the shape of a course is the same after a read and after any mutation.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use rand::Rng;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use crate::auth::User;
use crate::database::ratings::ReviewRow;
use crate::database::{categories, courses, progress, ratings, sections, sub_sections, users};
use crate::error::AppError;
use crate::models::{Category, Course, SubSection};

pub const MOST_SELLING_LIMIT: i64 = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorSummary {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: String,
}

impl From<User> for InstructorSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            image_url: user.image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    pub id: String,
    pub section_name: String,
    pub position: i64,
    pub sub_sections: Vec<SubSection>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedCourse {
    pub id: String,
    pub course_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: String,
    pub rating: f64,
    pub review: String,
    pub created_at: NaiveDateTime,
    pub user: Reviewer,
    pub course: ReviewedCourse,
}

impl From<ReviewRow> for ReviewView {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            rating: row.rating,
            review: row.review,
            created_at: row.created_at,
            user: Reviewer {
                id: row.user_id,
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                image_url: row.image_url,
            },
            course: ReviewedCourse {
                id: row.course_id,
                course_name: row.course_name,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetails {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: InstructorSummary,
    pub category_name: Option<String>,
    pub course_content: Vec<SectionView>,
    pub total_duration: String,
    pub total_duration_seconds: i64,
    pub average_rating: f64,
    pub rating_and_reviews: Vec<ReviewView>,
    pub students_enrolled: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_videos: Option<Vec<String>>,
}

/// Catalogue entry: course fields plus who teaches it and how it is rated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: Course,
    pub instructor: InstructorSummary,
    pub average_rating: f64,
    pub rating_and_reviews: Vec<ReviewView>,
    pub students_enrolled: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCourses {
    #[serde(flatten)]
    pub category: Category,
    pub courses: Vec<CourseSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPage {
    pub selected_category: CategoryWithCourses,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub different_category: Option<CategoryWithCourses>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_selling_courses: Option<Vec<CourseSummary>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    #[serde(flatten)]
    pub course: Course,
    pub course_content: Vec<SectionView>,
    pub total_duration: String,
    pub total_duration_seconds: i64,
    pub progress_percentage: f64,
    pub completed_videos: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorCourseStats {
    pub id: String,
    pub course_name: String,
    pub course_description: String,
    pub students_enrolled: i64,
    pub amount_generated: f64,
}

pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

/// Share of sub-sections completed, rounded to two decimals. A course with
/// nothing to watch counts as finished.
pub fn progress_percentage(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = completed as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}

fn group_sections(
    section_rows: Vec<crate::models::Section>,
    sub_section_rows: Vec<SubSection>,
) -> Vec<SectionView> {
    let mut by_section: HashMap<String, Vec<SubSection>> = HashMap::new();
    for sub_section in sub_section_rows {
        by_section
            .entry(sub_section.section_id.clone())
            .or_default()
            .push(sub_section);
    }

    section_rows
        .into_iter()
        .map(|section| SectionView {
            sub_sections: by_section.remove(&section.id).unwrap_or_default(),
            id: section.id,
            section_name: section.section_name,
            position: section.position,
        })
        .collect()
}

/// Ordered section tree of a course and its total length in seconds.
async fn load_content(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<(Vec<SectionView>, i64), AppError> {
    let section_rows = sections::sections_for_course(&mut *conn, course_id).await?;
    let sub_section_rows = sub_sections::sub_sections_for_course(&mut *conn, course_id).await?;
    let total: i64 = sub_section_rows
        .iter()
        .map(|s| s.time_duration_seconds)
        .sum();

    Ok((group_sections(section_rows, sub_section_rows), total))
}

/// The canonical course projection. `viewer` adds that user's completed videos.
#[instrument(skip(conn))]
pub async fn course_details(
    conn: &mut SqliteConnection,
    course_id: &str,
    viewer: Option<&str>,
) -> Result<CourseDetails, AppError> {
    let course = courses::get_course(&mut *conn, course_id).await?;
    let instructor = users::get_user(&mut *conn, &course.instructor_id).await?;

    let category_name = match &course.category_id {
        Some(id) => categories::find_category(&mut *conn, id)
            .await?
            .map(|c| c.name),
        None => None,
    };

    let (course_content, total_seconds) = load_content(conn, course_id).await?;
    let average_rating = ratings::average_rating(&mut *conn, course_id).await?;
    let reviews = ratings::reviews_for_course(&mut *conn, course_id).await?;
    let students_enrolled = progress::students_enrolled(&mut *conn, course_id).await?;

    let completed_videos = match viewer {
        Some(user_id) => Some(progress::completed_videos(&mut *conn, course_id, user_id).await?),
        None => None,
    };

    Ok(CourseDetails {
        course,
        instructor: InstructorSummary::from(instructor),
        category_name,
        course_content,
        total_duration: format_duration(total_seconds),
        total_duration_seconds: total_seconds,
        average_rating,
        rating_and_reviews: reviews.into_iter().map(ReviewView::from).collect(),
        students_enrolled,
        completed_videos,
    })
}

async fn course_summary(conn: &mut SqliteConnection, course: Course) -> Result<CourseSummary, AppError> {
    let instructor = users::get_user(&mut *conn, &course.instructor_id).await?;
    let average_rating = ratings::average_rating(&mut *conn, &course.id).await?;
    let reviews = ratings::reviews_for_course(&mut *conn, &course.id).await?;
    let students_enrolled = progress::students_enrolled(&mut *conn, &course.id).await?;

    Ok(CourseSummary {
        course,
        instructor: InstructorSummary::from(instructor),
        average_rating,
        rating_and_reviews: reviews.into_iter().map(ReviewView::from).collect(),
        students_enrolled,
    })
}

async fn summaries(
    conn: &mut SqliteConnection,
    course_rows: Vec<Course>,
) -> Result<Vec<CourseSummary>, AppError> {
    let mut out = Vec::with_capacity(course_rows.len());
    for course in course_rows {
        out.push(course_summary(conn, course).await?);
    }
    Ok(out)
}

#[instrument(skip(conn))]
pub async fn published_catalogue(conn: &mut SqliteConnection) -> Result<Vec<CourseSummary>, AppError> {
    let rows = courses::list_published_courses(&mut *conn).await?;
    summaries(conn, rows).await
}

#[instrument(skip(conn))]
pub async fn instructor_courses(
    conn: &mut SqliteConnection,
    instructor_id: &str,
) -> Result<Vec<CourseDetails>, AppError> {
    let rows = courses::courses_by_instructor(&mut *conn, instructor_id).await?;
    let mut out = Vec::with_capacity(rows.len());
    for course in rows {
        out.push(course_details(conn, &course.id, None).await?);
    }
    Ok(out)
}

/// Published courses ranked by enrollments.
#[instrument(skip(conn))]
pub async fn most_popular(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<CourseSummary>, AppError> {
    let rows = ratings::most_popular(&mut *conn, limit).await?;
    let course_rows = rows
        .into_iter()
        .map(|row| Course::try_from(row.course))
        .collect::<Result<Vec<_>, _>>()?;
    summaries(conn, course_rows).await
}

/// Builds the category landing page. When the category has no published
/// courses only `selectedCategory` is present.
#[instrument(skip(conn, rng))]
pub async fn category_page<R: Rng + Send>(
    conn: &mut SqliteConnection,
    category_id: &str,
    rng: &mut R,
) -> Result<CategoryPage, AppError> {
    let category = categories::get_category(&mut *conn, category_id).await?;
    let rows = courses::published_courses_in_category(&mut *conn, category_id).await?;

    if rows.is_empty() {
        info!("Category has no published courses");
        return Ok(CategoryPage {
            selected_category: CategoryWithCourses {
                category,
                courses: Vec::new(),
            },
            different_category: None,
            most_selling_courses: None,
        });
    }

    let selected_courses = summaries(conn, rows).await?;

    let mut others = categories::other_categories(&mut *conn, category_id).await?;
    let different_category = if others.is_empty() {
        None
    } else {
        let pick = others.swap_remove(rng.random_range(0..others.len()));
        let other_rows = courses::published_courses_in_category(&mut *conn, &pick.id).await?;
        Some(CategoryWithCourses {
            category: pick,
            courses: summaries(conn, other_rows).await?,
        })
    };

    let most_selling_courses = most_popular(conn, MOST_SELLING_LIMIT).await?;

    Ok(CategoryPage {
        selected_category: CategoryWithCourses {
            category,
            courses: selected_courses,
        },
        different_category,
        most_selling_courses: Some(most_selling_courses),
    })
}

#[instrument(skip(conn))]
pub async fn enrolled_courses(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<EnrolledCourse>, AppError> {
    let rows = progress::enrolled_courses(&mut *conn, user_id).await?;
    let mut out = Vec::with_capacity(rows.len());

    for course in rows {
        let (course_content, total_seconds) = load_content(conn, &course.id).await?;
        let total_videos: usize = course_content.iter().map(|s| s.sub_sections.len()).sum();
        let completed_videos = progress::completed_videos(&mut *conn, &course.id, user_id).await?;

        out.push(EnrolledCourse {
            progress_percentage: progress_percentage(completed_videos.len(), total_videos),
            course,
            course_content,
            total_duration: format_duration(total_seconds),
            total_duration_seconds: total_seconds,
            completed_videos,
        });
    }

    Ok(out)
}

#[instrument(skip(conn))]
pub async fn instructor_dashboard(
    conn: &mut SqliteConnection,
    instructor_id: &str,
) -> Result<Vec<InstructorCourseStats>, AppError> {
    let rows = courses::courses_by_instructor(&mut *conn, instructor_id).await?;
    let mut out = Vec::with_capacity(rows.len());

    for course in rows {
        let students_enrolled = progress::students_enrolled(&mut *conn, &course.id).await?;
        out.push(InstructorCourseStats {
            amount_generated: students_enrolled as f64 * course.price,
            students_enrolled,
            id: course.id,
            course_name: course.course_name,
            course_description: course.course_description,
        });
    }

    Ok(out)
}

#[instrument(skip(conn))]
pub async fn all_reviews(conn: &mut SqliteConnection) -> Result<Vec<ReviewView>, AppError> {
    let rows = ratings::all_reviews(&mut *conn).await?;
    Ok(rows.into_iter().map(ReviewView::from).collect())
}
